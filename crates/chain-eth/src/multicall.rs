//! Multicall3 `aggregate3` batching.
//!
//! All `balanceOf` reads for a token list go out in a single `eth_call`
//! against the chain's Multicall3 contract. Each sub-call is sent with
//! `allowFailure = true`, so one broken token contract only blanks its own
//! slot.

use alloy_primitives::{Address, U256};

use crate::abi::{encode_function_call, read_bytes, read_usize, read_word, AbiParam, WORD};
use crate::erc20::{decode_balance, encode_balance_of};
use crate::error::EthError;
use crate::rpc::EvmRpc;

/// Function selector for `aggregate3((address,bool,bytes)[])`: `0x82ad56cb`.
pub const AGGREGATE3_SELECTOR: [u8; 4] = [0x82, 0xad, 0x56, 0xcb];

/// One sub-call of an `aggregate3` batch.
#[derive(Debug, Clone)]
pub struct Call3 {
    pub target: Address,
    pub allow_failure: bool,
    pub call_data: Vec<u8>,
}

/// The outcome of one sub-call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Call3Result {
    pub success: bool,
    pub return_data: Vec<u8>,
}

/// Encodes an `aggregate3` call for the given batch.
pub fn encode_aggregate3(calls: &[Call3]) -> Vec<u8> {
    let items = calls
        .iter()
        .map(|call| {
            AbiParam::Tuple(vec![
                AbiParam::Address(call.target),
                AbiParam::Bool(call.allow_failure),
                AbiParam::Bytes(call.call_data.clone()),
            ])
        })
        .collect();

    encode_function_call(AGGREGATE3_SELECTOR, &[AbiParam::Array(items)])
}

/// Decodes the `(bool success, bytes returnData)[]` returned by `aggregate3`.
pub fn decode_aggregate3(data: &[u8]) -> Result<Vec<Call3Result>, EthError> {
    let array_start = read_usize(data, 0)?;
    let len = read_usize(data, array_start)?;
    let elements_start = array_start + WORD;

    // Every element needs at least its offset word; reject absurd lengths
    // before allocating.
    if len > data.len() / WORD {
        return Err(EthError::EncodingError(format!(
            "result array length {len} exceeds payload"
        )));
    }

    let mut results = Vec::with_capacity(len);
    for i in 0..len {
        let element = read_usize(data, elements_start + i * WORD)?;
        let tuple_start = offset_from(elements_start, element)?;
        let success = read_word(data, tuple_start)?[WORD - 1] != 0;
        let bytes_start = offset_from(tuple_start, read_usize(data, tuple_start + WORD)?)?;
        let return_data = read_bytes(data, bytes_start)?;
        results.push(Call3Result {
            success,
            return_data,
        });
    }

    Ok(results)
}

// Offsets come from the response, so their sum can be anything.
fn offset_from(base: usize, relative: usize) -> Result<usize, EthError> {
    base.checked_add(relative).ok_or_else(|| {
        EthError::EncodingError(format!("offset {relative} from {base} overflows"))
    })
}

/// Reads `balanceOf(owner)` for every token in one batched call.
///
/// The returned vector is aligned with `tokens`. A slot is `None` when that
/// token's sub-call failed or returned something that is not a uint256.
pub async fn fetch_token_balances(
    rpc: &dyn EvmRpc,
    multicall: Address,
    owner: Address,
    tokens: &[Address],
) -> Result<Vec<Option<U256>>, EthError> {
    if tokens.is_empty() {
        return Ok(Vec::new());
    }

    let call_data = encode_balance_of(&owner);
    let calls: Vec<Call3> = tokens
        .iter()
        .map(|token| Call3 {
            target: *token,
            allow_failure: true,
            call_data: call_data.clone(),
        })
        .collect();

    let raw = rpc.call(multicall, encode_aggregate3(&calls)).await?;
    let results = decode_aggregate3(&raw)?;

    if results.len() != tokens.len() {
        return Err(EthError::InvalidResponse(format!(
            "multicall returned {} results for {} calls",
            results.len(),
            tokens.len()
        )));
    }

    Ok(results
        .into_iter()
        .map(|result| {
            if result.success {
                decode_balance(&result.return_data).ok()
            } else {
                None
            }
        })
        .collect())
}
