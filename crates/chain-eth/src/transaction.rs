//! The inscription transaction request handed to the wallet provider.
//!
//! The provider signs and broadcasts; this crate only describes what to send:
//! a zero-value transfer to the zero address carrying the UTF-8 memo as
//! calldata.

use alloy_primitives::{Address, Bytes, U256};
use serde::Serialize;

/// An `eth_sendTransaction` request.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionRequest {
    pub from: Address,
    pub to: Address,
    pub value: U256,
    pub data: Bytes,
    /// Chain the provider must be on; serialized as a hex quantity.
    #[serde(serialize_with = "serialize_quantity")]
    pub chain_id: u64,
}

/// Encodes a UTF-8 message as calldata (the raw bytes, no ABI wrapping).
pub fn encode_memo(message: &str) -> Bytes {
    Bytes::copy_from_slice(message.as_bytes())
}

/// Builds the zero-value memo transaction for `message`.
pub fn memo_transaction(from: Address, chain_id: u64, message: &str) -> TransactionRequest {
    TransactionRequest {
        from,
        to: Address::ZERO,
        value: U256::ZERO,
        data: encode_memo(message),
        chain_id,
    }
}

fn serialize_quantity<S: serde::Serializer>(value: &u64, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&format!("{value:#x}"))
}
