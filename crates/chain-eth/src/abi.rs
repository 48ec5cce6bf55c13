//! Minimal ABI encoding and decoding for EVM contract calls.
//!
//! Covers exactly what balance reads need: static words (address, bool),
//! dynamic `bytes`, tuples and dynamic arrays, laid out with the standard
//! head/tail scheme. Results are read back word by word.

use alloy_primitives::{Address, U256};

use crate::error::EthError;

/// Size of a single ABI word in bytes.
pub const WORD: usize = 32;

/// A single ABI-encodable value.
#[derive(Debug, Clone)]
pub enum AbiParam {
    /// A 20-byte address, left-padded to 32 bytes.
    Address(Address),
    /// A boolean encoded as 0 or 1.
    Bool(bool),
    /// Dynamic `bytes`: length word followed by right-padded data.
    Bytes(Vec<u8>),
    /// A tuple of values; dynamic if any member is.
    Tuple(Vec<AbiParam>),
    /// A dynamic-length array `T[]`.
    Array(Vec<AbiParam>),
}

impl AbiParam {
    fn is_dynamic(&self) -> bool {
        match self {
            AbiParam::Bytes(_) | AbiParam::Array(_) => true,
            AbiParam::Tuple(items) => items.iter().any(AbiParam::is_dynamic),
            _ => false,
        }
    }

    /// Bytes this value occupies in the head of its enclosing sequence.
    fn head_size(&self) -> usize {
        match self {
            _ if self.is_dynamic() => WORD,
            AbiParam::Tuple(items) => items.iter().map(AbiParam::head_size).sum(),
            _ => WORD,
        }
    }

    fn encode(&self) -> Vec<u8> {
        match self {
            AbiParam::Address(addr) => {
                let mut word = [0u8; WORD];
                word[12..].copy_from_slice(addr.as_slice());
                word.to_vec()
            }
            AbiParam::Bool(flag) => {
                let mut word = [0u8; WORD];
                word[31] = u8::from(*flag);
                word.to_vec()
            }
            AbiParam::Bytes(bytes) => {
                let padded_len = bytes.len().div_ceil(WORD) * WORD;
                let mut out = Vec::with_capacity(WORD + padded_len);
                out.extend_from_slice(&usize_word(bytes.len()));
                out.extend_from_slice(bytes);
                out.resize(WORD + padded_len, 0);
                out
            }
            AbiParam::Tuple(items) => encode_params(items),
            AbiParam::Array(items) => {
                let mut out = usize_word(items.len()).to_vec();
                out.extend_from_slice(&encode_params(items));
                out
            }
        }
    }
}

/// Encodes a sequence of values with head/tail layout.
///
/// Dynamic values are replaced in the head by an offset (relative to the
/// start of the sequence) pointing at their encoding in the tail.
pub fn encode_params(params: &[AbiParam]) -> Vec<u8> {
    let head_size: usize = params.iter().map(AbiParam::head_size).sum();
    let mut head = Vec::with_capacity(head_size);
    let mut tail = Vec::new();

    for param in params {
        if param.is_dynamic() {
            head.extend_from_slice(&usize_word(head_size + tail.len()));
            tail.extend_from_slice(&param.encode());
        } else {
            head.extend_from_slice(&param.encode());
        }
    }

    head.extend_from_slice(&tail);
    head
}

/// Encodes a function call with the given 4-byte selector and parameters.
pub fn encode_function_call(selector: [u8; 4], params: &[AbiParam]) -> Vec<u8> {
    let encoded = encode_params(params);
    let mut data = Vec::with_capacity(4 + encoded.len());
    data.extend_from_slice(&selector);
    data.extend_from_slice(&encoded);
    data
}

/// Reads the 32-byte word at `offset`.
pub fn read_word(data: &[u8], offset: usize) -> Result<[u8; WORD], EthError> {
    let end = offset
        .checked_add(WORD)
        .filter(|end| *end <= data.len())
        .ok_or_else(|| {
            EthError::EncodingError(format!(
                "word at offset {offset} exceeds {} bytes of data",
                data.len()
            ))
        })?;

    let mut word = [0u8; WORD];
    word.copy_from_slice(&data[offset..end]);
    Ok(word)
}

/// Reads the word at `offset` as a uint256.
pub fn read_uint256(data: &[u8], offset: usize) -> Result<U256, EthError> {
    Ok(U256::from_be_bytes(read_word(data, offset)?))
}

/// Reads the word at `offset` as an offset or length.
pub fn read_usize(data: &[u8], offset: usize) -> Result<usize, EthError> {
    let value = read_uint256(data, offset)?;
    usize::try_from(value)
        .map_err(|_| EthError::EncodingError(format!("length {value} does not fit in usize")))
}

/// Reads dynamic `bytes` whose length word starts at `offset`.
pub fn read_bytes(data: &[u8], offset: usize) -> Result<Vec<u8>, EthError> {
    let len = read_usize(data, offset)?;
    let start = offset + WORD;
    let end = start
        .checked_add(len)
        .filter(|end| *end <= data.len())
        .ok_or_else(|| EthError::EncodingError(format!("bytes of length {len} truncated")))?;
    Ok(data[start..end].to_vec())
}

fn usize_word(value: usize) -> [u8; WORD] {
    U256::from(value).to_be_bytes::<32>()
}
