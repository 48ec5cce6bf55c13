//! Solana address handling.
//!
//! A Solana address is the Base58 encoding of a raw 32-byte Ed25519 public
//! key; there is no hashing step and no checksum.

use crate::error::SolError;

/// Decode a Solana address string to its 32-byte representation.
pub fn address_to_bytes(address: &str) -> Result<[u8; 32], SolError> {
    if address.is_empty() {
        return Err(SolError::InvalidAddress("empty address".into()));
    }

    let bytes = bs58::decode(address)
        .into_vec()
        .map_err(|e| SolError::InvalidAddress(format!("base58 decode failed: {e}")))?;

    bytes.try_into().map_err(|v: Vec<u8>| {
        SolError::InvalidAddress(format!("expected 32 bytes, got {}", v.len()))
    })
}

/// Encode 32 bytes as a Solana address (Base58 string).
pub fn bytes_to_address(bytes: &[u8; 32]) -> String {
    bs58::encode(bytes).into_string()
}

/// Returns `Ok(true)` for a well-formed address, or the decode error.
pub fn validate_address(address: &str) -> Result<bool, SolError> {
    address_to_bytes(address).map(|_| true)
}
