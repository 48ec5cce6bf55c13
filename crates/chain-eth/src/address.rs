use alloy_primitives::Address;
use sha3::{Digest, Keccak256};

use crate::error::EthError;

/// Validates an Ethereum address string.
///
/// Checks that the address has the correct format (0x + 40 hex characters).
/// If the address contains mixed case, the EIP-55 checksum is verified.
pub fn validate_address(address: &str) -> Result<bool, EthError> {
    let hex_part = strip_hex_prefix(address)?;

    if hex_part.len() != 40 {
        return Err(EthError::InvalidAddress(format!(
            "expected 40 hex characters, got {}",
            hex_part.len()
        )));
    }

    if !hex_part.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(EthError::InvalidAddress(
            "address contains non-hex characters".into(),
        ));
    }

    // All-lowercase or all-uppercase addresses carry no checksum.
    let is_all_lower = hex_part.chars().all(|c| !c.is_ascii_uppercase());
    let is_all_upper = hex_part.chars().all(|c| !c.is_ascii_lowercase());

    if is_all_lower || is_all_upper {
        return Ok(true);
    }

    let checksummed = checksum_address(&format!("0x{}", hex_part.to_lowercase()))?;
    Ok(&checksummed[2..] == hex_part)
}

/// Parses a 0x-prefixed address, rejecting malformed input and bad
/// mixed-case checksums.
pub fn parse_address(address: &str) -> Result<Address, EthError> {
    if !validate_address(address)? {
        return Err(EthError::InvalidAddress(format!(
            "checksum mismatch for {address}"
        )));
    }

    let bytes = hex::decode(strip_hex_prefix(address)?)
        .map_err(|e| EthError::InvalidAddress(format!("invalid hex: {e}")))?;

    Ok(Address::from_slice(&bytes))
}

/// Applies EIP-55 mixed-case checksum encoding to an Ethereum address.
///
/// The input may be in any case. Returns the checksummed version.
pub fn checksum_address(address: &str) -> Result<String, EthError> {
    let hex_part = strip_hex_prefix(address)?.to_lowercase();

    if hex_part.len() != 40 {
        return Err(EthError::InvalidAddress(format!(
            "expected 40 hex characters, got {}",
            hex_part.len()
        )));
    }

    if !hex_part.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(EthError::InvalidAddress(
            "address contains non-hex characters".into(),
        ));
    }

    // EIP-55: hash the lowercase hex address (without 0x).
    let hash = Keccak256::digest(hex_part.as_bytes());

    let mut checksummed = String::with_capacity(42);
    checksummed.push_str("0x");

    for (i, c) in hex_part.chars().enumerate() {
        let byte = hash[i / 2];
        let nibble = if i % 2 == 0 { byte >> 4 } else { byte & 0x0f };
        if c.is_ascii_alphabetic() && nibble >= 8 {
            checksummed.push(c.to_ascii_uppercase());
        } else {
            checksummed.push(c);
        }
    }

    Ok(checksummed)
}

/// Formats an address with its EIP-55 checksum.
pub fn to_checksum(address: &Address) -> String {
    let lower = format!("0x{}", hex::encode(address.as_slice()));
    // A 20-byte address always renders as 40 hex characters.
    checksum_address(&lower).unwrap_or(lower)
}

fn strip_hex_prefix(address: &str) -> Result<&str, EthError> {
    address
        .strip_prefix("0x")
        .or_else(|| address.strip_prefix("0X"))
        .ok_or_else(|| EthError::InvalidAddress("address must start with 0x".into()))
}
