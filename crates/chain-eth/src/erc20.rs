use alloy_primitives::{Address, U256};

use crate::abi::{encode_function_call, read_uint256, AbiParam};
use crate::error::EthError;

/// Function selector for `balanceOf(address)`: `0x70a08231`.
pub const BALANCE_OF_SELECTOR: [u8; 4] = [0x70, 0xa0, 0x82, 0x31];

/// Encodes an ERC-20 `balanceOf(address)` call.
///
/// The result is the complete calldata: 4-byte selector plus the
/// ABI-encoded owner address (36 bytes).
pub fn encode_balance_of(owner: &Address) -> Vec<u8> {
    encode_function_call(BALANCE_OF_SELECTOR, &[AbiParam::Address(*owner)])
}

/// Decodes the uint256 returned by `balanceOf`.
///
/// Extra trailing bytes are ignored; fewer than 32 bytes is an error.
pub fn decode_balance(data: &[u8]) -> Result<U256, EthError> {
    read_uint256(data, 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::address::parse_address;

    #[test]
    fn encode_balance_of_correct_selector() {
        let owner = parse_address("0x000000000000000000000000000000000000dEaD").unwrap();
        let data = encode_balance_of(&owner);

        assert_eq!(hex::encode(&data[..4]), "70a08231");
    }

    #[test]
    fn encode_balance_of_correct_length() {
        let owner = parse_address("0x000000000000000000000000000000000000dEaD").unwrap();
        let data = encode_balance_of(&owner);

        // 4 (selector) + 32 (address) = 36 bytes.
        assert_eq!(data.len(), 36);
        assert_eq!(&data[4..16], &[0u8; 12]);
        assert_eq!(data[34], 0xde);
        assert_eq!(data[35], 0xad);
    }

    #[test]
    fn selector_matches_keccak_of_signature() {
        use sha3::{Digest, Keccak256};
        let hash = Keccak256::digest(b"balanceOf(address)");
        assert_eq!(&hash[..4], &BALANCE_OF_SELECTOR);
    }

    #[test]
    fn decode_balance_valid() {
        let mut data = [0u8; 32];
        data[29] = 0x0f;
        data[30] = 0x42;
        data[31] = 0x40;

        assert_eq!(decode_balance(&data).unwrap(), U256::from(1_000_000u64));
    }

    #[test]
    fn decode_balance_ignores_extra_bytes() {
        let mut data = vec![0u8; 64];
        data[31] = 42;
        data[63] = 99;

        assert_eq!(decode_balance(&data).unwrap(), U256::from(42u64));
    }

    #[test]
    fn decode_balance_too_short() {
        assert!(decode_balance(&[0u8; 16]).is_err());
    }
}
