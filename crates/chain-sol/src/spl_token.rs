//! SPL Token program id and the `jsonParsed` token-account shape.

use serde::Deserialize;

use crate::error::SolError;

/// SPL Token Program ID: `TokenkegQfeZyiNwAJbNbGKPFXCWuBvf9Ss623VQ5DA`
pub const TOKEN_PROGRAM_ID: [u8; 32] = [
    0x06, 0xdd, 0xf6, 0xe1, 0xd7, 0x65, 0xa1, 0x93, 0xd9, 0xcb, 0xe1, 0x46, 0xce, 0xeb, 0x79,
    0xac, 0x1c, 0xb4, 0x85, 0xed, 0x5f, 0x5b, 0x37, 0x91, 0x3a, 0x8c, 0xf5, 0x85, 0x7e, 0xff,
    0x00, 0xa9,
];

/// A token account owned by a wallet, flattened from the RPC's parsed form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedTokenAccount {
    /// Address of the token account itself.
    pub pubkey: String,
    /// Mint the account holds.
    pub mint: String,
    /// Balance in base units, as the decimal string the RPC reports.
    pub amount: String,
    pub decimals: u8,
}

// Wire shapes of one `getTokenAccountsByOwner` entry with jsonParsed encoding.

#[derive(Debug, Deserialize)]
pub(crate) struct KeyedAccount {
    pub pubkey: String,
    pub account: AccountWrapper,
}

#[derive(Debug, Deserialize)]
pub(crate) struct AccountWrapper {
    pub data: ParsedData,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ParsedData {
    pub parsed: ParsedAccount,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ParsedAccount {
    pub info: TokenAccountInfo,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct TokenAccountInfo {
    pub mint: String,
    pub token_amount: TokenAmount,
}

#[derive(Debug, Deserialize)]
pub(crate) struct TokenAmount {
    pub amount: String,
    pub decimals: u8,
}

impl TryFrom<KeyedAccount> for ParsedTokenAccount {
    type Error = SolError;

    fn try_from(keyed: KeyedAccount) -> Result<Self, Self::Error> {
        let info = keyed.account.data.parsed.info;
        let amount = info.token_amount.amount;
        if amount.is_empty() || !amount.bytes().all(|b| b.is_ascii_digit()) {
            return Err(SolError::InvalidResponse(format!(
                "token account {} has non-integer amount {amount:?}",
                keyed.pubkey
            )));
        }

        Ok(ParsedTokenAccount {
            pubkey: keyed.pubkey,
            mint: info.mint,
            amount,
            decimals: info.token_amount.decimals,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::address;

    const KEYED_ACCOUNT: &str = r#"{
        "pubkey": "C2gJg6tKpQs41PRS1nC8aw3ZKNZK3HQQZGVrDFDup5nx",
        "account": {
            "data": {
                "program": "spl-token",
                "parsed": {
                    "type": "account",
                    "info": {
                        "isNative": false,
                        "mint": "EPjFWdd5AufqSSqeM2qN1xzybapC8G4wEGGkZwyTDt1v",
                        "owner": "4Qkev8aNZcqFNSRhQzwyLMFSsi94jHqE8WNVTJzTP99F",
                        "state": "initialized",
                        "tokenAmount": {
                            "amount": "2000000",
                            "decimals": 6,
                            "uiAmount": 2.0,
                            "uiAmountString": "2"
                        }
                    }
                },
                "space": 165
            },
            "executable": false,
            "lamports": 2039280,
            "owner": "TokenkegQfeZyiNwAJbNbGKPFXCWuBvf9Ss623VQ5DA",
            "rentEpoch": 361
        }
    }"#;

    #[test]
    fn token_program_id_roundtrip() {
        let addr = address::bytes_to_address(&TOKEN_PROGRAM_ID);
        assert_eq!(addr, "TokenkegQfeZyiNwAJbNbGKPFXCWuBvf9Ss623VQ5DA");
    }

    #[test]
    fn parses_json_parsed_account() {
        let keyed: KeyedAccount = serde_json::from_str(KEYED_ACCOUNT).unwrap();
        let account = ParsedTokenAccount::try_from(keyed).unwrap();

        assert_eq!(account.mint, "EPjFWdd5AufqSSqeM2qN1xzybapC8G4wEGGkZwyTDt1v");
        assert_eq!(account.amount, "2000000");
        assert_eq!(account.decimals, 6);
    }

    #[test]
    fn rejects_non_integer_amount() {
        let raw = KEYED_ACCOUNT.replace(r#""amount": "2000000""#, r#""amount": "2.5""#);
        let keyed: KeyedAccount = serde_json::from_str(&raw).unwrap();
        assert!(ParsedTokenAccount::try_from(keyed).is_err());
    }
}
