//! Data model shared by the directory, the balance engine and the wallets.
//!
//! Chain and token descriptors mirror the directory's JSON so they can be
//! deserialized directly; results serialize in the same camelCase shape.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Transaction-model family of a chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChainType {
    #[serde(rename = "EVM")]
    Evm,
    #[serde(rename = "SVM")]
    Svm,
}

impl ChainType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChainType::Evm => "EVM",
            ChainType::Svm => "SVM",
        }
    }
}

impl fmt::Display for ChainType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A fungible token (or a chain's native asset) as listed by the directory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenDescriptor {
    pub address: String,
    pub symbol: String,
    #[serde(default)]
    pub name: String,
    pub decimals: u8,
    #[serde(default)]
    pub chain_id: u64,
    /// Price as reported; may be absent, empty or non-numeric.
    #[serde(
        default,
        rename = "priceUSD",
        deserialize_with = "price_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub price_usd: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coin_key: Option<String>,
    #[serde(default, rename = "logoURI", skip_serializing_if = "Option::is_none")]
    pub logo_uri: Option<String>,
}

/// MetaMask network block carried by each directory chain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetamaskConfig {
    #[serde(default)]
    pub chain_id: String,
    #[serde(default)]
    pub chain_name: String,
    #[serde(default)]
    pub block_explorer_urls: Vec<String>,
    #[serde(default)]
    pub rpc_urls: Vec<String>,
}

/// A chain supported by the directory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainDescriptor {
    pub key: String,
    pub chain_type: ChainType,
    pub id: u64,
    pub name: String,
    #[serde(default)]
    pub coin: String,
    #[serde(default)]
    pub mainnet: bool,
    #[serde(default, rename = "logoURI", skip_serializing_if = "Option::is_none")]
    pub logo_uri: Option<String>,
    pub native_token: TokenDescriptor,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metamask: Option<MetamaskConfig>,
    /// Multicall3 deployment (EVM only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub multicall_address: Option<String>,
}

impl ChainDescriptor {
    pub fn rpc_urls(&self) -> &[String] {
        self.metamask
            .as_ref()
            .map(|m| m.rpc_urls.as_slice())
            .unwrap_or(&[])
    }
}

/// One row of a portfolio: a token (or the native asset) and its value.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BalanceResult {
    pub token: Option<TokenDescriptor>,
    pub symbol: String,
    /// Decimal string in whole units; `None` when the read failed.
    pub amount: Option<String>,
    pub usd_value: Option<f64>,
}

/// Outcome of one balance fetch cycle for a chain and address.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainBalanceResult {
    pub native_amount: Option<String>,
    #[serde(rename = "nativeUSD")]
    pub native_usd: Option<f64>,
    pub token_balances: Vec<BalanceResult>,
    #[serde(rename = "tokenUSD")]
    pub token_usd: Option<f64>,
    #[serde(rename = "totalUSD")]
    pub total_usd: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub native_error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_error: Option<String>,
}

// Prices arrive as strings, but some entries carry bare numbers or null.
fn price_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::String(s)) => Some(s),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}
