use serde::Serialize;

/// Definition of an EVM-compatible network the wallet can be pointed at.
#[derive(Debug, Clone, Serialize)]
pub struct EvmChain {
    pub chain_id: u64,
    pub name: &'static str,
    pub currency_name: &'static str,
    pub symbol: &'static str,
    pub decimals: u8,
    pub rpc_url: &'static str,
    pub explorer_url: &'static str,
    pub is_testnet: bool,
}

/// Sepolia Testnet (chain ID 11155111). Inscriptions for EVM wallets land here.
pub const SEPOLIA: EvmChain = EvmChain {
    chain_id: 11155111,
    name: "Sepolia",
    currency_name: "Sepolia Ether",
    symbol: "ETH",
    decimals: 18,
    rpc_url: "https://ethereum-sepolia-rpc.publicnode.com",
    explorer_url: "https://sepolia.etherscan.io",
    is_testnet: true,
};

/// Native currency block of `wallet_addEthereumChain`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NativeCurrency {
    pub name: String,
    pub symbol: String,
    pub decimals: u8,
}

/// Parameters for `wallet_addEthereumChain` (EIP-3085).
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AddChainParams {
    /// Hex-encoded chain id, e.g. `0xaa36a7`.
    pub chain_id: String,
    pub chain_name: String,
    pub native_currency: NativeCurrency,
    pub rpc_urls: Vec<String>,
    pub block_explorer_urls: Vec<String>,
}

impl EvmChain {
    /// `wallet_addEthereumChain` parameters for this network.
    pub fn add_chain_params(&self) -> AddChainParams {
        AddChainParams {
            chain_id: format!("{:#x}", self.chain_id),
            chain_name: self.name.to_string(),
            native_currency: NativeCurrency {
                name: self.currency_name.to_string(),
                symbol: self.symbol.to_string(),
                decimals: self.decimals,
            },
            rpc_urls: vec![self.rpc_url.to_string()],
            block_explorer_urls: vec![self.explorer_url.to_string()],
        }
    }

    /// Block explorer link for a transaction hash.
    pub fn transaction_url(&self, tx_hash: &str) -> String {
        format!("{}/tx/{}", self.explorer_url, tx_hash)
    }
}
