//! Balance aggregation engine.
//!
//! Per-family fetchers live in [`evm`] and [`svm`]. Each returns a
//! structured result instead of an error so that a failed native read and a
//! failed token read degrade independently.

pub mod evm;
pub mod svm;

use std::sync::Arc;

use chain_eth::{EvmRpc, HttpEvmRpc};
use chain_sol::{HttpSolanaRpc, SolanaRpc};

use crate::config::{NativeDecimals, PortfolioConfig};
use crate::directory::ChainDirectory;
use crate::error::PortfolioError;
use crate::portfolio;
use crate::types::{BalanceResult, ChainBalanceResult, ChainDescriptor, ChainType, TokenDescriptor};

pub(crate) const INVALID_INPUT: &str = "Invalid or missing input parameters.";
pub(crate) const MISSING_WALLET_ADDRESS: &str = "Missing wallet address.";
pub(crate) const NO_TOKENS: &str = "No tokens provided.";
pub(crate) const NO_MULTICALL: &str = "No multicall address provided.";

/// Native-asset balance of one address.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NativeBalance {
    pub amount: Option<String>,
    pub usd: Option<f64>,
    pub error: Option<String>,
}

impl NativeBalance {
    pub(crate) fn failed(error: &PortfolioError) -> Self {
        Self {
            amount: None,
            usd: None,
            error: Some(error.to_string()),
        }
    }
}

/// Non-zero token balances of one address.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TokenBalances {
    pub balances: Vec<BalanceResult>,
    pub total_usd: f64,
    pub error: Option<String>,
}

impl TokenBalances {
    pub(crate) fn failed(error: &PortfolioError) -> Self {
        Self {
            balances: Vec::new(),
            total_usd: 0.0,
            error: Some(error.to_string()),
        }
    }

    pub(crate) fn from_balances(balances: Vec<BalanceResult>) -> Self {
        let total_usd = balances.iter().filter_map(|b| b.usd_value).sum();
        Self {
            balances,
            total_usd,
            error: None,
        }
    }
}

impl ChainBalanceResult {
    /// Combines the two halves of a fetch cycle.
    ///
    /// A failed token read still contributes `tokenUSD = 0`; the total is
    /// unknown only when both halves failed.
    pub fn from_parts(native: NativeBalance, tokens: TokenBalances) -> Self {
        let total_usd = if native.error.is_some() && tokens.error.is_some() {
            None
        } else {
            Some(native.usd.unwrap_or(0.0) + tokens.total_usd)
        };

        Self {
            native_amount: native.amount,
            native_usd: native.usd,
            token_balances: tokens.balances,
            token_usd: Some(tokens.total_usd),
            total_usd,
            native_error: native.error,
            token_error: tokens.error,
        }
    }

    pub(crate) fn failed(error: &PortfolioError) -> Self {
        Self::from_parts(NativeBalance::failed(error), TokenBalances::failed(error))
    }
}

/// Hands out RPC clients for a chain.
pub trait RpcConnector: Send + Sync {
    fn evm(&self, chain: &ChainDescriptor) -> Result<Arc<dyn EvmRpc>, PortfolioError>;
    fn svm(&self, chain: &ChainDescriptor) -> Result<Arc<dyn SolanaRpc>, PortfolioError>;
}

/// Connects over HTTP: EVM chains through their first listed RPC URL,
/// Solana through the configured read endpoint.
#[derive(Debug, Clone)]
pub struct HttpConnector {
    client: reqwest::Client,
    solana_rpc_url: String,
}

impl HttpConnector {
    pub fn new(config: &PortfolioConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            solana_rpc_url: config.solana_rpc_url.clone(),
        }
    }
}

impl RpcConnector for HttpConnector {
    fn evm(&self, chain: &ChainDescriptor) -> Result<Arc<dyn EvmRpc>, PortfolioError> {
        let url = chain
            .rpc_urls()
            .first()
            .ok_or_else(|| PortfolioError::Validation(INVALID_INPUT.into()))?;
        Ok(Arc::new(HttpEvmRpc::with_client(url.clone(), self.client.clone())))
    }

    fn svm(&self, _chain: &ChainDescriptor) -> Result<Arc<dyn SolanaRpc>, PortfolioError> {
        Ok(Arc::new(HttpSolanaRpc::with_client(
            self.solana_rpc_url.clone(),
            self.client.clone(),
        )))
    }
}

/// Fetches balances for any supported chain.
pub struct BalanceEngine {
    connector: Arc<dyn RpcConnector>,
    native_decimals: NativeDecimals,
}

impl BalanceEngine {
    pub fn new(connector: Arc<dyn RpcConnector>) -> Self {
        Self {
            connector,
            native_decimals: NativeDecimals::default(),
        }
    }

    pub fn from_config(config: &PortfolioConfig) -> Self {
        Self::new(Arc::new(HttpConnector::new(config))).with_native_decimals(config.native_decimals)
    }

    pub fn with_native_decimals(mut self, native_decimals: NativeDecimals) -> Self {
        self.native_decimals = native_decimals;
        self
    }

    /// One fetch cycle: native and token balances read concurrently.
    pub async fn fetch_chain_balances(
        &self,
        chain: &ChainDescriptor,
        address: &str,
        tokens: &[TokenDescriptor],
    ) -> ChainBalanceResult {
        let result = match chain.chain_type {
            ChainType::Evm => self.fetch_evm(chain, address, tokens).await,
            ChainType::Svm => self.fetch_svm(chain, address, tokens).await,
        };

        log::info!(
            "{} balances for {}: native={:?} tokens={} total={:?}",
            chain.name,
            address,
            result.native_amount,
            result.token_balances.len(),
            result.total_usd
        );
        result
    }

    async fn fetch_evm(
        &self,
        chain: &ChainDescriptor,
        address: &str,
        tokens: &[TokenDescriptor],
    ) -> ChainBalanceResult {
        let rpc = match self.connector.evm(chain) {
            Ok(rpc) => rpc,
            Err(e) => {
                log::error!("No RPC for {}: {e}", chain.name);
                return ChainBalanceResult::failed(&e);
            }
        };

        let (native, tokens) = futures::join!(
            evm::fetch_native_balance(rpc.as_ref(), chain, address, self.native_decimals),
            evm::fetch_erc20_balances(rpc.as_ref(), chain, address, tokens),
        );
        ChainBalanceResult::from_parts(native, tokens)
    }

    async fn fetch_svm(
        &self,
        chain: &ChainDescriptor,
        address: &str,
        tokens: &[TokenDescriptor],
    ) -> ChainBalanceResult {
        let rpc = match self.connector.svm(chain) {
            Ok(rpc) => rpc,
            Err(e) => {
                log::error!("No RPC for {}: {e}", chain.name);
                return ChainBalanceResult::failed(&e);
            }
        };

        let (native, tokens) = futures::join!(
            svm::fetch_native_balance(rpc.as_ref(), chain, address),
            svm::fetch_spl_balances(rpc.as_ref(), address, tokens),
        );
        ChainBalanceResult::from_parts(native, tokens)
    }

    /// Directory tokens, balances, then the ranked portfolio view.
    pub async fn load_portfolio(
        &self,
        directory: &dyn ChainDirectory,
        chain: &ChainDescriptor,
        address: &str,
    ) -> ChainBalanceResult {
        let tokens = directory.tokens(chain.id, chain.chain_type).await;
        let result = self.fetch_chain_balances(chain, address, &tokens).await;
        portfolio::assemble(chain, &tokens, result)
    }
}
