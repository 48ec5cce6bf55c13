//! Runtime configuration.
//!
//! Defaults point at public endpoints; each can be overridden from the
//! environment:
//!
//! - `DIRECTORY_URL`: chain/token directory base URL
//! - `SOLANA_RPC_URL`: Solana endpoint for balance reads
//! - `SOLANA_DEVNET_RPC_URL`: Solana endpoint inscriptions are sent to
//! - `SEPOLIA_RPC_URL`: Sepolia endpoint for receipt polling
//! - `CONFIRMATION_TIMEOUT_SECS`: how long to wait for confirmation
//! - `CONFIRMATION_POLL_MS`: delay between confirmation polls

use std::env;
use std::time::Duration;

use chain_eth::chains::SEPOLIA;

pub const DEFAULT_DIRECTORY_URL: &str = "https://li.quest/v1";
pub const DEFAULT_SOLANA_RPC_URL: &str = "https://solana-rpc.publicnode.com";
pub const DEFAULT_SOLANA_DEVNET_RPC_URL: &str = "https://api.devnet.solana.com";

/// Decimals used to scale EVM native balances.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum NativeDecimals {
    /// Always 18, regardless of what the chain declares.
    #[default]
    Fixed18,
    /// The native token's declared decimals.
    FromChain,
}

impl NativeDecimals {
    pub fn resolve(&self, declared: u8) -> u8 {
        match self {
            NativeDecimals::Fixed18 => 18,
            NativeDecimals::FromChain => declared,
        }
    }
}

#[derive(Debug, Clone)]
pub struct PortfolioConfig {
    pub directory_url: String,
    pub solana_rpc_url: String,
    pub solana_devnet_rpc_url: String,
    pub sepolia_rpc_url: String,
    pub confirmation_timeout: Duration,
    pub confirmation_poll_interval: Duration,
    pub native_decimals: NativeDecimals,
}

impl Default for PortfolioConfig {
    fn default() -> Self {
        Self {
            directory_url: DEFAULT_DIRECTORY_URL.to_string(),
            solana_rpc_url: DEFAULT_SOLANA_RPC_URL.to_string(),
            solana_devnet_rpc_url: DEFAULT_SOLANA_DEVNET_RPC_URL.to_string(),
            sepolia_rpc_url: SEPOLIA.rpc_url.to_string(),
            confirmation_timeout: Duration::from_secs(120),
            confirmation_poll_interval: Duration::from_millis(2000),
            native_decimals: NativeDecimals::default(),
        }
    }
}

impl PortfolioConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        let url = |key: &str, target: &mut String| {
            if let Some(value) = lookup(key).filter(|v| !v.trim().is_empty()) {
                log::info!("{key} = {value}");
                *target = value.trim().to_string();
            }
        };
        url("DIRECTORY_URL", &mut config.directory_url);
        url("SOLANA_RPC_URL", &mut config.solana_rpc_url);
        url("SOLANA_DEVNET_RPC_URL", &mut config.solana_devnet_rpc_url);
        url("SEPOLIA_RPC_URL", &mut config.sepolia_rpc_url);

        let number = |key: &str| -> Option<u64> {
            let raw = lookup(key)?;
            match raw.trim().parse::<u64>() {
                Ok(n) if n > 0 => Some(n),
                _ => {
                    log::warn!("Ignoring {key}={raw:?}, expected a positive integer");
                    None
                }
            }
        };
        if let Some(secs) = number("CONFIRMATION_TIMEOUT_SECS") {
            config.confirmation_timeout = Duration::from_secs(secs);
        }
        if let Some(ms) = number("CONFIRMATION_POLL_MS") {
            config.confirmation_poll_interval = Duration::from_millis(ms);
        }

        config
    }
}
