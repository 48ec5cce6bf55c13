//! Wallet portfolio inscriber core.
//!
//! - `fsm`: the inscription lifecycle state machine and its subscribers
//! - `wallet`: chain-agnostic wallets with EVM and SVM adapters
//! - `balances`: per-chain native and token balance reads
//! - `portfolio`: merging with the directory, ranking, proof-of-balance text
//! - `directory`: chain and token metadata

pub mod amount;
pub mod balances;
pub mod config;
pub mod directory;
pub mod error;
pub mod fsm;
pub mod portfolio;
pub mod types;
pub mod wallet;

pub use balances::{BalanceEngine, HttpConnector, RpcConnector};
pub use config::{NativeDecimals, PortfolioConfig};
pub use directory::{CachedDirectory, ChainDirectory, LifiDirectory};
pub use error::{PortfolioError, ProviderError};
pub use fsm::{InscriptionEvent, InscriptionFsm, InscriptionState, SubscriptionId};
pub use portfolio::{proof_of_balance_message, transaction_url};
pub use types::{BalanceResult, ChainBalanceResult, ChainDescriptor, ChainType, TokenDescriptor};
pub use wallet::registry::{detect_accounts, ProviderEnvironment, KNOWN_WALLETS};
pub use wallet::{Account, Wallet, WalletHandle, WalletInfo, WalletServices};
