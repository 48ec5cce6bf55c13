//! Chain-agnostic wallet abstraction.
//!
//! A [`Wallet`] hides one injected provider behind connect / disconnect /
//! submit. Submission drives the shared [`InscriptionFsm`] and always leaves
//! it in a terminal state once the call returns.

pub mod evm;
pub mod registry;
pub mod svm;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chain_eth::{EvmRpc, HttpEvmRpc};
use chain_sol::{HttpSolanaRpc, SolanaRpc};
use serde::Serialize;

use crate::config::PortfolioConfig;
use crate::error::PortfolioError;
use crate::fsm::InscriptionFsm;
use crate::types::{ChainDescriptor, ChainType};

/// Static identity of a wallet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WalletInfo {
    pub id: String,
    pub name: String,
    pub icon: String,
}

#[async_trait]
pub trait Wallet: Send + Sync {
    fn info(&self) -> &WalletInfo;
    fn chain_type(&self) -> ChainType;

    /// The provider was found in the host environment.
    fn is_detected(&self) -> bool;
    fn is_connected(&self) -> bool;

    /// Live address, `None` unless connected.
    fn address(&self) -> Option<String>;

    /// No-op when the provider is not detected.
    async fn connect(&self) -> Result<(), PortfolioError>;
    async fn disconnect(&self) -> Result<(), PortfolioError>;

    /// Inscribes `message` on the family's test network and returns the
    /// transaction id once confirmed. Every failure yields `None`; the
    /// inscription state machine says which kind.
    async fn submit_message_to_chain(&self, message: &str) -> Option<String>;
}

/// Point-in-time view of a wallet for rendering.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WalletHandle {
    pub id: String,
    pub name: String,
    pub icon: String,
    pub chain_type: ChainType,
    pub address: Option<String>,
    pub is_detected: bool,
    pub is_connected: bool,
    pub chains: Vec<ChainDescriptor>,
}

/// A wallet together with the chains of its family.
#[derive(Clone)]
pub struct Account {
    pub wallet: Arc<dyn Wallet>,
    pub chains: Vec<ChainDescriptor>,
}

impl Account {
    /// Reads the wallet's live state; do not cache the result.
    pub fn handle(&self) -> WalletHandle {
        let info = self.wallet.info();
        WalletHandle {
            id: info.id.clone(),
            name: info.name.clone(),
            icon: info.icon.clone(),
            chain_type: self.wallet.chain_type(),
            address: self.wallet.address(),
            is_detected: self.wallet.is_detected(),
            is_connected: self.wallet.is_connected(),
            chains: self.chains.clone(),
        }
    }
}

impl std::fmt::Debug for Account {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Account")
            .field("wallet", self.wallet.info())
            .field("chains", &self.chains.len())
            .finish()
    }
}

/// What the wallets need to submit: the shared state machine and the test
/// network endpoints used to confirm.
#[derive(Clone)]
pub struct WalletServices {
    pub fsm: Arc<InscriptionFsm>,
    /// Sepolia, for receipts.
    pub evm_rpc: Arc<dyn EvmRpc>,
    /// Solana devnet, for blockhashes, broadcast and confirmation.
    pub svm_rpc: Arc<dyn SolanaRpc>,
    pub poll_interval: Duration,
    pub confirmation_timeout: Duration,
}

impl WalletServices {
    pub fn from_config(config: &PortfolioConfig, fsm: Arc<InscriptionFsm>) -> Self {
        let client = reqwest::Client::new();
        Self {
            fsm,
            evm_rpc: Arc::new(HttpEvmRpc::with_client(
                config.sepolia_rpc_url.clone(),
                client.clone(),
            )),
            svm_rpc: Arc::new(HttpSolanaRpc::with_client(
                config.solana_devnet_rpc_url.clone(),
                client,
            )),
            poll_interval: config.confirmation_poll_interval,
            confirmation_timeout: config.confirmation_timeout,
        }
    }
}

/// Routes the outcome of a started submission into the state machine.
///
/// `Ok` confirms when the machine is waiting for confirmation. A user
/// rejection goes to `rejected`, anything else to `failed`. If the machine
/// would still be mid-flow afterwards (a rejection arriving before the
/// signature step), it is forced to `failed`.
pub(crate) fn finish_submission(
    fsm: &InscriptionFsm,
    wallet: &str,
    outcome: Result<String, PortfolioError>,
) -> Option<String> {
    let tx_id = match outcome {
        Ok(tx_id) if fsm.confirmed() => {
            log::info!("{wallet}: inscription confirmed in {tx_id}");
            Some(tx_id)
        }
        Ok(tx_id) => {
            log::error!("{wallet}: {tx_id} confirmed out of order in {}", fsm.state());
            None
        }
        Err(e) if e.is_rejection() => {
            log::info!("{wallet}: inscription rejected by user");
            fsm.rejected();
            None
        }
        Err(e) => {
            log::error!("{wallet}: inscription failed: {e}");
            fsm.error();
            None
        }
    };

    if !fsm.state().is_terminal() {
        fsm.error();
    }
    tx_id
}
