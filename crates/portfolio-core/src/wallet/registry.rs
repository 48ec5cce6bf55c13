//! Known wallets and their detection.

use std::sync::Arc;

use super::evm::{EvmSession, EvmWallet};
use super::svm::{SolanaProvider, SvmWallet};
use super::{Account, Wallet, WalletInfo, WalletServices};
use crate::directory::ChainDirectory;
use crate::types::ChainType;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KnownWallet {
    pub id: &'static str,
    pub name: &'static str,
    pub icon: &'static str,
    pub chain_type: ChainType,
}

impl KnownWallet {
    pub fn info(&self) -> WalletInfo {
        WalletInfo {
            id: self.id.to_string(),
            name: self.name.to_string(),
            icon: self.icon.to_string(),
        }
    }
}

pub const KNOWN_WALLETS: &[KnownWallet] = &[
    KnownWallet {
        id: "io.metamask",
        name: "Metamask",
        icon: "/wallets/metamask-wallet.png",
        chain_type: ChainType::Evm,
    },
    KnownWallet {
        id: "app.phantom",
        name: "Phantom EVM",
        icon: "/wallets/phantom-wallet.png",
        chain_type: ChainType::Evm,
    },
    KnownWallet {
        id: "phantomsvm",
        name: "Phantom SVM",
        icon: "/wallets/phantom-wallet.png",
        chain_type: ChainType::Svm,
    },
];

/// What the host environment has injected.
pub trait ProviderEnvironment: Send + Sync {
    /// The session shared by every EVM connector.
    fn evm_session(&self) -> Arc<dyn EvmSession>;

    /// An EIP-6963 provider announced itself under `id`.
    fn evm_provider_present(&self, id: &str) -> bool;

    fn solana_provider(&self, id: &str) -> Option<Arc<dyn SolanaProvider>>;
}

/// One adapter per known wallet, detected or not.
pub fn build_wallets(
    env: &dyn ProviderEnvironment,
    services: &WalletServices,
) -> Vec<Arc<dyn Wallet>> {
    KNOWN_WALLETS
        .iter()
        .map(|known| -> Arc<dyn Wallet> {
            match known.chain_type {
                ChainType::Evm => Arc::new(EvmWallet::new(
                    known.info(),
                    env.evm_provider_present(known.id),
                    env.evm_session(),
                    services.clone(),
                )),
                ChainType::Svm => Arc::new(SvmWallet::new(
                    known.info(),
                    env.solana_provider(known.id),
                    services.clone(),
                )),
            }
        })
        .collect()
}

/// Builds the wallets and pairs each with its family's chains.
///
/// Chain lists come from `directory`; an unreachable directory leaves the
/// accounts with no chains rather than failing.
pub async fn detect_accounts(
    env: &dyn ProviderEnvironment,
    services: &WalletServices,
    directory: &dyn ChainDirectory,
) -> Vec<Account> {
    let (evm_chains, svm_chains) = futures::join!(
        directory.chains(ChainType::Evm),
        directory.chains(ChainType::Svm)
    );

    build_wallets(env, services)
        .into_iter()
        .map(|wallet| {
            let chains = match wallet.chain_type() {
                ChainType::Evm => evm_chains.clone(),
                ChainType::Svm => svm_chains.clone(),
            };
            log::debug!(
                "{}: detected={} chains={}",
                wallet.info().name,
                wallet.is_detected(),
                chains.len()
            );
            Account { wallet, chains }
        })
        .collect()
}
