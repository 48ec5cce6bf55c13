//! EVM wallet adapter.
//!
//! EVM wallets share one session (a single active connector at a time); a
//! wallet counts as connected only while it is the active connector and the
//! session reports connected. Inscriptions are zero-value transfers to the
//! zero address on Sepolia with the memo as calldata.

use std::sync::Arc;

use async_trait::async_trait;
use chain_eth::address::to_checksum;
use chain_eth::chains::{AddChainParams, EvmChain, SEPOLIA};
use chain_eth::rpc::wait_for_receipt;
use chain_eth::transaction::{memo_transaction, TransactionRequest};
use chain_eth::{Address, B256};

use super::{finish_submission, Wallet, WalletInfo, WalletServices};
use crate::error::{PortfolioError, ProviderError};
use crate::types::ChainType;

/// Signing side of the active connector.
#[async_trait]
pub trait EvmSigner: Send + Sync {
    /// `wallet_switchEthereumChain`
    async fn switch_chain(&self, chain_id: u64) -> Result<(), ProviderError>;

    /// `wallet_addEthereumChain`
    async fn add_chain(&self, params: &AddChainParams) -> Result<(), ProviderError>;

    /// Signs and broadcasts; returns the transaction hash.
    async fn send_transaction(&self, tx: &TransactionRequest) -> Result<B256, ProviderError>;
}

/// The shared multi-wallet EVM session.
#[async_trait]
pub trait EvmSession: Send + Sync {
    /// Id of the connector currently in use, if any.
    fn active_connector(&self) -> Option<String>;
    fn is_connected(&self) -> bool;
    fn account(&self) -> Option<Address>;

    async fn connect(&self, connector_id: &str) -> Result<(), ProviderError>;
    async fn disconnect(&self) -> Result<(), ProviderError>;

    /// Signer for the active connector.
    async fn signer(&self) -> Option<Arc<dyn EvmSigner>>;
}

pub struct EvmWallet {
    info: WalletInfo,
    detected: bool,
    session: Arc<dyn EvmSession>,
    services: WalletServices,
    target: EvmChain,
}

impl EvmWallet {
    pub fn new(
        info: WalletInfo,
        detected: bool,
        session: Arc<dyn EvmSession>,
        services: WalletServices,
    ) -> Self {
        Self {
            info,
            detected,
            session,
            services,
            target: SEPOLIA,
        }
    }

    fn is_active(&self) -> bool {
        self.session.active_connector().as_deref() == Some(self.info.id.as_str())
    }

    async fn ensure_target_chain(&self, signer: &dyn EvmSigner) -> Result<(), PortfolioError> {
        let chain_id = self.target.chain_id;
        match signer.switch_chain(chain_id).await {
            Ok(()) => Ok(()),
            Err(ProviderError::UnrecognizedChain(_)) => {
                log::info!("{}: adding {} to the wallet", self.info.name, self.target.name);
                signer.add_chain(&self.target.add_chain_params()).await?;
                signer.switch_chain(chain_id).await?;
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn inscribe(
        &self,
        signer: &dyn EvmSigner,
        from: Address,
        message: &str,
    ) -> Result<String, PortfolioError> {
        let fsm = &self.services.fsm;

        let tx = memo_transaction(from, self.target.chain_id, message);
        fsm.message_prepared();

        self.ensure_target_chain(signer).await?;
        fsm.signed();

        let hash = signer.send_transaction(&tx).await?;
        fsm.sent();
        log::info!("{}: sent {hash}", self.info.name);

        let receipt = wait_for_receipt(
            self.services.evm_rpc.as_ref(),
            hash,
            self.services.poll_interval,
            self.services.confirmation_timeout,
        )
        .await?;

        if !receipt.succeeded() {
            return Err(PortfolioError::ChainExecution(format!(
                "transaction {hash} reverted"
            )));
        }
        Ok(hash.to_string())
    }
}

#[async_trait]
impl Wallet for EvmWallet {
    fn info(&self) -> &WalletInfo {
        &self.info
    }

    fn chain_type(&self) -> ChainType {
        ChainType::Evm
    }

    fn is_detected(&self) -> bool {
        self.detected
    }

    fn is_connected(&self) -> bool {
        self.is_active() && self.session.is_connected()
    }

    fn address(&self) -> Option<String> {
        if !self.is_active() {
            return None;
        }
        self.session.account().map(|a| to_checksum(&a))
    }

    async fn connect(&self) -> Result<(), PortfolioError> {
        if !self.detected {
            return Ok(());
        }
        self.session.connect(&self.info.id).await?;
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), PortfolioError> {
        if self.is_active() {
            self.session.disconnect().await?;
        }
        Ok(())
    }

    async fn submit_message_to_chain(&self, message: &str) -> Option<String> {
        if !self.detected || !self.is_active() {
            return None;
        }
        let from = self.session.account()?;
        let signer = self.session.signer().await?;

        self.services.fsm.start();
        let outcome = self.inscribe(signer.as_ref(), from, message).await;
        finish_submission(&self.services.fsm, &self.info.name, outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fsm::{InscriptionFsm, InscriptionState};
    use chain_eth::{EthError, EvmRpc, TransactionReceipt, U256};
    use chain_sol::{
        LatestBlockhash, ParsedTokenAccount, SignatureStatus, SolError, SolanaRpc,
    };
    use std::sync::Mutex;
    use std::time::Duration;

    const ACCOUNT: &str = "0x5aAeb6053F3E94C9b9A09f33669435E7Ef1BeAed";

    struct Session {
        active: Mutex<Option<String>>,
        connected: bool,
        signer: Option<Arc<Signer>>,
    }

    #[async_trait]
    impl EvmSession for Session {
        fn active_connector(&self) -> Option<String> {
            self.active.lock().unwrap().clone()
        }

        fn is_connected(&self) -> bool {
            self.connected
        }

        fn account(&self) -> Option<Address> {
            Some(ACCOUNT.parse().unwrap())
        }

        async fn connect(&self, connector_id: &str) -> Result<(), ProviderError> {
            *self.active.lock().unwrap() = Some(connector_id.to_string());
            Ok(())
        }

        async fn disconnect(&self) -> Result<(), ProviderError> {
            *self.active.lock().unwrap() = None;
            Ok(())
        }

        async fn signer(&self) -> Option<Arc<dyn EvmSigner>> {
            self.signer.clone().map(|s| s as Arc<dyn EvmSigner>)
        }
    }

    #[derive(Default)]
    struct Signer {
        knows_sepolia: Mutex<bool>,
        refuse_switch: bool,
        send_result: Mutex<Option<Result<B256, ProviderError>>>,
        calls: Mutex<Vec<String>>,
        sent: Mutex<Vec<TransactionRequest>>,
    }

    #[async_trait]
    impl EvmSigner for Signer {
        async fn switch_chain(&self, chain_id: u64) -> Result<(), ProviderError> {
            self.calls.lock().unwrap().push(format!("switch:{chain_id}"));
            if self.refuse_switch {
                return Err(ProviderError::UserRejected);
            }
            if !*self.knows_sepolia.lock().unwrap() {
                return Err(ProviderError::UnrecognizedChain(chain_id));
            }
            Ok(())
        }

        async fn add_chain(&self, params: &AddChainParams) -> Result<(), ProviderError> {
            self.calls.lock().unwrap().push(format!("add:{}", params.chain_id));
            *self.knows_sepolia.lock().unwrap() = true;
            Ok(())
        }

        async fn send_transaction(&self, tx: &TransactionRequest) -> Result<B256, ProviderError> {
            self.calls.lock().unwrap().push("send".into());
            self.sent.lock().unwrap().push(tx.clone());
            self.send_result
                .lock()
                .unwrap()
                .take()
                .unwrap_or(Ok(B256::with_last_byte(0xAB)))
        }
    }

    struct Receipts {
        status: u64,
    }

    #[async_trait]
    impl EvmRpc for Receipts {
        async fn get_balance(&self, _address: Address) -> Result<U256, EthError> {
            Ok(U256::ZERO)
        }

        async fn call(&self, _to: Address, _data: Vec<u8>) -> Result<Vec<u8>, EthError> {
            Ok(Vec::new())
        }

        async fn get_transaction_receipt(
            &self,
            hash: B256,
        ) -> Result<Option<TransactionReceipt>, EthError> {
            if self.status == u64::MAX {
                return Ok(None);
            }
            Ok(Some(
                serde_json::from_value(serde_json::json!({
                    "transactionHash": hash,
                    "blockNumber": "0x10",
                    "status": format!("{:#x}", self.status),
                }))
                .unwrap(),
            ))
        }
    }

    struct NoSolana;

    #[async_trait]
    impl SolanaRpc for NoSolana {
        async fn get_balance(&self, _address: &str) -> Result<u64, SolError> {
            Ok(0)
        }

        async fn get_token_accounts_by_owner(
            &self,
            _owner: &str,
            _program_id: &[u8; 32],
        ) -> Result<Vec<ParsedTokenAccount>, SolError> {
            Ok(Vec::new())
        }

        async fn get_latest_blockhash(&self) -> Result<LatestBlockhash, SolError> {
            Err(SolError::Transport("unused".into()))
        }

        async fn send_transaction(&self, _wire: &[u8]) -> Result<String, SolError> {
            Err(SolError::Transport("unused".into()))
        }

        async fn get_signature_status(
            &self,
            _signature: &str,
        ) -> Result<Option<SignatureStatus>, SolError> {
            Ok(None)
        }

        async fn get_block_height(&self) -> Result<u64, SolError> {
            Ok(0)
        }
    }

    struct Harness {
        wallet: EvmWallet,
        signer: Arc<Signer>,
        fsm: Arc<InscriptionFsm>,
        seen: Arc<Mutex<Vec<InscriptionState>>>,
    }

    fn harness(active: Option<&str>, signer: Signer, receipt_status: u64) -> Harness {
        let signer = Arc::new(signer);
        let session = Arc::new(Session {
            active: Mutex::new(active.map(Into::into)),
            connected: true,
            signer: Some(Arc::clone(&signer)),
        });

        let fsm = Arc::new(InscriptionFsm::new());
        let seen = Arc::new(Mutex::new(Vec::new()));
        {
            let seen = Arc::clone(&seen);
            fsm.subscribe(move |state| seen.lock().unwrap().push(state));
        }

        let services = WalletServices {
            fsm: Arc::clone(&fsm),
            evm_rpc: Arc::new(Receipts {
                status: receipt_status,
            }),
            svm_rpc: Arc::new(NoSolana),
            poll_interval: Duration::from_millis(1),
            confirmation_timeout: Duration::from_millis(50),
        };

        let info = WalletInfo {
            id: "io.metamask".into(),
            name: "Metamask".into(),
            icon: "/wallets/metamask-wallet.png".into(),
        };

        Harness {
            wallet: EvmWallet::new(info, true, session, services),
            signer,
            fsm,
            seen,
        }
    }

    fn known_sepolia() -> Signer {
        Signer {
            knows_sepolia: Mutex::new(true),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn happy_path_confirms() {
        let h = harness(Some("io.metamask"), known_sepolia(), 1);

        let tx = h.wallet.submit_message_to_chain("Total balance of x is $1").await;

        assert_eq!(tx, Some(B256::with_last_byte(0xAB).to_string()));
        assert_eq!(h.fsm.state(), InscriptionState::Completed);
        assert_eq!(
            *h.seen.lock().unwrap(),
            vec![
                InscriptionState::PreparingMessage,
                InscriptionState::AwaitingSignature,
                InscriptionState::SendingTransaction,
                InscriptionState::WaitingConfirmation,
                InscriptionState::Completed,
            ]
        );

        let sent = h.signer.sent.lock().unwrap();
        assert_eq!(sent[0].to, Address::ZERO);
        assert_eq!(sent[0].chain_id, SEPOLIA.chain_id);
        assert_eq!(sent[0].data.as_ref(), b"Total balance of x is $1");
    }

    #[tokio::test]
    async fn unknown_chain_is_added_then_switched() {
        let h = harness(Some("io.metamask"), Signer::default(), 1);

        assert!(h.wallet.submit_message_to_chain("hi").await.is_some());
        assert_eq!(
            *h.signer.calls.lock().unwrap(),
            vec!["switch:11155111", "add:0xaa36a7", "switch:11155111", "send"]
        );
    }

    #[tokio::test]
    async fn refusing_the_switch_is_a_rejection() {
        let signer = Signer {
            refuse_switch: true,
            ..Default::default()
        };
        let h = harness(Some("io.metamask"), signer, 1);

        assert_eq!(h.wallet.submit_message_to_chain("hi").await, None);
        assert_eq!(h.fsm.state(), InscriptionState::Rejected);
    }

    #[tokio::test]
    async fn rejected_signature() {
        let signer = known_sepolia();
        *signer.send_result.lock().unwrap() = Some(Err(ProviderError::UserRejected));
        let h = harness(Some("io.metamask"), signer, 1);

        assert_eq!(h.wallet.submit_message_to_chain("hi").await, None);
        assert_eq!(h.fsm.state(), InscriptionState::Rejected);
    }

    #[tokio::test]
    async fn execution_error_fails() {
        let signer = known_sepolia();
        *signer.send_result.lock().unwrap() =
            Some(Err(ProviderError::Execution("insufficient funds".into())));
        let h = harness(Some("io.metamask"), signer, 1);

        assert_eq!(h.wallet.submit_message_to_chain("hi").await, None);
        assert_eq!(h.fsm.state(), InscriptionState::Failed);
    }

    #[tokio::test]
    async fn reverted_receipt_fails() {
        let h = harness(Some("io.metamask"), known_sepolia(), 0);

        assert_eq!(h.wallet.submit_message_to_chain("hi").await, None);
        assert_eq!(h.fsm.state(), InscriptionState::Failed);
    }

    #[tokio::test]
    async fn confirmation_timeout_fails() {
        let h = harness(Some("io.metamask"), known_sepolia(), u64::MAX);

        assert_eq!(h.wallet.submit_message_to_chain("hi").await, None);
        assert_eq!(h.fsm.state(), InscriptionState::Failed);
    }

    #[tokio::test]
    async fn inactive_wallet_does_not_touch_the_fsm() {
        let h = harness(Some("app.phantom"), known_sepolia(), 1);

        assert!(!h.wallet.is_connected());
        assert_eq!(h.wallet.address(), None);
        assert_eq!(h.wallet.submit_message_to_chain("hi").await, None);
        assert_eq!(h.fsm.state(), InscriptionState::Idle);
        assert!(h.seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn connect_makes_this_wallet_active() {
        let h = harness(None, known_sepolia(), 1);
        assert!(!h.wallet.is_connected());

        h.wallet.connect().await.unwrap();
        assert!(h.wallet.is_connected());
        assert_eq!(h.wallet.address().as_deref(), Some(ACCOUNT));

        h.wallet.disconnect().await.unwrap();
        assert!(!h.wallet.is_connected());
    }
}
