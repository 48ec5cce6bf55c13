//! Solana wallet adapter.
//!
//! Connection state is tracked from the provider's `connect`, `disconnect`
//! and `accountChanged` events. Inscriptions are single Memo instructions
//! signed by the wallet, checked locally, and broadcast to devnet.

use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use chain_sol::{
    address_to_bytes, attach_signature, build_memo_transaction, confirm_transaction,
    verify_signature, SolTransaction,
};

use super::{finish_submission, Wallet, WalletInfo, WalletServices};
use crate::error::{PortfolioError, ProviderError};
use crate::types::ChainType;

/// Events emitted by an injected Solana provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SolanaProviderEvent {
    /// Connected with this base58 public key.
    Connect(String),
    Disconnect,
    /// Switched account; `None` when the wallet hides the new one.
    AccountChanged(Option<String>),
}

pub type SolanaEventHandler = Arc<dyn Fn(&SolanaProviderEvent) + Send + Sync>;

#[async_trait]
pub trait SolanaProvider: Send + Sync {
    fn is_connected(&self) -> bool;
    fn public_key(&self) -> Option<String>;

    async fn connect(&self) -> Result<(), ProviderError>;
    async fn disconnect(&self) -> Result<(), ProviderError>;

    /// Ed25519 signature of the fee payer over the transaction message.
    async fn sign_transaction(&self, tx: &SolTransaction) -> Result<[u8; 64], ProviderError>;

    /// Registers an event handler; the returned id is passed to `off`.
    fn on(&self, handler: SolanaEventHandler) -> u64;
    fn off(&self, handler_id: u64);
}

#[derive(Debug, Default)]
struct Connection {
    connected: bool,
    address: Option<String>,
}

impl Connection {
    fn apply(&mut self, event: &SolanaProviderEvent) {
        match event {
            SolanaProviderEvent::Connect(key) => {
                self.connected = true;
                self.address = Some(key.clone());
            }
            SolanaProviderEvent::Disconnect | SolanaProviderEvent::AccountChanged(None) => {
                self.connected = false;
                self.address = None;
            }
            SolanaProviderEvent::AccountChanged(Some(key)) => {
                self.connected = true;
                self.address = Some(key.clone());
            }
        }
    }
}

pub struct SvmWallet {
    info: WalletInfo,
    provider: Option<Arc<dyn SolanaProvider>>,
    connection: Arc<Mutex<Connection>>,
    handler_id: Option<u64>,
    services: WalletServices,
}

impl SvmWallet {
    pub fn new(
        info: WalletInfo,
        provider: Option<Arc<dyn SolanaProvider>>,
        services: WalletServices,
    ) -> Self {
        let connection = Arc::new(Mutex::new(Connection::default()));

        let handler_id = provider.as_ref().map(|provider| {
            let state = Arc::clone(&connection);
            let name = info.name.clone();
            let id = provider.on(Arc::new(move |event: &SolanaProviderEvent| {
                log::debug!("{name}: {event:?}");
                state
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .apply(event);
            }));

            if provider.is_connected() {
                if let Some(key) = provider.public_key() {
                    connection
                        .lock()
                        .unwrap_or_else(PoisonError::into_inner)
                        .apply(&SolanaProviderEvent::Connect(key));
                }
            }
            id
        });

        Self {
            info,
            provider,
            connection,
            handler_id,
            services,
        }
    }

    fn connection(&self) -> std::sync::MutexGuard<'_, Connection> {
        self.connection.lock().unwrap_or_else(PoisonError::into_inner)
    }

    async fn inscribe(
        &self,
        provider: &dyn SolanaProvider,
        fee_payer: [u8; 32],
        message: &str,
    ) -> Result<String, PortfolioError> {
        let fsm = &self.services.fsm;
        let rpc = self.services.svm_rpc.as_ref();

        let latest = rpc.get_latest_blockhash().await?;
        let tx = build_memo_transaction(&fee_payer, message, &latest.to_bytes()?)?;
        fsm.message_prepared();

        let signature = provider.sign_transaction(&tx).await?;
        verify_signature(&tx, &signature)?;
        fsm.signed();

        let tx_id = rpc.send_transaction(&attach_signature(&tx, &signature)?).await?;
        fsm.sent();
        log::info!("{}: sent {tx_id}", self.info.name);

        let confirmation = confirm_transaction(
            rpc,
            &tx_id,
            latest.last_valid_block_height,
            self.services.poll_interval,
        );
        tokio::time::timeout(self.services.confirmation_timeout, confirmation)
            .await
            .map_err(|_| PortfolioError::Network(format!("timed out confirming {tx_id}")))??;

        Ok(tx_id)
    }
}

impl Drop for SvmWallet {
    fn drop(&mut self) {
        if let (Some(provider), Some(id)) = (&self.provider, self.handler_id) {
            provider.off(id);
        }
    }
}

#[async_trait]
impl Wallet for SvmWallet {
    fn info(&self) -> &WalletInfo {
        &self.info
    }

    fn chain_type(&self) -> ChainType {
        ChainType::Svm
    }

    fn is_detected(&self) -> bool {
        self.provider.is_some()
    }

    fn is_connected(&self) -> bool {
        self.connection().connected
    }

    fn address(&self) -> Option<String> {
        self.connection().address.clone()
    }

    async fn connect(&self) -> Result<(), PortfolioError> {
        if let Some(provider) = &self.provider {
            provider.connect().await?;
        }
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), PortfolioError> {
        if let Some(provider) = &self.provider {
            provider.disconnect().await?;
        }
        Ok(())
    }

    async fn submit_message_to_chain(&self, message: &str) -> Option<String> {
        let provider = self.provider.as_ref()?;
        if !self.is_connected() {
            return None;
        }
        let address = self.address()?;
        let fee_payer = match address_to_bytes(&address) {
            Ok(bytes) => bytes,
            Err(e) => {
                log::warn!("{}: unusable public key {address}: {e}", self.info.name);
                return None;
            }
        };

        self.services.fsm.start();
        let outcome = self.inscribe(provider.as_ref(), fee_payer, message).await;
        finish_submission(&self.services.fsm, &self.info.name, outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fsm::{InscriptionFsm, InscriptionState};
    use chain_eth::{Address, EthError, EvmRpc, TransactionReceipt, B256, U256};
    use chain_sol::{
        bytes_to_address, serialize_message, Commitment, LatestBlockhash, ParsedTokenAccount,
        SignatureStatus, SolError, SolanaRpc,
    };
    use ed25519_dalek::{Signer as _, SigningKey};
    use rand::rngs::OsRng;
    use std::collections::HashMap;
    use std::time::Duration;

    #[derive(Clone, Copy, PartialEq)]
    enum Signing {
        Honest,
        Refuse,
        Forge,
    }

    struct Phantom {
        key: SigningKey,
        signing: Signing,
        connected: Mutex<bool>,
        handlers: Mutex<HashMap<u64, SolanaEventHandler>>,
        next_handler: Mutex<u64>,
    }

    impl Phantom {
        fn new(signing: Signing, connected: bool) -> Self {
            Self {
                key: SigningKey::generate(&mut OsRng),
                signing,
                connected: Mutex::new(connected),
                handlers: Mutex::new(HashMap::new()),
                next_handler: Mutex::new(0),
            }
        }

        fn address(&self) -> String {
            bytes_to_address(&self.key.verifying_key().to_bytes())
        }

        fn emit(&self, event: SolanaProviderEvent) {
            let handlers: Vec<SolanaEventHandler> =
                self.handlers.lock().unwrap().values().cloned().collect();
            for handler in handlers {
                handler(&event);
            }
        }
    }

    #[async_trait]
    impl SolanaProvider for Phantom {
        fn is_connected(&self) -> bool {
            *self.connected.lock().unwrap()
        }

        fn public_key(&self) -> Option<String> {
            self.is_connected().then(|| self.address())
        }

        async fn connect(&self) -> Result<(), ProviderError> {
            *self.connected.lock().unwrap() = true;
            self.emit(SolanaProviderEvent::Connect(self.address()));
            Ok(())
        }

        async fn disconnect(&self) -> Result<(), ProviderError> {
            *self.connected.lock().unwrap() = false;
            self.emit(SolanaProviderEvent::Disconnect);
            Ok(())
        }

        async fn sign_transaction(&self, tx: &SolTransaction) -> Result<[u8; 64], ProviderError> {
            let message = serialize_message(tx).unwrap();
            match self.signing {
                Signing::Honest => Ok(self.key.sign(&message).to_bytes()),
                Signing::Refuse => Err(ProviderError::UserRejected),
                Signing::Forge => Ok(SigningKey::generate(&mut OsRng).sign(&message).to_bytes()),
            }
        }

        fn on(&self, handler: SolanaEventHandler) -> u64 {
            let mut next = self.next_handler.lock().unwrap();
            *next += 1;
            self.handlers.lock().unwrap().insert(*next, handler);
            *next
        }

        fn off(&self, handler_id: u64) {
            self.handlers.lock().unwrap().remove(&handler_id);
        }
    }

    struct Devnet {
        confirm: Option<Commitment>,
        sent: Mutex<Vec<Vec<u8>>>,
        height: Mutex<u64>,
    }

    impl Devnet {
        fn new(confirm: Option<Commitment>) -> Self {
            Self {
                confirm,
                sent: Mutex::new(Vec::new()),
                height: Mutex::new(100),
            }
        }
    }

    #[async_trait]
    impl SolanaRpc for Devnet {
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
            Ok(LatestBlockhash {
                blockhash: bytes_to_address(&[9; 32]),
                last_valid_block_height: 110,
            })
        }

        async fn send_transaction(&self, wire: &[u8]) -> Result<String, SolError> {
            self.sent.lock().unwrap().push(wire.to_vec());
            Ok(bs58_signature(wire))
        }

        async fn get_signature_status(
            &self,
            _signature: &str,
        ) -> Result<Option<SignatureStatus>, SolError> {
            Ok(self.confirm.map(|level| SignatureStatus {
                slot: 1,
                confirmations: None,
                err: None,
                confirmation_status: Some(level),
            }))
        }

        async fn get_block_height(&self) -> Result<u64, SolError> {
            let mut height = self.height.lock().unwrap();
            *height += 5;
            Ok(*height)
        }
    }

    fn bs58_signature(wire: &[u8]) -> String {
        let mut signature = [0u8; 32];
        signature.copy_from_slice(&wire[1..33]);
        bytes_to_address(&signature)
    }

    struct NoEvm;

    #[async_trait]
    impl EvmRpc for NoEvm {
        async fn get_balance(&self, _address: Address) -> Result<U256, EthError> {
            Ok(U256::ZERO)
        }

        async fn call(&self, _to: Address, _data: Vec<u8>) -> Result<Vec<u8>, EthError> {
            Ok(Vec::new())
        }

        async fn get_transaction_receipt(
            &self,
            _hash: B256,
        ) -> Result<Option<TransactionReceipt>, EthError> {
            Ok(None)
        }
    }

    fn info() -> WalletInfo {
        WalletInfo {
            id: "phantomsvm".into(),
            name: "Phantom SVM".into(),
            icon: "/wallets/phantom-wallet.png".into(),
        }
    }

    fn wallet(provider: Arc<Phantom>, devnet: Arc<Devnet>) -> (SvmWallet, Arc<InscriptionFsm>) {
        let fsm = Arc::new(InscriptionFsm::new());
        let services = WalletServices {
            fsm: Arc::clone(&fsm),
            evm_rpc: Arc::new(NoEvm),
            svm_rpc: devnet,
            poll_interval: Duration::from_millis(1),
            confirmation_timeout: Duration::from_secs(5),
        };
        let provider: Arc<dyn SolanaProvider> = provider;
        (SvmWallet::new(info(), Some(provider), services), fsm)
    }

    #[tokio::test]
    async fn tracks_connection_from_events() {
        let phantom = Arc::new(Phantom::new(Signing::Honest, false));
        let (wallet, _) = wallet(Arc::clone(&phantom), Arc::new(Devnet::new(None)));
        assert!(wallet.is_detected());
        assert!(!wallet.is_connected());

        wallet.connect().await.unwrap();
        assert!(wallet.is_connected());
        assert_eq!(wallet.address(), Some(phantom.address()));

        phantom.emit(SolanaProviderEvent::AccountChanged(None));
        assert!(!wallet.is_connected());
        assert_eq!(wallet.address(), None);

        phantom.emit(SolanaProviderEvent::AccountChanged(Some("Other".into())));
        assert_eq!(wallet.address().as_deref(), Some("Other"));

        wallet.disconnect().await.unwrap();
        assert!(!wallet.is_connected());
    }

    #[tokio::test]
    async fn picks_up_existing_connection() {
        let phantom = Arc::new(Phantom::new(Signing::Honest, true));
        let (wallet, _) = wallet(Arc::clone(&phantom), Arc::new(Devnet::new(None)));
        assert!(wallet.is_connected());
        assert_eq!(wallet.address(), Some(phantom.address()));
    }

    #[tokio::test]
    async fn dropping_the_wallet_unsubscribes() {
        let phantom = Arc::new(Phantom::new(Signing::Honest, false));
        let (wallet, _) = wallet(Arc::clone(&phantom), Arc::new(Devnet::new(None)));
        assert_eq!(phantom.handlers.lock().unwrap().len(), 1);

        drop(wallet);
        assert!(phantom.handlers.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn inscribes_a_memo_on_devnet() {
        let phantom = Arc::new(Phantom::new(Signing::Honest, true));
        let devnet = Arc::new(Devnet::new(Some(Commitment::Confirmed)));
        let (wallet, fsm) = wallet(Arc::clone(&phantom), Arc::clone(&devnet));

        let tx = wallet.submit_message_to_chain("Total balance of x is $3").await;

        assert_eq!(fsm.state(), InscriptionState::Completed);
        let sent = devnet.sent.lock().unwrap();
        assert_eq!(tx, Some(bs58_signature(&sent[0])));
        assert!(sent[0].ends_with(b"Total balance of x is $3"));
    }

    #[tokio::test]
    async fn declined_signature_is_rejected() {
        let phantom = Arc::new(Phantom::new(Signing::Refuse, true));
        let devnet = Arc::new(Devnet::new(Some(Commitment::Confirmed)));
        let (wallet, fsm) = wallet(phantom, Arc::clone(&devnet));

        assert_eq!(wallet.submit_message_to_chain("hi").await, None);
        assert_eq!(fsm.state(), InscriptionState::Rejected);
        assert!(devnet.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn forged_signature_fails_before_broadcast() {
        let phantom = Arc::new(Phantom::new(Signing::Forge, true));
        let devnet = Arc::new(Devnet::new(Some(Commitment::Confirmed)));
        let (wallet, fsm) = wallet(phantom, Arc::clone(&devnet));

        assert_eq!(wallet.submit_message_to_chain("hi").await, None);
        assert_eq!(fsm.state(), InscriptionState::Failed);
        assert!(devnet.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn expired_blockhash_fails() {
        let phantom = Arc::new(Phantom::new(Signing::Honest, true));
        let (wallet, fsm) = wallet(phantom, Arc::new(Devnet::new(None)));

        assert_eq!(wallet.submit_message_to_chain("hi").await, None);
        assert_eq!(fsm.state(), InscriptionState::Failed);
    }

    #[tokio::test]
    async fn disconnected_wallet_does_not_touch_the_fsm() {
        let phantom = Arc::new(Phantom::new(Signing::Honest, false));
        let (wallet, fsm) = wallet(phantom, Arc::new(Devnet::new(None)));

        assert_eq!(wallet.submit_message_to_chain("hi").await, None);
        assert_eq!(fsm.state(), InscriptionState::Idle);
    }

    #[tokio::test]
    async fn undetected_wallet_is_inert() {
        let fsm = Arc::new(InscriptionFsm::new());
        let services = WalletServices {
            fsm: Arc::clone(&fsm),
            evm_rpc: Arc::new(NoEvm),
            svm_rpc: Arc::new(Devnet::new(None)),
            poll_interval: Duration::from_millis(1),
            confirmation_timeout: Duration::from_secs(1),
        };
        let wallet = SvmWallet::new(info(), None, services);

        assert!(!wallet.is_detected());
        wallet.connect().await.unwrap();
        assert!(!wallet.is_connected());
        assert_eq!(wallet.submit_message_to_chain("hi").await, None);
        assert_eq!(fsm.state(), InscriptionState::Idle);
    }
}
