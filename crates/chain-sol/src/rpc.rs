//! Solana JSON-RPC access.
//!
//! `SolanaRpc` is the seam for balance reads, broadcast and confirmation;
//! `HttpSolanaRpc` talks JSON-RPC over HTTP.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::address::{address_to_bytes, bytes_to_address};
use crate::error::SolError;
use crate::spl_token::{KeyedAccount, ParsedTokenAccount};

/// Commitment level for reads and confirmation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Commitment {
    Processed,
    Confirmed,
    Finalized,
}

/// Level used for reads, blockhashes and preflight.
const READ_COMMITMENT: Commitment = Commitment::Confirmed;

/// `getLatestBlockhash` value.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LatestBlockhash {
    /// Base58 blockhash.
    pub blockhash: String,
    /// Last block height at which a transaction using this blockhash can land.
    pub last_valid_block_height: u64,
}

impl LatestBlockhash {
    pub fn to_bytes(&self) -> Result<[u8; 32], SolError> {
        address_to_bytes(&self.blockhash)
    }
}

/// One entry of `getSignatureStatuses`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignatureStatus {
    #[serde(default)]
    pub slot: u64,
    #[serde(default)]
    pub confirmations: Option<u64>,
    /// Transaction error, `None` when it executed successfully.
    #[serde(default)]
    pub err: Option<Value>,
    #[serde(default)]
    pub confirmation_status: Option<Commitment>,
}

impl SignatureStatus {
    /// Reached at least `confirmed` without error.
    pub fn is_confirmed(&self) -> bool {
        self.err.is_none()
            && matches!(
                self.confirmation_status,
                Some(Commitment::Confirmed) | Some(Commitment::Finalized)
            )
    }
}

/// Solana JSON-RPC operations used by the portfolio.
#[async_trait]
pub trait SolanaRpc: Send + Sync {
    /// `getBalance` in lamports.
    async fn get_balance(&self, address: &str) -> Result<u64, SolError>;

    /// `getTokenAccountsByOwner` filtered by token program, `jsonParsed`.
    async fn get_token_accounts_by_owner(
        &self,
        owner: &str,
        program_id: &[u8; 32],
    ) -> Result<Vec<ParsedTokenAccount>, SolError>;

    async fn get_latest_blockhash(&self) -> Result<LatestBlockhash, SolError>;

    /// `sendTransaction` with a fully signed wire transaction. Returns the
    /// base58 signature.
    async fn send_transaction(&self, wire: &[u8]) -> Result<String, SolError>;

    /// `getSignatureStatuses` for one signature; `None` while unknown.
    async fn get_signature_status(
        &self,
        signature: &str,
    ) -> Result<Option<SignatureStatus>, SolError>;

    async fn get_block_height(&self) -> Result<u64, SolError>;
}

#[derive(Debug, Deserialize)]
struct RpcErrorObject {
    code: i64,
    message: String,
}

#[derive(Debug, Deserialize)]
struct RpcResponse {
    #[serde(default)]
    result: Value,
    #[serde(default)]
    error: Option<RpcErrorObject>,
}

/// `{ context, value }` wrapper used by most Solana methods.
#[derive(Debug, Deserialize)]
struct WithContext<T> {
    value: T,
}

/// JSON-RPC over HTTP POST.
#[derive(Debug)]
pub struct HttpSolanaRpc {
    url: String,
    client: reqwest::Client,
    next_id: AtomicU64,
}

impl HttpSolanaRpc {
    pub fn new(url: impl Into<String>) -> Self {
        Self::with_client(url, reqwest::Client::new())
    }

    pub fn with_client(url: impl Into<String>, client: reqwest::Client) -> Self {
        Self {
            url: url.into(),
            client,
            next_id: AtomicU64::new(1),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    async fn request<T: DeserializeOwned>(
        &self,
        method: &str,
        params: Value,
    ) -> Result<T, SolError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let body = json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": method,
            "params": params,
        });

        log::debug!("{} -> {}", method, self.url);

        let response = self.client.post(&self.url).json(&body).send().await?;
        if !response.status().is_success() {
            return Err(SolError::Transport(format!(
                "{method} returned HTTP {}",
                response.status()
            )));
        }

        let envelope: RpcResponse = response
            .json()
            .await
            .map_err(|e| SolError::InvalidResponse(format!("{method}: {e}")))?;

        decode_envelope(method, envelope)
    }
}

fn decode_envelope<T: DeserializeOwned>(
    method: &str,
    envelope: RpcResponse,
) -> Result<T, SolError> {
    if let Some(error) = envelope.error {
        return Err(SolError::Rpc {
            code: error.code,
            message: error.message,
        });
    }

    serde_json::from_value(envelope.result)
        .map_err(|e| SolError::InvalidResponse(format!("{method}: {e}")))
}

#[async_trait]
impl SolanaRpc for HttpSolanaRpc {
    async fn get_balance(&self, address: &str) -> Result<u64, SolError> {
        let balance: WithContext<u64> = self
            .request(
                "getBalance",
                json!([address, { "commitment": READ_COMMITMENT }]),
            )
            .await?;
        Ok(balance.value)
    }

    async fn get_token_accounts_by_owner(
        &self,
        owner: &str,
        program_id: &[u8; 32],
    ) -> Result<Vec<ParsedTokenAccount>, SolError> {
        let accounts: WithContext<Vec<KeyedAccount>> = self
            .request(
                "getTokenAccountsByOwner",
                json!([
                    owner,
                    { "programId": bytes_to_address(program_id) },
                    { "encoding": "jsonParsed", "commitment": READ_COMMITMENT },
                ]),
            )
            .await?;

        accounts
            .value
            .into_iter()
            .map(ParsedTokenAccount::try_from)
            .collect()
    }

    async fn get_latest_blockhash(&self) -> Result<LatestBlockhash, SolError> {
        let latest: WithContext<LatestBlockhash> = self
            .request(
                "getLatestBlockhash",
                json!([{ "commitment": READ_COMMITMENT }]),
            )
            .await?;
        Ok(latest.value)
    }

    async fn send_transaction(&self, wire: &[u8]) -> Result<String, SolError> {
        let encoded = base64::engine::general_purpose::STANDARD.encode(wire);
        self.request(
            "sendTransaction",
            json!([
                encoded,
                { "encoding": "base64", "preflightCommitment": READ_COMMITMENT },
            ]),
        )
        .await
    }

    async fn get_signature_status(
        &self,
        signature: &str,
    ) -> Result<Option<SignatureStatus>, SolError> {
        let statuses: WithContext<Vec<Option<SignatureStatus>>> = self
            .request("getSignatureStatuses", json!([[signature]]))
            .await?;
        Ok(statuses.value.into_iter().next().flatten())
    }

    async fn get_block_height(&self) -> Result<u64, SolError> {
        self.request("getBlockHeight", json!([{ "commitment": READ_COMMITMENT }]))
            .await
    }
}

/// Polls until `signature` is confirmed, fails, or its blockhash expires.
///
/// Transport errors are logged and retried. The wait ends with
/// `BlockhashExpired` once the chain passes `last_valid_block_height`
/// without the signature landing.
pub async fn confirm_transaction(
    rpc: &dyn SolanaRpc,
    signature: &str,
    last_valid_block_height: u64,
    poll_interval: Duration,
) -> Result<(), SolError> {
    loop {
        match rpc.get_signature_status(signature).await {
            Ok(Some(status)) => {
                if let Some(err) = status.err {
                    return Err(SolError::TransactionFailed(err.to_string()));
                }
                if status.is_confirmed() {
                    log::debug!("{signature} reached {:?}", status.confirmation_status);
                    return Ok(());
                }
            }
            Ok(None) => {}
            Err(e) => log::warn!("status poll for {signature} failed: {e}"),
        }

        match rpc.get_block_height().await {
            Ok(height) if height > last_valid_block_height => {
                return Err(SolError::BlockhashExpired(signature.to_string()));
            }
            Ok(_) => {}
            Err(e) => log::warn!("block height poll failed: {e}"),
        }

        tokio::time::sleep(poll_interval).await;
    }
}
