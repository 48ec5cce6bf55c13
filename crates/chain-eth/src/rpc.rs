//! Ethereum JSON-RPC access.
//!
//! `EvmRpc` is the seam the balance engine and the submission flow talk to;
//! `HttpEvmRpc` is the production implementation over plain HTTP.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use alloy_primitives::{Address, Bytes, B256, U256, U64};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::error::EthError;

/// The subset of a transaction receipt the confirmation step needs.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionReceipt {
    pub transaction_hash: B256,
    #[serde(default)]
    pub block_number: Option<U64>,
    /// `1` on success, `0` on revert. Absent on pre-Byzantium chains.
    #[serde(default)]
    pub status: Option<U64>,
}

impl TransactionReceipt {
    pub fn succeeded(&self) -> bool {
        self.status == Some(U64::from(1))
    }
}

/// Read-only Ethereum JSON-RPC operations.
#[async_trait]
pub trait EvmRpc: Send + Sync {
    /// `eth_getBalance` at the latest block, in wei.
    async fn get_balance(&self, address: Address) -> Result<U256, EthError>;

    /// `eth_call` at the latest block.
    async fn call(&self, to: Address, data: Vec<u8>) -> Result<Vec<u8>, EthError>;

    /// `eth_getTransactionReceipt`; `None` while the transaction is pending.
    async fn get_transaction_receipt(
        &self,
        hash: B256,
    ) -> Result<Option<TransactionReceipt>, EthError>;
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

/// JSON-RPC over HTTP POST.
#[derive(Debug)]
pub struct HttpEvmRpc {
    url: String,
    client: reqwest::Client,
    next_id: AtomicU64,
}

impl HttpEvmRpc {
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
    ) -> Result<T, EthError> {
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
            return Err(EthError::Transport(format!(
                "{method} returned HTTP {}",
                response.status()
            )));
        }

        let envelope: RpcResponse = response
            .json()
            .await
            .map_err(|e| EthError::InvalidResponse(format!("{method}: {e}")))?;

        decode_envelope(method, envelope)
    }
}

fn decode_envelope<T: DeserializeOwned>(
    method: &str,
    envelope: RpcResponse,
) -> Result<T, EthError> {
    if let Some(error) = envelope.error {
        return Err(EthError::Rpc {
            code: error.code,
            message: error.message,
        });
    }

    serde_json::from_value(envelope.result)
        .map_err(|e| EthError::InvalidResponse(format!("{method}: {e}")))
}

#[async_trait]
impl EvmRpc for HttpEvmRpc {
    async fn get_balance(&self, address: Address) -> Result<U256, EthError> {
        self.request("eth_getBalance", json!([address, "latest"]))
            .await
    }

    async fn call(&self, to: Address, data: Vec<u8>) -> Result<Vec<u8>, EthError> {
        let call = json!({ "to": to, "data": Bytes::from(data) });
        let result: Bytes = self.request("eth_call", json!([call, "latest"])).await?;
        Ok(result.to_vec())
    }

    async fn get_transaction_receipt(
        &self,
        hash: B256,
    ) -> Result<Option<TransactionReceipt>, EthError> {
        self.request("eth_getTransactionReceipt", json!([hash]))
            .await
    }
}

/// Polls for a receipt until one appears or `timeout` elapses.
///
/// Transport errors while polling are logged and retried; only the timeout
/// ends the wait without a receipt.
pub async fn wait_for_receipt(
    rpc: &dyn EvmRpc,
    hash: B256,
    poll_interval: Duration,
    timeout: Duration,
) -> Result<TransactionReceipt, EthError> {
    let poll = async {
        loop {
            match rpc.get_transaction_receipt(hash).await {
                Ok(Some(receipt)) => return receipt,
                Ok(None) => {}
                Err(e) => log::warn!("receipt poll for {hash} failed: {e}"),
            }
            tokio::time::sleep(poll_interval).await;
        }
    };

    tokio::time::timeout(timeout, poll)
        .await
        .map_err(|_| EthError::Timeout(format!("receipt of {hash}")))
}
