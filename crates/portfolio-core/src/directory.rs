//! Chain and token directory.
//!
//! The directory is best-effort: any failure degrades to an empty list with
//! a warning, never an error.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::PortfolioError;
use crate::types::{ChainDescriptor, ChainType, TokenDescriptor};

#[async_trait]
pub trait ChainDirectory: Send + Sync {
    /// Chains of one family.
    async fn chains(&self, chain_type: ChainType) -> Vec<ChainDescriptor>;

    /// Tokens listed for one chain.
    async fn tokens(&self, chain_id: u64, chain_type: ChainType) -> Vec<TokenDescriptor>;
}

/// LI.FI REST directory (`/chains`, `/tokens`).
#[derive(Debug, Clone)]
pub struct LifiDirectory {
    base_url: String,
    client: reqwest::Client,
}

impl LifiDirectory {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(base_url, reqwest::Client::new())
    }

    pub fn with_client(base_url: impl Into<String>, client: reqwest::Client) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
        }
    }

    async fn get_json(&self, url: String) -> Result<Value, PortfolioError> {
        let response = self
            .client
            .get(&url)
            .header("accept", "application/json")
            .send()
            .await
            .map_err(|e| PortfolioError::Network(format!("{url}: {e}")))?;

        if !response.status().is_success() {
            return Err(PortfolioError::Network(format!(
                "{url} returned HTTP {}",
                response.status()
            )));
        }

        response
            .json()
            .await
            .map_err(|e| PortfolioError::Network(format!("{url}: {e}")))
    }
}

#[async_trait]
impl ChainDirectory for LifiDirectory {
    async fn chains(&self, chain_type: ChainType) -> Vec<ChainDescriptor> {
        let url = format!("{}/chains?chainTypes={}", self.base_url, chain_type);
        match self.get_json(url).await {
            Ok(body) => parse_chains(body, chain_type),
            Err(e) => {
                log::warn!("Failed to fetch {chain_type} chains: {e}");
                Vec::new()
            }
        }
    }

    async fn tokens(&self, chain_id: u64, chain_type: ChainType) -> Vec<TokenDescriptor> {
        let url = format!(
            "{}/tokens?chains={}&chainTypes={}",
            self.base_url, chain_id, chain_type
        );
        match self.get_json(url).await {
            Ok(body) => parse_tokens(body, chain_id),
            Err(e) => {
                log::warn!("Token fetch failed for chain {chain_id}: {e}");
                Vec::new()
            }
        }
    }
}

/// Reads `{ "chains": [...] }`, keeping entries of `chain_type` that parse.
pub fn parse_chains(body: Value, chain_type: ChainType) -> Vec<ChainDescriptor> {
    let Some(Value::Array(entries)) = body.get("chains").cloned() else {
        log::warn!("Unexpected chain list shape from directory");
        return Vec::new();
    };

    entries
        .into_iter()
        .filter_map(|entry| match serde_json::from_value::<ChainDescriptor>(entry) {
            Ok(chain) => Some(chain),
            Err(e) => {
                log::debug!("Skipping unreadable chain entry: {e}");
                None
            }
        })
        .filter(|chain| chain.chain_type == chain_type)
        .collect()
}

/// Reads `{ "tokens": { "<chainId>": [...] } }`.
pub fn parse_tokens(body: Value, chain_id: u64) -> Vec<TokenDescriptor> {
    let Some(Value::Array(entries)) = body
        .get("tokens")
        .and_then(|tokens| tokens.get(chain_id.to_string()))
        .cloned()
    else {
        log::warn!("Unexpected token structure from directory for chain {chain_id}");
        return Vec::new();
    };

    entries
        .into_iter()
        .filter_map(|entry| match serde_json::from_value::<TokenDescriptor>(entry) {
            Ok(token) => Some(token),
            Err(e) => {
                log::debug!("Skipping unreadable token entry on chain {chain_id}: {e}");
                None
            }
        })
        .collect()
}

/// Memoises non-empty answers of another directory for the session.
pub struct CachedDirectory<D> {
    inner: D,
    chains: Mutex<HashMap<ChainType, Vec<ChainDescriptor>>>,
    tokens: Mutex<HashMap<(ChainType, u64), Vec<TokenDescriptor>>>,
}

impl<D: ChainDirectory> CachedDirectory<D> {
    pub fn new(inner: D) -> Self {
        Self {
            inner,
            chains: Mutex::new(HashMap::new()),
            tokens: Mutex::new(HashMap::new()),
        }
    }

    pub fn inner(&self) -> &D {
        &self.inner
    }
}

fn cached<K, V>(cache: &Mutex<HashMap<K, Vec<V>>>, key: &K) -> Option<Vec<V>>
where
    K: std::hash::Hash + Eq,
    V: Clone,
{
    cache
        .lock()
        .unwrap_or_else(std::sync::PoisonError::into_inner)
        .get(key)
        .cloned()
}

fn remember<K, V>(cache: &Mutex<HashMap<K, Vec<V>>>, key: K, values: &[V])
where
    K: std::hash::Hash + Eq,
    V: Clone,
{
    if values.is_empty() {
        return;
    }
    cache
        .lock()
        .unwrap_or_else(std::sync::PoisonError::into_inner)
        .entry(key)
        .or_insert_with(|| values.to_vec());
}

#[async_trait]
impl<D: ChainDirectory> ChainDirectory for CachedDirectory<D> {
    async fn chains(&self, chain_type: ChainType) -> Vec<ChainDescriptor> {
        if let Some(hit) = cached(&self.chains, &chain_type) {
            return hit;
        }
        let chains = self.inner.chains(chain_type).await;
        remember(&self.chains, chain_type, &chains);
        chains
    }

    async fn tokens(&self, chain_id: u64, chain_type: ChainType) -> Vec<TokenDescriptor> {
        let key = (chain_type, chain_id);
        if let Some(hit) = cached(&self.tokens, &key) {
            return hit;
        }
        let tokens = self.inner.tokens(chain_id, chain_type).await;
        remember(&self.tokens, key, &tokens);
        tokens
    }
}
