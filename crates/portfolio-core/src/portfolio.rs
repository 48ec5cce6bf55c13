//! Portfolio assembly: merge with the directory, rank, and derive the
//! proof-of-balance message.
//!
//! Everything here is pure data transformation over finished fetch results.

use std::cmp::Ordering;
use std::collections::HashSet;

use chain_eth::chains::SEPOLIA;

use crate::amount::parse_price;
use crate::types::{BalanceResult, ChainBalanceResult, ChainDescriptor, ChainType, TokenDescriptor};

const SOLANA_EXPLORER: &str = "https://explorer.solana.com";

// EVM addresses compare case-insensitively; base58 is case-sensitive.
fn address_key(chain_type: ChainType, address: &str) -> String {
    match chain_type {
        ChainType::Evm => address.to_ascii_lowercase(),
        ChainType::Svm => address.to_string(),
    }
}

/// The native-asset row of a fetch result.
pub fn native_entry(chain: &ChainDescriptor, result: &ChainBalanceResult) -> BalanceResult {
    BalanceResult {
        token: Some(chain.native_token.clone()),
        symbol: chain.native_token.symbol.clone(),
        amount: result.native_amount.clone(),
        usd_value: result.native_usd,
    }
}

/// A zero-balance row for a directory token the wallet does not hold.
pub fn zero_entry(token: &TokenDescriptor) -> BalanceResult {
    BalanceResult {
        token: Some(token.clone()),
        symbol: token.symbol.clone(),
        amount: Some("0".to_string()),
        usd_value: parse_price(token.price_usd.as_deref()).map(|_| 0.0),
    }
}

/// A row for a directory token whose balance could not be read.
pub fn unknown_entry(token: &TokenDescriptor) -> BalanceResult {
    BalanceResult {
        token: Some(token.clone()),
        symbol: token.symbol.clone(),
        amount: None,
        usd_value: None,
    }
}

/// Native row first, then held tokens, then a placeholder for every
/// directory token not already present. Each address appears once.
///
/// `held` is `None` when the token read failed; placeholders then carry no
/// data instead of a zero balance.
pub fn merge_with_directory(
    chain_type: ChainType,
    native: BalanceResult,
    held: Option<&[BalanceResult]>,
    directory: &[TokenDescriptor],
) -> Vec<BalanceResult> {
    let placeholder: fn(&TokenDescriptor) -> BalanceResult = match held {
        Some(_) => zero_entry,
        None => unknown_entry,
    };
    let held = held.unwrap_or_default();

    let mut seen = HashSet::new();
    let mut merged = Vec::with_capacity(1 + held.len() + directory.len());

    for entry in std::iter::once(native).chain(held.iter().cloned()) {
        if let Some(token) = &entry.token {
            if !seen.insert(address_key(chain_type, &token.address)) {
                continue;
            }
        }
        merged.push(entry);
    }

    for token in directory {
        if seen.insert(address_key(chain_type, &token.address)) {
            merged.push(placeholder(token));
        }
    }

    merged
}

fn by_usd_desc(a: &BalanceResult, b: &BalanceResult) -> Ordering {
    match (a.usd_value, b.usd_value) {
        (Some(a), Some(b)) => b.partial_cmp(&a).unwrap_or(Ordering::Equal),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// Stable sort by USD value, highest first; unknown values last.
pub fn sort_by_usd(entries: &mut [BalanceResult]) {
    entries.sort_by(by_usd_desc);
}

/// Replaces `token_balances` with the full ranked list for the chain.
pub fn assemble(
    chain: &ChainDescriptor,
    directory: &[TokenDescriptor],
    mut result: ChainBalanceResult,
) -> ChainBalanceResult {
    let native = native_entry(chain, &result);
    let held = result
        .token_error
        .is_none()
        .then_some(result.token_balances.as_slice());
    let mut entries = merge_with_directory(chain.chain_type, native, held, directory);
    sort_by_usd(&mut entries);
    result.token_balances = entries;
    result
}

/// The memo inscribed on chain, or `None` while the total is unknown.
pub fn proof_of_balance_message(address: &str, total_usd: Option<f64>) -> Option<String> {
    let total = total_usd.filter(|t| t.is_finite())?;
    Some(format!("Total balance of {address} is ${total}"))
}

/// Explorer link for an inscription on the test network of `chain_type`.
pub fn transaction_url(tx_id: &str, chain_type: ChainType) -> String {
    match chain_type {
        ChainType::Svm => format!("{SOLANA_EXPLORER}/tx/{tx_id}?cluster=devnet"),
        ChainType::Evm => SEPOLIA.transaction_url(tx_id),
    }
}
