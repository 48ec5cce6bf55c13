//! Solana balance reads: lamports and parsed SPL token accounts.

use alloy_primitives::U256;
use chain_sol::{validate_address, SolanaRpc, TOKEN_PROGRAM_ID};

use super::{NativeBalance, TokenBalances, MISSING_WALLET_ADDRESS};
use crate::amount::{format_units, parse_base_units, parse_price, usd_value};
use crate::error::PortfolioError;
use crate::types::{BalanceResult, ChainDescriptor, TokenDescriptor};

fn validate(address: &str) -> Result<(), PortfolioError> {
    if address.trim().is_empty() {
        return Err(PortfolioError::Validation(MISSING_WALLET_ADDRESS.into()));
    }
    validate_address(address)?;
    Ok(())
}

pub async fn fetch_native_balance(
    rpc: &dyn SolanaRpc,
    chain: &ChainDescriptor,
    address: &str,
) -> NativeBalance {
    match read_native(rpc, chain, address).await {
        Ok(balance) => balance,
        Err(e) => {
            log::error!("Error fetching SOL native balance: {e}");
            NativeBalance::failed(&e)
        }
    }
}

async fn read_native(
    rpc: &dyn SolanaRpc,
    chain: &ChainDescriptor,
    address: &str,
) -> Result<NativeBalance, PortfolioError> {
    validate(address)?;
    let lamports = rpc.get_balance(address).await?;

    let amount = format_units(U256::from(lamports), chain.native_token.decimals);
    let usd = usd_value(&amount, parse_price(chain.native_token.price_usd.as_deref()));
    Ok(NativeBalance {
        amount: Some(amount),
        usd,
        error: None,
    })
}

/// Matches the wallet's token accounts against `tokens` by mint. Unlisted
/// mints and empty accounts are left out; several accounts of one mint are
/// summed.
pub async fn fetch_spl_balances(
    rpc: &dyn SolanaRpc,
    address: &str,
    tokens: &[TokenDescriptor],
) -> TokenBalances {
    match read_spl(rpc, address, tokens).await {
        Ok(balances) => balances,
        Err(e) => {
            log::error!("Error fetching SPL token balances: {e}");
            TokenBalances::failed(&e)
        }
    }
}

async fn read_spl(
    rpc: &dyn SolanaRpc,
    address: &str,
    tokens: &[TokenDescriptor],
) -> Result<TokenBalances, PortfolioError> {
    validate(address)?;
    let accounts = rpc
        .get_token_accounts_by_owner(address, &TOKEN_PROGRAM_ID)
        .await?;

    let mut held: Vec<(&TokenDescriptor, U256, u8)> = Vec::new();
    for account in accounts {
        let Some(token) = tokens.iter().find(|t| t.address == account.mint) else {
            continue;
        };
        let Some(raw) = parse_base_units(&account.amount).filter(|raw| !raw.is_zero()) else {
            continue;
        };

        match held.iter_mut().find(|(t, _, _)| t.address == token.address) {
            Some((_, total, _)) => *total = total.saturating_add(raw),
            None => held.push((token, raw, account.decimals)),
        }
    }

    let balances = held
        .into_iter()
        .map(|(token, raw, decimals)| {
            let amount = format_units(raw, decimals);
            BalanceResult {
                token: Some(token.clone()),
                symbol: token.symbol.clone(),
                usd_value: usd_value(&amount, parse_price(token.price_usd.as_deref())),
                amount: Some(amount),
            }
        })
        .collect();

    Ok(TokenBalances::from_balances(balances))
}
