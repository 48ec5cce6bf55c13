//! EVM balance reads: `eth_getBalance` and Multicall3-batched `balanceOf`.

use chain_eth::address::parse_address;
use chain_eth::multicall::fetch_token_balances;
use chain_eth::{Address, EvmRpc};

use super::{NativeBalance, TokenBalances, INVALID_INPUT, NO_MULTICALL, NO_TOKENS};
use crate::amount::{format_units, parse_price, usd_value};
use crate::config::NativeDecimals;
use crate::error::PortfolioError;
use crate::types::{BalanceResult, ChainDescriptor, TokenDescriptor};

fn validate(chain: &ChainDescriptor, address: &str) -> Result<Address, PortfolioError> {
    if address.trim().is_empty()
        || chain.id == 0
        || chain.name.is_empty()
        || chain.native_token.symbol.is_empty()
        || chain.rpc_urls().is_empty()
    {
        return Err(PortfolioError::Validation(INVALID_INPUT.into()));
    }
    Ok(parse_address(address)?)
}

pub async fn fetch_native_balance(
    rpc: &dyn EvmRpc,
    chain: &ChainDescriptor,
    address: &str,
    decimals: NativeDecimals,
) -> NativeBalance {
    match read_native(rpc, chain, address, decimals).await {
        Ok(balance) => balance,
        Err(e) => {
            log::error!("Error fetching EVM native balance on {}: {e}", chain.name);
            NativeBalance::failed(&e)
        }
    }
}

async fn read_native(
    rpc: &dyn EvmRpc,
    chain: &ChainDescriptor,
    address: &str,
    decimals: NativeDecimals,
) -> Result<NativeBalance, PortfolioError> {
    let owner = validate(chain, address)?;
    let raw = rpc.get_balance(owner).await?;

    let amount = format_units(raw, decimals.resolve(chain.native_token.decimals));
    let usd = usd_value(&amount, parse_price(chain.native_token.price_usd.as_deref()));
    Ok(NativeBalance {
        amount: Some(amount),
        usd,
        error: None,
    })
}

/// Reads every listed token in one multicall. Zero and unreadable balances
/// are left out.
pub async fn fetch_erc20_balances(
    rpc: &dyn EvmRpc,
    chain: &ChainDescriptor,
    address: &str,
    tokens: &[TokenDescriptor],
) -> TokenBalances {
    match read_erc20(rpc, chain, address, tokens).await {
        Ok(balances) => balances,
        Err(e) => {
            log::error!("Error fetching ERC-20 balances on {}: {e}", chain.name);
            TokenBalances::failed(&e)
        }
    }
}

async fn read_erc20(
    rpc: &dyn EvmRpc,
    chain: &ChainDescriptor,
    address: &str,
    tokens: &[TokenDescriptor],
) -> Result<TokenBalances, PortfolioError> {
    let owner = validate(chain, address)?;

    let multicall = match chain.multicall_address.as_deref() {
        Some(multicall) if !multicall.is_empty() => parse_address(multicall)?,
        _ => return Err(PortfolioError::Validation(NO_MULTICALL.into())),
    };

    if tokens.is_empty() {
        return Err(PortfolioError::Validation(NO_TOKENS.into()));
    }

    let readable: Vec<(&TokenDescriptor, Address)> = tokens
        .iter()
        .filter_map(|token| match parse_address(&token.address) {
            Ok(contract) => Some((token, contract)),
            Err(e) => {
                log::debug!("Skipping token {} on {}: {e}", token.symbol, chain.name);
                None
            }
        })
        .collect();
    let contracts: Vec<Address> = readable.iter().map(|(_, contract)| *contract).collect();

    let raw = fetch_token_balances(rpc, multicall, owner, &contracts).await?;

    let balances = readable
        .into_iter()
        .zip(raw)
        .filter_map(|((token, _), balance)| {
            let balance = balance.filter(|b| !b.is_zero())?;
            let amount = format_units(balance, token.decimals);
            Some(BalanceResult {
                token: Some(token.clone()),
                symbol: token.symbol.clone(),
                usd_value: usd_value(&amount, parse_price(token.price_usd.as_deref())),
                amount: Some(amount),
            })
        })
        .collect();

    Ok(TokenBalances::from_balances(balances))
}
