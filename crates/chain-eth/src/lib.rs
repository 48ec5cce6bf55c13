//! Ethereum/EVM chain support for the portfolio inscriber.
//!
//! This crate provides:
//! - Address parsing and EIP-55 checksums
//! - Minimal ABI encoding/decoding (static words, bytes, tuples, arrays)
//! - ERC-20 `balanceOf` calldata
//! - Multicall3 `aggregate3` batching for token balance reads
//! - A JSON-RPC client seam (`EvmRpc`) with an HTTP implementation
//! - The designated test network and the memo transaction request

pub mod abi;
pub mod address;
pub mod chains;
pub mod erc20;
pub mod error;
pub mod multicall;
pub mod rpc;
pub mod transaction;

pub use alloy_primitives::{Address, B256, U256};
pub use error::EthError;
pub use rpc::{EvmRpc, HttpEvmRpc, TransactionReceipt};
