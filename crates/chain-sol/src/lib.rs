//! Solana chain support for the portfolio inscriber.
//!
//! Address handling, the Memo and SPL Token program ids, the legacy
//! transaction wire format, and a JSON-RPC seam (`SolanaRpc`) for balance
//! reads, broadcast and confirmation. Transactions are compiled by hand
//! rather than through `solana-sdk`; signing itself is left to the wallet
//! provider and only verified here.

pub mod address;
pub mod error;
pub mod memo;
pub mod rpc;
pub mod spl_token;
pub mod transaction;

// Re-export key public types for ergonomic imports.
pub use address::{address_to_bytes, bytes_to_address, validate_address};
pub use error::SolError;
pub use memo::{build_memo_instruction, MEMO_PROGRAM_ID};
pub use rpc::{
    confirm_transaction, Commitment, HttpSolanaRpc, LatestBlockhash, SignatureStatus, SolanaRpc,
};
pub use spl_token::{ParsedTokenAccount, TOKEN_PROGRAM_ID};
pub use transaction::{
    attach_signature, build_memo_transaction, compile_transaction, serialize_message,
    verify_signature, SolAccountMeta, SolInstruction, SolTransaction,
};
