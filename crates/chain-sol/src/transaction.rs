//! Solana legacy transaction wire format.
//!
//! Transactions are compiled by hand. The layout:
//!
//! ```text
//! Transaction:
//!   num_signatures          compact-u16
//!   signatures              64 bytes * num_signatures
//!   message:
//!     num_required_sigs     u8
//!     num_readonly_signed   u8
//!     num_readonly_unsigned u8
//!     num_accounts          compact-u16
//!     account_keys          32 bytes * num_accounts
//!     recent_blockhash      32 bytes
//!     num_instructions      compact-u16
//!     instructions[]        (program_id_index u8, compact-u16 + account
//!                            indices, compact-u16 + data)
//! ```

use ed25519_dalek::{Signature, VerifyingKey};

use crate::error::SolError;
use crate::memo::build_memo_instruction;

// ---------------------------------------------------------------------------
// Compact-u16 encoding
// ---------------------------------------------------------------------------

/// Encode a `u16` in Solana's compact-u16 (7 bits per byte, LSB first).
pub fn encode_compact_u16(value: u16) -> Vec<u8> {
    let mut val = value as u32;
    let mut out = Vec::with_capacity(3);

    loop {
        let mut byte = (val & 0x7f) as u8;
        val >>= 7;
        if val > 0 {
            byte |= 0x80;
        }
        out.push(byte);
        if val == 0 {
            break;
        }
    }

    out
}

// ---------------------------------------------------------------------------
// Data structures
// ---------------------------------------------------------------------------

/// A single account reference in a Solana instruction.
#[derive(Debug, Clone)]
pub struct SolAccountMeta {
    pub pubkey: [u8; 32],
    pub is_signer: bool,
    pub is_writable: bool,
}

/// A Solana instruction before compilation.
#[derive(Debug, Clone)]
pub struct SolInstruction {
    pub program_id: [u8; 32],
    pub accounts: Vec<SolAccountMeta>,
    pub data: Vec<u8>,
}

/// A compiled, unsigned legacy transaction.
#[derive(Debug, Clone)]
pub struct SolTransaction {
    /// Account keys in canonical order: writable signers (fee payer first),
    /// read-only signers, writable non-signers, read-only non-signers.
    pub account_keys: Vec<[u8; 32]>,
    pub num_required_signatures: u8,
    pub num_readonly_signed: u8,
    pub num_readonly_unsigned: u8,
    pub recent_blockhash: [u8; 32],
    pub compiled_instructions: Vec<CompiledInstruction>,
}

/// An instruction whose account references are indices into `account_keys`.
#[derive(Debug, Clone)]
pub struct CompiledInstruction {
    pub program_id_index: u8,
    pub account_indices: Vec<u8>,
    pub data: Vec<u8>,
}

impl SolTransaction {
    /// The fee payer, always the first account key.
    pub fn fee_payer(&self) -> Option<&[u8; 32]> {
        self.account_keys.first()
    }
}

// ---------------------------------------------------------------------------
// Building
// ---------------------------------------------------------------------------

/// Build a transaction carrying `message` in a single Memo instruction,
/// signed by the fee payer.
pub fn build_memo_transaction(
    fee_payer: &[u8; 32],
    message: &str,
    recent_blockhash: &[u8; 32],
) -> Result<SolTransaction, SolError> {
    let memo = build_memo_instruction(message, &[*fee_payer]);
    compile_transaction(&[memo], fee_payer, recent_blockhash)
}

/// Compile instructions into a transaction with a single fee payer.
pub fn compile_transaction(
    instructions: &[SolInstruction],
    fee_payer: &[u8; 32],
    recent_blockhash: &[u8; 32],
) -> Result<SolTransaction, SolError> {
    struct AccountEntry {
        pubkey: [u8; 32],
        is_signer: bool,
        is_writable: bool,
    }

    impl AccountEntry {
        fn rank(&self) -> u8 {
            match (self.is_signer, self.is_writable) {
                (true, true) => 0,
                (true, false) => 1,
                (false, true) => 2,
                (false, false) => 3,
            }
        }
    }

    // Instruction account lists are tiny, a linear scan beats hashing.
    let mut entries: Vec<AccountEntry> = Vec::new();
    let mut upsert = |pubkey: [u8; 32], signer: bool, writable: bool| {
        if let Some(entry) = entries.iter_mut().find(|e| e.pubkey == pubkey) {
            entry.is_signer |= signer;
            entry.is_writable |= writable;
        } else {
            entries.push(AccountEntry {
                pubkey,
                is_signer: signer,
                is_writable: writable,
            });
        }
    };

    upsert(*fee_payer, true, true);
    for ix in instructions {
        for meta in &ix.accounts {
            upsert(meta.pubkey, meta.is_signer, meta.is_writable);
        }
        upsert(ix.program_id, false, false);
    }

    // Stable sort: the fee payer is inserted first with rank 0 and stays at
    // index 0.
    entries.sort_by_key(AccountEntry::rank);

    if entries.len() > u8::MAX as usize {
        return Err(SolError::TransactionBuildError(format!(
            "{} accounts exceed the legacy message limit",
            entries.len()
        )));
    }

    let count = |pred: fn(&AccountEntry) -> bool| entries.iter().filter(|e| pred(e)).count() as u8;
    let num_required_signatures = count(|e| e.is_signer);
    let num_readonly_signed = count(|e| e.is_signer && !e.is_writable);
    let num_readonly_unsigned = count(|e| !e.is_signer && !e.is_writable);

    let account_keys: Vec<[u8; 32]> = entries.iter().map(|e| e.pubkey).collect();
    let index_of = |key: &[u8; 32]| -> Result<u8, SolError> {
        account_keys
            .iter()
            .position(|k| k == key)
            .map(|i| i as u8)
            .ok_or_else(|| SolError::TransactionBuildError("account not in account keys".into()))
    };

    let compiled_instructions = instructions
        .iter()
        .map(|ix| {
            Ok(CompiledInstruction {
                program_id_index: index_of(&ix.program_id)?,
                account_indices: ix
                    .accounts
                    .iter()
                    .map(|meta| index_of(&meta.pubkey))
                    .collect::<Result<_, _>>()?,
                data: ix.data.clone(),
            })
        })
        .collect::<Result<Vec<_>, SolError>>()?;

    Ok(SolTransaction {
        account_keys,
        num_required_signatures,
        num_readonly_signed,
        num_readonly_unsigned,
        recent_blockhash: *recent_blockhash,
        compiled_instructions,
    })
}

// ---------------------------------------------------------------------------
// Serialization and signatures
// ---------------------------------------------------------------------------

/// Serialize the transaction message (the bytes that get signed).
pub fn serialize_message(tx: &SolTransaction) -> Result<Vec<u8>, SolError> {
    let compact = |len: usize| -> Result<Vec<u8>, SolError> {
        u16::try_from(len)
            .map(encode_compact_u16)
            .map_err(|_| SolError::SerializationError(format!("length {len} exceeds u16")))
    };

    let mut buf = Vec::with_capacity(256);
    buf.push(tx.num_required_signatures);
    buf.push(tx.num_readonly_signed);
    buf.push(tx.num_readonly_unsigned);

    buf.extend_from_slice(&compact(tx.account_keys.len())?);
    for key in &tx.account_keys {
        buf.extend_from_slice(key);
    }

    buf.extend_from_slice(&tx.recent_blockhash);

    buf.extend_from_slice(&compact(tx.compiled_instructions.len())?);
    for ix in &tx.compiled_instructions {
        buf.push(ix.program_id_index);
        buf.extend_from_slice(&compact(ix.account_indices.len())?);
        buf.extend_from_slice(&ix.account_indices);
        buf.extend_from_slice(&compact(ix.data.len())?);
        buf.extend_from_slice(&ix.data);
    }

    Ok(buf)
}

/// Check that `signature` is the fee payer's Ed25519 signature over the
/// transaction message.
pub fn verify_signature(tx: &SolTransaction, signature: &[u8; 64]) -> Result<(), SolError> {
    let fee_payer = tx
        .fee_payer()
        .ok_or_else(|| SolError::TransactionBuildError("transaction has no fee payer".into()))?;

    let key = VerifyingKey::from_bytes(fee_payer)
        .map_err(|e| SolError::SignatureError(format!("fee payer is not a valid key: {e}")))?;

    let message = serialize_message(tx)?;
    key.verify_strict(&message, &Signature::from_bytes(signature))
        .map_err(|e| SolError::SignatureError(format!("verification failed: {e}")))
}

/// Assemble the wire format of a single-signer transaction.
pub fn attach_signature(tx: &SolTransaction, signature: &[u8; 64]) -> Result<Vec<u8>, SolError> {
    if tx.num_required_signatures != 1 {
        return Err(SolError::TransactionBuildError(format!(
            "expected exactly one signer, transaction requires {}",
            tx.num_required_signatures
        )));
    }

    let message = serialize_message(tx)?;
    let mut wire = Vec::with_capacity(1 + 64 + message.len());
    wire.extend_from_slice(&encode_compact_u16(1));
    wire.extend_from_slice(signature);
    wire.extend_from_slice(&message);
    Ok(wire)
}
