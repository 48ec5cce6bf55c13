//! SPL Memo program instruction.

use crate::transaction::{SolAccountMeta, SolInstruction};

/// SPL Memo Program v2: `MemoSq4gqABAXKb96qnH8TuFNJMbHxSNhBQ7YjKSMRh`
pub const MEMO_PROGRAM_ID: [u8; 32] = [
    0x05, 0x4a, 0x53, 0x5a, 0x99, 0x29, 0x21, 0x06, 0x4d, 0x24, 0xe8, 0x71, 0x60, 0xda, 0x38,
    0x7c, 0x7b, 0x90, 0x8b, 0xd5, 0x07, 0x36, 0x06, 0xa8, 0x87, 0x0a, 0x67, 0x78, 0x10, 0xc3,
    0x25, 0x70,
];

/// Build a Memo instruction carrying `message` as raw UTF-8.
///
/// Every key in `signers` is attached as a read-only signer; the Memo program
/// fails the transaction if any of them did not sign.
pub fn build_memo_instruction(message: &str, signers: &[[u8; 32]]) -> SolInstruction {
    SolInstruction {
        program_id: MEMO_PROGRAM_ID,
        accounts: signers
            .iter()
            .map(|pubkey| SolAccountMeta {
                pubkey: *pubkey,
                is_signer: true,
                is_writable: false,
            })
            .collect(),
        data: message.as_bytes().to_vec(),
    }
}
