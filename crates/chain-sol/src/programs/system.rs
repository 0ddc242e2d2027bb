//! System Program instructions.

use crate::encoding::{uint_from_le_bytes, uint_to_le_bytes};
use crate::error::SolError;
use crate::instruction::{AccountMeta, Instruction};
use crate::programs::{SYSTEM_PROGRAM_ID, SYSVAR_RECENT_BLOCKHASHES_ID};

/// System Program instruction indices, encoded as a little-endian `u32`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum SystemInstruction {
    CreateAccount = 0,
    Assign = 1,
    Transfer = 2,
    CreateAccountWithSeed = 3,
    AdvanceNonceAccount = 4,
}

/// Transfer `lamports` from `from` to `to`.
///
/// Accounts:
///   0. funding account [signer, writable]
///   1. recipient account [writable]
///
/// Data: u32 LE instruction index followed by u64 LE lamports (12 bytes).
pub fn transfer(from: &str, to: &str, lamports: u64) -> Result<Instruction, SolError> {
    if from.is_empty() || to.is_empty() {
        return Err(SolError::InstructionBuild(
            "system transfer requires both from and to addresses".into(),
        ));
    }

    let mut data = uint_to_le_bytes(SystemInstruction::Transfer as u32);
    data.extend_from_slice(&uint_to_le_bytes(lamports));

    Ok(Instruction::new(
        SYSTEM_PROGRAM_ID,
        vec![AccountMeta::new(from, true, true), AccountMeta::new(to, false, true)],
        data,
    ))
}

/// Advance a durable nonce account. Must be the first instruction of a
/// transaction whose recent blockhash is the stored nonce value.
///
/// Accounts:
///   0. nonce account [writable]
///   1. recent blockhashes sysvar [readonly]
///   2. nonce authority [signer]
pub fn advance_nonce_account(
    nonce_account: &str,
    nonce_authority: &str,
) -> Result<Instruction, SolError> {
    if nonce_account.is_empty() || nonce_authority.is_empty() {
        return Err(SolError::InstructionBuild(
            "advance nonce requires nonce account and authority".into(),
        ));
    }

    Ok(Instruction::new(
        SYSTEM_PROGRAM_ID,
        vec![
            AccountMeta::new(nonce_account, false, true),
            AccountMeta::readonly(SYSVAR_RECENT_BLOCKHASHES_ID),
            AccountMeta::new(nonce_authority, true, false),
        ],
        uint_to_le_bytes(SystemInstruction::AdvanceNonceAccount as u32),
    ))
}

/// Whether `ix` is a System Program `AdvanceNonceAccount` instruction.
pub fn is_advance_nonce_account(ix: &Instruction) -> bool {
    ix.program_id == SYSTEM_PROGRAM_ID
        && ix.data.len() >= 4
        && uint_from_le_bytes::<u32>(&ix.data[..4])
            == Some(SystemInstruction::AdvanceNonceAccount as u32)
}
