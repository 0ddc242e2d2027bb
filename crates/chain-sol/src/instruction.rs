//! Program-agnostic instruction types.
//!
//! Accounts are carried as Base58 address strings. They are only decoded to
//! raw bytes when a message is serialized, so building an instruction never
//! fails because of an address that is well-formed but unknown.

use serde::{Deserialize, Serialize};

/// An account referenced by an instruction, with its access flags.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountMeta {
    pub pubkey: String,
    /// Only present on metas decoded from dApp-supplied transactions.
    pub rent_epoch: Option<u64>,
    pub is_signer: bool,
    pub is_writable: bool,
}

impl AccountMeta {
    pub fn new(pubkey: impl Into<String>, is_signer: bool, is_writable: bool) -> Self {
        Self {
            pubkey: pubkey.into(),
            rent_epoch: None,
            is_signer,
            is_writable,
        }
    }

    /// A non-signer, read-only account.
    pub fn readonly(pubkey: impl Into<String>) -> Self {
        Self::new(pubkey, false, false)
    }
}

/// A single program invocation: the program, the accounts it touches and its
/// opaque argument bytes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Instruction {
    pub program_id: String,
    pub accounts: Vec<AccountMeta>,
    pub data: Vec<u8>,
}

impl Instruction {
    pub fn new(program_id: impl Into<String>, accounts: Vec<AccountMeta>, data: Vec<u8>) -> Self {
        Self {
            program_id: program_id.into(),
            accounts,
            data,
        }
    }
}
