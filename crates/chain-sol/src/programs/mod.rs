//! Instruction builders for the programs the wallet talks to.
//!
//! Every builder is pure: it validates its inputs, encodes the instruction
//! data and lists the accounts in the order the on-chain program expects.

pub mod bubblegum;
pub mod spl_token;
pub mod system;

/// System Program: `11111111111111111111111111111111` (32 zero bytes).
pub const SYSTEM_PROGRAM_ID: &str = "11111111111111111111111111111111";

/// SPL Token Program.
pub const TOKEN_PROGRAM_ID: &str = "TokenkegQfeZyiNwAJbNbGKPFXCWuBvf9Ss623VQ5DA";

/// SPL Associated Token Account Program.
pub const ASSOCIATED_TOKEN_PROGRAM_ID: &str = "ATokenGPvbdGVxr1b2hvZbsiqW5xWH25efTNsLJA8knL";

/// Metaplex Bubblegum (compressed NFT) Program.
pub const BUBBLEGUM_PROGRAM_ID: &str = "BGUMAp9Gq7iTEuizy4pqaxsTyUCBK68MDfK752saRPUY";

/// SPL Account Compression Program, owner of concurrent Merkle tree accounts.
pub const ACCOUNT_COMPRESSION_PROGRAM_ID: &str = "cmtDvXumGCrqC1Age74AVPhSRVXJMd8PJS91L8KbNCK";

/// SPL Noop Program, used by account compression as a log wrapper.
pub const NOOP_PROGRAM_ID: &str = "noopb9bkMVfRPU8AsbpTUg8AQkHtKwMYZiFUjNRtMmV";

/// Recent blockhashes sysvar, required by `AdvanceNonceAccount`.
pub const SYSVAR_RECENT_BLOCKHASHES_ID: &str = "SysvarRecentB1ockHashes11111111111111111111";
