//! Solana encoding layer for the wallet transaction manager.
//!
//! This crate builds program instructions, assembles and serializes legacy
//! messages, parses and assembles signed transactions and decodes the
//! on-chain account data the wallet needs. It does no I/O and pulls in no
//! `solana-sdk`: the compact wire format is implemented by hand on top of
//! `bs58` and `sha2`.

pub mod address;
pub mod encoding;
pub mod error;
pub mod instruction;
pub mod merkle_tree;
pub mod message;
pub mod programs;
pub mod transaction;

pub use address::{decode_pubkey, encode_pubkey, is_valid_address};
pub use error::SolError;
pub use instruction::{AccountMeta, Instruction};
pub use merkle_tree::{decode_merkle_tree_account, MerkleTreeInfo};
pub use message::Message;
pub use programs::bubblegum::CompressedNftProof;
pub use transaction::{SendOptions, Transaction, TransactionType};
