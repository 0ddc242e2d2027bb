//! Solana transaction lifecycle engine.
//!
//! [`SolanaTxManager`] builds unsigned transactions, resolves their
//! blockhash, signs and submits them, and tracks submitted signatures until
//! they are confirmed, fail or expire. RPC, signing, storage, NFT metadata
//! and address screening are injected as traits.

pub mod block_tracker;
pub mod blockhash;
pub mod config;
pub mod error;
pub mod keyring;
pub mod logging;
pub mod manager;
pub mod meta;
pub mod nft;
mod pending;
pub mod policy;
pub mod rpc;
pub mod storage;
mod tx_data;

pub use block_tracker::{BlockTracker, BlockTrackerEvent};
pub use config::{FeePayerPolicy, TxManagerConfig};
pub use error::{TxError, TxResult};
pub use keyring::{InMemoryKeyring, Keyring};
pub use manager::{SolanaTxManager, TxManagerDeps};
pub use meta::{SignatureStatus, TransactionStatus, TxMeta};
pub use nft::NftMetadataService;
pub use policy::{AddressPolicy, DenyList};
pub use rpc::{AccountInfo, LatestBlockhash, RpcClient};
pub use storage::{InMemoryTxStorage, TxStorage};

pub use chain_sol;
