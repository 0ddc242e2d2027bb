//! Tunables of the transaction manager.
//!
//! Every field has a default, so an empty TOML document yields the stock
//! configuration:
//!
//! ```toml
//! valid_block_height_threshold = 150
//! blockhash_refresh_interval_secs = 10
//! max_transaction_size = 1232
//! merkle_tree_chain_id = "0x65"
//! compressed_nft_fee_payer = "nft_owner"
//! ```

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const SOLANA_MAINNET: &str = "0x65";
pub const SOLANA_TESTNET: &str = "0x66";
pub const SOLANA_DEVNET: &str = "0x67";

/// Who pays the fee of a compressed NFT transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum FeePayerPolicy {
    /// The current leaf owner reported by the metadata service.
    #[default]
    NftOwner,
    /// The account that initiated the transfer.
    Sender,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxManagerConfig {
    /// Blocks added to the current height when a message keeps a blockhash
    /// it already had.
    #[serde(default = "default_valid_block_height_threshold")]
    pub valid_block_height_threshold: u64,

    #[serde(default = "default_blockhash_refresh_interval_secs")]
    pub blockhash_refresh_interval_secs: u64,

    /// Largest signed transaction accepted from a dApp, in bytes.
    #[serde(default = "default_max_transaction_size")]
    pub max_transaction_size: usize,

    /// Chain queried for compressed NFT Merkle tree accounts.
    #[serde(default = "default_merkle_tree_chain_id")]
    pub merkle_tree_chain_id: String,

    #[serde(default)]
    pub compressed_nft_fee_payer: FeePayerPolicy,
}

fn default_valid_block_height_threshold() -> u64 {
    150
}

fn default_blockhash_refresh_interval_secs() -> u64 {
    10
}

fn default_max_transaction_size() -> usize {
    1232
}

fn default_merkle_tree_chain_id() -> String {
    SOLANA_MAINNET.to_string()
}

impl Default for TxManagerConfig {
    fn default() -> Self {
        Self {
            valid_block_height_threshold: default_valid_block_height_threshold(),
            blockhash_refresh_interval_secs: default_blockhash_refresh_interval_secs(),
            max_transaction_size: default_max_transaction_size(),
            merkle_tree_chain_id: default_merkle_tree_chain_id(),
            compressed_nft_fee_payer: FeePayerPolicy::default(),
        }
    }
}

impl TxManagerConfig {
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.blockhash_refresh_interval_secs == 0 {
            return Err(ConfigError::Invalid(
                "blockhash_refresh_interval_secs must be positive".into(),
            ));
        }
        if self.max_transaction_size == 0 {
            return Err(ConfigError::Invalid(
                "max_transaction_size must be positive".into(),
            ));
        }
        if self.merkle_tree_chain_id.is_empty() {
            return Err(ConfigError::Invalid("merkle_tree_chain_id is empty".into()));
        }
        Ok(())
    }

    pub fn blockhash_refresh_interval(&self) -> Duration {
        Duration::from_secs(self.blockhash_refresh_interval_secs)
    }
}
