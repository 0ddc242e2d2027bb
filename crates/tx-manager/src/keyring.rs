//! Signing collaborator.

use std::collections::HashMap;

use async_trait::async_trait;
use chain_sol::encode_pubkey;
use ed25519_dalek::{Signer, SigningKey};
use parking_lot::RwLock;
use zeroize::Zeroize;

use crate::error::{TxError, TxResult};

#[async_trait]
pub trait Keyring: Send + Sync {
    /// Ed25519 signature of `message` by the key of `account` (a Base58
    /// address). Always 64 bytes.
    async fn sign(&self, message: &[u8], account: &str) -> TxResult<Vec<u8>>;
}

/// Keyring holding Ed25519 keys in process memory.
///
/// `SigningKey` wipes its secret on drop.
#[derive(Default)]
pub struct InMemoryKeyring {
    keys: RwLock<HashMap<String, SigningKey>>,
}

impl InMemoryKeyring {
    pub fn new() -> Self {
        Self::default()
    }

    /// Import a 32-byte Ed25519 secret and return its address.
    pub fn add_secret_key(&self, mut secret: [u8; 32]) -> String {
        let key = SigningKey::from_bytes(&secret);
        secret.zeroize();

        let address = encode_pubkey(&key.verifying_key().to_bytes());
        self.keys.write().insert(address.clone(), key);
        address
    }

    pub fn remove(&self, account: &str) -> bool {
        self.keys.write().remove(account).is_some()
    }

    pub fn contains(&self, account: &str) -> bool {
        self.keys.read().contains_key(account)
    }
}

#[async_trait]
impl Keyring for InMemoryKeyring {
    async fn sign(&self, message: &[u8], account: &str) -> TxResult<Vec<u8>> {
        let keys = self.keys.read();
        let key = keys
            .get(account)
            .ok_or_else(|| TxError::InternalError(format!("no key for account {account}")))?;
        Ok(key.sign(message).to_bytes().to_vec())
    }
}
