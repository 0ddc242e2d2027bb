//! Scripted collaborators shared by the integration tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use ed25519_dalek::{Signature, SigningKey, Verifier, VerifyingKey};
use parking_lot::Mutex;

use sol_tx_manager::chain_sol::{
    decode_pubkey, encode_pubkey, CompressedNftProof, SendOptions, Transaction,
};
use sol_tx_manager::{
    AccountInfo, DenyList, InMemoryKeyring, InMemoryTxStorage, LatestBlockhash,
    NftMetadataService, RpcClient, SignatureStatus, SolanaTxManager, TransactionStatus, TxError,
    TxManagerConfig, TxManagerDeps, TxMeta, TxResult, TxStorage,
};

pub const CHAIN: &str = "0x65";
pub const SENDER_SEED: [u8; 32] = [1u8; 32];

pub fn address(seed: u8) -> String {
    encode_pubkey(&SigningKey::from_bytes(&[seed; 32]).verifying_key().to_bytes())
}

#[derive(Default)]
pub struct RpcState {
    pub blockhash_calls: u64,
    pub last_valid_block_height: u64,
    pub block_height: u64,
    pub fail_next_blockhash: Option<TxError>,
    pub fail_next_send: Option<TxError>,
    pub statuses: HashMap<String, SignatureStatus>,
    /// Append a spurious entry to every status batch.
    pub extra_status: bool,
    pub accounts: HashMap<String, AccountInfo>,
    pub account_queries: Vec<(String, String)>,
    pub sent: Vec<(String, Option<SendOptions>)>,
    pub fee: u64,
    pub fee_queries: Vec<String>,
}

#[derive(Default)]
pub struct MockRpc {
    pub state: Mutex<RpcState>,
}

impl MockRpc {
    pub fn set_block_height(&self, height: u64) {
        self.state.lock().block_height = height;
    }

    pub fn set_status(&self, signature: &str, err: &str, confirmation_status: &str) {
        self.state.lock().statuses.insert(
            signature.to_string(),
            SignatureStatus {
                slot: 1,
                confirmations: None,
                err: err.to_string(),
                confirmation_status: confirmation_status.to_string(),
            },
        );
    }

    pub fn sent_count(&self) -> usize {
        self.state.lock().sent.len()
    }

    /// Decode the `index`-th submitted transaction.
    pub fn sent_transaction(&self, index: usize) -> Transaction {
        let encoded = self.state.lock().sent[index].0.clone();
        let bytes = BASE64.decode(encoded).unwrap();
        Transaction::from_signed_transaction_bytes(&bytes).unwrap()
    }
}

#[async_trait]
impl RpcClient for MockRpc {
    async fn get_latest_blockhash(&self, _chain_id: &str) -> TxResult<LatestBlockhash> {
        let mut state = self.state.lock();
        if let Some(err) = state.fail_next_blockhash.take() {
            return Err(err);
        }
        state.blockhash_calls += 1;
        Ok(LatestBlockhash {
            blockhash: encode_pubkey(&[100 + state.blockhash_calls as u8; 32]),
            last_valid_block_height: state.last_valid_block_height,
        })
    }

    async fn get_block_height(&self, _chain_id: &str) -> TxResult<u64> {
        Ok(self.state.lock().block_height)
    }

    async fn get_signature_statuses(
        &self,
        _chain_id: &str,
        signatures: &[String],
    ) -> TxResult<Vec<Option<SignatureStatus>>> {
        let state = self.state.lock();
        let mut statuses: Vec<_> = signatures
            .iter()
            .map(|sig| state.statuses.get(sig).cloned())
            .collect();
        if state.extra_status {
            statuses.push(None);
        }
        Ok(statuses)
    }

    async fn get_account_info(
        &self,
        chain_id: &str,
        address: &str,
    ) -> TxResult<Option<AccountInfo>> {
        let mut state = self.state.lock();
        state
            .account_queries
            .push((chain_id.to_string(), address.to_string()));
        Ok(state.accounts.get(address).cloned())
    }

    async fn send_transaction(
        &self,
        _chain_id: &str,
        signed_tx_base64: &str,
        options: Option<&SendOptions>,
    ) -> TxResult<String> {
        let mut state = self.state.lock();
        if let Some(err) = state.fail_next_send.take() {
            return Err(err);
        }
        state
            .sent
            .push((signed_tx_base64.to_string(), options.cloned()));
        Ok(format!("sig{}", state.sent.len()))
    }

    async fn get_fee_for_message(&self, _chain_id: &str, message_base64: &str) -> TxResult<u64> {
        let mut state = self.state.lock();
        state.fee_queries.push(message_base64.to_string());
        Ok(state.fee)
    }
}

#[derive(Default)]
pub struct MockNftMetadata {
    pub proofs: Mutex<HashMap<String, CompressedNftProof>>,
}

#[async_trait]
impl NftMetadataService for MockNftMetadata {
    async fn fetch_compressed_nft_proof(&self, token_address: &str) -> Option<CompressedNftProof> {
        self.proofs.lock().get(token_address).cloned()
    }
}

/// Storage that yields to the scheduler after every read, so concurrent
/// steps interleave the way they would against a remote store.
pub struct YieldingStorage {
    inner: Arc<InMemoryTxStorage>,
    confirmed_writes: AtomicUsize,
}

impl YieldingStorage {
    pub fn new(inner: Arc<InMemoryTxStorage>) -> Self {
        Self {
            inner,
            confirmed_writes: AtomicUsize::new(0),
        }
    }

    /// Number of writes that stored a `Confirmed` meta.
    pub fn confirmed_writes(&self) -> usize {
        self.confirmed_writes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TxStorage for YieldingStorage {
    async fn add_or_update_tx(&self, meta: &TxMeta) -> bool {
        if meta.status == TransactionStatus::Confirmed {
            self.confirmed_writes.fetch_add(1, Ordering::SeqCst);
        }
        self.inner.add_or_update_tx(meta).await
    }

    async fn get_tx(&self, id: &str) -> Option<TxMeta> {
        let meta = self.inner.get_tx(id).await;
        tokio::task::yield_now().await;
        meta
    }

    async fn get_transactions_by_status(
        &self,
        chain_id: Option<&str>,
        status: Option<TransactionStatus>,
        from: Option<&str>,
    ) -> Vec<TxMeta> {
        let metas = self
            .inner
            .get_transactions_by_status(chain_id, status, from)
            .await;
        tokio::task::yield_now().await;
        metas
    }
}

pub struct Fixture {
    pub manager: Arc<SolanaTxManager>,
    pub rpc: Arc<MockRpc>,
    pub storage: Arc<InMemoryTxStorage>,
    pub keyring: Arc<InMemoryKeyring>,
    pub nft: Arc<MockNftMetadata>,
    pub policy: Arc<DenyList>,
    /// Address of the keyring's only account.
    pub from: String,
}

pub fn fixture() -> Fixture {
    fixture_with(TxManagerConfig::default())
}

pub fn fixture_with(config: TxManagerConfig) -> Fixture {
    let storage = Arc::new(InMemoryTxStorage::new());
    fixture_on(config, storage.clone(), storage)
}

/// Wire the manager to `tx_storage`; `storage` is the in-memory store
/// underneath it that tests inspect directly.
pub fn fixture_on(
    config: TxManagerConfig,
    storage: Arc<InMemoryTxStorage>,
    tx_storage: Arc<dyn TxStorage>,
) -> Fixture {
    let rpc = Arc::new(MockRpc::default());
    rpc.state.lock().last_valid_block_height = 1000;

    let keyring = Arc::new(InMemoryKeyring::new());
    let from = keyring.add_secret_key(SENDER_SEED);
    let nft = Arc::new(MockNftMetadata::default());
    let policy = Arc::new(DenyList::default());

    let manager = SolanaTxManager::new(
        config,
        TxManagerDeps {
            rpc: rpc.clone(),
            keyring: keyring.clone(),
            storage: tx_storage,
            nft_metadata: nft.clone(),
            address_policy: policy.clone(),
        },
    );

    Fixture {
        manager,
        rpc,
        storage,
        keyring,
        nft,
        policy,
        from,
    }
}

/// Whether `tx` carries a valid signature of `signer` over its message.
pub fn verify_signature(tx: &Transaction, signer: &str) -> bool {
    let Some(sig) = tx.raw_signatures.get(signer) else {
        return false;
    };
    let (message, _) = tx.serialized_message().unwrap();
    let key = VerifyingKey::from_bytes(&decode_pubkey(signer).unwrap()).unwrap();
    let sig = Signature::from_slice(sig).unwrap();
    key.verify(&message, &sig).is_ok()
}
