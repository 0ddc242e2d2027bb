//! Transaction state machine.
//!
//! Each step reads the meta from storage, mutates the local copy and writes
//! it back before awaiting the next collaborator call. Nothing holds a meta
//! across a suspension point, so a later step always sees the last
//! persisted state.
//!
//! Operations that mutate metas run one at a time behind the manager's
//! sequence lock, whether they come from a caller or from the block tracker
//! listener. Internal steps reached from inside a locked operation never
//! take the lock again.

use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Weak};

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use chain_sol::Transaction;
use chrono::Utc;
use parking_lot::Mutex;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::block_tracker::{BlockTracker, BlockTrackerEvent};
use crate::blockhash::resolve_blockhash;
use crate::config::TxManagerConfig;
use crate::error::{TxError, TxResult};
use crate::keyring::Keyring;
use crate::meta::{generate_meta_id, TransactionStatus, TxMeta};
use crate::nft::NftMetadataService;
use crate::pending::PendingTxTracker;
use crate::policy::AddressPolicy;
use crate::rpc::RpcClient;
use crate::storage::TxStorage;

/// Collaborators the manager is wired to.
#[derive(Clone)]
pub struct TxManagerDeps {
    pub rpc: Arc<dyn RpcClient>,
    pub keyring: Arc<dyn Keyring>,
    pub storage: Arc<dyn TxStorage>,
    pub nft_metadata: Arc<dyn NftMetadataService>,
    pub address_policy: Arc<dyn AddressPolicy>,
}

pub struct SolanaTxManager {
    pub(crate) config: TxManagerConfig,
    pub(crate) rpc: Arc<dyn RpcClient>,
    keyring: Arc<dyn Keyring>,
    storage: Arc<dyn TxStorage>,
    pub(crate) nft_metadata: Arc<dyn NftMetadataService>,
    pub(crate) address_policy: Arc<dyn AddressPolicy>,
    block_tracker: Arc<BlockTracker>,
    pending: PendingTxTracker,
    sequence: tokio::sync::Mutex<()>,
    listener: Mutex<Option<JoinHandle<()>>>,
}

impl SolanaTxManager {
    /// Build the manager and subscribe it to block tracker updates.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn new(config: TxManagerConfig, deps: TxManagerDeps) -> Arc<Self> {
        let block_tracker =
            BlockTracker::new(deps.rpc.clone(), config.blockhash_refresh_interval());
        let events = block_tracker.subscribe();

        let manager = Arc::new(Self {
            pending: PendingTxTracker::new(deps.rpc.clone(), deps.storage.clone()),
            config,
            rpc: deps.rpc,
            keyring: deps.keyring,
            storage: deps.storage,
            nft_metadata: deps.nft_metadata,
            address_policy: deps.address_policy,
            block_tracker,
            sequence: tokio::sync::Mutex::new(()),
            listener: Mutex::new(None),
        });

        let handle = spawn_blockhash_listener(Arc::downgrade(&manager), events);
        *manager.listener.lock() = Some(handle);
        manager
    }

    pub fn config(&self) -> &TxManagerConfig {
        &self.config
    }

    pub fn block_tracker(&self) -> &Arc<BlockTracker> {
        &self.block_tracker
    }

    pub async fn get_tx_meta(&self, id: &str) -> Option<TxMeta> {
        self.storage.get_tx(id).await
    }

    /// Store `tx` as a new `Unapproved` meta and return its id.
    pub async fn add_unapproved_transaction(
        &self,
        chain_id: &str,
        from: &str,
        tx: Transaction,
        origin: Option<String>,
    ) -> TxResult<String> {
        if from.is_empty() {
            return Err(TxError::InvalidParams("from address is empty".into()));
        }
        if chain_id.is_empty() {
            return Err(TxError::InvalidParams("chain id is empty".into()));
        }

        let meta = TxMeta::new(from, chain_id, tx, origin);
        let _sequence = self.sequence.lock().await;
        self.persist(&meta).await?;
        info!(tx_meta_id = %meta.id, chain_id, tx_type = ?meta.tx.tx_type, "transaction added");
        Ok(meta.id)
    }

    /// Resolve the blockhash, sign with the keyring and submit.
    pub async fn approve_transaction(&self, id: &str) -> TxResult<()> {
        let _sequence = self.sequence.lock().await;
        let mut meta = self.load(id).await?;
        ensure_awaiting_approval(&meta)?;

        resolve_blockhash(
            &self.block_tracker,
            self.rpc.as_ref(),
            self.config.valid_block_height_threshold,
            &meta.chain_id,
            &mut meta.tx.message,
        )
        .await?;

        let (message, signers) = meta.tx.serialized_message()?;
        if !signers.contains(&meta.from) {
            return Err(TxError::InternalError(format!(
                "{} is not a signer of transaction {id}",
                meta.from
            )));
        }
        let signature = self.keyring.sign(&message, &meta.from).await?;
        let signed = meta
            .tx
            .signed_transaction_bytes(&HashMap::from([(meta.from.clone(), signature)]))?;

        meta.status = TransactionStatus::Approved;
        self.persist(&meta).await?;
        info!(
            tx_meta_id = %meta.id,
            blockhash = %meta.tx.message.recent_blockhash,
            last_valid_block_height = meta.tx.message.last_valid_block_height,
            "transaction approved"
        );

        self.submit(&meta.id, &signed).await
    }

    /// Resolve and persist the blockhash, then return the message bytes an
    /// external signer has to sign. The meta stays `Unapproved`.
    pub async fn get_transaction_message_to_sign(&self, id: &str) -> TxResult<Vec<u8>> {
        let _sequence = self.sequence.lock().await;
        let mut meta = self.load(id).await?;
        resolve_blockhash(
            &self.block_tracker,
            self.rpc.as_ref(),
            self.config.valid_block_height_threshold,
            &meta.chain_id,
            &mut meta.tx.message,
        )
        .await?;

        let (message, _) = meta.tx.serialized_message()?;
        self.persist(&meta).await?;
        debug!(tx_meta_id = %meta.id, len = message.len(), "message prepared for external signing");
        Ok(message)
    }

    /// Submit a transaction whose `from` signature was produced by a
    /// hardware wallet over [`get_transaction_message_to_sign`] output.
    ///
    /// [`get_transaction_message_to_sign`]: Self::get_transaction_message_to_sign
    pub async fn process_hardware_signature(&self, id: &str, signature: &[u8]) -> TxResult<()> {
        let _sequence = self.sequence.lock().await;
        let mut meta = self.load(id).await?;
        ensure_awaiting_approval(&meta)?;
        if meta.tx.message.recent_blockhash.is_empty() {
            return Err(TxError::InternalError(format!(
                "transaction {id} has no blockhash to sign over"
            )));
        }

        let signed = meta
            .tx
            .signed_transaction_bytes(&HashMap::from([(meta.from.clone(), signature.to_vec())]))?;

        meta.status = TransactionStatus::Approved;
        self.persist(&meta).await?;
        info!(tx_meta_id = %meta.id, "hardware-signed transaction approved");

        self.submit(&meta.id, &signed).await
    }

    /// Clone a failed or dropped transaction into a fresh `Unapproved` meta
    /// and return its id. The source meta is left as is.
    pub async fn retry_transaction(&self, id: &str) -> TxResult<String> {
        let _sequence = self.sequence.lock().await;
        let mut meta = self.load(id).await?;
        if !meta.is_retriable() {
            return Err(TxError::InvalidParams(format!(
                "transaction {id} is {:?} and cannot be retried",
                meta.status
            )));
        }

        let message = &mut meta.tx.message;
        // A durable nonce blockhash stays valid; anything else must be
        // replaced at approval. A foreign account order only matters for
        // the signatures being discarded below.
        if !message.uses_durable_nonce() {
            message.recent_blockhash.clear();
            message.static_account_keys = None;
        }
        message.last_valid_block_height = 0;
        meta.tx.clear_raw_signatures();

        meta.id = generate_meta_id();
        meta.status = TransactionStatus::Unapproved;
        meta.created_time = Utc::now();
        meta.submitted_time = None;
        meta.confirmed_time = None;
        meta.tx_hash = None;
        meta.signature_status = None;

        self.persist(&meta).await?;
        info!(tx_meta_id = %meta.id, retried_from = id, "transaction retried");
        Ok(meta.id)
    }

    /// Fee in lamports for the transaction's message under the latest
    /// blockhash. Nothing is persisted.
    pub async fn get_estimated_tx_fee(&self, id: &str) -> TxResult<u64> {
        let meta = self.load(id).await?;
        let latest = self.block_tracker.latest_blockhash(&meta.chain_id, true).await?;

        let mut tx = meta.tx;
        tx.message.recent_blockhash = latest.blockhash;
        tx.message.last_valid_block_height = latest.last_valid_block_height;
        let encoded = tx.base64_encoded_message()?;

        self.rpc.get_fee_for_message(&meta.chain_id, &encoded).await
    }

    /// Poll signature statuses of submitted transactions.
    ///
    /// With a chain id only that chain is polled, otherwise every chain that
    /// has a `Submitted` transaction. Afterwards the block tracker runs for
    /// exactly the chains that still have pending transactions.
    pub async fn update_pending_transactions(&self, chain_id: Option<&str>) {
        let _sequence = self.sequence.lock().await;
        self.poll_pending(chain_id).await;
    }

    async fn poll_pending(&self, chain_id: Option<&str>) {
        let chains: BTreeSet<String> = match chain_id {
            Some(chain) => BTreeSet::from([chain.to_string()]),
            None => self.pending_chain_ids().await,
        };

        for chain in &chains {
            match self.pending.poll_chain(chain).await {
                Ok(0) => {}
                Ok(updated) => debug!(chain_id = %chain, updated, "pending transactions polled"),
                Err(e) => warn!(chain_id = %chain, error = %e, "pending transaction poll failed"),
            }
        }

        let still_pending = self.pending_chain_ids().await;
        self.check_if_block_tracker_should_run(&still_pending);
    }

    /// Run the block tracker for `pending_chains` and nothing else.
    pub fn check_if_block_tracker_should_run(&self, pending_chains: &BTreeSet<String>) {
        for chain in pending_chains {
            if !self.block_tracker.is_running(chain) {
                self.block_tracker.start(chain);
            }
        }
        for chain in self.block_tracker.running_chains() {
            if !pending_chains.contains(&chain) {
                self.block_tracker.stop(&chain);
            }
        }
    }

    async fn pending_chain_ids(&self) -> BTreeSet<String> {
        self.storage
            .get_transactions_by_status(None, Some(TransactionStatus::Submitted), None)
            .await
            .into_iter()
            .map(|meta| meta.chain_id)
            .collect()
    }

    /// Send already signed bytes for `id` and record the outcome.
    async fn submit(&self, id: &str, signed: &[u8]) -> TxResult<()> {
        let meta = self.load_expected(id).await?;
        let result = self
            .rpc
            .send_transaction(
                &meta.chain_id,
                &BASE64.encode(signed),
                meta.tx.send_options.as_ref(),
            )
            .await;

        let mut meta = self.load_expected(id).await?;
        match &result {
            Ok(tx_hash) => {
                meta.status = TransactionStatus::Submitted;
                meta.submitted_time = Some(Utc::now());
                meta.tx_hash = Some(tx_hash.clone());
            }
            Err(e) => {
                warn!(tx_meta_id = %id, error = %e, "transaction submission failed");
                meta.status = TransactionStatus::Error;
            }
        }
        self.persist(&meta).await?;

        let tx_hash = result?;
        info!(tx_meta_id = %id, %tx_hash, chain_id = %meta.chain_id, "transaction submitted");
        self.poll_pending(Some(meta.chain_id.as_str())).await;
        Ok(())
    }

    async fn load(&self, id: &str) -> TxResult<TxMeta> {
        self.storage
            .get_tx(id)
            .await
            .ok_or_else(|| TxError::NotFound(format!("transaction {id}")))
    }

    /// A meta this flow itself just wrote.
    async fn load_expected(&self, id: &str) -> TxResult<TxMeta> {
        self.storage
            .get_tx(id)
            .await
            .ok_or_else(|| TxError::InternalError(format!("transaction {id} vanished from storage")))
    }

    async fn persist(&self, meta: &TxMeta) -> TxResult<()> {
        if self.storage.add_or_update_tx(meta).await {
            Ok(())
        } else {
            warn!(tx_meta_id = %meta.id, status = ?meta.status, "failed to persist transaction");
            Err(TxError::InternalError(format!(
                "failed to persist transaction {}",
                meta.id
            )))
        }
    }
}

fn ensure_awaiting_approval(meta: &TxMeta) -> TxResult<()> {
    match meta.status {
        TransactionStatus::Unapproved | TransactionStatus::Approved => Ok(()),
        status => Err(TxError::InvalidParams(format!(
            "transaction {} is {status:?}, not awaiting approval",
            meta.id
        ))),
    }
}

impl Drop for SolanaTxManager {
    fn drop(&mut self) {
        if let Some(handle) = self.listener.get_mut().take() {
            handle.abort();
        }
        self.block_tracker.stop_all();
    }
}

fn spawn_blockhash_listener(
    manager: Weak<SolanaTxManager>,
    mut events: tokio::sync::broadcast::Receiver<BlockTrackerEvent>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(BlockTrackerEvent::BlockhashUpdated { chain_id, .. }) => {
                    let Some(manager) = manager.upgrade() else {
                        break;
                    };
                    manager.update_pending_transactions(Some(chain_id.as_str())).await;
                }
                Err(RecvError::Lagged(skipped)) => {
                    debug!(skipped, "lagged on blockhash updates");
                }
                Err(RecvError::Closed) => break,
            }
        }
    })
}
