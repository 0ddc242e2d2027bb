//! Persistence of transaction metas.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;
use tracing::warn;

use crate::meta::{TransactionStatus, TxMeta};

#[async_trait]
pub trait TxStorage: Send + Sync {
    /// Insert or replace the meta with `meta.id`. Returns false when the
    /// write did not happen.
    async fn add_or_update_tx(&self, meta: &TxMeta) -> bool;

    async fn get_tx(&self, id: &str) -> Option<TxMeta>;

    /// Metas matching every filter that is set.
    async fn get_transactions_by_status(
        &self,
        chain_id: Option<&str>,
        status: Option<TransactionStatus>,
        from: Option<&str>,
    ) -> Vec<TxMeta>;
}

/// Storage keeping metas as JSON documents in memory, the shape a
/// preferences-backed store would persist.
#[derive(Default)]
pub struct InMemoryTxStorage {
    records: Mutex<BTreeMap<String, String>>,
    read_only: AtomicBool,
}

impl InMemoryTxStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make subsequent writes fail, as a full disk or a locked profile would.
    pub fn set_read_only(&self, read_only: bool) {
        self.read_only.store(read_only, Ordering::SeqCst);
    }

    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn decode(id: &str, json: &str) -> Option<TxMeta> {
        match serde_json::from_str(json) {
            Ok(meta) => Some(meta),
            Err(e) => {
                warn!(id, error = %e, "dropping undecodable transaction record");
                None
            }
        }
    }
}

#[async_trait]
impl TxStorage for InMemoryTxStorage {
    async fn add_or_update_tx(&self, meta: &TxMeta) -> bool {
        if self.read_only.load(Ordering::SeqCst) {
            return false;
        }
        match serde_json::to_string(meta) {
            Ok(json) => {
                self.records.lock().insert(meta.id.clone(), json);
                true
            }
            Err(e) => {
                warn!(tx_meta_id = %meta.id, error = %e, "failed to encode transaction record");
                false
            }
        }
    }

    async fn get_tx(&self, id: &str) -> Option<TxMeta> {
        let json = self.records.lock().get(id).cloned()?;
        Self::decode(id, &json)
    }

    async fn get_transactions_by_status(
        &self,
        chain_id: Option<&str>,
        status: Option<TransactionStatus>,
        from: Option<&str>,
    ) -> Vec<TxMeta> {
        let records: Vec<(String, String)> = self
            .records
            .lock()
            .iter()
            .map(|(id, json)| (id.clone(), json.clone()))
            .collect();

        let mut metas: Vec<TxMeta> = records
            .iter()
            .filter_map(|(id, json)| Self::decode(id, json))
            .filter(|meta| chain_id.map_or(true, |c| meta.chain_id == c))
            .filter(|meta| status.map_or(true, |s| meta.status == s))
            .filter(|meta| from.map_or(true, |f| meta.from == f))
            .collect();
        metas.sort_by(|a, b| a.created_time.cmp(&b.created_time));
        metas
    }
}
