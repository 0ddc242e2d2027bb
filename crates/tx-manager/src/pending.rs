//! Status polling for submitted transactions.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use crate::error::TxResult;
use crate::meta::{SignatureStatus, TransactionStatus, TxMeta};
use crate::rpc::RpcClient;
use crate::storage::TxStorage;

pub(crate) struct PendingTxTracker {
    rpc: Arc<dyn RpcClient>,
    storage: Arc<dyn TxStorage>,
}

impl PendingTxTracker {
    pub(crate) fn new(rpc: Arc<dyn RpcClient>, storage: Arc<dyn TxStorage>) -> Self {
        Self { rpc, storage }
    }

    /// Poll every `Submitted` meta of `chain_id` once. Returns how many metas
    /// changed.
    pub(crate) async fn poll_chain(&self, chain_id: &str) -> TxResult<usize> {
        let pending = self
            .storage
            .get_transactions_by_status(Some(chain_id), Some(TransactionStatus::Submitted), None)
            .await;
        if pending.is_empty() {
            return Ok(0);
        }

        let block_height = self.rpc.get_block_height(chain_id).await?;
        let (ids, signatures): (Vec<String>, Vec<String>) = pending
            .into_iter()
            .map(|meta| (meta.id, meta.tx_hash.unwrap_or_default()))
            .unzip();

        let statuses = self
            .rpc
            .get_signature_statuses(chain_id, &signatures)
            .await?;
        if statuses.len() != ids.len() {
            warn!(
                chain_id,
                requested = ids.len(),
                received = statuses.len(),
                "signature status count mismatch"
            );
            return Ok(0);
        }

        let mut updated = 0;
        for (id, status) in ids.iter().zip(statuses) {
            // Another step may have moved the meta since the batch was read.
            let Some(mut meta) = self.storage.get_tx(id).await else {
                continue;
            };
            if meta.status != TransactionStatus::Submitted {
                continue;
            }
            if !apply_signature_status(&mut meta, status.as_ref(), block_height, Utc::now()) {
                continue;
            }
            if self.storage.add_or_update_tx(&meta).await {
                info!(tx_meta_id = %meta.id, chain_id, status = ?meta.status, "transaction status updated");
                updated += 1;
            } else {
                warn!(tx_meta_id = %meta.id, "failed to persist status update");
            }
        }
        Ok(updated)
    }
}

/// Fold one signature status into a `Submitted` meta. Returns whether the
/// meta changed.
pub(crate) fn apply_signature_status(
    meta: &mut TxMeta,
    status: Option<&SignatureStatus>,
    block_height: u64,
    now: DateTime<Utc>,
) -> bool {
    let Some(status) = status else {
        let last_valid = meta.tx.message.last_valid_block_height;
        if last_valid != 0 && last_valid < block_height {
            debug!(tx_meta_id = %meta.id, last_valid, block_height, "blockhash expired");
            meta.status = TransactionStatus::Dropped;
            return true;
        }
        return false;
    };

    if !status.err.is_empty() {
        meta.signature_status = Some(status.clone());
        meta.status = TransactionStatus::Error;
        return true;
    }

    if status.confirmation_status.is_empty() {
        return false;
    }

    meta.signature_status = Some(status.clone());
    if status.is_finalized() {
        meta.status = TransactionStatus::Confirmed;
        meta.confirmed_time = Some(now);
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use chain_sol::{Message, Transaction, TransactionType};

    fn submitted(last_valid_block_height: u64) -> TxMeta {
        let msg = Message {
            fee_payer: "payer".into(),
            recent_blockhash: "hash".into(),
            last_valid_block_height,
            instructions: vec![],
            static_account_keys: None,
        };
        let mut meta = TxMeta::new("payer", "0x65", Transaction::new(msg, TransactionType::Other), None);
        meta.status = TransactionStatus::Submitted;
        meta.tx_hash = Some("sig".into());
        meta
    }

    fn status(err: &str, confirmation: &str) -> SignatureStatus {
        SignatureStatus {
            slot: 1,
            confirmations: None,
            err: err.into(),
            confirmation_status: confirmation.into(),
        }
    }

    #[test]
    fn unknown_signature_drops_only_after_expiry() {
        let now = Utc::now();

        let mut meta = submitted(1000);
        assert!(!apply_signature_status(&mut meta, None, 999, now));
        assert!(!apply_signature_status(&mut meta, None, 1000, now));
        assert_eq!(meta.status, TransactionStatus::Submitted);

        assert!(apply_signature_status(&mut meta, None, 1001, now));
        assert_eq!(meta.status, TransactionStatus::Dropped);
    }

    #[test]
    fn zero_last_valid_height_never_drops() {
        let mut meta = submitted(0);
        assert!(!apply_signature_status(&mut meta, None, u64::MAX, Utc::now()));
        assert_eq!(meta.status, TransactionStatus::Submitted);
    }

    #[test]
    fn error_status_is_recorded() {
        let mut meta = submitted(1000);
        let s = status("InstructionError", "confirmed");
        assert!(apply_signature_status(&mut meta, Some(&s), 10, Utc::now()));
        assert_eq!(meta.status, TransactionStatus::Error);
        assert_eq!(meta.signature_status, Some(s));
        assert!(meta.confirmed_time.is_none());
    }

    #[test]
    fn intermediate_confirmation_keeps_submitted() {
        let mut meta = submitted(1000);
        let s = status("", "confirmed");
        assert!(apply_signature_status(&mut meta, Some(&s), 10, Utc::now()));
        assert_eq!(meta.status, TransactionStatus::Submitted);
        assert_eq!(meta.signature_status, Some(s));
    }

    #[test]
    fn finalized_confirms_with_timestamp() {
        let now = Utc::now();
        let mut meta = submitted(1000);
        assert!(apply_signature_status(&mut meta, Some(&status("", "finalized")), 10, now));
        assert_eq!(meta.status, TransactionStatus::Confirmed);
        assert_eq!(meta.confirmed_time, Some(now));
    }

    #[derive(Clone, Default)]
    struct CapturedLog(Arc<parking_lot::Mutex<Vec<u8>>>);

    impl std::io::Write for CapturedLog {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn drop_is_logged_with_meta_id() {
        let log = CapturedLog::default();
        let writer = log.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .with_ansi(false)
            .with_writer(move || writer.clone())
            .finish();

        let mut meta = submitted(1000);
        tracing::subscriber::with_default(subscriber, || {
            assert!(apply_signature_status(&mut meta, None, 1001, Utc::now()));
        });

        let output = String::from_utf8(log.0.lock().clone()).unwrap();
        assert!(output.contains(&format!("tx_meta_id={}", meta.id)), "{output}");
    }

    #[test]
    fn empty_status_changes_nothing() {
        let mut meta = submitted(1000);
        assert!(!apply_signature_status(&mut meta, Some(&status("", "")), 10, Utc::now()));
        assert!(meta.signature_status.is_none());
    }
}
