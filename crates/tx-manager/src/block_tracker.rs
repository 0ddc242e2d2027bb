//! Periodic latest-blockhash fetcher with a per-chain cache.
//!
//! Every successful fetch, whether periodic or on demand, updates the cache
//! and is broadcast as a [`BlockTrackerEvent`]. Refresh tasks hold only a
//! weak reference to the tracker and end once it is dropped.

use std::collections::HashMap;
use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::error::TxResult;
use crate::rpc::{LatestBlockhash, RpcClient};

const EVENT_CHANNEL_CAPACITY: usize = 64;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlockTrackerEvent {
    BlockhashUpdated {
        chain_id: String,
        blockhash: String,
        last_valid_block_height: u64,
    },
}

struct CachedBlockhash {
    latest: LatestBlockhash,
    fetched_at: Instant,
}

pub struct BlockTracker {
    rpc: Arc<dyn RpcClient>,
    refresh_interval: Duration,
    cache: Mutex<HashMap<String, CachedBlockhash>>,
    timers: Mutex<HashMap<String, JoinHandle<()>>>,
    events: broadcast::Sender<BlockTrackerEvent>,
}

impl BlockTracker {
    pub fn new(rpc: Arc<dyn RpcClient>, refresh_interval: Duration) -> Arc<Self> {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Arc::new(Self {
            rpc,
            refresh_interval,
            cache: Mutex::new(HashMap::new()),
            timers: Mutex::new(HashMap::new()),
            events,
        })
    }

    pub fn subscribe(&self) -> broadcast::Receiver<BlockTrackerEvent> {
        self.events.subscribe()
    }

    /// Latest blockhash of `chain_id`.
    ///
    /// With `try_cached`, a value fetched less than one refresh interval ago
    /// is returned without a network round trip.
    pub async fn latest_blockhash(
        &self,
        chain_id: &str,
        try_cached: bool,
    ) -> TxResult<LatestBlockhash> {
        if try_cached {
            if let Some(cached) = self.cached(chain_id) {
                return Ok(cached);
            }
        }

        let latest = self.rpc.get_latest_blockhash(chain_id).await?;
        self.cache.lock().insert(
            chain_id.to_string(),
            CachedBlockhash {
                latest: latest.clone(),
                fetched_at: Instant::now(),
            },
        );
        debug!(
            chain_id,
            blockhash = %latest.blockhash,
            last_valid_block_height = latest.last_valid_block_height,
            "latest blockhash updated"
        );
        // No receivers is fine.
        let _ = self.events.send(BlockTrackerEvent::BlockhashUpdated {
            chain_id: chain_id.to_string(),
            blockhash: latest.blockhash.clone(),
            last_valid_block_height: latest.last_valid_block_height,
        });
        Ok(latest)
    }

    fn cached(&self, chain_id: &str) -> Option<LatestBlockhash> {
        let cache = self.cache.lock();
        let entry = cache.get(chain_id)?;
        (entry.fetched_at.elapsed() < self.refresh_interval && !entry.latest.blockhash.is_empty())
            .then(|| entry.latest.clone())
    }

    /// Start refreshing `chain_id` every refresh interval. The first fetch
    /// happens immediately. No-op if already running.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn start(self: &Arc<Self>, chain_id: &str) {
        let mut timers = self.timers.lock();
        if timers.get(chain_id).is_some_and(|h| !h.is_finished()) {
            return;
        }

        let weak: Weak<Self> = Arc::downgrade(self);
        let chain = chain_id.to_string();
        let period = self.refresh_interval;
        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                interval.tick().await;
                let Some(tracker) = weak.upgrade() else {
                    break;
                };
                if let Err(e) = tracker.latest_blockhash(&chain, false).await {
                    warn!(chain_id = %chain, error = %e, "blockhash refresh failed");
                }
            }
        });

        info!(chain_id, period_secs = period.as_secs(), "block tracker started");
        timers.insert(chain_id.to_string(), handle);
    }

    pub fn stop(&self, chain_id: &str) {
        if let Some(handle) = self.timers.lock().remove(chain_id) {
            handle.abort();
            info!(chain_id, "block tracker stopped");
        }
    }

    pub fn stop_all(&self) {
        for (chain_id, handle) in self.timers.lock().drain() {
            handle.abort();
            debug!(%chain_id, "block tracker stopped");
        }
    }

    pub fn is_running(&self, chain_id: &str) -> bool {
        self.timers
            .lock()
            .get(chain_id)
            .is_some_and(|h| !h.is_finished())
    }

    pub fn running_chains(&self) -> Vec<String> {
        let mut chains: Vec<String> = self
            .timers
            .lock()
            .iter()
            .filter(|(_, h)| !h.is_finished())
            .map(|(chain, _)| chain.clone())
            .collect();
        chains.sort();
        chains
    }
}

impl Drop for BlockTracker {
    fn drop(&mut self) {
        for (_, handle) in self.timers.get_mut().drain() {
            handle.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TxError;
    use crate::meta::SignatureStatus;
    use crate::rpc::AccountInfo;
    use async_trait::async_trait;
    use chain_sol::SendOptions;
    use std::sync::atomic::{AtomicU64, Ordering};

    #[derive(Default)]
    struct CountingRpc {
        calls: AtomicU64,
    }

    #[async_trait]
    impl RpcClient for CountingRpc {
        async fn get_latest_blockhash(&self, _chain_id: &str) -> TxResult<LatestBlockhash> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            Ok(LatestBlockhash {
                blockhash: format!("hash{n}"),
                last_valid_block_height: 100 + n,
            })
        }
        async fn get_block_height(&self, _chain_id: &str) -> TxResult<u64> {
            Ok(0)
        }
        async fn get_signature_statuses(
            &self,
            _chain_id: &str,
            _signatures: &[String],
        ) -> TxResult<Vec<Option<SignatureStatus>>> {
            Ok(vec![])
        }
        async fn get_account_info(
            &self,
            _chain_id: &str,
            _address: &str,
        ) -> TxResult<Option<AccountInfo>> {
            Ok(None)
        }
        async fn send_transaction(
            &self,
            _chain_id: &str,
            _signed_tx_base64: &str,
            _options: Option<&SendOptions>,
        ) -> TxResult<String> {
            Err(TxError::InternalError("unused".into()))
        }
        async fn get_fee_for_message(&self, _chain_id: &str, _message: &str) -> TxResult<u64> {
            Ok(0)
        }
    }

    fn tracker() -> (Arc<BlockTracker>, Arc<CountingRpc>) {
        let rpc = Arc::new(CountingRpc::default());
        (BlockTracker::new(rpc.clone(), Duration::from_secs(10)), rpc)
    }

    #[tokio::test(start_paused = true)]
    async fn cached_value_is_reused_until_it_expires() {
        let (tracker, rpc) = tracker();

        let first = tracker.latest_blockhash("0x65", true).await.unwrap();
        let second = tracker.latest_blockhash("0x65", true).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(rpc.calls.load(Ordering::SeqCst), 1);

        tokio::time::advance(Duration::from_secs(11)).await;
        let third = tracker.latest_blockhash("0x65", true).await.unwrap();
        assert_eq!(third.blockhash, "hash2");
    }

    #[tokio::test(start_paused = true)]
    async fn uncached_fetch_always_hits_rpc() {
        let (tracker, rpc) = tracker();
        tracker.latest_blockhash("0x65", false).await.unwrap();
        tracker.latest_blockhash("0x65", false).await.unwrap();
        assert_eq!(rpc.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn fetch_broadcasts_event() {
        let (tracker, _) = tracker();
        let mut events = tracker.subscribe();
        tracker.latest_blockhash("0x67", false).await.unwrap();
        assert_eq!(
            events.recv().await.unwrap(),
            BlockTrackerEvent::BlockhashUpdated {
                chain_id: "0x67".into(),
                blockhash: "hash1".into(),
                last_valid_block_height: 101,
            }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn start_refreshes_periodically_until_stopped() {
        let (tracker, rpc) = tracker();
        let mut events = tracker.subscribe();

        tracker.start("0x65");
        tracker.start("0x65");
        assert!(tracker.is_running("0x65"));
        assert_eq!(tracker.running_chains(), vec!["0x65".to_string()]);

        events.recv().await.unwrap();
        events.recv().await.unwrap();
        assert_eq!(rpc.calls.load(Ordering::SeqCst), 2);

        tracker.stop("0x65");
        assert!(!tracker.is_running("0x65"));
        tokio::time::advance(Duration::from_secs(60)).await;
        tokio::task::yield_now().await;
        assert_eq!(rpc.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn stop_all_clears_every_chain() {
        let (tracker, _) = tracker();
        tracker.start("0x65");
        tracker.start("0x67");
        tracker.stop_all();
        assert!(tracker.running_chains().is_empty());
    }
}
