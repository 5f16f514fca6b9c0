//! Recent blockhash cache.
//!
//! A background task keeps the latest finalized blockhash in an [`ArcSwap`]
//! so signing never waits on the network.

use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use chrono::{DateTime, Utc};
use solana_sdk::hash::Hash;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::error::CrankError;
use crate::rpc::LedgerRpc;

/// A fetched blockhash.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockhashHandle {
    /// The blockhash.
    pub blockhash: Hash,
    /// Last block height at which it is accepted.
    pub last_valid_block_height: u64,
    /// When it was fetched.
    pub fetched_at: DateTime<Utc>,
}

impl BlockhashHandle {
    /// Returns how long ago the blockhash was fetched.
    #[must_use]
    pub fn age(&self) -> chrono::Duration {
        Utc::now().signed_duration_since(self.fetched_at)
    }
}

/// Blockhash cache with a background refresh task.
#[derive(Debug)]
pub struct BlockhashCache {
    current: Arc<ArcSwap<BlockhashHandle>>,
    refresh_task: JoinHandle<()>,
}

impl BlockhashCache {
    /// Fetches a first blockhash, then refreshes it every `interval`.
    ///
    /// # Errors
    ///
    /// Returns an error if the first fetch fails.
    pub async fn spawn<R: LedgerRpc>(rpc: Arc<R>, interval: Duration) -> Result<Self, CrankError> {
        let first = fetch(rpc.as_ref()).await?;
        info!(
            blockhash = %first.blockhash,
            last_valid_block_height = first.last_valid_block_height,
            "Fetched initial blockhash"
        );

        let current = Arc::new(ArcSwap::from_pointee(first));
        let refresh_task = tokio::spawn(refresh_loop(rpc, Arc::clone(&current), interval));

        Ok(Self {
            current,
            refresh_task,
        })
    }

    /// Returns the last successfully fetched blockhash.
    #[must_use]
    pub fn current(&self) -> Arc<BlockhashHandle> {
        self.current.load_full()
    }

    /// Returns true while the refresh task is alive.
    #[must_use]
    pub fn is_refreshing(&self) -> bool {
        !self.refresh_task.is_finished()
    }
}

impl Drop for BlockhashCache {
    fn drop(&mut self) {
        self.refresh_task.abort();
    }
}

async fn fetch<R: LedgerRpc>(rpc: &R) -> Result<BlockhashHandle, CrankError> {
    let latest = rpc.get_latest_blockhash().await?;
    Ok(BlockhashHandle {
        blockhash: latest.blockhash,
        last_valid_block_height: latest.last_valid_block_height,
        fetched_at: Utc::now(),
    })
}

async fn refresh_loop<R: LedgerRpc>(
    rpc: Arc<R>,
    current: Arc<ArcSwap<BlockhashHandle>>,
    interval: Duration,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The first tick fires immediately and the cache is already warm.
    ticker.tick().await;

    loop {
        ticker.tick().await;
        match fetch(rpc.as_ref()).await {
            Ok(handle) => {
                if handle.blockhash != current.load().blockhash {
                    debug!(
                        blockhash = %handle.blockhash,
                        last_valid_block_height = handle.last_valid_block_height,
                        "Blockhash refreshed"
                    );
                }
                current.store(Arc::new(handle));
            }
            Err(e) => {
                let stale = current.load();
                warn!(
                    error = %e,
                    age_ms = stale.age().num_milliseconds(),
                    "Blockhash refresh failed, keeping previous value"
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rpc::mock::MockLedger;

    #[tokio::test(start_paused = true)]
    async fn test_spawn_fetches_first_blockhash() {
        let ledger = Arc::new(MockLedger::new(10));
        let cache = BlockhashCache::spawn(Arc::clone(&ledger), Duration::from_millis(1000))
            .await
            .expect("cache");

        assert_eq!(ledger.blockhash_fetches(), 1);
        assert_eq!(cache.current().last_valid_block_height, 1001);
        assert!(cache.is_refreshing());
    }

    #[tokio::test]
    async fn test_spawn_fails_without_blockhash() {
        let ledger = Arc::new(MockLedger::new(10));
        ledger.fail_blockhash(true);

        let result = BlockhashCache::spawn(ledger, Duration::from_millis(1000)).await;
        assert!(matches!(result, Err(CrankError::Transport(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_refresh_replaces_value() {
        let ledger = Arc::new(MockLedger::new(10));
        let cache = BlockhashCache::spawn(Arc::clone(&ledger), Duration::from_millis(1000))
            .await
            .expect("cache");
        let first = cache.current();

        tokio::time::sleep(Duration::from_millis(2500)).await;

        assert!(ledger.blockhash_fetches() >= 3);
        assert_ne!(cache.current().blockhash, first.blockhash);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_refresh_keeps_previous_value() {
        let ledger = Arc::new(MockLedger::new(10));
        let cache = BlockhashCache::spawn(Arc::clone(&ledger), Duration::from_millis(1000))
            .await
            .expect("cache");
        let first = cache.current();

        ledger.fail_blockhash(true);
        tokio::time::sleep(Duration::from_millis(2500)).await;

        assert_eq!(cache.current(), first);
        assert!(cache.is_refreshing());
    }

    #[tokio::test(start_paused = true)]
    async fn test_drop_aborts_refresh() {
        let ledger = Arc::new(MockLedger::new(10));
        let cache = BlockhashCache::spawn(Arc::clone(&ledger), Duration::from_millis(1000))
            .await
            .expect("cache");
        drop(cache);

        tokio::time::sleep(Duration::from_millis(5000)).await;
        assert_eq!(ledger.blockhash_fetches(), 1);
    }
}
