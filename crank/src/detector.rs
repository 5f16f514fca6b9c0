//! Pending event detection.
//!
//! Decodes fetched event queues and extracts the open orders accounts a
//! settlement instruction has to touch.

use std::collections::HashSet;

use openbook_sdk::instructions::canonicalize_open_orders;
use openbook_sdk::{decode_event_queue, Event, SdkError};
use solana_sdk::pubkey::Pubkey;
use tracing::{debug, warn};

use crate::fetcher::FetchedAccount;
use crate::registry::MarketDescriptor;

/// Pending events found in one market's queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingEvents {
    /// Market address.
    pub market: Pubkey,

    /// Total events in the queue.
    pub event_count: usize,

    /// Distinct counterparties, capped and in canonical order.
    pub open_orders: Vec<Pubkey>,

    /// Slot the queue was read at.
    pub slot: u64,
}

impl PendingEvents {
    /// Returns true if the queue holds no events.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.event_count == 0
    }
}

/// Result of scanning every market's queue.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueueScan {
    /// Markets with pending events.
    pub pending: Vec<PendingEvents>,

    /// Queues skipped because they failed to decode.
    pub undecodable: usize,
}

impl QueueScan {
    /// Returns the total number of pending events.
    #[must_use]
    pub fn total_events(&self) -> usize {
        self.pending.iter().map(|p| p.event_count).sum()
    }
}

/// Collects distinct open orders accounts in event order, stopping once
/// `cap` accounts are collected.
#[must_use]
pub fn collect_counterparties(events: &[Event], cap: usize) -> Vec<Pubkey> {
    let mut seen = HashSet::with_capacity(cap);
    let mut accounts = Vec::with_capacity(cap);

    for event in events {
        if accounts.len() >= cap {
            break;
        }
        if seen.insert(event.open_orders) {
            accounts.push(event.open_orders);
        }
    }

    accounts
}

/// Detector for pending events in event queues.
#[derive(Debug, Clone)]
pub struct EventDetector {
    /// Counterparty cap per market.
    max_unique_accounts: usize,
}

impl EventDetector {
    /// Creates a new event detector.
    #[must_use]
    pub fn new(max_unique_accounts: usize) -> Self {
        Self {
            max_unique_accounts,
        }
    }

    /// Returns the counterparty cap.
    #[must_use]
    pub const fn max_unique_accounts(&self) -> usize {
        self.max_unique_accounts
    }

    /// Scans one market's event queue.
    ///
    /// # Errors
    ///
    /// Returns an error if the queue cannot be decoded.
    pub fn detect(
        &self,
        market: &MarketDescriptor,
        queue: &FetchedAccount,
    ) -> Result<PendingEvents, SdkError> {
        let events = decode_event_queue(&queue.data)?;
        let accounts = collect_counterparties(&events, self.max_unique_accounts);

        Ok(PendingEvents {
            market: market.address,
            event_count: events.len(),
            open_orders: canonicalize_open_orders(accounts),
            slot: queue.slot,
        })
    }

    /// Scans every market, pairing `markets[i]` with `queues[i]`.
    ///
    /// Queues that fail to decode are logged and skipped. Empty queues are
    /// dropped.
    #[must_use]
    pub fn detect_all(&self, markets: &[MarketDescriptor], queues: &[FetchedAccount]) -> QueueScan {
        let mut scan = QueueScan::default();

        for (market, queue) in markets.iter().zip(queues) {
            match self.detect(market, queue) {
                Ok(pending) if pending.is_empty() => {}
                Ok(pending) => {
                    debug!(
                        market = %market.name,
                        events = pending.event_count,
                        accounts = pending.open_orders.len(),
                        slot = pending.slot,
                        "Pending events"
                    );
                    scan.pending.push(pending);
                }
                Err(e) => {
                    warn!(
                        market = %market.name,
                        event_queue = %queue.pubkey,
                        error = %e,
                        "Skipping undecodable event queue"
                    );
                    scan.undecodable += 1;
                }
            }
        }

        scan
    }
}

#[cfg(test)]
mod tests {
    use openbook_sdk::instructions::compare_open_orders;
    use openbook_sdk::test_utils::{fill_event, out_event, queue_bytes, queue_with_fills};

    use super::*;

    fn descriptor(name: &str) -> MarketDescriptor {
        MarketDescriptor {
            name: name.to_string(),
            address: Pubkey::new_unique(),
            program_id: Pubkey::new_unique(),
            event_queue: Pubkey::new_unique(),
            base_mint: Pubkey::new_unique(),
            quote_mint: Pubkey::new_unique(),
            base_decimals: 9,
            quote_decimals: 6,
        }
    }

    fn queue(market: &MarketDescriptor, data: Vec<u8>) -> FetchedAccount {
        FetchedAccount {
            pubkey: market.event_queue,
            data,
            owner: market.program_id,
            slot: 321,
        }
    }

    fn accounts(n: usize) -> Vec<Pubkey> {
        (0..n).map(|_| Pubkey::new_unique()).collect()
    }

    #[test]
    fn test_collect_counterparties_dedups() {
        let a = Pubkey::new_unique();
        let b = Pubkey::new_unique();
        let data = queue_bytes(8, 0, &[fill_event(&a), out_event(&b), fill_event(&a)]);
        let events = decode_event_queue(&data).expect("decode");

        assert_eq!(collect_counterparties(&events, 10), vec![a, b]);
    }

    #[test]
    fn test_collect_counterparties_caps() {
        let data = queue_with_fills(64, 40, &accounts(20));
        let events = decode_event_queue(&data).expect("decode");

        let collected = collect_counterparties(&events, 10);
        assert_eq!(collected.len(), 10);
    }

    #[test]
    fn test_detect_counts_full_queue() {
        let market = descriptor("SOL/USDC");
        let detector = EventDetector::new(10);
        let data = queue_with_fills(256, 150, &accounts(30));

        let pending = detector.detect(&market, &queue(&market, data)).expect("detect");
        assert_eq!(pending.event_count, 150);
        assert_eq!(pending.open_orders.len(), 10);
        assert_eq!(pending.slot, 321);
        assert_eq!(pending.market, market.address);
    }

    #[test]
    fn test_detect_canonical_order() {
        let market = descriptor("SOL/USDC");
        let detector = EventDetector::new(5);
        let data = queue_with_fills(32, 12, &accounts(8));

        let pending = detector.detect(&market, &queue(&market, data)).expect("detect");
        assert!(pending.open_orders.len() <= 5);
        assert!(pending
            .open_orders
            .windows(2)
            .all(|w| compare_open_orders(&w[0], &w[1]).is_lt()));
    }

    #[test]
    fn test_detect_all_drops_empty_and_corrupt() {
        let busy = descriptor("SOL/USDC");
        let idle = descriptor("BTC/USDC");
        let broken = descriptor("ETH/USDC");

        let markets = vec![busy.clone(), idle.clone(), broken.clone()];
        let queues = vec![
            queue(&busy, queue_with_fills(16, 3, &accounts(2))),
            queue(&idle, queue_bytes(16, 5, &[])),
            queue(&broken, vec![0u8; 12]),
        ];

        let detector = EventDetector::new(10);
        let scan = detector.detect_all(&markets, &queues);

        assert_eq!(scan.pending.len(), 1);
        assert_eq!(scan.undecodable, 1);
        assert_eq!(scan.total_events(), 3);
        assert_eq!(scan.pending[0].market, busy.address);
        assert_eq!(scan.pending[0].open_orders.len(), 2);
    }

    #[test]
    fn test_detect_corrupt_queue() {
        let market = descriptor("SOL/USDC");
        let detector = EventDetector::new(10);
        assert!(detector.detect(&market, &queue(&market, vec![1, 2, 3])).is_err());
    }

    #[test]
    fn test_pending_is_empty() {
        let market = descriptor("SOL/USDC");
        let mut pending = PendingEvents {
            market: market.address,
            event_count: 1,
            open_orders: vec![],
            slot: 1,
        };
        assert!(!pending.is_empty());

        pending.event_count = 0;
        assert!(pending.is_empty());
    }
}
