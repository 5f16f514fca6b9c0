//! Crank service metrics.
//!
//! Lock-free counters shared between the scheduler and the broadcast tasks.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use serde::Serialize;

/// Metrics for the crank service.
#[derive(Debug)]
pub struct CrankMetrics {
    /// Completed ticks.
    ticks: AtomicU64,

    /// Ticks that hit the slot floor race.
    benign_races: AtomicU64,

    /// Ticks that failed for any other reason.
    tick_errors: AtomicU64,

    /// Pending events observed across all queues.
    events_seen: AtomicU64,

    /// Queues that could not be decoded.
    queues_skipped: AtomicU64,

    /// Settlement instructions built.
    instructions_built: AtomicU64,

    /// Transactions built.
    batches_built: AtomicU64,

    /// Transactions built at the priority price.
    priority_batches: AtomicU64,

    /// Transactions accepted by the endpoint.
    transactions_sent: AtomicU64,

    /// Transactions rejected by the endpoint.
    transactions_failed: AtomicU64,

    /// Transactions never sent (oversize or unsignable).
    transactions_dropped: AtomicU64,

    /// Start time for rate calculation.
    start_time: Instant,
}

impl Default for CrankMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl CrankMetrics {
    /// Creates a new metrics instance.
    #[must_use]
    pub fn new() -> Self {
        Self {
            ticks: AtomicU64::new(0),
            benign_races: AtomicU64::new(0),
            tick_errors: AtomicU64::new(0),
            events_seen: AtomicU64::new(0),
            queues_skipped: AtomicU64::new(0),
            instructions_built: AtomicU64::new(0),
            batches_built: AtomicU64::new(0),
            priority_batches: AtomicU64::new(0),
            transactions_sent: AtomicU64::new(0),
            transactions_failed: AtomicU64::new(0),
            transactions_dropped: AtomicU64::new(0),
            start_time: Instant::now(),
        }
    }

    /// Records a completed tick and returns the new tick count.
    pub fn record_tick(&self) -> u64 {
        self.ticks.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Records a tick that lost the slot floor race.
    pub fn record_benign_race(&self) {
        self.benign_races.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a failed tick.
    pub fn record_tick_error(&self) {
        self.tick_errors.fetch_add(1, Ordering::Relaxed);
    }

    /// Records what one tick found in the queues.
    pub fn record_scan(&self, events: usize, queues_skipped: usize) {
        self.events_seen.fetch_add(events as u64, Ordering::Relaxed);
        self.queues_skipped
            .fetch_add(queues_skipped as u64, Ordering::Relaxed);
    }

    /// Records instructions and batches built in one tick.
    pub fn record_build(&self, instructions: usize, batches: usize, priority: usize) {
        self.instructions_built
            .fetch_add(instructions as u64, Ordering::Relaxed);
        self.batches_built.fetch_add(batches as u64, Ordering::Relaxed);
        self.priority_batches
            .fetch_add(priority as u64, Ordering::Relaxed);
    }

    /// Records a transaction accepted by the endpoint.
    pub fn record_sent(&self) {
        self.transactions_sent.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a transaction rejected by the endpoint.
    pub fn record_failure(&self) {
        self.transactions_failed.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a transaction that was never sent.
    pub fn record_dropped(&self) {
        self.transactions_dropped.fetch_add(1, Ordering::Relaxed);
    }

    /// Returns completed ticks.
    #[must_use]
    pub fn ticks(&self) -> u64 {
        self.ticks.load(Ordering::Relaxed)
    }

    /// Returns slot floor races.
    #[must_use]
    pub fn benign_races(&self) -> u64 {
        self.benign_races.load(Ordering::Relaxed)
    }

    /// Returns failed ticks.
    #[must_use]
    pub fn tick_errors(&self) -> u64 {
        self.tick_errors.load(Ordering::Relaxed)
    }

    /// Returns transactions accepted by the endpoint.
    #[must_use]
    pub fn transactions_sent(&self) -> u64 {
        self.transactions_sent.load(Ordering::Relaxed)
    }

    /// Returns transactions rejected by the endpoint.
    #[must_use]
    pub fn transactions_failed(&self) -> u64 {
        self.transactions_failed.load(Ordering::Relaxed)
    }

    /// Returns the uptime.
    #[must_use]
    pub fn uptime(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// Returns the share of broadcasts the endpoint accepted (0.0 to 1.0).
    #[must_use]
    pub fn success_rate(&self) -> f64 {
        let sent = self.transactions_sent();
        let total = sent + self.transactions_failed();
        if total > 0 {
            sent as f64 / total as f64
        } else {
            0.0
        }
    }

    /// Returns a snapshot of all metrics.
    #[must_use]
    pub fn snapshot(&self) -> CrankMetricsSnapshot {
        CrankMetricsSnapshot {
            ticks: self.ticks(),
            benign_races: self.benign_races(),
            tick_errors: self.tick_errors(),
            events_seen: self.events_seen.load(Ordering::Relaxed),
            queues_skipped: self.queues_skipped.load(Ordering::Relaxed),
            instructions_built: self.instructions_built.load(Ordering::Relaxed),
            batches_built: self.batches_built.load(Ordering::Relaxed),
            priority_batches: self.priority_batches.load(Ordering::Relaxed),
            transactions_sent: self.transactions_sent(),
            transactions_failed: self.transactions_failed(),
            transactions_dropped: self.transactions_dropped.load(Ordering::Relaxed),
            uptime_secs: self.uptime().as_secs(),
            success_rate: self.success_rate(),
        }
    }
}

/// Point-in-time copy of the counters.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CrankMetricsSnapshot {
    /// Completed ticks.
    pub ticks: u64,
    /// Slot floor races.
    pub benign_races: u64,
    /// Failed ticks.
    pub tick_errors: u64,
    /// Pending events observed.
    pub events_seen: u64,
    /// Undecodable queues skipped.
    pub queues_skipped: u64,
    /// Settlement instructions built.
    pub instructions_built: u64,
    /// Transactions built.
    pub batches_built: u64,
    /// Priority transactions built.
    pub priority_batches: u64,
    /// Transactions accepted.
    pub transactions_sent: u64,
    /// Transactions rejected.
    pub transactions_failed: u64,
    /// Transactions never sent.
    pub transactions_dropped: u64,
    /// Uptime in seconds.
    pub uptime_secs: u64,
    /// Accepted share of broadcasts.
    pub success_rate: f64,
}
