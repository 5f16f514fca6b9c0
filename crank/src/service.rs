//! Main crank service.
//!
//! Each tick fetches every event queue, decodes the pending events, builds
//! and batches settlement instructions, signs them against the cached
//! blockhash and broadcasts them without waiting for the outcome.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::{Keypair, Signer};
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use crate::blockhash::BlockhashCache;
use crate::builder::{BatchPolicy, TransactionBuilder};
use crate::config::{ConfigError, CrankConfig};
use crate::detector::EventDetector;
use crate::error::CrankError;
use crate::fetcher::AccountFetcher;
use crate::metrics::CrankMetrics;
use crate::registry::MarketDescriptor;
use crate::rpc::LedgerRpc;
use crate::submitter::{SubmitResult, SubmitterConfig, TransactionSubmitter};

/// Metrics are logged once every this many ticks.
pub const METRICS_LOG_INTERVAL: u64 = 60;

/// What one tick did.
#[derive(Debug)]
pub struct TickReport {
    /// Highest slot observed by the fetch.
    pub slot: u64,
    /// Markets with pending events.
    pub markets_pending: usize,
    /// Settlement instructions built.
    pub instructions: usize,
    /// Transactions built.
    pub batches: usize,
    /// Transactions built at the priority price.
    pub priority_batches: usize,
    /// In-flight broadcasts.
    pub submissions: Vec<JoinHandle<SubmitResult>>,
}

/// The main crank service.
pub struct CrankService<R> {
    /// Configuration.
    config: CrankConfig,

    /// Markets, in the same order as `event_queues`.
    markets: Vec<MarketDescriptor>,

    /// Event queue of each market.
    event_queues: Vec<Pubkey>,

    /// Queue fetcher.
    fetcher: AccountFetcher<R>,

    /// Event detector.
    detector: EventDetector,

    /// Transaction builder.
    builder: TransactionBuilder,

    /// Transaction submitter.
    submitter: TransactionSubmitter<R>,

    /// Recent blockhash.
    blockhash: Arc<BlockhashCache>,

    /// Fee payer.
    payer: Arc<Keypair>,

    /// Metrics.
    metrics: Arc<CrankMetrics>,

    /// Slot floor for the next fetch.
    min_slot: AtomicU64,

    /// Whether the service is running.
    running: Arc<AtomicBool>,
}

impl<R: LedgerRpc> CrankService<R> {
    /// Creates a new crank service.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or there are no
    /// markets.
    pub fn new(
        config: CrankConfig,
        markets: Vec<MarketDescriptor>,
        rpc: Arc<R>,
        blockhash: Arc<BlockhashCache>,
        payer: Arc<Keypair>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        if markets.is_empty() {
            return Err(ConfigError::NoMarkets);
        }

        let program_id = config.parse_program_id()?;
        let policy = BatchPolicy::from_config(&config)?;
        let metrics = Arc::new(CrankMetrics::new());
        let event_queues = markets.iter().map(|m| m.event_queue).collect();

        Ok(Self {
            fetcher: AccountFetcher::new(Arc::clone(&rpc)),
            detector: EventDetector::new(config.max_unique_accounts),
            builder: TransactionBuilder::new(program_id, payer.pubkey(), policy),
            submitter: TransactionSubmitter::new(
                rpc,
                SubmitterConfig::default(),
                Arc::clone(&metrics),
            ),
            config,
            markets,
            event_queues,
            blockhash,
            payer,
            metrics,
            min_slot: AtomicU64::new(0),
            running: Arc::new(AtomicBool::new(true)),
        })
    }

    /// Returns the metrics.
    #[must_use]
    pub fn metrics(&self) -> Arc<CrankMetrics> {
        Arc::clone(&self.metrics)
    }

    /// Returns the configuration.
    #[must_use]
    pub const fn config(&self) -> &CrankConfig {
        &self.config
    }

    /// Returns the markets being cranked.
    #[must_use]
    pub fn markets(&self) -> &[MarketDescriptor] {
        &self.markets
    }

    /// Returns the slot floor the next fetch will carry.
    #[must_use]
    pub fn min_slot(&self) -> u64 {
        self.min_slot.load(Ordering::Relaxed)
    }

    /// Returns false once a stop has been requested.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Relaxed)
    }

    /// Stops the service after the current tick. A stop requested before
    /// [`run`](Self::run) starts makes it return without ticking.
    pub fn stop(&self) {
        self.running.store(false, Ordering::Relaxed);
        info!("Crank service stop requested");
    }

    /// Runs ticks until stopped.
    pub async fn run(&self) {
        info!(
            markets = self.markets.len(),
            payer = %self.payer.pubkey(),
            "Crank service started"
        );

        let poll_interval = self.config.poll_interval();

        while self.is_running() {
            match self.tick().await {
                Ok(report) if report.batches > 0 => {
                    debug!(
                        slot = report.slot,
                        markets = report.markets_pending,
                        batches = report.batches,
                        priority = report.priority_batches,
                        "Tick complete"
                    );
                }
                Ok(_) => {}
                Err(e) if e.is_benign_race() => {
                    self.metrics.record_benign_race();
                    debug!(error = %e, "Endpoint behind slot floor");
                }
                Err(e) => {
                    self.metrics.record_tick_error();
                    error!(error = %e, "Crank tick failed");
                }
            }

            if self.metrics.ticks() % METRICS_LOG_INTERVAL == 0 {
                let snapshot = self.metrics.snapshot();
                info!(
                    ticks = snapshot.ticks,
                    events = snapshot.events_seen,
                    batches = snapshot.batches_built,
                    sent = snapshot.transactions_sent,
                    failed = snapshot.transactions_failed,
                    races = snapshot.benign_races,
                    errors = snapshot.tick_errors,
                    "Crank metrics"
                );
            }

            tokio::time::sleep(poll_interval).await;
        }

        info!("Crank service stopped");
    }

    /// Runs a single tick.
    ///
    /// # Errors
    ///
    /// Returns an error if the queue fetch fails. Per-market and
    /// per-transaction failures are logged and do not fail the tick.
    pub async fn tick(&self) -> Result<TickReport, CrankError> {
        self.metrics.record_tick();

        let queues = self.fetcher.fetch(&self.event_queues, self.min_slot()).await?;
        self.min_slot
            .store(queues.slot.saturating_add(1), Ordering::Relaxed);

        let scan = self.detector.detect_all(&self.markets, &queues.accounts);
        self.metrics.record_scan(scan.total_events(), scan.undecodable);

        let instructions = self.builder.build_instructions(&self.markets, &scan.pending);
        let instruction_count = instructions.len();
        let batches = self.builder.batch(instructions);
        let priority_batches = batches.iter().filter(|b| b.is_priority()).count();
        self.metrics
            .record_build(instruction_count, batches.len(), priority_batches);

        let blockhash = self.blockhash.current();
        let mut submissions = Vec::with_capacity(batches.len());

        for batch in &batches {
            let label = batch.label();
            let tx = batch.sign(&self.payer, blockhash.blockhash);

            info!(
                markets = %label,
                cu_limit = batch.cu_limit,
                cu_price = batch.cu_price,
                "Sending consume events for {} events",
                batch.event_count()
            );

            // Oversize transactions are logged and counted by the submitter.
            if let Ok(handle) = self.submitter.submit_detached(tx, label) {
                submissions.push(handle);
            }
        }

        Ok(TickReport {
            slot: queues.slot,
            markets_pending: scan.pending.len(),
            instructions: instruction_count,
            batches: batches.len(),
            priority_batches,
            submissions,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use openbook_sdk::test_utils::queue_with_fills;
    use solana_compute_budget_interface::ComputeBudgetInstruction;
    use tokio_test::{assert_err, assert_ok};

    use super::*;
    use crate::rpc::mock::MockLedger;
    use crate::submitter::PACKET_DATA_SIZE;

    struct Harness {
        ledger: Arc<MockLedger>,
        markets: Vec<MarketDescriptor>,
        service: Arc<CrankService<MockLedger>>,
    }

    async fn harness(config: CrankConfig, depths: &[usize]) -> Harness {
        crowded_harness(config, depths, 3).await
    }

    async fn crowded_harness(config: CrankConfig, depths: &[usize], traders: usize) -> Harness {
        let ledger = Arc::new(MockLedger::new(500));
        let program_id = config.parse_program_id().expect("program id");

        let markets: Vec<MarketDescriptor> = depths
            .iter()
            .enumerate()
            .map(|(i, depth)| {
                let traders: Vec<Pubkey> = (0..traders).map(|_| Pubkey::new_unique()).collect();
                let market = MarketDescriptor {
                    name: format!("M{}/USDC", i),
                    address: Pubkey::new_unique(),
                    program_id,
                    event_queue: Pubkey::new_unique(),
                    base_mint: Pubkey::new_unique(),
                    quote_mint: Pubkey::new_unique(),
                    base_decimals: 9,
                    quote_decimals: 6,
                };
                ledger.set_account(
                    market.event_queue,
                    program_id,
                    queue_with_fills(256, *depth, &traders),
                );
                market
            })
            .collect();

        let blockhash = BlockhashCache::spawn(Arc::clone(&ledger), config.blockhash_refresh())
            .await
            .expect("blockhash");

        let service = CrankService::new(
            config,
            markets.clone(),
            Arc::clone(&ledger),
            Arc::new(blockhash),
            Arc::new(Keypair::new()),
        )
        .expect("service");

        Harness {
            ledger,
            markets,
            service: Arc::new(service),
        }
    }

    async fn settle(report: TickReport) -> Vec<SubmitResult> {
        let mut results = Vec::new();
        for handle in report.submissions {
            results.push(handle.await.expect("join"));
        }
        results
    }

    #[tokio::test]
    async fn test_new_requires_markets() {
        let ledger = Arc::new(MockLedger::new(1));
        let blockhash = BlockhashCache::spawn(Arc::clone(&ledger), Duration::from_secs(1))
            .await
            .expect("blockhash");

        let result = CrankService::new(
            CrankConfig::default(),
            vec![],
            ledger,
            Arc::new(blockhash),
            Arc::new(Keypair::new()),
        );
        assert!(matches!(result, Err(ConfigError::NoMarkets)));
    }

    #[tokio::test]
    async fn test_tick_sends_priority_batch() {
        let h = harness(CrankConfig::default(), &[150]).await;

        let report = h.service.tick().await.expect("tick");
        assert_eq!(report.batches, 1);
        assert_eq!(report.priority_batches, 1);

        let results = settle(report).await;
        assert!(results.iter().all(SubmitResult::is_sent));

        let sent = h.ledger.sent();
        assert_eq!(sent.len(), 1);
        let tx = &sent[0];
        let keys = &tx.message.account_keys;
        let programs: Vec<Pubkey> = tx
            .message
            .instructions
            .iter()
            .map(|ix| keys[usize::from(ix.program_id_index)])
            .collect();
        assert_eq!(programs.len(), 3);
        assert_eq!(programs[0], solana_compute_budget_interface::id());
        assert_eq!(programs[1], solana_compute_budget_interface::id());
        assert_eq!(programs[2], h.markets[0].program_id);

        let price = ComputeBudgetInstruction::set_compute_unit_price(100_000);
        assert_eq!(tx.message.instructions[1].data, price.data);
    }

    #[tokio::test]
    async fn test_tick_skips_shallow_market() {
        let config = CrankConfig::default().with_min_events(10);
        let h = harness(config, &[5, 20]).await;

        let report = h.service.tick().await.expect("tick");
        assert_eq!(report.markets_pending, 2);
        assert_eq!(report.instructions, 1);
        assert_eq!(report.batches, 1);
        assert_eq!(report.priority_batches, 0);

        settle(report).await;
        assert_eq!(h.ledger.sent().len(), 1);
    }

    #[tokio::test]
    async fn test_tick_empty_queue_sends_nothing() {
        let h = harness(CrankConfig::default(), &[0]).await;

        let report = assert_ok!(h.service.tick().await);
        assert_eq!(report.markets_pending, 0);
        assert_eq!(report.batches, 0);
        assert!(h.ledger.sent().is_empty());
    }

    #[tokio::test]
    async fn test_tick_skips_undecodable_queue() {
        let h = harness(CrankConfig::default(), &[4, 4]).await;
        let program_id = h.markets[0].program_id;
        h.ledger
            .set_account(h.markets[0].event_queue, program_id, vec![0u8; 10]);

        let report = h.service.tick().await.expect("tick");
        assert_eq!(report.markets_pending, 1);
        assert_eq!(report.batches, 1);
        assert_eq!(h.service.metrics().snapshot().queues_skipped, 1);
    }

    #[tokio::test]
    async fn test_slot_floor_advances() {
        let h = harness(CrankConfig::default(), &[0]).await;
        assert_eq!(h.service.min_slot(), 0);

        let report = h.service.tick().await.expect("tick");
        assert_eq!(report.slot, 500);
        assert_eq!(h.service.min_slot(), 501);

        let race = h.service.tick().await;
        assert!(race.is_err_and(|e| e.is_benign_race()));
        assert_eq!(h.service.min_slot(), 501);

        h.ledger.set_slot(640);
        h.service.tick().await.expect("tick");
        assert_eq!(h.service.min_slot(), 641);

        let floors: Vec<Option<u64>> = h
            .ledger
            .calls()
            .iter()
            .map(|c| c.min_context_slot)
            .collect();
        assert_eq!(floors, vec![None, Some(501), Some(501)]);
    }

    #[tokio::test]
    async fn test_tick_batches_by_ceiling() {
        let config = CrankConfig::default().with_max_tx_instructions(2);
        let h = harness(config, &[3, 3, 3]).await;

        let report = h.service.tick().await.expect("tick");
        assert_eq!(report.instructions, 3);
        assert_eq!(report.batches, 2);

        settle(report).await;
        let sent = h.ledger.sent();
        assert_eq!(sent.len(), 2);

        let limit = ComputeBudgetInstruction::set_compute_unit_limit(100_000);
        assert_eq!(sent[0].message.instructions[0].data, limit.data);
    }

    #[tokio::test]
    async fn test_tick_splits_oversize_batches() {
        let config = CrankConfig::default().with_max_tx_instructions(3);
        assert_ok!(config.validate());
        let h = crowded_harness(config, &[150, 150, 150], 12).await;

        let report = h.service.tick().await.expect("tick");
        assert_eq!(report.instructions, 3);
        assert!(report.batches >= 2);
        assert_eq!(report.submissions.len(), report.batches);

        let results = settle(report).await;
        assert!(results.iter().all(SubmitResult::is_sent));

        let snapshot = h.service.metrics().snapshot();
        assert_eq!(snapshot.transactions_dropped, 0);
        assert!(snapshot.transactions_sent >= 2);
        for tx in h.ledger.sent() {
            assert!(bincode::serialize(&tx).expect("wire").len() <= PACKET_DATA_SIZE);
        }
    }

    #[tokio::test]
    async fn test_rejected_broadcast_does_not_fail_tick() {
        let h = harness(CrankConfig::default(), &[2]).await;
        h.ledger.fail_send_with(-32002, "Transaction simulation failed");

        let report = h.service.tick().await.expect("tick");
        let results = settle(report).await;

        assert_eq!(results.len(), 1);
        assert!(!results[0].is_sent());
        assert_eq!(h.service.metrics().transactions_failed(), 1);
    }

    #[tokio::test]
    async fn test_fetch_error_fails_tick() {
        let h = harness(CrankConfig::default(), &[2]).await;
        h.ledger.fail_accounts_with(-32005, "Node is unhealthy");

        let err = assert_err!(h.service.tick().await);
        assert!(matches!(err, CrankError::Rpc { code: -32005, .. }));
        assert_eq!(h.service.min_slot(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_before_run_returns() {
        let h = harness(CrankConfig::default(), &[2]).await;
        assert!(h.service.is_running());

        h.service.stop();
        let service = Arc::clone(&h.service);
        let runner = tokio::spawn(async move { service.run().await });
        runner.await.expect("join");

        assert!(!h.service.is_running());
        assert_eq!(h.service.metrics().ticks(), 0);
        assert!(h.ledger.sent().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_until_stopped() {
        let config = CrankConfig::default().with_poll_interval(1000);
        let h = harness(config, &[0]).await;

        let service = Arc::clone(&h.service);
        let runner = tokio::spawn(async move { service.run().await });

        tokio::time::sleep(Duration::from_millis(2500)).await;
        assert!(h.service.is_running());

        h.service.stop();
        runner.await.expect("join");

        assert!(!h.service.is_running());
        assert!(h.service.metrics().ticks() >= 2);
        assert!(h.service.metrics().benign_races() >= 1);
    }
}
