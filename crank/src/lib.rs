//! OpenBook Crank - keeps market event queues drained.
//!
//! Matching on a Serum-style DEX leaves fill and out events in a per-market
//! event queue. Settling them is permissionless: anyone may submit
//! `ConsumeEvents`. This crate polls every configured market, settles pending
//! events and pays for priority when queues back up.
//!
//! # Components
//!
//! - [`config`]: Crank configuration
//! - [`wallet`]: Fee payer loading
//! - [`rpc`]: Ledger access seam
//! - [`fetcher`]: Batched account fetching
//! - [`registry`]: Market discovery and loading
//! - [`blockhash`]: Recent blockhash cache
//! - [`detector`]: Pending event detection
//! - [`builder`]: Instruction batching and signing
//! - [`submitter`]: Transaction broadcast
//! - [`service`]: Main crank loop
//! - [`metrics`]: Crank metrics

pub mod blockhash;
pub mod builder;
pub mod config;
pub mod detector;
pub mod error;
pub mod fetcher;
pub mod metrics;
pub mod registry;
pub mod rpc;
pub mod service;
pub mod submitter;
pub mod wallet;

pub use blockhash::{BlockhashCache, BlockhashHandle};
pub use builder::{BatchPolicy, SettlementInstruction, TransactionBatch, TransactionBuilder};
pub use config::{Cluster, ConfigError, CrankConfig, MarketSource};
pub use detector::{collect_counterparties, EventDetector, PendingEvents, QueueScan};
pub use error::CrankError;
pub use fetcher::{AccountBatch, AccountFetcher, FetchedAccount};
pub use metrics::CrankMetrics;
pub use registry::{MarketDescriptor, MarketRegistry};
pub use rpc::{AccountsPage, LatestBlockhash, LedgerRpc, SolanaLedger};
pub use service::{CrankService, TickReport};
pub use submitter::{SubmitResult, SubmitterConfig, TransactionSubmitter};
pub use wallet::WalletSource;
