//! Transaction submission for the crank service.
//!
//! Broadcasts are fire-and-forget: each transaction is sent from its own
//! task and the outcome is only logged and counted.

use std::sync::Arc;

use solana_client::rpc_config::RpcSendTransactionConfig;
use solana_commitment_config::CommitmentLevel;
use solana_sdk::transaction::Transaction;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::error::CrankError;
use crate::metrics::CrankMetrics;
use crate::rpc::LedgerRpc;

/// Largest serialized transaction the network accepts.
pub const PACKET_DATA_SIZE: usize = 1232;

/// Configuration for the transaction submitter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmitterConfig {
    /// Skip simulation on the node.
    pub skip_preflight: bool,

    /// Node-side rebroadcast attempts.
    pub max_retries: usize,
}

impl Default for SubmitterConfig {
    fn default() -> Self {
        Self {
            skip_preflight: true,
            max_retries: 2,
        }
    }
}

impl SubmitterConfig {
    fn send_config(&self) -> RpcSendTransactionConfig {
        RpcSendTransactionConfig {
            skip_preflight: self.skip_preflight,
            preflight_commitment: Some(CommitmentLevel::Processed),
            max_retries: Some(self.max_retries),
            ..RpcSendTransactionConfig::default()
        }
    }
}

/// Result of a transaction submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitResult {
    /// The endpoint accepted the transaction.
    Sent {
        /// Transaction signature.
        signature: String,
    },

    /// The endpoint rejected the transaction.
    Failed {
        /// Error message.
        error: String,
    },
}

impl SubmitResult {
    /// Returns true if the endpoint accepted the transaction.
    #[must_use]
    pub const fn is_sent(&self) -> bool {
        matches!(self, Self::Sent { .. })
    }

    /// Returns the signature if available.
    #[must_use]
    pub fn signature(&self) -> Option<&str> {
        match self {
            Self::Sent { signature } => Some(signature),
            Self::Failed { .. } => None,
        }
    }
}

/// Serializes a signed transaction into wire format.
///
/// # Errors
///
/// Returns an error if serialization fails or the result exceeds
/// [`PACKET_DATA_SIZE`].
pub fn serialize_transaction(tx: &Transaction) -> Result<Vec<u8>, CrankError> {
    let wire = bincode::serialize(tx).map_err(|e| CrankError::Submission(e.to_string()))?;
    if wire.len() > PACKET_DATA_SIZE {
        return Err(CrankError::Submission(format!(
            "transaction is {} bytes, limit is {}",
            wire.len(),
            PACKET_DATA_SIZE
        )));
    }
    Ok(wire)
}

/// Transaction submitter for the crank service.
pub struct TransactionSubmitter<R> {
    /// Ledger endpoint.
    rpc: Arc<R>,

    /// Configuration.
    config: SubmitterConfig,

    /// Metrics.
    metrics: Arc<CrankMetrics>,
}

impl<R: LedgerRpc> TransactionSubmitter<R> {
    /// Creates a new transaction submitter.
    #[must_use]
    pub fn new(rpc: Arc<R>, config: SubmitterConfig, metrics: Arc<CrankMetrics>) -> Self {
        Self {
            rpc,
            config,
            metrics,
        }
    }

    /// Sends a transaction from a spawned task.
    ///
    /// # Errors
    ///
    /// Returns an error, without sending anything, if the transaction cannot
    /// be serialized within the packet limit.
    pub fn submit_detached(
        &self,
        tx: Transaction,
        label: impl Into<String>,
    ) -> Result<JoinHandle<SubmitResult>, CrankError> {
        let label = label.into();
        if let Err(e) = serialize_transaction(&tx) {
            warn!(markets = %label, error = %e, "Dropping transaction");
            self.metrics.record_dropped();
            return Err(e);
        }

        Ok(tokio::spawn(send(
            Arc::clone(&self.rpc),
            tx,
            self.config.send_config(),
            label,
            Arc::clone(&self.metrics),
        )))
    }
}

async fn send<R: LedgerRpc>(
    rpc: Arc<R>,
    tx: Transaction,
    config: RpcSendTransactionConfig,
    label: String,
    metrics: Arc<CrankMetrics>,
) -> SubmitResult {
    match rpc.send_transaction(&tx, config).await {
        Ok(signature) => {
            info!(markets = %label, %signature, "Sent crank transaction");
            metrics.record_sent();
            SubmitResult::Sent {
                signature: signature.to_string(),
            }
        }
        Err(e) => {
            warn!(markets = %label, error = %e, "Crank transaction rejected");
            metrics.record_failure();
            SubmitResult::Failed {
                error: e.to_string(),
            }
        }
    }
}
