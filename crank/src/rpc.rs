//! Ledger access seam.
//!
//! The crank talks to the ledger through [`LedgerRpc`] so the scheduler,
//! fetcher and blockhash cache can run against a recorded mock in tests.
//! [`SolanaLedger`] is the production implementation over the nonblocking
//! `solana-client` RPC client.

use std::future::Future;
use std::time::Duration;

use solana_account_decoder::UiAccountEncoding;
use solana_client::client_error::ClientError;
use solana_client::nonblocking::rpc_client::RpcClient;
use solana_client::rpc_config::{RpcAccountInfoConfig, RpcSendTransactionConfig};
use solana_sdk::account::Account;
use solana_commitment_config::CommitmentConfig;
use solana_sdk::hash::Hash;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::Signature;
use solana_sdk::transaction::Transaction;

/// One `getMultipleAccounts` answer.
#[derive(Debug, Clone, Default)]
pub struct AccountsPage {
    /// Slot the node answered at.
    pub slot: u64,
    /// One entry per requested key; `None` for accounts that do not exist.
    pub accounts: Vec<Option<Account>>,
}

/// A finalized blockhash and its expiry height.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LatestBlockhash {
    /// The blockhash.
    pub blockhash: Hash,
    /// Last block height at which it is accepted.
    pub last_valid_block_height: u64,
}

/// The three ledger calls the crank makes.
pub trait LedgerRpc: Send + Sync + 'static {
    /// Fetches up to 100 accounts in one call at `processed` commitment.
    fn get_multiple_accounts(
        &self,
        pubkeys: &[Pubkey],
        min_context_slot: Option<u64>,
    ) -> impl Future<Output = Result<AccountsPage, ClientError>> + Send;

    /// Fetches the latest finalized blockhash.
    fn get_latest_blockhash(
        &self,
    ) -> impl Future<Output = Result<LatestBlockhash, ClientError>> + Send;

    /// Submits a signed transaction.
    fn send_transaction(
        &self,
        tx: &Transaction,
        config: RpcSendTransactionConfig,
    ) -> impl Future<Output = Result<Signature, ClientError>> + Send;
}

/// [`LedgerRpc`] backed by a JSON-RPC endpoint.
pub struct SolanaLedger {
    client: RpcClient,
    encoding: UiAccountEncoding,
}

impl SolanaLedger {
    /// Creates a client for `url` requesting account payloads in `encoding`.
    #[must_use]
    pub fn new(url: impl Into<String>, timeout: Duration, encoding: UiAccountEncoding) -> Self {
        Self {
            client: RpcClient::new_with_timeout_and_commitment(
                url.into(),
                timeout,
                CommitmentConfig::processed(),
            ),
            encoding,
        }
    }

    /// Returns the endpoint URL.
    #[must_use]
    pub fn url(&self) -> String {
        self.client.url()
    }
}

impl LedgerRpc for SolanaLedger {
    fn get_multiple_accounts(
        &self,
        pubkeys: &[Pubkey],
        min_context_slot: Option<u64>,
    ) -> impl Future<Output = Result<AccountsPage, ClientError>> + Send {
        let config = RpcAccountInfoConfig {
            encoding: Some(self.encoding),
            data_slice: None,
            commitment: Some(CommitmentConfig::processed()),
            min_context_slot,
        };

        async move {
            let response = self
                .client
                .get_multiple_accounts_with_config(pubkeys, config)
                .await?;
            Ok(AccountsPage {
                slot: response.context.slot,
                accounts: response.value,
            })
        }
    }

    fn get_latest_blockhash(
        &self,
    ) -> impl Future<Output = Result<LatestBlockhash, ClientError>> + Send {
        async move {
            let (blockhash, last_valid_block_height) = self
                .client
                .get_latest_blockhash_with_commitment(CommitmentConfig::finalized())
                .await?;
            Ok(LatestBlockhash {
                blockhash,
                last_valid_block_height,
            })
        }
    }

    fn send_transaction(
        &self,
        tx: &Transaction,
        config: RpcSendTransactionConfig,
    ) -> impl Future<Output = Result<Signature, ClientError>> + Send {
        self.client.send_transaction_with_config(tx, config)
    }
}
