//! Batched account fetcher.
//!
//! Splits a key list into chunks of at most [`MAX_ACCOUNTS_PER_CALL`], issues
//! the chunks concurrently and joins them back in input order.

use std::sync::Arc;

use futures::future::try_join_all;
use solana_sdk::pubkey::Pubkey;
use tracing::debug;

use crate::error::CrankError;
use crate::rpc::LedgerRpc;

/// Endpoint limit for `getMultipleAccounts`.
pub const MAX_ACCOUNTS_PER_CALL: usize = 100;

/// One fetched account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedAccount {
    /// Account address.
    pub pubkey: Pubkey,
    /// Raw account data.
    pub data: Vec<u8>,
    /// Owning program.
    pub owner: Pubkey,
    /// Slot of the response this account came from.
    pub slot: u64,
}

/// Accounts in request order plus the highest slot observed.
#[derive(Debug, Clone, Default)]
pub struct AccountBatch {
    /// Highest context slot among all chunk responses.
    pub slot: u64,
    /// One entry per requested key, in request order.
    pub accounts: Vec<FetchedAccount>,
}

impl AccountBatch {
    /// Returns the number of accounts.
    #[must_use]
    pub fn len(&self) -> usize {
        self.accounts.len()
    }

    /// Returns true if the batch holds no accounts.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty()
    }
}

/// Fetches accounts in concurrent chunks.
#[derive(Debug)]
pub struct AccountFetcher<R> {
    rpc: Arc<R>,
    chunk_size: usize,
}

impl<R> Clone for AccountFetcher<R> {
    fn clone(&self) -> Self {
        Self {
            rpc: Arc::clone(&self.rpc),
            chunk_size: self.chunk_size,
        }
    }
}

impl<R: LedgerRpc> AccountFetcher<R> {
    /// Creates a fetcher using the endpoint limit as chunk size.
    #[must_use]
    pub fn new(rpc: Arc<R>) -> Self {
        Self {
            rpc,
            chunk_size: MAX_ACCOUNTS_PER_CALL,
        }
    }

    /// Creates a fetcher with a smaller chunk size.
    #[must_use]
    pub fn with_chunk_size(rpc: Arc<R>, chunk_size: usize) -> Self {
        Self {
            rpc,
            chunk_size: chunk_size.clamp(1, MAX_ACCOUNTS_PER_CALL),
        }
    }

    /// Returns the chunk size.
    #[must_use]
    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Fetches every account in `ids`, preserving order.
    ///
    /// A `min_slot` of zero sends no slot floor.
    ///
    /// # Errors
    ///
    /// Fails as a whole if any chunk fails or any account is missing.
    pub async fn fetch(&self, ids: &[Pubkey], min_slot: u64) -> Result<AccountBatch, CrankError> {
        if ids.is_empty() {
            return Ok(AccountBatch::default());
        }

        let chunks = try_join_all(
            ids.chunks(self.chunk_size)
                .map(|chunk| self.fetch_chunk(chunk, min_slot)),
        )
        .await?;

        let slot = chunks.iter().map(|(slot, _)| *slot).max().unwrap_or_default();
        let accounts: Vec<FetchedAccount> =
            chunks.into_iter().flat_map(|(_, accounts)| accounts).collect();

        debug!(
            accounts = accounts.len(),
            chunks = ids.len().div_ceil(self.chunk_size),
            slot,
            "Fetched accounts"
        );

        Ok(AccountBatch { slot, accounts })
    }

    async fn fetch_chunk(
        &self,
        chunk: &[Pubkey],
        min_slot: u64,
    ) -> Result<(u64, Vec<FetchedAccount>), CrankError> {
        let page = self
            .rpc
            .get_multiple_accounts(chunk, (min_slot > 0).then_some(min_slot))
            .await
            .map_err(|e| CrankError::from_client(e, min_slot))?;

        if page.accounts.len() != chunk.len() {
            return Err(CrankError::Transport(format!(
                "requested {} accounts, endpoint returned {}",
                chunk.len(),
                page.accounts.len()
            )));
        }

        let accounts = chunk
            .iter()
            .zip(page.accounts)
            .map(|(pubkey, account)| {
                let account = account.ok_or(CrankError::MissingAccount(*pubkey))?;
                Ok(FetchedAccount {
                    pubkey: *pubkey,
                    data: account.data,
                    owner: account.owner,
                    slot: page.slot,
                })
            })
            .collect::<Result<Vec<_>, CrankError>>()?;

        Ok((page.slot, accounts))
    }
}
