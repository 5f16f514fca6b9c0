//! Market registry.
//!
//! Resolves the list of markets to crank and loads, once at startup, the
//! per-market data the crank needs every tick.

use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::path::Path;

use openbook_sdk::client::{DirectoryError, MarketDirectoryClient};
use openbook_sdk::types::MarketListFile;
use openbook_sdk::{MarketListEntry, MarketState, Mint};
use solana_sdk::pubkey::Pubkey;
use tracing::{info, warn};

use crate::config::{Cluster, ConfigError, MarketSource};
use crate::error::CrankError;
use crate::fetcher::AccountFetcher;
use crate::rpc::LedgerRpc;

/// Directory requests made before giving up.
pub const DISCOVERY_ATTEMPTS: u32 = 3;

/// Everything the crank needs to know about one market.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarketDescriptor {
    /// Display name.
    pub name: String,
    /// Market account.
    pub address: Pubkey,
    /// Owning DEX program.
    pub program_id: Pubkey,
    /// Event queue account.
    pub event_queue: Pubkey,
    /// Base token mint.
    pub base_mint: Pubkey,
    /// Quote token mint.
    pub quote_mint: Pubkey,
    /// Base token decimals.
    pub base_decimals: u8,
    /// Quote token decimals.
    pub quote_decimals: u8,
}

/// Resolves the market list from its configured source.
///
/// # Errors
///
/// Returns an error if the source cannot be read, the directory stays
/// unreachable, or the resulting list is empty.
pub async fn resolve(
    source: &MarketSource,
    cluster: Cluster,
) -> Result<Vec<MarketListEntry>, CrankError> {
    let entries = match source {
        MarketSource::Static { path } => read_market_file(path, cluster).await?,
        MarketSource::Directory {
            url,
            min_24h_volume,
        } => {
            let client = MarketDirectoryClient::new(url.clone())?;
            info!(url = %client.markets_url(*min_24h_volume), "Discovering markets");
            discover_with_retry(DISCOVERY_ATTEMPTS, || client.get_markets(*min_24h_volume))
                .await?
        }
    };

    let entries = dedup_entries(entries);
    if entries.is_empty() {
        return Err(ConfigError::NoMarkets.into());
    }

    info!(count = entries.len(), %cluster, "Resolved markets");
    Ok(entries)
}

/// Reads a static market list and picks the entries for `cluster`.
///
/// # Errors
///
/// Returns an error if the file cannot be read or parsed.
pub async fn read_market_file(
    path: &Path,
    cluster: Cluster,
) -> Result<Vec<MarketListEntry>, CrankError> {
    let json = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| CrankError::Decode(format!("{}: {}", path.display(), e)))?;
    parse_market_file(&json, cluster)
}

/// Parses a static market list and picks the live entries for `cluster`.
///
/// # Errors
///
/// Returns an error if the JSON does not match the market list shape.
pub fn parse_market_file(json: &str, cluster: Cluster) -> Result<Vec<MarketListEntry>, CrankError> {
    let mut file: MarketListFile = serde_json::from_str(json)
        .map_err(|e| CrankError::Decode(format!("market list: {}", e)))?;

    Ok(file
        .remove(cluster.as_str())
        .unwrap_or_default()
        .into_iter()
        .filter(|entry| !entry.deprecated)
        .collect())
}

/// Calls `fetch` up to `attempts` times, returning the first success.
///
/// # Errors
///
/// Returns [`CrankError::DiscoveryFailed`] carrying the last failure.
pub async fn discover_with_retry<F, Fut>(
    attempts: u32,
    mut fetch: F,
) -> Result<Vec<MarketListEntry>, CrankError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<Vec<MarketListEntry>, DirectoryError>>,
{
    let mut reason = String::from("no attempts made");

    for attempt in 1..=attempts {
        match fetch().await {
            Ok(entries) => return Ok(entries),
            Err(e) => {
                warn!(attempt, error = %e, "Market discovery failed");
                reason = e.to_string();
            }
        }
    }

    Err(CrankError::DiscoveryFailed { attempts, reason })
}

/// Drops entries whose address was already seen, keeping the first.
#[must_use]
pub fn dedup_entries(entries: Vec<MarketListEntry>) -> Vec<MarketListEntry> {
    let mut seen = HashSet::new();
    entries
        .into_iter()
        .filter(|entry| {
            let fresh = seen.insert(entry.address.clone());
            if !fresh {
                warn!(market = %entry.address, name = %entry.name, "Dropping duplicate market");
            }
            fresh
        })
        .collect()
}

/// Loads market descriptors from the ledger.
#[derive(Debug)]
pub struct MarketRegistry<R> {
    fetcher: AccountFetcher<R>,
    program_id: Pubkey,
}

impl<R: LedgerRpc> MarketRegistry<R> {
    /// Creates a registry for markets owned by `program_id`.
    #[must_use]
    pub fn new(fetcher: AccountFetcher<R>, program_id: Pubkey) -> Self {
        Self {
            fetcher,
            program_id,
        }
    }

    /// Loads descriptors for `entries` with two batched fetches: the market
    /// accounts, then their distinct mints.
    ///
    /// # Errors
    ///
    /// Returns an error if an address is invalid, an account is missing, or
    /// any account fails layout validation.
    pub async fn load(
        &self,
        entries: &[MarketListEntry],
    ) -> Result<Vec<MarketDescriptor>, CrankError> {
        let addresses = entries
            .iter()
            .map(MarketListEntry::pubkey)
            .collect::<Result<Vec<_>, _>>()?;

        let markets = self.fetcher.fetch(&addresses, 0).await?;

        let mut states = Vec::with_capacity(markets.len());
        for account in &markets.accounts {
            if account.owner != self.program_id {
                return Err(CrankError::Decode(format!(
                    "market {} is owned by {}, expected {}",
                    account.pubkey, account.owner, self.program_id
                )));
            }
            states.push(MarketState::decode_checked(&account.data, &account.pubkey)?);
        }

        let mut seen = HashSet::new();
        let mints: Vec<Pubkey> = states
            .iter()
            .flat_map(|state| [state.base_mint(), state.quote_mint()])
            .filter(|mint| seen.insert(*mint))
            .collect();

        let mint_accounts = self.fetcher.fetch(&mints, 0).await?;
        let decimals = mint_accounts
            .accounts
            .iter()
            .map(|account| -> Result<(Pubkey, u8), CrankError> {
                Ok((account.pubkey, Mint::decode(&account.data)?.decimals()))
            })
            .collect::<Result<HashMap<Pubkey, u8>, CrankError>>()?;

        let descriptors = entries
            .iter()
            .zip(addresses)
            .zip(&states)
            .map(|((entry, address), state)| {
                let base_mint = state.base_mint();
                let quote_mint = state.quote_mint();
                MarketDescriptor {
                    name: entry.name.clone(),
                    address,
                    program_id: self.program_id,
                    event_queue: state.event_queue(),
                    base_mint,
                    quote_mint,
                    base_decimals: decimals.get(&base_mint).copied().unwrap_or_default(),
                    quote_decimals: decimals.get(&quote_mint).copied().unwrap_or_default(),
                }
            })
            .collect::<Vec<_>>();

        for market in &descriptors {
            info!(
                market = %market.address,
                name = %market.name,
                event_queue = %market.event_queue,
                "Loaded market"
            );
        }

        Ok(descriptors)
    }
}
