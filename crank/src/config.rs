//! Crank service configuration.
//!
//! Every knob has a default and can be overridden through the environment.
//! See [`CrankConfig::from_env`] for the variable names.

use std::collections::HashSet;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use openbook_sdk::client::DEFAULT_DIRECTORY_URL;
use serde::{Deserialize, Serialize};
use solana_account_decoder::UiAccountEncoding;
use solana_sdk::pubkey::Pubkey;

use crate::wallet::WalletSource;

/// Largest compute unit limit a single transaction may request.
pub const MAX_COMPUTE_UNIT_LIMIT: u32 = 1_400_000;

/// Target cluster.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Cluster {
    /// Mainnet beta.
    #[default]
    Mainnet,
    /// Devnet.
    Devnet,
}

impl Cluster {
    /// Name used as the key in market list files.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Mainnet => "mainnet",
            Self::Devnet => "devnet",
        }
    }

    /// Public JSON-RPC endpoint.
    #[must_use]
    pub const fn default_endpoint(&self) -> &'static str {
        match self {
            Self::Mainnet => "https://api.mainnet-beta.solana.com",
            Self::Devnet => "https://api.devnet.solana.com",
        }
    }

    /// OpenBook DEX program deployment.
    #[must_use]
    pub const fn default_program_id(&self) -> &'static str {
        match self {
            Self::Mainnet => "srmqPvymJeFKQ4zGQed1GFppgkRHL9kaELCbyksJtPX",
            Self::Devnet => "EoTcMgcDRTJVZDMZWBoU6rhYHZfkNTVEAfz3uUJRcYGj",
        }
    }
}

impl fmt::Display for Cluster {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Cluster {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mainnet" | "mainnet-beta" => Ok(Self::Mainnet),
            "devnet" => Ok(Self::Devnet),
            other => Err(ConfigError::InvalidVar {
                key: "CLUSTER",
                value: other.to_string(),
            }),
        }
    }
}

/// Where the market list comes from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MarketSource {
    /// JSON file keyed by cluster name.
    Static {
        /// Path to the market list file.
        path: PathBuf,
    },
    /// HTTP market directory filtered by 24h volume.
    Directory {
        /// Directory URL.
        url: String,
        /// Minimum trailing 24h volume.
        min_24h_volume: u64,
    },
}

impl Default for MarketSource {
    fn default() -> Self {
        Self::Directory {
            url: DEFAULT_DIRECTORY_URL.to_string(),
            min_24h_volume: 100_000,
        }
    }
}

/// Configuration for the crank service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrankConfig {
    /// Target cluster.
    pub cluster: Cluster,

    /// JSON-RPC endpoint URL.
    pub endpoint_url: String,

    /// DEX program id (base58).
    pub program_id: String,

    /// Fee payer keypair source.
    #[serde(skip)]
    pub wallet: WalletSource,

    /// Market list source.
    pub market_source: MarketSource,

    /// Poll interval in milliseconds.
    pub poll_interval_ms: u64,

    /// Blockhash refresh interval in milliseconds.
    pub blockhash_refresh_ms: u64,

    /// Distinct open orders accounts per settlement instruction.
    pub max_unique_accounts: usize,

    /// Event limit encoded into each settlement instruction.
    pub consume_events_limit: u16,

    /// Queue depth above which a market is treated as priority.
    pub priority_queue_limit: usize,

    /// Markets always treated as priority (base58).
    pub priority_markets: Vec<String>,

    /// Compute unit price for ordinary batches, in micro-lamports.
    pub default_cu_price: u64,

    /// Compute unit price for priority batches, in micro-lamports.
    pub priority_cu_price: u64,

    /// Compute unit budget per settlement instruction.
    pub cu_limit: u32,

    /// Settlement instructions per transaction.
    pub max_tx_instructions: usize,

    /// Markets with fewer pending events are skipped.
    pub min_events: usize,

    /// Account payload encoding.
    pub account_encoding: UiAccountEncoding,

    /// RPC request timeout in milliseconds.
    pub rpc_timeout_ms: u64,
}

impl Default for CrankConfig {
    fn default() -> Self {
        let cluster = Cluster::default();
        Self {
            cluster,
            endpoint_url: cluster.default_endpoint().to_string(),
            program_id: cluster.default_program_id().to_string(),
            wallet: WalletSource::default(),
            market_source: MarketSource::default(),
            poll_interval_ms: 1000,
            blockhash_refresh_ms: 1000,
            max_unique_accounts: 10,
            consume_events_limit: 19,
            priority_queue_limit: 100,
            priority_markets: Vec::new(),
            default_cu_price: 0,
            priority_cu_price: 100_000,
            cu_limit: 50_000,
            max_tx_instructions: 1,
            min_events: 0,
            account_encoding: UiAccountEncoding::Base64Zstd,
            rpc_timeout_ms: 30_000,
        }
    }
}

impl CrankConfig {
    /// Creates a configuration for a cluster using its default endpoint and
    /// program id.
    #[must_use]
    pub fn for_cluster(cluster: Cluster) -> Self {
        Self {
            cluster,
            endpoint_url: cluster.default_endpoint().to_string(),
            program_id: cluster.default_program_id().to_string(),
            ..Default::default()
        }
    }

    /// Loads the configuration from process environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if a variable is set but cannot be parsed.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(|key| std::env::var(key).ok())
    }

    /// Loads the configuration from a variable lookup.
    ///
    /// Recognised variables: `CLUSTER`, `ENDPOINT_URL`, `PROGRAM_ID`,
    /// `KEYPAIR`, `WALLET_PATH`, `INTERVAL`, `BLOCKHASH_INTERVAL`,
    /// `MAX_UNIQUE_ACCOUNTS`, `CONSUME_EVENTS_LIMIT`, `PRIORITY_QUEUE_LIMIT`,
    /// `PRIORITY_MARKETS`, `DEFAULT_CU_PRICE`, `PRIORITY_CU_PRICE`,
    /// `CU_LIMIT`, `MAX_TX_INSTRUCTIONS`, `MIN_EVENTS`, `TOP_MARKET`,
    /// `MARKETS_FILE`, `MARKET_DIRECTORY_URL`, `MIN_24H_VOLUME`,
    /// `ACCOUNT_ENCODING`, `RPC_TIMEOUT_MS`.
    ///
    /// # Errors
    ///
    /// Returns an error if a variable is set but cannot be parsed.
    pub fn from_vars<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let cluster: Cluster = parse_var(&var, "CLUSTER", Cluster::default())?;
        let defaults = Self::for_cluster(cluster);

        let wallet = match (var("KEYPAIR"), var("WALLET_PATH")) {
            (Some(json), _) => WalletSource::Inline(json),
            (None, Some(path)) => WalletSource::File(PathBuf::from(path)),
            (None, None) => WalletSource::default(),
        };

        // Only the literal "false" selects the static file.
        let top_market = var("TOP_MARKET").is_none_or(|v| v.trim() != "false");
        let market_source = if top_market {
            MarketSource::Directory {
                url: var("MARKET_DIRECTORY_URL")
                    .unwrap_or_else(|| DEFAULT_DIRECTORY_URL.to_string()),
                min_24h_volume: parse_var(&var, "MIN_24H_VOLUME", 100_000)?,
            }
        } else {
            MarketSource::Static {
                path: PathBuf::from(var("MARKETS_FILE").unwrap_or_else(|| "markets.json".into())),
            }
        };

        let priority_markets = var("PRIORITY_MARKETS")
            .map(|list| {
                list.split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(String::from)
                    .collect()
            })
            .unwrap_or_default();

        Ok(Self {
            cluster,
            endpoint_url: var("ENDPOINT_URL").unwrap_or(defaults.endpoint_url),
            program_id: var("PROGRAM_ID").unwrap_or(defaults.program_id),
            wallet,
            market_source,
            poll_interval_ms: parse_var(&var, "INTERVAL", defaults.poll_interval_ms)?,
            blockhash_refresh_ms: parse_var(
                &var,
                "BLOCKHASH_INTERVAL",
                defaults.blockhash_refresh_ms,
            )?,
            max_unique_accounts: parse_var(
                &var,
                "MAX_UNIQUE_ACCOUNTS",
                defaults.max_unique_accounts,
            )?,
            consume_events_limit: parse_var(
                &var,
                "CONSUME_EVENTS_LIMIT",
                defaults.consume_events_limit,
            )?,
            priority_queue_limit: parse_var(
                &var,
                "PRIORITY_QUEUE_LIMIT",
                defaults.priority_queue_limit,
            )?,
            priority_markets,
            default_cu_price: parse_var(&var, "DEFAULT_CU_PRICE", defaults.default_cu_price)?,
            priority_cu_price: parse_var(&var, "PRIORITY_CU_PRICE", defaults.priority_cu_price)?,
            cu_limit: parse_var(&var, "CU_LIMIT", defaults.cu_limit)?,
            max_tx_instructions: parse_var(
                &var,
                "MAX_TX_INSTRUCTIONS",
                defaults.max_tx_instructions,
            )?,
            min_events: parse_var(&var, "MIN_EVENTS", defaults.min_events)?,
            account_encoding: match var("ACCOUNT_ENCODING") {
                Some(value) => parse_encoding(&value)?,
                None => defaults.account_encoding,
            },
            rpc_timeout_ms: parse_var(&var, "RPC_TIMEOUT_MS", defaults.rpc_timeout_ms)?,
        })
    }

    /// Sets the compute unit prices.
    #[must_use]
    pub fn with_priority_fees(mut self, default: u64, priority: u64) -> Self {
        self.default_cu_price = default;
        self.priority_cu_price = priority;
        self
    }

    /// Sets the poll interval.
    #[must_use]
    pub fn with_poll_interval(mut self, ms: u64) -> Self {
        self.poll_interval_ms = ms;
        self
    }

    /// Sets the number of settlement instructions per transaction.
    #[must_use]
    pub fn with_max_tx_instructions(mut self, max: usize) -> Self {
        self.max_tx_instructions = max;
        self
    }

    /// Sets the minimum queue depth worth cranking.
    #[must_use]
    pub fn with_min_events(mut self, min: usize) -> Self {
        self.min_events = min;
        self
    }

    /// Sets the priority threshold and allow-list.
    #[must_use]
    pub fn with_priority(mut self, queue_limit: usize, markets: Vec<String>) -> Self {
        self.priority_queue_limit = queue_limit;
        self.priority_markets = markets;
        self
    }

    /// Returns the poll interval.
    #[must_use]
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Returns the blockhash refresh interval.
    #[must_use]
    pub fn blockhash_refresh(&self) -> Duration {
        Duration::from_millis(self.blockhash_refresh_ms)
    }

    /// Returns the RPC request timeout.
    #[must_use]
    pub fn rpc_timeout(&self) -> Duration {
        Duration::from_millis(self.rpc_timeout_ms)
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.poll_interval_ms == 0 {
            return Err(ConfigError::InvalidPollInterval);
        }

        if self.blockhash_refresh_ms == 0 {
            return Err(ConfigError::InvalidBlockhashInterval);
        }

        if self.max_unique_accounts == 0 {
            return Err(ConfigError::ZeroLimit("max_unique_accounts"));
        }

        if self.consume_events_limit == 0 {
            return Err(ConfigError::ZeroLimit("consume_events_limit"));
        }

        if self.max_tx_instructions == 0 {
            return Err(ConfigError::ZeroLimit("max_tx_instructions"));
        }

        if self.cu_limit == 0 || self.total_compute_unit_limit().is_none() {
            return Err(ConfigError::InvalidComputeBudget {
                per_instruction: self.cu_limit,
                instructions: self.max_tx_instructions,
            });
        }

        self.parse_program_id()?;
        self.parse_priority_markets()?;

        Ok(())
    }

    /// Compute unit limit requested by every transaction, if within bounds.
    #[must_use]
    pub fn total_compute_unit_limit(&self) -> Option<u32> {
        u32::try_from(self.max_tx_instructions)
            .ok()
            .and_then(|n| self.cu_limit.checked_mul(n))
            .filter(|total| *total <= MAX_COMPUTE_UNIT_LIMIT)
    }

    /// Parses the program id.
    ///
    /// # Errors
    ///
    /// Returns an error if the address is invalid.
    pub fn parse_program_id(&self) -> Result<Pubkey, ConfigError> {
        parse_address("PROGRAM_ID", &self.program_id)
    }

    /// Parses the priority allow-list.
    ///
    /// # Errors
    ///
    /// Returns an error if any address is invalid.
    pub fn parse_priority_markets(&self) -> Result<HashSet<Pubkey>, ConfigError> {
        self.priority_markets
            .iter()
            .map(|s| parse_address("PRIORITY_MARKETS", s))
            .collect()
    }
}

fn parse_var<F, T>(var: &F, key: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match var(key) {
        Some(value) => value.trim().parse().map_err(|_| ConfigError::InvalidVar {
            key,
            value: value.clone(),
        }),
        None => Ok(default),
    }
}

fn parse_encoding(value: &str) -> Result<UiAccountEncoding, ConfigError> {
    match value.trim() {
        "base64+zstd" => Ok(UiAccountEncoding::Base64Zstd),
        "base64" => Ok(UiAccountEncoding::Base64),
        other => Err(ConfigError::InvalidVar {
            key: "ACCOUNT_ENCODING",
            value: other.to_string(),
        }),
    }
}

fn parse_address(key: &'static str, s: &str) -> Result<Pubkey, ConfigError> {
    let bytes = bs58::decode(s)
        .into_vec()
        .map_err(|_| ConfigError::InvalidAddress {
            key,
            value: s.to_string(),
        })?;

    let arr: [u8; 32] = bytes
        .try_into()
        .map_err(|_| ConfigError::InvalidAddress {
            key,
            value: s.to_string(),
        })?;

    Ok(Pubkey::new_from_array(arr))
}

/// Configuration errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    /// Invalid poll interval.
    #[error("poll_interval_ms must be > 0")]
    InvalidPollInterval,

    /// Invalid blockhash refresh interval.
    #[error("blockhash_refresh_ms must be > 0")]
    InvalidBlockhashInterval,

    /// The resolved market list is empty.
    #[error("no markets to crank")]
    NoMarkets,

    /// A limit that must be positive is zero.
    #[error("{0} must be > 0")]
    ZeroLimit(&'static str),

    /// Compute budget out of range.
    #[error(
        "compute budget of {per_instruction} units x {instructions} instructions exceeds {}",
        MAX_COMPUTE_UNIT_LIMIT
    )]
    InvalidComputeBudget {
        /// Units per instruction.
        per_instruction: u32,
        /// Instructions per transaction.
        instructions: usize,
    },

    /// Environment variable could not be parsed.
    #[error("invalid value for {key}: {value}")]
    InvalidVar {
        /// Variable name.
        key: &'static str,
        /// Offending value.
        value: String,
    },

    /// Invalid base58 address.
    #[error("invalid address in {key}: {value}")]
    InvalidAddress {
        /// Variable name.
        key: &'static str,
        /// Offending value.
        value: String,
    },
}
