//! Market directory client.
//!
//! Ledger access goes through `solana-client`; this module only covers the
//! optional HTTP directory that lists active markets.
//!
//! # Example
//!
//! ```rust,ignore
//! use openbook_sdk::client::{MarketDirectoryClient, DEFAULT_DIRECTORY_URL};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = MarketDirectoryClient::new(DEFAULT_DIRECTORY_URL)?;
//!
//!     for market in client.get_markets(100_000).await? {
//!         println!("{} {}", market.name, market.address);
//!     }
//!
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod directory;
pub mod error;

pub use config::{validate_url, DEFAULT_TIMEOUT_SECS};
pub use directory::{MarketDirectoryClient, DEFAULT_DIRECTORY_URL};
pub use error::DirectoryError;
