//! Market directory client.
//!
//! The directory is an optional HTTP service listing active markets,
//! filtered by trailing 24h volume.

use std::time::Duration;

use super::config::{validate_url, DEFAULT_TIMEOUT_SECS};
use super::error::DirectoryError;
use crate::types::MarketListEntry;

/// Default market directory URL.
pub const DEFAULT_DIRECTORY_URL: &str = "https://openserum.io/api/serum/markets.json";

/// HTTP client for the market directory.
#[derive(Debug, Clone)]
pub struct MarketDirectoryClient {
    base_url: String,
    http: reqwest::Client,
}

impl MarketDirectoryClient {
    /// Creates a new directory client.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL is invalid or the HTTP client cannot be
    /// created.
    pub fn new(base_url: impl Into<String>) -> Result<Self, DirectoryError> {
        let base_url = base_url.into();
        validate_url(&base_url)?;

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .build()
            .map_err(DirectoryError::Request)?;

        Ok(Self { base_url, http })
    }

    /// Returns the directory URL.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Builds the request URL for a volume threshold.
    #[must_use]
    pub fn markets_url(&self, min_24h_volume: u64) -> String {
        format!("{}?min24hVolume={}", self.base_url, min_24h_volume)
    }

    /// Lists markets whose trailing 24h volume is at least `min_24h_volume`.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the body is not a market list.
    pub async fn get_markets(
        &self,
        min_24h_volume: u64,
    ) -> Result<Vec<MarketListEntry>, DirectoryError> {
        let resp = self.http.get(self.markets_url(min_24h_volume)).send().await?;
        let status = resp.status();
        let body = resp.text().await?;

        if !status.is_success() {
            return Err(DirectoryError::Http {
                status: status.as_u16(),
                body,
            });
        }

        serde_json::from_str(&body).map_err(|e| DirectoryError::Deserialization(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_directory_new() {
        let client = MarketDirectoryClient::new(DEFAULT_DIRECTORY_URL).expect("client");
        assert_eq!(client.base_url(), DEFAULT_DIRECTORY_URL);
    }

    #[test]
    fn test_directory_invalid_url() {
        assert!(MarketDirectoryClient::new("").is_err());
        assert!(MarketDirectoryClient::new("openserum.io").is_err());
    }

    #[test]
    fn test_directory_markets_url() {
        let client = MarketDirectoryClient::new("https://dir.example.com/markets.json")
            .expect("client");
        assert_eq!(
            client.markets_url(100_000),
            "https://dir.example.com/markets.json?min24hVolume=100000"
        );
    }
}
