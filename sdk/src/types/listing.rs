//! Market list entries.
//!
//! The same shape is served by the market directory and stored in the
//! static markets file.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use solana_sdk::pubkey::Pubkey;

use crate::error::SdkError;

/// A market known by name and address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarketListEntry {
    /// Display name (e.g., "SOL/USDC").
    pub name: String,

    /// Market account address (base58 encoded).
    pub address: String,

    /// Deprecated markets are listed for reference only.
    #[serde(default)]
    pub deprecated: bool,
}

impl MarketListEntry {
    /// Creates a new entry.
    #[must_use]
    pub fn new(name: impl Into<String>, address: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            address: address.into(),
            deprecated: false,
        }
    }

    /// Parses the market address.
    ///
    /// # Errors
    ///
    /// Returns an error if the address is not a valid base58 public key.
    pub fn pubkey(&self) -> Result<Pubkey, SdkError> {
        let bytes = bs58::decode(&self.address)
            .into_vec()
            .map_err(|_| SdkError::InvalidAddress(self.address.clone()))?;
        let arr: [u8; 32] = bytes
            .try_into()
            .map_err(|_| SdkError::InvalidAddress(self.address.clone()))?;
        Ok(Pubkey::new_from_array(arr))
    }
}

/// Static markets file: lists keyed by cluster name.
pub type MarketListFile = HashMap<String, Vec<MarketListEntry>>;
