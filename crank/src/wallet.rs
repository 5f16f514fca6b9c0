//! Fee payer loading.
//!
//! The keypair is a JSON array of the 64 secret-key bytes, the format the
//! Solana CLI writes.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use solana_sdk::signature::Keypair;

use crate::error::CrankError;

/// Where the fee payer keypair comes from.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum WalletSource {
    /// Keypair JSON passed directly.
    Inline(String),
    /// Path to a keypair JSON file.
    File(PathBuf),
}

impl Default for WalletSource {
    fn default() -> Self {
        Self::File(default_wallet_path())
    }
}

impl fmt::Debug for WalletSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Inline(_) => f.write_str("Inline(<redacted>)"),
            Self::File(path) => f.debug_tuple("File").field(path).finish(),
        }
    }
}

impl WalletSource {
    /// Loads the keypair.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or does not hold a
    /// 64-byte secret key.
    pub fn load(&self) -> Result<Keypair, CrankError> {
        match self {
            Self::Inline(json) => keypair_from_json(json),
            Self::File(path) => read_keypair_file(path),
        }
    }
}

/// Default wallet location, `~/.config/solana/devnet.json`.
#[must_use]
pub fn default_wallet_path() -> PathBuf {
    let home = std::env::var_os("HOME").map_or_else(|| PathBuf::from("."), PathBuf::from);
    home.join(".config").join("solana").join("devnet.json")
}

/// Reads a keypair JSON file.
///
/// # Errors
///
/// Returns an error if the file cannot be read or parsed.
pub fn read_keypair_file(path: &Path) -> Result<Keypair, CrankError> {
    let json = std::fs::read_to_string(path)
        .map_err(|e| CrankError::Wallet(format!("{}: {}", path.display(), e)))?;
    keypair_from_json(&json)
}

/// Parses a keypair from a JSON byte array.
///
/// # Errors
///
/// Returns an error if the JSON is not an array of 64 bytes forming a valid
/// ed25519 keypair.
pub fn keypair_from_json(json: &str) -> Result<Keypair, CrankError> {
    let bytes: Vec<u8> = serde_json::from_str(json.trim())
        .map_err(|e| CrankError::Wallet(format!("invalid keypair JSON: {}", e)))?;

    if bytes.len() != 64 {
        return Err(CrankError::Wallet(format!(
            "expected 64 secret key bytes, got {}",
            bytes.len()
        )));
    }

    Keypair::try_from(bytes.as_slice())
        .map_err(|e| CrankError::Wallet(format!("invalid keypair: {}", e)))
}

#[cfg(test)]
mod tests {
    use solana_sdk::signature::Signer;

    use super::*;

    fn keypair_json(keypair: &Keypair) -> String {
        serde_json::to_string(&keypair.to_bytes().to_vec()).expect("json")
    }

    #[test]
    fn test_keypair_from_json() {
        let keypair = Keypair::new();
        let loaded = keypair_from_json(&keypair_json(&keypair)).expect("keypair");
        assert_eq!(loaded.pubkey(), keypair.pubkey());
    }

    #[test]
    fn test_keypair_from_json_wrong_length() {
        let result = keypair_from_json("[1, 2, 3]");
        assert!(matches!(result, Err(CrankError::Wallet(_))));
    }

    #[test]
    fn test_keypair_from_json_garbage() {
        assert!(keypair_from_json("not json").is_err());
    }

    #[test]
    fn test_inline_source() {
        let keypair = Keypair::new();
        let source = WalletSource::Inline(keypair_json(&keypair));
        let loaded = source.load().expect("keypair");
        assert_eq!(loaded.pubkey(), keypair.pubkey());
    }

    #[test]
    fn test_file_source() {
        let keypair = Keypair::new();
        let path = std::env::temp_dir().join(format!("crank-wallet-{}.json", keypair.pubkey()));
        std::fs::write(&path, keypair_json(&keypair)).expect("write");

        let loaded = WalletSource::File(path.clone()).load().expect("keypair");
        assert_eq!(loaded.pubkey(), keypair.pubkey());

        std::fs::remove_file(path).ok();
    }

    #[test]
    fn test_file_source_missing() {
        let source = WalletSource::File(PathBuf::from("/nonexistent/wallet.json"));
        assert!(matches!(source.load(), Err(CrankError::Wallet(_))));
    }

    #[test]
    fn test_debug_redacts_inline() {
        let source = WalletSource::Inline("[1,2,3]".to_string());
        assert_eq!(format!("{:?}", source), "Inline(<redacted>)");
    }

    #[test]
    fn test_default_path() {
        assert!(default_wallet_path().ends_with(".config/solana/devnet.json"));
    }
}
