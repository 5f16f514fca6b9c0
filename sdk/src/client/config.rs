//! Client configuration.

use super::error::DirectoryError;

/// Default request timeout in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Checks that a URL is non-empty and uses an HTTP scheme.
///
/// # Errors
///
/// Returns an error if the URL is empty or not http(s).
pub fn validate_url(url: &str) -> Result<(), DirectoryError> {
    if url.is_empty() {
        return Err(DirectoryError::InvalidConfig(
            "url cannot be empty".to_string(),
        ));
    }

    if !url.starts_with("http://") && !url.starts_with("https://") {
        return Err(DirectoryError::InvalidConfig(
            "url must start with http:// or https://".to_string(),
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_url() {
        assert!(validate_url("https://openserum.io/api/serum/markets.json").is_ok());
        assert!(validate_url("http://localhost:3000").is_ok());
        assert!(validate_url("").is_err());
        assert!(validate_url("ws://openserum.io").is_err());
    }
}
