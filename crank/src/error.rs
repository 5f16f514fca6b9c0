//! Crank error types.
//!
//! Every failure the service can observe maps onto one of these variants.
//! Startup code treats all of them as fatal; the scheduler recovers from
//! all of them at the tick boundary.

use openbook_sdk::client::DirectoryError;
use openbook_sdk::SdkError;
use solana_client::client_error::{ClientError, ClientErrorKind};
use solana_client::rpc_custom_error::JSON_RPC_SERVER_ERROR_MIN_CONTEXT_SLOT_NOT_REACHED;
use solana_client::rpc_request::RpcError;
use solana_sdk::pubkey::Pubkey;

use crate::config::ConfigError;

/// Crank errors.
#[derive(Debug, thiserror::Error)]
pub enum CrankError {
    /// Endpoint rejected a call.
    #[error("RPC error [{code}]: {message}")]
    Rpc {
        /// JSON-RPC or HTTP status code.
        code: i64,
        /// Error message.
        message: String,
    },

    /// The endpoint could not be reached or answered garbage.
    #[error("transport error: {0}")]
    Transport(String),

    /// An account the crank depends on does not exist.
    #[error("account {0} not found")]
    MissingAccount(Pubkey),

    /// Account data does not match the expected layout.
    #[error("decode error: {0}")]
    Decode(String),

    /// Market directory unreachable after bounded retries.
    #[error("market discovery failed after {attempts} attempts: {reason}")]
    DiscoveryFailed {
        /// Attempts made.
        attempts: u32,
        /// Last failure.
        reason: String,
    },

    /// The node has not caught up with the slot floor yet.
    #[error("minimum context slot {min_slot} not reached")]
    BenignRace {
        /// Slot floor the request carried.
        min_slot: u64,
    },

    /// A transaction could not be prepared or was rejected.
    #[error("submission failed: {0}")]
    Submission(String),

    /// Invalid configuration.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Wallet could not be loaded.
    #[error("wallet error: {0}")]
    Wallet(String),
}

impl CrankError {
    /// Returns true for the expected "slot floor not reached" race.
    #[must_use]
    pub const fn is_benign_race(&self) -> bool {
        matches!(self, Self::BenignRace { .. })
    }

    /// Converts a client error raised by a call that carried `min_slot`.
    #[must_use]
    pub fn from_client(err: ClientError, min_slot: u64) -> Self {
        if rpc_code(&err) == Some(JSON_RPC_SERVER_ERROR_MIN_CONTEXT_SLOT_NOT_REACHED) {
            return Self::BenignRace { min_slot };
        }
        Self::from(err)
    }
}

/// JSON-RPC error code carried by a client error, if any.
fn rpc_code(err: &ClientError) -> Option<i64> {
    match err.kind() {
        ClientErrorKind::RpcError(RpcError::RpcResponseError { code, .. }) => Some(*code),
        _ => None,
    }
}

impl From<ClientError> for CrankError {
    fn from(err: ClientError) -> Self {
        match err.kind() {
            ClientErrorKind::RpcError(RpcError::RpcResponseError { code, message, .. }) => {
                Self::Rpc {
                    code: *code,
                    message: message.clone(),
                }
            }
            ClientErrorKind::RpcError(RpcError::ParseError(msg)) => Self::Decode(msg.clone()),
            _ => Self::Transport(err.to_string()),
        }
    }
}

impl From<DirectoryError> for CrankError {
    fn from(err: DirectoryError) -> Self {
        match err {
            DirectoryError::Http { status, body } => Self::Rpc {
                code: i64::from(status),
                message: body,
            },
            DirectoryError::Deserialization(msg) => Self::Decode(msg),
            other => Self::Transport(other.to_string()),
        }
    }
}

impl From<SdkError> for CrankError {
    fn from(err: SdkError) -> Self {
        Self::Decode(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rpc::mock::rpc_error;

    #[test]
    fn test_from_client_min_context_slot() {
        let err = CrankError::from_client(
            rpc_error(
                JSON_RPC_SERVER_ERROR_MIN_CONTEXT_SLOT_NOT_REACHED,
                "Minimum context slot has not been reached",
            ),
            42,
        );
        assert!(err.is_benign_race());
        assert_eq!(err.to_string(), "minimum context slot 42 not reached");
    }

    #[test]
    fn test_from_client_rpc() {
        let err = CrankError::from_client(rpc_error(-32602, "Invalid params"), 42);
        assert!(matches!(err, CrankError::Rpc { code: -32602, .. }));
        assert!(!err.is_benign_race());
    }

    #[test]
    fn test_from_client_transport() {
        let err = CrankError::from(ClientError::from(ClientErrorKind::Custom(
            "connection reset".to_string(),
        )));
        assert!(matches!(err, CrankError::Transport(_)));
    }

    #[test]
    fn test_from_directory_http() {
        let err = CrankError::from(DirectoryError::Http {
            status: 503,
            body: "busy".to_string(),
        });
        assert_eq!(err.to_string(), "RPC error [503]: busy");
    }

    #[test]
    fn test_from_directory_timeout() {
        let err = CrankError::from(DirectoryError::Timeout);
        assert!(matches!(err, CrankError::Transport(_)));
    }

    #[test]
    fn test_from_sdk_error() {
        let err = CrankError::from(SdkError::CorruptQueue("count 9 exceeds capacity 4".into()));
        assert!(matches!(err, CrankError::Decode(_)));
    }

    #[test]
    fn test_missing_account_display() {
        let key = Pubkey::new_unique();
        let err = CrankError::MissingAccount(key);
        assert_eq!(err.to_string(), format!("account {} not found", key));
    }
}
