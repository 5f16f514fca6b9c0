//! SDK error types.
//!
//! Provides error types for layout decoding and instruction encoding.

/// SDK errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SdkError {
    /// Invalid address.
    #[error("invalid address: {0}")]
    InvalidAddress(String),

    /// Account data does not match the expected fixed layout.
    #[error("invalid {account} layout: expected {expected} bytes, got {actual}")]
    InvalidLayout {
        /// Kind of account being decoded.
        account: &'static str,
        /// Expected length in bytes.
        expected: usize,
        /// Actual length in bytes.
        actual: usize,
    },

    /// Account flags do not describe the expected account kind.
    #[error("invalid {account} account flags: {flags:#x}")]
    InvalidAccountFlags {
        /// Kind of account being decoded.
        account: &'static str,
        /// Raw flags found in the account.
        flags: u64,
    },

    /// Event queue header is inconsistent with the buffer.
    #[error("corrupt event queue: {0}")]
    CorruptQueue(String),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(String),
}
