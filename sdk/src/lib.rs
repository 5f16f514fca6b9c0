//! OpenBook SDK - protocol formats for the crank.
//!
//! This crate provides the pieces of the DEX protocol the crank touches:
//! fixed account layouts, the settlement instruction encoding, and the
//! market directory client.
//!
//! # Account Layouts
//!
//! - [`MarketState`]: Market account (388 bytes)
//! - [`Mint`]: SPL token mint (82 bytes)
//! - [`EventQueueHeader`] and [`decode_event_queue`]: Event ring buffer
//!
//! # Instructions
//!
//! - [`ConsumeEventsBuilder`]: Settles pending events
//!
//! # Example
//!
//! ```rust
//! use openbook_sdk::instructions::canonicalize_open_orders;
//! use solana_sdk::pubkey::Pubkey;
//!
//! let a = Pubkey::new_unique();
//! let b = Pubkey::new_unique();
//! let accounts = canonicalize_open_orders(vec![a, b, a]);
//! assert_eq!(accounts.len(), 2);
//! ```

pub mod client;
pub mod error;
pub mod instructions;
pub mod types;

pub use error::SdkError;
pub use instructions::ConsumeEventsBuilder;
pub use types::{
    decode_event_queue, AccountFlags, Event, EventKind, EventQueueHeader, MarketListEntry,
    MarketState, Mint, Side,
};

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils {
    //! Raw account builders for tests in dependent crates.

    pub use crate::types::event_queue::test_utils::*;
    pub use crate::types::market::test_utils::*;
    pub use crate::types::mint::test_utils::*;
}
