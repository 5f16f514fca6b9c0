//! Instruction builders for crank transactions.
//!
//! # Example
//!
//! ```rust,ignore
//! use openbook_sdk::instructions::ConsumeEventsBuilder;
//! use solana_sdk::pubkey::Pubkey;
//!
//! let ix = ConsumeEventsBuilder::new(program_id)
//!     .market(market)
//!     .event_queue(event_queue)
//!     .open_orders(accounts)
//!     .limit(19)
//!     .build()?;
//! ```

pub mod consume_events;

pub use consume_events::{
    canonicalize_open_orders, compare_open_orders, open_orders_sort_key, ConsumeEventsBuilder,
};
