//! Account layouts and list types.
//!
//! Fixed binary layouts for the accounts the crank reads, plus the market
//! list entry shared by the directory and the static markets file.

pub mod account_flags;
pub mod event_queue;
pub mod listing;
pub mod market;
pub mod mint;

pub use account_flags::AccountFlags;
pub use event_queue::{decode_event_queue, Event, EventKind, EventQueueHeader, Side};
pub use listing::{MarketListEntry, MarketListFile};
pub use market::MarketState;
pub use mint::Mint;
