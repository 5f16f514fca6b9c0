//! Account flags shared by every DEX-owned account.

use std::fmt;

/// Bit set stored in the first word of each DEX account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AccountFlags(u64);

impl AccountFlags {
    /// Account has been initialized.
    pub const INITIALIZED: u64 = 1 << 0;
    /// Account is a market.
    pub const MARKET: u64 = 1 << 1;
    /// Account is an open orders account.
    pub const OPEN_ORDERS: u64 = 1 << 2;
    /// Account is a request queue.
    pub const REQUEST_QUEUE: u64 = 1 << 3;
    /// Account is an event queue.
    pub const EVENT_QUEUE: u64 = 1 << 4;
    /// Account is the bids side of a book.
    pub const BIDS: u64 = 1 << 5;
    /// Account is the asks side of a book.
    pub const ASKS: u64 = 1 << 6;
    /// Market has been disabled.
    pub const DISABLED: u64 = 1 << 7;

    /// Wraps raw flag bits.
    #[must_use]
    pub const fn new(bits: u64) -> Self {
        Self(bits)
    }

    /// Returns the raw bits.
    #[must_use]
    pub const fn bits(&self) -> u64 {
        self.0
    }

    /// Returns true if every bit of `mask` is set.
    #[must_use]
    pub const fn contains(&self, mask: u64) -> bool {
        self.0 & mask == mask
    }

    /// Returns true for an initialized market.
    #[must_use]
    pub const fn is_market(&self) -> bool {
        self.contains(Self::INITIALIZED | Self::MARKET)
    }

    /// Returns true for an initialized event queue.
    #[must_use]
    pub const fn is_event_queue(&self) -> bool {
        self.contains(Self::INITIALIZED | Self::EVENT_QUEUE)
    }
}

impl fmt::Display for AccountFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}
