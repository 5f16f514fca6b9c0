//! ConsumeEvents instruction builder.
//!
//! Builds the instruction that settles pending events from a market's event
//! queue into the open orders accounts they reference.

use std::cmp::Ordering;

use borsh::BorshSerialize;
use solana_sdk::{
    instruction::{AccountMeta, Instruction},
    pubkey::Pubkey,
};

use crate::error::SdkError;

/// Instruction layout version.
pub const INSTRUCTION_VERSION: u8 = 0;

/// Tag of the ConsumeEvents instruction.
pub const CONSUME_EVENTS_TAG: u32 = 3;

/// Instruction data (on-chain format).
#[derive(Debug, Clone, BorshSerialize)]
struct ConsumeEventsInstructionData {
    version: u8,
    tag: u32,
    /// Maximum events to process.
    limit: u16,
}

/// Orders open orders accounts the way the program walks them.
///
/// Keys compare as four little-endian 64-bit words, most significant word
/// first in address order.
#[must_use]
pub fn open_orders_sort_key(key: &Pubkey) -> [u64; 4] {
    let bytes = key.to_bytes();
    let mut words = [0u64; 4];
    for (word, chunk) in words.iter_mut().zip(bytes.chunks_exact(8)) {
        let mut buf = [0u8; 8];
        buf.copy_from_slice(chunk);
        *word = u64::from_le_bytes(buf);
    }
    words
}

/// Compares two open orders accounts by [`open_orders_sort_key`].
#[must_use]
pub fn compare_open_orders(a: &Pubkey, b: &Pubkey) -> Ordering {
    open_orders_sort_key(a).cmp(&open_orders_sort_key(b))
}

/// Deduplicates and sorts open orders accounts into instruction order.
#[must_use]
pub fn canonicalize_open_orders(mut accounts: Vec<Pubkey>) -> Vec<Pubkey> {
    accounts.sort_by(compare_open_orders);
    accounts.dedup();
    accounts
}

/// Builder for the ConsumeEvents instruction.
#[derive(Debug, Clone)]
pub struct ConsumeEventsBuilder {
    program_id: Pubkey,
    market: Option<Pubkey>,
    event_queue: Option<Pubkey>,
    coin_fee: Option<Pubkey>,
    pc_fee: Option<Pubkey>,
    limit: u16,
    /// OpenOrders accounts for users in events.
    open_orders: Vec<Pubkey>,
}

impl ConsumeEventsBuilder {
    /// Creates a new builder.
    #[must_use]
    pub fn new(program_id: Pubkey) -> Self {
        Self {
            program_id,
            market: None,
            event_queue: None,
            coin_fee: None,
            pc_fee: None,
            limit: 10, // Default limit
            open_orders: Vec::new(),
        }
    }

    /// Sets the market.
    #[must_use]
    pub fn market(mut self, market: Pubkey) -> Self {
        self.market = Some(market);
        self
    }

    /// Sets the event queue.
    #[must_use]
    pub fn event_queue(mut self, event_queue: Pubkey) -> Self {
        self.event_queue = Some(event_queue);
        self
    }

    /// Sets the base and quote fee destinations.
    ///
    /// When unset both default to the event queue.
    #[must_use]
    pub fn fee_accounts(mut self, coin_fee: Pubkey, pc_fee: Pubkey) -> Self {
        self.coin_fee = Some(coin_fee);
        self.pc_fee = Some(pc_fee);
        self
    }

    /// Sets the maximum number of events to process.
    #[must_use]
    pub fn limit(mut self, limit: u16) -> Self {
        self.limit = limit;
        self
    }

    /// Sets all open orders accounts.
    #[must_use]
    pub fn open_orders(mut self, accounts: Vec<Pubkey>) -> Self {
        self.open_orders = accounts;
        self
    }

    /// Builds the instruction.
    ///
    /// Open orders accounts are deduplicated and sorted into the order the
    /// program expects.
    ///
    /// # Errors
    ///
    /// Returns an error if the market or event queue is not set.
    pub fn build(self) -> Result<Instruction, SdkError> {
        let market = self
            .market
            .ok_or_else(|| SdkError::InvalidAddress("market not set".to_string()))?;
        let event_queue = self
            .event_queue
            .ok_or_else(|| SdkError::InvalidAddress("event queue not set".to_string()))?;
        let coin_fee = self.coin_fee.unwrap_or(event_queue);
        let pc_fee = self.pc_fee.unwrap_or(event_queue);

        let open_orders = canonicalize_open_orders(self.open_orders);

        let mut accounts: Vec<AccountMeta> = open_orders
            .iter()
            .map(|key| AccountMeta::new(*key, false))
            .collect();
        accounts.push(AccountMeta::new(market, false));
        accounts.push(AccountMeta::new(event_queue, false));
        accounts.push(AccountMeta::new(coin_fee, false));
        accounts.push(AccountMeta::new(pc_fee, false));

        let instruction_data = ConsumeEventsInstructionData {
            version: INSTRUCTION_VERSION,
            tag: CONSUME_EVENTS_TAG,
            limit: self.limit,
        };
        let data =
            borsh::to_vec(&instruction_data).map_err(|e| SdkError::Serialization(e.to_string()))?;

        Ok(Instruction {
            program_id: self.program_id,
            accounts,
            data,
        })
    }
}
