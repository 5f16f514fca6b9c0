//! Event queue layout and decoding.
//!
//! The event queue is a ring buffer: a fixed header followed by as many
//! fixed-size event slots as fit in the account. The header records where
//! the oldest unconsumed event lives (`head`) and how many are pending
//! (`count`).

use bytemuck::{Pod, Zeroable};
use solana_sdk::pubkey::Pubkey;

use super::account_flags::AccountFlags;
use crate::error::SdkError;

/// Size of the event queue header in bytes.
pub const EVENT_QUEUE_HEADER_LEN: usize = 37;

/// Size of a single event in bytes.
pub const EVENT_LEN: usize = 88;

/// Event flag: the event is a fill.
pub const EVENT_FLAG_FILL: u8 = 1 << 0;
/// Event flag: the event is an out (order removed from the book).
pub const EVENT_FLAG_OUT: u8 = 1 << 1;
/// Event flag: the order was a bid.
pub const EVENT_FLAG_BID: u8 = 1 << 2;
/// Event flag: the order was the maker side.
pub const EVENT_FLAG_MAKER: u8 = 1 << 3;

/// On-chain event queue header.
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct EventQueueHeader {
    head_padding: [u8; 5],
    account_flags: [u8; 8],
    head: [u8; 4],
    head_hi: [u8; 4],
    count: [u8; 4],
    count_hi: [u8; 4],
    seq_num: [u8; 4],
    seq_num_hi: [u8; 4],
}

const _: () = assert!(std::mem::size_of::<EventQueueHeader>() == EVENT_QUEUE_HEADER_LEN);

/// On-chain event slot.
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct RawEvent {
    event_flags: u8,
    open_orders_slot: u8,
    fee_tier: u8,
    padding: [u8; 5],
    native_qty_released: [u8; 8],
    native_qty_paid: [u8; 8],
    native_fee_or_rebate: [u8; 8],
    order_id: [u8; 16],
    open_orders: [u8; 32],
    client_order_id: [u8; 8],
}

const _: () = assert!(std::mem::size_of::<RawEvent>() == EVENT_LEN);
const _: () = assert!(std::mem::offset_of!(RawEvent, open_orders) == 48);

impl EventQueueHeader {
    /// Reads the header from the front of a queue buffer.
    ///
    /// # Errors
    ///
    /// Returns an error if the buffer is shorter than the header.
    pub fn decode(data: &[u8]) -> Result<Self, SdkError> {
        let bytes = data
            .get(..EVENT_QUEUE_HEADER_LEN)
            .ok_or(SdkError::InvalidLayout {
                account: "event queue",
                expected: EVENT_QUEUE_HEADER_LEN,
                actual: data.len(),
            })?;
        Ok(bytemuck::pod_read_unaligned(bytes))
    }

    /// Returns the account flags.
    #[must_use]
    pub fn account_flags(&self) -> AccountFlags {
        AccountFlags::new(u64::from_le_bytes(self.account_flags))
    }

    /// Returns the ring index of the oldest pending event.
    #[must_use]
    pub fn head(&self) -> u32 {
        u32::from_le_bytes(self.head)
    }

    /// Returns the number of pending events.
    #[must_use]
    pub fn count(&self) -> u32 {
        u32::from_le_bytes(self.count)
    }

    /// Returns the sequence number of the next event to be pushed.
    #[must_use]
    pub fn seq_num(&self) -> u32 {
        u32::from_le_bytes(self.seq_num)
    }
}

/// Kind of a queued event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    /// A trade fill to be credited.
    Fill,
    /// An order left the book (cancel or fully filled).
    Out,
}

/// Side of the order an event refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    /// Buy side.
    Bid,
    /// Sell side.
    Ask,
}

/// A decoded event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    /// Fill or out.
    pub kind: EventKind,
    /// Side of the order.
    pub side: Side,
    /// True if the order was resting on the book.
    pub maker: bool,
    /// Open orders account to settle.
    pub open_orders: Pubkey,
    /// Order slot inside the open orders account.
    pub open_orders_slot: u8,
    /// Fee tier applied to the order.
    pub fee_tier: u8,
    /// Native amount released to the owner.
    pub native_qty_released: u64,
    /// Native amount paid by the owner.
    pub native_qty_paid: u64,
    /// Native fee paid, or rebate received for makers.
    pub native_fee_or_rebate: u64,
    /// Exchange-assigned order id.
    pub order_id: u128,
    /// Client-assigned order id.
    pub client_order_id: u64,
}

impl From<&RawEvent> for Event {
    fn from(raw: &RawEvent) -> Self {
        let flags = raw.event_flags;
        Self {
            kind: if flags & EVENT_FLAG_FILL != 0 {
                EventKind::Fill
            } else {
                EventKind::Out
            },
            side: if flags & EVENT_FLAG_BID != 0 {
                Side::Bid
            } else {
                Side::Ask
            },
            maker: flags & EVENT_FLAG_MAKER != 0,
            open_orders: Pubkey::new_from_array(raw.open_orders),
            open_orders_slot: raw.open_orders_slot,
            fee_tier: raw.fee_tier,
            native_qty_released: u64::from_le_bytes(raw.native_qty_released),
            native_qty_paid: u64::from_le_bytes(raw.native_qty_paid),
            native_fee_or_rebate: u64::from_le_bytes(raw.native_fee_or_rebate),
            order_id: u128::from_le_bytes(raw.order_id),
            client_order_id: u64::from_le_bytes(raw.client_order_id),
        }
    }
}

/// Returns how many event slots fit in a queue buffer of `len` bytes.
#[must_use]
pub const fn queue_capacity(len: usize) -> usize {
    len.saturating_sub(EVENT_QUEUE_HEADER_LEN) / EVENT_LEN
}

/// Decodes the pending events of a queue, oldest first.
///
/// Walks `count` slots starting at `head`, wrapping around the ring. Slots
/// past `count` hold stale data and are never read.
///
/// # Errors
///
/// Returns an error if the header is truncated, the flags do not describe an
/// event queue, or the header claims more events than the ring can hold.
pub fn decode_event_queue(data: &[u8]) -> Result<Vec<Event>, SdkError> {
    let header = EventQueueHeader::decode(data)?;

    let flags = header.account_flags();
    if !flags.is_event_queue() {
        return Err(SdkError::InvalidAccountFlags {
            account: "event queue",
            flags: flags.bits(),
        });
    }

    let count = header.count() as usize;
    if count == 0 {
        return Ok(Vec::new());
    }

    let capacity = queue_capacity(data.len());
    if count > capacity {
        return Err(SdkError::CorruptQueue(format!(
            "count {} exceeds capacity {}",
            count, capacity
        )));
    }

    let head = header.head() as usize;
    let mut events = Vec::with_capacity(count);
    for i in 0..count {
        let slot = (head + i) % capacity;
        let start = EVENT_QUEUE_HEADER_LEN + slot * EVENT_LEN;
        let bytes = data
            .get(start..start + EVENT_LEN)
            .ok_or_else(|| SdkError::CorruptQueue(format!("slot {} out of bounds", slot)))?;
        let raw: RawEvent = bytemuck::pod_read_unaligned(bytes);
        events.push(Event::from(&raw));
    }

    Ok(events)
}

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils {
    //! Raw queue builders for tests.

    use super::*;

    /// Builds a fill event for the given open orders account.
    #[must_use]
    pub fn fill_event(open_orders: &Pubkey) -> RawEvent {
        let mut raw = RawEvent::zeroed();
        raw.event_flags = EVENT_FLAG_FILL | EVENT_FLAG_BID;
        raw.open_orders = open_orders.to_bytes();
        raw.native_qty_released = 10u64.to_le_bytes();
        raw.native_qty_paid = 20u64.to_le_bytes();
        raw.order_id = 42u128.to_le_bytes();
        raw
    }

    /// Builds an out event for the given open orders account.
    #[must_use]
    pub fn out_event(open_orders: &Pubkey) -> RawEvent {
        let mut raw = RawEvent::zeroed();
        raw.event_flags = EVENT_FLAG_OUT | EVENT_FLAG_MAKER;
        raw.open_orders = open_orders.to_bytes();
        raw
    }

    /// Builds raw queue bytes with `capacity` slots holding `events`
    /// logically, starting at ring index `head`.
    #[must_use]
    pub fn queue_bytes(capacity: usize, head: usize, events: &[RawEvent]) -> Vec<u8> {
        let mut header = EventQueueHeader::zeroed();
        header.head_padding = *b"serum";
        header.account_flags =
            (AccountFlags::INITIALIZED | AccountFlags::EVENT_QUEUE).to_le_bytes();
        header.head = (head as u32).to_le_bytes();
        header.count = (events.len() as u32).to_le_bytes();
        header.seq_num = (events.len() as u32).to_le_bytes();

        let mut data = bytemuck::bytes_of(&header).to_vec();
        data.resize(EVENT_QUEUE_HEADER_LEN + capacity * EVENT_LEN, 0);
        for (i, event) in events.iter().enumerate() {
            let start = EVENT_QUEUE_HEADER_LEN + ((head + i) % capacity) * EVENT_LEN;
            data[start..start + EVENT_LEN].copy_from_slice(bytemuck::bytes_of(event));
        }
        data.extend_from_slice(b"padding");
        data
    }

    /// Builds a queue of `count` fill events, cycling through `accounts`.
    #[must_use]
    pub fn queue_with_fills(capacity: usize, count: usize, accounts: &[Pubkey]) -> Vec<u8> {
        let events: Vec<RawEvent> = (0..count)
            .map(|i| fill_event(&accounts[i % accounts.len()]))
            .collect();
        queue_bytes(capacity, 0, &events)
    }
}

#[cfg(test)]
mod tests {
    use super::test_utils::{fill_event, out_event, queue_bytes, queue_with_fills};
    use super::*;

    #[test]
    fn test_decode_empty_queue() {
        let data = queue_bytes(8, 3, &[]);
        let events = decode_event_queue(&data).expect("decode");
        assert!(events.is_empty());
    }

    #[test]
    fn test_decode_fields() {
        let owner = Pubkey::new_unique();
        let data = queue_bytes(4, 0, &[fill_event(&owner), out_event(&owner)]);

        let events = decode_event_queue(&data).expect("decode");
        assert_eq!(events.len(), 2);

        assert_eq!(events[0].kind, EventKind::Fill);
        assert_eq!(events[0].side, Side::Bid);
        assert!(!events[0].maker);
        assert_eq!(events[0].open_orders, owner);
        assert_eq!(events[0].native_qty_released, 10);
        assert_eq!(events[0].native_qty_paid, 20);
        assert_eq!(events[0].order_id, 42);

        assert_eq!(events[1].kind, EventKind::Out);
        assert_eq!(events[1].side, Side::Ask);
        assert!(events[1].maker);
    }

    #[test]
    fn test_decode_wraps_around_ring() {
        let accounts: Vec<Pubkey> = (0..3).map(|_| Pubkey::new_unique()).collect();
        let raw: Vec<RawEvent> = accounts.iter().map(fill_event).collect();
        // Head at the last slot: the second and third events wrap to slots 0 and 1.
        let data = queue_bytes(4, 3, &raw);

        let events = decode_event_queue(&data).expect("decode");
        let owners: Vec<Pubkey> = events.iter().map(|e| e.open_orders).collect();
        assert_eq!(owners, accounts);
    }

    #[test]
    fn test_decode_stops_at_count() {
        let a = Pubkey::new_unique();
        let b = Pubkey::new_unique();
        let mut data = queue_bytes(4, 0, &[fill_event(&a), fill_event(&b), fill_event(&b)]);
        // Drop the logical count to one; the remaining slots are stale.
        data[21..25].copy_from_slice(&1u32.to_le_bytes());

        let events = decode_event_queue(&data).expect("decode");
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].open_orders, a);
    }

    #[test]
    fn test_decode_is_deterministic() {
        let accounts: Vec<Pubkey> = (0..5).map(|_| Pubkey::new_unique()).collect();
        let data = queue_with_fills(16, 12, &accounts);

        let first = decode_event_queue(&data).expect("decode");
        let second = decode_event_queue(&data).expect("decode");
        assert_eq!(first, second);
    }

    #[test]
    fn test_decode_truncated_header() {
        let result = decode_event_queue(&[0u8; 10]);
        assert!(matches!(result, Err(SdkError::InvalidLayout { .. })));
    }

    #[test]
    fn test_decode_wrong_flags() {
        let mut data = queue_bytes(4, 0, &[]);
        data[5] = 0x03; // initialized market
        let result = decode_event_queue(&data);
        assert!(matches!(result, Err(SdkError::InvalidAccountFlags { .. })));
    }

    #[test]
    fn test_decode_count_exceeds_capacity() {
        let mut data = queue_bytes(2, 0, &[]);
        data[21..25].copy_from_slice(&3u32.to_le_bytes());
        let result = decode_event_queue(&data);
        assert!(matches!(result, Err(SdkError::CorruptQueue(_))));
    }

    #[test]
    fn test_queue_capacity() {
        assert_eq!(queue_capacity(EVENT_QUEUE_HEADER_LEN + 10 * EVENT_LEN + 7), 10);
        assert_eq!(queue_capacity(EVENT_QUEUE_HEADER_LEN - 1), 0);
    }

    #[test]
    fn test_header_fields() {
        let owner = Pubkey::new_unique();
        let data = queue_bytes(8, 5, &[fill_event(&owner), fill_event(&owner)]);
        let header = EventQueueHeader::decode(&data).expect("header");
        assert_eq!(header.head(), 5);
        assert_eq!(header.count(), 2);
        assert_eq!(header.seq_num(), 2);
        assert!(header.account_flags().is_event_queue());
    }
}
