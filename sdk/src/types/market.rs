//! Market account layout.
//!
//! Fixed-offset view over a DEX v3 market account. Numeric fields are kept
//! as little-endian byte arrays so the struct has no padding and can be read
//! from any offset.

use bytemuck::{Pod, Zeroable};
use solana_sdk::pubkey::Pubkey;

use super::account_flags::AccountFlags;
use crate::error::SdkError;

/// Size of a market account in bytes.
pub const MARKET_STATE_LEN: usize = 388;

/// On-chain market state.
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct MarketState {
    head_padding: [u8; 5],
    account_flags: [u8; 8],
    own_address: [u8; 32],
    vault_signer_nonce: [u8; 8],
    base_mint: [u8; 32],
    quote_mint: [u8; 32],
    base_vault: [u8; 32],
    base_deposits_total: [u8; 8],
    base_fees_accrued: [u8; 8],
    quote_vault: [u8; 32],
    quote_deposits_total: [u8; 8],
    quote_fees_accrued: [u8; 8],
    quote_dust_threshold: [u8; 8],
    request_queue: [u8; 32],
    event_queue: [u8; 32],
    bids: [u8; 32],
    asks: [u8; 32],
    base_lot_size: [u8; 8],
    quote_lot_size: [u8; 8],
    fee_rate_bps: [u8; 8],
    referrer_rebates_accrued: [u8; 8],
    tail_padding: [u8; 7],
}

const _: () = assert!(std::mem::size_of::<MarketState>() == MARKET_STATE_LEN);
const _: () = assert!(std::mem::offset_of!(MarketState, event_queue) == 253);

impl MarketState {
    /// Decodes a market account.
    ///
    /// # Errors
    ///
    /// Returns an error if the buffer is not exactly [`MARKET_STATE_LEN`] bytes.
    pub fn decode(data: &[u8]) -> Result<Self, SdkError> {
        bytemuck::try_pod_read_unaligned(data).map_err(|_| SdkError::InvalidLayout {
            account: "market",
            expected: MARKET_STATE_LEN,
            actual: data.len(),
        })
    }

    /// Decodes a market account and checks that it describes the market at `address`.
    ///
    /// # Errors
    ///
    /// Returns an error if the layout, flags or self-address do not match.
    pub fn decode_checked(data: &[u8], address: &Pubkey) -> Result<Self, SdkError> {
        let state = Self::decode(data)?;
        let flags = state.account_flags();
        if !flags.is_market() {
            return Err(SdkError::InvalidAccountFlags {
                account: "market",
                flags: flags.bits(),
            });
        }
        if state.own_address() != *address {
            return Err(SdkError::InvalidAddress(format!(
                "market {} reports own address {}",
                address,
                state.own_address()
            )));
        }
        Ok(state)
    }

    /// Returns the account flags.
    #[must_use]
    pub fn account_flags(&self) -> AccountFlags {
        AccountFlags::new(u64::from_le_bytes(self.account_flags))
    }

    /// Returns the address the market was created at.
    #[must_use]
    pub fn own_address(&self) -> Pubkey {
        Pubkey::new_from_array(self.own_address)
    }

    /// Returns the vault signer nonce.
    #[must_use]
    pub fn vault_signer_nonce(&self) -> u64 {
        u64::from_le_bytes(self.vault_signer_nonce)
    }

    /// Returns the base token mint.
    #[must_use]
    pub fn base_mint(&self) -> Pubkey {
        Pubkey::new_from_array(self.base_mint)
    }

    /// Returns the quote token mint.
    #[must_use]
    pub fn quote_mint(&self) -> Pubkey {
        Pubkey::new_from_array(self.quote_mint)
    }

    /// Returns the request queue address.
    #[must_use]
    pub fn request_queue(&self) -> Pubkey {
        Pubkey::new_from_array(self.request_queue)
    }

    /// Returns the event queue address.
    #[must_use]
    pub fn event_queue(&self) -> Pubkey {
        Pubkey::new_from_array(self.event_queue)
    }

    /// Returns the bids address.
    #[must_use]
    pub fn bids(&self) -> Pubkey {
        Pubkey::new_from_array(self.bids)
    }

    /// Returns the asks address.
    #[must_use]
    pub fn asks(&self) -> Pubkey {
        Pubkey::new_from_array(self.asks)
    }

    /// Returns the base lot size.
    #[must_use]
    pub fn base_lot_size(&self) -> u64 {
        u64::from_le_bytes(self.base_lot_size)
    }

    /// Returns the quote lot size.
    #[must_use]
    pub fn quote_lot_size(&self) -> u64 {
        u64::from_le_bytes(self.quote_lot_size)
    }

    /// Returns the fee rate in basis points.
    #[must_use]
    pub fn fee_rate_bps(&self) -> u64 {
        u64::from_le_bytes(self.fee_rate_bps)
    }
}

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils {
    //! Raw account builders for tests.

    use super::*;

    /// Builds raw market account bytes for tests.
    #[must_use]
    pub fn market_bytes(
        address: &Pubkey,
        base_mint: &Pubkey,
        quote_mint: &Pubkey,
        event_queue: &Pubkey,
    ) -> Vec<u8> {
        let mut state = MarketState::zeroed();
        state.head_padding = *b"serum";
        state.tail_padding = *b"padding";
        state.account_flags =
            (AccountFlags::INITIALIZED | AccountFlags::MARKET).to_le_bytes();
        state.own_address = address.to_bytes();
        state.base_mint = base_mint.to_bytes();
        state.quote_mint = quote_mint.to_bytes();
        state.event_queue = event_queue.to_bytes();
        state.base_lot_size = 100_000u64.to_le_bytes();
        state.quote_lot_size = 100u64.to_le_bytes();
        bytemuck::bytes_of(&state).to_vec()
    }
}

#[cfg(test)]
mod tests {
    use super::test_utils::market_bytes;
    use super::*;

    #[test]
    fn test_market_decode() {
        let address = Pubkey::new_unique();
        let base = Pubkey::new_unique();
        let quote = Pubkey::new_unique();
        let queue = Pubkey::new_unique();

        let data = market_bytes(&address, &base, &quote, &queue);
        assert_eq!(data.len(), MARKET_STATE_LEN);

        let state = MarketState::decode_checked(&data, &address).expect("decode");
        assert_eq!(state.own_address(), address);
        assert_eq!(state.base_mint(), base);
        assert_eq!(state.quote_mint(), quote);
        assert_eq!(state.event_queue(), queue);
        assert_eq!(state.base_lot_size(), 100_000);
        assert_eq!(state.quote_lot_size(), 100);
        assert!(state.account_flags().is_market());
    }

    #[test]
    fn test_market_decode_wrong_length() {
        let result = MarketState::decode(&[0u8; 100]);
        assert_eq!(
            result.err(),
            Some(SdkError::InvalidLayout {
                account: "market",
                expected: MARKET_STATE_LEN,
                actual: 100,
            })
        );
    }

    #[test]
    fn test_market_decode_wrong_flags() {
        let address = Pubkey::new_unique();
        let mut data = market_bytes(
            &address,
            &Pubkey::new_unique(),
            &Pubkey::new_unique(),
            &Pubkey::new_unique(),
        );
        // Clear the market bit.
        data[5] = 0x01;

        let result = MarketState::decode_checked(&data, &address);
        assert!(matches!(
            result,
            Err(SdkError::InvalidAccountFlags { account: "market", .. })
        ));
    }

    #[test]
    fn test_market_decode_wrong_address() {
        let data = market_bytes(
            &Pubkey::new_unique(),
            &Pubkey::new_unique(),
            &Pubkey::new_unique(),
            &Pubkey::new_unique(),
        );

        let result = MarketState::decode_checked(&data, &Pubkey::new_unique());
        assert!(matches!(result, Err(SdkError::InvalidAddress(_))));
    }
}
