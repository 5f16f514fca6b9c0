//! SPL token mint layout.
//!
//! Only the decimals are needed by the crank, but the whole account is
//! mapped so a length mismatch is caught.

use bytemuck::{Pod, Zeroable};

use crate::error::SdkError;

/// Size of a mint account in bytes.
pub const MINT_LEN: usize = 82;

/// On-chain mint state.
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct Mint {
    mint_authority_option: [u8; 4],
    mint_authority: [u8; 32],
    supply: [u8; 8],
    decimals: u8,
    is_initialized: u8,
    freeze_authority_option: [u8; 4],
    freeze_authority: [u8; 32],
}

const _: () = assert!(std::mem::size_of::<Mint>() == MINT_LEN);
const _: () = assert!(std::mem::offset_of!(Mint, decimals) == 44);

impl Mint {
    /// Decodes a mint account.
    ///
    /// # Errors
    ///
    /// Returns an error if the buffer is not exactly [`MINT_LEN`] bytes.
    pub fn decode(data: &[u8]) -> Result<Self, SdkError> {
        bytemuck::try_pod_read_unaligned(data).map_err(|_| SdkError::InvalidLayout {
            account: "mint",
            expected: MINT_LEN,
            actual: data.len(),
        })
    }

    /// Returns the number of decimals.
    #[must_use]
    pub const fn decimals(&self) -> u8 {
        self.decimals
    }
}

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils {
    //! Raw account builders for tests.

    use super::*;

    /// Builds raw mint account bytes for tests.
    #[must_use]
    pub fn mint_bytes(decimals: u8) -> Vec<u8> {
        let mut mint = Mint::zeroed();
        mint.decimals = decimals;
        mint.is_initialized = 1;
        mint.supply = 1_000_000u64.to_le_bytes();
        bytemuck::bytes_of(&mint).to_vec()
    }
}

#[cfg(test)]
mod tests {
    use super::test_utils::mint_bytes;
    use super::*;

    #[test]
    fn test_mint_decode() {
        let mint = Mint::decode(&mint_bytes(6)).expect("decode");
        assert_eq!(mint.decimals(), 6);
    }

    #[test]
    fn test_mint_decimals_offset() {
        let mut data = vec![0u8; MINT_LEN];
        data[44] = 9;
        let mint = Mint::decode(&data).expect("decode");
        assert_eq!(mint.decimals(), 9);
    }

    #[test]
    fn test_mint_decode_wrong_length() {
        // Token account sized buffer.
        let result = Mint::decode(&[0u8; 165]);
        assert!(matches!(
            result,
            Err(SdkError::InvalidLayout {
                account: "mint",
                expected: MINT_LEN,
                actual: 165,
            })
        ));
    }
}
