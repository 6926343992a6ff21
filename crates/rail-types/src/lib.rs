//! # rail-types
//!
//! Shared domain types used across the Rail workspace.
//!
//! ## Modules
//!
//! - [`address`] — 20-byte account addresses
//! - [`fixed`] — 18-decimal fixed-point arithmetic and fee fractions
//! - [`member`] — Member status, leave reasons, member and vault statistics
//! - [`events`] — Events emitted by the ledger for external indexers

pub mod address;
pub mod events;
pub mod fixed;
pub mod member;

pub use address::Address;
pub use fixed::{FixedPointError, Fraction};
pub use primitive_types::U256;

/// Token amounts in the smallest token unit ("wei", 18 decimals).
pub type Amount = U256;

/// Smallest token units per whole token.
pub const WEI_PER_TOKEN: u64 = 1_000_000_000_000_000_000;

/// Convert a whole-token count into wei.
pub fn tokens(whole: u64) -> Amount {
    U256::from(whole) * U256::from(WEI_PER_TOKEN)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tokens_scale() {
        assert_eq!(tokens(0), U256::zero());
        assert_eq!(tokens(3), U256::from(3_000_000_000_000_000_000u128));
    }
}
