//! # rail-oracle
//!
//! Protocol fee source for the vault ledger.
//!
//! The protocol operator publishes a fee fraction and a beneficiary address.
//! Vaults query it on every revenue distribution and fall back to the last
//! quote they saw when the source is unavailable.
//!
//! ## Modules
//!
//! - [`fee`] — Fee oracle trait and the default settable implementation
//! - [`cache`] — Last-known quote cache with fallback

pub mod cache;
pub mod fee;

pub use cache::{FeeCache, ResolvedQuote};
pub use fee::{DefaultFeeOracle, FeeOracle, FeeQuote};

/// Error types for fee oracle operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum OracleError {
    /// The oracle is paused and serves no quotes.
    #[error("fee oracle is paused")]
    Paused,

    /// The oracle could not produce a quote.
    #[error("fee oracle unavailable: {0}")]
    Unavailable(String),
}

/// Convenience result type for oracle operations.
pub type Result<T> = std::result::Result<T, OracleError>;
