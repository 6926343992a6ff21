//! # rail-crypto
//!
//! Signature primitives for delegated withdrawals.
//!
//! Members authorize withdrawals by signing a packed payload with their
//! secp256k1 account key using the Ethereum personal-message scheme. The ledger
//! recovers the signing address and compares it with the member.
//!
//! ## Modules
//!
//! - [`keccak`] — Keccak-256 and the personal-message digest
//! - [`secp256k1`] — Account keys, recoverable signatures, signer recovery

pub mod keccak;
pub mod secp256k1;

/// Error types for cryptographic operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CryptoError {
    /// Signature is not 65 bytes long.
    #[error("invalid signature length: expected {expected}, got {actual}")]
    InvalidSignatureLength { expected: usize, actual: usize },

    /// Recovery byte is not 27 or 28 (or 0 or 1).
    #[error("invalid signature version: {0}")]
    InvalidSignatureVersion(u8),

    /// No public key could be recovered from the signature.
    #[error("signature recovery failed")]
    SignatureRecovery,

    /// Signing failed.
    #[error("signing failed: {0}")]
    Signing(String),

    /// Secret key bytes are not a valid scalar.
    #[error("invalid secret key: {0}")]
    InvalidKey(String),
}

pub type Result<T> = std::result::Result<T, CryptoError>;
