//! secp256k1 account keys and recoverable signatures.
//!
//! Signatures are 65 bytes laid out as `r (32) || s (32) || v (1)` with
//! `v ∈ {27, 28}`. Recovery also accepts the raw recovery ids `0` and `1`.
//!
//! An account address is the last 20 bytes of the Keccak-256 hash of the
//! uncompressed public key without its `0x04` tag byte.

use k256::ecdsa::{RecoveryId, Signature, VerifyingKey};
use k256::elliptic_curve::sec1::ToEncodedPoint;
use rail_types::Address;
use zeroize::Zeroizing;

use crate::keccak;
use crate::{CryptoError, Result};

/// Length of a recoverable signature in bytes.
pub const SIGNATURE_LENGTH: usize = 65;

/// Offset added to the recovery id in the trailing `v` byte.
const RECOVERY_OFFSET: u8 = 27;

/// A secp256k1 account key.
#[derive(Clone)]
pub struct SigningKey {
    inner: k256::ecdsa::SigningKey,
}

impl SigningKey {
    /// Generate a new random account key.
    pub fn generate() -> Self {
        let mut rng = rand::rngs::OsRng;
        Self {
            inner: k256::ecdsa::SigningKey::random(&mut rng),
        }
    }

    /// Create an account key from a 32-byte big-endian scalar.
    ///
    /// # Errors
    ///
    /// - [`CryptoError::InvalidKey`] if the scalar is zero or not below the
    ///   curve order
    pub fn from_bytes(bytes: &[u8; 32]) -> Result<Self> {
        let inner = k256::ecdsa::SigningKey::from_slice(bytes)
            .map_err(|e| CryptoError::InvalidKey(e.to_string()))?;
        Ok(Self { inner })
    }

    /// Raw secret scalar. Wiped when the returned buffer is dropped.
    pub fn to_bytes(&self) -> Zeroizing<[u8; 32]> {
        let mut out = Zeroizing::new([0u8; 32]);
        out.copy_from_slice(&self.inner.to_bytes());
        out
    }

    /// The account address controlled by this key.
    pub fn address(&self) -> Address {
        public_key_to_address(self.inner.verifying_key())
    }

    /// Sign a personal message (the message is prefixed and hashed first).
    pub fn sign_message(&self, message: &[u8]) -> Result<[u8; SIGNATURE_LENGTH]> {
        self.sign_prehash(&keccak::personal_message_hash(message))
    }

    /// Sign a 32-byte digest directly.
    pub fn sign_prehash(&self, digest: &[u8; 32]) -> Result<[u8; SIGNATURE_LENGTH]> {
        let (signature, recovery_id) = self
            .inner
            .sign_prehash_recoverable(digest)
            .map_err(|e| CryptoError::Signing(e.to_string()))?;

        let mut out = [0u8; SIGNATURE_LENGTH];
        out[..64].copy_from_slice(&signature.to_bytes());
        out[64] = recovery_id.to_byte() + RECOVERY_OFFSET;
        Ok(out)
    }
}

impl std::fmt::Debug for SigningKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SigningKey")
            .field("address", &self.address())
            .finish_non_exhaustive()
    }
}

/// Address of a public key.
pub fn public_key_to_address(key: &VerifyingKey) -> Address {
    let encoded = key.as_affine().to_encoded_point(false);
    let digest = keccak::hash(&encoded.as_bytes()[1..]);
    let mut out = [0u8; 20];
    out.copy_from_slice(&digest[12..]);
    Address(out)
}

/// Recover the address that signed the personal message `message`.
///
/// # Errors
///
/// - [`CryptoError::InvalidSignatureLength`] if `signature` is not 65 bytes
/// - [`CryptoError::InvalidSignatureVersion`] if `v` is not 27, 28, 0 or 1
/// - [`CryptoError::SignatureRecovery`] if no key can be recovered
pub fn recover_message_signer(message: &[u8], signature: &[u8]) -> Result<Address> {
    recover_prehash_signer(&keccak::personal_message_hash(message), signature)
}

/// Recover the address that signed a 32-byte digest.
pub fn recover_prehash_signer(digest: &[u8; 32], signature: &[u8]) -> Result<Address> {
    if signature.len() != SIGNATURE_LENGTH {
        return Err(CryptoError::InvalidSignatureLength {
            expected: SIGNATURE_LENGTH,
            actual: signature.len(),
        });
    }

    let v = signature[64];
    let recovery_byte = match v {
        0 | 1 => v,
        27 | 28 => v - RECOVERY_OFFSET,
        other => return Err(CryptoError::InvalidSignatureVersion(other)),
    };
    let recovery_id =
        RecoveryId::from_byte(recovery_byte).ok_or(CryptoError::InvalidSignatureVersion(v))?;
    let sig = Signature::from_slice(&signature[..64]).map_err(|_| CryptoError::SignatureRecovery)?;

    let key = VerifyingKey::recover_from_prehash(digest, &sig, recovery_id)
        .map_err(|_| CryptoError::SignatureRecovery)?;
    Ok(public_key_to_address(&key))
}
