//! Signed withdrawal payloads.
//!
//! A member authorizes a relayer by signing, as an Ethereum personal message,
//! the packed payload
//!
//! ```text
//! recipient (20) || amount (32, big-endian) || vault identifier (20) || withdrawn (32, big-endian)
//! ```
//!
//! `amount == 0` authorizes the whole withdrawable balance. `withdrawn` is the
//! member's lifetime withdrawn counter at signing time; any withdrawal or
//! in-vault transfer advances it, so each signature is usable at most once.

use rail_crypto::secp256k1::{self, SigningKey};
use rail_crypto::CryptoError;
use rail_types::{Address, Amount};

use crate::vault::Vault;
use crate::{Result, VaultError};

/// Length of the packed withdrawal payload.
pub const PAYLOAD_LENGTH: usize = 104;

/// Build the packed payload a member signs.
pub fn withdraw_payload(
    recipient: Address,
    amount: Amount,
    vault: Address,
    withdrawn: Amount,
) -> Vec<u8> {
    let mut payload = Vec::with_capacity(PAYLOAD_LENGTH);
    let mut word = [0u8; 32];

    payload.extend_from_slice(recipient.as_bytes());
    amount.to_big_endian(&mut word);
    payload.extend_from_slice(&word);
    payload.extend_from_slice(vault.as_bytes());
    withdrawn.to_big_endian(&mut word);
    payload.extend_from_slice(&word);
    payload
}

/// Sign a withdrawal payload with a member key.
pub fn sign_withdrawal(
    key: &SigningKey,
    recipient: Address,
    amount: Amount,
    vault: Address,
    withdrawn: Amount,
) -> rail_crypto::Result<[u8; secp256k1::SIGNATURE_LENGTH]> {
    key.sign_message(&withdraw_payload(recipient, amount, vault, withdrawn))
}

impl Vault {
    /// The payload `member` must sign to authorize withdrawing `amount` to
    /// `recipient` right now.
    pub fn withdraw_signature_payload(
        &self,
        member: Address,
        recipient: Address,
        amount: Amount,
    ) -> Vec<u8> {
        withdraw_payload(
            recipient,
            amount,
            self.identifier(),
            self.member_record(member).withdrawn,
        )
    }

    /// Check a withdrawal signature.
    ///
    /// Returns `Ok(false)` for a well-formed signature by someone other than
    /// `member`, or one over a stale payload.
    ///
    /// # Errors
    ///
    /// - [`VaultError::BadSignatureLength`] if the signature is not 65 bytes
    /// - [`VaultError::BadSignatureVersion`] if `v` is not 27 or 28
    pub fn signature_is_valid(
        &self,
        member: Address,
        recipient: Address,
        amount: Amount,
        signature: &[u8],
    ) -> Result<bool> {
        let payload = self.withdraw_signature_payload(member, recipient, amount);
        match secp256k1::recover_message_signer(&payload, signature) {
            Ok(signer) => Ok(signer == member),
            Err(CryptoError::InvalidSignatureLength { actual, .. }) => {
                Err(VaultError::BadSignatureLength(actual))
            }
            Err(CryptoError::InvalidSignatureVersion(v)) => Err(VaultError::BadSignatureVersion(v)),
            Err(e) => {
                tracing::debug!(member = %member, error = %e, "vault: signature recovery failed");
                Ok(false)
            }
        }
    }
}
