//! Keccak-256 hashing.
//!
//! ## Personal messages
//!
//! Signed withdrawal payloads are hashed the way wallets hash `personal_sign`
//! messages:
//!
//! ```text
//! keccak256("\x19Ethereum Signed Message:\n" ++ decimal(len(message)) ++ message)
//! ```

use sha3::{Digest, Keccak256};

/// Prefix prepended to personal messages before hashing.
pub const PERSONAL_MESSAGE_PREFIX: &[u8] = b"\x19Ethereum Signed Message:\n";

/// Keccak-256 of `data`.
pub fn hash(data: &[u8]) -> [u8; 32] {
    hash_many(&[data])
}

/// Keccak-256 of the concatenation of `parts`.
pub fn hash_many(parts: &[&[u8]]) -> [u8; 32] {
    let mut hasher = Keccak256::new();
    for part in parts {
        hasher.update(part);
    }
    let digest = hasher.finalize();
    let mut out = [0u8; 32];
    out.copy_from_slice(&digest);
    out
}

/// Digest of a personal message, the value actually signed by wallets.
pub fn personal_message_hash(message: &[u8]) -> [u8; 32] {
    let len = message.len().to_string();
    hash_many(&[PERSONAL_MESSAGE_PREFIX, len.as_bytes(), message])
}

#[cfg(test)]
mod tests {
    use super::*;
    use hex_literal::hex;

    #[test]
    fn test_empty_hash() {
        assert_eq!(
            hash(b""),
            hex!("c5d2460186f7233c927e7db2dcc703c0e500b653ca82273b7bfad8045d85a470")
        );
    }

    #[test]
    fn test_hash_many_matches_concatenation() {
        assert_eq!(hash_many(&[b"rail", b"vault"]), hash(b"railvault"));
    }

    #[test]
    fn test_personal_message_hash_includes_length() {
        let message = [0xabu8; 104];
        let mut prefixed = PERSONAL_MESSAGE_PREFIX.to_vec();
        prefixed.extend_from_slice(b"104");
        prefixed.extend_from_slice(&message);
        assert_eq!(personal_message_hash(&message), hash(&prefixed));
        assert_ne!(personal_message_hash(&message), hash(&message));
    }
}
