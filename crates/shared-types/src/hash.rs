//! Content addressing.
//!
//! Every stored transaction is keyed by the digest of its ciphertext. Two
//! submissions producing identical ciphertext collapse to one record, which
//! is what makes re-delivery and recovery replay safe.

use std::fmt;
use std::str::FromStr;

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha3::{Digest, Sha3_512};

use crate::keys::KeyParseError;

/// Length of a transaction content address in bytes (SHA3-512).
pub const TX_HASH_LEN: usize = 64;

/// Content address of an encrypted transaction.
///
/// Derived exclusively from the ciphertext via [`TxHash::of_ciphertext`];
/// nothing else in the payload (nonce, recipient boxes, privacy metadata)
/// participates in the digest.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TxHash([u8; TX_HASH_LEN]);

impl TxHash {
    /// Wraps an existing 64-byte digest.
    pub fn new(bytes: [u8; TX_HASH_LEN]) -> Self {
        Self(bytes)
    }

    /// Computes the content address of a ciphertext.
    pub fn of_ciphertext(cipher_text: &[u8]) -> Self {
        let digest = Sha3_512::digest(cipher_text);
        let mut bytes = [0u8; TX_HASH_LEN];
        bytes.copy_from_slice(&digest);
        Self(bytes)
    }

    /// Creates a hash from a byte slice of exactly 64 bytes.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, KeyParseError> {
        let arr: [u8; TX_HASH_LEN] = bytes
            .try_into()
            .map_err(|_| KeyParseError::BadLength(bytes.len()))?;
        Ok(Self(arr))
    }

    /// Raw digest bytes.
    pub fn as_bytes(&self) -> &[u8; TX_HASH_LEN] {
        &self.0
    }
}

impl fmt::Display for TxHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

impl fmt::Debug for TxHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TxHash({}..)", hex::encode(&self.0[..6]))
    }
}

impl FromStr for TxHash {
    type Err = KeyParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = hex::decode(s.trim())?;
        Self::from_slice(&bytes)
    }
}

impl Serialize for TxHash {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&hex::encode(self.0))
    }
}

impl<'de> Deserialize<'de> for TxHash {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(D::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_ciphertext_same_address() {
        let a = TxHash::of_ciphertext(b"cipher bytes");
        let b = TxHash::of_ciphertext(b"cipher bytes");
        assert_eq!(a, b);
    }

    #[test]
    fn different_ciphertext_different_address() {
        let a = TxHash::of_ciphertext(b"cipher bytes");
        let b = TxHash::of_ciphertext(b"other bytes");
        assert_ne!(a, b);
    }

    #[test]
    fn hash_round_trips_through_hex() {
        let hash = TxHash::of_ciphertext(b"x");
        let text = hash.to_string();
        assert_eq!(text.len(), 128);
        assert_eq!(text.parse::<TxHash>().unwrap(), hash);
    }
}
