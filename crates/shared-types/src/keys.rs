//! Participant identity types.
//!
//! A participant is identified by an opaque fixed-length public key. The
//! relay never interprets key bytes; equality and ordering are byte-wise.

use std::fmt;
use std::str::FromStr;

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

/// Length of a participant public key in bytes.
pub const PUBLIC_KEY_LEN: usize = 32;

/// Opaque public key identifying a network participant.
///
/// Byte-wise `Eq`/`Ord`/`Hash`; never mutated after creation. The text form
/// is lowercase hex, used in config files, logs, and JSON.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PublicKey([u8; PUBLIC_KEY_LEN]);

impl PublicKey {
    /// Creates a key from a 32-byte array.
    pub fn new(bytes: [u8; PUBLIC_KEY_LEN]) -> Self {
        Self(bytes)
    }

    /// Creates a key from a byte slice of exactly 32 bytes.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, KeyParseError> {
        let arr: [u8; PUBLIC_KEY_LEN] = bytes
            .try_into()
            .map_err(|_| KeyParseError::BadLength(bytes.len()))?;
        Ok(Self(arr))
    }

    /// Raw key bytes.
    pub fn as_bytes(&self) -> &[u8; PUBLIC_KEY_LEN] {
        &self.0
    }
}

impl fmt::Display for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Abbreviated form for logs; full form is available via Display.
        write!(f, "PublicKey({}..)", hex::encode(&self.0[..4]))
    }
}

impl FromStr for PublicKey {
    type Err = KeyParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = hex::decode(s.trim())?;
        Self::from_slice(&bytes)
    }
}

impl Serialize for PublicKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&hex::encode(self.0))
    }
}

impl<'de> Deserialize<'de> for PublicKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(D::Error::custom)
    }
}

/// Error parsing a key from text or bytes.
#[derive(Debug, Error)]
pub enum KeyParseError {
    #[error("key must be {PUBLIC_KEY_LEN} bytes, got {0}")]
    BadLength(usize),

    #[error("invalid hex: {0}")]
    InvalidHex(#[from] hex::FromHexError),
}

/// Enclave-produced wrapper carrying the shared symmetric key for one
/// recipient. The relay treats the contents as opaque bytes; only the
/// enclave can open it.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecipientBox(Vec<u8>);

impl RecipientBox {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for RecipientBox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RecipientBox({} bytes)", self.0.len())
    }
}

impl From<Vec<u8>> for RecipientBox {
    fn from(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }
}
