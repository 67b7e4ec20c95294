//! # Shared Types Crate
//!
//! Cross-subsystem value types for the Shroud-Relay node.
//!
//! ## Design Principles
//!
//! - **Single Source of Truth**: every identifier that crosses a crate
//!   boundary (participant keys, content addresses, privacy modes) is
//!   defined here.
//! - **Immutable values**: all types are plain value types; nothing in this
//!   crate holds mutable state or performs I/O.
//! - **Stable text form**: keys and hashes serialize as lowercase hex so
//!   config files, logs, and JSON surfaces agree on one representation.

pub mod hash;
pub mod keys;
pub mod privacy;

pub use hash::{TxHash, TX_HASH_LEN};
pub use keys::{KeyParseError, PublicKey, RecipientBox, PUBLIC_KEY_LEN};
pub use privacy::PrivacyMode;
