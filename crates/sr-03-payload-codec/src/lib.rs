//! # Payload Codec Subsystem (sr-03)
//!
//! The distributable unit of the relay network is the [`EncodedPayload`]:
//! ciphertext plus the per-recipient key boxes and privacy metadata needed
//! to deliver and later decrypt it. This crate owns:
//!
//! - the payload model and its content address derivation,
//! - the versioned binary wire format ([`codec`]),
//! - the [`EncodedPayloadManager`], which turns a plaintext submission into
//!   a payload by delegating encryption to the enclave capability.
//!
//! ## Architecture Role
//!
//! ```text
//! [Transaction Manager (5)] ──encode──→ [Payload Codec (3)] ──seal──→ [Enclave]
//!                                              │
//!                                              ↓ wire bytes
//!                                      [Publisher (4)] / [Recovery (6)]
//! ```
//!
//! Encryption itself is never performed here; the enclave is consumed as an
//! opaque capability through the [`EnclaveGateway`] port.

pub mod codec;
pub mod domain;
pub mod manager;
pub mod ports;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use codec::{codec_for, decode_any, CodecVersion, LegacyCodec, PayloadCodec, StandardCodec};
pub use domain::errors::{CodecError, DecodeError, EncodeError};
pub use domain::payload::EncodedPayload;
pub use manager::{EncodePayloadRequest, EncodedPayloadManager};
pub use ports::{EnclaveError, EnclaveGateway, SealedParts};
