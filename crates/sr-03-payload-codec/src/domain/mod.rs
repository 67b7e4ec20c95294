//! Domain model for encrypted payloads.

pub mod errors;
pub mod payload;

pub use errors::{CodecError, DecodeError, EncodeError};
pub use payload::EncodedPayload;
