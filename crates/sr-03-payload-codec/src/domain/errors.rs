//! Error types for encoding, decoding, and wire parsing.

use shared_types::PublicKey;
use thiserror::Error;

use crate::ports::EnclaveError;

/// Wire-format parse/serialize errors.
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("unsupported codec version: {0}")]
    UnsupportedVersion(u8),

    #[error("payload truncated while reading {context}")]
    Truncated { context: &'static str },

    #[error("{0} trailing bytes after payload")]
    TrailingBytes(usize),

    #[error("field {context} too large: {len} bytes")]
    OversizedField { context: &'static str, len: usize },

    #[error("unknown privacy mode code: {0}")]
    UnknownPrivacyMode(u8),

    #[error("recipient key/box count mismatch: {keys} keys, {boxes} boxes")]
    RecipientCountMismatch { keys: usize, boxes: usize },
}

/// Errors building an encrypted payload from a submission.
#[derive(Debug, Error)]
pub enum EncodeError {
    #[error("sender {0} is not one of this node's keys")]
    InvalidSender(PublicKey),

    #[error("transaction payload is empty")]
    EmptyPayload,

    #[error("recipient set is empty and no default broadcast set applies")]
    EmptyRecipientSet,

    #[error("enhanced privacy is disabled on this node")]
    EnhancedPrivacyDisabled,

    #[error("mandatory recipient {0} is not in the recipient set")]
    MandatoryRecipientOutsideSet(PublicKey),

    #[error(transparent)]
    Enclave(#[from] EnclaveError),
}

/// Errors recovering plaintext from a stored payload.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("payload carries no recipient box addressed to this node")]
    NotAddressedToThisNode,

    #[error("payload has no recipient boxes")]
    NoRecipientBoxes,

    #[error("payload carries recipient boxes without keys; recipient must be known")]
    MissingRecipientKeys,

    #[error(transparent)]
    Enclave(#[from] EnclaveError),
}
