//! Store error types.

use shared_types::TxHash;
use thiserror::Error;

use crate::ports::KvStoreError;

/// Transaction store errors.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("no record for hash {0}")]
    NotFound(TxHash),

    /// A put for an existing hash carried different bytes. Impossible when
    /// the hash is honestly derived from the ciphertext; treated as
    /// corruption and surfaced rather than overwritten.
    #[error("content mismatch for hash {0}")]
    ContentMismatch(TxHash),

    #[error("record for {0} failed to deserialize: {1}")]
    Corrupt(TxHash, String),

    #[error("resend cursor failed to deserialize: {0}")]
    CorruptCursor(String),

    #[error("storage backend error: {0}")]
    Backend(#[from] KvStoreError),
}
