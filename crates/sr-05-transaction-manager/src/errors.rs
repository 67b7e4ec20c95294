//! Transaction manager errors.

use shared_types::{PublicKey, TxHash};
use sr_02_payload_store::StoreError;
use sr_03_payload_codec::{CodecError, DecodeError, EncodeError};
use thiserror::Error;

/// Errors surfaced to the API layer.
#[derive(Debug, Error)]
pub enum TransactionManagerError {
    #[error("transaction {0} not found")]
    NotFound(TxHash),

    /// The transaction is stored locally (unconfirmed) but one or more
    /// mandatory recipients could not be served.
    #[error("stored {hash} but mandatory delivery failed for {} recipient(s)", failed.len())]
    MandatoryDeliveryFailed {
        hash: TxHash,
        failed: Vec<PublicKey>,
    },

    #[error(transparent)]
    Encode(#[from] EncodeError),

    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error(transparent)]
    Codec(#[from] CodecError),

    #[error(transparent)]
    Store(#[from] StoreError),
}
