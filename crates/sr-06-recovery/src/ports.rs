//! Outbound ports for recovery.

use async_trait::async_trait;
use shared_types::{PublicKey, TxHash};
use thiserror::Error;

/// Recovery-protocol transport errors.
#[derive(Debug, Error)]
pub enum RecoveryTransportError {
    #[error("peer {uri} did not answer in time")]
    Timeout { uri: String },

    #[error("peer {uri} unreachable: {reason}")]
    Unreachable { uri: String, reason: String },

    #[error("protocol error from {uri}: {reason}")]
    Protocol { uri: String, reason: String },
}

/// One page of transaction hashes a peer knows.
#[derive(Clone, Debug, Default)]
pub struct HashPage {
    pub hashes: Vec<TxHash>,
    pub has_more: bool,
}

/// Recovery-protocol exchange with one peer endpoint.
///
/// Hash pages keep the requesting stage cheap: ciphertext only moves for
/// hashes this node is actually missing.
#[async_trait]
pub trait RecoveryTransport: Send + Sync {
    /// Page `page` of the peer's known hashes, at most `page_size` long.
    async fn fetch_hash_page(
        &self,
        uri: &str,
        page: u64,
        page_size: usize,
    ) -> Result<HashPage, RecoveryTransportError>;

    /// Full payload frames for `hashes`. The peer must keep the response
    /// under `max_bytes`; hashes that would not fit are simply omitted
    /// and picked up when re-requested.
    async fn fetch_payloads(
        &self,
        uri: &str,
        hashes: &[TxHash],
        max_bytes: usize,
    ) -> Result<Vec<Vec<u8>>, RecoveryTransportError>;

    /// Legacy push of one frame to the peer. The remote no-ops when it
    /// already holds the content.
    async fn push_payload(&self, uri: &str, frame: &[u8])
        -> Result<(), RecoveryTransportError>;
}

/// Endpoint lookup for the legacy resend path.
pub trait RecipientResolver: Send + Sync {
    fn resolve(&self, key: &PublicKey) -> Option<String>;
}
