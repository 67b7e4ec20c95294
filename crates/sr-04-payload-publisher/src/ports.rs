//! Outbound ports for the publisher.

use async_trait::async_trait;
use shared_types::PublicKey;
use thiserror::Error;

/// Transport-level delivery errors, split by whether another attempt can
/// help.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("push to {uri} timed out")]
    Timeout { uri: String },

    #[error("peer {uri} unreachable: {reason}")]
    Unreachable { uri: String, reason: String },

    /// The peer answered and said no (authentication, authorization, or it
    /// does not trust the sender key). Retrying cannot change the answer.
    #[error("peer {uri} rejected the payload: {reason}")]
    Rejected { uri: String, reason: String },

    /// Malformed response or protocol violation.
    #[error("protocol error from {uri}: {reason}")]
    Protocol { uri: String, reason: String },
}

impl TransportError {
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            TransportError::Timeout { .. } | TransportError::Unreachable { .. }
        )
    }
}

/// Sends one encoded payload frame to one peer endpoint.
#[async_trait]
pub trait PayloadTransport: Send + Sync {
    async fn push_payload(&self, uri: &str, frame: &[u8]) -> Result<(), TransportError>;
}

/// The slice of the peer directory the publisher needs.
///
/// Implemented in the runtime by wrapping the directory service; the
/// publisher never mutates the peer table directly, it reports outcomes
/// through these calls.
#[async_trait]
pub trait EndpointDirectory: Send + Sync {
    fn resolve(&self, key: &PublicKey) -> Option<String>;

    /// On-demand refresh used when a recipient does not resolve.
    async fn refresh(&self);

    fn mark_unreachable(&self, key: &PublicKey);

    fn mark_active(&self, key: &PublicKey);
}
