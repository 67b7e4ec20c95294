//! Peer directory errors.

use thiserror::Error;

/// Errors talking to a peer's party-info endpoint.
#[derive(Debug, Error)]
pub enum DirectoryError {
    #[error("peer {uri} did not answer within {timeout_ms}ms")]
    Timeout { uri: String, timeout_ms: u64 },

    #[error("transport error contacting {uri}: {reason}")]
    Transport { uri: String, reason: String },

    #[error("malformed party info from {uri}: {reason}")]
    Protocol { uri: String, reason: String },
}
