//! Outbound ports for the peer directory.

use async_trait::async_trait;
use shared_types::PublicKey;

use crate::domain::errors::DirectoryError;

/// One key→endpoint binding learned from a peer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PeerEntry {
    pub key: PublicKey,
    pub uri: String,
}

/// A peer's answer to a party-info exchange: its own binding plus the
/// peers it knows about.
#[derive(Clone, Debug, Default)]
pub struct PartyInfoResponse {
    /// The answering node's own key→URI binding, when it discloses one.
    pub sender: Option<PeerEntry>,
    /// Other peers the answering node knows.
    pub known: Vec<PeerEntry>,
}

/// Transport for the party-info exchange.
#[async_trait]
pub trait PartyInfoClient: Send + Sync {
    async fn party_info(&self, uri: &str) -> Result<PartyInfoResponse, DirectoryError>;
}

/// Clock abstraction so liveness timestamps are testable.
pub trait TimeSource: Send + Sync {
    /// Seconds since the Unix epoch.
    fn now(&self) -> u64;
}

/// Wall-clock time source.
#[derive(Debug, Default)]
pub struct SystemTimeSource;

impl TimeSource for SystemTimeSource {
    fn now(&self) -> u64 {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0)
    }
}
