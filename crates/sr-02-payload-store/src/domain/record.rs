//! Durable record types.

use serde::{Deserialize, Serialize};

/// Result of a store put.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PutOutcome {
    /// New record written.
    Stored,
    /// Identical record already present; storage untouched.
    AlreadyPresent,
}

/// Delivery/completeness state of a stored record.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum RecordStatus {
    /// Stored and, as far as this node knows, fully delivered.
    #[default]
    Confirmed,
    /// Stored locally but a mandatory recipient was never reached; the
    /// submission was reported failed upward while the local copy is kept.
    Unconfirmed,
    /// Recovered from a peer but at least one declared dependency hash is
    /// not yet present locally; not resolved until the dependencies land.
    AwaitingDependencies,
}

/// A stored encrypted transaction.
///
/// The payload is kept in its wire form together with the codec version
/// byte that framed it, so recovery can replay it to old-format peers
/// without re-encoding.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredRecord {
    /// Encoded payload frame (including the version byte).
    pub payload: Vec<u8>,
    /// Wire version byte the payload was framed with.
    pub codec_version: u8,
    /// Delivery/completeness state.
    pub status: RecordStatus,
}

impl StoredRecord {
    pub fn new(payload: Vec<u8>, codec_version: u8) -> Self {
        Self {
            payload,
            codec_version,
            status: RecordStatus::Confirmed,
        }
    }

    pub fn with_status(mut self, status: RecordStatus) -> Self {
        self.status = status;
        self
    }
}

/// Checkpoint of a recovery run against one peer.
///
/// Advanced only after a batch is durably persisted, so an interrupted run
/// resumes from the last committed page instead of restarting.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResendCursor {
    /// Next remote page to request.
    pub next_page: u64,
}

impl ResendCursor {
    pub fn advanced(self) -> Self {
        Self {
            next_page: self.next_page + 1,
        }
    }
}
