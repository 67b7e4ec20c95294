//! Peer registry entities.

use shared_types::PublicKey;

/// Reachability state of a peer.
///
/// ```text
/// [Active] ──delivery retries exhausted──→ [Unreachable]
///     ↑                                         │
///     └───────── next successful contact ───────┘
/// ```
///
/// There is no deleted state: a historically known peer must stay
/// resolvable so recovery can re-attempt it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Liveness {
    Active,
    Unreachable,
}

/// One entry in the peer table.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PeerRecord {
    /// Participant key this record binds.
    pub key: PublicKey,
    /// Last-known reachable endpoint.
    pub uri: String,
    /// Seconds-since-epoch of the last successful contact (0 = never).
    pub last_contact: u64,
    /// Current reachability.
    pub liveness: Liveness,
}

impl PeerRecord {
    pub fn new(key: PublicKey, uri: impl Into<String>) -> Self {
        Self {
            key,
            uri: uri.into(),
            last_contact: 0,
            liveness: Liveness::Active,
        }
    }

    pub fn is_active(&self) -> bool {
        self.liveness == Liveness::Active
    }
}

/// Summary of one refresh pass.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RefreshOutcome {
    /// Endpoints successfully queried.
    pub contacted: usize,
    /// Endpoints that failed to answer.
    pub failed: usize,
    /// Keys newly added to the table.
    pub discovered: usize,
}
