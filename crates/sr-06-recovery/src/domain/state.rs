//! Per-peer recovery run state.

use std::collections::HashMap;

use shared_types::{PublicKey, TxHash};

/// State machine of one recovery run against one peer.
///
/// ```text
/// [Idle] ──→ [Requesting] ──→ [Replaying] ──→ [Reconciling] ──→ [Idle]
///                 │                │                │
///                 └────────────────┴────────────────┴──→ [Failed]
/// ```
///
/// `Failed` is terminal for the run but not for the peer: the scheduler
/// re-invokes the run on its next interval, resuming from the last
/// durably committed cursor.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum RunState {
    #[default]
    Idle,
    /// Exchanging hash pages to learn what is missing.
    Requesting,
    /// Fetching and persisting missing payloads.
    Replaying,
    /// Completing records whose dependencies have now landed.
    Reconciling,
    /// The run aborted; retried next cycle.
    Failed,
}

/// Replay outcome for one transaction hash.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReplayOutcome {
    Pending,
    Delivered,
    Failed,
}

/// What one recovery run did.
#[derive(Clone, Debug)]
pub struct RunReport {
    pub peer: PublicKey,
    /// Terminal state: `Idle` for a completed run, `Failed` otherwise.
    pub state: RunState,
    /// Per-hash replay outcomes for this run.
    pub outcomes: HashMap<TxHash, ReplayOutcome>,
    /// Hash pages consumed from the peer.
    pub pages: u64,
    /// Records newly persisted.
    pub stored: u64,
    /// Records completed by the reconcile pass.
    pub reconciled: u64,
    /// Whether the run walked every page (false when cancelled early).
    pub completed: bool,
    /// Failure detail when `state == Failed`.
    pub error: Option<String>,
}

impl RunReport {
    pub fn new(peer: PublicKey) -> Self {
        Self {
            peer,
            state: RunState::Idle,
            outcomes: HashMap::new(),
            pages: 0,
            stored: 0,
            reconciled: 0,
            completed: false,
            error: None,
        }
    }

    pub fn failed(&self) -> bool {
        self.state == RunState::Failed
    }

    pub(crate) fn fail(mut self, error: impl Into<String>) -> Self {
        self.state = RunState::Failed;
        self.completed = false;
        self.error = Some(error.into());
        self
    }
}
