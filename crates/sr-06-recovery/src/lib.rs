//! # Recovery Subsystem (sr-06)
//!
//! Re-synchronizes this node's transaction store against its peers after
//! missed deliveries, until both sides hold the same encrypted content.
//!
//! ## Architecture Role
//!
//! ```text
//! [scheduler] ──run──→ [Recovery (6)] ──hash pages / payload batches──→ [Peers]
//!                          │
//!                          ↓ put / cursors
//!                    [Payload Store (2)]
//! ```
//!
//! Two strategies coexist, selected by configuration:
//!
//! - **Batch** ([`RecoveryManager`]): pull-based. Exchanges paginated hash
//!   lists first (never bulk ciphertext), fetches only what is missing in
//!   bounded batches, and checkpoints a durable cursor after each batch so
//!   an interrupted run resumes instead of restarting.
//! - **Legacy** ([`LegacyResendManager`]): push-based, kept for peers on
//!   the old wire format. Replays every locally stored own transaction to
//!   its recipients; remote stores are content-addressed so duplicates
//!   no-op.
//!
//! Each peer's run is independent: one hung or failing peer never blocks
//! the others, and a failed run is simply retried on the next scheduled
//! cycle.

pub mod domain;
pub mod legacy;
pub mod ports;
pub mod service;

pub use domain::state::{ReplayOutcome, RunReport, RunState};
pub use legacy::{LegacyResendManager, LegacyResendReport};
pub use ports::{
    HashPage, RecipientResolver, RecoveryTransport, RecoveryTransportError,
};
pub use service::{RecoveryConfig, RecoveryManager, RecoveryStrategy};
