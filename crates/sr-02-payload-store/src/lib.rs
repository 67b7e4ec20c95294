//! # Payload Store Subsystem (sr-02)
//!
//! Durable, content-addressed storage for encrypted transaction payloads
//! plus the per-peer resend cursors the recovery workflow checkpoints
//! against.
//!
//! ## Architecture Role
//!
//! ```text
//! [Transaction Manager (5)] ──put/get──→ [Payload Store (2)]
//! [Recovery (6)] ──put/list_missing/cursors──→ [Payload Store (2)]
//!                                                  │
//!                                                  ↓
//!                                          [KeyValueStore port]
//! ```
//!
//! Records are keyed by the payload's content address, so concurrent
//! writers (the submission path and the recovery path) can only race on
//! identical content; a write for an already-present hash is a no-op
//! equality check, never an overwrite.
//!
//! Database mechanics live behind the [`KeyValueStore`] port; this crate
//! ships an in-memory adapter and hosts wire up their own.

pub mod domain;
pub mod ports;
pub mod service;

pub use domain::errors::StoreError;
pub use domain::record::{PutOutcome, RecordStatus, ResendCursor, StoredRecord};
pub use ports::{InMemoryKvStore, KeyValueStore, KvStoreError};
pub use service::{PayloadStore, TransactionStore};
