//! # Peer Directory Subsystem (sr-01)
//!
//! Authoritative, refreshable registry mapping participant public keys to
//! reachable peer endpoints, with liveness tracking.
//!
//! ## Architecture Role
//!
//! ```text
//! [seed URIs] ──→ [Peer Directory (1)] ←──party info──→ [Peers]
//!                        │ resolve
//!            ┌───────────┴───────────┐
//!            ↓                       ↓
//!      [Publisher (4)]         [Recovery (6)]
//! ```
//!
//! The directory table is written only by this subsystem; everything else
//! reads through [`PeerDirectoryService::resolve`] or a snapshot. Records
//! are never deleted: a peer that stops answering is demoted to
//! `Unreachable` and stays resolvable so recovery can retry it later.

pub mod domain;
pub mod ports;
pub mod service;

pub use domain::entities::{Liveness, PeerRecord, RefreshOutcome};
pub use domain::errors::DirectoryError;
pub use ports::{PartyInfoClient, PartyInfoResponse, PeerEntry, SystemTimeSource, TimeSource};
pub use service::{PeerDirectoryConfig, PeerDirectoryService};
