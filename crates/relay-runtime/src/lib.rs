//! # Shroud-Relay Node Runtime
//!
//! Builds and runs a relay node: configuration loading, key sourcing
//! (inline or via a key vault), the immutable [`RuntimeContext`], outbound
//! REST adapters, subsystem wiring, and the background schedulers for
//! discovery refresh and recovery.
//!
//! ## Startup Sequence
//!
//! 1. Load and validate configuration (file + environment overrides)
//! 2. Resolve key material (vault-referenced entries fetched once)
//! 3. Build the [`RuntimeContext`] (immutable after this point)
//! 4. Wire subsystems bottom-up (store → codec → directory → publisher →
//!    transaction manager → recovery)
//! 5. Verify the store (`upcheck`); failure aborts startup (exit code 2)
//! 6. If `recovery_mode` is set, run one full recovery pass first
//! 7. Start the discovery and recovery schedulers
//!
//! The inbound HTTP surface is a host concern; this crate wires outbound
//! clients only and exposes the [`node::RelayNode`] handle the host mounts
//! its routes on.

pub mod adapters;
pub mod config;
pub mod context;
pub mod node;

pub use config::NodeConfig;
pub use context::{RuntimeContext, RuntimeContextBuilder};
pub use node::RelayNode;
