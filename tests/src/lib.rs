//! # Shroud-Relay Test Suite
//!
//! Unified test crate for cross-subsystem flows that no single crate can
//! exercise alone: submission fan-out, store convergence through
//! recovery, and discovery expansion over a simulated network.
//!
//! ## Structure
//!
//! ```text
//! tests/src/
//! ├── common/           # In-process network hub and node fixtures
//! └── integration/      # Cross-subsystem flows
//!     ├── submission.rs # encode → store → publish → remote store
//!     ├── convergence.rs# recovery until stores match, resume, gating
//!     └── discovery.rs  # gossip expansion scenarios
//! ```
//!
//! ## Running Tests
//!
//! ```bash
//! cargo test -p sr-tests
//! cargo test -p sr-tests integration::convergence::
//! ```

pub mod common;

#[cfg(test)]
mod integration {
    mod convergence;
    mod discovery;
    mod submission;
}
