//! Recovery domain model.

pub mod state;

pub use state::{ReplayOutcome, RunReport, RunState};
