//! Stored record model.

pub mod errors;
pub mod record;

pub use errors::StoreError;
pub use record::{PutOutcome, RecordStatus, ResendCursor, StoredRecord};
