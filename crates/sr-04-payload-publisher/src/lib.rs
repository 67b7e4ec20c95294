//! # Payload Publisher Subsystem (sr-04)
//!
//! Delivers encoded payloads to recipient endpoints. Recipients fan out
//! concurrently; each recipient gets a strictly sequential bounded-retry
//! loop with exponential backoff, so a payload is never in flight to the
//! same recipient twice.
//!
//! ## Architecture Role
//!
//! ```text
//! [Transaction Manager (5)] ──publish──→ [Publisher (4)]
//!                                            │ resolve          │ push
//!                                            ↓                  ↓
//!                                    [Peer Directory (1)]   [Peer endpoints]
//! ```
//!
//! Delivery failure handling splits by recipient class: a mandatory
//! recipient exhausting its retries fails the whole publish; a best-effort
//! recipient is demoted to unreachable in the directory and reported,
//! without failing the call. Remote stores are content-addressed, so
//! resending an already-delivered payload is safe.

pub mod policy;
pub mod ports;
pub mod service;

pub use policy::RetryPolicy;
pub use ports::{EndpointDirectory, PayloadTransport, TransportError};
pub use service::{
    DeliveryStatus, PayloadPublisher, PublishError, PublishReport, PublisherConfig,
    RecipientOutcome,
};
