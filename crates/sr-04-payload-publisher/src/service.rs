//! Publisher service.

use std::sync::Arc;

use futures::future::join_all;
use shared_types::{PrivacyMode, PublicKey};
use sr_03_payload_codec::{CodecError, EncodedPayload, PayloadCodec};
use tokio::time::timeout;
use tracing::{debug, warn};

use crate::policy::RetryPolicy;
use crate::ports::{EndpointDirectory, PayloadTransport, TransportError};

/// Publisher behavior knobs.
#[derive(Clone, Debug, Default)]
pub struct PublisherConfig {
    pub retry: RetryPolicy,
    /// Attempt one directory refresh when a recipient does not resolve.
    /// Disabled when the node runs with peer discovery off.
    pub on_demand_refresh: bool,
}

/// Terminal delivery state for one recipient.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DeliveryStatus {
    Delivered,
    /// Retries exhausted on transient failures; peer demoted in the
    /// directory.
    Unreachable,
    /// Peer answered with a non-retryable refusal.
    Rejected(String),
    /// No endpoint known for the recipient key.
    Unresolved,
}

/// Per-recipient outcome of one publish call.
#[derive(Clone, Debug)]
pub struct RecipientOutcome {
    pub recipient: PublicKey,
    pub status: DeliveryStatus,
    pub attempts: u32,
}

impl RecipientOutcome {
    pub fn delivered(&self) -> bool {
        self.status == DeliveryStatus::Delivered
    }
}

/// Everything that happened during one publish call.
#[derive(Clone, Debug, Default)]
pub struct PublishReport {
    pub outcomes: Vec<RecipientOutcome>,
}

impl PublishReport {
    pub fn all_delivered(&self) -> bool {
        self.outcomes.iter().all(RecipientOutcome::delivered)
    }

    pub fn undelivered(&self) -> impl Iterator<Item = &RecipientOutcome> {
        self.outcomes.iter().filter(|o| !o.delivered())
    }
}

/// Publish errors.
#[derive(Debug, thiserror::Error)]
pub enum PublishError {
    /// At least one mandatory recipient could not be served. The report
    /// carries the full per-recipient picture so the caller can mark the
    /// local record undelivered.
    #[error("delivery failed for {} mandatory recipient(s)", failed.len())]
    MandatoryDeliveryFailed {
        failed: Vec<PublicKey>,
        report: PublishReport,
    },

    #[error(transparent)]
    Codec(#[from] CodecError),
}

/// Delivers payloads to recipient endpoints.
pub struct PayloadPublisher<T: PayloadTransport, D: EndpointDirectory> {
    transport: Arc<T>,
    directory: Arc<D>,
    codec: Arc<dyn PayloadCodec>,
    config: PublisherConfig,
}

impl<T: PayloadTransport, D: EndpointDirectory> PayloadPublisher<T, D> {
    pub fn new(
        transport: Arc<T>,
        directory: Arc<D>,
        codec: Arc<dyn PayloadCodec>,
        config: PublisherConfig,
    ) -> Self {
        Self {
            transport,
            directory,
            codec,
            config,
        }
    }

    /// Publishes `payload` to each recipient concurrently.
    ///
    /// Returns `Ok` with the report unless a mandatory recipient failed;
    /// best-effort failures are demoted and reported but never fail the
    /// call. Per-recipient retries are sequential, so the same
    /// recipient+payload pair is never in flight twice.
    pub async fn publish(
        &self,
        payload: &EncodedPayload,
        recipients: &[PublicKey],
    ) -> Result<PublishReport, PublishError> {
        let mut sends = Vec::with_capacity(recipients.len());
        for recipient in recipients {
            let frame = self.frame_for(payload, recipient)?;
            sends.push(self.deliver_one(*recipient, frame));
        }
        let outcomes = join_all(sends).await;

        let report = PublishReport { outcomes };
        let failed: Vec<PublicKey> = report
            .undelivered()
            .filter(|o| payload.mandatory_recipients().contains(&o.recipient))
            .map(|o| o.recipient)
            .collect();
        if !failed.is_empty() {
            return Err(PublishError::MandatoryDeliveryFailed { failed, report });
        }
        Ok(report)
    }

    /// Wire frame for one recipient. Enhanced-privacy payloads are
    /// stripped so a recipient never sees a sibling's key box.
    fn frame_for(
        &self,
        payload: &EncodedPayload,
        recipient: &PublicKey,
    ) -> Result<Vec<u8>, CodecError> {
        if payload.privacy_mode() == PrivacyMode::EnhancedPrivacy {
            if let Some(stripped) = payload
                .recipient_index(recipient)
                .and_then(|i| payload.strip_for_recipient(i))
            {
                return self.codec.encode(&stripped);
            }
        }
        self.codec.encode(payload)
    }

    async fn deliver_one(&self, recipient: PublicKey, frame: Vec<u8>) -> RecipientOutcome {
        let Some(uri) = self.resolve_with_refresh(&recipient).await else {
            warn!(?recipient, "no endpoint for recipient");
            return RecipientOutcome {
                recipient,
                status: DeliveryStatus::Unresolved,
                attempts: 0,
            };
        };

        let policy = &self.config.retry;
        for attempt in 1..=policy.max_attempts {
            let result = match timeout(
                policy.call_timeout,
                self.transport.push_payload(&uri, &frame),
            )
            .await
            {
                Ok(result) => result,
                Err(_) => Err(TransportError::Timeout { uri: uri.clone() }),
            };

            match result {
                Ok(()) => {
                    self.directory.mark_active(&recipient);
                    return RecipientOutcome {
                        recipient,
                        status: DeliveryStatus::Delivered,
                        attempts: attempt,
                    };
                }
                Err(e) if e.is_retryable() && attempt < policy.max_attempts => {
                    debug!(?recipient, attempt, "retryable delivery failure: {e}");
                    tokio::time::sleep(policy.backoff(attempt)).await;
                }
                Err(e) if e.is_retryable() => {
                    warn!(?recipient, attempts = attempt, "delivery retries exhausted: {e}");
                    self.directory.mark_unreachable(&recipient);
                    return RecipientOutcome {
                        recipient,
                        status: DeliveryStatus::Unreachable,
                        attempts: attempt,
                    };
                }
                Err(e) => {
                    warn!(?recipient, "non-retryable delivery failure: {e}");
                    return RecipientOutcome {
                        recipient,
                        status: DeliveryStatus::Rejected(e.to_string()),
                        attempts: attempt,
                    };
                }
            }
        }
        // Only reachable with a zero-attempt policy.
        RecipientOutcome {
            recipient,
            status: DeliveryStatus::Unreachable,
            attempts: 0,
        }
    }

    async fn resolve_with_refresh(&self, recipient: &PublicKey) -> Option<String> {
        if let Some(uri) = self.directory.resolve(recipient) {
            return Some(uri);
        }
        if self.config.on_demand_refresh {
            debug!(?recipient, "recipient unresolved, refreshing directory");
            self.directory.refresh().await;
            return self.directory.resolve(recipient);
        }
        None
    }
}
