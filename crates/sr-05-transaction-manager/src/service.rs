//! Transaction manager service.

use std::sync::Arc;

use shared_types::{PrivacyMode, PublicKey, TxHash};
use sr_02_payload_store::{PutOutcome, RecordStatus, StoredRecord, TransactionStore};
use sr_03_payload_codec::{
    decode_any, EncodePayloadRequest, EncodedPayload, EncodedPayloadManager, EnclaveGateway,
    PayloadCodec,
};
use sr_04_payload_publisher::{
    EndpointDirectory, PayloadPublisher, PayloadTransport, PublishError,
};
use tracing::{debug, info, warn};

use crate::errors::TransactionManagerError;
use crate::ports::PeerObserver;

/// A retrieved, decrypted transaction.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReceivedTransaction {
    pub hash: TxHash,
    pub sender: PublicKey,
    pub plaintext: Vec<u8>,
    pub privacy_mode: PrivacyMode,
    pub affected_transactions: Vec<TxHash>,
}

/// Orchestrates encode → persist → publish for submissions, and
/// fetch → decrypt for retrievals.
pub struct TransactionManager<E, T, D>
where
    E: EnclaveGateway,
    T: PayloadTransport,
    D: EndpointDirectory,
{
    encoder: Arc<EncodedPayloadManager<E>>,
    store: Arc<dyn TransactionStore>,
    publisher: Arc<PayloadPublisher<T, D>>,
    codec: Arc<dyn PayloadCodec>,
    observer: Arc<dyn PeerObserver>,
}

impl<E, T, D> TransactionManager<E, T, D>
where
    E: EnclaveGateway,
    T: PayloadTransport,
    D: EndpointDirectory,
{
    pub fn new(
        encoder: Arc<EncodedPayloadManager<E>>,
        store: Arc<dyn TransactionStore>,
        publisher: Arc<PayloadPublisher<T, D>>,
        codec: Arc<dyn PayloadCodec>,
        observer: Arc<dyn PeerObserver>,
    ) -> Self {
        Self {
            encoder,
            store,
            publisher,
            codec,
            observer,
        }
    }

    /// Encrypts, persists, and publishes a submission.
    ///
    /// The record is persisted before publication; if a mandatory
    /// recipient then fails, the record is marked unconfirmed and the
    /// failure propagates, but the local copy is never deleted.
    pub async fn store(
        &self,
        request: EncodePayloadRequest,
    ) -> Result<TxHash, TransactionManagerError> {
        let payload = self.encoder.encode(request).await?;
        let hash = payload.tx_hash();

        let frame = self.codec.encode(&payload)?;
        let record = StoredRecord::new(frame, self.codec.version().wire_byte());
        if self.store.put(&hash, record)? == PutOutcome::AlreadyPresent {
            debug!(%hash, "submission already stored");
        }

        let recipients = payload.recipient_keys().to_vec();
        match self.publisher.publish(&payload, &recipients).await {
            Ok(report) => {
                for outcome in report.undelivered() {
                    warn!(
                        recipient = ?outcome.recipient,
                        status = ?outcome.status,
                        %hash,
                        "best-effort recipient not served"
                    );
                }
                info!(%hash, recipients = recipients.len(), "transaction stored and published");
                Ok(hash)
            }
            Err(PublishError::MandatoryDeliveryFailed { failed, .. }) => {
                self.store.set_status(&hash, RecordStatus::Unconfirmed)?;
                warn!(%hash, ?failed, "mandatory delivery failed, record kept unconfirmed");
                Err(TransactionManagerError::MandatoryDeliveryFailed { hash, failed })
            }
            Err(PublishError::Codec(e)) => Err(e.into()),
        }
    }

    /// Fetches and decrypts a stored transaction.
    ///
    /// If this node sent the transaction, the sender-side box is opened;
    /// otherwise this node's own key is matched against the recipient
    /// boxes.
    pub async fn retrieve(
        &self,
        hash: &TxHash,
    ) -> Result<ReceivedTransaction, TransactionManagerError> {
        let record = self
            .store
            .get(hash)?
            .ok_or(TransactionManagerError::NotFound(*hash))?;
        let (_, payload) = decode_any(&record.payload)?;

        let plaintext = if self.encoder.is_own_key(payload.sender()) {
            self.encoder.unseal_as_sender(&payload).await?
        } else {
            self.encoder.unseal_as_recipient(&payload).await?
        };

        Ok(ReceivedTransaction {
            hash: *hash,
            sender: *payload.sender(),
            plaintext,
            privacy_mode: payload.privacy_mode(),
            affected_transactions: payload.affected_transactions().to_vec(),
        })
    }

    /// Persists a payload pushed by a peer.
    ///
    /// Idempotent: replays of the same frame land on the same content
    /// address and are no-ops. A payload whose declared dependencies are
    /// not all present yet is stored gated and resolved later by
    /// recovery's reconcile pass.
    pub async fn store_received(
        &self,
        frame: &[u8],
        sender_uri: Option<&str>,
    ) -> Result<TxHash, TransactionManagerError> {
        let (version, payload) = decode_any(frame)?;
        let hash = payload.tx_hash();

        let status = if self.dependencies_present(&payload)? {
            RecordStatus::Confirmed
        } else {
            debug!(%hash, "dependencies missing, storing gated");
            RecordStatus::AwaitingDependencies
        };

        let record = StoredRecord::new(frame.to_vec(), version.wire_byte()).with_status(status);
        if self.store.put(&hash, record)? == PutOutcome::Stored {
            info!(%hash, sender = ?payload.sender(), "stored pushed transaction");
        }

        if let Some(uri) = sender_uri {
            self.observer.on_observed_peer(*payload.sender(), uri);
        }
        Ok(hash)
    }

    /// Store health verification; `false` rather than an error so the
    /// caller decides whether to abort startup.
    pub fn upcheck(&self) -> bool {
        self.store.upcheck()
    }

    fn dependencies_present(
        &self,
        payload: &EncodedPayload,
    ) -> Result<bool, TransactionManagerError> {
        for dependency in payload.affected_transactions() {
            if !self.store.exists(dependency)? {
                return Ok(false);
            }
        }
        Ok(true)
    }
}
