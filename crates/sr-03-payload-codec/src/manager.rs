//! Builds encrypted payloads for submissions and recovers plaintext from
//! stored payloads.

use std::collections::BTreeSet;
use std::sync::Arc;

use shared_types::{PrivacyMode, PublicKey, TxHash};
use tracing::debug;

use crate::domain::errors::{DecodeError, EncodeError};
use crate::domain::payload::EncodedPayload;
use crate::ports::{EnclaveError, EnclaveGateway};

/// A submission to be encrypted for a recipient set.
#[derive(Clone, Debug)]
pub struct EncodePayloadRequest {
    pub transaction: Vec<u8>,
    pub sender: PublicKey,
    pub recipients: Vec<PublicKey>,
    pub privacy_mode: PrivacyMode,
    pub affected_transactions: Vec<TxHash>,
    pub privacy_group_id: Option<Vec<u8>>,
    pub mandatory_recipients: Vec<PublicKey>,
}

impl EncodePayloadRequest {
    /// Minimal standard-privacy request.
    pub fn standard(transaction: Vec<u8>, sender: PublicKey, recipients: Vec<PublicKey>) -> Self {
        Self {
            transaction,
            sender,
            recipients,
            privacy_mode: PrivacyMode::Standard,
            affected_transactions: Vec::new(),
            privacy_group_id: None,
            mandatory_recipients: Vec::new(),
        }
    }
}

/// Encodes submissions into [`EncodedPayload`]s and opens stored payloads.
///
/// Pure transformation apart from the enclave call; owns no storage and no
/// network access. Constructed once at startup with this node's identity
/// snapshot (explicit wiring, no ambient context).
pub struct EncodedPayloadManager<E: EnclaveGateway> {
    enclave: Arc<E>,
    own_keys: BTreeSet<PublicKey>,
    always_send_to: Vec<PublicKey>,
    enhanced_privacy_enabled: bool,
}

impl<E: EnclaveGateway> EncodedPayloadManager<E> {
    pub fn new(
        enclave: Arc<E>,
        own_keys: impl IntoIterator<Item = PublicKey>,
        always_send_to: Vec<PublicKey>,
        enhanced_privacy_enabled: bool,
    ) -> Self {
        Self {
            enclave,
            own_keys: own_keys.into_iter().collect(),
            always_send_to,
            enhanced_privacy_enabled,
        }
    }

    /// Whether `key` belongs to this node.
    pub fn is_own_key(&self, key: &PublicKey) -> bool {
        self.own_keys.contains(key)
    }

    /// Encrypts a submission for its recipient set.
    ///
    /// Standard-mode submissions with an empty recipient list fall back to
    /// the node's default broadcast set. Non-standard privacy modes require
    /// enhanced privacy to be enabled on this node.
    pub async fn encode(
        &self,
        request: EncodePayloadRequest,
    ) -> Result<EncodedPayload, EncodeError> {
        if request.transaction.is_empty() {
            return Err(EncodeError::EmptyPayload);
        }
        if !self.own_keys.contains(&request.sender) {
            return Err(EncodeError::InvalidSender(request.sender));
        }
        if request.privacy_mode != PrivacyMode::Standard && !self.enhanced_privacy_enabled {
            return Err(EncodeError::EnhancedPrivacyDisabled);
        }

        let recipients = self.resolve_recipients(&request)?;

        let mandatory = if request.privacy_mode.enforces_mandatory_recipients() {
            for key in &request.mandatory_recipients {
                if !recipients.contains(key) {
                    return Err(EncodeError::MandatoryRecipientOutsideSet(*key));
                }
            }
            request.mandatory_recipients.clone()
        } else {
            if !request.mandatory_recipients.is_empty() {
                debug!(
                    mode = ?request.privacy_mode,
                    "mandatory recipients ignored outside mandatory/enhanced modes"
                );
            }
            Vec::new()
        };

        let sealed = self
            .enclave
            .seal(&request.transaction, &request.sender, &recipients)
            .await?;

        Ok(
            EncodedPayload::new(request.sender, sealed.cipher_text, sealed.nonce)
                .with_recipients(recipients, sealed.recipient_boxes)
                .with_privacy_mode(request.privacy_mode)
                .with_affected_transactions(request.affected_transactions)
                .with_privacy_group_id(request.privacy_group_id)
                .with_mandatory_recipients(mandatory),
        )
    }

    /// Recovers plaintext from a payload this node sent.
    ///
    /// The sender side opens the first recipient's box, which works because
    /// the sealed box is symmetric between the sender and that recipient.
    pub async fn unseal_as_sender(
        &self,
        payload: &EncodedPayload,
    ) -> Result<Vec<u8>, DecodeError> {
        let first_box = payload
            .recipient_boxes()
            .first()
            .ok_or(DecodeError::NoRecipientBoxes)?;
        let recipient = payload
            .recipient_keys()
            .first()
            .ok_or(DecodeError::MissingRecipientKeys)?;
        let plaintext = self
            .enclave
            .unseal(
                payload.cipher_text(),
                payload.nonce(),
                first_box,
                payload.sender(),
                recipient,
            )
            .await?;
        Ok(plaintext)
    }

    /// Recovers plaintext from a payload addressed to this node.
    ///
    /// With a keyed payload the addressed box is found by key lookup. A
    /// stripped or legacy payload carries no keys, so each own key is tried
    /// against each box until one opens.
    pub async fn unseal_as_recipient(
        &self,
        payload: &EncodedPayload,
    ) -> Result<Vec<u8>, DecodeError> {
        if payload.recipient_boxes().is_empty() {
            return Err(DecodeError::NoRecipientBoxes);
        }

        if !payload.recipient_keys().is_empty() {
            for own_key in &self.own_keys {
                if let Some(index) = payload.recipient_index(own_key) {
                    let plaintext = self
                        .enclave
                        .unseal(
                            payload.cipher_text(),
                            payload.nonce(),
                            &payload.recipient_boxes()[index],
                            payload.sender(),
                            own_key,
                        )
                        .await?;
                    return Ok(plaintext);
                }
            }
            return Err(DecodeError::NotAddressedToThisNode);
        }

        // No key list: probe. A failed open is expected here and moves on
        // to the next candidate; only transport errors abort.
        for recipient_box in payload.recipient_boxes() {
            for own_key in &self.own_keys {
                match self
                    .enclave
                    .unseal(
                        payload.cipher_text(),
                        payload.nonce(),
                        recipient_box,
                        payload.sender(),
                        own_key,
                    )
                    .await
                {
                    Ok(plaintext) => return Ok(plaintext),
                    Err(EnclaveError::DecryptionFailed) => continue,
                    Err(other) => return Err(other.into()),
                }
            }
        }
        Err(DecodeError::NotAddressedToThisNode)
    }

    fn resolve_recipients(
        &self,
        request: &EncodePayloadRequest,
    ) -> Result<Vec<PublicKey>, EncodeError> {
        let mut recipients = request.recipients.clone();
        if request.privacy_mode == PrivacyMode::Standard {
            recipients.extend(self.always_send_to.iter().copied());
        }
        let recipients = dedup_preserving_order(recipients);
        if recipients.is_empty() {
            return Err(EncodeError::EmptyRecipientSet);
        }
        Ok(recipients)
    }
}

fn dedup_preserving_order(keys: Vec<PublicKey>) -> Vec<PublicKey> {
    let mut seen = BTreeSet::new();
    keys.into_iter().filter(|k| seen.insert(*k)).collect()
}
