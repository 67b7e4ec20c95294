//! The distributable encrypted transaction unit.

use shared_types::{PrivacyMode, PublicKey, RecipientBox, TxHash};

/// An encrypted transaction ready for distribution.
///
/// The ciphertext and nonce come from the enclave; the recipient lists and
/// privacy metadata are assembled by the [`EncodedPayloadManager`].
///
/// ## Invariants
///
/// - The content address ([`EncodedPayload::tx_hash`]) is derived from the
///   ciphertext alone, so identical ciphertext always lands on the same
///   storage key.
/// - In the keyed (v2) wire form, `recipient_keys` and `recipient_boxes`
///   are parallel lists. A legacy (v1) payload carries boxes only and an
///   empty key list.
///
/// [`EncodedPayloadManager`]: crate::manager::EncodedPayloadManager
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EncodedPayload {
    sender: PublicKey,
    cipher_text: Vec<u8>,
    nonce: Vec<u8>,
    recipient_keys: Vec<PublicKey>,
    recipient_boxes: Vec<RecipientBox>,
    privacy_mode: PrivacyMode,
    affected_transactions: Vec<TxHash>,
    privacy_group_id: Option<Vec<u8>>,
    mandatory_recipients: Vec<PublicKey>,
}

impl EncodedPayload {
    /// Creates a payload with no recipients and standard privacy.
    pub fn new(sender: PublicKey, cipher_text: Vec<u8>, nonce: Vec<u8>) -> Self {
        Self {
            sender,
            cipher_text,
            nonce,
            recipient_keys: Vec::new(),
            recipient_boxes: Vec::new(),
            privacy_mode: PrivacyMode::Standard,
            affected_transactions: Vec::new(),
            privacy_group_id: None,
            mandatory_recipients: Vec::new(),
        }
    }

    /// Builder method: set the parallel recipient key/box lists.
    pub fn with_recipients(
        mut self,
        keys: Vec<PublicKey>,
        boxes: Vec<RecipientBox>,
    ) -> Self {
        self.recipient_keys = keys;
        self.recipient_boxes = boxes;
        self
    }

    /// Builder method: positional boxes without keys (legacy form).
    pub fn with_boxes_only(mut self, boxes: Vec<RecipientBox>) -> Self {
        self.recipient_keys = Vec::new();
        self.recipient_boxes = boxes;
        self
    }

    /// Builder method: set the privacy mode.
    pub fn with_privacy_mode(mut self, mode: PrivacyMode) -> Self {
        self.privacy_mode = mode;
        self
    }

    /// Builder method: set the causal dependency hashes.
    pub fn with_affected_transactions(mut self, hashes: Vec<TxHash>) -> Self {
        self.affected_transactions = hashes;
        self
    }

    /// Builder method: set the privacy group identifier.
    pub fn with_privacy_group_id(mut self, id: Option<Vec<u8>>) -> Self {
        self.privacy_group_id = id;
        self
    }

    /// Builder method: set the mandatory recipient subset.
    pub fn with_mandatory_recipients(mut self, keys: Vec<PublicKey>) -> Self {
        self.mandatory_recipients = keys;
        self
    }

    /// Content address of this payload, derived from the ciphertext.
    pub fn tx_hash(&self) -> TxHash {
        TxHash::of_ciphertext(&self.cipher_text)
    }

    pub fn sender(&self) -> &PublicKey {
        &self.sender
    }

    pub fn cipher_text(&self) -> &[u8] {
        &self.cipher_text
    }

    pub fn nonce(&self) -> &[u8] {
        &self.nonce
    }

    pub fn recipient_keys(&self) -> &[PublicKey] {
        &self.recipient_keys
    }

    pub fn recipient_boxes(&self) -> &[RecipientBox] {
        &self.recipient_boxes
    }

    pub fn privacy_mode(&self) -> PrivacyMode {
        self.privacy_mode
    }

    pub fn affected_transactions(&self) -> &[TxHash] {
        &self.affected_transactions
    }

    pub fn privacy_group_id(&self) -> Option<&[u8]> {
        self.privacy_group_id.as_deref()
    }

    pub fn mandatory_recipients(&self) -> &[PublicKey] {
        &self.mandatory_recipients
    }

    /// Index of a recipient key in the keyed list, if present.
    pub fn recipient_index(&self, key: &PublicKey) -> Option<usize> {
        self.recipient_keys.iter().position(|k| k == key)
    }

    /// Per-recipient copy carrying only that recipient's key box.
    ///
    /// Enhanced-privacy sends must not reveal sibling boxes, so each
    /// recipient receives a stripped payload. The ciphertext is unchanged,
    /// which keeps the content address stable across all copies.
    pub fn strip_for_recipient(&self, index: usize) -> Option<EncodedPayload> {
        let recipient_box = self.recipient_boxes.get(index)?.clone();
        let key = self.recipient_keys.get(index).copied();
        let mut stripped = self.clone();
        stripped.recipient_boxes = vec![recipient_box];
        stripped.recipient_keys = key.into_iter().collect();
        Some(stripped)
    }
}
