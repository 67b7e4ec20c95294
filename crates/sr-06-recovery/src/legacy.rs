//! Push-based legacy resend.
//!
//! Pre-upgrade peers cannot serve the paginated batch protocol; migrating
//! away from them means replaying this node's own transactions at them in
//! the old wire format. Remote stores are content-addressed, so a peer
//! that already holds a payload no-ops on the push.

use std::collections::BTreeSet;
use std::sync::Arc;

use shared_types::PublicKey;
use sr_02_payload_store::{StoreError, TransactionStore};
use sr_03_payload_codec::{decode_any, LegacyCodec, PayloadCodec};
use tokio::sync::watch;
use tracing::{info, warn};

use crate::ports::{RecipientResolver, RecoveryTransport};

/// What one legacy resend pass did.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct LegacyResendReport {
    /// Stored records examined.
    pub scanned: u64,
    /// Successful per-recipient pushes.
    pub resent: u64,
    /// Records skipped (foreign sender, no recipient list, undecodable).
    pub skipped: u64,
    /// Per-recipient pushes that failed.
    pub failed: u64,
}

/// Replays every locally stored own transaction to its recipients using
/// the legacy wire format.
pub struct LegacyResendManager<R: RecoveryTransport> {
    store: Arc<dyn TransactionStore>,
    transport: Arc<R>,
    resolver: Arc<dyn RecipientResolver>,
    own_keys: BTreeSet<PublicKey>,
    page_size: usize,
}

impl<R: RecoveryTransport> LegacyResendManager<R> {
    pub fn new(
        store: Arc<dyn TransactionStore>,
        transport: Arc<R>,
        resolver: Arc<dyn RecipientResolver>,
        own_keys: impl IntoIterator<Item = PublicKey>,
        page_size: usize,
    ) -> Self {
        Self {
            store,
            transport,
            resolver,
            own_keys: own_keys.into_iter().collect(),
            page_size,
        }
    }

    /// One full resend pass over the local store.
    ///
    /// Per-recipient failures are counted and logged but never abort the
    /// pass; only a store backend failure does.
    pub async fn resend_all(
        &self,
        cancel: &watch::Receiver<bool>,
    ) -> Result<LegacyResendReport, StoreError> {
        let mut report = LegacyResendReport::default();
        let mut offset = 0u64;

        loop {
            if *cancel.borrow() {
                info!("legacy resend cancelled");
                return Ok(report);
            }
            let hashes = self.store.hashes_page(offset, self.page_size)?;
            if hashes.is_empty() {
                break;
            }
            offset += hashes.len() as u64;

            for hash in hashes {
                report.scanned += 1;
                let Some(record) = self.store.get(&hash)? else {
                    continue;
                };
                let payload = match decode_any(&record.payload) {
                    Ok((_, payload)) => payload,
                    Err(e) => {
                        warn!(%hash, "stored record does not decode, skipping: {e}");
                        report.skipped += 1;
                        continue;
                    }
                };
                if !self.own_keys.contains(payload.sender()) {
                    report.skipped += 1;
                    continue;
                }
                if payload.recipient_keys().is_empty() {
                    // Old-format records carry no recipient list; there
                    // is nobody to address the replay to.
                    warn!(%hash, "own record has no recipient list, skipping");
                    report.skipped += 1;
                    continue;
                }

                let frame = match LegacyCodec.encode(&payload) {
                    Ok(frame) => frame,
                    Err(e) => {
                        warn!(%hash, "legacy re-encode failed, skipping: {e}");
                        report.skipped += 1;
                        continue;
                    }
                };

                for recipient in payload.recipient_keys() {
                    let Some(uri) = self.resolver.resolve(recipient) else {
                        warn!(?recipient, %hash, "no endpoint for recipient");
                        report.failed += 1;
                        continue;
                    };
                    match self.transport.push_payload(&uri, &frame).await {
                        Ok(()) => report.resent += 1,
                        Err(e) => {
                            warn!(?recipient, %hash, "legacy push failed: {e}");
                            report.failed += 1;
                        }
                    }
                }
            }
        }

        info!(
            scanned = report.scanned,
            resent = report.resent,
            skipped = report.skipped,
            failed = report.failed,
            "legacy resend pass complete"
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use shared_types::TxHash;
    use sr_02_payload_store::{InMemoryKvStore, PayloadStore, StoredRecord};
    use sr_03_payload_codec::test_utils::MockEnclave;
    use sr_03_payload_codec::{
        CodecVersion, EnclaveGateway, EncodedPayload, StandardCodec,
    };
    use crate::ports::{HashPage, RecoveryTransportError};
    use std::collections::HashMap;

    #[derive(Default)]
    struct PushRecorder {
        pushes: Mutex<Vec<(String, Vec<u8>)>>,
    }

    #[async_trait]
    impl RecoveryTransport for PushRecorder {
        async fn fetch_hash_page(
            &self,
            _uri: &str,
            _page: u64,
            _page_size: usize,
        ) -> Result<HashPage, RecoveryTransportError> {
            Ok(HashPage::default())
        }

        async fn fetch_payloads(
            &self,
            _uri: &str,
            _hashes: &[TxHash],
            _max_bytes: usize,
        ) -> Result<Vec<Vec<u8>>, RecoveryTransportError> {
            Ok(Vec::new())
        }

        async fn push_payload(
            &self,
            uri: &str,
            frame: &[u8],
        ) -> Result<(), RecoveryTransportError> {
            self.pushes.lock().push((uri.to_string(), frame.to_vec()));
            Ok(())
        }
    }

    struct MapResolver(HashMap<PublicKey, String>);

    impl RecipientResolver for MapResolver {
        fn resolve(&self, key: &PublicKey) -> Option<String> {
            self.0.get(key).cloned()
        }
    }

    fn own_key() -> PublicKey {
        PublicKey::new([0x0A; 32])
    }

    async fn stored_payload(
        store: &dyn TransactionStore,
        sender: PublicKey,
        recipients: &[PublicKey],
        tx: &[u8],
    ) -> TxHash {
        let sealed = MockEnclave.seal(tx, &sender, recipients).await.unwrap();
        let payload = EncodedPayload::new(sender, sealed.cipher_text, sealed.nonce)
            .with_recipients(recipients.to_vec(), sealed.recipient_boxes);
        let hash = payload.tx_hash();
        let frame = StandardCodec.encode(&payload).unwrap();
        store
            .put(&hash, StoredRecord::new(frame, 2))
            .unwrap();
        hash
    }

    fn not_cancelled() -> watch::Receiver<bool> {
        watch::channel(false).1
    }

    #[tokio::test]
    async fn resends_own_transactions_in_legacy_format() {
        let store: Arc<dyn TransactionStore> =
            Arc::new(PayloadStore::new(InMemoryKvStore::new()));
        let r1 = PublicKey::new([1; 32]);
        let r2 = PublicKey::new([2; 32]);
        stored_payload(store.as_ref(), own_key(), &[r1, r2], b"mine").await;
        // A foreign record must not be replayed.
        stored_payload(store.as_ref(), PublicKey::new([9; 32]), &[r1], b"theirs").await;

        let transport = Arc::new(PushRecorder::default());
        let resolver = MapResolver(HashMap::from([
            (r1, "http://r1".to_string()),
            (r2, "http://r2".to_string()),
        ]));
        let manager = LegacyResendManager::new(
            Arc::clone(&store),
            Arc::clone(&transport),
            Arc::new(resolver),
            [own_key()],
            10,
        );

        let report = manager.resend_all(&not_cancelled()).await.unwrap();
        assert_eq!(report.scanned, 2);
        assert_eq!(report.resent, 2);
        assert_eq!(report.skipped, 1);
        assert_eq!(report.failed, 0);

        let pushes = transport.pushes.lock();
        assert_eq!(pushes.len(), 2);
        // Frames went out in the legacy wire format.
        for (_, frame) in pushes.iter() {
            assert_eq!(
                frame[0],
                CodecVersion::Legacy.wire_byte(),
                "legacy frames must carry the v1 version byte"
            );
        }
    }

    #[tokio::test]
    async fn unresolvable_recipient_is_counted_failed() {
        let store: Arc<dyn TransactionStore> =
            Arc::new(PayloadStore::new(InMemoryKvStore::new()));
        let r1 = PublicKey::new([1; 32]);
        stored_payload(store.as_ref(), own_key(), &[r1], b"mine").await;

        let manager = LegacyResendManager::new(
            Arc::clone(&store),
            Arc::new(PushRecorder::default()),
            Arc::new(MapResolver(HashMap::new())),
            [own_key()],
            10,
        );
        let report = manager.resend_all(&not_cancelled()).await.unwrap();
        assert_eq!(report.failed, 1);
        assert_eq!(report.resent, 0);
    }
}
