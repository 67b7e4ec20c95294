//! Batch recovery service.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use shared_types::{PublicKey, TxHash};
use sr_02_payload_store::{PutOutcome, RecordStatus, StoreError, StoredRecord, TransactionStore};
use sr_03_payload_codec::decode_any;
use tokio::sync::watch;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::domain::state::{ReplayOutcome, RunReport, RunState};
use crate::ports::{RecoveryTransport, RecoveryTransportError};

/// Which recovery workflow a node runs. Selected once from
/// configuration.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecoveryStrategy {
    /// Pull-based paginated batch protocol.
    #[default]
    Batch,
    /// Push-everything legacy protocol for old-format peers.
    Legacy,
}

/// Batch recovery bounds.
#[derive(Clone, Debug)]
pub struct RecoveryConfig {
    /// Hashes per requesting page.
    pub page_size: usize,
    /// Byte budget for one payload batch response.
    pub max_batch_bytes: usize,
    /// Budget for one transport call.
    pub fetch_timeout: Duration,
}

impl Default for RecoveryConfig {
    fn default() -> Self {
        Self {
            page_size: 100,
            max_batch_bytes: 4 * 1024 * 1024,
            fetch_timeout: Duration::from_secs(30),
        }
    }
}

/// Outcome of persisting one fetched frame.
enum FrameOutcome {
    /// Frame persisted (or already present) under this hash.
    Persisted { hash: TxHash, newly_stored: bool },
    /// Frame unusable; skip it and continue the batch.
    Skipped(String),
}

/// Pull-based batch recovery against individual peers.
///
/// Each run walks the peer's hash pages, fetches only missing content,
/// persists it, and checkpoints a cursor after every durably persisted
/// batch. Runs are independent across peers; a failure or hang on one
/// peer cannot stall the others.
pub struct RecoveryManager<R: RecoveryTransport> {
    store: Arc<dyn TransactionStore>,
    transport: Arc<R>,
    config: RecoveryConfig,
}

impl<R: RecoveryTransport> RecoveryManager<R> {
    pub fn new(
        store: Arc<dyn TransactionStore>,
        transport: Arc<R>,
        config: RecoveryConfig,
    ) -> Self {
        Self {
            store,
            transport,
            config,
        }
    }

    /// Runs recovery against every peer concurrently, one independent run
    /// each. Reports are returned in input order.
    pub async fn run_all(
        &self,
        peers: &[(PublicKey, String)],
        cancel: &watch::Receiver<bool>,
    ) -> Vec<RunReport> {
        join_all(
            peers
                .iter()
                .map(|(key, uri)| self.run_for_peer(*key, uri, cancel)),
        )
        .await
    }

    /// One recovery run against one peer.
    ///
    /// Never returns an error: failures land in the report with
    /// `RunState::Failed` and are retried by the scheduler next cycle,
    /// resuming from the last committed cursor. Cancellation stops new
    /// fetches between batches; an in-flight batch always commits or
    /// aborts whole.
    pub async fn run_for_peer(
        &self,
        peer: PublicKey,
        uri: &str,
        cancel: &watch::Receiver<bool>,
    ) -> RunReport {
        let mut report = RunReport::new(peer);

        let mut cursor = match self.store.cursor(&peer) {
            Ok(cursor) => cursor.unwrap_or_default(),
            Err(e) => return report.fail(e.to_string()),
        };
        if cursor.next_page > 0 {
            info!(?peer, page = cursor.next_page, "resuming recovery from committed cursor");
        }

        loop {
            if *cancel.borrow() {
                info!(?peer, "recovery cancelled; cursor stays committed");
                report.state = RunState::Idle;
                return report;
            }

            report.state = RunState::Requesting;
            let page = match timeout(
                self.config.fetch_timeout,
                self.transport
                    .fetch_hash_page(uri, cursor.next_page, self.config.page_size),
            )
            .await
            {
                Ok(Ok(page)) => page,
                Ok(Err(e)) => return report.fail(e.to_string()),
                Err(_) => {
                    return report.fail(RecoveryTransportError::Timeout {
                        uri: uri.to_string(),
                    }
                    .to_string())
                }
            };
            report.pages += 1;

            let missing = match self.store.list_missing(&page.hashes) {
                Ok(missing) => missing,
                Err(e) => return report.fail(e.to_string()),
            };
            for hash in &missing {
                report.outcomes.insert(*hash, ReplayOutcome::Pending);
            }

            if !missing.is_empty() {
                report.state = RunState::Replaying;
                if let Err(failure) = self.replay_batch(uri, missing, &mut report).await {
                    return report.fail(failure);
                }
            }

            // The whole batch is durably persisted; only now does the
            // cursor move.
            cursor = cursor.advanced();
            if let Err(e) = self.store.save_cursor(&peer, cursor) {
                return report.fail(e.to_string());
            }

            if !page.has_more {
                break;
            }
        }

        report.state = RunState::Reconciling;
        match self.reconcile() {
            Ok(reconciled) => report.reconciled = reconciled,
            Err(e) => return report.fail(e.to_string()),
        }

        // A finished run clears its checkpoint: the next scheduled cycle
        // re-walks from page zero and picks up anything skipped here.
        if let Err(e) = self.store.clear_cursor(&peer) {
            return report.fail(e.to_string());
        }

        report.state = RunState::Idle;
        report.completed = true;
        info!(
            ?peer,
            pages = report.pages,
            stored = report.stored,
            reconciled = report.reconciled,
            "recovery run complete"
        );
        report
    }

    /// Fetches and persists one page's missing payloads, re-requesting
    /// hashes the byte budget pushed out of earlier responses.
    async fn replay_batch(
        &self,
        uri: &str,
        missing: Vec<TxHash>,
        report: &mut RunReport,
    ) -> Result<(), String> {
        let mut remaining = missing;
        while !remaining.is_empty() {
            let frames = match timeout(
                self.config.fetch_timeout,
                self.transport
                    .fetch_payloads(uri, &remaining, self.config.max_batch_bytes),
            )
            .await
            {
                Ok(Ok(frames)) => frames,
                Ok(Err(e)) => return Err(e.to_string()),
                Err(_) => {
                    return Err(RecoveryTransportError::Timeout {
                        uri: uri.to_string(),
                    }
                    .to_string())
                }
            };

            if frames.is_empty() {
                // Peer returned nothing for hashes it advertised; mark
                // them failed for this run rather than spinning.
                warn!(uri, count = remaining.len(), "peer returned no frames for missing hashes");
                for hash in &remaining {
                    report.outcomes.insert(*hash, ReplayOutcome::Failed);
                }
                return Ok(());
            }

            let total: usize = frames.iter().map(Vec::len).sum();
            if total > self.config.max_batch_bytes {
                return Err(format!(
                    "peer {uri} exceeded batch byte budget ({total} > {})",
                    self.config.max_batch_bytes
                ));
            }

            let mut delivered: HashSet<TxHash> = HashSet::new();
            for frame in &frames {
                match self.persist_frame(frame) {
                    Ok(FrameOutcome::Persisted { hash, newly_stored }) => {
                        delivered.insert(hash);
                        report.outcomes.insert(hash, ReplayOutcome::Delivered);
                        if newly_stored {
                            report.stored += 1;
                        }
                    }
                    Ok(FrameOutcome::Skipped(reason)) => {
                        warn!(uri, "skipping unusable recovered frame: {reason}");
                    }
                    // A backend write failure poisons the whole run; the
                    // committed cursor makes the retry cheap.
                    Err(e) => return Err(e.to_string()),
                }
            }

            let before = remaining.len();
            remaining.retain(|hash| !delivered.contains(hash));
            if remaining.len() == before {
                // No progress: everything left is undecodable or the peer
                // keeps omitting it. Mark failed and move on.
                for hash in &remaining {
                    report.outcomes.insert(*hash, ReplayOutcome::Failed);
                }
                return Ok(());
            }
        }
        Ok(())
    }

    /// Persists one fetched frame, gating it on its declared dependencies.
    fn persist_frame(&self, frame: &[u8]) -> Result<FrameOutcome, StoreError> {
        let (version, payload) = match decode_any(frame) {
            Ok(decoded) => decoded,
            Err(e) => return Ok(FrameOutcome::Skipped(e.to_string())),
        };
        let hash = payload.tx_hash();

        let mut deps_present = true;
        for dependency in payload.affected_transactions() {
            if !self.store.exists(dependency)? {
                deps_present = false;
                break;
            }
        }
        let status = if deps_present {
            RecordStatus::Confirmed
        } else {
            debug!(%hash, "recovered record gated on missing dependencies");
            RecordStatus::AwaitingDependencies
        };

        let record = StoredRecord::new(frame.to_vec(), version.wire_byte()).with_status(status);
        match self.store.put(&hash, record) {
            Ok(outcome) => Ok(FrameOutcome::Persisted {
                hash,
                newly_stored: outcome == PutOutcome::Stored,
            }),
            Err(StoreError::ContentMismatch(hash)) => Ok(FrameOutcome::Skipped(format!(
                "content mismatch for {hash}"
            ))),
            Err(e) => Err(e),
        }
    }

    /// Completes gated records whose dependencies have landed, repeating
    /// until a pass makes no progress so dependency chains resolve.
    fn reconcile(&self) -> Result<u64, StoreError> {
        let mut total = 0u64;
        loop {
            let gated = self.store.awaiting_dependencies()?;
            let mut progressed = 0u64;
            for hash in gated {
                let Some(record) = self.store.get(&hash)? else {
                    continue;
                };
                let Ok((_, payload)) = decode_any(&record.payload) else {
                    warn!(%hash, "gated record no longer decodes; leaving as-is");
                    continue;
                };
                let mut complete = true;
                for dependency in payload.affected_transactions() {
                    if !self.store.exists(dependency)? {
                        complete = false;
                        break;
                    }
                }
                if complete {
                    self.store.set_status(&hash, RecordStatus::Confirmed)?;
                    progressed += 1;
                }
            }
            total += progressed;
            if progressed == 0 {
                return Ok(total);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::HashPage;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use sr_02_payload_store::{InMemoryKvStore, PayloadStore};
    use sr_03_payload_codec::test_utils::MockEnclave;
    use sr_03_payload_codec::{EnclaveGateway, EncodedPayload, PayloadCodec, StandardCodec};

    fn peer_key() -> PublicKey {
        PublicKey::new([0xEE; 32])
    }

    async fn frame_for(tx: &[u8], affected: Vec<TxHash>) -> (TxHash, Vec<u8>) {
        let sender = PublicKey::new([1; 32]);
        let recipient = PublicKey::new([2; 32]);
        let sealed = MockEnclave.seal(tx, &sender, &[recipient]).await.unwrap();
        let payload = EncodedPayload::new(sender, sealed.cipher_text, sealed.nonce)
            .with_recipients(vec![recipient], sealed.recipient_boxes)
            .with_affected_transactions(affected);
        let hash = payload.tx_hash();
        (hash, StandardCodec.encode(&payload).unwrap())
    }

    /// A peer whose store is a fixed list of frames, served in pages.
    #[derive(Default)]
    struct RemotePeer {
        frames: Vec<(TxHash, Vec<u8>)>,
        /// Pages that fail with a transport error on their first N hits.
        page_failures: Mutex<std::collections::HashMap<u64, u32>>,
        payload_calls: Mutex<u32>,
    }

    impl RemotePeer {
        fn with_frames(frames: Vec<(TxHash, Vec<u8>)>) -> Self {
            Self {
                frames,
                ..Default::default()
            }
        }

        fn failing_page(self, page: u64, times: u32) -> Self {
            self.page_failures.lock().insert(page, times);
            self
        }
    }

    #[async_trait]
    impl RecoveryTransport for RemotePeer {
        async fn fetch_hash_page(
            &self,
            uri: &str,
            page: u64,
            page_size: usize,
        ) -> Result<HashPage, RecoveryTransportError> {
            if let Some(remaining) = self.page_failures.lock().get_mut(&page) {
                if *remaining > 0 {
                    *remaining -= 1;
                    return Err(RecoveryTransportError::Unreachable {
                        uri: uri.to_string(),
                        reason: "connection reset".into(),
                    });
                }
            }
            let start = page as usize * page_size;
            let hashes: Vec<TxHash> = self
                .frames
                .iter()
                .skip(start)
                .take(page_size)
                .map(|(h, _)| *h)
                .collect();
            let has_more = start + hashes.len() < self.frames.len();
            Ok(HashPage { hashes, has_more })
        }

        async fn fetch_payloads(
            &self,
            _uri: &str,
            hashes: &[TxHash],
            max_bytes: usize,
        ) -> Result<Vec<Vec<u8>>, RecoveryTransportError> {
            *self.payload_calls.lock() += 1;
            let mut out = Vec::new();
            let mut used = 0usize;
            for hash in hashes {
                if let Some((_, frame)) = self.frames.iter().find(|(h, _)| h == hash) {
                    if used + frame.len() > max_bytes && !out.is_empty() {
                        break;
                    }
                    used += frame.len();
                    out.push(frame.clone());
                }
            }
            Ok(out)
        }

        async fn push_payload(
            &self,
            _uri: &str,
            _frame: &[u8],
        ) -> Result<(), RecoveryTransportError> {
            Ok(())
        }
    }

    fn local_store() -> Arc<dyn TransactionStore> {
        Arc::new(PayloadStore::new(InMemoryKvStore::new()))
    }

    fn small_config(page_size: usize) -> RecoveryConfig {
        RecoveryConfig {
            page_size,
            max_batch_bytes: 64 * 1024,
            fetch_timeout: Duration::from_secs(5),
        }
    }

    fn not_cancelled() -> watch::Receiver<bool> {
        watch::channel(false).1
    }

    #[tokio::test]
    async fn run_converges_local_store_to_remote_content() {
        let mut frames = Vec::new();
        for i in 0u8..5 {
            frames.push(frame_for(&[i], vec![]).await);
        }
        let store = local_store();
        // Local already holds one of them.
        let (hash, frame) = frames[2].clone();
        store
            .put(&hash, StoredRecord::new(frame, 2))
            .unwrap();

        let manager = RecoveryManager::new(
            Arc::clone(&store),
            Arc::new(RemotePeer::with_frames(frames.clone())),
            small_config(2),
        );
        let report = manager
            .run_for_peer(peer_key(), "http://peer", &not_cancelled())
            .await;

        assert!(report.completed, "run should complete: {:?}", report.error);
        assert_eq!(report.stored, 4);
        assert_eq!(store.count().unwrap(), 5);
        for (hash, _) in &frames {
            assert!(store.exists(hash).unwrap());
        }
        // Re-running is a no-op: everything already present.
        let again = manager
            .run_for_peer(peer_key(), "http://peer", &not_cancelled())
            .await;
        assert!(again.completed);
        assert_eq!(again.stored, 0);
        assert_eq!(store.count().unwrap(), 5);
    }

    #[tokio::test]
    async fn interrupted_run_resumes_from_committed_cursor() {
        let mut frames = Vec::new();
        for i in 0u8..4 {
            frames.push(frame_for(&[i], vec![]).await);
        }
        let store = local_store();
        // Page 1 fails once: first run commits page 0 then fails.
        let remote = RemotePeer::with_frames(frames.clone()).failing_page(1, 1);
        let manager = RecoveryManager::new(Arc::clone(&store), Arc::new(remote), small_config(2));

        let first = manager
            .run_for_peer(peer_key(), "http://peer", &not_cancelled())
            .await;
        assert!(first.failed());
        assert_eq!(first.stored, 2);
        assert_eq!(
            store.cursor(&peer_key()).unwrap().map(|c| c.next_page),
            Some(1)
        );

        let second = manager
            .run_for_peer(peer_key(), "http://peer", &not_cancelled())
            .await;
        assert!(second.completed);
        // Only the second page was replayed; nothing duplicated.
        assert_eq!(second.stored, 2);
        assert_eq!(store.count().unwrap(), 4);
        assert_eq!(store.cursor(&peer_key()).unwrap(), None);
    }

    #[tokio::test]
    async fn cancellation_stops_before_the_next_batch() {
        let frames = vec![frame_for(b"a", vec![]).await];
        let store = local_store();
        let manager = RecoveryManager::new(
            Arc::clone(&store),
            Arc::new(RemotePeer::with_frames(frames)),
            small_config(2),
        );
        let (_tx, rx) = {
            let (tx, rx) = watch::channel(true);
            (tx, rx)
        };
        let report = manager.run_for_peer(peer_key(), "http://peer", &rx).await;
        assert!(!report.completed);
        assert!(!report.failed());
        assert_eq!(store.count().unwrap(), 0);
    }

    #[tokio::test]
    async fn dependency_arriving_later_is_reconciled() {
        // Dependent is served on page 0, its dependency on page 1.
        let (dep_hash, dep_frame) = frame_for(b"dependency", vec![]).await;
        let (child_hash, child_frame) = frame_for(b"child", vec![dep_hash]).await;
        let frames = vec![(child_hash, child_frame), (dep_hash, dep_frame)];

        let store = local_store();
        let manager = RecoveryManager::new(
            Arc::clone(&store),
            Arc::new(RemotePeer::with_frames(frames)),
            small_config(1),
        );
        let report = manager
            .run_for_peer(peer_key(), "http://peer", &not_cancelled())
            .await;

        assert!(report.completed);
        assert_eq!(report.reconciled, 1);
        assert_eq!(
            store.get(&child_hash).unwrap().unwrap().status,
            RecordStatus::Confirmed
        );
    }

    #[tokio::test]
    async fn byte_budget_splits_payload_fetches() {
        let mut frames = Vec::new();
        for i in 0u8..4 {
            frames.push(frame_for(&[i; 100], vec![]).await);
        }
        let frame_len = frames[0].1.len();
        let store = local_store();
        let remote = Arc::new(RemotePeer::with_frames(frames));
        let config = RecoveryConfig {
            page_size: 4,
            // Budget fits two frames per response.
            max_batch_bytes: frame_len * 2 + 1,
            fetch_timeout: Duration::from_secs(5),
        };
        let manager = RecoveryManager::new(Arc::clone(&store), Arc::clone(&remote), config);

        let report = manager
            .run_for_peer(peer_key(), "http://peer", &not_cancelled())
            .await;
        assert!(report.completed);
        assert_eq!(report.stored, 4);
        assert_eq!(*remote.payload_calls.lock(), 2);
    }

    #[tokio::test]
    async fn one_failing_peer_does_not_block_the_others() {
        let frames = vec![frame_for(b"x", vec![]).await];
        let store = local_store();
        let good_and_bad = RemotePeer::with_frames(frames).failing_page(0, u32::MAX);
        // Same transport serves both URIs; the failing page only trips on
        // page 0, so make the "good" peer a second manager instead.
        let bad_manager =
            RecoveryManager::new(Arc::clone(&store), Arc::new(good_and_bad), small_config(2));
        let bad = bad_manager
            .run_for_peer(peer_key(), "http://bad", &not_cancelled())
            .await;
        assert!(bad.failed());

        let good_frames = vec![frame_for(b"y", vec![]).await];
        let good_manager = RecoveryManager::new(
            Arc::clone(&store),
            Arc::new(RemotePeer::with_frames(good_frames)),
            small_config(2),
        );
        let good = good_manager
            .run_for_peer(PublicKey::new([0xDD; 32]), "http://good", &not_cancelled())
            .await;
        assert!(good.completed);
        assert_eq!(store.count().unwrap(), 1);
    }
}
