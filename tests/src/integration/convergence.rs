//! Recovery convergence: a node with a subset store ends up with exactly
//! its peer's content, even across interruption and dependency gaps.

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use shared_types::{PublicKey, TxHash};
use sr_02_payload_store::{RecordStatus, TransactionStore};
use sr_06_recovery::{
    HashPage, RecoveryConfig, RecoveryManager, RecoveryTransport, RecoveryTransportError,
};
use tokio::sync::watch;

use crate::common::{seed_own_transaction, HubClient, Network};

fn key(byte: u8) -> PublicKey {
    PublicKey::new([byte; 32])
}

fn not_cancelled() -> watch::Receiver<bool> {
    watch::channel(false).1
}

fn config(page_size: usize) -> RecoveryConfig {
    RecoveryConfig {
        page_size,
        max_batch_bytes: 1024 * 1024,
        fetch_timeout: std::time::Duration::from_secs(5),
    }
}

#[tokio::test]
async fn subset_node_converges_to_peer_content() {
    let network = Network::new();
    let source = network.add_node(key(1), "http://a");
    let mut seeded = Vec::new();
    for i in 0u8..7 {
        seeded.push(seed_own_transaction(&source, &[key(2)], &[i], vec![]).await);
    }
    let target = network.add_node(key(2), "http://b");
    // The target already holds a strict subset.
    let existing = seeded[3];
    let frame = source.store.get(&existing).unwrap().unwrap();
    target.store.put(&existing, frame).unwrap();

    let manager = RecoveryManager::new(
        Arc::clone(&target.store),
        Arc::new(HubClient {
            network: Arc::clone(&network),
        }),
        config(3),
    );
    let report = manager
        .run_for_peer(key(1), "http://a", &not_cancelled())
        .await;

    assert!(report.completed, "run failed: {:?}", report.error);
    assert_eq!(report.stored, 6);
    // Exactly the peer's content: no loss, no duplication.
    assert_eq!(target.store.count().unwrap(), source.store.count().unwrap());
    for hash in &seeded {
        assert!(target.store.exists(hash).unwrap());
    }
}

/// Injects one transport failure on a chosen page, then behaves.
struct FlakyOnce {
    inner: HubClient,
    fail_page: u64,
    remaining: Mutex<u32>,
}

#[async_trait]
impl RecoveryTransport for FlakyOnce {
    async fn fetch_hash_page(
        &self,
        uri: &str,
        page: u64,
        page_size: usize,
    ) -> Result<HashPage, RecoveryTransportError> {
        if page == self.fail_page {
            let mut remaining = self.remaining.lock();
            if *remaining > 0 {
                *remaining -= 1;
                return Err(RecoveryTransportError::Unreachable {
                    uri: uri.to_string(),
                    reason: "simulated crash".into(),
                });
            }
        }
        self.inner.fetch_hash_page(uri, page, page_size).await
    }

    async fn fetch_payloads(
        &self,
        uri: &str,
        hashes: &[TxHash],
        max_bytes: usize,
    ) -> Result<Vec<Vec<u8>>, RecoveryTransportError> {
        self.inner.fetch_payloads(uri, hashes, max_bytes).await
    }

    async fn push_payload(
        &self,
        uri: &str,
        frame: &[u8],
    ) -> Result<(), RecoveryTransportError> {
        self.inner.push_payload(uri, frame).await
    }
}

#[tokio::test]
async fn interrupted_run_resumes_without_duplication_or_loss() {
    let network = Network::new();
    let source = network.add_node(key(1), "http://a");
    let mut seeded = Vec::new();
    for i in 0u8..6 {
        seeded.push(seed_own_transaction(&source, &[key(2)], &[i], vec![]).await);
    }
    let target = network.add_node(key(2), "http://b");

    let transport = Arc::new(FlakyOnce {
        inner: HubClient {
            network: Arc::clone(&network),
        },
        fail_page: 1,
        remaining: Mutex::new(1),
    });
    let manager = RecoveryManager::new(Arc::clone(&target.store), transport, config(2));

    let first = manager
        .run_for_peer(key(1), "http://a", &not_cancelled())
        .await;
    assert!(first.failed());
    // The first page committed before the crash.
    assert_eq!(first.stored, 2);
    assert_eq!(
        target.store.cursor(&key(1)).unwrap().map(|c| c.next_page),
        Some(1)
    );

    let second = manager
        .run_for_peer(key(1), "http://a", &not_cancelled())
        .await;
    assert!(second.completed, "resume failed: {:?}", second.error);

    assert_eq!(target.store.count().unwrap(), 6);
    for hash in &seeded {
        assert!(target.store.exists(hash).unwrap());
    }
    // Checkpoint cleared after the completed run.
    assert_eq!(target.store.cursor(&key(1)).unwrap(), None);
}

#[tokio::test]
async fn gated_record_completes_once_its_dependency_is_recovered() {
    let network = Network::new();
    let source = network.add_node(key(1), "http://a");
    let dep_hash = seed_own_transaction(&source, &[key(2)], b"dependency", vec![]).await;
    let child_hash =
        seed_own_transaction(&source, &[key(2)], b"child", vec![dep_hash]).await;

    let target = network.add_node(key(2), "http://b");
    // The child arrives first, by direct push, before its dependency.
    let child_frame = source.store.get(&child_hash).unwrap().unwrap().payload;
    let hub = HubClient {
        network: Arc::clone(&network),
    };
    RecoveryTransport::push_payload(&hub, "http://b", &child_frame)
        .await
        .unwrap();
    assert_eq!(
        target.store.get(&child_hash).unwrap().unwrap().status,
        RecordStatus::AwaitingDependencies
    );

    // Recovery pulls the dependency and reconciles the child.
    let manager = RecoveryManager::new(Arc::clone(&target.store), Arc::new(hub), config(10));
    let report = manager
        .run_for_peer(key(1), "http://a", &not_cancelled())
        .await;
    assert!(report.completed);
    assert!(report.reconciled >= 1);
    assert_eq!(
        target.store.get(&child_hash).unwrap().unwrap().status,
        RecordStatus::Confirmed
    );
}
