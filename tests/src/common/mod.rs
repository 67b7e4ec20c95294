//! In-process network hub and node fixtures.
//!
//! The hub stands in for the wire: every node registers its store under
//! its endpoint URI, and the [`HubClient`] implements the outbound ports
//! (payload push, party info, recovery batches) by operating directly on
//! the target node's store, the same way the real inbound surface would.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use shared_types::{PublicKey, TxHash};
use sr_01_peer_directory::{DirectoryError, PartyInfoClient, PartyInfoResponse, PeerEntry};
use sr_02_payload_store::{
    InMemoryKvStore, PayloadStore, RecordStatus, StoredRecord, TransactionStore,
};
use sr_03_payload_codec::test_utils::MockEnclave;
use sr_03_payload_codec::{
    decode_any, EncodePayloadRequest, EncodedPayload, EncodedPayloadManager, PayloadCodec,
    StandardCodec,
};
use sr_04_payload_publisher::{
    EndpointDirectory, PayloadPublisher, PayloadTransport, PublisherConfig, RetryPolicy,
    TransportError,
};
use sr_05_transaction_manager::ports::NoopPeerObserver;
use sr_05_transaction_manager::TransactionManager;
use sr_06_recovery::{HashPage, RecoveryTransport, RecoveryTransportError};

/// One simulated node on the hub.
pub struct NodeState {
    pub key: PublicKey,
    pub uri: String,
    pub store: Arc<dyn TransactionStore>,
    /// Peer bindings this node discloses during party-info exchanges.
    pub reports: Vec<PeerEntry>,
}

/// The simulated network.
#[derive(Default)]
pub struct Network {
    nodes: Mutex<HashMap<String, Arc<NodeState>>>,
}

impl Network {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn add_node(&self, key: PublicKey, uri: &str) -> Arc<NodeState> {
        self.add_node_reporting(key, uri, Vec::new())
    }

    pub fn add_node_reporting(
        &self,
        key: PublicKey,
        uri: &str,
        reports: Vec<PeerEntry>,
    ) -> Arc<NodeState> {
        let state = Arc::new(NodeState {
            key,
            uri: uri.to_string(),
            store: Arc::new(PayloadStore::new(InMemoryKvStore::new())),
            reports,
        });
        self.nodes.lock().insert(uri.to_string(), Arc::clone(&state));
        state
    }

    pub fn node(&self, uri: &str) -> Option<Arc<NodeState>> {
        self.nodes.lock().get(uri).cloned()
    }

    /// Inbound push handling: decode, gate on dependencies, persist.
    fn deliver(&self, uri: &str, frame: &[u8]) -> Result<(), String> {
        let Some(node) = self.node(uri) else {
            return Err(format!("no node at {uri}"));
        };
        let (version, payload) = decode_any(frame).map_err(|e| e.to_string())?;
        let hash = payload.tx_hash();

        let mut deps_present = true;
        for dependency in payload.affected_transactions() {
            if !node.store.exists(dependency).map_err(|e| e.to_string())? {
                deps_present = false;
                break;
            }
        }
        let status = if deps_present {
            RecordStatus::Confirmed
        } else {
            RecordStatus::AwaitingDependencies
        };
        node.store
            .put(
                &hash,
                StoredRecord::new(frame.to_vec(), version.wire_byte()).with_status(status),
            )
            .map_err(|e| e.to_string())?;
        Ok(())
    }
}

/// Outbound client backed by the hub.
#[derive(Clone)]
pub struct HubClient {
    pub network: Arc<Network>,
}

#[async_trait]
impl PayloadTransport for HubClient {
    async fn push_payload(&self, uri: &str, frame: &[u8]) -> Result<(), TransportError> {
        self.network
            .deliver(uri, frame)
            .map_err(|reason| TransportError::Unreachable {
                uri: uri.to_string(),
                reason,
            })
    }
}

#[async_trait]
impl RecoveryTransport for HubClient {
    async fn fetch_hash_page(
        &self,
        uri: &str,
        page: u64,
        page_size: usize,
    ) -> Result<HashPage, RecoveryTransportError> {
        let node = self
            .network
            .node(uri)
            .ok_or_else(|| RecoveryTransportError::Unreachable {
                uri: uri.to_string(),
                reason: "no such node".into(),
            })?;
        let offset = page * page_size as u64;
        let hashes = node
            .store
            .hashes_page(offset, page_size)
            .map_err(|e| RecoveryTransportError::Protocol {
                uri: uri.to_string(),
                reason: e.to_string(),
            })?;
        let count = node.store.count().map_err(|e| RecoveryTransportError::Protocol {
            uri: uri.to_string(),
            reason: e.to_string(),
        })?;
        Ok(HashPage {
            has_more: offset + (hashes.len() as u64) < count,
            hashes,
        })
    }

    async fn fetch_payloads(
        &self,
        uri: &str,
        hashes: &[TxHash],
        max_bytes: usize,
    ) -> Result<Vec<Vec<u8>>, RecoveryTransportError> {
        let node = self
            .network
            .node(uri)
            .ok_or_else(|| RecoveryTransportError::Unreachable {
                uri: uri.to_string(),
                reason: "no such node".into(),
            })?;
        let mut frames = Vec::new();
        let mut used = 0usize;
        for hash in hashes {
            let record = node
                .store
                .get(hash)
                .map_err(|e| RecoveryTransportError::Protocol {
                    uri: uri.to_string(),
                    reason: e.to_string(),
                })?;
            if let Some(record) = record {
                if used + record.payload.len() > max_bytes && !frames.is_empty() {
                    break;
                }
                used += record.payload.len();
                frames.push(record.payload);
            }
        }
        Ok(frames)
    }

    async fn push_payload(
        &self,
        uri: &str,
        frame: &[u8],
    ) -> Result<(), RecoveryTransportError> {
        self.network
            .deliver(uri, frame)
            .map_err(|reason| RecoveryTransportError::Unreachable {
                uri: uri.to_string(),
                reason,
            })
    }
}

#[async_trait]
impl PartyInfoClient for HubClient {
    async fn party_info(&self, uri: &str) -> Result<PartyInfoResponse, DirectoryError> {
        let node = self
            .network
            .node(uri)
            .ok_or_else(|| DirectoryError::Transport {
                uri: uri.to_string(),
                reason: "connection refused".into(),
            })?;
        Ok(PartyInfoResponse {
            sender: Some(PeerEntry {
                key: node.key,
                uri: node.uri.clone(),
            }),
            known: node.reports.clone(),
        })
    }
}

/// Fixed key→endpoint table for publisher wiring in tests.
#[derive(Default)]
pub struct StaticEndpoints {
    map: HashMap<PublicKey, String>,
}

impl StaticEndpoints {
    pub fn new(entries: &[(PublicKey, &str)]) -> Self {
        Self {
            map: entries
                .iter()
                .map(|(key, uri)| (*key, uri.to_string()))
                .collect(),
        }
    }
}

#[async_trait]
impl EndpointDirectory for StaticEndpoints {
    fn resolve(&self, key: &PublicKey) -> Option<String> {
        self.map.get(key).cloned()
    }

    async fn refresh(&self) {}

    fn mark_unreachable(&self, _key: &PublicKey) {}

    fn mark_active(&self, _key: &PublicKey) {}
}

/// A node with the full submission stack wired over the hub.
pub struct TestNode {
    pub state: Arc<NodeState>,
    pub manager: TransactionManager<MockEnclave, HubClient, StaticEndpoints>,
}

/// Fast retry settings so failure-path tests stay quick.
pub fn fast_publisher_config() -> PublisherConfig {
    PublisherConfig {
        retry: RetryPolicy {
            max_attempts: 2,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(2),
            call_timeout: Duration::from_secs(1),
        },
        on_demand_refresh: false,
    }
}

pub fn test_node(
    network: &Arc<Network>,
    key: PublicKey,
    uri: &str,
    endpoints: &[(PublicKey, &str)],
) -> TestNode {
    let state = network.add_node(key, uri);
    let encoder = Arc::new(EncodedPayloadManager::new(
        Arc::new(MockEnclave),
        [key],
        vec![],
        true,
    ));
    let codec: Arc<dyn PayloadCodec> = Arc::new(StandardCodec);
    let publisher = Arc::new(PayloadPublisher::new(
        Arc::new(HubClient {
            network: Arc::clone(network),
        }),
        Arc::new(StaticEndpoints::new(endpoints)),
        Arc::clone(&codec),
        fast_publisher_config(),
    ));
    let manager = TransactionManager::new(
        encoder,
        Arc::clone(&state.store),
        publisher,
        codec,
        Arc::new(NoopPeerObserver),
    );
    TestNode { state, manager }
}

/// Seeds `node`'s store with an encrypted transaction it sent itself.
pub async fn seed_own_transaction(
    node: &NodeState,
    recipients: &[PublicKey],
    tx: &[u8],
    affected: Vec<TxHash>,
) -> TxHash {
    let encoder = EncodedPayloadManager::new(Arc::new(MockEnclave), [node.key], vec![], true);
    let mut request = EncodePayloadRequest::standard(tx.to_vec(), node.key, recipients.to_vec());
    request.affected_transactions = affected;
    let payload: EncodedPayload = encoder.encode(request).await.unwrap();
    let hash = payload.tx_hash();
    let frame = StandardCodec.encode(&payload).unwrap();
    node.store.put(&hash, StoredRecord::new(frame, 2)).unwrap();
    hash
}
