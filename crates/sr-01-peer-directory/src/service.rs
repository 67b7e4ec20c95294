//! Peer directory service.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use shared_types::PublicKey;
use tracing::{debug, info, warn};

use crate::domain::entities::{Liveness, PeerRecord, RefreshOutcome};
use crate::ports::{PartyInfoClient, PartyInfoResponse, PeerEntry, TimeSource};

/// Directory behavior knobs, fixed at construction from the runtime
/// context.
#[derive(Clone, Debug)]
pub struct PeerDirectoryConfig {
    /// Skip gossip expansion; only seed endpoints are ever contacted.
    pub disable_peer_discovery: bool,
    /// Only peers whose endpoint is in the seed list resolve.
    pub use_white_list: bool,
    /// Per-endpoint budget for one party-info exchange.
    pub refresh_timeout: Duration,
}

impl Default for PeerDirectoryConfig {
    fn default() -> Self {
        Self {
            disable_peer_discovery: false,
            use_white_list: false,
            refresh_timeout: Duration::from_secs(15),
        }
    }
}

/// Live peer registry.
///
/// The table is owned here and mutated only through this service's
/// methods; publishers and recovery read through [`resolve`] and
/// [`snapshot`].
///
/// [`resolve`]: PeerDirectoryService::resolve
/// [`snapshot`]: PeerDirectoryService::snapshot
pub struct PeerDirectoryService<C: PartyInfoClient> {
    config: PeerDirectoryConfig,
    seed_uris: Vec<String>,
    seed_set: HashSet<String>,
    table: RwLock<HashMap<PublicKey, PeerRecord>>,
    client: Arc<C>,
    time: Arc<dyn TimeSource>,
}

impl<C: PartyInfoClient> PeerDirectoryService<C> {
    pub fn new(
        config: PeerDirectoryConfig,
        seed_uris: Vec<String>,
        client: Arc<C>,
        time: Arc<dyn TimeSource>,
    ) -> Self {
        let seed_set = seed_uris.iter().cloned().collect();
        Self {
            config,
            seed_uris,
            seed_set,
            table: RwLock::new(HashMap::new()),
            client,
            time,
        }
    }

    /// Last-known endpoint for a key.
    ///
    /// Unreachable peers still resolve (their endpoint is the best lead
    /// recovery has). With the whitelist enabled, dynamically discovered
    /// endpoints outside the seed list never resolve.
    pub fn resolve(&self, key: &PublicKey) -> Option<String> {
        let table = self.table.read();
        let record = table.get(key)?;
        if self.config.use_white_list && !self.seed_set.contains(&record.uri) {
            debug!(?key, uri = %record.uri, "resolve blocked by whitelist");
            return None;
        }
        Some(record.uri.clone())
    }

    /// Records a sender binding observed on an inbound payload.
    pub fn on_observed_peer(&self, key: PublicKey, uri: &str) {
        let now = self.time.now();
        let mut table = self.table.write();
        let record = table
            .entry(key)
            .or_insert_with(|| PeerRecord::new(key, uri));
        record.uri = uri.to_string();
        record.last_contact = now;
        record.liveness = Liveness::Active;
    }

    /// Demotes a peer after delivery retries were exhausted. The record
    /// is kept; only its liveness changes.
    pub fn mark_unreachable(&self, key: &PublicKey) {
        if let Some(record) = self.table.write().get_mut(key) {
            if record.liveness != Liveness::Unreachable {
                warn!(?key, uri = %record.uri, "peer marked unreachable");
            }
            record.liveness = Liveness::Unreachable;
        }
    }

    /// Restores a peer on successful contact.
    pub fn mark_active(&self, key: &PublicKey) {
        let now = self.time.now();
        if let Some(record) = self.table.write().get_mut(key) {
            record.liveness = Liveness::Active;
            record.last_contact = now;
        }
    }

    /// Copy of the current table, for recovery to enumerate peers.
    pub fn snapshot(&self) -> Vec<PeerRecord> {
        let mut records: Vec<_> = self.table.read().values().cloned().collect();
        records.sort_by(|a, b| a.key.cmp(&b.key));
        records
    }

    /// Re-derives the peer table.
    ///
    /// Starts from the seed endpoints plus every endpoint already on
    /// record. Each is asked for its party info; unless discovery is
    /// disabled, bindings it reports are merged and their endpoints are
    /// queried too (gossip expansion). A visited set caps the pass so
    /// cyclic topologies terminate.
    pub async fn refresh(&self) -> RefreshOutcome {
        let mut outcome = RefreshOutcome::default();
        let mut visited: HashSet<String> = HashSet::new();
        let mut frontier: VecDeque<String> = self.seed_uris.iter().cloned().collect();
        if !self.config.disable_peer_discovery {
            for record in self.table.read().values() {
                frontier.push_back(record.uri.clone());
            }
        }

        while let Some(uri) = frontier.pop_front() {
            if !visited.insert(uri.clone()) {
                continue;
            }
            match self.exchange(&uri).await {
                Ok(response) => {
                    outcome.contacted += 1;
                    if let Some(sender) = response.sender {
                        outcome.discovered += self.upsert_contacted(&sender);
                    }
                    if !self.config.disable_peer_discovery {
                        for entry in response.known {
                            frontier.push_back(entry.uri.clone());
                            outcome.discovered += self.upsert_reported(&entry);
                        }
                    }
                }
                Err(e) => {
                    outcome.failed += 1;
                    warn!(uri = %uri, "party info exchange failed: {e}");
                    self.mark_unreachable_by_uri(&uri);
                }
            }
        }

        info!(
            contacted = outcome.contacted,
            failed = outcome.failed,
            discovered = outcome.discovered,
            "peer directory refresh complete"
        );
        outcome
    }

    async fn exchange(&self, uri: &str) -> Result<PartyInfoResponse, crate::DirectoryError> {
        let timeout = self.config.refresh_timeout;
        tokio::time::timeout(timeout, self.client.party_info(uri))
            .await
            .map_err(|_| crate::DirectoryError::Timeout {
                uri: uri.to_string(),
                timeout_ms: timeout.as_millis() as u64,
            })?
    }

    /// Upsert from a direct exchange with the peer itself.
    fn upsert_contacted(&self, entry: &PeerEntry) -> usize {
        let now = self.time.now();
        let mut table = self.table.write();
        let inserted = !table.contains_key(&entry.key);
        let record = table
            .entry(entry.key)
            .or_insert_with(|| PeerRecord::new(entry.key, &entry.uri));
        record.uri = entry.uri.clone();
        record.last_contact = now;
        record.liveness = Liveness::Active;
        usize::from(inserted)
    }

    /// Upsert from a third-party report: endpoint is recorded but the
    /// peer is not marked contacted.
    fn upsert_reported(&self, entry: &PeerEntry) -> usize {
        let mut table = self.table.write();
        if let Some(record) = table.get_mut(&entry.key) {
            record.uri = entry.uri.clone();
            0
        } else {
            table.insert(entry.key, PeerRecord::new(entry.key, &entry.uri));
            1
        }
    }

    fn mark_unreachable_by_uri(&self, uri: &str) {
        let mut table = self.table.write();
        for record in table.values_mut().filter(|r| r.uri == uri) {
            record.liveness = Liveness::Unreachable;
        }
    }
}
