//! Bridges the peer directory service onto the narrow directory ports the
//! other subsystems consume.

use std::sync::Arc;

use async_trait::async_trait;
use shared_types::PublicKey;
use sr_01_peer_directory::PeerDirectoryService;
use sr_04_payload_publisher::EndpointDirectory;
use sr_05_transaction_manager::PeerObserver;
use sr_06_recovery::RecipientResolver;

use crate::adapters::RestP2pClient;

/// Shared handle every consumer of the directory gets.
#[derive(Clone)]
pub struct DirectoryAdapter {
    inner: Arc<PeerDirectoryService<RestP2pClient>>,
}

impl DirectoryAdapter {
    pub fn new(inner: Arc<PeerDirectoryService<RestP2pClient>>) -> Self {
        Self { inner }
    }

    pub fn service(&self) -> &PeerDirectoryService<RestP2pClient> {
        &self.inner
    }
}

#[async_trait]
impl EndpointDirectory for DirectoryAdapter {
    fn resolve(&self, key: &PublicKey) -> Option<String> {
        self.inner.resolve(key)
    }

    async fn refresh(&self) {
        self.inner.refresh().await;
    }

    fn mark_unreachable(&self, key: &PublicKey) {
        self.inner.mark_unreachable(key);
    }

    fn mark_active(&self, key: &PublicKey) {
        self.inner.mark_active(key);
    }
}

impl PeerObserver for DirectoryAdapter {
    fn on_observed_peer(&self, key: PublicKey, uri: &str) {
        self.inner.on_observed_peer(key, uri);
    }
}

impl RecipientResolver for DirectoryAdapter {
    fn resolve(&self, key: &PublicKey) -> Option<String> {
        self.inner.resolve(key)
    }
}
