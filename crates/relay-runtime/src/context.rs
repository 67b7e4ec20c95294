//! Process-wide runtime context.

use std::collections::BTreeSet;
use std::sync::Arc;

use anyhow::{bail, Result};
use shared_types::PublicKey;

use crate::adapters::RestP2pClient;

/// Immutable snapshot of everything startup decided: node identity, the
/// default broadcast set, seed peers, feature flags, and the shared
/// outbound P2P client.
///
/// Built exactly once by [`RuntimeContextBuilder`] and then handed by
/// reference into each component's constructor; there is no global to
/// reach for, and nothing here can change after construction. All list
/// inputs are copied at build time so no caller-held collection can
/// mutate the snapshot afterwards.
#[derive(Clone)]
pub struct RuntimeContext {
    keys: BTreeSet<PublicKey>,
    always_send_to: Vec<PublicKey>,
    peers: Vec<String>,
    p2p_client: Arc<RestP2pClient>,
    p2p_server_uri: String,
    remote_key_validation: bool,
    enhanced_privacy: bool,
    disable_peer_discovery: bool,
    use_white_list: bool,
    recovery_mode: bool,
}

impl RuntimeContext {
    /// This node's own public keys.
    pub fn keys(&self) -> impl Iterator<Item = &PublicKey> {
        self.keys.iter()
    }

    pub fn is_own_key(&self, key: &PublicKey) -> bool {
        self.keys.contains(key)
    }

    pub fn always_send_to(&self) -> &[PublicKey] {
        &self.always_send_to
    }

    pub fn peers(&self) -> &[String] {
        &self.peers
    }

    pub fn p2p_client(&self) -> Arc<RestP2pClient> {
        Arc::clone(&self.p2p_client)
    }

    pub fn p2p_server_uri(&self) -> &str {
        &self.p2p_server_uri
    }

    pub fn remote_key_validation(&self) -> bool {
        self.remote_key_validation
    }

    pub fn enhanced_privacy(&self) -> bool {
        self.enhanced_privacy
    }

    pub fn disable_peer_discovery(&self) -> bool {
        self.disable_peer_discovery
    }

    pub fn use_white_list(&self) -> bool {
        self.use_white_list
    }

    pub fn recovery_mode(&self) -> bool {
        self.recovery_mode
    }
}

impl std::fmt::Debug for RuntimeContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RuntimeContext")
            .field("keys", &self.keys.len())
            .field("always_send_to", &self.always_send_to.len())
            .field("peers", &self.peers)
            .field("p2p_server_uri", &self.p2p_server_uri)
            .field("remote_key_validation", &self.remote_key_validation)
            .field("enhanced_privacy", &self.enhanced_privacy)
            .field("disable_peer_discovery", &self.disable_peer_discovery)
            .field("use_white_list", &self.use_white_list)
            .field("recovery_mode", &self.recovery_mode)
            .finish()
    }
}

/// Builder used exactly once during startup.
pub struct RuntimeContextBuilder {
    keys: Vec<PublicKey>,
    always_send_to: Vec<PublicKey>,
    peers: Vec<String>,
    p2p_client: Option<Arc<RestP2pClient>>,
    p2p_server_uri: String,
    remote_key_validation: bool,
    enhanced_privacy: bool,
    disable_peer_discovery: bool,
    use_white_list: bool,
    recovery_mode: bool,
}

impl RuntimeContextBuilder {
    pub fn new() -> Self {
        Self {
            keys: Vec::new(),
            always_send_to: Vec::new(),
            peers: Vec::new(),
            p2p_client: None,
            p2p_server_uri: String::new(),
            remote_key_validation: false,
            enhanced_privacy: false,
            disable_peer_discovery: false,
            use_white_list: false,
            recovery_mode: false,
        }
    }

    pub fn keys(mut self, keys: &[PublicKey]) -> Self {
        self.keys = keys.to_vec();
        self
    }

    pub fn always_send_to(mut self, keys: &[PublicKey]) -> Self {
        self.always_send_to = keys.to_vec();
        self
    }

    pub fn peers(mut self, peers: &[String]) -> Self {
        self.peers = peers.to_vec();
        self
    }

    pub fn p2p_client(mut self, client: Arc<RestP2pClient>) -> Self {
        self.p2p_client = Some(client);
        self
    }

    pub fn p2p_server_uri(mut self, uri: impl Into<String>) -> Self {
        self.p2p_server_uri = uri.into();
        self
    }

    pub fn remote_key_validation(mut self, enabled: bool) -> Self {
        self.remote_key_validation = enabled;
        self
    }

    pub fn enhanced_privacy(mut self, enabled: bool) -> Self {
        self.enhanced_privacy = enabled;
        self
    }

    pub fn disable_peer_discovery(mut self, disabled: bool) -> Self {
        self.disable_peer_discovery = disabled;
        self
    }

    pub fn use_white_list(mut self, enabled: bool) -> Self {
        self.use_white_list = enabled;
        self
    }

    pub fn recovery_mode(mut self, enabled: bool) -> Self {
        self.recovery_mode = enabled;
        self
    }

    pub fn build(self) -> Result<RuntimeContext> {
        if self.keys.is_empty() {
            bail!("runtime context requires at least one own key");
        }
        let Some(p2p_client) = self.p2p_client else {
            bail!("runtime context requires a p2p client");
        };
        if self.p2p_server_uri.is_empty() {
            bail!("runtime context requires the node's own p2p uri");
        }
        Ok(RuntimeContext {
            keys: self.keys.into_iter().collect(),
            always_send_to: self.always_send_to,
            peers: self.peers,
            p2p_client,
            p2p_server_uri: self.p2p_server_uri,
            remote_key_validation: self.remote_key_validation,
            enhanced_privacy: self.enhanced_privacy,
            disable_peer_discovery: self.disable_peer_discovery,
            use_white_list: self.use_white_list,
            recovery_mode: self.recovery_mode,
        })
    }
}

impl Default for RuntimeContextBuilder {
    fn default() -> Self {
        Self::new()
    }
}
