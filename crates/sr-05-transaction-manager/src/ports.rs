//! Outbound ports for the transaction manager.

use shared_types::PublicKey;

/// Sink for peer sightings on the inbound path.
///
/// When a pushed payload arrives with a usable sender endpoint, the
/// binding is fed to the peer directory through this port.
pub trait PeerObserver: Send + Sync {
    fn on_observed_peer(&self, key: PublicKey, uri: &str);
}

/// Observer for nodes that run without discovery.
#[derive(Debug, Default)]
pub struct NoopPeerObserver;

impl PeerObserver for NoopPeerObserver {
    fn on_observed_peer(&self, _key: PublicKey, _uri: &str) {}
}
