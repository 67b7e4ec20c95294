//! Discovery expansion over the simulated network.

use std::sync::Arc;

use shared_types::PublicKey;
use sr_01_peer_directory::{
    Liveness, PeerDirectoryConfig, PeerDirectoryService, PeerEntry, SystemTimeSource,
};

use crate::common::{HubClient, Network};

fn key(byte: u8) -> PublicKey {
    PublicKey::new([byte; 32])
}

fn directory(
    network: &Arc<Network>,
    seeds: &[&str],
    config: PeerDirectoryConfig,
) -> PeerDirectoryService<HubClient> {
    PeerDirectoryService::new(
        config,
        seeds.iter().map(|s| s.to_string()).collect(),
        Arc::new(HubClient {
            network: Arc::clone(network),
        }),
        Arc::new(SystemTimeSource),
    )
}

#[tokio::test]
async fn seed_peer_reporting_another_expands_the_table() {
    let network = Network::new();
    // P1 is the seed and discloses P2; P2 answers for itself.
    network.add_node_reporting(
        key(1),
        "http://p1",
        vec![PeerEntry {
            key: key(2),
            uri: "http://p2".to_string(),
        }],
    );
    network.add_node(key(2), "http://p2");

    let dir = directory(&network, &["http://p1"], PeerDirectoryConfig::default());
    dir.refresh().await;

    assert_eq!(dir.resolve(&key(1)), Some("http://p1".to_string()));
    assert_eq!(dir.resolve(&key(2)), Some("http://p2".to_string()));
}

#[tokio::test]
async fn dead_seed_is_recorded_unreachable_but_kept() {
    let network = Network::new();
    network.add_node_reporting(
        key(1),
        "http://p1",
        vec![PeerEntry {
            key: key(3),
            uri: "http://gone".to_string(),
        }],
    );

    let dir = directory(&network, &["http://p1"], PeerDirectoryConfig::default());
    dir.refresh().await;

    // The reported peer's endpoint answers nothing, but its record stays.
    let records = dir.snapshot();
    let gone = records.iter().find(|r| r.key == key(3)).unwrap();
    assert_eq!(gone.liveness, Liveness::Unreachable);
    assert_eq!(dir.resolve(&key(3)), Some("http://gone".to_string()));
}

#[tokio::test]
async fn whitelist_restricts_resolution_to_seed_endpoints() {
    let network = Network::new();
    network.add_node_reporting(
        key(1),
        "http://p1",
        vec![PeerEntry {
            key: key(2),
            uri: "http://p2".to_string(),
        }],
    );
    network.add_node(key(2), "http://p2");

    let dir = directory(
        &network,
        &["http://p1"],
        PeerDirectoryConfig {
            use_white_list: true,
            ..Default::default()
        },
    );
    dir.refresh().await;

    assert_eq!(dir.resolve(&key(1)), Some("http://p1".to_string()));
    assert_eq!(dir.resolve(&key(2)), None);
}
