//! Node assembly and background scheduling.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::sync::watch;
use tracing::{error, info, warn};

use shared_types::PublicKey;
use sr_01_peer_directory::{PeerDirectoryConfig, PeerDirectoryService, SystemTimeSource};
use sr_02_payload_store::{InMemoryKvStore, PayloadStore, TransactionStore};
use sr_03_payload_codec::{codec_for, CodecVersion, EncodedPayloadManager};
use sr_04_payload_publisher::{PayloadPublisher, PublisherConfig, RetryPolicy};
use sr_05_transaction_manager::TransactionManager;
use sr_06_recovery::{
    LegacyResendManager, RecoveryConfig, RecoveryManager, RecoveryStrategy,
};

use crate::adapters::{DirectoryAdapter, RestEnclaveClient, RestP2pClient};
use crate::config::NodeConfig;
use crate::context::{RuntimeContext, RuntimeContextBuilder};

/// The strategy-selected recovery workflow.
enum RecoveryRunner {
    Batch(Arc<RecoveryManager<RestP2pClient>>),
    Legacy(Arc<LegacyResendManager<RestP2pClient>>),
}

/// A fully wired relay node.
///
/// Owns the background schedulers (discovery refresh and recovery) and
/// exposes the [`TransactionManager`] handle the host's inbound surface
/// mounts its routes on.
pub struct RelayNode {
    context: RuntimeContext,
    config: NodeConfig,
    directory: Arc<PeerDirectoryService<RestP2pClient>>,
    transaction_manager:
        Arc<TransactionManager<RestEnclaveClient, RestP2pClient, DirectoryAdapter>>,
    recovery: RecoveryRunner,
    shutdown_tx: watch::Sender<bool>,
    shutdown_rx: watch::Receiver<bool>,
}

impl RelayNode {
    /// Wires every subsystem bottom-up from validated configuration.
    ///
    /// Key material referenced through the vault is resolved here, once;
    /// afterwards nothing touches the vault again.
    pub async fn build(config: NodeConfig) -> Result<Self> {
        let vault = config.vault.as_ref().map(sr_key_vault::for_config);
        let vault_ref = vault.as_deref();

        let own_keys = NodeConfig::resolve_keys(&config.node.keys, vault_ref)
            .await
            .context("resolving node keys")?;
        let always_send_to = NodeConfig::resolve_keys(&config.node.always_send_to, vault_ref)
            .await
            .context("resolving always-send-to keys")?;

        let p2p_client = Arc::new(RestP2pClient::new(config.publish.call_timeout()));

        let context = RuntimeContextBuilder::new()
            .keys(&own_keys)
            .always_send_to(&always_send_to)
            .peers(&config.node.peers)
            .p2p_client(Arc::clone(&p2p_client))
            .p2p_server_uri(&config.node.p2p_server_uri)
            .remote_key_validation(config.flags.remote_key_validation)
            .enhanced_privacy(config.flags.enhanced_privacy)
            .disable_peer_discovery(config.flags.disable_peer_discovery)
            .use_white_list(config.flags.use_white_list)
            .recovery_mode(config.flags.recovery_mode)
            .build()
            .context("building runtime context")?;
        info!(?context, "runtime context constructed");

        let directory = Arc::new(PeerDirectoryService::new(
            PeerDirectoryConfig {
                disable_peer_discovery: context.disable_peer_discovery(),
                use_white_list: context.use_white_list(),
                refresh_timeout: Duration::from_secs(config.discovery.refresh_timeout_secs),
            },
            context.peers().to_vec(),
            context.p2p_client(),
            Arc::new(SystemTimeSource),
        ));
        let directory_adapter = DirectoryAdapter::new(Arc::clone(&directory));

        // The store ships with the in-memory backend; production hosts
        // swap the KeyValueStore adapter for their database.
        let store: Arc<dyn TransactionStore> =
            Arc::new(PayloadStore::new(InMemoryKvStore::new()));

        let enclave = Arc::new(RestEnclaveClient::new(
            config.enclave.url.clone(),
            Duration::from_secs(config.enclave.timeout_secs),
        ));
        let encoder = Arc::new(EncodedPayloadManager::new(
            enclave,
            context.keys().copied().collect::<Vec<_>>(),
            context.always_send_to().to_vec(),
            context.enhanced_privacy(),
        ));

        let codec = codec_for(CodecVersion::Standard);
        let publisher = Arc::new(PayloadPublisher::new(
            context.p2p_client(),
            Arc::new(directory_adapter.clone()),
            Arc::clone(&codec),
            PublisherConfig {
                retry: RetryPolicy {
                    max_attempts: config.publish.max_attempts,
                    base_delay: config.publish.base_delay(),
                    max_delay: config.publish.max_delay(),
                    call_timeout: config.publish.call_timeout(),
                },
                on_demand_refresh: !context.disable_peer_discovery(),
            },
        ));

        let transaction_manager = Arc::new(TransactionManager::new(
            encoder,
            Arc::clone(&store),
            publisher,
            codec,
            Arc::new(directory_adapter.clone()),
        ));

        let recovery = match config.recovery.strategy {
            RecoveryStrategy::Batch => RecoveryRunner::Batch(Arc::new(RecoveryManager::new(
                Arc::clone(&store),
                context.p2p_client(),
                RecoveryConfig {
                    page_size: config.recovery.page_size,
                    max_batch_bytes: config.recovery.max_batch_bytes,
                    fetch_timeout: Duration::from_secs(config.recovery.fetch_timeout_secs),
                },
            ))),
            RecoveryStrategy::Legacy => RecoveryRunner::Legacy(Arc::new(LegacyResendManager::new(
                Arc::clone(&store),
                context.p2p_client(),
                Arc::new(directory_adapter),
                context.keys().copied().collect::<Vec<_>>(),
                config.recovery.page_size,
            ))),
        };

        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        Ok(Self {
            context,
            config,
            directory,
            transaction_manager,
            recovery,
            shutdown_tx,
            shutdown_rx,
        })
    }

    /// Store health verification, run before serving anything.
    pub fn upcheck(&self) -> bool {
        self.transaction_manager.upcheck()
    }

    /// Entry point for the host's inbound surface.
    pub fn transaction_manager(
        &self,
    ) -> Arc<TransactionManager<RestEnclaveClient, RestP2pClient, DirectoryAdapter>> {
        Arc::clone(&self.transaction_manager)
    }

    pub fn context(&self) -> &RuntimeContext {
        &self.context
    }

    /// Seeds the directory, optionally completes a recovery-mode pass,
    /// and starts the background schedulers.
    pub async fn start(&self) -> Result<()> {
        info!("===========================================");
        info!("  Shroud-Relay Node v{}", env!("CARGO_PKG_VERSION"));
        info!("===========================================");

        // First refresh runs inline: recovery and publishing both need a
        // populated table to be useful.
        self.directory.refresh().await;

        if self.context.recovery_mode() {
            info!("recovery mode: reconciling stores before serving");
            self.run_recovery_once().await;
        }

        self.spawn_discovery_loop();
        self.spawn_recovery_loop();

        info!(
            own_uri = self.context.p2p_server_uri(),
            peers = self.context.peers().len(),
            "node started"
        );
        Ok(())
    }

    /// Signals the schedulers and gives in-flight batches a moment to
    /// commit.
    pub async fn shutdown(&self) {
        info!("initiating graceful shutdown");
        if let Err(e) = self.shutdown_tx.send(true) {
            error!("failed to signal shutdown: {e}");
        }
        tokio::time::sleep(Duration::from_secs(2)).await;
        info!("shutdown complete");
    }

    fn spawn_discovery_loop(&self) {
        let directory = Arc::clone(&self.directory);
        let mut shutdown = self.shutdown_rx.clone();
        let period = Duration::from_secs(self.config.discovery.refresh_interval_secs);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            ticker.tick().await; // immediate first tick consumed
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        directory.refresh().await;
                    }
                    _ = shutdown.changed() => {
                        info!("[sr-01] shutdown signal received");
                        break;
                    }
                }
            }
        });
    }

    fn spawn_recovery_loop(&self) {
        let runner = match &self.recovery {
            RecoveryRunner::Batch(manager) => RecoveryRunner::Batch(Arc::clone(manager)),
            RecoveryRunner::Legacy(manager) => RecoveryRunner::Legacy(Arc::clone(manager)),
        };
        let directory = Arc::clone(&self.directory);
        let cancel = self.shutdown_rx.clone();
        let mut shutdown = self.shutdown_rx.clone();
        let period = Duration::from_secs(self.config.recovery.interval_secs);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        run_recovery(&runner, &directory, &cancel).await;
                    }
                    _ = shutdown.changed() => {
                        info!("[sr-06] shutdown signal received");
                        break;
                    }
                }
            }
        });
    }

    async fn run_recovery_once(&self) {
        run_recovery(&self.recovery, &self.directory, &self.shutdown_rx).await;
    }
}

/// One recovery cycle over every currently known peer.
async fn run_recovery(
    runner: &RecoveryRunner,
    directory: &PeerDirectoryService<RestP2pClient>,
    cancel: &watch::Receiver<bool>,
) {
    match runner {
        RecoveryRunner::Batch(manager) => {
            let peers: Vec<(PublicKey, String)> = directory
                .snapshot()
                .into_iter()
                .map(|record| (record.key, record.uri))
                .collect();
            if peers.is_empty() {
                warn!("recovery cycle skipped: no peers known yet");
                return;
            }
            let reports = manager.run_all(&peers, cancel).await;
            for report in reports {
                if report.failed() {
                    warn!(
                        peer = ?report.peer,
                        error = report.error.as_deref().unwrap_or("unknown"),
                        "recovery run failed; will retry next cycle"
                    );
                }
            }
        }
        RecoveryRunner::Legacy(manager) => match manager.resend_all(cancel).await {
            Ok(report) => info!(
                resent = report.resent,
                failed = report.failed,
                "legacy resend cycle finished"
            ),
            Err(e) => warn!("legacy resend cycle failed: {e}"),
        },
    }
}
