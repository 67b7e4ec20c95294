//! Node configuration: TOML file plus environment overrides.

use std::path::Path;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use shared_types::PublicKey;
use sr_06_recovery::RecoveryStrategy;
use sr_key_vault::{KeyVaultService, VaultConfig};
use tracing::info;

/// Prefix marking a key entry that must be fetched from the vault.
const VAULT_REF_PREFIX: &str = "vault:";

/// Top-level node configuration.
#[derive(Clone, Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NodeConfig {
    pub node: NodeSection,
    #[serde(default)]
    pub flags: FlagsSection,
    pub enclave: EnclaveSection,
    #[serde(default)]
    pub vault: Option<VaultConfig>,
    #[serde(default)]
    pub publish: PublishSection,
    #[serde(default)]
    pub discovery: DiscoverySection,
    #[serde(default)]
    pub recovery: RecoverySection,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NodeSection {
    /// This node's public keys: inline hex, or `vault:<secret-name>`.
    pub keys: Vec<String>,
    /// Default broadcast recipients for standard-privacy submissions.
    #[serde(default)]
    pub always_send_to: Vec<String>,
    /// Seed peer endpoints.
    #[serde(default)]
    pub peers: Vec<String>,
    /// This node's own P2P-reachable endpoint.
    pub p2p_server_uri: String,
}

#[derive(Clone, Copy, Debug, Default, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct FlagsSection {
    pub remote_key_validation: bool,
    pub enhanced_privacy: bool,
    pub disable_peer_discovery: bool,
    pub use_white_list: bool,
    pub recovery_mode: bool,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EnclaveSection {
    /// Enclave server base URL.
    pub url: String,
    /// Seconds per enclave call.
    #[serde(default = "default_enclave_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_enclave_timeout_secs() -> u64 {
    10
}

#[derive(Clone, Copy, Debug, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct PublishSection {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    pub call_timeout_secs: u64,
}

impl Default for PublishSection {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 250,
            max_delay_ms: 10_000,
            call_timeout_secs: 15,
        }
    }
}

#[derive(Clone, Copy, Debug, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct DiscoverySection {
    pub refresh_interval_secs: u64,
    pub refresh_timeout_secs: u64,
}

impl Default for DiscoverySection {
    fn default() -> Self {
        Self {
            refresh_interval_secs: 60,
            refresh_timeout_secs: 15,
        }
    }
}

#[derive(Clone, Copy, Debug, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct RecoverySection {
    pub strategy: RecoveryStrategy,
    pub interval_secs: u64,
    pub page_size: usize,
    pub max_batch_bytes: usize,
    pub fetch_timeout_secs: u64,
}

impl Default for RecoverySection {
    fn default() -> Self {
        Self {
            strategy: RecoveryStrategy::Batch,
            interval_secs: 300,
            page_size: 100,
            max_batch_bytes: 4 * 1024 * 1024,
            fetch_timeout_secs: 30,
        }
    }
}

impl NodeConfig {
    /// Loads configuration from a TOML file, then applies environment
    /// overrides.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading config file {}", path.display()))?;
        let mut config: NodeConfig = toml::from_str(&raw)
            .with_context(|| format!("parsing config file {}", path.display()))?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Environment overrides for deploy-time knobs.
    fn apply_env_overrides(&mut self) {
        if let Ok(uri) = std::env::var("SR_P2P_SERVER_URI") {
            self.node.p2p_server_uri = uri;
            info!("p2p server uri overridden from environment");
        }
        if let Ok(url) = std::env::var("SR_ENCLAVE_URL") {
            self.enclave.url = url;
            info!("enclave url overridden from environment");
        }
        if let Ok(peers) = std::env::var("SR_PEERS") {
            self.node.peers = peers.split(',').map(|p| p.trim().to_string()).collect();
            info!("seed peers overridden from environment");
        }
    }

    fn validate(&self) -> Result<()> {
        if self.node.keys.is_empty() {
            bail!("config must list at least one node key");
        }
        if self.node.p2p_server_uri.is_empty() {
            bail!("p2p_server_uri must not be empty");
        }
        let needs_vault = self
            .node
            .keys
            .iter()
            .chain(self.node.always_send_to.iter())
            .any(|entry| entry.starts_with(VAULT_REF_PREFIX));
        if needs_vault && self.vault.is_none() {
            bail!("config references vault secrets but configures no vault backend");
        }
        Ok(())
    }

    /// Resolves key entries: inline hex is parsed directly, `vault:` refs
    /// are fetched once through the configured backend.
    pub async fn resolve_keys(
        entries: &[String],
        vault: Option<&dyn KeyVaultService>,
    ) -> Result<Vec<PublicKey>> {
        let mut keys = Vec::with_capacity(entries.len());
        for entry in entries {
            let key = match entry.strip_prefix(VAULT_REF_PREFIX) {
                Some(secret_name) => {
                    let vault =
                        vault.context("vault-referenced key but no vault configured")?;
                    let value = vault
                        .get_secret(secret_name, None)
                        .await
                        .with_context(|| format!("fetching key secret {secret_name}"))?;
                    value
                        .parse::<PublicKey>()
                        .with_context(|| format!("secret {secret_name} is not a valid key"))?
                }
                None => entry
                    .parse::<PublicKey>()
                    .with_context(|| format!("invalid key entry {entry}"))?,
            };
            keys.push(key);
        }
        Ok(keys)
    }
}

impl PublishSection {
    pub fn base_delay(&self) -> Duration {
        Duration::from_millis(self.base_delay_ms)
    }

    pub fn max_delay(&self) -> Duration {
        Duration::from_millis(self.max_delay_ms)
    }

    pub fn call_timeout(&self) -> Duration {
        Duration::from_secs(self.call_timeout_secs)
    }
}
