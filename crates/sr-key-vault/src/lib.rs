//! # Key Vault Capability
//!
//! Startup-only secret sourcing. One capability trait, one variant
//! implementation per backend (Azure Key Vault, AWS Secrets Manager,
//! Hashicorp Vault KV v2), selected exactly once from configuration;
//! nothing in the node ever branches on backend identity at a call site.

pub mod aws;
pub mod azure;
pub mod hashicorp;

use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;
use thiserror::Error;

/// Vault access errors.
///
/// `SecretNotFound` is its own variant (never retried, surfaced directly)
/// so callers can tell a missing secret from a broken vault.
#[derive(Debug, Error)]
pub enum VaultError {
    #[error("secret {name} was not found in the vault")]
    SecretNotFound { name: String },

    #[error("vault rejected the request: {0}")]
    Unauthorized(String),

    #[error("vault transport error: {0}")]
    Transport(String),

    #[error("unexpected vault response: {0}")]
    Protocol(String),
}

impl From<reqwest::Error> for VaultError {
    fn from(e: reqwest::Error) -> Self {
        VaultError::Transport(e.to_string())
    }
}

/// Secret read/write capability.
#[async_trait]
pub trait KeyVaultService: Send + Sync {
    /// Fetches a secret value, optionally pinned to a version.
    async fn get_secret(&self, name: &str, version: Option<&str>) -> Result<String, VaultError>;

    /// Stores a secret value; returns the backend's opaque handle for the
    /// written version.
    async fn set_secret(&self, name: &str, value: &str) -> Result<String, VaultError>;
}

/// Backend selection, from configuration.
#[derive(Clone, Debug, Deserialize)]
#[serde(tag = "backend", rename_all = "lowercase")]
pub enum VaultConfig {
    Azure {
        /// Vault base URL, e.g. `https://myvault.vault.azure.net`.
        url: String,
        /// OAuth bearer token for the vault resource.
        token: String,
    },
    Aws {
        /// Secrets Manager endpoint, e.g. a regional endpoint or a local
        /// credential-proxy in front of it.
        endpoint: String,
        /// Authorization header value supplied by the deployment's
        /// credential helper.
        authorization: String,
    },
    Hashicorp {
        /// Vault server base URL.
        url: String,
        /// Client token.
        token: String,
        /// KV v2 mount point, e.g. `secret`.
        mount: String,
    },
}

/// Builds the configured backend. Called once at startup; the returned
/// handle is what gets injected everywhere.
pub fn for_config(config: &VaultConfig) -> Arc<dyn KeyVaultService> {
    match config {
        VaultConfig::Azure { url, token } => {
            Arc::new(azure::AzureKeyVault::new(url.clone(), token.clone()))
        }
        VaultConfig::Aws {
            endpoint,
            authorization,
        } => Arc::new(aws::AwsSecretsManager::new(
            endpoint.clone(),
            authorization.clone(),
        )),
        VaultConfig::Hashicorp { url, token, mount } => Arc::new(hashicorp::HashicorpVault::new(
            url.clone(),
            token.clone(),
            mount.clone(),
        )),
    }
}
