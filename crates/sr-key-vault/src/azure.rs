//! Azure Key Vault backend (REST, secrets API 7.4).

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use crate::{KeyVaultService, VaultError};

const API_VERSION: &str = "7.4";

pub struct AzureKeyVault {
    client: reqwest::Client,
    vault_url: String,
    token: String,
}

impl AzureKeyVault {
    pub fn new(vault_url: String, token: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            vault_url: vault_url.trim_end_matches('/').to_string(),
            token,
        }
    }
}

#[derive(Deserialize)]
struct AzureSecret {
    value: String,
    id: Option<String>,
}

#[async_trait]
impl KeyVaultService for AzureKeyVault {
    async fn get_secret(&self, name: &str, version: Option<&str>) -> Result<String, VaultError> {
        let mut url = format!("{}/secrets/{}", self.vault_url, name);
        if let Some(version) = version {
            url.push('/');
            url.push_str(version);
        }
        debug!(secret = name, ?version, "fetching secret from Azure Key Vault");

        let response = self
            .client
            .get(&url)
            .query(&[("api-version", API_VERSION)])
            .bearer_auth(&self.token)
            .send()
            .await?;

        match response.status() {
            status if status.is_success() => {
                let secret: AzureSecret = response.json().await?;
                Ok(secret.value)
            }
            reqwest::StatusCode::NOT_FOUND => Err(VaultError::SecretNotFound {
                name: name.to_string(),
            }),
            reqwest::StatusCode::UNAUTHORIZED | reqwest::StatusCode::FORBIDDEN => Err(
                VaultError::Unauthorized(format!("Azure Key Vault returned {}", response.status())),
            ),
            status => Err(VaultError::Protocol(format!(
                "Azure Key Vault returned {status}"
            ))),
        }
    }

    async fn set_secret(&self, name: &str, value: &str) -> Result<String, VaultError> {
        let url = format!("{}/secrets/{}", self.vault_url, name);
        let response = self
            .client
            .put(&url)
            .query(&[("api-version", API_VERSION)])
            .bearer_auth(&self.token)
            .json(&serde_json::json!({ "value": value }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(VaultError::Protocol(format!(
                "Azure Key Vault returned {} on write",
                response.status()
            )));
        }
        let secret: AzureSecret = response.json().await?;
        Ok(secret.id.unwrap_or_else(|| name.to_string()))
    }
}
