//! Hashicorp Vault backend (KV v2 over REST).

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use crate::{KeyVaultService, VaultError};

const TOKEN_HEADER: &str = "X-Vault-Token";
/// Field holding the secret value inside the KV entry.
const VALUE_FIELD: &str = "value";

pub struct HashicorpVault {
    client: reqwest::Client,
    url: String,
    token: String,
    mount: String,
}

impl HashicorpVault {
    pub fn new(url: String, token: String, mount: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: url.trim_end_matches('/').to_string(),
            token,
            mount,
        }
    }

    fn data_url(&self, name: &str) -> String {
        format!("{}/v1/{}/data/{}", self.url, self.mount, name)
    }
}

#[derive(Deserialize)]
struct KvReadResponse {
    data: KvReadData,
}

#[derive(Deserialize)]
struct KvReadData {
    data: serde_json::Map<String, serde_json::Value>,
}

#[derive(Deserialize)]
struct KvWriteResponse {
    data: KvWriteData,
}

#[derive(Deserialize)]
struct KvWriteData {
    version: u64,
}

#[async_trait]
impl KeyVaultService for HashicorpVault {
    async fn get_secret(&self, name: &str, version: Option<&str>) -> Result<String, VaultError> {
        debug!(secret = name, ?version, "fetching secret from Hashicorp Vault");
        let mut request = self
            .client
            .get(self.data_url(name))
            .header(TOKEN_HEADER, &self.token);
        if let Some(version) = version {
            request = request.query(&[("version", version)]);
        }
        let response = request.send().await?;

        match response.status() {
            status if status.is_success() => {
                let body: KvReadResponse = response.json().await?;
                body.data
                    .data
                    .get(VALUE_FIELD)
                    .and_then(|v| v.as_str())
                    .map(str::to_string)
                    .ok_or_else(|| {
                        VaultError::Protocol(format!(
                            "KV entry {name} has no string field `{VALUE_FIELD}`"
                        ))
                    })
            }
            reqwest::StatusCode::NOT_FOUND => Err(VaultError::SecretNotFound {
                name: name.to_string(),
            }),
            reqwest::StatusCode::FORBIDDEN => Err(VaultError::Unauthorized(
                "Vault token lacks access to the secret".into(),
            )),
            status => Err(VaultError::Protocol(format!("Vault returned {status}"))),
        }
    }

    async fn set_secret(&self, name: &str, value: &str) -> Result<String, VaultError> {
        let response = self
            .client
            .post(self.data_url(name))
            .header(TOKEN_HEADER, &self.token)
            .json(&serde_json::json!({ "data": { VALUE_FIELD: value } }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(VaultError::Protocol(format!(
                "Vault returned {} on write",
                response.status()
            )));
        }
        let body: KvWriteResponse = response.json().await?;
        Ok(format!("{}/{}@v{}", self.mount, name, body.data.version))
    }
}
