//! AWS Secrets Manager backend.
//!
//! Speaks the Secrets Manager JSON protocol directly. Request signing is
//! the deployment's concern: the configured endpoint is expected to be a
//! regional endpoint fronted by a credential helper (or an emulator in
//! test setups), with the `authorization` config value passed through
//! verbatim.

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use crate::{KeyVaultService, VaultError};

const TARGET_HEADER: &str = "X-Amz-Target";
const CONTENT_TYPE: &str = "application/x-amz-json-1.1";

pub struct AwsSecretsManager {
    client: reqwest::Client,
    endpoint: String,
    authorization: String,
}

impl AwsSecretsManager {
    pub fn new(endpoint: String, authorization: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: endpoint.trim_end_matches('/').to_string(),
            authorization,
        }
    }

    async fn call(
        &self,
        target: &str,
        body: serde_json::Value,
    ) -> Result<reqwest::Response, VaultError> {
        let response = self
            .client
            .post(&self.endpoint)
            .header(TARGET_HEADER, format!("secretsmanager.{target}"))
            .header(reqwest::header::CONTENT_TYPE, CONTENT_TYPE)
            .header(reqwest::header::AUTHORIZATION, &self.authorization)
            .json(&body)
            .send()
            .await?;
        Ok(response)
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct GetSecretValueResponse {
    secret_string: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct PutSecretValueResponse {
    #[serde(rename = "ARN")]
    arn: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct AwsErrorBody {
    #[serde(rename = "__type", default)]
    error_type: String,
}

#[async_trait]
impl KeyVaultService for AwsSecretsManager {
    async fn get_secret(&self, name: &str, version: Option<&str>) -> Result<String, VaultError> {
        debug!(secret = name, ?version, "fetching secret from AWS Secrets Manager");
        let mut body = serde_json::json!({ "SecretId": name });
        if let Some(version) = version {
            body["VersionId"] = serde_json::Value::String(version.to_string());
        }
        let response = self.call("GetSecretValue", body).await?;

        if response.status().is_success() {
            let body: GetSecretValueResponse = response.json().await?;
            return Ok(body.secret_string);
        }
        let status = response.status();
        let error: AwsErrorBody = response.json().await.unwrap_or(AwsErrorBody {
            error_type: String::new(),
        });
        if error.error_type.contains("ResourceNotFoundException") {
            return Err(VaultError::SecretNotFound {
                name: name.to_string(),
            });
        }
        if status == reqwest::StatusCode::FORBIDDEN {
            return Err(VaultError::Unauthorized(error.error_type));
        }
        Err(VaultError::Protocol(format!(
            "Secrets Manager returned {status} ({})",
            error.error_type
        )))
    }

    async fn set_secret(&self, name: &str, value: &str) -> Result<String, VaultError> {
        let body = serde_json::json!({ "SecretId": name, "SecretString": value });
        let response = self.call("PutSecretValue", body).await?;
        if !response.status().is_success() {
            return Err(VaultError::Protocol(format!(
                "Secrets Manager returned {} on write",
                response.status()
            )));
        }
        let body: PutSecretValueResponse = response.json().await?;
        Ok(body.arn)
    }
}
