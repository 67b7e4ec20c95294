//! REST client for a remote enclave server.
//!
//! The enclave holds all private key material; this node only ever sends
//! it ciphertext, public keys, and plaintext to seal. Runs out-of-process
//! so a compromised relay cannot read keys.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use shared_types::{PublicKey, RecipientBox};
use sr_03_payload_codec::{EnclaveError, EnclaveGateway, SealedParts};

pub struct RestEnclaveClient {
    client: reqwest::Client,
    base_url: String,
}

impl RestEnclaveClient {
    pub fn new(base_url: String, call_timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(call_timeout)
            .build()
            .unwrap_or_default();
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }
}

#[derive(Serialize)]
struct SealRequest<'a> {
    sender: &'a PublicKey,
    recipients: &'a [PublicKey],
    /// Hex-encoded plaintext.
    payload: String,
}

#[derive(Deserialize)]
struct SealResponse {
    cipher_text: String,
    nonce: String,
    recipient_boxes: Vec<String>,
}

#[derive(Serialize)]
struct UnsealRequest<'a> {
    sender: &'a PublicKey,
    recipient: &'a PublicKey,
    cipher_text: String,
    nonce: String,
    recipient_box: String,
}

#[derive(Deserialize)]
struct UnsealResponse {
    payload: String,
}

fn transport_unavailable(e: reqwest::Error) -> EnclaveError {
    EnclaveError::Unavailable(e.to_string())
}

fn decode_hex(field: &str, value: &str) -> Result<Vec<u8>, EnclaveError> {
    hex::decode(value)
        .map_err(|e| EnclaveError::Unavailable(format!("enclave sent bad {field}: {e}")))
}

#[async_trait]
impl EnclaveGateway for RestEnclaveClient {
    async fn seal(
        &self,
        plaintext: &[u8],
        sender: &PublicKey,
        recipients: &[PublicKey],
    ) -> Result<SealedParts, EnclaveError> {
        let request = SealRequest {
            sender,
            recipients,
            payload: hex::encode(plaintext),
        };
        let response = self
            .client
            .post(format!("{}/seal", self.base_url))
            .json(&request)
            .send()
            .await
            .map_err(transport_unavailable)?;

        if !response.status().is_success() {
            return Err(EnclaveError::Unavailable(format!(
                "enclave returned {}",
                response.status()
            )));
        }
        let body: SealResponse = response.json().await.map_err(transport_unavailable)?;

        let recipient_boxes = body
            .recipient_boxes
            .iter()
            .map(|b| decode_hex("recipient box", b).map(RecipientBox::new))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(SealedParts {
            cipher_text: decode_hex("ciphertext", &body.cipher_text)?,
            nonce: decode_hex("nonce", &body.nonce)?,
            recipient_boxes,
        })
    }

    async fn unseal(
        &self,
        cipher_text: &[u8],
        nonce: &[u8],
        recipient_box: &RecipientBox,
        sender: &PublicKey,
        recipient: &PublicKey,
    ) -> Result<Vec<u8>, EnclaveError> {
        let request = UnsealRequest {
            sender,
            recipient,
            cipher_text: hex::encode(cipher_text),
            nonce: hex::encode(nonce),
            recipient_box: hex::encode(recipient_box.as_bytes()),
        };
        let response = self
            .client
            .post(format!("{}/unseal", self.base_url))
            .json(&request)
            .send()
            .await
            .map_err(transport_unavailable)?;

        let status = response.status();
        if status.is_client_error() {
            // The enclave looked at the box and could not open it.
            return Err(EnclaveError::DecryptionFailed);
        }
        if !status.is_success() {
            return Err(EnclaveError::Unavailable(format!(
                "enclave returned {status}"
            )));
        }
        let body: UnsealResponse = response.json().await.map_err(transport_unavailable)?;
        decode_hex("payload", &body.payload)
    }
}
