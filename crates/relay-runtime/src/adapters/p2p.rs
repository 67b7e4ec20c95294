//! REST client for the node-to-node protocol.
//!
//! One shared client implements every outbound port that talks to a peer:
//! payload push (publisher and legacy resend), party-info exchange
//! (directory refresh), and the recovery batch protocol.
//!
//! ## Peer endpoints
//!
//! ```text
//! POST {peer}/push                      raw payload frame
//! GET  {peer}/partyinfo                 sender + known peer bindings
//! GET  {peer}/recovery/hashes           ?page=&page_size=
//! POST {peer}/recovery/payloads         {hashes, max_bytes}
//! ```

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use shared_types::{PublicKey, TxHash};
use sr_01_peer_directory::{DirectoryError, PartyInfoClient, PartyInfoResponse, PeerEntry};
use sr_04_payload_publisher::{PayloadTransport, TransportError};
use sr_06_recovery::{HashPage, RecoveryTransport, RecoveryTransportError};

pub struct RestP2pClient {
    client: reqwest::Client,
}

impl RestP2pClient {
    /// `call_timeout` bounds every request this client makes; callers add
    /// their own outer timeouts where the protocol demands them.
    pub fn new(call_timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(call_timeout)
            .build()
            .unwrap_or_default();
        Self { client }
    }
}

#[derive(Serialize, Deserialize)]
struct PeerDto {
    key: PublicKey,
    uri: String,
}

#[derive(Serialize, Deserialize)]
struct PartyInfoDto {
    sender: Option<PeerDto>,
    #[serde(default)]
    peers: Vec<PeerDto>,
}

#[derive(Serialize, Deserialize)]
struct HashPageDto {
    hashes: Vec<TxHash>,
    has_more: bool,
}

#[derive(Serialize)]
struct PayloadBatchRequest<'a> {
    hashes: &'a [TxHash],
    max_bytes: usize,
}

#[derive(Deserialize)]
struct PayloadBatchDto {
    /// Hex-encoded payload frames.
    frames: Vec<String>,
}

impl From<PeerDto> for PeerEntry {
    fn from(dto: PeerDto) -> Self {
        PeerEntry {
            key: dto.key,
            uri: dto.uri,
        }
    }
}

#[async_trait]
impl PayloadTransport for RestP2pClient {
    async fn push_payload(&self, uri: &str, frame: &[u8]) -> Result<(), TransportError> {
        let response = self
            .client
            .post(format!("{}/push", uri.trim_end_matches('/')))
            .header(reqwest::header::CONTENT_TYPE, "application/octet-stream")
            .body(frame.to_vec())
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    TransportError::Timeout {
                        uri: uri.to_string(),
                    }
                } else {
                    TransportError::Unreachable {
                        uri: uri.to_string(),
                        reason: e.to_string(),
                    }
                }
            })?;

        let status = response.status();
        if status.is_success() {
            Ok(())
        } else if status.is_client_error() {
            // The peer answered and refused; another attempt cannot help.
            Err(TransportError::Rejected {
                uri: uri.to_string(),
                reason: format!("status {status}"),
            })
        } else {
            Err(TransportError::Unreachable {
                uri: uri.to_string(),
                reason: format!("status {status}"),
            })
        }
    }
}

#[async_trait]
impl PartyInfoClient for RestP2pClient {
    async fn party_info(&self, uri: &str) -> Result<PartyInfoResponse, DirectoryError> {
        let response = self
            .client
            .get(format!("{}/partyinfo", uri.trim_end_matches('/')))
            .send()
            .await
            .map_err(|e| DirectoryError::Transport {
                uri: uri.to_string(),
                reason: e.to_string(),
            })?;

        if !response.status().is_success() {
            return Err(DirectoryError::Transport {
                uri: uri.to_string(),
                reason: format!("status {}", response.status()),
            });
        }
        let dto: PartyInfoDto =
            response
                .json()
                .await
                .map_err(|e| DirectoryError::Protocol {
                    uri: uri.to_string(),
                    reason: e.to_string(),
                })?;
        Ok(PartyInfoResponse {
            sender: dto.sender.map(Into::into),
            known: dto.peers.into_iter().map(Into::into).collect(),
        })
    }
}

#[async_trait]
impl RecoveryTransport for RestP2pClient {
    async fn fetch_hash_page(
        &self,
        uri: &str,
        page: u64,
        page_size: usize,
    ) -> Result<HashPage, RecoveryTransportError> {
        let response = self
            .client
            .get(format!("{}/recovery/hashes", uri.trim_end_matches('/')))
            .query(&[("page", page.to_string()), ("page_size", page_size.to_string())])
            .send()
            .await
            .map_err(|e| map_recovery_error(uri, e))?;

        if !response.status().is_success() {
            return Err(RecoveryTransportError::Unreachable {
                uri: uri.to_string(),
                reason: format!("status {}", response.status()),
            });
        }
        let dto: HashPageDto =
            response
                .json()
                .await
                .map_err(|e| RecoveryTransportError::Protocol {
                    uri: uri.to_string(),
                    reason: e.to_string(),
                })?;
        Ok(HashPage {
            hashes: dto.hashes,
            has_more: dto.has_more,
        })
    }

    async fn fetch_payloads(
        &self,
        uri: &str,
        hashes: &[TxHash],
        max_bytes: usize,
    ) -> Result<Vec<Vec<u8>>, RecoveryTransportError> {
        let response = self
            .client
            .post(format!("{}/recovery/payloads", uri.trim_end_matches('/')))
            .json(&PayloadBatchRequest { hashes, max_bytes })
            .send()
            .await
            .map_err(|e| map_recovery_error(uri, e))?;

        if !response.status().is_success() {
            return Err(RecoveryTransportError::Unreachable {
                uri: uri.to_string(),
                reason: format!("status {}", response.status()),
            });
        }
        let dto: PayloadBatchDto =
            response
                .json()
                .await
                .map_err(|e| RecoveryTransportError::Protocol {
                    uri: uri.to_string(),
                    reason: e.to_string(),
                })?;

        dto.frames
            .iter()
            .map(|frame| {
                hex::decode(frame).map_err(|e| RecoveryTransportError::Protocol {
                    uri: uri.to_string(),
                    reason: format!("frame is not valid hex: {e}"),
                })
            })
            .collect()
    }

    async fn push_payload(
        &self,
        uri: &str,
        frame: &[u8],
    ) -> Result<(), RecoveryTransportError> {
        PayloadTransport::push_payload(self, uri, frame)
            .await
            .map_err(|e| match e {
                TransportError::Timeout { uri } => RecoveryTransportError::Timeout { uri },
                TransportError::Unreachable { uri, reason } => {
                    RecoveryTransportError::Unreachable { uri, reason }
                }
                TransportError::Rejected { uri, reason }
                | TransportError::Protocol { uri, reason } => {
                    RecoveryTransportError::Protocol { uri, reason }
                }
            })
    }
}

fn map_recovery_error(uri: &str, e: reqwest::Error) -> RecoveryTransportError {
    if e.is_timeout() {
        RecoveryTransportError::Timeout {
            uri: uri.to_string(),
        }
    } else {
        RecoveryTransportError::Unreachable {
            uri: uri.to_string(),
            reason: e.to_string(),
        }
    }
}
