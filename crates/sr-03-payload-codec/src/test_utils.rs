//! Deterministic in-memory enclave for tests.
//!
//! Implements the [`EnclaveGateway`] contract with keyed digests instead of
//! real sealed boxes. Deterministic by construction: the same plaintext and
//! sender always produce the same ciphertext, which is what content-address
//! stability tests rely on. Not cryptography; never use outside tests.

use async_trait::async_trait;
use sha3::{Digest, Sha3_512};
use shared_types::{PublicKey, RecipientBox};

use crate::ports::{EnclaveError, EnclaveGateway, SealedParts};

const MASTER_LEN: usize = 32;
const NONCE_LEN: usize = 24;
const TAG_LEN: usize = 16;

/// Deterministic fake enclave.
#[derive(Clone, Copy, Debug, Default)]
pub struct MockEnclave;

fn digest(parts: &[&[u8]]) -> [u8; 64] {
    let mut hasher = Sha3_512::new();
    for part in parts {
        hasher.update(part);
    }
    hasher.finalize().into()
}

fn keystream_xor(data: &[u8], master: &[u8], nonce: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(data.len());
    let mut counter = 0u64;
    while out.len() < data.len() {
        let block = digest(&[b"stream", master, nonce, &counter.to_be_bytes()]);
        for byte in block {
            if out.len() == data.len() {
                break;
            }
            out.push(data[out.len()] ^ byte);
        }
        counter += 1;
    }
    out
}

fn box_mask(sender: &PublicKey, recipient: &PublicKey) -> [u8; MASTER_LEN] {
    let mask = digest(&[b"box", sender.as_bytes(), recipient.as_bytes()]);
    mask[..MASTER_LEN].try_into().unwrap()
}

#[async_trait]
impl EnclaveGateway for MockEnclave {
    async fn seal(
        &self,
        plaintext: &[u8],
        sender: &PublicKey,
        recipients: &[PublicKey],
    ) -> Result<SealedParts, EnclaveError> {
        let master = &digest(&[b"master", sender.as_bytes(), plaintext])[..MASTER_LEN];
        let nonce = digest(&[b"nonce", sender.as_bytes(), plaintext])[..NONCE_LEN].to_vec();

        let mut cipher_text = keystream_xor(plaintext, master, &nonce);
        cipher_text.extend_from_slice(&digest(&[b"tag", master, plaintext])[..TAG_LEN]);

        let recipient_boxes = recipients
            .iter()
            .map(|recipient| {
                let mask = box_mask(sender, recipient);
                let boxed: Vec<u8> = master.iter().zip(mask).map(|(m, k)| m ^ k).collect();
                RecipientBox::new(boxed)
            })
            .collect();

        Ok(SealedParts {
            cipher_text,
            nonce,
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
        if cipher_text.len() < TAG_LEN || recipient_box.len() != MASTER_LEN {
            return Err(EnclaveError::DecryptionFailed);
        }
        let (body, tag) = cipher_text.split_at(cipher_text.len() - TAG_LEN);

        let mask = box_mask(sender, recipient);
        let master: Vec<u8> = recipient_box
            .as_bytes()
            .iter()
            .zip(mask)
            .map(|(b, k)| b ^ k)
            .collect();

        let plaintext = keystream_xor(body, &master, nonce);
        if digest(&[b"tag", &master, &plaintext])[..TAG_LEN] != *tag {
            return Err(EnclaveError::DecryptionFailed);
        }
        Ok(plaintext)
    }
}
