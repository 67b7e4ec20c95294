//! Outbound ports for the payload codec subsystem.
//!
//! The enclave is the only external dependency here. It holds all private
//! key material and performs sealed-box encryption; the relay consumes it
//! as an opaque capability and never sees raw keys.

use async_trait::async_trait;
use shared_types::{PublicKey, RecipientBox};
use thiserror::Error;

/// Output of a sealed-box encryption: ciphertext, nonce, and one key box
/// per recipient (in the order the recipients were supplied).
#[derive(Clone, Debug)]
pub struct SealedParts {
    pub cipher_text: Vec<u8>,
    pub nonce: Vec<u8>,
    pub recipient_boxes: Vec<RecipientBox>,
}

/// Enclave capability errors.
#[derive(Debug, Error)]
pub enum EnclaveError {
    /// The enclave could not be reached. Not retried here; callers own
    /// their retry policy.
    #[error("enclave unavailable: {0}")]
    Unavailable(String),

    /// The box did not open with the supplied key pair.
    #[error("decryption failed")]
    DecryptionFailed,
}

/// Sealed-box encrypt/decrypt capability.
#[async_trait]
pub trait EnclaveGateway: Send + Sync {
    /// Encrypts `plaintext` from `sender` to each key in `recipients`,
    /// producing one recipient box per key.
    async fn seal(
        &self,
        plaintext: &[u8],
        sender: &PublicKey,
        recipients: &[PublicKey],
    ) -> Result<SealedParts, EnclaveError>;

    /// Opens one recipient box and decrypts the ciphertext.
    ///
    /// Decrypting the same inputs twice yields byte-identical plaintext;
    /// the call has no side effects beyond decryption.
    async fn unseal(
        &self,
        cipher_text: &[u8],
        nonce: &[u8],
        recipient_box: &RecipientBox,
        sender: &PublicKey,
        recipient: &PublicKey,
    ) -> Result<Vec<u8>, EnclaveError>;
}
