//! Versioned binary wire format for encrypted payloads.
//!
//! Two formats coexist on the network. The leading byte selects the
//! version, so a node can always decode what an older peer sends and the
//! legacy resend path can still speak to pre-upgrade nodes.
//!
//! ## Wire Layout
//!
//! All multi-byte integers are big-endian; `block` means a `u32` length
//! followed by that many bytes.
//!
//! ```text
//! v1 (legacy, positional boxes):
//! [version: 1][sender: 32][nonce: block][cipher: block]
//! [box_count: 4][box: block]*
//!
//! v2 (keyed recipients + privacy metadata):
//! [version: 1][sender: 32][nonce: block][cipher: block]
//! [recipient_count: 4]([key: 32][box: block])*
//! [privacy_mode: 1][affected_count: 4][hash: 64]*
//! [group_flag: 1]([group_id: block])?[mandatory_count: 4][key: 32]*
//! ```

use std::sync::Arc;

use shared_types::{PrivacyMode, PublicKey, RecipientBox, TxHash, PUBLIC_KEY_LEN, TX_HASH_LEN};

use crate::domain::errors::CodecError;
use crate::domain::payload::EncodedPayload;

/// Upper bound on any single length-prefixed field (ciphertext included).
const MAX_BLOCK_LEN: usize = 32 * 1024 * 1024;

/// Upper bound on list counts (recipients, affected hashes).
const MAX_LIST_LEN: usize = 65_536;

/// Wire format version identifiers.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CodecVersion {
    /// Positional recipient boxes, no privacy metadata.
    Legacy,
    /// Keyed recipient boxes plus privacy metadata.
    Standard,
}

impl CodecVersion {
    /// The version byte written to the wire.
    pub fn wire_byte(self) -> u8 {
        match self {
            CodecVersion::Legacy => 1,
            CodecVersion::Standard => 2,
        }
    }

    /// Parses a version byte.
    pub fn from_wire_byte(byte: u8) -> Result<Self, CodecError> {
        match byte {
            1 => Ok(CodecVersion::Legacy),
            2 => Ok(CodecVersion::Standard),
            other => Err(CodecError::UnsupportedVersion(other)),
        }
    }
}

/// Encoder/decoder for one wire version.
///
/// The version in play is selected once at startup from configuration and
/// injected; nothing resolves codecs dynamically at runtime.
pub trait PayloadCodec: Send + Sync {
    fn version(&self) -> CodecVersion;

    fn encode(&self, payload: &EncodedPayload) -> Result<Vec<u8>, CodecError>;

    /// Decodes a payload. The caller has already consumed and checked the
    /// version byte; `bytes` is the full frame including it.
    fn decode(&self, bytes: &[u8]) -> Result<EncodedPayload, CodecError>;
}

/// Returns the codec for a configured version.
pub fn codec_for(version: CodecVersion) -> Arc<dyn PayloadCodec> {
    match version {
        CodecVersion::Legacy => Arc::new(LegacyCodec),
        CodecVersion::Standard => Arc::new(StandardCodec),
    }
}

/// Decodes a frame of any supported version, dispatching on the leading
/// version byte.
pub fn decode_any(bytes: &[u8]) -> Result<(CodecVersion, EncodedPayload), CodecError> {
    let first = *bytes.first().ok_or(CodecError::Truncated {
        context: "version byte",
    })?;
    let version = CodecVersion::from_wire_byte(first)?;
    let payload = codec_for(version).decode(bytes)?;
    Ok((version, payload))
}

// ---------------------------------------------------------------------------
// Write helpers
// ---------------------------------------------------------------------------

fn put_u32(out: &mut Vec<u8>, value: usize) {
    out.extend_from_slice(&(value as u32).to_be_bytes());
}

fn put_block(out: &mut Vec<u8>, bytes: &[u8]) {
    put_u32(out, bytes.len());
    out.extend_from_slice(bytes);
}

// ---------------------------------------------------------------------------
// Read helpers
// ---------------------------------------------------------------------------

struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    fn take(&mut self, n: usize, context: &'static str) -> Result<&'a [u8], CodecError> {
        let end = self
            .pos
            .checked_add(n)
            .filter(|&end| end <= self.buf.len())
            .ok_or(CodecError::Truncated { context })?;
        let slice = &self.buf[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    fn take_u8(&mut self, context: &'static str) -> Result<u8, CodecError> {
        Ok(self.take(1, context)?[0])
    }

    fn take_u32(&mut self, context: &'static str) -> Result<usize, CodecError> {
        let bytes = self.take(4, context)?;
        Ok(u32::from_be_bytes(bytes.try_into().unwrap_or([0; 4])) as usize)
    }

    fn take_block(&mut self, context: &'static str) -> Result<&'a [u8], CodecError> {
        let len = self.take_u32(context)?;
        if len > MAX_BLOCK_LEN {
            return Err(CodecError::OversizedField { context, len });
        }
        self.take(len, context)
    }

    fn take_count(&mut self, context: &'static str) -> Result<usize, CodecError> {
        let count = self.take_u32(context)?;
        if count > MAX_LIST_LEN {
            return Err(CodecError::OversizedField {
                context,
                len: count,
            });
        }
        Ok(count)
    }

    fn take_key(&mut self, context: &'static str) -> Result<PublicKey, CodecError> {
        let bytes = self.take(PUBLIC_KEY_LEN, context)?;
        // Length is fixed above, so this cannot fail.
        PublicKey::from_slice(bytes).map_err(|_| CodecError::Truncated { context })
    }

    fn finish(&self) -> Result<(), CodecError> {
        let rest = self.buf.len() - self.pos;
        if rest == 0 {
            Ok(())
        } else {
            Err(CodecError::TrailingBytes(rest))
        }
    }
}

fn encode_common(payload: &EncodedPayload, version: CodecVersion) -> Vec<u8> {
    let mut out = Vec::with_capacity(payload.cipher_text().len() + 256);
    out.push(version.wire_byte());
    out.extend_from_slice(payload.sender().as_bytes());
    put_block(&mut out, payload.nonce());
    put_block(&mut out, payload.cipher_text());
    out
}

// ---------------------------------------------------------------------------
// v1: legacy positional boxes
// ---------------------------------------------------------------------------

/// Legacy format: boxes are positional, recipients implicit, no privacy
/// metadata. Still emitted by the legacy resend path.
pub struct LegacyCodec;

impl PayloadCodec for LegacyCodec {
    fn version(&self) -> CodecVersion {
        CodecVersion::Legacy
    }

    fn encode(&self, payload: &EncodedPayload) -> Result<Vec<u8>, CodecError> {
        let mut out = encode_common(payload, CodecVersion::Legacy);
        put_u32(&mut out, payload.recipient_boxes().len());
        for recipient_box in payload.recipient_boxes() {
            put_block(&mut out, recipient_box.as_bytes());
        }
        Ok(out)
    }

    fn decode(&self, bytes: &[u8]) -> Result<EncodedPayload, CodecError> {
        let mut reader = Reader::new(bytes);
        let version = reader.take_u8("version byte")?;
        if version != CodecVersion::Legacy.wire_byte() {
            return Err(CodecError::UnsupportedVersion(version));
        }
        let sender = reader.take_key("sender key")?;
        let nonce = reader.take_block("nonce")?.to_vec();
        let cipher_text = reader.take_block("ciphertext")?.to_vec();

        let box_count = reader.take_count("box count")?;
        let mut boxes = Vec::with_capacity(box_count);
        for _ in 0..box_count {
            boxes.push(RecipientBox::new(
                reader.take_block("recipient box")?.to_vec(),
            ));
        }
        reader.finish()?;

        Ok(EncodedPayload::new(sender, cipher_text, nonce).with_boxes_only(boxes))
    }
}

// ---------------------------------------------------------------------------
// v2: keyed recipients + privacy metadata
// ---------------------------------------------------------------------------

/// Current format: recipient boxes keyed by public key, with privacy mode,
/// dependency hashes, privacy group, and mandatory recipient set.
pub struct StandardCodec;

impl PayloadCodec for StandardCodec {
    fn version(&self) -> CodecVersion {
        CodecVersion::Standard
    }

    fn encode(&self, payload: &EncodedPayload) -> Result<Vec<u8>, CodecError> {
        let keys = payload.recipient_keys();
        let boxes = payload.recipient_boxes();
        if keys.len() != boxes.len() {
            return Err(CodecError::RecipientCountMismatch {
                keys: keys.len(),
                boxes: boxes.len(),
            });
        }

        let mut out = encode_common(payload, CodecVersion::Standard);
        put_u32(&mut out, keys.len());
        for (key, recipient_box) in keys.iter().zip(boxes) {
            out.extend_from_slice(key.as_bytes());
            put_block(&mut out, recipient_box.as_bytes());
        }

        out.push(payload.privacy_mode().code());
        put_u32(&mut out, payload.affected_transactions().len());
        for hash in payload.affected_transactions() {
            out.extend_from_slice(hash.as_bytes());
        }

        match payload.privacy_group_id() {
            Some(id) => {
                out.push(1);
                put_block(&mut out, id);
            }
            None => out.push(0),
        }

        put_u32(&mut out, payload.mandatory_recipients().len());
        for key in payload.mandatory_recipients() {
            out.extend_from_slice(key.as_bytes());
        }

        Ok(out)
    }

    fn decode(&self, bytes: &[u8]) -> Result<EncodedPayload, CodecError> {
        let mut reader = Reader::new(bytes);
        let version = reader.take_u8("version byte")?;
        if version != CodecVersion::Standard.wire_byte() {
            return Err(CodecError::UnsupportedVersion(version));
        }
        let sender = reader.take_key("sender key")?;
        let nonce = reader.take_block("nonce")?.to_vec();
        let cipher_text = reader.take_block("ciphertext")?.to_vec();

        let recipient_count = reader.take_count("recipient count")?;
        let mut keys = Vec::with_capacity(recipient_count);
        let mut boxes = Vec::with_capacity(recipient_count);
        for _ in 0..recipient_count {
            keys.push(reader.take_key("recipient key")?);
            boxes.push(RecipientBox::new(
                reader.take_block("recipient box")?.to_vec(),
            ));
        }

        let mode_code = reader.take_u8("privacy mode")?;
        let privacy_mode =
            PrivacyMode::from_code(mode_code).ok_or(CodecError::UnknownPrivacyMode(mode_code))?;

        let affected_count = reader.take_count("affected count")?;
        let mut affected = Vec::with_capacity(affected_count);
        for _ in 0..affected_count {
            let hash_bytes = reader.take(TX_HASH_LEN, "affected hash")?;
            affected.push(
                TxHash::from_slice(hash_bytes).map_err(|_| CodecError::Truncated {
                    context: "affected hash",
                })?,
            );
        }

        let group_flag = reader.take_u8("group flag")?;
        let privacy_group_id = if group_flag == 1 {
            Some(reader.take_block("privacy group id")?.to_vec())
        } else {
            None
        };

        let mandatory_count = reader.take_count("mandatory count")?;
        let mut mandatory = Vec::with_capacity(mandatory_count);
        for _ in 0..mandatory_count {
            mandatory.push(reader.take_key("mandatory key")?);
        }
        reader.finish()?;

        Ok(EncodedPayload::new(sender, cipher_text, nonce)
            .with_recipients(keys, boxes)
            .with_privacy_mode(privacy_mode)
            .with_affected_transactions(affected)
            .with_privacy_group_id(privacy_group_id)
            .with_mandatory_recipients(mandatory))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn full_payload() -> EncodedPayload {
        EncodedPayload::new(
            PublicKey::new([7; 32]),
            b"some cipher text".to_vec(),
            vec![9; 24],
        )
        .with_recipients(
            vec![PublicKey::new([1; 32]), PublicKey::new([2; 32])],
            vec![
                RecipientBox::new(vec![0xA; 48]),
                RecipientBox::new(vec![0xB; 48]),
            ],
        )
        .with_privacy_mode(PrivacyMode::MandatoryRecipients)
        .with_affected_transactions(vec![TxHash::of_ciphertext(b"dep")])
        .with_privacy_group_id(Some(b"group-1".to_vec()))
        .with_mandatory_recipients(vec![PublicKey::new([2; 32])])
    }

    #[test]
    fn standard_round_trip_preserves_everything() {
        let payload = full_payload();
        let bytes = StandardCodec.encode(&payload).unwrap();
        let decoded = StandardCodec.decode(&bytes).unwrap();
        assert_eq!(decoded, payload);
    }

    #[test]
    fn legacy_round_trip_keeps_boxes_positional() {
        let payload = EncodedPayload::new(
            PublicKey::new([7; 32]),
            b"legacy cipher".to_vec(),
            vec![1; 24],
        )
        .with_boxes_only(vec![
            RecipientBox::new(vec![0xC; 48]),
            RecipientBox::new(vec![0xD; 48]),
        ]);
        let bytes = LegacyCodec.encode(&payload).unwrap();
        let decoded = LegacyCodec.decode(&bytes).unwrap();
        assert_eq!(decoded, payload);
        assert!(decoded.recipient_keys().is_empty());
    }

    #[test]
    fn decode_any_dispatches_on_version_byte() {
        let payload = full_payload();
        let bytes = StandardCodec.encode(&payload).unwrap();
        let (version, decoded) = decode_any(&bytes).unwrap();
        assert_eq!(version, CodecVersion::Standard);
        assert_eq!(decoded, payload);
    }

    #[test]
    fn unknown_version_is_rejected() {
        let err = decode_any(&[9, 0, 0]).unwrap_err();
        assert!(matches!(err, CodecError::UnsupportedVersion(9)));
    }

    #[test]
    fn truncated_frame_is_rejected() {
        let bytes = StandardCodec.encode(&full_payload()).unwrap();
        let err = StandardCodec.decode(&bytes[..bytes.len() - 3]).unwrap_err();
        assert!(matches!(err, CodecError::Truncated { .. }));
    }

    #[test]
    fn trailing_bytes_are_rejected() {
        let mut bytes = StandardCodec.encode(&full_payload()).unwrap();
        bytes.extend_from_slice(&[0, 0]);
        let err = StandardCodec.decode(&bytes).unwrap_err();
        assert!(matches!(err, CodecError::TrailingBytes(2)));
    }

    #[test]
    fn mismatched_recipient_lists_refuse_to_encode() {
        let payload = EncodedPayload::new(PublicKey::new([7; 32]), vec![1], vec![2])
            .with_recipients(vec![PublicKey::new([1; 32])], vec![]);
        assert!(matches!(
            StandardCodec.encode(&payload),
            Err(CodecError::RecipientCountMismatch { keys: 1, boxes: 0 })
        ));
    }
}
