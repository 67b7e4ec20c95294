//! Transaction privacy modes.

use serde::{Deserialize, Serialize};

/// How strictly a transaction's recipient set is enforced.
///
/// The numeric codes are part of the wire format and must not change.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PrivacyMode {
    /// Best-effort delivery to the requested recipients plus the node's
    /// default broadcast set.
    #[default]
    Standard,
    /// Recipients are fixed at submission; late party changes are rejected.
    PartyProtection,
    /// Like party protection, and delivery failure to any recipient marked
    /// mandatory fails the whole submission.
    MandatoryRecipients,
    /// Strongest mode: party protection plus per-recipient payload
    /// stripping so no recipient sees a sibling's key box.
    EnhancedPrivacy,
}

impl PrivacyMode {
    /// Wire code for this mode.
    pub fn code(self) -> u8 {
        match self {
            PrivacyMode::Standard => 0,
            PrivacyMode::PartyProtection => 1,
            PrivacyMode::MandatoryRecipients => 2,
            PrivacyMode::EnhancedPrivacy => 3,
        }
    }

    /// Parses a wire code; `None` for unknown codes.
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(PrivacyMode::Standard),
            1 => Some(PrivacyMode::PartyProtection),
            2 => Some(PrivacyMode::MandatoryRecipients),
            3 => Some(PrivacyMode::EnhancedPrivacy),
            _ => None,
        }
    }

    /// Whether this mode tracks a mandatory recipient set.
    pub fn enforces_mandatory_recipients(self) -> bool {
        matches!(
            self,
            PrivacyMode::MandatoryRecipients | PrivacyMode::EnhancedPrivacy
        )
    }
}
