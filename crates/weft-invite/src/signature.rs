//! Signature checking for invite payloads.
//!
//! Expiry is absolute and checked first. A bad signature never blocks on
//! its own; it is reported as a legacy invite with an error attached.

use serde::{Deserialize, Serialize};
use tracing::warn;

use weft_core::Ed25519PublicKey;

use crate::payload::InvitePayload;

/// Result of checking a raw invite's expiry and signature.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignatureCheck {
    /// The invite may be used: not expired, and either verified or unsigned.
    pub valid: bool,
    /// No verified signature vouches for the claims.
    pub legacy: bool,
    pub expired: bool,
    pub expiry: Option<i64>,
    /// Hex key of the signer, when one was named.
    pub owner_public_key: Option<String>,
    pub error: Option<String>,
}

impl SignatureCheck {
    /// A check that failed before a payload could be read.
    pub fn unreadable(error: impl Into<String>) -> Self {
        Self {
            valid: false,
            legacy: true,
            expired: false,
            expiry: None,
            owner_public_key: None,
            error: Some(error.into()),
        }
    }

    /// Check a payload at time `now` (Unix ms).
    pub fn of(payload: &InvitePayload, now: i64) -> Self {
        let expiry = payload.expiry;
        let owner_public_key = payload.owner_public_key.clone();

        if is_expired(expiry, now) {
            return Self {
                valid: false,
                legacy: !payload.has_signature_fields(),
                expired: true,
                expiry,
                owner_public_key,
                error: Some("invite has expired".into()),
            };
        }

        match SignatureStatus::of(payload) {
            SignatureStatus::Verified(_) => Self {
                valid: true,
                legacy: false,
                expired: false,
                expiry,
                owner_public_key,
                error: None,
            },
            SignatureStatus::Unsigned => Self {
                valid: true,
                legacy: true,
                expired: false,
                expiry,
                owner_public_key,
                error: None,
            },
            SignatureStatus::Unverified(reason) => Self {
                valid: false,
                legacy: true,
                expired: false,
                expiry,
                owner_public_key,
                error: Some(reason),
            },
        }
    }
}

/// What the signature fields of a payload amount to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignatureStatus {
    /// Signed by this key, and the signature matches. Says nothing about
    /// the connection hints.
    Verified(Ed25519PublicKey),
    /// Signature fields are present but do not verify.
    Unverified(String),
    /// No signature fields at all.
    Unsigned,
}

impl SignatureStatus {
    pub fn of(payload: &InvitePayload) -> Self {
        if !payload.has_signature_fields() {
            return SignatureStatus::Unsigned;
        }
        match payload.verify() {
            Ok(owner) => SignatureStatus::Verified(owner),
            Err(e) => {
                warn!(entity = %payload.target(), error = %e, "invite signature did not verify");
                SignatureStatus::Unverified(e.to_string())
            }
        }
    }

    pub fn is_verified(&self) -> bool {
        matches!(self, SignatureStatus::Verified(_))
    }
}

/// `now > expiry`; an absent expiry never expires.
pub fn is_expired(expiry: Option<i64>, now: i64) -> bool {
    matches!(expiry, Some(expiry) if now > expiry)
}
