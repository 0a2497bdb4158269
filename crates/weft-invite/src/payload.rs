//! Invite payloads and the claims they sign.
//!
//! The signature covers `SIGN_DOMAIN || cbor([entity_type, entity_id,
//! permission, expiry])` and nothing else.
//!
//! [`PeerHints`] and [`InviteSecret`] are not authenticated. Anyone holding
//! a signed link can rewrite its peers, address or server and the link
//! still verifies. Treat hints as untrusted routing input; a verified
//! signature only vouches for what is granted and until when.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use serde::{Deserialize, Serialize};
use std::fmt;

use weft_core::{
    EntityId, EntityRef, EntityType, Ed25519PublicKey, Ed25519Signature, Keypair,
    PermissionLevel, TopicHash,
};

use crate::error::{InviteError, Result};

/// Domain separator for invite signatures.
pub const SIGN_DOMAIN: &[u8] = b"weft-invite-v1:";

/// A raw 32-byte content encryption key carried by an invite.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptionKey(pub [u8; 32]);

impl EncryptionKey {
    /// Generate a random key.
    pub fn generate() -> Self {
        use rand::RngCore;
        let mut bytes = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut bytes);
        Self(bytes)
    }

    /// URL-safe base64 without padding.
    pub fn to_base64(&self) -> String {
        URL_SAFE_NO_PAD.encode(self.0)
    }

    pub fn from_base64(s: &str) -> Result<Self> {
        let bytes = decode_base64(s)?;
        let arr: [u8; 32] = bytes
            .try_into()
            .map_err(|_| InviteError::Malformed("encryption key must be 32 bytes".into()))?;
        Ok(Self(arr))
    }
}

impl fmt::Debug for EncryptionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("EncryptionKey(..)")
    }
}

/// The secret an invite carries, if any.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum InviteSecret {
    /// A workspace password to derive keys from.
    Password(String),
    /// The raw content key.
    Key(EncryptionKey),
}

impl fmt::Debug for InviteSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InviteSecret::Password(_) => f.write_str("Password(..)"),
            InviteSecret::Key(_) => f.write_str("Key(..)"),
        }
    }
}

/// Optional peer-discovery hints. Not covered by the signature.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeerHints {
    #[serde(default)]
    pub bootstrap_peers: Vec<String>,
    #[serde(default)]
    pub topic_hash: Option<TopicHash>,
    #[serde(default)]
    pub direct_address: Option<String>,
    #[serde(default)]
    pub server_url: Option<String>,
}

impl PeerHints {
    pub fn is_empty(&self) -> bool {
        self.bootstrap_peers.is_empty()
            && self.topic_hash.is_none()
            && self.direct_address.is_none()
            && self.server_url.is_none()
    }

    /// The explicit topic, or the one derived from a workspace target.
    pub fn topic_for(&self, target: &EntityRef) -> Option<TopicHash> {
        self.topic_hash.or_else(|| match target.entity_type {
            EntityType::Workspace => Some(TopicHash::for_workspace(&target.id)),
            _ => None,
        })
    }
}

/// Everything a direct or compressed invite link carries.
///
/// `signature` and `owner_public_key` are kept as the encoded text found in
/// the link; decoding them is part of (soft) signature verification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvitePayload {
    pub entity_type: EntityType,
    pub entity_id: EntityId,
    pub permission: PermissionLevel,
    #[serde(default)]
    pub expiry: Option<i64>,
    /// Base64url Ed25519 signature over the claims.
    #[serde(default)]
    pub signature: Option<String>,
    /// Hex Ed25519 public key of the signer.
    #[serde(default)]
    pub owner_public_key: Option<String>,
    #[serde(default)]
    pub secret: Option<InviteSecret>,
    #[serde(default)]
    pub hints: PeerHints,
}

impl InvitePayload {
    pub fn new(target: EntityRef, permission: PermissionLevel) -> Self {
        Self {
            entity_type: target.entity_type,
            entity_id: target.id,
            permission,
            expiry: None,
            signature: None,
            owner_public_key: None,
            secret: None,
            hints: PeerHints::default(),
        }
    }

    pub fn target(&self) -> EntityRef {
        EntityRef::new(self.entity_type, self.entity_id.clone())
    }

    /// The exact bytes a signer signs for this payload.
    pub fn signing_message(&self) -> Result<Vec<u8>> {
        signing_message(&self.target(), self.permission, self.expiry)
    }

    /// Sign the claims with `keypair`, replacing any previous signature.
    pub fn sign(&mut self, keypair: &Keypair) -> Result<()> {
        let message = self.signing_message()?;
        let signature = keypair.sign(&message);
        self.signature = Some(URL_SAFE_NO_PAD.encode(signature.as_bytes()));
        self.owner_public_key = Some(keypair.public_key().to_hex());
        Ok(())
    }

    /// Whether the link carries any signature field at all.
    pub fn has_signature_fields(&self) -> bool {
        self.signature.is_some() || self.owner_public_key.is_some()
    }

    /// Cryptographically verify the signature fields.
    ///
    /// Ignores expiry; callers enforce it separately and first.
    pub fn verify(&self) -> Result<Ed25519PublicKey> {
        let (Some(signature), Some(owner)) = (&self.signature, &self.owner_public_key) else {
            return Err(InviteError::Malformed(
                "signature and signer key must both be present".into(),
            ));
        };

        let owner = Ed25519PublicKey::from_hex(owner)?;
        let signature = Ed25519Signature::from_slice(&decode_base64(signature)?)?;
        owner.verify(&self.signing_message()?, &signature)?;
        Ok(owner)
    }

    /// Serialize to CBOR bytes.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        ciborium::into_writer(self, &mut buf)
            .map_err(|e| InviteError::SerializationError(e.to_string()))?;
        Ok(buf)
    }

    /// Deserialize from CBOR bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        ciborium::from_reader(bytes).map_err(|e| InviteError::SerializationError(e.to_string()))
    }
}

/// Build the signed message for a set of claims.
pub fn signing_message(
    target: &EntityRef,
    permission: PermissionLevel,
    expiry: Option<i64>,
) -> Result<Vec<u8>> {
    let claims = (
        target.entity_type.short_code(),
        target.id.as_str(),
        permission.short_code(),
        expiry,
    );
    let mut buf = SIGN_DOMAIN.to_vec();
    ciborium::into_writer(&claims, &mut buf)
        .map_err(|e| InviteError::SerializationError(e.to_string()))?;
    Ok(buf)
}

/// Grant data returned by the token lookup service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenInviteData {
    pub entity_id: EntityId,
    pub entity_type: EntityType,
    pub permission: PermissionLevel,
    #[serde(default)]
    pub expiry: Option<i64>,
    #[serde(default)]
    pub requires_password: bool,
}

pub(crate) fn decode_base64(s: &str) -> Result<Vec<u8>> {
    URL_SAFE_NO_PAD
        .decode(s.trim_end_matches('='))
        .map_err(|e| InviteError::Malformed(format!("bad base64: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload() -> InvitePayload {
        let mut p = InvitePayload::new(EntityRef::workspace("ws-1"), PermissionLevel::Editor);
        p.expiry = Some(1_700_000_000_000);
        p
    }

    #[test]
    fn test_sign_then_verify() {
        let keypair = Keypair::from_seed(&[7u8; 32]);
        let mut p = payload();
        p.sign(&keypair).unwrap();

        assert_eq!(p.verify().unwrap(), keypair.public_key());
    }

    #[test]
    fn test_changing_permission_breaks_signature() {
        let keypair = Keypair::from_seed(&[7u8; 32]);
        let mut p = payload();
        p.sign(&keypair).unwrap();
        p.permission = PermissionLevel::Owner;

        assert!(p.verify().is_err());
    }

    #[test]
    fn test_changing_expiry_breaks_signature() {
        let keypair = Keypair::from_seed(&[7u8; 32]);
        let mut p = payload();
        p.sign(&keypair).unwrap();
        p.expiry = Some(i64::MAX);

        assert!(p.verify().is_err());
    }

    #[test]
    fn test_hints_are_not_signed() {
        let keypair = Keypair::from_seed(&[7u8; 32]);
        let mut p = payload();
        p.sign(&keypair).unwrap();
        p.hints.server_url = Some("wss://relay.example".into());

        assert!(p.verify().is_ok());
    }

    #[test]
    fn test_malformed_signature_text() {
        let mut p = payload();
        p.signature = Some("!!not base64!!".into());
        p.owner_public_key = Some(Keypair::generate().public_key().to_hex());
        assert!(matches!(p.verify(), Err(InviteError::Malformed(_))));
    }

    #[test]
    fn test_cbor_roundtrip_keeps_secret() {
        let mut p = payload();
        p.secret = Some(InviteSecret::Key(EncryptionKey([9u8; 32])));
        let decoded = InvitePayload::from_bytes(&p.to_bytes().unwrap()).unwrap();
        assert_eq!(decoded, p);
    }

    #[test]
    fn test_topic_derived_only_for_workspaces() {
        let hints = PeerHints::default();
        assert!(hints.topic_for(&EntityRef::workspace("w")).is_some());
        assert!(hints.topic_for(&EntityRef::document("d")).is_none());
    }

    #[test]
    fn test_debug_does_not_leak_secrets() {
        let secret = InviteSecret::Password("hunter2".into());
        assert!(!format!("{secret:?}").contains("hunter2"));
    }
}
