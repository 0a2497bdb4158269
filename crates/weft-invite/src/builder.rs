//! Creating invite links.

use weft_core::{EntityRef, Keypair, PermissionLevel, TopicHash};

use crate::codec;
use crate::config::InviteConfig;
use crate::error::{InviteError, Result};
use crate::payload::{EncryptionKey, InvitePayload, InviteSecret};
use crate::token::InviteToken;

/// Builder for link-carried invites.
///
/// The signature is computed last, over the final claims.
///
/// ```
/// use weft_core::{EntityRef, Keypair, PermissionLevel};
/// use weft_invite::{InviteBuilder, InviteConfig};
///
/// let owner = Keypair::generate();
/// let link = InviteBuilder::new(EntityRef::workspace("ws-1"), PermissionLevel::Editor)
///     .expires_at(1_900_000_000_000)
///     .signed_by(&owner)
///     .direct_link(&InviteConfig::default())
///     .unwrap();
/// assert!(link.starts_with("weft://w/ws-1#"));
/// ```
#[derive(Debug, Clone)]
pub struct InviteBuilder {
    payload: InvitePayload,
    signer: Option<Keypair>,
}

impl InviteBuilder {
    pub fn new(target: EntityRef, permission: PermissionLevel) -> Self {
        Self {
            payload: InvitePayload::new(target, permission),
            signer: None,
        }
    }

    /// Unix ms after which the invite is refused.
    pub fn expires_at(mut self, expiry: i64) -> Self {
        self.payload.expiry = Some(expiry);
        self
    }

    /// Embed a workspace password. Replaces any encryption key.
    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.payload.secret = Some(InviteSecret::Password(password.into()));
        self
    }

    /// Embed a content key. Replaces any password.
    pub fn encryption_key(mut self, key: EncryptionKey) -> Self {
        self.payload.secret = Some(InviteSecret::Key(key));
        self
    }

    pub fn bootstrap_peers<I, S>(mut self, peers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.payload.hints.bootstrap_peers = peers.into_iter().map(Into::into).collect();
        self
    }

    pub fn topic(mut self, topic: TopicHash) -> Self {
        self.payload.hints.topic_hash = Some(topic);
        self
    }

    pub fn direct_address(mut self, address: impl Into<String>) -> Self {
        self.payload.hints.direct_address = Some(address.into());
        self
    }

    pub fn server_url(mut self, url: impl Into<String>) -> Self {
        self.payload.hints.server_url = Some(url.into());
        self
    }

    /// Sign the claims with `owner` when building.
    pub fn signed_by(mut self, owner: &Keypair) -> Self {
        self.signer = Some(owner.clone());
        self
    }

    /// The finished payload.
    pub fn build(self) -> Result<InvitePayload> {
        if self.payload.permission == PermissionLevel::None {
            return Err(InviteError::Malformed("invite grants no permission".into()));
        }
        let mut payload = self.payload;
        if let Some(signer) = &self.signer {
            payload.sign(signer)?;
        }
        Ok(payload)
    }

    /// `weft://<w|f|d>/<id>#...`
    pub fn direct_link(self, config: &InviteConfig) -> Result<String> {
        Ok(codec::encode_direct(&self.build()?, config))
    }

    /// `weft://c/...`
    pub fn compressed_link(self, config: &InviteConfig) -> Result<String> {
        codec::encode_compressed(&self.build()?, config)
    }

    /// The share URL wrapping the direct link.
    pub fn share_url(self, config: &InviteConfig) -> Result<String> {
        let direct = self.direct_link(config)?;
        codec::to_share_url(&direct, config)
    }
}

/// `weft://t/<token>`
pub fn token_link(token: &InviteToken, config: &InviteConfig) -> String {
    format!(
        "{}{}/{}",
        config.link_prefix(),
        codec::TOKEN_SEGMENT,
        token
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validator::{InviteValidator, ParsedInvite};

    #[test]
    fn test_builder_signs_final_claims() {
        let owner = Keypair::from_seed(&[5u8; 32]);
        let payload = InviteBuilder::new(EntityRef::document("D"), PermissionLevel::Viewer)
            .signed_by(&owner)
            .expires_at(42)
            .build()
            .unwrap();

        assert_eq!(payload.verify().unwrap(), owner.public_key());
    }

    #[test]
    fn test_password_and_key_are_exclusive() {
        let payload = InviteBuilder::new(EntityRef::workspace("W"), PermissionLevel::Editor)
            .password("pw")
            .encryption_key(EncryptionKey::generate())
            .build()
            .unwrap();
        assert!(matches!(payload.secret, Some(InviteSecret::Key(_))));
    }

    #[test]
    fn test_none_permission_is_refused() {
        assert!(InviteBuilder::new(EntityRef::workspace("W"), PermissionLevel::None)
            .build()
            .is_err());
    }

    #[test]
    fn test_every_link_form_parses_back() {
        let config = InviteConfig::default();
        let validator = InviteValidator::new(config.clone());
        let builder = InviteBuilder::new(EntityRef::workspace("W"), PermissionLevel::Editor)
            .bootstrap_peers(["peer-1"])
            .signed_by(&Keypair::from_seed(&[6u8; 32]));
        let expected = builder.clone().build().unwrap();

        let direct = builder.clone().direct_link(&config).unwrap();
        let compressed = builder.clone().compressed_link(&config).unwrap();
        let shared = builder.share_url(&config).unwrap();

        assert_eq!(validator.parse(&direct).unwrap().payload(), Some(&expected));
        assert_eq!(validator.parse(&compressed).unwrap().payload(), Some(&expected));
        assert_eq!(validator.parse(&shared).unwrap().payload(), Some(&expected));

        let token = InviteToken::generate();
        assert_eq!(
            validator.parse(&token_link(&token, &config)).unwrap(),
            ParsedInvite::Token(token)
        );
    }
}
