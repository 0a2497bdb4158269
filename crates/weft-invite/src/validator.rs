//! Turning raw invite text into something that can be granted.
//!
//! Three steps, each with its own failure mode:
//!
//! 1. [`InviteValidator::parse`] recognizes the encoding. Pure.
//! 2. [`InviteValidator::resolve`] produces the grant claims, fetching them
//!    from the token service for token links. The only suspension point.
//! 3. [`InviteValidator::validate`] applies the expiry and signature policy.

use serde::{Deserialize, Serialize};
use tracing::debug;

use weft_core::{EntityRef, EntityType, PermissionLevel, TopicHash};

use crate::codec::{self, Expanded};
use crate::config::InviteConfig;
use crate::error::{InviteError, Result};
use crate::payload::{InvitePayload, InviteSecret, PeerHints, TokenInviteData};
use crate::signature::{is_expired, SignatureCheck, SignatureStatus};
use crate::token::{InviteToken, TokenService};

/// A recognized invite, one case per encoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParsedInvite {
    /// `weft://<w|f|d>/<id>#<fields>`
    Direct(InvitePayload),
    /// `weft://c/<body>`
    Compressed(InvitePayload),
    /// `weft://t/<token>`
    Token(InviteToken),
    /// `https://<host>/join/<rest>`, wrapping the native link it normalized to.
    Shared(Box<ParsedInvite>),
}

impl ParsedInvite {
    /// The native encoding under any share-URL wrapper.
    pub fn inner(&self) -> &ParsedInvite {
        match self {
            ParsedInvite::Shared(inner) => inner.inner(),
            other => other,
        }
    }

    fn into_inner(self) -> ParsedInvite {
        match self {
            ParsedInvite::Shared(inner) => inner.into_inner(),
            other => other,
        }
    }

    /// The embedded payload, for link-carried invites.
    pub fn payload(&self) -> Option<&InvitePayload> {
        match self.inner() {
            ParsedInvite::Direct(p) | ParsedInvite::Compressed(p) => Some(p),
            _ => None,
        }
    }

    pub fn token(&self) -> Option<&InviteToken> {
        match self.inner() {
            ParsedInvite::Token(t) => Some(t),
            _ => None,
        }
    }

    /// Short name of the encoding, for logs.
    pub fn encoding(&self) -> &'static str {
        match self {
            ParsedInvite::Direct(_) => "direct",
            ParsedInvite::Compressed(_) => "compressed",
            ParsedInvite::Token(_) => "token",
            ParsedInvite::Shared(_) => "shared",
        }
    }
}

/// Grant claims of an invite, whatever encoding they came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedInvite {
    pub target: EntityRef,
    pub permission: PermissionLevel,
    pub expiry: Option<i64>,
    /// The joiner must supply a password the invite does not carry.
    pub requires_password: bool,
    pub secret: Option<InviteSecret>,
    pub hints: PeerHints,
    pub status: SignatureStatus,
    /// Set for token invites; consumed at join time.
    pub token: Option<InviteToken>,
}

impl ResolvedInvite {
    fn from_payload(payload: InvitePayload) -> Self {
        let status = SignatureStatus::of(&payload);
        Self {
            target: payload.target(),
            permission: payload.permission,
            expiry: payload.expiry,
            requires_password: false,
            secret: payload.secret,
            hints: payload.hints,
            status,
            token: None,
        }
    }

    fn from_token(token: InviteToken, data: TokenInviteData) -> Result<Self> {
        if data.permission == PermissionLevel::None {
            return Err(InviteError::Malformed("invite grants no permission".into()));
        }
        Ok(Self {
            target: EntityRef::new(data.entity_type, data.entity_id),
            permission: data.permission,
            expiry: data.expiry,
            requires_password: data.requires_password,
            secret: None,
            hints: PeerHints::default(),
            status: SignatureStatus::Unsigned,
            token: Some(token),
        })
    }

    /// Discovery topic for the target, explicit or derived.
    pub fn topic(&self) -> Option<TopicHash> {
        self.hints.topic_for(&self.target)
    }

    /// The workspace to join, when the target is one.
    pub fn workspace(&self) -> Option<&EntityRef> {
        (self.target.entity_type == EntityType::Workspace).then_some(&self.target)
    }
}

/// Something worth telling the user about an invite that is still usable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "detail", rename_all = "kebab-case")]
pub enum ValidationWarning {
    /// A link-carried invite with no signature.
    Unsigned,
    /// Signature fields are present but did not verify.
    SignatureUnverified(String),
}

impl ValidationWarning {
    pub fn message(&self) -> &'static str {
        match self {
            ValidationWarning::Unsigned => {
                "This invite is not signed. Only continue if you trust the sender."
            }
            ValidationWarning::SignatureUnverified(_) => {
                "This invite's signature could not be verified. Only continue if you trust the sender."
            }
        }
    }
}

/// A resolved invite that passed validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedInvite {
    pub invite: ResolvedInvite,
    pub warning: Option<ValidationWarning>,
}

/// Parses and validates invites against one configuration.
#[derive(Debug, Clone, Default)]
pub struct InviteValidator {
    config: InviteConfig,
}

impl InviteValidator {
    pub fn new(config: InviteConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &InviteConfig {
        &self.config
    }

    /// Unwrap a share URL into its native link; native links pass through.
    pub fn normalize(&self, raw: &str) -> Result<String> {
        let raw = raw.trim();
        if codec::is_share_url(raw) {
            codec::normalize_share_url(raw, &self.config)
        } else {
            Ok(raw.to_string())
        }
    }

    /// Wrap a native link into a share URL.
    pub fn to_share_url(&self, native: &str) -> Result<String> {
        codec::to_share_url(native.trim(), &self.config)
    }

    /// Recognize the encoding of `raw`.
    pub fn parse(&self, raw: &str) -> Result<ParsedInvite> {
        let raw = raw.trim();
        if codec::is_share_url(raw) {
            let native = codec::normalize_share_url(raw, &self.config)?;
            let inner = self.parse_native(&native)?;
            return Ok(ParsedInvite::Shared(Box::new(inner)));
        }
        self.parse_native(raw)
    }

    fn parse_native(&self, raw: &str) -> Result<ParsedInvite> {
        let rest = self.strip_scheme(raw)?;
        let (kind, body) = rest
            .split_once('/')
            .ok_or_else(|| InviteError::Malformed("missing link kind".into()))?;

        match kind {
            codec::COMPRESSED_SEGMENT => {
                let body = body.split('#').next().unwrap_or_default();
                match codec::expand(body, &self.config)? {
                    Expanded::Payload(payload) => Ok(ParsedInvite::Compressed(payload)),
                    Expanded::Link(text) => {
                        let (entity_type, rest) = self.direct_parts(self.strip_scheme(&text)?)?;
                        Ok(ParsedInvite::Compressed(codec::decode_direct(
                            entity_type,
                            rest,
                        )?))
                    }
                }
            }
            codec::TOKEN_SEGMENT => {
                let token = body.split('#').next().unwrap_or_default();
                Ok(ParsedInvite::Token(InviteToken::parse(token)?))
            }
            _ => {
                let (entity_type, rest) = self.direct_parts(rest)?;
                Ok(ParsedInvite::Direct(codec::decode_direct(entity_type, rest)?))
            }
        }
    }

    fn strip_scheme<'r>(&self, raw: &'r str) -> Result<&'r str> {
        let prefix = self.config.link_prefix();
        match raw.get(..prefix.len()) {
            Some(head) if head.eq_ignore_ascii_case(&prefix) => Ok(&raw[prefix.len()..]),
            _ if raw.contains("://") => Err(InviteError::UnsupportedScheme(
                raw.split("://").next().unwrap_or_default().to_string(),
            )),
            _ => Err(InviteError::Malformed("not an invite link".into())),
        }
    }

    /// Split `<w|f|d>/<rest>`; anything else is not a direct link.
    fn direct_parts<'r>(&self, rest: &'r str) -> Result<(EntityType, &'r str)> {
        let (kind, body) = rest
            .split_once('/')
            .ok_or_else(|| InviteError::Malformed("missing link kind".into()))?;
        let entity_type = EntityType::from_short_code(kind)
            .ok_or_else(|| InviteError::Malformed(format!("unknown link kind: {kind}")))?;
        Ok((entity_type, body))
    }

    /// Check expiry and signature of a raw link without resolving it.
    ///
    /// Token links carry no claims; they report as legacy and valid here and
    /// are checked after lookup.
    pub fn validate_signature(&self, raw: &str, now: i64) -> SignatureCheck {
        match self.parse(raw) {
            Ok(parsed) => match parsed.payload() {
                Some(payload) => SignatureCheck::of(payload, now),
                None => SignatureCheck {
                    valid: true,
                    legacy: true,
                    expired: false,
                    expiry: None,
                    owner_public_key: None,
                    error: None,
                },
            },
            Err(e) => SignatureCheck::unreadable(e.to_string()),
        }
    }

    /// Produce grant claims, looking up token invites.
    pub async fn resolve(
        &self,
        parsed: ParsedInvite,
        tokens: &dyn TokenService,
    ) -> Result<ResolvedInvite> {
        match parsed.into_inner() {
            ParsedInvite::Direct(payload) | ParsedInvite::Compressed(payload) => {
                Ok(ResolvedInvite::from_payload(payload))
            }
            ParsedInvite::Token(token) => {
                let data = tokens.lookup(&token).await?;
                debug!(%token, entity = %data.entity_id, "token invite looked up");
                ResolvedInvite::from_token(token, data)
            }
            ParsedInvite::Shared(_) => Err(InviteError::Malformed("nested share URL".into())),
        }
    }

    /// Apply the expiry and signature policy at time `now` (Unix ms).
    ///
    /// Expiry is checked first and is never overridden. Signature problems
    /// only produce a warning.
    pub fn validate(&self, invite: ResolvedInvite, now: i64) -> Result<ValidatedInvite> {
        if is_expired(invite.expiry, now) {
            return Err(InviteError::Expired {
                expiry: invite.expiry,
            });
        }

        let warning = match &invite.status {
            SignatureStatus::Verified(_) => None,
            SignatureStatus::Unverified(reason) => {
                Some(ValidationWarning::SignatureUnverified(reason.clone()))
            }
            SignatureStatus::Unsigned if invite.token.is_some() => None,
            SignatureStatus::Unsigned => Some(ValidationWarning::Unsigned),
        };

        Ok(ValidatedInvite { invite, warning })
    }
}
