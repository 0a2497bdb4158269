//! Link encodings.
//!
//! ```text
//! direct      weft://<w|f|d>/<entityId>#perm=e&exp=..&sig=..&by=..&pw=..&key=..
//!                                         &peers=a,b&topic=..&addr=..&srv=..
//! compressed  weft://c/<base64url(brotli(payload))>
//! token       weft://t/<token>
//! share URL   https://<host>/join/<anything after weft://>
//! ```
//!
//! A compressed body expands either to CBOR [`InvitePayload`] bytes or to the
//! text of a direct link.

use std::io::Read;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use brotli::{CompressorReader, Decompressor};
use url::form_urlencoded;
use url::Url;

use weft_core::{EntityId, EntityType, PermissionLevel, TopicHash};

use crate::config::InviteConfig;
use crate::error::{InviteError, Result};
use crate::payload::{decode_base64, EncryptionKey, InvitePayload, InviteSecret};

/// Path segment of compressed links.
pub const COMPRESSED_SEGMENT: &str = "c";

/// Path segment of token links.
pub const TOKEN_SEGMENT: &str = "t";

/// Path prefix of share URLs.
pub const SHARE_PATH: &str = "/join/";

const BROTLI_QUALITY: u32 = 9;
const BROTLI_WINDOW: u32 = 22;
const BROTLI_BUFFER: usize = 4096;

mod fields {
    pub const PERMISSION: &str = "perm";
    pub const EXPIRY: &str = "exp";
    pub const SIGNATURE: &str = "sig";
    pub const SIGNER: &str = "by";
    pub const PASSWORD: &str = "pw";
    pub const KEY: &str = "key";
    pub const PEERS: &str = "peers";
    pub const TOPIC: &str = "topic";
    pub const ADDRESS: &str = "addr";
    pub const SERVER: &str = "srv";
}

// ─────────────────────────────────────────────────────────────────────────────
// Direct links
// ─────────────────────────────────────────────────────────────────────────────

/// Encode a payload as a direct link.
pub fn encode_direct(payload: &InvitePayload, config: &InviteConfig) -> String {
    let mut query = form_urlencoded::Serializer::new(String::new());
    query.append_pair(fields::PERMISSION, payload.permission.short_code());
    if let Some(expiry) = payload.expiry {
        query.append_pair(fields::EXPIRY, &expiry.to_string());
    }
    if let Some(signature) = &payload.signature {
        query.append_pair(fields::SIGNATURE, signature);
    }
    if let Some(owner) = &payload.owner_public_key {
        query.append_pair(fields::SIGNER, owner);
    }
    match &payload.secret {
        Some(InviteSecret::Password(password)) => {
            query.append_pair(fields::PASSWORD, password);
        }
        Some(InviteSecret::Key(key)) => {
            query.append_pair(fields::KEY, &key.to_base64());
        }
        None => {}
    }
    let hints = &payload.hints;
    if !hints.bootstrap_peers.is_empty() {
        query.append_pair(fields::PEERS, &hints.bootstrap_peers.join(","));
    }
    if let Some(topic) = &hints.topic_hash {
        query.append_pair(fields::TOPIC, &topic.to_hex());
    }
    if let Some(address) = &hints.direct_address {
        query.append_pair(fields::ADDRESS, address);
    }
    if let Some(server) = &hints.server_url {
        query.append_pair(fields::SERVER, server);
    }

    format!(
        "{}{}/{}#{}",
        config.link_prefix(),
        payload.entity_type.short_code(),
        encode_component(payload.entity_id.as_str()),
        query.finish()
    )
}

/// Decode the part of a direct link after `<scheme>://`.
pub(crate) fn decode_direct(entity_type: EntityType, rest: &str) -> Result<InvitePayload> {
    let (id_part, fragment) = rest.split_once('#').unwrap_or((rest, ""));
    let entity_id = EntityId::parse(&decode_component(id_part))
        .map_err(|e| InviteError::Malformed(e.to_string()))?;

    let mut permission = None;
    let mut payload = InvitePayload::new(
        weft_core::EntityRef::new(entity_type, entity_id),
        PermissionLevel::None,
    );
    let mut password = None;
    let mut key = None;

    for (name, value) in form_urlencoded::parse(fragment.as_bytes()) {
        match name.as_ref() {
            fields::PERMISSION => {
                permission = Some(
                    value
                        .parse::<PermissionLevel>()
                        .map_err(|e| InviteError::Malformed(e.to_string()))?,
                )
            }
            fields::EXPIRY => {
                let expiry = value
                    .parse::<i64>()
                    .map_err(|_| InviteError::Malformed(format!("bad expiry: {value}")))?;
                payload.expiry = Some(expiry);
            }
            fields::SIGNATURE => payload.signature = Some(value.into_owned()),
            fields::SIGNER => payload.owner_public_key = Some(value.into_owned()),
            fields::PASSWORD => password = Some(value.into_owned()),
            fields::KEY => key = Some(EncryptionKey::from_base64(&value)?),
            fields::PEERS => {
                payload.hints.bootstrap_peers = value
                    .split(',')
                    .map(str::trim)
                    .filter(|p| !p.is_empty())
                    .map(String::from)
                    .collect()
            }
            fields::TOPIC => {
                payload.hints.topic_hash = Some(
                    TopicHash::from_hex(&value)
                        .map_err(|e| InviteError::Malformed(format!("bad topic: {e}")))?,
                )
            }
            fields::ADDRESS => payload.hints.direct_address = Some(value.into_owned()),
            fields::SERVER => payload.hints.server_url = Some(value.into_owned()),
            other => tracing::trace!(field = other, "ignoring unknown invite field"),
        }
    }

    payload.permission = match permission {
        Some(PermissionLevel::None) => {
            return Err(InviteError::Malformed("invite grants no permission".into()))
        }
        Some(level) => level,
        None => return Err(InviteError::Malformed("missing permission".into())),
    };

    payload.secret = match (password, key) {
        (Some(_), Some(_)) => {
            return Err(InviteError::Malformed(
                "invite carries both a password and a key".into(),
            ))
        }
        (Some(password), None) => Some(InviteSecret::Password(password)),
        (None, Some(key)) => Some(InviteSecret::Key(key)),
        (None, None) => None,
    };

    Ok(payload)
}

// ─────────────────────────────────────────────────────────────────────────────
// Compressed links
// ─────────────────────────────────────────────────────────────────────────────

/// Encode a payload as a compressed link.
pub fn encode_compressed(payload: &InvitePayload, config: &InviteConfig) -> Result<String> {
    let body = compress(&payload.to_bytes()?)?;
    Ok(format!(
        "{}{}/{}",
        config.link_prefix(),
        COMPRESSED_SEGMENT,
        URL_SAFE_NO_PAD.encode(body)
    ))
}

/// What a compressed body expanded to.
pub(crate) enum Expanded {
    Payload(InvitePayload),
    Link(String),
}

/// Expand the body of a compressed link.
pub(crate) fn expand(body: &str, config: &InviteConfig) -> Result<Expanded> {
    if body.len() > config.max_compressed_len {
        return Err(InviteError::Decompression(format!(
            "body is {} bytes, limit is {}",
            body.len(),
            config.max_compressed_len
        )));
    }

    let compressed = decode_base64(body)?;
    let expanded = decompress(&compressed, config.max_expanded_len)?;

    let prefix = config.link_prefix();
    let is_link = expanded
        .get(..prefix.len())
        .is_some_and(|head| head.eq_ignore_ascii_case(prefix.as_bytes()));
    if is_link {
        let text = String::from_utf8(expanded)
            .map_err(|_| InviteError::Decompression("expanded link is not UTF-8".into()))?;
        return Ok(Expanded::Link(text));
    }

    let payload = InvitePayload::from_bytes(&expanded)?;
    check_claims(&payload)?;
    Ok(Expanded::Payload(payload))
}

/// Hold a decoded payload to the same rules as a direct link.
fn check_claims(payload: &InvitePayload) -> Result<()> {
    if payload.permission == PermissionLevel::None {
        return Err(InviteError::Malformed("invite grants no permission".into()));
    }
    EntityId::parse(payload.entity_id.as_str())
        .map_err(|e| InviteError::Malformed(e.to_string()))?;
    Ok(())
}

/// Brotli-compress bytes.
pub fn compress(data: &[u8]) -> Result<Vec<u8>> {
    let mut compressor = CompressorReader::new(data, BROTLI_BUFFER, BROTLI_QUALITY, BROTLI_WINDOW);
    let mut out = Vec::new();
    compressor
        .read_to_end(&mut out)
        .map_err(|e| InviteError::SerializationError(format!("compression failed: {e}")))?;
    Ok(out)
}

/// Brotli-decompress bytes, refusing output larger than `limit`.
pub fn decompress(data: &[u8], limit: usize) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    Decompressor::new(data, BROTLI_BUFFER)
        .take(limit as u64 + 1)
        .read_to_end(&mut out)
        .map_err(|e| InviteError::Decompression(e.to_string()))?;
    if out.len() > limit {
        return Err(InviteError::Decompression(format!(
            "expanded size exceeds {limit} bytes"
        )));
    }
    Ok(out)
}

// ─────────────────────────────────────────────────────────────────────────────
// Share URLs
// ─────────────────────────────────────────────────────────────────────────────

/// Wrap a native link into an externally shareable URL.
pub fn to_share_url(native: &str, config: &InviteConfig) -> Result<String> {
    let prefix = config.link_prefix();
    let rest = native
        .strip_prefix(&prefix)
        .ok_or_else(|| InviteError::UnsupportedScheme(native.to_string()))?;
    Ok(format!(
        "{}{}{}",
        config.share_base_url.trim_end_matches('/'),
        SHARE_PATH,
        rest
    ))
}

/// Whether `raw` looks like a share URL rather than a native link.
pub(crate) fn is_share_url(raw: &str) -> bool {
    raw.starts_with("https://") || raw.starts_with("http://")
}

/// Turn a share URL back into the native link it wraps.
pub fn normalize_share_url(raw: &str, config: &InviteConfig) -> Result<String> {
    let url = Url::parse(raw).map_err(|e| InviteError::Malformed(e.to_string()))?;
    let rest = url
        .path()
        .strip_prefix(SHARE_PATH)
        .filter(|rest| !rest.is_empty())
        .ok_or_else(|| InviteError::Malformed(format!("not an invite URL: {raw}")))?;
    if rest.contains("://") || rest.starts_with("http") {
        return Err(InviteError::Malformed("nested share URL".into()));
    }

    let mut native = format!("{}{}", config.link_prefix(), rest);
    if let Some(fragment) = url.fragment() {
        native.push('#');
        native.push_str(fragment);
    }
    Ok(native)
}

fn encode_component(s: &str) -> String {
    form_urlencoded::byte_serialize(s.as_bytes()).collect()
}

fn decode_component(s: &str) -> String {
    form_urlencoded::parse(s.as_bytes())
        .next()
        .map(|(name, _)| name.into_owned())
        .unwrap_or_default()
}
