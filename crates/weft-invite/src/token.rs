//! Server-issued invite tokens.
//!
//! A token link only names a token; the grant data lives with the invite
//! service. Lookups are idempotent. Consuming a token happens once, at join
//! time, and is never retried automatically.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

use crate::config::InviteConfig;
use crate::error::{InviteError, Result};
use crate::payload::TokenInviteData;

/// Opaque token from a `t/` link.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InviteToken(String);

impl InviteToken {
    /// Accepts non-empty tokens made of URL-safe characters.
    pub fn parse(s: &str) -> Result<Self> {
        let valid = !s.is_empty()
            && s
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | '~'));
        if !valid {
            return Err(InviteError::Malformed(format!("bad invite token: {s:?}")));
        }
        Ok(Self(s.to_string()))
    }

    /// A random 22-character token.
    pub fn generate() -> Self {
        use base64::engine::general_purpose::URL_SAFE_NO_PAD;
        use base64::Engine;
        use rand::RngCore;

        let mut bytes = [0u8; 16];
        rand::thread_rng().fill_bytes(&mut bytes);
        Self(URL_SAFE_NO_PAD.encode(bytes))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for InviteToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The companion service that stores token invites.
#[async_trait]
pub trait TokenService: Send + Sync {
    /// Fetch the grant data behind a token.
    async fn lookup(&self, token: &InviteToken) -> Result<TokenInviteData>;

    /// Mark a token as used. Fails if it was already consumed.
    async fn consume(&self, token: &InviteToken) -> Result<()>;
}

/// [`TokenService`] over HTTP.
///
/// `GET {base}/invites/{token}` and `POST {base}/invites/{token}/use`.
#[derive(Debug, Clone)]
pub struct HttpTokenService {
    client: reqwest::Client,
    base_url: String,
}

impl HttpTokenService {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    /// Build from config. Fails if no service URL is configured.
    pub fn from_config(config: &InviteConfig) -> Result<Self> {
        let base_url = config
            .token_service_url
            .as_deref()
            .ok_or_else(|| InviteError::TokenService("no token service configured".into()))?;
        Self::new(base_url, Duration::from_secs(config.request_timeout_secs))
    }

    fn invite_url(&self, token: &InviteToken) -> String {
        format!("{}/invites/{}", self.base_url, token)
    }
}

#[async_trait]
impl TokenService for HttpTokenService {
    async fn lookup(&self, token: &InviteToken) -> Result<TokenInviteData> {
        let resp = self.client.get(self.invite_url(token)).send().await?;
        match resp.status().as_u16() {
            200..=299 => Ok(resp.json::<TokenInviteData>().await?),
            404 => Err(InviteError::TokenNotFound),
            410 => Err(InviteError::Expired { expiry: None }),
            status => Err(InviteError::TokenService(format!(
                "lookup returned HTTP {status}"
            ))),
        }
    }

    async fn consume(&self, token: &InviteToken) -> Result<()> {
        let url = format!("{}/use", self.invite_url(token));
        let resp = self.client.post(url).send().await?;
        match resp.status().as_u16() {
            200..=299 => Ok(()),
            404 => Err(InviteError::TokenNotFound),
            409 => Err(InviteError::TokenAlreadyUsed),
            410 => Err(InviteError::Expired { expiry: None }),
            status => Err(InviteError::TokenService(format!(
                "consume returned HTTP {status}"
            ))),
        }
    }
}

/// An in-memory token service for tests and offline use.
pub mod memory {
    use super::*;
    use std::collections::HashMap;
    use tokio::sync::RwLock;

    #[derive(Debug)]
    struct Entry {
        data: TokenInviteData,
        used: bool,
    }

    /// Tokens held in a map.
    #[derive(Debug, Default)]
    pub struct MemoryTokenService {
        entries: RwLock<HashMap<InviteToken, Entry>>,
    }

    impl MemoryTokenService {
        pub fn new() -> Self {
            Self::default()
        }

        /// Register a token.
        pub async fn issue(&self, token: InviteToken, data: TokenInviteData) {
            self.entries
                .write()
                .await
                .insert(token, Entry { data, used: false });
        }

        /// Whether a token has been consumed.
        pub async fn is_used(&self, token: &InviteToken) -> bool {
            self.entries
                .read()
                .await
                .get(token)
                .map(|e| e.used)
                .unwrap_or(false)
        }
    }

    #[async_trait]
    impl TokenService for MemoryTokenService {
        async fn lookup(&self, token: &InviteToken) -> Result<TokenInviteData> {
            self.entries
                .read()
                .await
                .get(token)
                .map(|e| e.data.clone())
                .ok_or(InviteError::TokenNotFound)
        }

        async fn consume(&self, token: &InviteToken) -> Result<()> {
            let mut entries = self.entries.write().await;
            let entry = entries.get_mut(token).ok_or(InviteError::TokenNotFound)?;
            if entry.used {
                return Err(InviteError::TokenAlreadyUsed);
            }
            entry.used = true;
            Ok(())
        }
    }
}
