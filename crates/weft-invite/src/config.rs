//! Invite configuration.

use serde::{Deserialize, Serialize};

/// Settings for link parsing and the token service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct InviteConfig {
    /// Native link scheme, without `://`.
    pub scheme: String,

    /// Base of externally shareable URLs (`<base>/join/...`).
    pub share_base_url: String,

    /// Base URL of the token lookup service. Token links fail without it.
    pub token_service_url: Option<String>,

    /// Timeout for each token service request, in seconds.
    pub request_timeout_secs: u64,

    /// Upper bound on the base64 body of a compressed link.
    pub max_compressed_len: usize,

    /// Upper bound on the expanded size of a compressed link.
    pub max_expanded_len: usize,
}

impl Default for InviteConfig {
    fn default() -> Self {
        Self {
            scheme: "weft".to_string(),
            share_base_url: "https://weft.app".to_string(),
            token_service_url: None,
            request_timeout_secs: 10,
            max_compressed_len: 8 * 1024,
            max_expanded_len: 64 * 1024,
        }
    }
}

impl InviteConfig {
    /// `<scheme>://`
    pub fn link_prefix(&self) -> String {
        format!("{}://", self.scheme)
    }
}
