//! Configuration for the Weft facade.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use weft_invite::InviteConfig;

use crate::error::Result;

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct WeftConfig {
    pub invite: InviteConfig,
    pub join: JoinPolicy,
}

impl WeftConfig {
    /// Load from JSON. Missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

/// How the join flow treats borderline invites.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct JoinPolicy {
    /// Refuse invites whose signature does not verify instead of warning.
    pub reject_unverified: bool,

    /// Upper bound on peer connection, in seconds.
    pub connect_timeout_secs: u64,
}

impl Default for JoinPolicy {
    fn default() -> Self {
        Self {
            reject_unverified: false,
            connect_timeout_secs: 30,
        }
    }
}

impl JoinPolicy {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}
