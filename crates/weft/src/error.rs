//! Error types for the Weft facade.

use thiserror::Error;
use weft_invite::InviteError;

/// Errors that can occur in Weft operations.
#[derive(Debug, Error)]
pub enum WeftError {
    /// Invite error.
    #[error("invite error: {0}")]
    Invite(#[from] InviteError),

    /// Peer connection failed.
    #[error("connection failed: {0}")]
    Connect(String),

    /// Configuration could not be loaded.
    #[error("invalid configuration: {0}")]
    Config(String),
}

impl From<serde_json::Error> for WeftError {
    fn from(e: serde_json::Error) -> Self {
        WeftError::Config(e.to_string())
    }
}

/// Result type for Weft operations.
pub type Result<T> = std::result::Result<T, WeftError>;
