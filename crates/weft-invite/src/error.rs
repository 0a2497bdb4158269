//! Error types for invitation handling.

use thiserror::Error;

/// Errors that can occur while parsing, resolving or validating an invite.
#[derive(Debug, Error)]
pub enum InviteError {
    /// The link is not in any recognized encoding or a field is unreadable.
    #[error("malformed invite link: {0}")]
    Malformed(String),

    /// The link uses a scheme other than the configured one.
    #[error("unsupported link scheme: {0}")]
    UnsupportedScheme(String),

    /// A compressed link could not be expanded.
    #[error("cannot expand compressed invite: {0}")]
    Decompression(String),

    /// The invite's expiry has passed. Never overridden.
    #[error("invite expired at {expiry:?}")]
    Expired { expiry: Option<i64> },

    /// The token is unknown to the invite service.
    #[error("invite token not found")]
    TokenNotFound,

    /// The token was already consumed.
    #[error("invite token already used")]
    TokenAlreadyUsed,

    /// The invite service could not be reached or answered with an error.
    #[error("invite service error: {0}")]
    TokenService(String),

    /// Serialization error.
    #[error("serialization error: {0}")]
    SerializationError(String),

    /// Core error.
    #[error("core error: {0}")]
    CoreError(#[from] weft_core::CoreError),
}

impl InviteError {
    /// Short, actionable text for the user.
    pub fn user_message(&self) -> &'static str {
        match self {
            InviteError::Malformed(_)
            | InviteError::UnsupportedScheme(_)
            | InviteError::Decompression(_)
            | InviteError::SerializationError(_)
            | InviteError::CoreError(_) => {
                "This invite link is invalid. Please check that you copied the whole link."
            }
            InviteError::Expired { .. } => "This invite link has expired. Please request a new one.",
            InviteError::TokenNotFound => {
                "This invite link is no longer valid. Please request a new one."
            }
            InviteError::TokenAlreadyUsed => {
                "This invite link has already been used. Please request a new one."
            }
            InviteError::TokenService(_) => {
                "Could not reach the invite service. Check your connection and try again."
            }
        }
    }
}

impl From<reqwest::Error> for InviteError {
    fn from(e: reqwest::Error) -> Self {
        InviteError::TokenService(e.to_string())
    }
}

/// Result type for invite operations.
pub type Result<T> = std::result::Result<T, InviteError>;
