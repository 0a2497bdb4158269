//! Error types for Weft Core.

use thiserror::Error;

/// Errors produced while parsing or verifying core primitives.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("invalid signature")]
    InvalidSignature,

    #[error("invalid public key")]
    InvalidPublicKey,

    #[error("unknown permission level: {0}")]
    UnknownPermission(String),

    #[error("unknown entity type: {0}")]
    UnknownEntityType(String),

    #[error("invalid entity id: {0}")]
    InvalidEntityId(String),

    #[error("decoding error: {0}")]
    DecodingError(String),
}

/// Result type for core operations.
pub type Result<T> = std::result::Result<T, CoreError>;
