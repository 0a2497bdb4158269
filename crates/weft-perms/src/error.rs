//! Error types for the permissions module.

use thiserror::Error;

/// Errors from the permission layer's parse boundaries.
#[derive(Debug, Error)]
pub enum PermsError {
    /// An action name that is not part of the action table.
    #[error("unknown action: {0}")]
    UnknownAction(String),
}
