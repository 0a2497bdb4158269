//! Named actions and the levels they require.
//!
//! The action table is a closed enum. Strings only enter at
//! [`Action::from_str`], the deserialization boundary for externally
//! requested actions; everything past that point is checked at compile time.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use tracing::warn;

use weft_core::PermissionLevel;

use crate::error::PermsError;

/// Something a user may attempt on an entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Action {
    View,
    Edit,
    Create,
    Delete,
    Restore,
    ShareViewer,
    ShareEditor,
    ShareOwner,
    DeleteWorkspace,
    PromoteOwner,
}

impl Action {
    /// Every recognized action.
    pub const ALL: [Action; 10] = [
        Action::View,
        Action::Edit,
        Action::Create,
        Action::Delete,
        Action::Restore,
        Action::ShareViewer,
        Action::ShareEditor,
        Action::ShareOwner,
        Action::DeleteWorkspace,
        Action::PromoteOwner,
    ];

    /// Minimum level needed to perform this action.
    pub const fn required_level(self) -> PermissionLevel {
        match self {
            Action::View | Action::ShareViewer => PermissionLevel::Viewer,
            Action::Edit
            | Action::Create
            | Action::Delete
            | Action::Restore
            | Action::ShareEditor => PermissionLevel::Editor,
            Action::ShareOwner | Action::DeleteWorkspace | Action::PromoteOwner => {
                PermissionLevel::Owner
            }
        }
    }

    /// The share action that hands out `level`, if `level` can be shared at all.
    pub const fn share(level: PermissionLevel) -> Option<Action> {
        match level {
            PermissionLevel::Owner => Some(Action::ShareOwner),
            PermissionLevel::Editor => Some(Action::ShareEditor),
            PermissionLevel::Viewer => Some(Action::ShareViewer),
            PermissionLevel::None => None,
        }
    }

    /// Wire name of the action.
    pub const fn as_str(self) -> &'static str {
        match self {
            Action::View => "view",
            Action::Edit => "edit",
            Action::Create => "create",
            Action::Delete => "delete",
            Action::Restore => "restore",
            Action::ShareViewer => "share-viewer",
            Action::ShareEditor => "share-editor",
            Action::ShareOwner => "share-owner",
            Action::DeleteWorkspace => "delete-workspace",
            Action::PromoteOwner => "promote-owner",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Action {
    type Err = PermsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Action::ALL
            .into_iter()
            .find(|action| action.as_str() == s)
            .ok_or_else(|| PermsError::UnknownAction(s.to_string()))
    }
}

/// Minimum level for a named action, or `None` if the name is not recognized.
pub fn required_level(action: &str) -> Option<PermissionLevel> {
    action.parse::<Action>().ok().map(Action::required_level)
}

/// True iff `have` meets `need` in the ordinal order.
pub fn is_at_least(have: PermissionLevel, need: PermissionLevel) -> bool {
    have.is_at_least(need)
}

/// Whether a holder of `have` may perform `action`.
pub fn authorize(action: Action, have: PermissionLevel) -> bool {
    have.is_at_least(action.required_level())
}

/// Whether a holder of `have` may perform the action called `name`.
///
/// Unrecognized names are denied with a diagnostic.
pub fn authorize_named(name: &str, have: PermissionLevel) -> bool {
    match name.parse::<Action>() {
        Ok(action) => authorize(action, have),
        Err(_) => {
            warn!(action = name, "denying unknown action");
            false
        }
    }
}

/// Levels a holder of `have` may grant to others, highest first.
pub fn available_share_levels(have: PermissionLevel) -> Vec<PermissionLevel> {
    have.grantable()
}
