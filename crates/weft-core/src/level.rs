//! The permission lattice.
//!
//! Levels are totally ordered: `Owner > Editor > Viewer > None`. Every
//! comparison in Weft is ordinal; there are no other levels and no partial
//! capabilities.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::CoreError;

/// A user's capability on an entity.
///
/// Variant order is significant: the derived `Ord` is the permission order.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum PermissionLevel {
    /// No access at all.
    #[default]
    None,
    /// Read-only access.
    Viewer,
    /// Read and write access.
    Editor,
    /// Full control, including sharing at owner level and deletion of workspaces.
    Owner,
}

impl PermissionLevel {
    /// Every level, highest first.
    pub const ALL: [PermissionLevel; 4] = [
        PermissionLevel::Owner,
        PermissionLevel::Editor,
        PermissionLevel::Viewer,
        PermissionLevel::None,
    ];

    /// Ordinal of this level (`None` is 0, `Owner` is 3).
    pub const fn ordinal(self) -> u8 {
        match self {
            PermissionLevel::None => 0,
            PermissionLevel::Viewer => 1,
            PermissionLevel::Editor => 2,
            PermissionLevel::Owner => 3,
        }
    }

    /// Inverse of [`PermissionLevel::ordinal`].
    pub const fn from_ordinal(ordinal: u8) -> Option<Self> {
        match ordinal {
            0 => Some(PermissionLevel::None),
            1 => Some(PermissionLevel::Viewer),
            2 => Some(PermissionLevel::Editor),
            3 => Some(PermissionLevel::Owner),
            _ => None,
        }
    }

    /// True iff `self` satisfies a requirement of `need`.
    ///
    /// `None` only ever satisfies a `None` requirement.
    pub const fn is_at_least(self, need: PermissionLevel) -> bool {
        self.ordinal() >= need.ordinal()
    }

    /// Lowercase name used in text and JSON.
    pub const fn as_str(self) -> &'static str {
        match self {
            PermissionLevel::None => "none",
            PermissionLevel::Viewer => "viewer",
            PermissionLevel::Editor => "editor",
            PermissionLevel::Owner => "owner",
        }
    }

    /// Single-letter form used inside invite links.
    pub const fn short_code(self) -> &'static str {
        match self {
            PermissionLevel::None => "n",
            PermissionLevel::Viewer => "v",
            PermissionLevel::Editor => "e",
            PermissionLevel::Owner => "o",
        }
    }

    /// Levels a holder of `self` may hand out to someone else, highest first.
    pub fn grantable(self) -> Vec<PermissionLevel> {
        PermissionLevel::ALL
            .into_iter()
            .filter(|level| *level != PermissionLevel::None && self.is_at_least(*level))
            .collect()
    }
}

impl fmt::Display for PermissionLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PermissionLevel {
    type Err = CoreError;

    /// Accepts the full lowercase names and the single-letter link codes,
    /// case-insensitively.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "owner" | "o" => Ok(PermissionLevel::Owner),
            "editor" | "e" => Ok(PermissionLevel::Editor),
            "viewer" | "v" => Ok(PermissionLevel::Viewer),
            "none" | "n" => Ok(PermissionLevel::None),
            _ => Err(CoreError::UnknownPermission(s.to_string())),
        }
    }
}
