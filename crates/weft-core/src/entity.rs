//! Entity identifiers.
//!
//! Workspaces, folders and documents are identified by opaque string ids
//! chosen by the collaborators that own them. An [`EntityRef`] pairs the id
//! with its type so that a folder and a document sharing an id never collide.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::CoreError;

/// Suffix of the virtual per-workspace system folder (`<workspaceId>:builtin`).
pub const SYSTEM_FOLDER_SUFFIX: &str = ":builtin";

/// The kind of entity a permission applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityType {
    Workspace,
    Folder,
    Document,
}

impl EntityType {
    /// Lowercase name used in text and JSON.
    pub const fn as_str(self) -> &'static str {
        match self {
            EntityType::Workspace => "workspace",
            EntityType::Folder => "folder",
            EntityType::Document => "document",
        }
    }

    /// Single-letter path segment used in invite links.
    pub const fn short_code(self) -> &'static str {
        match self {
            EntityType::Workspace => "w",
            EntityType::Folder => "f",
            EntityType::Document => "d",
        }
    }

    /// Parse the single-letter link code.
    pub fn from_short_code(code: &str) -> Option<Self> {
        match code {
            "w" => Some(EntityType::Workspace),
            "f" => Some(EntityType::Folder),
            "d" => Some(EntityType::Document),
            _ => None,
        }
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntityType {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "workspace" | "w" => Ok(EntityType::Workspace),
            "folder" | "f" => Ok(EntityType::Folder),
            "document" | "d" => Ok(EntityType::Document),
            _ => Err(CoreError::UnknownEntityType(s.to_string())),
        }
    }
}

/// An opaque entity identifier.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(String);

impl EntityId {
    /// Wrap an id string.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Parse an id coming from outside (links, service responses).
    ///
    /// Rejects empty ids and ids containing whitespace or control characters.
    pub fn parse(id: &str) -> Result<Self, CoreError> {
        if id.is_empty() || id.chars().any(|c| c.is_whitespace() || c.is_control()) {
            return Err(CoreError::InvalidEntityId(id.to_string()));
        }
        Ok(Self(id.to_string()))
    }

    /// The system folder id of a workspace.
    pub fn system_folder(workspace: &EntityId) -> Self {
        Self(format!("{}{}", workspace.0, SYSTEM_FOLDER_SUFFIX))
    }

    /// If this is a system folder id, the workspace it belongs to.
    pub fn system_folder_workspace(&self) -> Option<EntityId> {
        self.0
            .strip_suffix(SYSTEM_FOLDER_SUFFIX)
            .filter(|ws| !ws.is_empty())
            .map(EntityId::new)
    }

    /// The raw id string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EntityId({})", self.0)
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for EntityId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for EntityId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl AsRef<str> for EntityId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// A typed entity reference; the cache key for resolved permissions.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EntityRef {
    pub entity_type: EntityType,
    pub id: EntityId,
}

impl EntityRef {
    pub fn new(entity_type: EntityType, id: impl Into<EntityId>) -> Self {
        Self {
            entity_type,
            id: id.into(),
        }
    }

    pub fn workspace(id: impl Into<EntityId>) -> Self {
        Self::new(EntityType::Workspace, id)
    }

    pub fn folder(id: impl Into<EntityId>) -> Self {
        Self::new(EntityType::Folder, id)
    }

    pub fn document(id: impl Into<EntityId>) -> Self {
        Self::new(EntityType::Document, id)
    }
}

impl fmt::Display for EntityRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.entity_type, self.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_system_folder_roundtrip() {
        let ws = EntityId::new("ws-1");
        let folder = EntityId::system_folder(&ws);
        assert_eq!(folder.as_str(), "ws-1:builtin");
        assert_eq!(folder.system_folder_workspace(), Some(ws));
    }

    #[test]
    fn test_plain_folder_is_not_system() {
        assert_eq!(EntityId::new("f-1").system_folder_workspace(), None);
        assert_eq!(EntityId::new(":builtin").system_folder_workspace(), None);
    }

    #[test]
    fn test_refs_with_same_id_differ_by_type() {
        let folder = EntityRef::folder("x");
        let doc = EntityRef::document("x");
        assert_ne!(folder, doc);
    }

    #[test]
    fn test_parse_rejects_blank_ids() {
        assert!(EntityId::parse("").is_err());
        assert!(EntityId::parse("a b").is_err());
        assert!(EntityId::parse("abc-123").is_ok());
    }

    #[test]
    fn test_entity_type_codes() {
        for t in [EntityType::Workspace, EntityType::Folder, EntityType::Document] {
            assert_eq!(EntityType::from_short_code(t.short_code()), Some(t));
            assert_eq!(t.as_str().parse::<EntityType>().unwrap(), t);
        }
    }
}
