//! Workspace membership records and the active workspace.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use weft_core::{EntityId, PermissionLevel};

/// A workspace membership record as loaded by the workspace collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkspaceRecord {
    pub id: EntityId,

    /// The viewer's own level in this workspace.
    pub my_permission: PermissionLevel,

    /// Display name. Not substantive: renames never invalidate the cache.
    #[serde(default)]
    pub name: String,
}

impl WorkspaceRecord {
    pub fn new(id: impl Into<EntityId>, my_permission: PermissionLevel) -> Self {
        Self {
            id: id.into(),
            my_permission,
            name: String::new(),
        }
    }
}

/// The viewer's permission in every known workspace, plus which one is active.
#[derive(Debug, Clone, Default)]
pub struct WorkspaceDirectory {
    permissions: HashMap<EntityId, PermissionLevel>,
    current: Option<EntityId>,
    fingerprint: [u8; 32],
}

impl WorkspaceDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the workspace list.
    ///
    /// Returns `true` if any id or permission changed. If the same id is
    /// listed twice the later record wins.
    pub fn replace(&mut self, workspaces: &[WorkspaceRecord]) -> bool {
        let permissions: HashMap<EntityId, PermissionLevel> = workspaces
            .iter()
            .map(|w| (w.id.clone(), w.my_permission))
            .collect();

        let fingerprint = membership_fingerprint(&permissions);
        let changed = fingerprint != self.fingerprint;

        self.permissions = permissions;
        self.fingerprint = fingerprint;
        changed
    }

    /// Change the active workspace. Returns `true` if the reference changed.
    pub fn set_current(&mut self, workspace: Option<EntityId>) -> bool {
        if self.current == workspace {
            return false;
        }
        self.current = workspace;
        true
    }

    /// The active workspace, if any.
    pub fn current(&self) -> Option<&EntityId> {
        self.current.as_ref()
    }

    /// Recorded permission of a workspace, `None` (the Option) if unknown.
    pub fn permission_of(&self, workspace: &EntityId) -> Option<PermissionLevel> {
        self.permissions.get(workspace).copied()
    }

    /// Whether the viewer has a membership record for `workspace`.
    pub fn contains(&self, workspace: &EntityId) -> bool {
        self.permissions.contains_key(workspace)
    }

    pub fn len(&self) -> usize {
        self.permissions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.permissions.is_empty()
    }
}

fn membership_fingerprint(permissions: &HashMap<EntityId, PermissionLevel>) -> [u8; 32] {
    if permissions.is_empty() {
        return [0u8; 32];
    }

    let mut rows: Vec<(&EntityId, PermissionLevel)> =
        permissions.iter().map(|(id, level)| (id, *level)).collect();
    rows.sort();

    let mut hasher = blake3::Hasher::new();
    for (id, level) in rows {
        hasher.update(&(id.as_str().len() as u64).to_le_bytes());
        hasher.update(id.as_str().as_bytes());
        hasher.update(&[level.ordinal()]);
    }
    *hasher.finalize().as_bytes()
}
