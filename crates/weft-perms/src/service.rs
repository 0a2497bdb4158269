//! The permission service: the surface UI collaborators talk to.
//!
//! Owns the hierarchy snapshot, the workspace directory and the cache.
//! Collaborators push new hierarchy and membership data and read levels;
//! they never touch the cache directly. Every push that changes anything
//! substantive invalidates the whole cache before returning, so no later
//! query can observe a result computed from older inputs.

use tokio::sync::watch;
use tracing::{debug, warn};

use weft_core::{EntityId, EntityRef, EntityType, PermissionLevel};

use crate::action::{self, Action};
use crate::cache::{PermissionCache, PermissionGrant};
use crate::directory::{WorkspaceDirectory, WorkspaceRecord};
use crate::grant::{GrantCoordinator, UpgradeOutcome};
use crate::hierarchy::{DocumentRecord, FolderRecord, HierarchySnapshot};
use crate::resolver::PermissionResolver;

/// Client-side permission decision cache for one viewer.
#[derive(Debug)]
pub struct PermissionService {
    hierarchy: HierarchySnapshot,
    directory: WorkspaceDirectory,
    cache: PermissionCache,
    generation_tx: watch::Sender<u64>,
}

impl Default for PermissionService {
    fn default() -> Self {
        Self::new()
    }
}

impl PermissionService {
    /// Create a service with no workspaces and an empty hierarchy.
    pub fn new() -> Self {
        let (generation_tx, _) = watch::channel(0);
        Self {
            hierarchy: HierarchySnapshot::new(),
            directory: WorkspaceDirectory::new(),
            cache: PermissionCache::new(),
            generation_tx,
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Queries
    // ─────────────────────────────────────────────────────────────────────────

    /// The viewer's effective level on an entity.
    pub fn get_permission(&mut self, entity_type: EntityType, id: &EntityId) -> PermissionLevel {
        self.resolver().resolve(entity_type, id)
    }

    /// The viewer's effective level and the scope that decided it.
    pub fn get_grant(&mut self, entity_type: EntityType, id: &EntityId) -> PermissionGrant {
        self.resolver().resolve_grant(entity_type, id)
    }

    pub fn can_view(&mut self, entity_type: EntityType, id: &EntityId) -> bool {
        self.can_perform_action(Action::View, entity_type, id)
    }

    pub fn can_edit(&mut self, entity_type: EntityType, id: &EntityId) -> bool {
        self.can_perform_action(Action::Edit, entity_type, id)
    }

    pub fn can_create(&mut self, entity_type: EntityType, id: &EntityId) -> bool {
        self.can_perform_action(Action::Create, entity_type, id)
    }

    pub fn can_delete(&mut self, entity_type: EntityType, id: &EntityId) -> bool {
        self.can_perform_action(Action::Delete, entity_type, id)
    }

    /// Whether the viewer may hand out `target` on this entity.
    pub fn can_share(
        &mut self,
        entity_type: EntityType,
        id: &EntityId,
        target: PermissionLevel,
    ) -> bool {
        match Action::share(target) {
            Some(action) => self.can_perform_action(action, entity_type, id),
            None => false,
        }
    }

    /// Levels the viewer may grant to others on this entity, highest first.
    pub fn available_share_levels(
        &mut self,
        entity_type: EntityType,
        id: &EntityId,
    ) -> Vec<PermissionLevel> {
        let have = self.get_permission(entity_type, id);
        action::available_share_levels(have)
    }

    pub fn can_perform_action(
        &mut self,
        action: Action,
        entity_type: EntityType,
        id: &EntityId,
    ) -> bool {
        let have = self.get_permission(entity_type, id);
        action::authorize(action, have)
    }

    /// Like [`PermissionService::can_perform_action`] for an externally named
    /// action. Unknown names are denied and logged.
    pub fn can_perform_named(
        &mut self,
        action: &str,
        entity_type: EntityType,
        id: &EntityId,
    ) -> bool {
        match action.parse::<Action>() {
            Ok(action) => self.can_perform_action(action, entity_type, id),
            Err(_) => {
                warn!(action, "denying unknown action");
                false
            }
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Grants
    // ─────────────────────────────────────────────────────────────────────────

    /// Merge a permission into the cache under the upgrade-only rule.
    ///
    /// The grant is stored even if the entity is not (yet) in the hierarchy.
    pub fn grant_permission(
        &mut self,
        entity_type: EntityType,
        id: &EntityId,
        permission: PermissionLevel,
        scope: EntityType,
        scope_id: &EntityId,
    ) -> UpgradeOutcome {
        let outcome = GrantCoordinator::apply(
            &mut self.cache,
            EntityRef::new(entity_type, id.clone()),
            PermissionGrant::new(permission, scope, scope_id.clone()),
        );
        self.publish();
        outcome
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Snapshot pushes
    // ─────────────────────────────────────────────────────────────────────────

    /// Replace the folder hierarchy. Returns `true` if the cache was invalidated.
    pub fn update_folder_hierarchy(&mut self, folders: &[FolderRecord]) -> bool {
        let changed = self.hierarchy.replace_folders(folders);
        self.invalidate_if(changed, "folder hierarchy")
    }

    /// Replace the document placements. Returns `true` if the cache was invalidated.
    pub fn update_document_folders(&mut self, documents: &[DocumentRecord]) -> bool {
        let changed = self.hierarchy.replace_documents(documents);
        self.invalidate_if(changed, "document folders")
    }

    /// Replace the workspace membership list. Returns `true` if the cache was invalidated.
    pub fn update_workspaces(&mut self, workspaces: &[WorkspaceRecord]) -> bool {
        let changed = self.directory.replace(workspaces);
        self.invalidate_if(changed, "workspace list")
    }

    /// Switch the active workspace. Returns `true` if the cache was invalidated.
    pub fn set_current_workspace(&mut self, workspace: Option<EntityId>) -> bool {
        let changed = self.directory.set_current(workspace);
        self.invalidate_if(changed, "current workspace")
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Observation
    // ─────────────────────────────────────────────────────────────────────────

    /// Generation counter; advances on every invalidation and every grant.
    pub fn generation(&self) -> u64 {
        self.cache.generation()
    }

    /// Subscribe to generation changes.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.generation_tx.subscribe()
    }

    /// Membership records and active workspace.
    pub fn directory(&self) -> &WorkspaceDirectory {
        &self.directory
    }

    /// Number of cached entries.
    pub fn cached_entries(&self) -> usize {
        self.cache.len()
    }

    fn resolver(&mut self) -> PermissionResolver<'_> {
        PermissionResolver::new(&self.hierarchy, &self.directory, &mut self.cache)
    }

    fn invalidate_if(&mut self, changed: bool, cause: &'static str) -> bool {
        if !changed {
            return false;
        }
        let generation = self.cache.invalidate_all();
        debug!(cause, generation, "permission cache invalidated");
        self.publish();
        true
    }

    fn publish(&self) {
        self.generation_tx.send_replace(self.cache.generation());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service() -> PermissionService {
        let mut service = PermissionService::new();
        service.update_workspaces(&[
            WorkspaceRecord::new("W", PermissionLevel::Editor),
            WorkspaceRecord::new("RO", PermissionLevel::Viewer),
        ]);
        service.set_current_workspace(Some("W".into()));
        service.update_folder_hierarchy(&[
            FolderRecord::root("F1", "W"),
            FolderRecord::child("F2", "F1", "W"),
            FolderRecord::root("R1", "RO"),
        ]);
        service
    }

    #[test]
    fn test_capability_helpers() {
        let mut s = service();
        let f2 = EntityId::new("F2");
        assert!(s.can_view(EntityType::Folder, &f2));
        assert!(s.can_edit(EntityType::Folder, &f2));
        assert!(s.can_create(EntityType::Folder, &f2));
        assert!(s.can_delete(EntityType::Folder, &f2));

        let r1 = EntityId::new("R1");
        assert!(s.can_view(EntityType::Folder, &r1));
        assert!(!s.can_edit(EntityType::Folder, &r1));
    }

    #[test]
    fn test_unknown_action_leaves_cache_untouched() {
        let mut s = service();
        assert!(!s.can_perform_named("archive", EntityType::Folder, &"F2".into()));
        assert_eq!(s.cached_entries(), 0);

        assert!(s.can_perform_named("edit", EntityType::Folder, &"F2".into()));
        assert!(s.cached_entries() > 0);
    }

    #[test]
    fn test_share_levels_follow_own_level() {
        let mut s = service();
        let f1 = EntityId::new("F1");
        assert_eq!(
            s.available_share_levels(EntityType::Folder, &f1),
            vec![PermissionLevel::Editor, PermissionLevel::Viewer]
        );
        assert!(s.can_share(EntityType::Folder, &f1, PermissionLevel::Editor));
        assert!(!s.can_share(EntityType::Folder, &f1, PermissionLevel::Owner));
        assert!(!s.can_share(EntityType::Folder, &f1, PermissionLevel::None));
    }

    #[test]
    fn test_reparent_is_visible_on_next_query() {
        let mut s = service();
        let f2 = EntityId::new("F2");
        assert_eq!(s.get_permission(EntityType::Folder, &f2), PermissionLevel::Editor);

        let invalidated = s.update_folder_hierarchy(&[
            FolderRecord::root("F1", "W"),
            FolderRecord::child("F2", "R1", "W"),
            FolderRecord::root("R1", "RO"),
        ]);
        assert!(invalidated);
        assert_eq!(s.get_permission(EntityType::Folder, &f2), PermissionLevel::Viewer);
    }

    #[test]
    fn test_identical_push_keeps_cache() {
        let mut s = service();
        s.get_permission(EntityType::Folder, &"F2".into());
        let before = s.generation();
        let entries = s.cached_entries();

        assert!(!s.update_folder_hierarchy(&[
            FolderRecord::root("R1", "RO"),
            FolderRecord::child("F2", "F1", "W"),
            FolderRecord::root("F1", "W"),
        ]));
        assert_eq!(s.generation(), before);
        assert_eq!(s.cached_entries(), entries);
    }

    #[test]
    fn test_membership_change_drops_grants() {
        let mut s = service();
        let w = EntityId::new("W");
        s.grant_permission(
            EntityType::Workspace,
            &w,
            PermissionLevel::Owner,
            EntityType::Workspace,
            &w,
        );
        assert_eq!(s.get_permission(EntityType::Workspace, &w), PermissionLevel::Owner);

        s.update_workspaces(&[WorkspaceRecord::new("W", PermissionLevel::Viewer)]);
        assert_eq!(s.get_permission(EntityType::Workspace, &w), PermissionLevel::Viewer);
    }

    #[test]
    fn test_switching_workspace_changes_fallback() {
        let mut s = service();
        let ghost = EntityId::new("ghost");
        assert_eq!(s.get_permission(EntityType::Document, &ghost), PermissionLevel::Editor);

        assert!(s.set_current_workspace(Some("RO".into())));
        assert_eq!(s.get_permission(EntityType::Document, &ghost), PermissionLevel::Viewer);
    }

    #[test]
    fn test_subscribers_see_generation_bumps() {
        let mut s = service();
        let mut rx = s.subscribe();
        let start = *rx.borrow_and_update();

        let f1 = EntityId::new("F1");
        s.grant_permission(
            EntityType::Folder,
            &f1,
            PermissionLevel::Owner,
            EntityType::Folder,
            &f1,
        );
        assert!(rx.has_changed().unwrap());
        assert_eq!(*rx.borrow_and_update(), start + 1);
    }

    #[test]
    fn test_unknown_named_action_is_denied() {
        let mut s = service();
        assert!(s.can_perform_named("edit", EntityType::Folder, &"F1".into()));
        assert!(!s.can_perform_named("frobnicate", EntityType::Folder, &"F1".into()));
    }
}
