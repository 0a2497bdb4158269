//! Effective permission resolution.
//!
//! Folders inherit from their parent chain, which ends at a workspace.
//! The chain is walked iteratively with a visited set, so a cyclic or
//! dangling hierarchy costs at most one step per distinct folder and always
//! terminates. Every folder on the walked path gets the final result cached
//! under its own key.

use std::collections::HashSet;

use tracing::{debug, trace};

use weft_core::{EntityId, EntityRef, EntityType, PermissionLevel};

use crate::cache::{PermissionCache, PermissionGrant};
use crate::directory::WorkspaceDirectory;
use crate::hierarchy::HierarchySnapshot;

/// Resolves permissions against one snapshot, memoizing into a cache.
///
/// Borrowed for the duration of a single query; holding it across a
/// snapshot push is impossible by construction.
pub struct PermissionResolver<'a> {
    hierarchy: &'a HierarchySnapshot,
    directory: &'a WorkspaceDirectory,
    cache: &'a mut PermissionCache,
}

impl<'a> PermissionResolver<'a> {
    pub fn new(
        hierarchy: &'a HierarchySnapshot,
        directory: &'a WorkspaceDirectory,
        cache: &'a mut PermissionCache,
    ) -> Self {
        Self {
            hierarchy,
            directory,
            cache,
        }
    }

    /// The viewer's effective level on an entity.
    pub fn resolve(&mut self, entity_type: EntityType, id: &EntityId) -> PermissionLevel {
        self.resolve_grant(entity_type, id).permission
    }

    /// The viewer's effective level on an entity, with the scope that decided it.
    pub fn resolve_grant(&mut self, entity_type: EntityType, id: &EntityId) -> PermissionGrant {
        match entity_type {
            EntityType::Workspace => self.workspace_grant(id),
            EntityType::Folder => self.walk_folder(id).0,
            EntityType::Document => self.document_grant(id),
        }
    }

    fn workspace_grant(&mut self, workspace: &EntityId) -> PermissionGrant {
        let key = EntityRef::workspace(workspace.clone());
        if let Some(cached) = self.cache.get(&key) {
            return cached.clone();
        }

        let permission = self
            .directory
            .permission_of(workspace)
            .unwrap_or(PermissionLevel::None);
        let grant = PermissionGrant::new(permission, EntityType::Workspace, workspace.clone());
        self.cache.set(key, grant.clone());
        grant
    }

    /// Fallback used whenever the hierarchy cannot answer.
    fn active_workspace_grant(&mut self, queried: EntityRef) -> PermissionGrant {
        match self.directory.current().cloned() {
            Some(workspace) => self.workspace_grant(&workspace),
            None => PermissionGrant::new(PermissionLevel::None, queried.entity_type, queried.id),
        }
    }

    fn owning_workspace_grant(
        &mut self,
        workspace: Option<&EntityId>,
        queried: EntityRef,
    ) -> PermissionGrant {
        match workspace {
            Some(workspace) => self.workspace_grant(workspace),
            None => self.active_workspace_grant(queried),
        }
    }

    /// Walk the parent chain of `folder_id`.
    ///
    /// Returns the grant and the number of hierarchy links followed.
    fn walk_folder(&mut self, folder_id: &EntityId) -> (PermissionGrant, usize) {
        let hierarchy = self.hierarchy;
        let mut visited: HashSet<EntityId> = HashSet::new();
        let mut path: Vec<EntityId> = Vec::new();
        let mut current = folder_id.clone();
        let mut steps = 0usize;

        let grant = loop {
            let key = EntityRef::folder(current.clone());
            if let Some(cached) = self.cache.get(&key) {
                break cached.clone();
            }

            if let Some(workspace) = current.system_folder_workspace() {
                let grant = self.workspace_grant(&workspace);
                path.push(current.clone());
                break grant;
            }

            let Some(link) = hierarchy.folder(&current) else {
                trace!(folder = %current, "folder missing from snapshot, using active workspace");
                break self.active_workspace_grant(key);
            };

            if !visited.insert(current.clone()) {
                debug!(folder = %current, start = %folder_id, "cycle in folder parents");
                break self.owning_workspace_grant(link.workspace_id.as_ref(), key);
            }
            path.push(current.clone());
            steps += 1;

            match &link.parent_id {
                None => break self.owning_workspace_grant(link.workspace_id.as_ref(), key),
                Some(parent) => current = parent.clone(),
            }
        };

        for id in path {
            self.cache.set(EntityRef::folder(id), grant.clone());
        }
        (grant, steps)
    }

    fn document_grant(&mut self, document_id: &EntityId) -> PermissionGrant {
        let key = EntityRef::document(document_id.clone());
        if let Some(cached) = self.cache.get(&key) {
            return cached.clone();
        }

        let hierarchy = self.hierarchy;
        let Some(link) = hierarchy.document(document_id) else {
            trace!(document = %document_id, "document missing from snapshot, using active workspace");
            return self.active_workspace_grant(key);
        };

        let grant = match &link.folder_id {
            Some(folder) => self.walk_folder(folder).0,
            None => self.owning_workspace_grant(link.workspace_id.as_ref(), key.clone()),
        };
        self.cache.set(key, grant.clone());
        grant
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::directory::WorkspaceRecord;
    use crate::hierarchy::{DocumentRecord, FolderRecord};
    use proptest::prelude::*;

    struct World {
        hierarchy: HierarchySnapshot,
        directory: WorkspaceDirectory,
        cache: PermissionCache,
    }

    impl World {
        fn new(workspaces: &[(&str, PermissionLevel)], current: Option<&str>) -> Self {
            let mut directory = WorkspaceDirectory::new();
            let records: Vec<_> = workspaces
                .iter()
                .map(|(id, level)| WorkspaceRecord::new(*id, *level))
                .collect();
            directory.replace(&records);
            directory.set_current(current.map(EntityId::from));
            Self {
                hierarchy: HierarchySnapshot::new(),
                directory,
                cache: PermissionCache::new(),
            }
        }

        fn folders(mut self, folders: &[FolderRecord]) -> Self {
            self.hierarchy.replace_folders(folders);
            self
        }

        fn documents(mut self, documents: &[DocumentRecord]) -> Self {
            self.hierarchy.replace_documents(documents);
            self
        }

        fn resolver(&mut self) -> PermissionResolver<'_> {
            PermissionResolver::new(&self.hierarchy, &self.directory, &mut self.cache)
        }
    }

    #[test]
    fn test_root_folder_takes_workspace_permission() {
        let mut world = World::new(&[("W", PermissionLevel::Editor)], Some("W"))
            .folders(&[FolderRecord::root("F1", "W")]);

        let grant = world.resolver().resolve_grant(EntityType::Folder, &"F1".into());
        assert_eq!(grant.permission, PermissionLevel::Editor);
        assert_eq!(grant.scope_ref(), EntityRef::workspace("W"));
    }

    #[test]
    fn test_document_inherits_through_folder_chain() {
        let mut world = World::new(&[("W", PermissionLevel::Viewer)], Some("W"))
            .folders(&[
                FolderRecord::root("F1", "W"),
                FolderRecord::child("F2", "F1", "W"),
            ])
            .documents(&[DocumentRecord::in_folder("D", "F2")]);

        let mut resolver = world.resolver();
        let doc = resolver.resolve(EntityType::Document, &"D".into());
        let root = resolver.resolve(EntityType::Folder, &"F1".into());
        assert_eq!(doc, root);
        assert_eq!(doc, PermissionLevel::Viewer);
    }

    #[test]
    fn test_path_is_compressed_into_cache() {
        let mut world = World::new(&[("W", PermissionLevel::Owner)], None).folders(&[
            FolderRecord::root("a", "W"),
            FolderRecord::child("b", "a", "W"),
            FolderRecord::child("c", "b", "W"),
        ]);

        world.resolver().resolve(EntityType::Folder, &"c".into());
        for id in ["a", "b", "c"] {
            assert_eq!(
                world.cache.get(&EntityRef::folder(id)).map(|g| g.permission),
                Some(PermissionLevel::Owner)
            );
        }
    }

    #[test]
    fn test_two_folder_cycle_terminates() {
        let mut world = World::new(&[("W", PermissionLevel::Owner)], None).folders(&[
            FolderRecord::child("A", "B", "W"),
            FolderRecord::child("B", "A", "W"),
        ]);

        let (grant, steps) = world.resolver().walk_folder(&"A".into());
        assert_eq!(grant.permission, PermissionLevel::Owner);
        assert!(steps <= 2);
        assert!(world.cache.get(&EntityRef::folder("A")).is_some());
        assert!(world.cache.get(&EntityRef::folder("B")).is_some());
    }

    #[test]
    fn test_cycle_uses_detecting_folder_workspace() {
        // The walk re-enters at B, so B's workspace decides.
        let mut world = World::new(
            &[("W1", PermissionLevel::Viewer), ("W2", PermissionLevel::Editor)],
            None,
        )
        .folders(&[
            FolderRecord::child("A", "B", "W1"),
            FolderRecord::child("B", "C", "W2"),
            FolderRecord::child("C", "B", "W1"),
        ]);

        let level = world.resolver().resolve(EntityType::Folder, &"A".into());
        assert_eq!(level, PermissionLevel::Editor);
    }

    #[test]
    fn test_self_parent_cycle_without_workspace_uses_active() {
        let mut world = World::new(&[("W", PermissionLevel::Viewer)], Some("W")).folders(&[
            FolderRecord {
                id: "loop".into(),
                parent_id: Some("loop".into()),
                workspace_id: None,
            },
        ]);

        let level = world.resolver().resolve(EntityType::Folder, &"loop".into());
        assert_eq!(level, PermissionLevel::Viewer);
    }

    #[test]
    fn test_system_folder_resolves_to_its_workspace() {
        // A system folder wins even if a bogus record with a cycle exists for it.
        let system = EntityId::system_folder(&"W2".into());
        let mut world = World::new(
            &[("W1", PermissionLevel::Viewer), ("W2", PermissionLevel::Owner)],
            Some("W1"),
        )
        .folders(&[FolderRecord {
            id: system.clone(),
            parent_id: Some(system.clone()),
            workspace_id: Some("W1".into()),
        }]);

        let level = world.resolver().resolve(EntityType::Folder, &system);
        assert_eq!(level, PermissionLevel::Owner);
    }

    #[test]
    fn test_missing_entries_fall_back_to_active_workspace() {
        let mut world = World::new(&[("W", PermissionLevel::Editor)], Some("W"));
        let mut resolver = world.resolver();

        assert_eq!(
            resolver.resolve(EntityType::Folder, &"ghost".into()),
            PermissionLevel::Editor
        );
        assert_eq!(
            resolver.resolve(EntityType::Document, &"ghost".into()),
            PermissionLevel::Editor
        );
    }

    #[test]
    fn test_dangling_parent_falls_back_to_active_workspace() {
        let mut world = World::new(
            &[("W", PermissionLevel::Owner), ("Active", PermissionLevel::Viewer)],
            Some("Active"),
        )
        .folders(&[FolderRecord::child("orphan", "deleted", "W")]);

        let level = world.resolver().resolve(EntityType::Folder, &"orphan".into());
        assert_eq!(level, PermissionLevel::Viewer);
    }

    #[test]
    fn test_nothing_known_resolves_to_none() {
        let mut world = World::new(&[], None);
        assert_eq!(
            world.resolver().resolve(EntityType::Document, &"d".into()),
            PermissionLevel::None
        );
        assert_eq!(
            world.resolver().resolve(EntityType::Workspace, &"w".into()),
            PermissionLevel::None
        );
    }

    #[test]
    fn test_unfiled_document_uses_recorded_workspace() {
        let mut world = World::new(
            &[("W", PermissionLevel::Owner), ("Active", PermissionLevel::Viewer)],
            Some("Active"),
        )
        .documents(&[
            DocumentRecord {
                id: "pinned".into(),
                folder_id: None,
                workspace_id: Some("W".into()),
            },
            DocumentRecord::unfiled("loose"),
        ]);

        let mut resolver = world.resolver();
        assert_eq!(
            resolver.resolve(EntityType::Document, &"pinned".into()),
            PermissionLevel::Owner
        );
        assert_eq!(
            resolver.resolve(EntityType::Document, &"loose".into()),
            PermissionLevel::Viewer
        );
    }

    fn level() -> impl Strategy<Value = PermissionLevel> {
        (0u8..4).prop_map(|o| PermissionLevel::from_ordinal(o).unwrap())
    }

    proptest! {
        /// Arbitrary parent pointers (cycles, self-loops, dangling ids) never
        /// cost more than one step per distinct folder.
        #[test]
        fn walk_is_bounded(parents in prop::collection::vec(prop::option::of(0usize..12), 1..10)) {
            let folders: Vec<FolderRecord> = parents
                .iter()
                .enumerate()
                .map(|(i, parent)| FolderRecord {
                    id: format!("f{i}").into(),
                    parent_id: parent.map(|p| format!("f{p}").into()),
                    workspace_id: Some("W".into()),
                })
                .collect();
            let mut world = World::new(&[("W", PermissionLevel::Editor)], Some("W")).folders(&folders);

            for i in 0..folders.len() {
                world.cache.invalidate_all();
                let (grant, steps) = world.resolver().walk_folder(&format!("f{i}").into());
                prop_assert!(steps <= folders.len());
                prop_assert_eq!(grant.permission, PermissionLevel::Editor);
            }
        }

        /// An acyclic chain resolves to the workspace at its root.
        #[test]
        fn chain_resolves_to_root_workspace(depth in 1usize..20, root_level in level()) {
            let mut folders = vec![FolderRecord::root("f0", "W")];
            for i in 1..depth {
                folders.push(FolderRecord::child(format!("f{i}"), format!("f{}", i - 1), "Other"));
            }
            let mut world = World::new(
                &[("W", root_level), ("Other", PermissionLevel::None)],
                None,
            )
            .folders(&folders);

            let leaf: EntityId = format!("f{}", depth - 1).into();
            prop_assert_eq!(world.resolver().resolve(EntityType::Folder, &leaf), root_level);
        }
    }
}
