//! Test fixtures and helpers.
//!
//! Common setup code for integration tests.

use std::sync::Arc;

use weft::connect::memory::LoopbackConnector;
use weft::{Weft, WeftConfig};
use weft_core::{EntityId, EntityRef, EntityType, Keypair, PermissionLevel};
use weft_invite::{
    token_link, InviteBuilder, InviteConfig, InviteToken, MemoryTokenService, TokenInviteData,
};
use weft_perms::{DocumentRecord, FolderRecord, PermissionService, WorkspaceRecord};

/// Builds a [`PermissionService`] with a given hierarchy.
#[derive(Debug, Default, Clone)]
pub struct HierarchyFixture {
    workspaces: Vec<WorkspaceRecord>,
    current: Option<EntityId>,
    folders: Vec<FolderRecord>,
    documents: Vec<DocumentRecord>,
}

impl HierarchyFixture {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a workspace. The first one added becomes the active workspace.
    pub fn workspace(mut self, id: &str, level: PermissionLevel) -> Self {
        if self.current.is_none() {
            self.current = Some(id.into());
        }
        self.workspaces.push(WorkspaceRecord::new(id, level));
        self
    }

    pub fn current(mut self, id: Option<&str>) -> Self {
        self.current = id.map(EntityId::from);
        self
    }

    pub fn root(mut self, folder: &str, workspace: &str) -> Self {
        self.folders.push(FolderRecord::root(folder, workspace));
        self
    }

    pub fn child(mut self, folder: &str, parent: &str, workspace: &str) -> Self {
        self.folders.push(FolderRecord::child(folder, parent, workspace));
        self
    }

    pub fn document(mut self, document: &str, folder: &str) -> Self {
        self.documents.push(DocumentRecord::in_folder(document, folder));
        self
    }

    /// A linear chain `<prefix>0 <- <prefix>1 <- ...` of `depth` folders.
    pub fn chain(mut self, prefix: &str, depth: usize, workspace: &str) -> Self {
        for i in 0..depth {
            let id = format!("{prefix}{i}");
            self.folders.push(match i {
                0 => FolderRecord::root(id, workspace),
                _ => FolderRecord::child(id, format!("{prefix}{}", i - 1), workspace),
            });
        }
        self
    }

    /// A ring of folders where each one's parent is the next.
    pub fn ring(mut self, ids: &[&str], workspace: &str) -> Self {
        for (i, id) in ids.iter().enumerate() {
            let parent = ids[(i + 1) % ids.len()];
            self.folders.push(FolderRecord::child(*id, parent, workspace));
        }
        self
    }

    pub fn folders(&self) -> &[FolderRecord] {
        &self.folders
    }

    pub fn build(&self) -> PermissionService {
        let mut service = PermissionService::new();
        service.update_workspaces(&self.workspaces);
        service.set_current_workspace(self.current.clone());
        service.update_folder_hierarchy(&self.folders);
        service.update_document_folders(&self.documents);
        service
    }
}

/// An invite issuer with a deterministic key.
#[derive(Debug, Clone)]
pub struct InviteFixture {
    pub keypair: Keypair,
    pub config: InviteConfig,
}

impl Default for InviteFixture {
    fn default() -> Self {
        Self::new()
    }
}

impl InviteFixture {
    /// Create with a random keypair.
    pub fn new() -> Self {
        Self::with_seed(rand::random())
    }

    /// Create with a deterministic keypair from seed.
    pub fn with_seed(seed: [u8; 32]) -> Self {
        Self {
            keypair: Keypair::from_seed(&seed),
            config: InviteConfig::default(),
        }
    }

    /// A builder signed by this fixture's key.
    pub fn builder(&self, target: EntityRef, level: PermissionLevel) -> InviteBuilder {
        InviteBuilder::new(target, level).signed_by(&self.keypair)
    }

    pub fn signed_link(&self, target: EntityRef, level: PermissionLevel, expiry: i64) -> String {
        self.builder(target, level)
            .expires_at(expiry)
            .direct_link(&self.config)
            .expect("fixture link")
    }

    pub fn unsigned_link(&self, target: EntityRef, level: PermissionLevel) -> String {
        InviteBuilder::new(target, level)
            .direct_link(&self.config)
            .expect("fixture link")
    }

    pub fn compressed_link(&self, target: EntityRef, level: PermissionLevel, expiry: i64) -> String {
        self.builder(target, level)
            .expires_at(expiry)
            .compressed_link(&self.config)
            .expect("fixture link")
    }

    /// Signed, but expired one second before `now`.
    pub fn expired_link(&self, target: EntityRef, level: PermissionLevel, now: i64) -> String {
        self.signed_link(target, level, now - 1_000)
    }

    /// Signed for `level`, then edited to claim Owner.
    pub fn tampered_link(&self, target: EntityRef, level: PermissionLevel) -> String {
        let link = self
            .builder(target, level)
            .direct_link(&self.config)
            .expect("fixture link");
        link.replacen(
            &format!("perm={}", level.short_code()),
            &format!("perm={}", PermissionLevel::Owner.short_code()),
            1,
        )
    }

    /// Register a token invite and return its link.
    pub async fn token_link(
        &self,
        tokens: &MemoryTokenService,
        target: EntityRef,
        level: PermissionLevel,
        expiry: Option<i64>,
    ) -> String {
        let token = InviteToken::generate();
        tokens
            .issue(
                token.clone(),
                TokenInviteData {
                    entity_id: target.id,
                    entity_type: target.entity_type,
                    permission: level,
                    expiry,
                    requires_password: false,
                },
            )
            .await;
        token_link(&token, &self.config)
    }
}

/// A [`Weft`] wired to in-memory token and peer services.
pub struct WeftFixture {
    pub weft: Weft,
    pub tokens: Arc<MemoryTokenService>,
    pub connector: Arc<LoopbackConnector>,
}

impl WeftFixture {
    pub fn new() -> Self {
        Self::with_connector(LoopbackConnector::new())
    }

    pub fn with_connector(connector: LoopbackConnector) -> Self {
        let tokens = Arc::new(MemoryTokenService::new());
        let connector = Arc::new(connector);
        let weft = Weft::new(WeftConfig::default(), tokens.clone(), connector.clone());
        Self {
            weft,
            tokens,
            connector,
        }
    }

    /// Load a hierarchy into the client.
    pub fn with_hierarchy(mut self, hierarchy: &HierarchyFixture) -> Self {
        *self.weft.permissions_mut() = hierarchy.build();
        self
    }

    pub fn level(&mut self, entity_type: EntityType, id: &str) -> PermissionLevel {
        self.weft.get_permission(entity_type, &id.into())
    }
}

impl Default for WeftFixture {
    fn default() -> Self {
        Self::new()
    }
}
