//! The Weft client: permission queries and joining, behind one value.

use std::sync::Arc;

use tokio::sync::{mpsc, watch};
use tracing::debug;

use weft_core::{now_millis, EntityId, EntityType, PermissionLevel};
use weft_invite::{
    HttpTokenService, InviteValidator, MemoryTokenService, ParsedInvite, SignatureCheck,
    TokenService,
};
use weft_perms::{
    Action, DocumentRecord, FolderRecord, PermissionService, UpgradeOutcome, WorkspaceRecord,
};

use crate::config::WeftConfig;
use crate::connect::{JoinProgress, PeerConnector};
use crate::error::Result;
use crate::join::{JoinFlow, JoinRequest, JoinState};

/// Authorization state for one viewer.
pub struct Weft {
    config: WeftConfig,
    permissions: PermissionService,
    validator: InviteValidator,
    tokens: Arc<dyn TokenService>,
    connector: Arc<dyn PeerConnector>,
}

impl Weft {
    pub fn new(
        config: WeftConfig,
        tokens: Arc<dyn TokenService>,
        connector: Arc<dyn PeerConnector>,
    ) -> Self {
        Self {
            validator: InviteValidator::new(config.invite.clone()),
            config,
            permissions: PermissionService::new(),
            tokens,
            connector,
        }
    }

    /// Build with the HTTP token service named in `config`.
    ///
    /// Without a configured service every token link is reported as not
    /// found.
    pub fn from_config(config: WeftConfig, connector: Arc<dyn PeerConnector>) -> Result<Self> {
        let tokens: Arc<dyn TokenService> = match &config.invite.token_service_url {
            Some(_) => Arc::new(HttpTokenService::from_config(&config.invite)?),
            None => {
                debug!("no token service configured");
                Arc::new(MemoryTokenService::new())
            }
        };
        Ok(Self::new(config, tokens, connector))
    }

    pub fn config(&self) -> &WeftConfig {
        &self.config
    }

    pub fn permissions(&self) -> &PermissionService {
        &self.permissions
    }

    pub fn permissions_mut(&mut self) -> &mut PermissionService {
        &mut self.permissions
    }

    pub fn validator(&self) -> &InviteValidator {
        &self.validator
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Permission queries
    // ─────────────────────────────────────────────────────────────────────────

    pub fn get_permission(&mut self, entity_type: EntityType, id: &EntityId) -> PermissionLevel {
        self.permissions.get_permission(entity_type, id)
    }

    pub fn can_view(&mut self, entity_type: EntityType, id: &EntityId) -> bool {
        self.permissions.can_view(entity_type, id)
    }

    pub fn can_edit(&mut self, entity_type: EntityType, id: &EntityId) -> bool {
        self.permissions.can_edit(entity_type, id)
    }

    pub fn can_create(&mut self, entity_type: EntityType, id: &EntityId) -> bool {
        self.permissions.can_create(entity_type, id)
    }

    pub fn can_delete(&mut self, entity_type: EntityType, id: &EntityId) -> bool {
        self.permissions.can_delete(entity_type, id)
    }

    /// Whether the viewer may hand out `target` on this entity.
    pub fn can_share(
        &mut self,
        entity_type: EntityType,
        id: &EntityId,
        target: PermissionLevel,
    ) -> bool {
        self.permissions.can_share(entity_type, id, target)
    }

    pub fn can_perform_action(
        &mut self,
        action: Action,
        entity_type: EntityType,
        id: &EntityId,
    ) -> bool {
        self.permissions.can_perform_action(action, entity_type, id)
    }

    pub fn can_perform_named(&mut self, action: &str, entity_type: EntityType, id: &EntityId) -> bool {
        self.permissions.can_perform_named(action, entity_type, id)
    }

    pub fn available_share_levels(
        &mut self,
        entity_type: EntityType,
        id: &EntityId,
    ) -> Vec<PermissionLevel> {
        self.permissions.available_share_levels(entity_type, id)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Snapshot pushes and grants
    // ─────────────────────────────────────────────────────────────────────────

    pub fn update_folder_hierarchy(&mut self, folders: &[FolderRecord]) -> bool {
        self.permissions.update_folder_hierarchy(folders)
    }

    pub fn update_document_folders(&mut self, documents: &[DocumentRecord]) -> bool {
        self.permissions.update_document_folders(documents)
    }

    pub fn update_workspaces(&mut self, workspaces: &[WorkspaceRecord]) -> bool {
        self.permissions.update_workspaces(workspaces)
    }

    pub fn set_current_workspace(&mut self, workspace: Option<EntityId>) -> bool {
        self.permissions.set_current_workspace(workspace)
    }

    pub fn grant_permission(
        &mut self,
        entity_type: EntityType,
        id: &EntityId,
        permission: PermissionLevel,
        scope: EntityType,
        scope_id: &EntityId,
    ) -> UpgradeOutcome {
        self.permissions
            .grant_permission(entity_type, id, permission, scope, scope_id)
    }

    pub fn generation(&self) -> u64 {
        self.permissions.generation()
    }

    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.permissions.subscribe()
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Invites
    // ─────────────────────────────────────────────────────────────────────────

    pub fn parse_invite(&self, raw: &str) -> Result<ParsedInvite> {
        Ok(self.validator.parse(raw)?)
    }

    /// Check a raw link's expiry and signature against the current time.
    pub fn validate_signature(&self, raw: &str) -> SignatureCheck {
        self.validator.validate_signature(raw, now_millis())
    }

    /// A fresh join flow. Take its cancellation token before running it.
    pub fn join_flow(&self) -> JoinFlow {
        JoinFlow::new(
            self.validator.clone(),
            self.config.join.clone(),
            Arc::clone(&self.tokens),
            Arc::clone(&self.connector),
        )
    }

    /// Join through an invite, start to finish.
    pub async fn join(
        &mut self,
        request: JoinRequest,
        progress: Option<mpsc::Sender<JoinProgress>>,
    ) -> JoinState {
        let mut flow = self.join_flow();
        flow.run(request, &mut self.permissions, now_millis(), progress)
            .await
    }
}
