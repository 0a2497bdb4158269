//! Properties that must hold for any hierarchy, grant sequence or invite.

use proptest::prelude::*;

use weft::{JoinOutcome, JoinRequest, JoinState};
use weft_core::{EntityId, EntityRef, EntityType, PermissionLevel};
use weft_invite::{InviteBuilder, InviteConfig, InviteValidator};
use weft_perms::{authorize, PermissionService, WorkspaceRecord};
use weft_testkit::generators::{
    action, entity_ref, expiry, folder_forest, grantable_level, keypair, permission_level,
};
use weft_testkit::{HierarchyFixture, InviteFixture, WeftFixture};

proptest! {
    #[test]
    fn resolution_terminates_and_is_deterministic(folders in folder_forest(16)) {
        let mut s = PermissionService::new();
        s.update_workspaces(&[WorkspaceRecord::new("W", PermissionLevel::Editor)]);
        s.update_folder_hierarchy(&folders);

        let first: Vec<_> = folders
            .iter()
            .map(|f| s.get_permission(EntityType::Folder, &f.id))
            .collect();

        // same answers from a cold cache
        s.update_workspaces(&[]);
        s.update_workspaces(&[WorkspaceRecord::new("W", PermissionLevel::Editor)]);
        let second: Vec<_> = folders
            .iter()
            .rev()
            .map(|f| s.get_permission(EntityType::Folder, &f.id))
            .collect::<Vec<_>>()
            .into_iter()
            .rev()
            .collect();

        prop_assert_eq!(first, second);
    }

    #[test]
    fn grants_never_lower(levels in prop::collection::vec(grantable_level(), 1..10)) {
        let mut s = PermissionService::new();
        let d = EntityId::new("D");
        let mut max = PermissionLevel::None;
        for level in levels {
            max = max.max(level);
            s.grant_permission(EntityType::Document, &d, level, EntityType::Document, &d);
            prop_assert_eq!(s.get_permission(EntityType::Document, &d), max);
        }
    }

    #[test]
    fn authorization_is_monotone(act in action(), low in permission_level(), high in permission_level()) {
        prop_assume!(low <= high);
        if authorize(act, low) {
            prop_assert!(authorize(act, high));
        }
    }

    #[test]
    fn signed_links_verify_in_every_encoding(
        target in entity_ref(),
        level in grantable_level(),
        owner in keypair(),
        exp in expiry(),
    ) {
        let config = InviteConfig::default();
        let validator = InviteValidator::new(config.clone());
        let builder = InviteBuilder::new(target, level).expires_at(exp).signed_by(&owner);

        for link in [
            builder.clone().direct_link(&config).unwrap(),
            builder.clone().compressed_link(&config).unwrap(),
            builder.clone().share_url(&config).unwrap(),
        ] {
            let check = validator.validate_signature(&link, exp);
            prop_assert!(check.valid, "{:?} for {}", check, link);
            prop_assert!(!check.legacy);

            let late = validator.validate_signature(&link, exp + 1);
            prop_assert!(late.expired && !late.valid);
        }
    }
}

#[tokio::test]
async fn test_token_invite_joins_once() {
    let invites = InviteFixture::with_seed([3u8; 32]);
    let mut fixture = WeftFixture::new().with_hierarchy(
        &HierarchyFixture::new()
            .workspace("home", PermissionLevel::Owner)
            .root("F1", "home"),
    );
    let link = invites
        .token_link(
            &fixture.tokens,
            EntityRef::workspace("team"),
            PermissionLevel::Editor,
            None,
        )
        .await;

    let state = fixture.weft.join(JoinRequest::new(&link), None).await;
    assert_eq!(
        state,
        JoinState::Joined {
            outcome: JoinOutcome::Granted {
                level: PermissionLevel::Editor
            }
        }
    );
    assert_eq!(fixture.level(EntityType::Workspace, "team"), PermissionLevel::Editor);
    assert_eq!(fixture.level(EntityType::Folder, "F1"), PermissionLevel::Owner);

    let again = fixture.weft.join(JoinRequest::new(&link), None).await;
    assert!(matches!(again, JoinState::Failed { .. }));
}

#[tokio::test]
async fn test_tampered_invite_joins_with_warning() {
    let invites = InviteFixture::new();
    let mut fixture = WeftFixture::new();
    let link = invites.tampered_link(EntityRef::document("D"), PermissionLevel::Viewer);

    let state = fixture.weft.join(JoinRequest::new(link), None).await;
    assert!(matches!(state, JoinState::Joined { .. }));
    assert_eq!(fixture.level(EntityType::Document, "D"), PermissionLevel::Owner);
    assert_eq!(fixture.connector.requests().await.len(), 1);
}
