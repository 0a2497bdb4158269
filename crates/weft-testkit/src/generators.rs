//! Proptest generators for property-based testing.

use proptest::prelude::*;

use weft_core::{EntityId, EntityRef, EntityType, Keypair, PermissionLevel};
use weft_perms::{Action, FolderRecord};

/// Any permission level, `None` included.
pub fn permission_level() -> impl Strategy<Value = PermissionLevel> {
    prop_oneof![
        Just(PermissionLevel::None),
        Just(PermissionLevel::Viewer),
        Just(PermissionLevel::Editor),
        Just(PermissionLevel::Owner),
    ]
}

/// A level an invite can carry.
pub fn grantable_level() -> impl Strategy<Value = PermissionLevel> {
    prop_oneof![
        Just(PermissionLevel::Viewer),
        Just(PermissionLevel::Editor),
        Just(PermissionLevel::Owner),
    ]
}

pub fn entity_type() -> impl Strategy<Value = EntityType> {
    prop_oneof![
        Just(EntityType::Workspace),
        Just(EntityType::Folder),
        Just(EntityType::Document),
    ]
}

/// Ids that survive link encoding: no whitespace or control characters.
pub fn entity_id() -> impl Strategy<Value = EntityId> {
    "[A-Za-z0-9][A-Za-z0-9_.:/#&=+%-]{0,23}".prop_map(EntityId::new)
}

pub fn entity_ref() -> impl Strategy<Value = EntityRef> {
    (entity_type(), entity_id()).prop_map(|(t, id)| EntityRef::new(t, id))
}

pub fn action() -> impl Strategy<Value = Action> {
    prop::sample::select(Action::ALL.to_vec())
}

pub fn keypair() -> impl Strategy<Value = Keypair> {
    any::<[u8; 32]>().prop_map(|seed| Keypair::from_seed(&seed))
}

/// A plausible expiry in Unix ms.
pub fn expiry() -> impl Strategy<Value = i64> {
    0i64..=4_000_000_000_000
}

/// Folders `F0..Fn` in workspace `W` with arbitrary parent pointers.
///
/// Parents may point at any folder, including the folder itself, or at a
/// folder that does not exist, so cycles and dangling links are common.
pub fn folder_forest(max: usize) -> impl Strategy<Value = Vec<FolderRecord>> {
    (1..=max.max(1)).prop_flat_map(|n| {
        prop::collection::vec(prop::option::of(0..n + 2), n).prop_map(|parents| {
            parents
                .into_iter()
                .enumerate()
                .map(|(i, parent)| match parent {
                    Some(p) => FolderRecord::child(format!("F{i}"), format!("F{p}"), "W"),
                    None => FolderRecord::root(format!("F{i}"), "W"),
                })
                .collect()
        })
    })
}
