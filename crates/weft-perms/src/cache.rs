//! Memoized permission grants.
//!
//! Entries are created lazily by resolution and by explicit grants, and are
//! only ever discarded all at once. The generation counter lets consumers
//! notice that something they read earlier may have changed.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use weft_core::{EntityId, EntityRef, EntityType, PermissionLevel};

/// A resolved-and-cached permission for one entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PermissionGrant {
    /// The level the viewer holds.
    pub permission: PermissionLevel,

    /// Type of the entity that determined `permission`.
    pub scope: EntityType,

    /// Id of the entity that determined `permission`.
    pub scope_id: EntityId,
}

impl PermissionGrant {
    pub fn new(permission: PermissionLevel, scope: EntityType, scope_id: impl Into<EntityId>) -> Self {
        Self {
            permission,
            scope,
            scope_id: scope_id.into(),
        }
    }

    /// The scope as an entity reference.
    pub fn scope_ref(&self) -> EntityRef {
        EntityRef::new(self.scope, self.scope_id.clone())
    }
}

/// Entity-keyed grant store with wholesale invalidation.
#[derive(Debug, Default)]
pub struct PermissionCache {
    entries: HashMap<EntityRef, PermissionGrant>,
    generation: u64,
}

impl PermissionCache {
    /// Create a new empty cache at generation 0.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &EntityRef) -> Option<&PermissionGrant> {
        self.entries.get(key)
    }

    /// Store a grant. Upgrade-only merging is the caller's job.
    pub fn set(&mut self, key: EntityRef, grant: PermissionGrant) {
        self.entries.insert(key, grant);
    }

    /// Drop every entry and advance the generation.
    pub fn invalidate_all(&mut self) -> u64 {
        self.entries.clear();
        self.advance_generation()
    }

    /// Advance the generation without touching entries.
    pub(crate) fn advance_generation(&mut self) -> u64 {
        self.generation += 1;
        self.generation
    }

    /// Current generation; changes whenever a consumer-visible value may have.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
