//! Upgrade-only grants.
//!
//! A grant written into the cache can be raised but never lowered. Only a
//! wholesale invalidation removes it.

use serde::{Deserialize, Serialize};
use std::fmt;

use tracing::debug;

use weft_core::{EntityRef, PermissionLevel};

use crate::cache::{PermissionCache, PermissionGrant};

/// What a grant call did to the cached permission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "kebab-case")]
pub enum UpgradeOutcome {
    /// Nothing was cached; the grant was stored as given.
    Granted { level: PermissionLevel },

    /// The cached level was raised.
    Upgraded {
        from: PermissionLevel,
        to: PermissionLevel,
    },

    /// The cached level was already at or above the granted one.
    AlreadySufficient { current: PermissionLevel },
}

impl UpgradeOutcome {
    /// The level held after the grant.
    pub fn level(&self) -> PermissionLevel {
        match *self {
            UpgradeOutcome::Granted { level } => level,
            UpgradeOutcome::Upgraded { to, .. } => to,
            UpgradeOutcome::AlreadySufficient { current } => current,
        }
    }

    /// Short text for the UI layer.
    pub fn message(&self) -> String {
        match self {
            UpgradeOutcome::Granted { level } => format!("You now have {level} access."),
            UpgradeOutcome::Upgraded { from, to } => {
                format!("Your access was upgraded from {from} to {to}.")
            }
            UpgradeOutcome::AlreadySufficient { current } => {
                format!("You already have {current} access, which is at this level or higher.")
            }
        }
    }
}

impl fmt::Display for UpgradeOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UpgradeOutcome::Granted { .. } => f.write_str("granted"),
            UpgradeOutcome::Upgraded { .. } => f.write_str("upgraded"),
            UpgradeOutcome::AlreadySufficient { .. } => f.write_str("already-sufficient"),
        }
    }
}

/// Merges grants into a [`PermissionCache`].
#[derive(Debug, Default, Clone, Copy)]
pub struct GrantCoordinator;

impl GrantCoordinator {
    /// Apply `grant` to `entity` under the upgrade-only rule.
    ///
    /// Advances the cache generation on every call so dependent readers
    /// re-read, even when the stored value did not change.
    pub fn apply(
        cache: &mut PermissionCache,
        entity: EntityRef,
        grant: PermissionGrant,
    ) -> UpgradeOutcome {
        let outcome = match cache.get(&entity) {
            None => {
                let level = grant.permission;
                cache.set(entity.clone(), grant);
                UpgradeOutcome::Granted { level }
            }
            Some(existing) if existing.permission >= grant.permission => {
                UpgradeOutcome::AlreadySufficient {
                    current: existing.permission,
                }
            }
            Some(existing) => {
                let from = existing.permission;
                let to = grant.permission;
                cache.set(entity.clone(), grant);
                UpgradeOutcome::Upgraded { from, to }
            }
        };

        let generation = cache.advance_generation();
        debug!(%entity, %outcome, level = %outcome.level(), generation, "grant applied");
        outcome
    }
}
