//! # Weft Permissions
//!
//! Client-side permission decisions for workspaces, folders and documents.
//!
//! ## Overview
//!
//! The viewer's level on a workspace comes from its membership record.
//! Folders inherit from their parent chain and documents from their folder,
//! so most queries end at a workspace. Results are memoized in a cache that
//! is discarded in full whenever the hierarchy or membership changes.
//!
//! ## Key Concepts
//!
//! - **HierarchySnapshot**: folder parent/workspace links and document folder links
//! - **PermissionResolver**: terminating walk up the parent chain, cycle-safe
//! - **PermissionCache**: entity-keyed grants with a generation counter
//! - **Action**: closed table of actions and their required levels
//! - **GrantCoordinator**: upgrade-only merge of granted permissions
//! - **PermissionService**: the query/grant/push surface for collaborators
//!
//! ## Usage
//!
//! ```rust
//! use weft_perms::{FolderRecord, PermissionService, WorkspaceRecord};
//! use weft_core::{EntityType, PermissionLevel};
//!
//! let mut service = PermissionService::new();
//! service.update_workspaces(&[WorkspaceRecord::new("w", PermissionLevel::Editor)]);
//! service.update_folder_hierarchy(&[FolderRecord::root("f", "w")]);
//!
//! assert!(service.can_edit(EntityType::Folder, &"f".into()));
//! ```

pub mod action;
pub mod cache;
pub mod directory;
pub mod error;
pub mod grant;
pub mod hierarchy;
pub mod resolver;
pub mod service;

pub use action::{authorize, authorize_named, available_share_levels, is_at_least, Action};
pub use cache::{PermissionCache, PermissionGrant};
pub use directory::{WorkspaceDirectory, WorkspaceRecord};
pub use error::PermsError;
pub use grant::{GrantCoordinator, UpgradeOutcome};
pub use hierarchy::{DocumentLink, DocumentRecord, FolderLink, FolderRecord, HierarchySnapshot};
pub use resolver::PermissionResolver;
pub use service::PermissionService;
