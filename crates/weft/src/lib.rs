//! # Weft
//!
//! Client-side authorization for collaborative workspaces.
//!
//! ## Overview
//!
//! - **Permissions**: what the current viewer may do on a workspace, folder
//!   or document, resolved through the folder hierarchy and cached.
//! - **Invites**: links in several encodings that carry a permission,
//!   optionally signed by the issuing owner.
//! - **Joining**: a cancellable state machine that turns an invite into a
//!   grant.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use weft::connect::memory::LoopbackConnector;
//! use weft::{JoinRequest, JoinState, Weft, WeftConfig};
//!
//! async fn example(link: &str) {
//!     let mut weft =
//!         Weft::from_config(WeftConfig::default(), Arc::new(LoopbackConnector::new())).unwrap();
//!
//!     match weft.join(JoinRequest::new(link), None).await {
//!         JoinState::Joined { outcome } => println!("{}", outcome.message()),
//!         other => println!("join ended in {other:?}"),
//!     }
//! }
//! ```
//!
//! ## Re-exports
//!
//! - `weft::core` - levels, entity references, keys
//! - `weft::perms` - resolution, cache, actions, grants
//! - `weft::invite` - link codecs, validation, token service

pub mod client;
pub mod config;
pub mod connect;
pub mod error;
pub mod join;

pub use weft_core as core;
pub use weft_invite as invite;
pub use weft_perms as perms;

pub use client::Weft;
pub use config::{JoinPolicy, WeftConfig};
pub use connect::{ConnectRequest, JoinProgress, PeerConnector};
pub use error::{Result, WeftError};
pub use join::{JoinFlow, JoinOutcome, JoinRequest, JoinState};

pub use weft_core::{EntityId, EntityRef, EntityType, Keypair, PermissionLevel};
pub use weft_invite::{InviteBuilder, InviteError, InviteValidator, SignatureCheck};
pub use weft_perms::{
    Action, DocumentRecord, FolderRecord, PermissionService, UpgradeOutcome, WorkspaceRecord,
};
