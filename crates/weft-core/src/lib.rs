//! # Weft Core
//!
//! Pure primitives shared by the Weft authorization crates: the ordered
//! permission lattice, entity references, and the Ed25519/Blake3 wrappers
//! used to sign invitations and derive discovery topics.
//!
//! This crate contains no I/O and no mutable state.
//!
//! ## Key Types
//!
//! - [`PermissionLevel`] - `Owner > Editor > Viewer > None`
//! - [`EntityType`], [`EntityId`], [`EntityRef`] - what a permission applies to
//! - [`Keypair`], [`Ed25519PublicKey`], [`Ed25519Signature`] - invite signing
//! - [`TopicHash`] - peer-discovery topic derived from a workspace id

pub mod crypto;
pub mod entity;
pub mod error;
pub mod level;

pub use crypto::{Ed25519PublicKey, Ed25519Signature, Keypair, TopicHash};
pub use entity::{EntityId, EntityRef, EntityType, SYSTEM_FOLDER_SUFFIX};
pub use error::{CoreError, Result};
pub use level::PermissionLevel;

/// Current wall-clock time in Unix milliseconds.
///
/// Every expiry in Weft is expressed in this unit.
pub fn now_millis() -> i64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}
