//! # Weft Testkit
//!
//! Testing utilities for Weft.
//!
//! ## Overview
//!
//! This crate provides:
//!
//! - **Fixtures**: hierarchies, invite issuers, and a client wired to
//!   in-memory services
//! - **Generators**: Proptest strategies for property-based testing
//!
//! ## Test Fixtures
//!
//! ```rust
//! use weft_core::{EntityType, PermissionLevel};
//! use weft_testkit::fixtures::HierarchyFixture;
//!
//! let mut service = HierarchyFixture::new()
//!     .workspace("W", PermissionLevel::Editor)
//!     .chain("F", 3, "W")
//!     .build();
//! assert_eq!(
//!     service.get_permission(EntityType::Folder, &"F2".into()),
//!     PermissionLevel::Editor
//! );
//! ```
//!
//! ## Property Testing
//!
//! ```rust,ignore
//! use proptest::prelude::*;
//! use weft_testkit::generators::folder_forest;
//!
//! proptest! {
//!     #[test]
//!     fn resolution_terminates(folders in folder_forest(16)) {
//!         // ...
//!     }
//! }
//! ```

pub mod fixtures;
pub mod generators;

pub use fixtures::{HierarchyFixture, InviteFixture, WeftFixture};
