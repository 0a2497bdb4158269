//! # Weft Invite
//!
//! Invitation links: encodings, signatures, and the token service.
//!
//! ## Encodings
//!
//! | Form | Shape |
//! |---|---|
//! | direct | `weft://<w\|f\|d>/<id>#perm=..&exp=..&sig=..&by=..` |
//! | compressed | `weft://c/<base64url(brotli(cbor))>` |
//! | token | `weft://t/<token>` |
//! | share URL | `https://<host>/join/<rest>` |
//!
//! ## Validation policy
//!
//! - An expired invite is always refused, signed or not.
//! - A signature that does not verify yields a warning, not a refusal.
//! - An unsigned link is accepted as a legacy invite.
//!
//! ```
//! use weft_core::{EntityRef, Keypair, PermissionLevel};
//! use weft_invite::{InviteBuilder, InviteConfig, InviteValidator};
//!
//! let config = InviteConfig::default();
//! let link = InviteBuilder::new(EntityRef::folder("f-1"), PermissionLevel::Viewer)
//!     .signed_by(&Keypair::generate())
//!     .compressed_link(&config)
//!     .unwrap();
//!
//! let check = InviteValidator::new(config).validate_signature(&link, weft_core::now_millis());
//! assert!(check.valid && !check.legacy);
//! ```

pub mod builder;
pub mod codec;
pub mod config;
pub mod error;
pub mod payload;
pub mod signature;
pub mod token;
pub mod validator;

pub use builder::{token_link, InviteBuilder};
pub use config::InviteConfig;
pub use error::{InviteError, Result};
pub use payload::{
    signing_message, EncryptionKey, InvitePayload, InviteSecret, PeerHints, TokenInviteData,
    SIGN_DOMAIN,
};
pub use signature::{is_expired, SignatureCheck, SignatureStatus};
pub use token::memory::MemoryTokenService;
pub use token::{HttpTokenService, InviteToken, TokenService};
pub use validator::{
    InviteValidator, ParsedInvite, ResolvedInvite, ValidatedInvite, ValidationWarning,
};
