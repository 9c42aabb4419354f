//! Port definitions (hexagonal architecture interfaces)
//!
//! Ports are interfaces that the sync core depends on, but whose
//! implementations live in adapter crates.
//!
//! ## Ports Overview
//!
//! - [`IRemoteTree`] - Remote file tree primitives (Box v2)
//! - [`ICredentialStore`] - Persistent storage for OAuth credentials
//! - [`IContentHasher`] - Local file digests comparable with remote hashes
//! - [`IAuthorizationCodeProvider`] - Interactive authorization-code acquisition

pub mod authorization;
pub mod content_hasher;
pub mod credential_store;
pub mod remote_tree;

pub use authorization::{AuthorizationGrant, IAuthorizationCodeProvider};
pub use content_hasher::IContentHasher;
pub use credential_store::ICredentialStore;
pub use remote_tree::IRemoteTree;
