//! Domain entities
//!
//! - Newtypes for remote identifiers and content digests
//! - Remote tree snapshot nodes
//! - OAuth credentials
//! - Domain and remote error types

pub mod credentials;
pub mod errors;
pub mod newtypes;
pub mod remote_node;

// Re-export commonly used types
pub use credentials::Credentials;
pub use errors::{DomainError, RemoteError, RemoteResult};
pub use newtypes::*;
pub use remote_node::{NodeKind, RemoteNode};
