//! boxsync API - Box REST adapter
//!
//! This crate implements the remote side of the core ports:
//! - **OAuth2** - Authorization code flow with a local callback server ([`auth`])
//! - **Credential stores** - Keyring, file and in-memory stores ([`store`])
//! - **AuthSession** - Token acquisition and single-flight refresh ([`session`])
//! - **BoxClient** - Authenticated request execution and error classification ([`client`])
//! - **BoxRemoteTree** - `IRemoteTree` over the Box v2.0 endpoints ([`provider`])

pub mod auth;
pub mod client;
pub mod provider;
pub mod session;
pub mod store;
