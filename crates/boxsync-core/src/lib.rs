//! boxsync Core - Domain types and port definitions
//!
//! This crate contains the hexagonal architecture core with:
//! - **Domain entities** - `RemoteNode`, `Credentials`, `RemoteId`, `ContentHash`
//! - **Error taxonomy** - `RemoteError`, the contract between the request layer and the sync engine
//! - **Port definitions** - Traits for adapters: `IRemoteTree`, `ICredentialStore`, `IContentHasher`, `IAuthorizationCodeProvider`
//! - **Configuration** - YAML configuration with validation
//!
//! # Architecture
//!
//! The domain module contains plain data with no I/O.
//! Ports define trait interfaces that adapter crates implement.

pub mod config;
pub mod domain;
pub mod ports;
