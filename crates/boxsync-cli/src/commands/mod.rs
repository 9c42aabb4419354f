//! CLI subcommands

pub mod auth;
pub mod completions;
pub mod config;
pub mod diff;
pub mod items;
pub mod sync;
pub mod transfer;
