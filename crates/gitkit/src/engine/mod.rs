//! Embedded version-control engine
//!
//! The session core treats this as a collaborator behind a narrow
//! contract: a [`Repository`] handle rooted at `/<key>` in the session's
//! virtual filesystem, exposing `config()`/`set_config()` plus the object
//! and ref operations that clone, add and commit need.
//!
//! # Security Model
//!
//! - **Virtual filesystem only**: all state lives under `<root>/.git/`
//! - **Simulated remotes**: clone never opens a socket; contents come from
//!   [`MockRemote`]s registered on [`EngineConfig`]
//! - **HTTPS-only URLs**, optionally narrowed by an allowlist
//! - **Virtual identity**: author name/email never come from the host

mod config;
mod repository;

pub use config::{
    DEFAULT_AUTHOR_EMAIL, DEFAULT_AUTHOR_NAME, EngineConfig, Identity, MockRemote, RepoConfig,
};
pub use repository::{Commit, Repository, short_hash};
