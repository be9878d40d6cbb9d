//! Gitkit - Sandboxed git playground for multi-tenant environments
//!
//! Every user gets a private session: an in-memory filesystem, named
//! repositories, a working directory and a reflog. Commands run one at a
//! time per session and never touch the host.
//!
//! # Example
//!
//! ```rust
//! use gitkit::Sandbox;
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> gitkit::Result<()> {
//!     let sandbox = Sandbox::new();
//!     sandbox.create_session(Some("alice".into()))?;
//!
//!     let out = sandbox.exec("alice", "clone https://github.com/org/repo.git").await?;
//!     assert_eq!(out, "Cloned into 'repo'\n");
//!
//!     sandbox.exec("alice", "config user.name \"Alice\"").await?;
//!     let reflog = sandbox.exec("alice", "reflog").await?;
//!     assert!(reflog.contains("HEAD@{0}: clone: from https://github.com/org/repo.git"));
//!     Ok(())
//! }
//! ```

mod argv;
mod commands;
mod engine;
mod error;
mod fs;
mod limits;
mod logging_impl;
mod session;

pub use argv::split as split_command_line;
pub use commands::{
    Cd, Command, CommandFactory, CommandRegistry, Context, Git, GitAdd, GitClone, GitCommit,
    GitConfig, GitInit, GitLog, GitReflog, Help, Ls, Mkdir, Pwd, Touch, WriteFile,
    default_commands, repo_key_from_url, resolve_path,
};
pub use engine::{
    Commit, DEFAULT_AUTHOR_EMAIL, DEFAULT_AUTHOR_NAME, EngineConfig, Identity, MockRemote,
    RepoConfig, Repository,
};
pub use error::{Error, Result};
pub use fs::{
    DirEntry, FileSystem, FileType, FsLimitExceeded, FsLimits, FsUsage, InMemoryFs, Metadata,
};
pub use limits::{DEFAULT_COMMAND_TIMEOUT, DEFAULT_MAX_SESSIONS, LimitExceeded, SessionLimits};
pub use logging_impl::{LogConfig, sanitize_for_log};
pub use session::{Reflog, ReflogEntry, Session, SessionManager, SessionState};

pub use async_trait::async_trait;
pub use tokio_util::sync::CancellationToken;

use std::sync::Arc;

/// Main entry point: a session manager paired with a command registry.
///
/// Cheap to clone; clones share sessions and commands.
#[derive(Clone, Debug)]
pub struct Sandbox {
    manager: Arc<SessionManager>,
    registry: Arc<CommandRegistry>,
}

impl Default for Sandbox {
    fn default() -> Self {
        Self::new()
    }
}

impl Sandbox {
    /// Sandbox with default configuration and every built-in command.
    pub fn new() -> Self {
        Self::builder().build()
    }

    /// Create a new SandboxBuilder for customized configuration.
    pub fn builder() -> SandboxBuilder {
        SandboxBuilder::default()
    }

    pub fn manager(&self) -> &Arc<SessionManager> {
        &self.manager
    }

    pub fn registry(&self) -> &Arc<CommandRegistry> {
        &self.registry
    }

    /// Create a session; see [`SessionManager::create_session`].
    pub fn create_session(&self, id: Option<String>) -> Result<Arc<Session>> {
        self.manager.create_session(id)
    }

    /// Tokenize `line` and run it in session `session_id`.
    pub async fn exec(&self, session_id: &str, line: &str) -> Result<String> {
        let args = argv::split(line)?;
        self.exec_args(session_id, &args, &CancellationToken::new()).await
    }

    /// Run an already split argument vector under `cancel`.
    pub async fn exec_args(
        &self,
        session_id: &str,
        args: &[String],
        cancel: &CancellationToken,
    ) -> Result<String> {
        let session = self
            .manager
            .get_session(session_id)
            .ok_or_else(|| Error::UnknownSession(session_id.to_string()))?;
        session.execute(&self.registry, cancel, args).await
    }
}

/// Builder for customized Sandbox configuration.
///
/// # Example
///
/// ```rust
/// use gitkit::{EngineConfig, FsLimits, Sandbox, SessionLimits};
/// use std::time::Duration;
///
/// let sandbox = Sandbox::builder()
///     .engine(EngineConfig::new().allow_remote("https://github.com/course/"))
///     .limits(SessionLimits::new().max_sessions(32).command_timeout(Duration::from_secs(5)))
///     .fs_limits(FsLimits::new().max_total_bytes(1_000_000))
///     .build();
/// assert_eq!(sandbox.manager().limits().max_sessions, 32);
/// ```
#[derive(Default)]
pub struct SandboxBuilder {
    engine: EngineConfig,
    limits: SessionLimits,
    fs_limits: FsLimits,
    extra: Vec<(String, CommandFactory)>,
}

impl SandboxBuilder {
    /// Engine configuration shared by every session.
    pub fn engine(mut self, engine: EngineConfig) -> Self {
        self.engine = engine;
        self
    }

    /// Session limits.
    pub fn limits(mut self, limits: SessionLimits) -> Self {
        self.limits = limits;
        self
    }

    /// Limits for each session's virtual filesystem.
    pub fn fs_limits(mut self, limits: FsLimits) -> Self {
        self.fs_limits = limits;
        self
    }

    /// Register a command on top of the built-ins. Replaces a built-in of
    /// the same name.
    pub fn command(mut self, name: impl Into<String>, factory: CommandFactory) -> Self {
        self.extra.push((name.into(), factory));
        self
    }

    /// Build the sandbox.
    pub fn build(self) -> Sandbox {
        let mut registry = CommandRegistry::with_defaults();
        for (name, factory) in self.extra {
            registry.register(name, factory);
        }

        Sandbox {
            manager: Arc::new(SessionManager::with_config(self.engine, self.limits, self.fs_limits)),
            registry: Arc::new(registry),
        }
    }
}
