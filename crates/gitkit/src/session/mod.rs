//! Sessions: the unit of isolation.
//!
//! A [`Session`] owns one virtual filesystem, its repositories, a working
//! directory and a reflog, all inside a [`SessionState`] behind a single
//! async mutex. Every command runs with that mutex held for its whole
//! duration, so within one session commands observe a total order equal
//! to lock acquisition order.

mod manager;
mod reflog;

pub use manager::SessionManager;
pub use reflog::{Reflog, ReflogEntry};

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::{Mutex, MutexGuard};
use tokio_util::sync::CancellationToken;

use crate::commands::{CommandRegistry, Context, resolve_path};
use crate::engine::{EngineConfig, Repository};
use crate::error::{Error, Result};
use crate::fs::FileSystem;
use crate::limits::SessionLimits;
use crate::logging_impl::sanitize_args;

/// Mutable per-session state. Only reachable through [`Session::lock`].
pub struct SessionState {
    fs: Arc<dyn FileSystem>,
    repos: BTreeMap<String, Repository>,
    cwd: PathBuf,
    reflog: Reflog,
    engine: Arc<EngineConfig>,
}

impl SessionState {
    pub(crate) fn new(fs: Arc<dyn FileSystem>, engine: Arc<EngineConfig>, limits: &SessionLimits) -> Self {
        Self {
            fs,
            repos: BTreeMap::new(),
            cwd: PathBuf::from("/"),
            reflog: Reflog::with_retention(limits.max_reflog_entries),
            engine,
        }
    }

    /// The session's virtual filesystem.
    pub fn fs(&self) -> &Arc<dyn FileSystem> {
        &self.fs
    }

    /// Engine configuration shared by every repository in the session.
    pub fn engine(&self) -> &Arc<EngineConfig> {
        &self.engine
    }

    /// Current working directory: absolute and normalized.
    pub fn cwd(&self) -> &Path {
        &self.cwd
    }

    /// Resolve a command operand against the working directory.
    pub fn resolve(&self, path: &str) -> PathBuf {
        resolve_path(&self.cwd, path)
    }

    /// Change directory. The target must exist and be a directory;
    /// on failure the working directory is unchanged.
    pub async fn set_cwd(&mut self, path: &str) -> Result<()> {
        let target = self.resolve(path);
        let meta = self.fs.stat(&target).await?;
        if !meta.file_type.is_dir() {
            return Err(Error::NotADirectory(target));
        }
        self.cwd = target;
        Ok(())
    }

    /// Repository registered under `key`.
    pub fn repo(&self, key: &str) -> Option<&Repository> {
        self.repos.get(key)
    }

    /// Repository whose root contains the working directory.
    pub fn current_repo(&self) -> Option<&Repository> {
        self.repos.values().find(|r| self.cwd.starts_with(r.root()))
    }

    /// Current repository, or [`Error::NotARepository`].
    pub fn require_repo(&self) -> Result<&Repository> {
        self.current_repo().ok_or(Error::NotARepository)
    }

    /// Registered repository keys, sorted.
    pub fn repo_keys(&self) -> impl Iterator<Item = &str> {
        self.repos.keys().map(String::as_str)
    }

    /// Create `/key`, initialize an engine there and register it.
    ///
    /// Fails with [`Error::RepoExists`] without touching anything when the
    /// key is already registered.
    pub async fn init_repo(&mut self, key: &str) -> Result<&Repository> {
        validate_key(key)?;
        if self.repos.contains_key(key) {
            return Err(Error::RepoExists(key.to_string()));
        }

        let repo = Repository::init(Arc::clone(&self.fs), Arc::clone(&self.engine), key).await?;
        self.register_repo(repo)
    }

    /// Register an already materialized repository under its key.
    pub fn register_repo(&mut self, repo: Repository) -> Result<&Repository> {
        let key = repo.key().to_string();
        if self.repos.contains_key(&key) {
            return Err(Error::RepoExists(key));
        }
        tracing::debug!(key = %key, "repository registered");
        Ok(self.repos.entry(key).or_insert(repo))
    }

    /// Move the working directory into a registered repository's root.
    pub(crate) fn enter_repo(&mut self, key: &str) -> Result<()> {
        let root = self
            .repos
            .get(key)
            .map(|r| r.root().to_path_buf())
            .ok_or(Error::NotARepository)?;
        self.cwd = root;
        Ok(())
    }

    pub fn reflog(&self) -> &Reflog {
        &self.reflog
    }

    /// Record a reference movement.
    pub fn reflog_mut(&mut self) -> &mut Reflog {
        &mut self.reflog
    }
}

/// Repository keys are single path components.
pub(crate) fn validate_key(key: &str) -> Result<()> {
    if key.is_empty() || key == "." || key == ".." || key.contains('/') || key.contains('\\') {
        return Err(Error::usage(format!("invalid repository name '{}'", key)));
    }
    Ok(())
}

/// Isolated per-user sandbox.
pub struct Session {
    id: String,
    state: Mutex<SessionState>,
    command_timeout: Option<std::time::Duration>,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session").field("id", &self.id).finish_non_exhaustive()
    }
}

impl Session {
    pub(crate) fn new(id: String, state: SessionState, limits: &SessionLimits) -> Self {
        Self {
            id,
            state: Mutex::new(state),
            command_timeout: limits.command_timeout,
        }
    }

    /// Session identifier, immutable for the session's lifetime.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Acquire the session lock. Dropping the guard releases it.
    pub async fn lock(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().await
    }

    /// Dispatch one command line (already tokenized) against this session.
    ///
    /// The command named by `args[0]` is built fresh from `registry` and
    /// runs with the session lock held. If the configured command timeout
    /// fires, `cancel`'s child token is canceled and the command is driven
    /// to completion so it can roll back before the lock is released. The
    /// result is [`Error::Canceled`] even if the command then succeeds.
    pub async fn execute(
        &self,
        registry: &CommandRegistry,
        cancel: &CancellationToken,
        args: &[String],
    ) -> Result<String> {
        let Some(name) = args.first() else {
            return Err(Error::usage("empty command"));
        };
        let factory = registry
            .lookup(name)
            .ok_or_else(|| Error::CommandNotFound(name.clone()))?;
        let command = factory();

        let mut state = tokio::select! {
            guard = self.state.lock() => guard,
            _ = cancel.cancelled() => return Err(Error::Canceled),
        };

        tracing::debug!(session = %self.id, args = %sanitize_args(args), "dispatch");

        let token = cancel.child_token();
        let ctx = Context {
            args,
            state: &mut *state,
            cancel: &token,
            registry,
        };
        let mut fut = command.execute(ctx);

        let result = match self.command_timeout {
            Some(limit) => {
                tokio::select! {
                    result = &mut fut => result,
                    _ = tokio::time::sleep(limit) => {
                        tracing::warn!(session = %self.id, command = %name, ?limit, "command timed out");
                        token.cancel();
                        // Let the command unwind before the lock is released
                        if fut.await.is_ok() {
                            tracing::warn!(
                                session = %self.id,
                                command = %name,
                                "command ignored cancellation"
                            );
                        }
                        Err(Error::Canceled)
                    }
                }
            }
            None => fut.await,
        };

        if let Err(e) = &result {
            tracing::debug!(session = %self.id, command = %name, error = %e, "command failed");
        }
        result
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::fs::InMemoryFs;

    fn state() -> SessionState {
        SessionState::new(
            Arc::new(InMemoryFs::new()),
            Arc::new(EngineConfig::new()),
            &SessionLimits::default(),
        )
    }

    #[tokio::test]
    async fn test_new_state_is_empty() {
        let state = state();
        assert_eq!(state.cwd(), Path::new("/"));
        assert!(state.current_repo().is_none());
        assert!(state.reflog().is_empty());
        assert_eq!(state.repo_keys().count(), 0);
    }

    #[tokio::test]
    async fn test_init_repo_registers_once() {
        let mut state = state();
        let root = state.init_repo("repo").await.unwrap().root().to_path_buf();
        assert_eq!(root, PathBuf::from("/repo"));
        assert!(state.fs().exists(Path::new("/repo/.git")).await.unwrap());

        let err = state.init_repo("repo").await.unwrap_err();
        assert!(matches!(err, Error::RepoExists(k) if k == "repo"));
        assert_eq!(state.repo_keys().collect::<Vec<_>>(), vec!["repo"]);
    }

    #[tokio::test]
    async fn test_init_repo_rejects_paths() {
        let mut state = state();
        for bad in ["", "..", "a/b"] {
            assert!(matches!(state.init_repo(bad).await, Err(Error::Usage(_))));
        }
    }

    #[tokio::test]
    async fn test_current_repo_follows_cwd() {
        let mut state = state();
        state.init_repo("alpha").await.unwrap();
        state.init_repo("alphabet").await.unwrap();
        state.fs().mkdir_all(Path::new("/alphabet/sub"), 0o755).await.unwrap();

        assert!(state.current_repo().is_none());

        state.set_cwd("/alphabet/sub").await.unwrap();
        // Component-wise prefix: /alpha is not a parent of /alphabet
        assert_eq!(state.current_repo().map(|r| r.key()), Some("alphabet"));

        state.set_cwd("../../alpha").await.unwrap();
        assert_eq!(state.current_repo().map(|r| r.key()), Some("alpha"));
        assert_eq!(state.repo("alphabet").map(|r| r.key()), Some("alphabet"));
    }

    #[tokio::test]
    async fn test_set_cwd_failure_keeps_cwd() {
        let mut state = state();
        state.fs().write_file(Path::new("/file"), b"").await.unwrap();

        assert!(matches!(state.set_cwd("missing").await, Err(Error::NotFound(_))));
        assert!(matches!(state.set_cwd("/file").await, Err(Error::NotADirectory(_))));
        assert_eq!(state.cwd(), Path::new("/"));
    }
}
