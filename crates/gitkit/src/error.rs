//! Error types for Gitkit
//!
//! Every failure a command can raise is a variant here. Messages are meant
//! for direct display to the sandbox user, so they never include host
//! paths or internal state beyond the virtual path involved.

use std::path::PathBuf;

use crate::fs::FsLimitExceeded;
use crate::limits::LimitExceeded;
use thiserror::Error;

/// Result type alias using Gitkit's Error.
pub type Result<T> = std::result::Result<T, Error>;

/// Gitkit error types.
///
/// The blast radius of any of these is the single session that raised it:
/// the manager and other sessions are never left in a modified state.
#[derive(Error, Debug)]
pub enum Error {
    /// Malformed argument vector. Reported verbatim, never retried.
    #[error("usage: {0}")]
    Usage(String),

    /// Repository-scoped command run outside any repository.
    #[error("fatal: not a git repository (or any of the parent directories)")]
    NotARepository,

    /// Clone or init targeting a key that is already registered.
    #[error("fatal: destination path '{0}' already exists")]
    RepoExists(String),

    /// Path does not exist where existence was required.
    #[error("{}: no such file or directory", .0.display())]
    NotFound(PathBuf),

    /// Path exists but is not a directory.
    #[error("{}: not a directory", .0.display())]
    NotADirectory(PathBuf),

    /// Invocation context was canceled (or the command timed out).
    #[error("operation canceled")]
    Canceled,

    /// Session identifier is already registered with the manager.
    #[error("session already exists: {0}")]
    DuplicateSession(String),

    /// No live session under this identifier.
    #[error("unknown session: {0}")]
    UnknownSession(String),

    /// No command is registered under this name.
    #[error("{0}: command not found")]
    CommandNotFound(String),

    /// Remote URL rejected by the engine's remote policy.
    #[error("{0}")]
    RemoteNotAllowed(String),

    /// Resource limit exceeded.
    #[error("resource limit exceeded: {0}")]
    ResourceLimit(#[from] LimitExceeded),

    /// I/O error from filesystem operations.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Internal error for unexpected failures.
    ///
    /// Used for corrupted engine state inside the virtual filesystem and
    /// for logic errors that indicate a bug.
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<FsLimitExceeded> for Error {
    fn from(err: FsLimitExceeded) -> Self {
        Self::ResourceLimit(LimitExceeded::Filesystem(err))
    }
}

impl Error {
    /// Create a usage error.
    pub fn usage(message: impl Into<String>) -> Self {
        Self::Usage(message.into())
    }

    /// Whether this error came from cancellation or a timeout.
    pub fn is_canceled(&self) -> bool {
        matches!(self, Self::Canceled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_are_user_facing() {
        assert_eq!(
            Error::RepoExists("repo".into()).to_string(),
            "fatal: destination path 'repo' already exists"
        );
        assert_eq!(
            Error::NotFound(PathBuf::from("/repo/missing")).to_string(),
            "/repo/missing: no such file or directory"
        );
        assert_eq!(
            Error::usage("config <key> <value>").to_string(),
            "usage: config <key> <value>"
        );
    }

    #[test]
    fn test_is_canceled() {
        assert!(Error::Canceled.is_canceled());
        assert!(!Error::NotARepository.is_canceled());
    }
}
