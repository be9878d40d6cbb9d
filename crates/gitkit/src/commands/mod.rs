//! Sandbox commands
//!
//! This module provides the [`Command`] trait for implementing commands
//! and the [`Context`] struct handed to each dispatch.
//!
//! # Custom Commands
//!
//! Implement the [`Command`] trait and register a factory:
//!
//! ```rust
//! use gitkit::{Command, CommandRegistry, Context, async_trait};
//! use std::sync::Arc;
//!
//! struct Whoami;
//!
//! #[async_trait]
//! impl Command for Whoami {
//!     async fn execute(&self, _ctx: Context<'_>) -> gitkit::Result<String> {
//!         Ok("sandbox\n".to_string())
//!     }
//!
//!     fn help(&self) -> &'static str {
//!         "whoami - print the sandbox user"
//!     }
//! }
//!
//! let mut registry = CommandRegistry::with_defaults();
//! registry.register("whoami", Arc::new(|| -> Box<dyn Command> { Box::new(Whoami) }));
//! assert!(registry.lookup("whoami").is_some());
//! ```

mod clone;
mod config;
mod fileops;
mod git;
mod help;
mod ls;
mod navigation;
mod reflog;
mod registry;
mod repo;

pub use clone::{GitClone, repo_key_from_url};
pub use config::GitConfig;
pub use fileops::{Mkdir, Touch, WriteFile};
pub use git::Git;
pub use help::Help;
pub use ls::Ls;
pub use navigation::{Cd, Pwd};
pub use reflog::GitReflog;
pub use registry::{CommandFactory, CommandRegistry};
pub use repo::{GitAdd, GitCommit, GitInit, GitLog};

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::error::{Error, Result};
use crate::session::SessionState;

/// Resolve a path relative to the current working directory.
///
/// If the path is absolute, returns it normalized.
/// If relative, joins it with the cwd first.
///
/// # Example
///
/// ```rust
/// use gitkit::resolve_path;
/// use std::path::{Path, PathBuf};
///
/// let rel = resolve_path(Path::new("/repo"), "dir1/nested.txt");
/// assert_eq!(rel, PathBuf::from("/repo/dir1/nested.txt"));
///
/// // Paths are normalized (. and .. resolved)
/// let up = resolve_path(Path::new("/repo/dir1"), "../..");
/// assert_eq!(up, PathBuf::from("/"));
/// ```
pub fn resolve_path(cwd: &Path, path_str: &str) -> PathBuf {
    let path = Path::new(path_str);
    let joined = if path.is_absolute() {
        path.to_path_buf()
    } else {
        cwd.join(path)
    };
    normalize_path(&joined)
}

/// Normalize a path by resolving `.` and `..` components.
///
/// `/.` becomes `/`, `/tmp/../home` becomes `/home`, and `..` at the root
/// stays at the root.
pub(crate) fn normalize_path(path: &Path) -> PathBuf {
    use std::path::Component;

    let mut result = PathBuf::from("/");

    for component in path.components() {
        match component {
            Component::Normal(name) => result.push(name),
            Component::ParentDir => {
                result.pop();
            }
            Component::RootDir | Component::CurDir | Component::Prefix(_) => {}
        }
    }

    result
}

/// Execution context for one command dispatch.
///
/// Borrows the locked session state for the duration of the call; there
/// is no way to reach it from a command other than through here.
pub struct Context<'a> {
    /// Full argument vector. `args[0]` is the verb.
    pub args: &'a [String],

    /// Session state, exclusively held for this dispatch.
    pub state: &'a mut SessionState,

    /// Fires when the caller cancels or the command timeout elapses.
    pub cancel: &'a CancellationToken,

    /// Registry the command was dispatched from, for commands that
    /// dispatch further (`git`, `help`).
    pub registry: &'a CommandRegistry,
}

impl<'a> Context<'a> {
    /// The verb this command was invoked as.
    pub fn name(&self) -> &str {
        self.args.first().map(String::as_str).unwrap_or_default()
    }

    /// Arguments after the verb.
    pub fn operands(&self) -> &'a [String] {
        self.args.get(1..).unwrap_or_default()
    }

    /// Whether `-h` or `--help` was passed.
    pub fn wants_help(&self) -> bool {
        self.operands().iter().any(|a| a == "-h" || a == "--help")
    }

    /// Fail with [`Error::Canceled`] once the dispatch has been canceled.
    /// Called before every mutation step.
    pub fn check_canceled(&self) -> Result<()> {
        if self.cancel.is_cancelled() {
            return Err(Error::Canceled);
        }
        Ok(())
    }
}

/// Trait for implementing sandbox commands.
///
/// Commands are stateless: the registry builds a fresh instance per
/// dispatch and all mutable state lives in [`Context::state`]. A command
/// either completes its mutation or leaves the session as it found it.
///
/// # Return Values
///
/// `Ok(String)` is the command's textual output (possibly empty).
/// Failures are returned as [`Error`] and shown to the user as-is.
#[async_trait]
pub trait Command: Send + Sync {
    /// Run the command.
    async fn execute(&self, ctx: Context<'_>) -> Result<String>;

    /// One-line usage text, shown by `help <verb>` and `<verb> -h`.
    fn help(&self) -> &'static str;
}

/// Every built-in command under its verb.
pub fn default_commands() -> Vec<(&'static str, CommandFactory)> {
    fn factory<C: Command + Default + 'static>() -> CommandFactory {
        Arc::new(|| -> Box<dyn Command> { Box::new(C::default()) })
    }

    vec![
        ("clone", factory::<GitClone>()),
        ("config", factory::<GitConfig>()),
        ("reflog", factory::<GitReflog>()),
        ("ls", factory::<Ls>()),
        ("init", factory::<GitInit>()),
        ("add", factory::<GitAdd>()),
        ("commit", factory::<GitCommit>()),
        ("log", factory::<GitLog>()),
        ("cd", factory::<Cd>()),
        ("pwd", factory::<Pwd>()),
        ("mkdir", factory::<Mkdir>()),
        ("touch", factory::<Touch>()),
        ("write", factory::<WriteFile>()),
        ("git", factory::<Git>()),
        ("help", factory::<Help>()),
    ]
}

/// Strip one matching pair of surrounding `"` or `'`.
pub(crate) fn unquote(value: &str) -> &str {
    for quote in ['"', '\''] {
        if value.len() >= 2 && value.starts_with(quote) && value.ends_with(quote) {
            return &value[1..value.len() - 1];
        }
    }
    value
}
