//! Local repository commands - init, add, commit, log
//!
//! # Example
//!
//! ```text
//! init demo
//! cd demo
//! write README.md Hello
//! add README.md
//! commit -m "Initial commit"
//! log
//! ```

use async_trait::async_trait;
use std::path::PathBuf;

use super::{Command, Context};
use crate::engine::Repository;
use crate::error::{Error, Result};

/// The init command - create an empty repository at `/<name>`.
#[derive(Debug, Default)]
pub struct GitInit;

#[async_trait]
impl Command for GitInit {
    async fn execute(&self, ctx: Context<'_>) -> Result<String> {
        let [name] = ctx.operands() else {
            return Err(Error::usage(self.help()));
        };
        ctx.check_canceled()?;
        let root = ctx.state.init_repo(name).await?.root().display().to_string();
        Ok(format!("Initialized empty Git repository in {}/.git/\n", root))
    }

    fn help(&self) -> &'static str {
        "init <name> - create an empty repository at /<name>"
    }
}

/// The add command - stage files in the current repository.
#[derive(Debug, Default)]
pub struct GitAdd;

#[async_trait]
impl Command for GitAdd {
    async fn execute(&self, ctx: Context<'_>) -> Result<String> {
        let repo = ctx.state.require_repo()?;
        if ctx.operands().is_empty() {
            return Err(Error::usage("Nothing specified, nothing added."));
        }

        let paths: Vec<PathBuf> = ctx.operands().iter().map(|p| ctx.state.resolve(p)).collect();
        ctx.check_canceled()?;
        repo.add(&paths).await?;
        Ok(String::new())
    }

    fn help(&self) -> &'static str {
        "add <pathspec>... - stage files for the next commit"
    }
}

/// The commit command - record staged changes.
///
/// Usage: commit -m MESSAGE
#[derive(Debug, Default)]
pub struct GitCommit;

#[async_trait]
impl Command for GitCommit {
    async fn execute(&self, ctx: Context<'_>) -> Result<String> {
        let repo = ctx.state.require_repo()?.clone();

        let mut message: Option<&str> = None;
        let mut args = ctx.operands().iter();
        while let Some(arg) = args.next() {
            match arg.as_str() {
                "-m" | "--message" => message = args.next().map(String::as_str),
                a if a.starts_with("--message=") => message = a.strip_prefix("--message="),
                _ => {}
            }
        }
        let Some(message) = message.filter(|m| !m.trim().is_empty()) else {
            return Err(Error::usage(self.help()));
        };

        let initial = repo.head().await?.is_none();
        ctx.check_canceled()?;
        let commit = repo.commit(message).await?;
        let branch = repo.branch().await?;

        let summary = message.lines().next().unwrap_or_default();
        let (reflog_prefix, marker) = if initial {
            ("commit (initial)", " (root-commit)")
        } else {
            ("commit", "")
        };
        ctx.state
            .reflog_mut()
            .append(commit.hash.clone(), format!("{}: {}", reflog_prefix, summary));

        Ok(format!(
            "[{}{} {}] {}\n",
            branch,
            marker,
            commit.short_hash(),
            summary
        ))
    }

    fn help(&self) -> &'static str {
        "commit -m <message> - record staged changes"
    }
}

/// The log command - show commit history, newest first.
///
/// Usage: log [-n N | -N]
#[derive(Debug, Default)]
pub struct GitLog;

#[async_trait]
impl Command for GitLog {
    async fn execute(&self, ctx: Context<'_>) -> Result<String> {
        let repo = ctx.state.require_repo()?;

        let mut limit: Option<usize> = None;
        let mut args = ctx.operands().iter();
        while let Some(arg) = args.next() {
            let count = match arg.as_str() {
                "-n" => args.next().map(String::as_str),
                a => a.strip_prefix("-n").or_else(|| a.strip_prefix('-')),
            };
            let Some(n) = count.and_then(|c| c.parse().ok()) else {
                return Err(Error::usage(self.help()));
            };
            limit = Some(n);
        }

        let commits = repo.log(limit).await?;
        Ok(Repository::format_log(&commits))
    }

    fn help(&self) -> &'static str {
        "log [-n N] - show commit history"
    }
}
