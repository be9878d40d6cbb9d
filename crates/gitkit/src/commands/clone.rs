//! `clone <url>`: simulated fetch of a remote into `/<key>`.
//!
//! The clone is all-or-nothing. Files are materialized by the engine,
//! which removes them again on failure or cancellation; the session's
//! repository table, working directory and reflog are only touched after
//! the engine reports success, with no await point in between.
//!
//! # Security
//!
//! Only HTTPS remotes are accepted and, when an allowlist is configured,
//! only those matching it. Credentials in the URL never reach the logs.

use async_trait::async_trait;
use std::sync::Arc;

use super::{Command, Context};
use crate::engine::Repository;
use crate::error::{Error, Result};
use crate::logging_impl::LogConfig;
use crate::session::validate_key;

/// Derive the repository key from a remote URL: the last non-empty path
/// segment with a trailing `.git` removed.
///
/// ```rust
/// use gitkit::repo_key_from_url;
///
/// assert_eq!(repo_key_from_url("https://github.com/org/repo.git").as_deref(), Some("repo"));
/// assert_eq!(repo_key_from_url("https://github.com/org/repo/").as_deref(), Some("repo"));
/// assert_eq!(repo_key_from_url("https://github.com/"), None);
/// ```
pub fn repo_key_from_url(raw: &str) -> Option<String> {
    let parsed = url::Url::parse(raw).ok()?;
    let segment = parsed.path_segments()?.rev().find(|s| !s.is_empty())?;
    let key = segment.strip_suffix(".git").unwrap_or(segment);
    (!key.is_empty() && key != "." && key != "..").then(|| key.to_string())
}

/// The clone command.
#[derive(Debug, Default)]
pub struct GitClone;

#[async_trait]
impl Command for GitClone {
    async fn execute(&self, ctx: Context<'_>) -> Result<String> {
        let Some(url) = ctx.operands().iter().find(|a| !a.starts_with('-')) else {
            return Err(Error::usage(self.help()));
        };
        let redacted = LogConfig::default().redact_url(url).into_owned();

        let engine = Arc::clone(ctx.state.engine());
        if let Err(reason) = engine.is_url_allowed(url) {
            tracing::warn!(url = %redacted, "clone rejected by remote policy");
            return Err(Error::RemoteNotAllowed(reason));
        }

        let key = repo_key_from_url(url)
            .ok_or_else(|| Error::usage(format!("cannot derive a repository name from '{}'", redacted)))?;
        validate_key(&key)?;

        if ctx.state.repo(&key).is_some() {
            return Err(Error::RepoExists(key));
        }

        ctx.check_canceled()?;
        let fs = Arc::clone(ctx.state.fs());
        let (repo, commit) = Repository::clone_from(Arc::clone(&fs), engine, &key, url, ctx.cancel).await?;

        if let Err(e) = ctx.state.register_repo(repo) {
            if let Err(cleanup) = fs.remove(&std::path::PathBuf::from("/").join(&key), true).await {
                tracing::warn!(key = %key, error = %cleanup, "clone cleanup failed");
            }
            return Err(e);
        }
        ctx.state.enter_repo(&key)?;
        ctx.state
            .reflog_mut()
            .append(commit.hash, format!("clone: from {}", url));

        tracing::debug!(key = %key, url = %redacted, "cloned");
        Ok(format!("Cloned into '{}'\n", key))
    }

    fn help(&self) -> &'static str {
        "clone <url> - copy a remote repository into /<name> and enter it"
    }
}
