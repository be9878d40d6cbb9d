//! Repository handle: one engine instance rooted at a VFS directory.
//!
//! Engine state lives under `<root>/.git/` in the session's virtual
//! filesystem:
//!
//! | File | Contents |
//! |------|----------|
//! | `HEAD` | `ref: refs/heads/master` |
//! | `config` | ini-style [`RepoConfig`] |
//! | `index` | staged paths, one per line |
//! | `tracked` | committed paths, one per line |
//! | `commits` | `hash\|name\|email\|timestamp\|message`, newest first |
//! | `refs/heads/<branch>` | commit hash |
//!
//! This is not byte-compatible with git; callers only see the narrow
//! contract exposed here.

use std::collections::BTreeSet;
use std::fmt::Write as _;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use sha1::{Digest, Sha1};
use tokio_util::sync::CancellationToken;

use super::config::{EngineConfig, MockRemote, RepoConfig};
use crate::error::{Error, Result};
use crate::fs::{DEFAULT_DIR_MODE, FileSystem};

const DEFAULT_BRANCH: &str = "master";

/// A commit recorded in the engine's log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Commit {
    /// Full 40-hex object id
    pub hash: String,
    /// `Name <email>`
    pub author: String,
    /// Unix timestamp
    pub timestamp: i64,
    /// Commit message
    pub message: String,
}

impl Commit {
    /// First seven characters of the hash.
    pub fn short_hash(&self) -> &str {
        short_hash(&self.hash)
    }
}

/// Truncate an object id for display.
pub fn short_hash(hash: &str) -> &str {
    match hash.char_indices().nth(7) {
        Some((end, _)) => &hash[..end],
        None => hash,
    }
}

/// Handle into the embedded engine for one repository.
///
/// Cheap to clone: the filesystem and configuration are shared.
#[derive(Clone)]
pub struct Repository {
    key: String,
    root: PathBuf,
    fs: Arc<dyn FileSystem>,
    config: Arc<EngineConfig>,
}

impl std::fmt::Debug for Repository {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Repository")
            .field("key", &self.key)
            .field("root", &self.root)
            .finish_non_exhaustive()
    }
}

impl Repository {
    /// Initialize a new repository at `/key`.
    ///
    /// The root directory is created if missing. Fails with
    /// [`Error::RepoExists`] when `/key/.git` already exists. On any other
    /// failure `.git` is removed again, and the root too if it was created
    /// here.
    pub async fn init(fs: Arc<dyn FileSystem>, config: Arc<EngineConfig>, key: &str) -> Result<Self> {
        let repo = Self::handle(fs, config, key);
        let git_dir = repo.git_dir();

        if repo.fs.exists(&git_dir).await? {
            return Err(Error::RepoExists(repo.key));
        }
        let created_root = !repo.fs.exists(&repo.root).await?;

        if let Err(e) = repo.write_layout().await {
            let leftover = if created_root { &repo.root } else { &git_dir };
            match repo.fs.remove(leftover, true).await {
                Ok(()) | Err(Error::NotFound(_)) => {}
                Err(cleanup) => {
                    tracing::warn!(key = %repo.key, error = %cleanup, "init cleanup failed");
                }
            }
            return Err(e);
        }

        tracing::debug!(key = %repo.key, "repository initialized");
        Ok(repo)
    }

    async fn write_layout(&self) -> Result<()> {
        let git_dir = self.git_dir();

        self.fs.mkdir_all(&self.root, DEFAULT_DIR_MODE).await?;
        for dir in ["objects", "refs/heads", "refs/tags"] {
            self.fs.mkdir_all(&git_dir.join(dir), DEFAULT_DIR_MODE).await?;
        }

        self.fs
            .write_file(
                &git_dir.join("HEAD"),
                format!("ref: refs/heads/{}\n", DEFAULT_BRANCH).as_bytes(),
            )
            .await?;

        let mut repo_config = RepoConfig::default();
        repo_config.set("core.repositoryformatversion", "0");
        repo_config.set("core.filemode", "true");
        repo_config.set("core.bare", "false");
        self.set_config(&repo_config).await?;

        self.fs.write_file(&git_dir.join("index"), b"").await
    }

    /// Simulate `git clone <url>` into `/key`.
    ///
    /// Either the whole repository is materialized or nothing is left
    /// behind: on cancellation or any failure the root is removed again.
    /// `/key` must not exist beforehand.
    pub async fn clone_from(
        fs: Arc<dyn FileSystem>,
        config: Arc<EngineConfig>,
        key: &str,
        url: &str,
        cancel: &CancellationToken,
    ) -> Result<(Self, Commit)> {
        config.is_url_allowed(url).map_err(Error::RemoteNotAllowed)?;

        let repo = Self::handle(fs, config, key);
        if repo.fs.exists(&repo.root).await? {
            return Err(Error::RepoExists(repo.key));
        }

        let remote = repo.config.remote_for(url, key);
        fetch(&repo.config, cancel).await?;

        match repo.materialize(url, &remote, cancel).await {
            Ok(commit) => Ok((repo, commit)),
            Err(e) => {
                if let Err(cleanup) = repo.fs.remove(&repo.root, true).await {
                    tracing::warn!(key = %repo.key, error = %cleanup, "clone cleanup failed");
                }
                Err(e)
            }
        }
    }

    async fn materialize(&self, url: &str, remote: &MockRemote, cancel: &CancellationToken) -> Result<Commit> {
        let repo = Self::init(Arc::clone(&self.fs), Arc::clone(&self.config), &self.key).await?;

        for (rel, content) in remote.files() {
            check_canceled(cancel)?;
            let path = repo.root.join(rel.trim_start_matches('/'));
            if let Some(parent) = path.parent() {
                repo.fs.mkdir_all(parent, DEFAULT_DIR_MODE).await?;
            }
            repo.fs.write_file(&path, content).await?;
        }

        let mut repo_config = repo.config().await?;
        repo_config.set("remote \"origin\".url", url);
        repo_config.set("remote \"origin\".fetch", "+refs/heads/*:refs/remotes/origin/*");
        repo.set_config(&repo_config).await?;

        check_canceled(cancel)?;
        repo.add(std::slice::from_ref(&repo.root)).await?;

        // Same URL and contents always yield the same id, whichever
        // session clones it.
        let mut hasher = Sha1::new();
        hasher.update(b"clone\0");
        hasher.update(url.as_bytes());
        for (rel, content) in remote.files() {
            hasher.update(b"\0");
            hasher.update(rel.as_bytes());
            hasher.update(b"\0");
            hasher.update(content);
        }
        let hash = to_hex(&hasher.finalize());

        check_canceled(cancel)?;
        repo.record_commit(hash, "Initial commit").await
    }

    fn handle(fs: Arc<dyn FileSystem>, config: Arc<EngineConfig>, key: &str) -> Self {
        Self {
            key: key.to_string(),
            root: PathBuf::from("/").join(key),
            fs,
            config,
        }
    }

    /// Key under which the owning session registers this repository.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Root directory in the virtual filesystem (`/` + key).
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn git_dir(&self) -> PathBuf {
        self.root.join(".git")
    }

    async fn read_text(&self, path: &Path) -> Result<Option<String>> {
        match self.fs.read_file(path).await {
            Ok(bytes) => Ok(Some(String::from_utf8_lossy(&bytes).into_owned())),
            Err(Error::NotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn read_lines(&self, name: &str) -> Result<BTreeSet<String>> {
        let content = self.read_text(&self.git_dir().join(name)).await?;
        Ok(content
            .unwrap_or_default()
            .lines()
            .filter(|l| !l.is_empty())
            .map(str::to_string)
            .collect())
    }

    async fn write_lines(&self, name: &str, lines: &BTreeSet<String>) -> Result<()> {
        let content: Vec<&str> = lines.iter().map(String::as_str).collect();
        self.fs
            .write_file(&self.git_dir().join(name), content.join("\n").as_bytes())
            .await
    }

    /// Read the repository's config store.
    pub async fn config(&self) -> Result<RepoConfig> {
        let path = self.git_dir().join("config");
        let content = self
            .read_text(&path)
            .await?
            .ok_or_else(|| Error::Internal(format!("missing config in {}", self.root.display())))?;
        Ok(RepoConfig::parse(&content))
    }

    /// Persist the repository's config store.
    pub async fn set_config(&self, config: &RepoConfig) -> Result<()> {
        self.fs
            .write_file(&self.git_dir().join("config"), config.render().as_bytes())
            .await
    }

    /// Current branch name from `HEAD`.
    pub async fn branch(&self) -> Result<String> {
        let head = self.read_text(&self.git_dir().join("HEAD")).await?;
        Ok(head
            .as_deref()
            .and_then(|h| h.trim().strip_prefix("ref: refs/heads/"))
            .unwrap_or(DEFAULT_BRANCH)
            .to_string())
    }

    /// Hash `HEAD` points at, or `None` before the first commit.
    pub async fn head(&self) -> Result<Option<String>> {
        let branch = self.branch().await?;
        let target = self
            .read_text(&self.git_dir().join("refs/heads").join(branch))
            .await?;
        Ok(target.map(|t| t.trim().to_string()).filter(|t| !t.is_empty()))
    }

    /// Stage files. `paths` are absolute VFS paths inside the repository;
    /// directories are staged recursively. Returns the number of paths
    /// newly staged.
    pub async fn add(&self, paths: &[PathBuf]) -> Result<usize> {
        let mut staged = self.read_lines("index").await?;
        let before = staged.len();

        for path in paths {
            if !path.starts_with(&self.root) {
                return Err(Error::usage(format!(
                    "'{}' is outside repository at '{}'",
                    path.display(),
                    self.root.display()
                )));
            }
            let meta = self.fs.stat(path).await?;
            if meta.file_type.is_dir() {
                for file in self.list_files(path).await? {
                    staged.insert(file);
                }
            } else if let Some(rel) = self.relative(path) {
                staged.insert(rel);
            }
        }

        self.write_lines("index", &staged).await?;
        Ok(staged.len() - before)
    }

    fn relative(&self, path: &Path) -> Option<String> {
        let rel = path.strip_prefix(&self.root).ok()?;
        if rel.components().next() == Some(Component::Normal(".git".as_ref())) {
            return None;
        }
        let rel = rel.to_string_lossy().to_string();
        (!rel.is_empty()).then_some(rel)
    }

    /// Repository-relative paths of every file under `dir`, skipping `.git`.
    async fn list_files(&self, dir: &Path) -> Result<Vec<String>> {
        let mut files = Vec::new();
        let mut pending = vec![dir.to_path_buf()];

        while let Some(current) = pending.pop() {
            for entry in self.fs.read_dir(&current).await? {
                if entry.name == ".git" {
                    continue;
                }
                let path = current.join(&entry.name);
                if entry.metadata.file_type.is_dir() {
                    pending.push(path);
                } else if let Some(rel) = self.relative(&path) {
                    files.push(rel);
                }
            }
        }

        files.sort();
        Ok(files)
    }

    /// Record staged changes as a new commit on the current branch.
    pub async fn commit(&self, message: &str) -> Result<Commit> {
        let staged = self.read_lines("index").await?;
        if staged.is_empty() {
            return Err(Error::usage("nothing to commit, working tree clean"));
        }

        let parent = self.head().await?;
        let identity = self.config().await?.identity_or(&self.config.identity);
        let timestamp = chrono::Utc::now().timestamp();

        let mut hasher = Sha1::new();
        for path in &staged {
            // Staged files deleted since `add` are recorded as empty
            let content = match self.fs.read_file(&self.root.join(path)).await {
                Ok(content) => content,
                Err(Error::NotFound(_)) => Vec::new(),
                Err(e) => return Err(e),
            };
            hasher.update(path.as_bytes());
            hasher.update(b"\0");
            hasher.update(&content);
        }
        if let Some(parent) = &parent {
            hasher.update(b"parent ");
            hasher.update(parent.as_bytes());
        }
        hasher.update(format!("\n{} <{}> {}\n\n{}", identity.name, identity.email, timestamp, message).as_bytes());
        let hash = to_hex(&hasher.finalize());

        self.record_commit(hash, message).await
    }

    async fn record_commit(&self, hash: String, message: &str) -> Result<Commit> {
        let git_dir = self.git_dir();
        let identity = self.config().await?.identity_or(&self.config.identity);
        let commit = Commit {
            hash,
            author: format!("{} <{}>", identity.name, identity.email),
            timestamp: chrono::Utc::now().timestamp(),
            message: message.to_string(),
        };

        let previous = self.read_text(&git_dir.join("commits")).await?.unwrap_or_default();
        let entry = format!(
            "{}|{}|{}|{}|{}\n",
            commit.hash,
            identity.name.replace('|', "\\|"),
            identity.email.replace('|', "\\|"),
            commit.timestamp,
            message.replace('|', "\\|").replace('\n', "\\n")
        );
        self.fs
            .write_file(&git_dir.join("commits"), (entry + &previous).as_bytes())
            .await?;

        let mut tracked = self.read_lines("tracked").await?;
        tracked.extend(self.read_lines("index").await?);
        self.write_lines("tracked", &tracked).await?;
        self.fs.write_file(&git_dir.join("index"), b"").await?;

        let branch = self.branch().await?;
        self.fs
            .write_file(&git_dir.join("refs/heads").join(branch), commit.hash.as_bytes())
            .await?;

        tracing::debug!(key = %self.key, hash = %commit.short_hash(), "commit recorded");
        Ok(commit)
    }

    /// Commit history, newest first.
    pub async fn log(&self, limit: Option<usize>) -> Result<Vec<Commit>> {
        let content = self
            .read_text(&self.git_dir().join("commits"))
            .await?
            .unwrap_or_default();

        let commits = content
            .lines()
            .filter_map(parse_commit_line)
            .take(limit.unwrap_or(usize::MAX))
            .collect();
        Ok(commits)
    }

    /// Render commits the way `git log` does.
    pub fn format_log(commits: &[Commit]) -> String {
        let mut output = String::new();

        for commit in commits {
            let _ = writeln!(output, "commit {}", commit.hash);
            let _ = writeln!(output, "Author: {}", commit.author);
            if let Some(dt) = chrono::DateTime::from_timestamp(commit.timestamp, 0) {
                let _ = writeln!(output, "Date:   {}", dt.format("%a %b %d %H:%M:%S %Y %z"));
            }
            output.push('\n');
            for line in commit.message.lines() {
                let _ = writeln!(output, "    {}", line);
            }
            output.push('\n');
        }

        output
    }
}

/// Split on `|` not preceded by a backslash.
fn split_escaped(line: &str) -> Vec<String> {
    let mut fields = vec![String::new()];
    let mut chars = line.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '\\' if chars.peek() == Some(&'|') => {
                chars.next();
                push_char(&mut fields, '|');
            }
            '|' => fields.push(String::new()),
            _ => push_char(&mut fields, c),
        }
    }
    fields
}

fn push_char(fields: &mut [String], c: char) {
    if let Some(field) = fields.last_mut() {
        field.push(c);
    }
}

fn parse_commit_line(line: &str) -> Option<Commit> {
    let fields = split_escaped(line);
    let [hash, name, email, timestamp, message] = fields.as_slice() else {
        return None;
    };
    Some(Commit {
        hash: hash.clone(),
        author: format!("{} <{}>", name, email),
        timestamp: timestamp.parse().unwrap_or(0),
        message: message.replace("\\n", "\n"),
    })
}

fn to_hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

fn check_canceled(cancel: &CancellationToken) -> Result<()> {
    if cancel.is_cancelled() {
        return Err(Error::Canceled);
    }
    Ok(())
}

/// Simulated network round trip. Honors cancellation while waiting.
async fn fetch(config: &EngineConfig, cancel: &CancellationToken) -> Result<()> {
    check_canceled(cancel)?;
    if config.clone_latency.is_zero() {
        return Ok(());
    }
    tokio::select! {
        _ = cancel.cancelled() => Err(Error::Canceled),
        _ = tokio::time::sleep(config.clone_latency) => Ok(()),
    }
}
