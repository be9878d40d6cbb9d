//! Engine configuration and the per-repository config store.
//!
//! [`EngineConfig`] is process-wide: sandbox identity, which remotes a
//! clone may name, how slow the simulated network is, and which mock
//! remotes exist. [`RepoConfig`] is the parsed form of one repository's
//! `.git/config` file.

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt::Write as _;
use std::time::Duration;

/// Default author name for commits in the sandbox.
pub const DEFAULT_AUTHOR_NAME: &str = "sandbox";

/// Default author email for commits in the sandbox.
pub const DEFAULT_AUTHOR_EMAIL: &str = "sandbox@gitkit.local";

/// Author identity used when a repository has no `user.*` config.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub name: String,
    pub email: String,
}

impl Default for Identity {
    fn default() -> Self {
        Self {
            name: DEFAULT_AUTHOR_NAME.to_string(),
            email: DEFAULT_AUTHOR_EMAIL.to_string(),
        }
    }
}

/// Contents served for a simulated remote.
///
/// # Example
///
/// ```rust
/// use gitkit::MockRemote;
///
/// let remote = MockRemote::new()
///     .file("README.md", "# demo\n")
///     .file("src/lib.rs", "");
/// assert_eq!(remote.files().len(), 2);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MockRemote {
    files: Vec<(String, Vec<u8>)>,
}

impl MockRemote {
    /// Create an empty remote.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a file at a repository-relative path. Parent directories are
    /// implied by the path.
    pub fn file(mut self, path: impl Into<String>, content: impl Into<Vec<u8>>) -> Self {
        self.files.push((path.into(), content.into()));
        self
    }

    /// Files in insertion order.
    pub fn files(&self) -> &[(String, Vec<u8>)] {
        &self.files
    }

    /// Remote served for URLs without a registered mock: a single README.
    pub(crate) fn fallback(key: &str) -> Self {
        Self::new().file("README.md", format!("# {}\n", key))
    }
}

/// Embedded engine configuration.
///
/// # Example
///
/// ```rust
/// use gitkit::{EngineConfig, MockRemote};
///
/// let config = EngineConfig::new()
///     .author("Instructor", "instructor@example.com")
///     .allow_remote("https://github.com/course/")
///     .remote(
///         "https://github.com/course/hello.git",
///         MockRemote::new().file("hello.txt", "hi\n"),
///     );
/// assert_eq!(config.identity().name, "Instructor");
/// ```
///
/// # Security
///
/// - Author identity is sandboxed (never read from the host)
/// - Only HTTPS URLs are accepted by clone
/// - An allowlist, once configured, restricts clone to matching prefixes
#[derive(Debug, Clone, Default)]
pub struct EngineConfig {
    pub(crate) identity: Identity,
    /// `None` accepts any HTTPS remote.
    pub(crate) remote_allowlist: Option<HashSet<String>>,
    pub(crate) clone_latency: Duration,
    pub(crate) remotes: HashMap<String, MockRemote>,
}

impl EngineConfig {
    /// Create a configuration with the default sandbox identity.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the author name and email for commits.
    pub fn author(mut self, name: impl Into<String>, email: impl Into<String>) -> Self {
        self.identity = Identity {
            name: name.into(),
            email: email.into(),
        };
        self
    }

    /// Restrict clone to URLs starting with `pattern`. May be called more
    /// than once; any matching prefix admits the URL.
    pub fn allow_remote(mut self, pattern: impl Into<String>) -> Self {
        self.remote_allowlist
            .get_or_insert_with(HashSet::new)
            .insert(pattern.into());
        self
    }

    /// Add several allowlist prefixes.
    pub fn allow_remotes(mut self, patterns: impl IntoIterator<Item = impl Into<String>>) -> Self {
        for pattern in patterns {
            self = self.allow_remote(pattern);
        }
        self
    }

    /// Delay applied to every simulated fetch.
    pub fn clone_latency(mut self, latency: Duration) -> Self {
        self.clone_latency = latency;
        self
    }

    /// Register the contents served for `url`.
    pub fn remote(mut self, url: impl Into<String>, remote: MockRemote) -> Self {
        self.remotes.insert(url.into(), remote);
        self
    }

    /// Configured author identity.
    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    /// Contents for `url`, falling back to a README-only repository.
    pub(crate) fn remote_for(&self, url: &str, key: &str) -> MockRemote {
        self.remotes
            .get(url)
            .cloned()
            .unwrap_or_else(|| MockRemote::fallback(key))
    }

    /// Check if a remote URL may be cloned.
    pub(crate) fn is_url_allowed(&self, url: &str) -> Result<(), String> {
        if !url.starts_with("https://") {
            return Err(format!(
                "fatal: only HTTPS URLs are allowed (got '{}')\n\
                 hint: SSH and git:// protocols are disabled in the sandbox",
                url
            ));
        }

        match &self.remote_allowlist {
            None => Ok(()),
            Some(patterns) if patterns.iter().any(|p| url.starts_with(p.as_str())) => Ok(()),
            Some(_) => Err(format!(
                "fatal: remote URL '{}' is not in allowlist\n\
                 hint: configure allowed remotes with EngineConfig::allow_remote()",
                url
            )),
        }
    }
}

/// Parsed `.git/config`.
///
/// Sections and keys keep their file order so a read/modify/write cycle
/// only changes what was set. Section and key names compare
/// case-insensitively, as git does.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RepoConfig {
    sections: Vec<ConfigSection>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct ConfigSection {
    name: String,
    entries: Vec<(String, String)>,
}

impl RepoConfig {
    /// Parse the ini-style text of a config file. Lines outside any
    /// section and lines without `=` are dropped.
    pub fn parse(content: &str) -> Self {
        let mut config = Self::default();

        for line in content.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
                continue;
            }

            if line.starts_with('[') && line.ends_with(']') {
                config.sections.push(ConfigSection {
                    name: line[1..line.len() - 1].trim().to_string(),
                    entries: Vec::new(),
                });
                continue;
            }

            if let (Some(section), Some((k, v))) = (config.sections.last_mut(), line.split_once('='))
            {
                section
                    .entries
                    .push((k.trim().to_string(), parse_value(v.trim())));
            }
        }

        config
    }

    /// Render back to ini-style text.
    pub fn render(&self) -> String {
        let mut out = String::new();
        for section in &self.sections {
            let _ = writeln!(out, "[{}]", section.name);
            for (k, v) in &section.entries {
                let _ = writeln!(out, "\t{} = {}", k, render_value(v));
            }
        }
        out
    }

    /// Look up `section.key` (e.g. `"user.name"`). The section part may
    /// contain a subsection: `remote "origin".url`.
    pub fn get(&self, dotted: &str) -> Option<&str> {
        let (section, key) = dotted.rsplit_once('.')?;
        self.sections
            .iter()
            .filter(|s| s.name.eq_ignore_ascii_case(section))
            .flat_map(|s| s.entries.iter())
            .rev()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v.as_str())
    }

    /// Set `section.key`, replacing an existing value in place or adding
    /// the section/key at the end.
    pub fn set(&mut self, dotted: &str, value: impl Into<String>) -> bool {
        let Some((section, key)) = dotted.rsplit_once('.') else {
            return false;
        };
        let value = value.into();

        let idx = match self
            .sections
            .iter()
            .position(|s| s.name.eq_ignore_ascii_case(section))
        {
            Some(idx) => idx,
            None => {
                self.sections.push(ConfigSection {
                    name: section.to_string(),
                    entries: Vec::new(),
                });
                self.sections.len() - 1
            }
        };

        let entries = &mut self.sections[idx].entries;
        match entries.iter_mut().find(|(k, _)| k.eq_ignore_ascii_case(key)) {
            Some(entry) => entry.1 = value,
            None => entries.push((key.to_string(), value)),
        }
        true
    }

    /// `user.name`, if set.
    pub fn user_name(&self) -> Option<&str> {
        self.get("user.name")
    }

    /// `user.email`, if set.
    pub fn user_email(&self) -> Option<&str> {
        self.get("user.email")
    }

    /// Identity to author commits with, falling back to `default`.
    pub fn identity_or(&self, default: &Identity) -> Identity {
        Identity {
            name: self.user_name().unwrap_or(&default.name).to_string(),
            email: self.user_email().unwrap_or(&default.email).to_string(),
        }
    }
}

/// Quote a value when it would not survive a parse as-is: line breaks,
/// quotes, backslashes, comment starters or surrounding whitespace.
fn render_value(value: &str) -> String {
    let needs_quotes = value.trim() != value
        || value
            .chars()
            .any(|c| c.is_control() || matches!(c, '"' | '\\' | '#' | ';'));
    if !needs_quotes {
        return value.to_string();
    }

    let mut out = String::with_capacity(value.len() + 2);
    out.push('"');
    for c in value.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            _ => out.push(c),
        }
    }
    out.push('"');
    out
}

fn parse_value(raw: &str) -> String {
    let Some(quoted) = raw.strip_prefix('"') else {
        return raw.to_string();
    };

    let mut out = String::with_capacity(quoted.len());
    let mut chars = quoted.chars();
    while let Some(c) = chars.next() {
        match c {
            '"' => break,
            '\\' => match chars.next() {
                Some('n') => out.push('\n'),
                Some('r') => out.push('\r'),
                Some('t') => out.push('\t'),
                Some(other) => out.push(other),
                None => break,
            },
            _ => out.push(c),
        }
    }
    out
}
