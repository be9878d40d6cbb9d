//! Resource limits for sandbox sessions
//!
//! These bound how much a single tenant can hold on to: how many sessions
//! may be live at once, how long an idle session survives, how long one
//! command may run and how much reflog history is retained.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::fs::FsLimitExceeded;

/// Default maximum number of live sessions: 1,000
pub const DEFAULT_MAX_SESSIONS: usize = 1_000;

/// Default per-command timeout: 30 seconds
pub const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(30);

/// Limits applied by the [`SessionManager`](crate::SessionManager) and by
/// every [`Session`](crate::Session) it creates.
///
/// # Example
///
/// ```rust
/// use gitkit::SessionLimits;
/// use std::time::Duration;
///
/// let limits = SessionLimits::new()
///     .max_sessions(16)
///     .idle_ttl(Duration::from_secs(600))
///     .max_reflog_entries(256);
/// assert_eq!(limits.max_sessions, 16);
/// ```
///
/// Deserializable so a deployment can load it from JSON; durations are
/// expressed in whole seconds:
///
/// ```json
/// { "max_sessions": 64, "idle_ttl_secs": 900, "command_timeout_secs": 10 }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionLimits {
    /// Maximum number of sessions the manager holds at once.
    /// Default: 1,000
    pub max_sessions: usize,

    /// Sessions idle longer than this are removed by the sweep.
    /// Default: none (sessions live until removed explicitly)
    #[serde(rename = "idle_ttl_secs", with = "opt_secs")]
    pub idle_ttl: Option<Duration>,

    /// Upper bound on a single command dispatch.
    /// Default: 30 seconds
    #[serde(rename = "command_timeout_secs", with = "opt_secs")]
    pub command_timeout: Option<Duration>,

    /// Reflog retention; the oldest entry is dropped once reached.
    /// Default: unbounded
    pub max_reflog_entries: Option<usize>,
}

impl Default for SessionLimits {
    fn default() -> Self {
        Self {
            max_sessions: DEFAULT_MAX_SESSIONS,
            idle_ttl: None,
            command_timeout: Some(DEFAULT_COMMAND_TIMEOUT),
            max_reflog_entries: None,
        }
    }
}

impl SessionLimits {
    /// Create new limits with defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Remove every bound. Only for trusted, short-lived use.
    pub fn unlimited() -> Self {
        Self {
            max_sessions: usize::MAX,
            idle_ttl: None,
            command_timeout: None,
            max_reflog_entries: None,
        }
    }

    /// Set maximum live session count
    pub fn max_sessions(mut self, count: usize) -> Self {
        self.max_sessions = count;
        self
    }

    /// Set idle time-to-live
    pub fn idle_ttl(mut self, ttl: Duration) -> Self {
        self.idle_ttl = Some(ttl);
        self
    }

    /// Set per-command timeout
    pub fn command_timeout(mut self, timeout: Duration) -> Self {
        self.command_timeout = Some(timeout);
        self
    }

    /// Disable the per-command timeout
    pub fn no_command_timeout(mut self) -> Self {
        self.command_timeout = None;
        self
    }

    /// Set reflog retention
    pub fn max_reflog_entries(mut self, count: usize) -> Self {
        self.max_reflog_entries = Some(count);
        self
    }
}

/// Error returned when a resource limit is exceeded
#[derive(Debug, Clone, thiserror::Error)]
pub enum LimitExceeded {
    #[error("maximum session count reached ({0})")]
    MaxSessions(usize),

    #[error("{0}")]
    Filesystem(#[from] FsLimitExceeded),
}

mod opt_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Option<Duration>, s: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(d) => s.serialize_some(&d.as_secs()),
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Duration>, D::Error> {
        Ok(Option::<u64>::deserialize(d)?.map(Duration::from_secs))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_default_limits() {
        let limits = SessionLimits::default();
        assert_eq!(limits.max_sessions, DEFAULT_MAX_SESSIONS);
        assert_eq!(limits.idle_ttl, None);
        assert_eq!(limits.command_timeout, Some(Duration::from_secs(30)));
        assert_eq!(limits.max_reflog_entries, None);
    }

    #[test]
    fn test_builder_pattern() {
        let limits = SessionLimits::new()
            .max_sessions(3)
            .idle_ttl(Duration::from_secs(60))
            .no_command_timeout()
            .max_reflog_entries(10);

        assert_eq!(limits.max_sessions, 3);
        assert_eq!(limits.idle_ttl, Some(Duration::from_secs(60)));
        assert_eq!(limits.command_timeout, None);
        assert_eq!(limits.max_reflog_entries, Some(10));
    }

    #[test]
    fn test_deserialize_seconds() {
        let limits: SessionLimits =
            serde_json::from_str(r#"{"max_sessions": 4, "idle_ttl_secs": 90}"#).unwrap();
        assert_eq!(limits.max_sessions, 4);
        assert_eq!(limits.idle_ttl, Some(Duration::from_secs(90)));
        // Unspecified fields keep their defaults
        assert_eq!(limits.command_timeout, Some(DEFAULT_COMMAND_TIMEOUT));
    }
}
