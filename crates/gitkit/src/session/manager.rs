//! Registry of live sessions.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use super::{Session, SessionState};
use crate::engine::EngineConfig;
use crate::error::{Error, Result};
use crate::fs::{FsLimits, InMemoryFs};
use crate::limits::{LimitExceeded, SessionLimits};

struct SessionEntry {
    session: Arc<Session>,
    /// Milliseconds since the manager's epoch.
    last_active: AtomicU64,
}

/// Maps session identifiers to sessions.
///
/// One coarse lock guards the map. It is never held across an await and
/// never taken while a session lock is held by the same task, so the two
/// lock levels cannot deadlock.
///
/// # Example
///
/// ```rust
/// use gitkit::SessionManager;
///
/// let manager = SessionManager::new();
/// let session = manager.create_session(Some("alice".into())).unwrap();
/// assert_eq!(session.id(), "alice");
/// assert!(manager.get_session("alice").is_some());
/// assert!(manager.create_session(Some("alice".into())).is_err());
/// ```
pub struct SessionManager {
    sessions: RwLock<HashMap<String, SessionEntry>>,
    engine: Arc<EngineConfig>,
    limits: SessionLimits,
    fs_limits: FsLimits,
    epoch: Instant,
}

impl Default for SessionManager {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for SessionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionManager")
            .field("sessions", &self.len())
            .field("limits", &self.limits)
            .finish_non_exhaustive()
    }
}

impl SessionManager {
    /// Manager with default engine configuration and limits.
    pub fn new() -> Self {
        Self::with_config(EngineConfig::new(), SessionLimits::default(), FsLimits::default())
    }

    /// Manager whose sessions share `engine` and are bounded by the given
    /// limits.
    pub fn with_config(engine: EngineConfig, limits: SessionLimits, fs_limits: FsLimits) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            engine: Arc::new(engine),
            limits,
            fs_limits,
            epoch: Instant::now(),
        }
    }

    pub fn limits(&self) -> &SessionLimits {
        &self.limits
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, SessionEntry>> {
        self.sessions.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, SessionEntry>> {
        self.sessions.write().unwrap_or_else(|e| e.into_inner())
    }

    fn now_millis(&self) -> u64 {
        u64::try_from(self.epoch.elapsed().as_millis()).unwrap_or(u64::MAX)
    }

    /// Create and register a session. A missing id is replaced by a
    /// random UUID.
    pub fn create_session(&self, id: Option<String>) -> Result<Arc<Session>> {
        let id = match id {
            Some(id) if id.trim().is_empty() => {
                return Err(Error::usage("session id must not be empty"));
            }
            Some(id) => id,
            None => uuid::Uuid::new_v4().to_string(),
        };

        let mut sessions = self.write();
        if sessions.contains_key(&id) {
            tracing::warn!(session = %id, "duplicate session rejected");
            return Err(Error::DuplicateSession(id));
        }
        if sessions.len() >= self.limits.max_sessions {
            tracing::warn!(max = self.limits.max_sessions, "session limit reached");
            return Err(LimitExceeded::MaxSessions(self.limits.max_sessions).into());
        }

        let fs = Arc::new(InMemoryFs::with_limits(self.fs_limits.clone()));
        let state = SessionState::new(fs, Arc::clone(&self.engine), &self.limits);
        let session = Arc::new(Session::new(id.clone(), state, &self.limits));

        sessions.insert(
            id.clone(),
            SessionEntry {
                session: Arc::clone(&session),
                last_active: AtomicU64::new(self.now_millis()),
            },
        );
        tracing::info!(session = %id, live = sessions.len(), "session created");
        Ok(session)
    }

    /// Look up a session and mark it active.
    pub fn get_session(&self, id: &str) -> Option<Arc<Session>> {
        let sessions = self.read();
        let entry = sessions.get(id)?;
        entry.last_active.store(self.now_millis(), Ordering::Relaxed);
        Some(Arc::clone(&entry.session))
    }

    /// Drop a session from the registry. Callers still holding its `Arc`
    /// keep it alive until they let go.
    pub fn remove_session(&self, id: &str) -> bool {
        let removed = self.write().remove(id).is_some();
        if removed {
            tracing::info!(session = %id, "session removed");
        }
        removed
    }

    /// Number of live sessions.
    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// Live session ids, sorted.
    pub fn session_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.read().keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Remove every session idle longer than the configured TTL. Returns
    /// how many were removed. A no-op without a TTL.
    pub fn sweep_expired(&self) -> usize {
        let Some(ttl) = self.limits.idle_ttl else {
            return 0;
        };
        let ttl = u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX);
        let now = self.now_millis();

        let mut sessions = self.write();
        let before = sessions.len();
        sessions.retain(|id, entry| {
            let idle = now.saturating_sub(entry.last_active.load(Ordering::Relaxed));
            let keep = idle <= ttl;
            if !keep {
                tracing::info!(session = %id, idle_ms = idle, "session expired");
            }
            keep
        });
        before - sessions.len()
    }

    /// Run [`sweep_expired`](Self::sweep_expired) every `interval` until
    /// `cancel` fires.
    pub fn spawn_sweeper(self: &Arc<Self>, interval: Duration, cancel: CancellationToken) -> JoinHandle<()> {
        let manager = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = ticker.tick() => {
                        let removed = manager.sweep_expired();
                        if removed > 0 {
                            tracing::debug!(removed, "idle sweep");
                        }
                    }
                }
            }
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_create_and_get() {
        let manager = SessionManager::new();
        let session = manager.create_session(Some("alice".into())).unwrap();
        let found = manager.get_session("alice").unwrap();
        assert!(Arc::ptr_eq(&session, &found));
        assert!(manager.get_session("bob").is_none());
    }

    #[test]
    fn test_generated_ids_are_unique() {
        let manager = SessionManager::new();
        let a = manager.create_session(None).unwrap();
        let b = manager.create_session(None).unwrap();
        assert_ne!(a.id(), b.id());
        assert_eq!(manager.len(), 2);
    }

    #[test]
    fn test_duplicate_rejected_and_original_kept() {
        let manager = SessionManager::new();
        let first = manager.create_session(Some("s".into())).unwrap();
        let err = manager.create_session(Some("s".into())).unwrap_err();
        assert!(matches!(err, Error::DuplicateSession(id) if id == "s"));
        assert!(Arc::ptr_eq(&first, &manager.get_session("s").unwrap()));
    }

    #[test]
    fn test_empty_id_rejected() {
        let manager = SessionManager::new();
        assert!(matches!(manager.create_session(Some("  ".into())), Err(Error::Usage(_))));
        assert!(manager.is_empty());
    }

    #[test]
    fn test_max_sessions() {
        let manager = SessionManager::with_config(
            EngineConfig::new(),
            SessionLimits::new().max_sessions(1),
            FsLimits::default(),
        );
        manager.create_session(Some("a".into())).unwrap();
        let err = manager.create_session(Some("b".into())).unwrap_err();
        assert!(matches!(err, Error::ResourceLimit(LimitExceeded::MaxSessions(1))));

        assert!(manager.remove_session("a"));
        assert!(!manager.remove_session("a"));
        manager.create_session(Some("b".into())).unwrap();
        assert_eq!(manager.session_ids(), vec!["b"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweep_removes_only_idle() {
        let manager = SessionManager::with_config(
            EngineConfig::new(),
            SessionLimits::new().idle_ttl(Duration::from_secs(60)),
            FsLimits::default(),
        );
        manager.create_session(Some("idle".into())).unwrap();
        manager.create_session(Some("busy".into())).unwrap();

        tokio::time::advance(Duration::from_secs(45)).await;
        manager.get_session("busy").unwrap();
        tokio::time::advance(Duration::from_secs(30)).await;

        assert_eq!(manager.sweep_expired(), 1);
        assert_eq!(manager.session_ids(), vec!["busy"]);
    }

    #[test]
    fn test_sweep_without_ttl_is_noop() {
        let manager = SessionManager::new();
        manager.create_session(None).unwrap();
        assert_eq!(manager.sweep_expired(), 0);
        assert_eq!(manager.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweeper_task_stops_on_cancel() {
        let manager = Arc::new(SessionManager::with_config(
            EngineConfig::new(),
            SessionLimits::new().idle_ttl(Duration::from_secs(10)),
            FsLimits::default(),
        ));
        manager.create_session(Some("s".into())).unwrap();

        let cancel = CancellationToken::new();
        let handle = manager.spawn_sweeper(Duration::from_secs(5), cancel.clone());

        tokio::time::sleep(Duration::from_secs(16)).await;
        assert!(manager.is_empty());

        cancel.cancel();
        handle.await.unwrap();
    }
}
