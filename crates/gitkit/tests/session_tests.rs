//! Session Tests
//!
//! Isolation between sessions, per-session serialization, cancellation,
//! command timeouts and idle expiry.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use gitkit::{
    CancellationToken, Command, Context, EngineConfig, Error, Result, Sandbox, SessionLimits,
    async_trait,
};

/// Sleeps for the given duration, honoring cancellation, then records
/// its name in the reflog.
struct Slow {
    name: &'static str,
    delay: Duration,
}

#[async_trait]
impl Command for Slow {
    async fn execute(&self, ctx: Context<'_>) -> Result<String> {
        tokio::select! {
            _ = ctx.cancel.cancelled() => return Err(Error::Canceled),
            _ = tokio::time::sleep(self.delay) => {}
        }
        ctx.state.reflog_mut().append("0".repeat(40), self.name);
        Ok(format!("{}\n", self.name))
    }

    fn help(&self) -> &'static str {
        "slow - test helper"
    }
}

/// Sleeps without looking at the cancellation token.
struct Stubborn;

#[async_trait]
impl Command for Stubborn {
    async fn execute(&self, ctx: Context<'_>) -> Result<String> {
        tokio::time::sleep(Duration::from_secs(5)).await;
        ctx.state.reflog_mut().append("0".repeat(40), "stubborn");
        Ok("done\n".into())
    }

    fn help(&self) -> &'static str {
        "stubborn - test helper"
    }
}

fn slow(name: &'static str, secs: u64) -> gitkit::CommandFactory {
    Arc::new(move || -> Box<dyn Command> {
        Box::new(Slow {
            name,
            delay: Duration::from_secs(secs),
        })
    })
}

fn sandbox_with(limits: SessionLimits) -> Sandbox {
    Sandbox::builder()
        .limits(limits)
        .command("slow", slow("slow", 5))
        .command("fast", slow("fast", 0))
        .build()
}

mod isolation {
    use super::*;

    #[tokio::test]
    async fn test_sessions_do_not_share_state() {
        let sandbox = Sandbox::new();
        sandbox.create_session(Some("a".into())).unwrap();
        sandbox.create_session(Some("b".into())).unwrap();

        sandbox
            .exec("a", "clone https://github.com/org/repo.git")
            .await
            .unwrap();

        let b = sandbox.manager().get_session("b").unwrap();
        let state = b.lock().await;
        assert_eq!(state.cwd(), Path::new("/"));
        assert!(state.repo("repo").is_none());
        assert!(state.reflog().is_empty());
        assert!(!state.fs().exists(Path::new("/repo")).await.unwrap());
    }

    #[tokio::test]
    async fn test_same_url_in_two_sessions() {
        let sandbox = Sandbox::new();
        for id in ["a", "b"] {
            sandbox.create_session(Some(id.into())).unwrap();
            let out = sandbox
                .exec(id, "clone https://github.com/org/repo.git")
                .await
                .unwrap();
            assert_eq!(out, "Cloned into 'repo'\n");
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_sessions() {
        let sandbox = Sandbox::new();
        let mut handles = Vec::new();

        for i in 0..32 {
            let sandbox = sandbox.clone();
            handles.push(tokio::spawn(async move {
                let id = format!("user-{}", i);
                sandbox.create_session(Some(id.clone()))?;
                sandbox
                    .exec(&id, "clone https://github.com/org/repo.git")
                    .await?;
                sandbox
                    .exec(&id, &format!("config user.name \"User {}\"", i))
                    .await?;
                sandbox.exec(&id, "reflog").await
            }));
        }

        for handle in handles {
            let reflog = handle.await.unwrap().unwrap();
            assert_eq!(reflog.lines().count(), 1);
            assert!(reflog.ends_with("HEAD@{0}: clone: from https://github.com/org/repo.git\n"));
        }
        assert_eq!(sandbox.manager().len(), 32);

        for i in 0..32 {
            let session = sandbox.manager().get_session(&format!("user-{}", i)).unwrap();
            let state = session.lock().await;
            let repo = state.current_repo().unwrap();
            let config = repo.config().await.unwrap();
            assert_eq!(config.user_name(), Some(format!("User {}", i).as_str()));
            assert_eq!(state.repo_keys().collect::<Vec<_>>(), vec!["repo"]);
            assert_eq!(state.cwd(), Path::new("/repo"));
        }
    }
}

mod serialization {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_commands_run_in_lock_order() {
        let sandbox = sandbox_with(SessionLimits::new().no_command_timeout());
        sandbox.create_session(Some("s".into())).unwrap();

        let first = {
            let sandbox = sandbox.clone();
            tokio::spawn(async move { sandbox.exec("s", "slow").await })
        };
        // Let the slow command take the lock
        tokio::time::sleep(Duration::from_millis(10)).await;
        let second = sandbox.exec("s", "fast").await.unwrap();
        assert_eq!(second, "fast\n");
        assert_eq!(first.await.unwrap().unwrap(), "slow\n");

        let session = sandbox.manager().get_session("s").unwrap();
        let state = session.lock().await;
        let order: Vec<&str> = state.reflog().entries().map(|e| e.message.as_str()).collect();
        assert_eq!(order, vec!["slow", "fast"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_while_waiting_for_lock() {
        let sandbox = sandbox_with(SessionLimits::new().no_command_timeout());
        sandbox.create_session(Some("s".into())).unwrap();

        let holder = {
            let sandbox = sandbox.clone();
            tokio::spawn(async move { sandbox.exec("s", "slow").await })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;

        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = sandbox
            .exec_args("s", &["fast".to_string()], &cancel)
            .await
            .unwrap_err();
        assert!(err.is_canceled());

        holder.await.unwrap().unwrap();
        let session = sandbox.manager().get_session("s").unwrap();
        assert_eq!(session.lock().await.reflog().len(), 1);
    }
}

mod cancellation {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_timeout_maps_to_canceled() {
        let sandbox = sandbox_with(SessionLimits::new().command_timeout(Duration::from_secs(1)));
        sandbox.create_session(Some("s".into())).unwrap();

        let err = sandbox.exec("s", "slow").await.unwrap_err();
        assert!(matches!(err, Error::Canceled));

        // The lock was released and nothing was recorded
        let session = sandbox.manager().get_session("s").unwrap();
        assert!(session.lock().await.reflog().is_empty());
        assert_eq!(sandbox.exec("s", "fast").await.unwrap(), "fast\n");
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_reported_when_command_ignores_cancel() {
        let sandbox = Sandbox::builder()
            .limits(SessionLimits::new().command_timeout(Duration::from_secs(1)))
            .command("stubborn", Arc::new(|| -> Box<dyn Command> { Box::new(Stubborn) }))
            .command("fast", slow("fast", 0))
            .build();
        sandbox.create_session(Some("s".into())).unwrap();

        let err = sandbox.exec("s", "stubborn").await.unwrap_err();
        assert!(matches!(err, Error::Canceled));
        assert_eq!(sandbox.exec("s", "fast").await.unwrap(), "fast\n");
    }

    #[tokio::test(start_paused = true)]
    async fn test_clone_timeout_leaves_session_untouched() {
        let sandbox = Sandbox::builder()
            .engine(EngineConfig::new().clone_latency(Duration::from_secs(60)))
            .limits(SessionLimits::new().command_timeout(Duration::from_secs(2)))
            .build();
        sandbox.create_session(Some("s".into())).unwrap();

        let err = sandbox
            .exec("s", "clone https://github.com/org/repo.git")
            .await
            .unwrap_err();
        assert!(err.is_canceled());

        let session = sandbox.manager().get_session("s").unwrap();
        let state = session.lock().await;
        assert_eq!(state.cwd(), Path::new("/"));
        assert!(state.repo("repo").is_none());
        assert!(state.reflog().is_empty());
        assert!(state.fs().read_dir(Path::new("/")).await.unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_caller_cancel_during_clone() {
        let sandbox = Sandbox::builder()
            .engine(EngineConfig::new().clone_latency(Duration::from_secs(10)))
            .build();
        sandbox.create_session(Some("s".into())).unwrap();

        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(1)).await;
            trigger.cancel();
        });

        let args: Vec<String> = ["clone", "https://github.com/org/repo.git"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let err = sandbox.exec_args("s", &args, &cancel).await.unwrap_err();
        assert!(err.is_canceled());

        // A fresh context succeeds afterwards
        let out = sandbox
            .exec("s", "clone https://github.com/org/repo.git")
            .await
            .unwrap();
        assert_eq!(out, "Cloned into 'repo'\n");
    }
}

mod expiry {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_idle_sessions_swept() {
        let sandbox = sandbox_with(SessionLimits::new().idle_ttl(Duration::from_secs(30)));
        sandbox.create_session(Some("idle".into())).unwrap();
        sandbox.create_session(Some("active".into())).unwrap();

        tokio::time::advance(Duration::from_secs(20)).await;
        sandbox.exec("active", "pwd").await.unwrap();
        tokio::time::advance(Duration::from_secs(20)).await;

        assert_eq!(sandbox.manager().sweep_expired(), 1);
        assert_eq!(sandbox.manager().session_ids(), vec!["active"]);
        assert!(matches!(
            sandbox.exec("idle", "pwd").await,
            Err(Error::UnknownSession(_))
        ));
    }

    #[tokio::test]
    async fn test_removed_session_handle_stays_usable() {
        let sandbox = Sandbox::new();
        let session = sandbox.create_session(Some("s".into())).unwrap();
        assert!(sandbox.manager().remove_session("s"));

        // Holders of the Arc keep a working session
        let out = session
            .execute(
                sandbox.registry(),
                &CancellationToken::new(),
                &["pwd".to_string()],
            )
            .await
            .unwrap();
        assert_eq!(out, "/\n");
        assert!(sandbox.manager().get_session("s").is_none());
    }
}
