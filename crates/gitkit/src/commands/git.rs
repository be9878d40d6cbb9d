//! `git <verb> [args...]`: alias that re-dispatches to `<verb>`.
//!
//! Lets tutorial scripts written against real git (`git clone ...`,
//! `git config user.name ...`) run unchanged.

use async_trait::async_trait;

use super::{Command, Context};
use crate::error::{Error, Result};

/// The git command.
#[derive(Debug, Default)]
pub struct Git;

#[async_trait]
impl Command for Git {
    async fn execute(&self, ctx: Context<'_>) -> Result<String> {
        let args = ctx.operands();
        let Some(verb) = args.first() else {
            let mut usage = String::from("usage: git <command> [<args>]\n\nAvailable commands:\n");
            for name in ctx.registry.names() {
                if name != "git" {
                    usage.push_str(&format!("\t{}\n", name));
                }
            }
            return Err(Error::Usage(usage));
        };
        if verb == "git" {
            return Err(Error::usage("git: 'git' is not a git command"));
        }

        let factory = ctx
            .registry
            .lookup(verb)
            .ok_or_else(|| Error::usage(format!("git: '{}' is not a git command. See 'git help'.", verb)))?;
        let command = factory();

        command
            .execute(Context {
                args,
                state: ctx.state,
                cancel: ctx.cancel,
                registry: ctx.registry,
            })
            .await
    }

    fn help(&self) -> &'static str {
        "git <command> [args...] - run a sandbox command git-style"
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::commands::test_support::{run, state};

    #[tokio::test]
    async fn test_git_prefix_dispatches() {
        let mut state = state();
        let out = run(&mut state, "git clone https://example.com/a/b.git").await.unwrap();
        assert_eq!(out, "Cloned into 'b'\n");
        run(&mut state, "git config user.name Alice").await.unwrap();
        let config = state.current_repo().unwrap().config().await.unwrap();
        assert_eq!(config.user_name(), Some("Alice"));
    }

    #[tokio::test]
    async fn test_git_unknown_and_empty() {
        let mut state = state();
        assert!(matches!(run(&mut state, "git push").await, Err(Error::Usage(_))));
        assert!(matches!(run(&mut state, "git git pwd").await, Err(Error::Usage(_))));
        let Err(Error::Usage(usage)) = run(&mut state, "git").await else {
            panic!("expected usage");
        };
        assert!(usage.contains("\tclone\n"));
    }
}
