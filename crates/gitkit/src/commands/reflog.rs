//! `reflog`: show the session's reference movements.

use async_trait::async_trait;

use super::{Command, Context};
use crate::error::Result;

/// The reflog command.
///
/// Usage: reflog [-h|--help]
#[derive(Debug, Default)]
pub struct GitReflog;

#[async_trait]
impl Command for GitReflog {
    async fn execute(&self, ctx: Context<'_>) -> Result<String> {
        if ctx.wants_help() {
            return Ok(format!("usage: {}\n", self.help()));
        }
        ctx.state.require_repo()?;

        let mut output = String::new();
        for line in ctx.state.reflog().render() {
            output.push_str(&line);
            output.push('\n');
        }
        Ok(output)
    }

    fn help(&self) -> &'static str {
        "reflog - list HEAD movements, HEAD@{0} being the oldest"
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::commands::test_support::{run, state};
    use crate::error::Error;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn test_help_short_circuits_outside_repo() {
        let mut state = state();
        let out = run(&mut state, "reflog --help").await.unwrap();
        assert!(out.starts_with("usage: reflog"));
        assert!(run(&mut state, "reflog -h").await.is_ok());
    }

    #[tokio::test]
    async fn test_reflog_requires_repo() {
        let mut state = state();
        assert!(matches!(run(&mut state, "reflog").await, Err(Error::NotARepository)));
    }

    #[tokio::test]
    async fn test_reflog_lists_in_storage_order() {
        let mut state = state();
        state.init_repo("r").await.unwrap();
        run(&mut state, "cd /r").await.unwrap();
        for (hash, message) in [("a1", "h1"), ("b2", "h2"), ("c3", "h3")] {
            state.reflog_mut().append(format!("{}{}", hash, "0".repeat(38)), message);
        }

        let out = run(&mut state, "reflog").await.unwrap();
        assert_eq!(
            out,
            "a100000 HEAD@{0}: h1\nb200000 HEAD@{1}: h2\nc300000 HEAD@{2}: h3\n"
        );
    }
}
