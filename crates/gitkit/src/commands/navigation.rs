//! Navigation commands (cd, pwd)

use async_trait::async_trait;

use super::{Command, Context};
use crate::error::{Error, Result};

/// The cd command - change directory. Defaults to `/`.
#[derive(Debug, Default)]
pub struct Cd;

#[async_trait]
impl Command for Cd {
    async fn execute(&self, ctx: Context<'_>) -> Result<String> {
        let target = match ctx.operands() {
            [] => "/",
            [one] => one.as_str(),
            _ => return Err(Error::usage(self.help())),
        };
        ctx.state.set_cwd(target).await?;
        Ok(String::new())
    }

    fn help(&self) -> &'static str {
        "cd [path] - change the working directory"
    }
}

/// The pwd command - print working directory.
#[derive(Debug, Default)]
pub struct Pwd;

#[async_trait]
impl Command for Pwd {
    async fn execute(&self, ctx: Context<'_>) -> Result<String> {
        Ok(format!("{}\n", ctx.state.cwd().display()))
    }

    fn help(&self) -> &'static str {
        "pwd - print the working directory"
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::commands::test_support::{run, state};

    #[tokio::test]
    async fn test_cd_and_pwd() {
        let mut state = state();
        run(&mut state, "mkdir -p /a/b").await.unwrap();
        run(&mut state, "cd /a/b").await.unwrap();
        assert_eq!(run(&mut state, "pwd").await.unwrap(), "/a/b\n");
        run(&mut state, "cd ..").await.unwrap();
        assert_eq!(run(&mut state, "pwd").await.unwrap(), "/a\n");
        run(&mut state, "cd").await.unwrap();
        assert_eq!(run(&mut state, "pwd").await.unwrap(), "/\n");
    }

    #[tokio::test]
    async fn test_cd_missing_keeps_cwd() {
        let mut state = state();
        run(&mut state, "mkdir /a").await.unwrap();
        run(&mut state, "cd /a").await.unwrap();
        assert!(matches!(run(&mut state, "cd nope").await, Err(Error::NotFound(_))));
        assert_eq!(run(&mut state, "pwd").await.unwrap(), "/a\n");
    }
}
