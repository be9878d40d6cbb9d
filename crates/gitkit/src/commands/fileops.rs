//! File operation commands - mkdir, touch, write
//!
//! Enough to build working trees inside a session for `ls`, `add` and
//! `commit` to act on.

use async_trait::async_trait;

use super::{Command, Context};
use crate::error::{Error, Result};
use crate::fs::DEFAULT_DIR_MODE;

/// The mkdir command - create directories.
///
/// Usage: mkdir [-p] DIRECTORY...
///
///   -p   Create parent directories as needed, no error if existing
#[derive(Debug, Default)]
pub struct Mkdir;

#[async_trait]
impl Command for Mkdir {
    async fn execute(&self, ctx: Context<'_>) -> Result<String> {
        let mut parents = false;
        let mut dirs: Vec<&str> = Vec::new();
        for arg in ctx.operands() {
            match arg.as_str() {
                "-p" | "--parents" => parents = true,
                a if a.starts_with('-') && a.len() > 1 => {
                    return Err(Error::usage(format!("mkdir: invalid option '{}'", a)));
                }
                a => dirs.push(a),
            }
        }
        if dirs.is_empty() {
            return Err(Error::usage(self.help()));
        }

        for dir in dirs {
            ctx.check_canceled()?;
            let path = ctx.state.resolve(dir);
            if parents {
                ctx.state.fs().mkdir_all(&path, DEFAULT_DIR_MODE).await?;
            } else {
                ctx.state.fs().mkdir(&path, false).await?;
            }
        }
        Ok(String::new())
    }

    fn help(&self) -> &'static str {
        "mkdir [-p] <dir>... - create directories"
    }
}

/// The touch command - create empty files. Existing files are kept.
#[derive(Debug, Default)]
pub struct Touch;

#[async_trait]
impl Command for Touch {
    async fn execute(&self, ctx: Context<'_>) -> Result<String> {
        if ctx.operands().is_empty() {
            return Err(Error::usage(self.help()));
        }

        for file in ctx.operands() {
            ctx.check_canceled()?;
            let path = ctx.state.resolve(file);
            if !ctx.state.fs().exists(&path).await? {
                ctx.state.fs().create(&path).await?;
            }
        }
        Ok(String::new())
    }

    fn help(&self) -> &'static str {
        "touch <file>... - create empty files"
    }
}

/// The write command - replace a file's content.
///
/// Usage: write FILE TEXT...
///
/// Words are joined with single spaces and a trailing newline is added.
#[derive(Debug, Default)]
pub struct WriteFile;

#[async_trait]
impl Command for WriteFile {
    async fn execute(&self, ctx: Context<'_>) -> Result<String> {
        let [file, words @ ..] = ctx.operands() else {
            return Err(Error::usage(self.help()));
        };
        if words.is_empty() {
            return Err(Error::usage(self.help()));
        }

        let path = ctx.state.resolve(file);
        let content = format!("{}\n", words.join(" "));
        ctx.check_canceled()?;
        ctx.state.fs().write_file(&path, content.as_bytes()).await?;
        Ok(String::new())
    }

    fn help(&self) -> &'static str {
        "write <file> <text>... - write a line of text to a file"
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::commands::test_support::{run, state};
    use std::path::Path;

    #[tokio::test]
    async fn test_mkdir_parents() {
        let mut state = state();
        assert!(matches!(run(&mut state, "mkdir /a/b").await, Err(Error::NotFound(_))));
        run(&mut state, "mkdir -p /a/b").await.unwrap();
        // Idempotent with -p
        run(&mut state, "mkdir -p /a/b").await.unwrap();
        assert!(run(&mut state, "mkdir /a").await.is_err());
        assert!(state.fs().stat(Path::new("/a/b")).await.unwrap().file_type.is_dir());
    }

    #[tokio::test]
    async fn test_touch_keeps_content() {
        let mut state = state();
        run(&mut state, "write /f hello world").await.unwrap();
        run(&mut state, "touch /f /g").await.unwrap();
        assert_eq!(state.fs().read_file(Path::new("/f")).await.unwrap(), b"hello world\n");
        assert!(state.fs().read_file(Path::new("/g")).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_write_relative() {
        let mut state = state();
        run(&mut state, "mkdir /d").await.unwrap();
        run(&mut state, "cd /d").await.unwrap();
        run(&mut state, "write notes.txt 'two words'").await.unwrap();
        assert_eq!(
            state.fs().read_file(Path::new("/d/notes.txt")).await.unwrap(),
            b"two words\n"
        );
        assert!(matches!(run(&mut state, "write only").await, Err(Error::Usage(_))));
    }
}
