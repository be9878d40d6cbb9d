//! `ls [-a] [path]`: list a directory of the session filesystem.

use async_trait::async_trait;
use std::path::Path;

use super::{Command, Context};
use crate::error::{Error, Result};

/// The ls command.
///
/// Usage: ls [-a] [PATH]
///
/// Options:
///   -a   Show entries starting with `.`
///
/// One entry per line, sorted by name; directories carry a trailing `/`.
#[derive(Debug, Default)]
pub struct Ls;

#[async_trait]
impl Command for Ls {
    async fn execute(&self, ctx: Context<'_>) -> Result<String> {
        let mut all = false;
        let mut paths: Vec<&str> = Vec::new();
        for arg in ctx.operands() {
            if arg.starts_with('-') && arg.len() > 1 {
                for c in arg[1..].chars() {
                    match c {
                        'a' => all = true,
                        _ => {
                            return Err(Error::usage(format!(
                                "{}: invalid option -- '{}'",
                                ctx.name(),
                                c
                            )));
                        }
                    }
                }
            } else {
                paths.push(arg);
            }
        }

        let path_str = match paths.as_slice() {
            [] => ".",
            [one] => one,
            _ => return Err(Error::usage(self.help())),
        };
        let path = ctx.state.resolve(path_str);

        let metadata = ctx.state.fs().stat(&path).await?;
        if metadata.file_type.is_file() {
            let name = Path::new(path_str)
                .file_name()
                .map(|s| s.to_string_lossy().to_string())
                .unwrap_or_else(|| path_str.to_string());
            return Ok(format!("{}\n", name));
        }

        let mut entries = ctx.state.fs().read_dir(&path).await?;
        entries.sort_by(|a, b| a.name.cmp(&b.name));

        let mut output = String::new();
        for entry in entries {
            if !all && entry.name.starts_with('.') {
                continue;
            }
            output.push_str(&entry.name);
            if entry.metadata.file_type.is_dir() {
                output.push('/');
            }
            output.push('\n');
        }
        Ok(output)
    }

    fn help(&self) -> &'static str {
        "ls [-a] [path] - list directory contents"
    }
}
