//! `help [command]`

use async_trait::async_trait;

use super::{Command, Context};
use crate::error::{Error, Result};

/// The help command - list verbs or show one command's usage.
#[derive(Debug, Default)]
pub struct Help;

#[async_trait]
impl Command for Help {
    async fn execute(&self, ctx: Context<'_>) -> Result<String> {
        match ctx.operands() {
            [] => {
                let mut output = String::new();
                for name in ctx.registry.names() {
                    if let Some(text) = ctx.registry.help(name) {
                        output.push_str(text);
                        output.push('\n');
                    }
                }
                Ok(output)
            }
            [name] => ctx
                .registry
                .help(name)
                .map(|text| format!("{}\n", text))
                .ok_or_else(|| Error::CommandNotFound(name.clone())),
            _ => Err(Error::usage(self.help())),
        }
    }

    fn help(&self) -> &'static str {
        "help [command] - list commands or describe one"
    }
}
