//! `config <key> <value>`: set repository identity.

use async_trait::async_trait;

use super::{Command, Context, unquote};
use crate::error::{Error, Result};

/// Keys the sandbox persists. Everything else is accepted and dropped so
/// scripted tutorials that also set e.g. `core.autocrlf` keep working.
const SUPPORTED_KEYS: &[&str] = &["user.name", "user.email"];

/// The config command.
///
/// Usage: config [--global|--local] <key> <value>...
///
/// Value words after the key are joined with single spaces, then one
/// matching pair of surrounding quotes is stripped.
#[derive(Debug, Default)]
pub struct GitConfig;

#[async_trait]
impl Command for GitConfig {
    async fn execute(&self, ctx: Context<'_>) -> Result<String> {
        let repo = ctx.state.require_repo()?;

        let operands: Vec<&str> = ctx
            .operands()
            .iter()
            .map(String::as_str)
            .filter(|a| !matches!(*a, "--global" | "--local" | "--system"))
            .collect();
        let [key, value @ ..] = operands.as_slice() else {
            return Err(Error::usage(self.help()));
        };
        if value.is_empty() {
            return Err(Error::usage(self.help()));
        }

        let Some(key) = SUPPORTED_KEYS.iter().find(|k| k.eq_ignore_ascii_case(key)) else {
            tracing::debug!(key = %key, "config key ignored");
            return Ok(String::new());
        };

        let joined = value.join(" ");
        let value = unquote(&joined);

        ctx.check_canceled()?;
        let mut config = repo.config().await?;
        config.set(key, value);
        ctx.check_canceled()?;
        repo.set_config(&config).await?;

        Ok(String::new())
    }

    fn help(&self) -> &'static str {
        "config <key> <value> - set user.name or user.email for the current repository"
    }
}
