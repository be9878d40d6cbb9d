//! Gitkit CLI - Drive a sandboxed git playground session from the shell
//!
//! Usage:
//!   gitkit -c 'clone https://github.com/org/repo.git' -c 'reflog'
//!   gitkit --session alice < lesson.txt
//!   gitkit --config sandbox.json -v -c 'ls -a'
//!
//! Lines run in order against one session. Output goes to stdout, errors
//! to stderr; the exit status is 1 if any line failed.

use anyhow::{Context, Result};
use clap::Parser;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};

use gitkit::{CancellationToken, EngineConfig, Identity, Sandbox, SessionLimits};

/// Gitkit - Sandboxed git playground
#[derive(Parser, Debug)]
#[command(name = "gitkit")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Command line to run; may be repeated. Reads stdin when absent.
    #[arg(short = 'c', value_name = "LINE")]
    commands: Vec<String>,

    /// Session identifier
    #[arg(long, default_value = "default")]
    session: String,

    /// JSON configuration file
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Log to stderr (RUST_LOG overrides the filter)
    #[arg(short, long)]
    verbose: bool,
}

/// On-disk configuration.
///
/// ```json
/// {
///   "limits": { "max_sessions": 8, "command_timeout_secs": 10 },
///   "author": { "name": "Instructor", "email": "instructor@example.com" },
///   "allowed_remotes": ["https://github.com/course/"],
///   "clone_latency_ms": 250
/// }
/// ```
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct CliConfig {
    limits: SessionLimits,
    author: Option<Identity>,
    allowed_remotes: Vec<String>,
    clone_latency_ms: u64,
}

impl CliConfig {
    fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config: {}", path.display()))?;
        serde_json::from_str(&text)
            .with_context(|| format!("Failed to parse config: {}", path.display()))
    }

    fn engine(&self) -> EngineConfig {
        let mut engine = EngineConfig::new().clone_latency(Duration::from_millis(self.clone_latency_ms));
        if let Some(author) = &self.author {
            engine = engine.author(&author.name, &author.email);
        }
        if !self.allowed_remotes.is_empty() {
            engine = engine.allow_remotes(self.allowed_remotes.iter().cloned());
        }
        engine
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    if args.verbose {
        let filter = tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("gitkit=debug"));
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    }

    let config = match &args.config {
        Some(path) => CliConfig::load(path)?,
        None => CliConfig::default(),
    };

    let sandbox = Sandbox::builder()
        .engine(config.engine())
        .limits(config.limits.clone())
        .build();
    sandbox
        .create_session(Some(args.session.clone()))
        .context("Failed to create session")?;
    tracing::debug!(session = %args.session, "session ready");

    // Ctrl+C cancels the running command; the next line is not started.
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            trigger.cancel();
        }
    });

    let mut failed = false;
    if args.commands.is_empty() {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        while let Some(line) = lines.next_line().await.context("Failed to read stdin")? {
            if cancel.is_cancelled() {
                break;
            }
            failed |= !run_line(&sandbox, &args.session, &line, &cancel).await;
        }
    } else {
        for line in &args.commands {
            if cancel.is_cancelled() {
                break;
            }
            failed |= !run_line(&sandbox, &args.session, line, &cancel).await;
        }
    }

    if failed || cancel.is_cancelled() {
        std::process::exit(1);
    }
    Ok(())
}

/// Run one line, printing its output or error. Returns whether it succeeded.
async fn run_line(sandbox: &Sandbox, session: &str, line: &str, cancel: &CancellationToken) -> bool {
    let argv = match gitkit::split_command_line(line) {
        Ok(argv) if argv.is_empty() => return true,
        Ok(argv) => argv,
        Err(e) => {
            eprintln!("gitkit: {}", e);
            return false;
        }
    };

    match sandbox.exec_args(session, &argv, cancel).await {
        Ok(output) => {
            print!("{}", output);
            true
        }
        Err(e) => {
            eprintln!("{}", e);
            false
        }
    }
}
