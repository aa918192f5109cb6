use super::overrides;
use crate::cli::Output;
use crate::config::Settings;
use anyhow::{Context, Result};
use clap::Args;
use serde_json::{Map, Value};
use std::path::PathBuf;
use std::process::Command;
use std::time::Duration;

#[derive(Args)]
pub struct LockArgs {
    /// Lock file (defaults to `lock.path` from the configuration)
    #[arg(long)]
    pub path: Option<PathBuf>,

    /// Delay between acquisition attempts in milliseconds
    #[arg(long)]
    pub wait_ms: Option<u64>,

    /// Give up after this many milliseconds instead of waiting forever
    #[arg(long)]
    pub timeout_ms: Option<u64>,

    /// Name recorded in the lock file
    #[arg(long)]
    pub name: Option<String>,

    /// Command to run while holding the lock
    #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
    pub command: Vec<String>,
}

impl LockArgs {
    pub(super) fn config_overrides(&self) -> Option<Value> {
        let mut lock = Map::new();
        if let Some(path) = &self.path {
            lock.insert("path".to_string(), Value::String(path.display().to_string()));
        }
        if let Some(wait_ms) = self.wait_ms {
            lock.insert("wait_ms".to_string(), Value::from(wait_ms));
        }
        if let Some(name) = &self.name {
            lock.insert("process_name".to_string(), Value::String(name.clone()));
        }
        overrides(vec![("lock", lock)])
    }
}

/// Runs the command under the lock and exits with its status code when it fails
pub fn execute(args: LockArgs, settings: &Settings, output: &Output) -> Result<()> {
    let lock = settings.lock.file_lock();
    let guard = match args.timeout_ms {
        Some(ms) => lock.acquire_timeout(Duration::from_millis(ms))?,
        None => lock.acquire()?,
    };
    output.verbose(&format!("Acquired {}", guard.path().display()));

    let (program, rest) = args
        .command
        .split_first()
        .context("No command given")?;
    let status = Command::new(program)
        .args(rest)
        .status()
        .with_context(|| format!("Failed to run {program}"));

    // Release before exiting, the guard's Drop would not run after process::exit
    guard.release()?;
    let status = status?;

    if !status.success() {
        output.error(&format!("{program} exited with {status}"));
        std::process::exit(status.code().unwrap_or(1));
    }
    Ok(())
}
