use super::overrides;
use crate::cli::Output;
use crate::config::Settings;
use crate::run_output::RunOutputFile;
use anyhow::{Context, Result};
use clap::Args;
use serde_json::{Map, Value};
use std::path::PathBuf;

#[derive(Args)]
pub struct RecordArgs {
    /// Directory holding the run output file
    #[arg(short, long, default_value = ".")]
    pub dir: PathBuf,

    /// File name without the `.out.json` extension (defaults to `run_output.filename`)
    #[arg(long)]
    pub filename: Option<String>,

    /// Entries to store as `key=value`; values are parsed as JSON when possible
    #[arg(required = true, value_name = "KEY=VALUE")]
    pub entries: Vec<String>,
}

impl RecordArgs {
    pub(super) fn config_overrides(&self) -> Option<Value> {
        let mut run_output = Map::new();
        if let Some(filename) = &self.filename {
            run_output.insert("filename".to_string(), Value::String(filename.clone()));
        }
        overrides(vec![("run_output", run_output)])
    }
}

pub fn execute(args: RecordArgs, settings: &Settings, output: &Output) -> Result<()> {
    let entries = args
        .entries
        .iter()
        .map(|entry| parse_entry(entry))
        .collect::<Result<Vec<_>>>()?;

    let save_every_set = settings.run_output.save_every_set;
    let mut record = RunOutputFile::new(&args.dir, &settings.run_output.filename, save_every_set)?;
    for (key, value) in entries {
        record.set(key, value)?;
    }
    if !save_every_set {
        record.save()?;
    }

    output.success(&format!(
        "Recorded {} entries in {}",
        args.entries.len(),
        record.path().display()
    ));
    Ok(())
}

/// `key=value`, keeping `value` as a string when it is not valid JSON
fn parse_entry(entry: &str) -> Result<(String, Value)> {
    let (key, raw) = entry
        .split_once('=')
        .with_context(|| format!("Expected KEY=VALUE, got '{entry}'"))?;
    if key.trim().is_empty() {
        anyhow::bail!("Empty key in '{entry}'");
    }
    let value = serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()));
    Ok((key.trim().to_string(), value))
}
