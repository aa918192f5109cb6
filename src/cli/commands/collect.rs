use super::overrides;
use crate::cli::Output;
use crate::config::Settings;
use crate::parallel::WorkerCount;
use crate::run_output::collect::{CollectOptions, parse_results_from_dir};
use anyhow::Result;
use clap::Args;
use serde_json::{Map, Value};
use std::path::PathBuf;

#[derive(Args)]
pub struct CollectArgs {
    /// Directory searched recursively for `*.out.json` files
    pub dir: PathBuf,

    /// Drop rows missing this column (repeatable)
    #[arg(short, long = "require", value_name = "COLUMN")]
    pub required: Vec<String>,

    /// Column receiving the source file of each row
    #[arg(long)]
    pub file_column: Option<String>,

    /// inline, physical, logical or a thread count
    #[arg(short, long)]
    pub workers: Option<WorkerCount>,

    /// Hide the progress bar
    #[arg(long)]
    pub no_progress: bool,
}

impl CollectArgs {
    pub(super) fn config_overrides(&self) -> Option<Value> {
        let mut parallel = Map::new();
        if let Some(workers) = self.workers {
            parallel.insert("workers".to_string(), Value::String(workers.to_string()));
        }
        if self.no_progress {
            parallel.insert("verbose".to_string(), Value::Bool(false));
        }

        let mut run_output = Map::new();
        if let Some(column) = &self.file_column {
            run_output.insert("file_column".to_string(), Value::String(column.clone()));
        }

        overrides(vec![("parallel", parallel), ("run_output", run_output)])
    }
}

pub fn execute(args: CollectArgs, settings: &Settings, output: &Output) -> Result<()> {
    if !args.dir.is_dir() {
        return Err(anyhow::anyhow!("{} is not a directory", args.dir.display()));
    }

    let options = CollectOptions {
        required_columns: args.required,
        file_column: settings.run_output.file_column.clone(),
        workers: settings.parallel.workers,
        verbose: settings.parallel.verbose && !output.is_quiet(),
        unit: settings.parallel.unit.clone(),
    };
    output.verbose(&format!(
        "Collecting from {} with {} workers",
        args.dir.display(),
        options.workers
    ));

    let rows = parse_results_from_dir(&args.dir, &options)?;
    if rows.is_empty() {
        output.warning("No run output found");
    }
    println!("{}", serde_json::to_string_pretty(&rows)?);
    Ok(())
}
