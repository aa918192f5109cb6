use crate::cli::Output;
use crate::config::{BasicToolsConfig, LoggingSettings};
use crate::logging::{logs_file_setup, setup_logging};
use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand};
use serde_json::{Map, Value};

pub mod collect;
pub mod config;
pub mod lock;
pub mod record;
pub mod slurm;
pub mod version;

#[derive(Parser)]
#[command(
    name = "basictools",
    version = env!("CARGO_PKG_VERSION"),
    about = "Parallel dispatch, run records, versioning and locking utilities",
    long_about = "Parallel dispatch, run records, versioning and locking utilities.\n\n\
                  basictools collects JSON run records in parallel, bumps package versions, \
                  serializes jobs behind a lock file and prints Slurm submission commands."
)]
pub struct Cli {
    /// Increase verbosity (can be repeated)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Use custom configuration file
    #[arg(long, global = true)]
    pub config: Option<String>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Read, write, bump or infer package versions
    Version(version::VersionArgs),
    /// Gather every run output file below a directory as JSON rows
    Collect(collect::CollectArgs),
    /// Run a command while holding a lock file
    Lock(lock::LockArgs),
    /// Store key=value entries in a run output file
    Record(record::RecordArgs),
    /// Generate Slurm submission commands
    Slurm(slurm::SlurmArgs),
    /// Inspect the merged configuration
    Config(config::ConfigArgs),
}

impl Commands {
    /// Command-line flags that take precedence over every configuration source
    fn config_overrides(&self) -> Option<Value> {
        match self {
            Commands::Collect(args) => args.config_overrides(),
            Commands::Lock(args) => args.config_overrides(),
            Commands::Record(args) => args.config_overrides(),
            _ => None,
        }
    }
}

/// Nest non-empty sections into one override document
pub(crate) fn overrides(sections: Vec<(&str, Map<String, Value>)>) -> Option<Value> {
    let document: Map<String, Value> = sections
        .into_iter()
        .filter(|(_, section)| !section.is_empty())
        .map(|(name, section)| (name.to_string(), Value::Object(section)))
        .collect();
    (!document.is_empty()).then_some(Value::Object(document))
}

impl Cli {
    pub fn run(self) -> Result<()> {
        let overrides = self.command.as_ref().and_then(Commands::config_overrides);
        let config = BasicToolsConfig::load(self.config.as_deref(), overrides)?;
        let settings = config.settings()?;

        init_logging(&settings.logging, self.verbose, self.quiet)?;
        let output = Output::new(self.verbose > 0, self.quiet);

        match self.command {
            Some(Commands::Version(args)) => version::execute(args, &output),
            Some(Commands::Collect(args)) => collect::execute(args, &settings, &output),
            Some(Commands::Lock(args)) => lock::execute(args, &settings, &output),
            Some(Commands::Record(args)) => record::execute(args, &settings, &output),
            Some(Commands::Slurm(args)) => slurm::execute(args),
            Some(Commands::Config(args)) => config::execute(args, &config),
            None => {
                Cli::command().print_help()?;
                Ok(())
            }
        }
    }
}

fn init_logging(settings: &LoggingSettings, verbose: u8, quiet: bool) -> Result<()> {
    match settings.log_dir() {
        Some(dir) if !quiet => {
            let path = logs_file_setup("basictools", settings.level_filter()?, dir, settings.stdout)?;
            tracing::debug!("Logging to {}", path.display());
        }
        _ => setup_logging(verbose, quiet),
    }
    Ok(())
}
