//! Log output setup for the binary and for scripts using the library
//!
//! Two entry points:
//! - [`setup_logging`] maps the CLI's `-v` count to an `EnvFilter` and logs to stderr
//! - [`logs_file_setup`] writes every record to a dated log file, optionally mirrored to stdout
//!
//! Both install the process-wide `tracing` subscriber, so only one of them can take effect.

use chrono::{DateTime, Local};
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::fmt::writer::MakeWriterExt;

#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("failed to create logs directory {path}: {source}")]
    CreateDir { path: PathBuf, source: io::Error },
    #[error("failed to create logs file {path}: {source}")]
    CreateFile { path: PathBuf, source: io::Error },
    #[error("a global logger is already installed: {0}")]
    AlreadyInstalled(String),
    #[error("invalid log level '{0}'")]
    InvalidLevel(String),
}

/// Parse `off`, `error`, `warn`, `info`, `debug` or `trace` (any case)
pub fn parse_level(level: &str) -> Result<LevelFilter, LoggingError> {
    level
        .trim()
        .parse()
        .map_err(|_| LoggingError::InvalidLevel(level.to_string()))
}

/// `{root}/logs/logs-{DD-MM-YYYY}/{stem of file}-{timestamp digits}.log`
///
/// The timestamp is the unix time at `now` with its fractional part appended as
/// microseconds, so two files created in the same second still get distinct names.
pub fn logs_file_path(
    file: impl AsRef<Path>,
    root_logs_dir: impl AsRef<Path>,
    now: DateTime<Local>,
) -> PathBuf {
    let stem = file
        .as_ref()
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| "logs".to_string());
    let timestamp = format!("{}{:06}", now.timestamp(), now.timestamp_subsec_micros());

    root_logs_dir
        .as_ref()
        .join("logs")
        .join(format!("logs-{}", now.format("%d-%m-%Y")))
        .join(format!("{stem}-{timestamp}.log"))
}

/// Install a global subscriber writing to a new dated log file and return its path
pub fn logs_file_setup(
    file: impl AsRef<Path>,
    level: LevelFilter,
    root_logs_dir: impl AsRef<Path>,
    add_stdout: bool,
) -> Result<PathBuf, LoggingError> {
    let path = logs_file_path(file, root_logs_dir, Local::now());

    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir).map_err(|source| LoggingError::CreateDir {
            path: dir.to_path_buf(),
            source,
        })?;
    }
    let log_file = File::create(&path).map_err(|source| LoggingError::CreateFile {
        path: path.clone(),
        source,
    })?;
    let log_file = Arc::new(log_file);

    let builder = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_ansi(false)
        .with_target(false);
    let installed = if add_stdout {
        builder.with_writer(log_file.and(io::stdout)).try_init()
    } else {
        builder.with_writer(log_file).try_init()
    };
    installed.map_err(|e| LoggingError::AlreadyInstalled(e.to_string()))?;

    tracing::info!("Logs file at: {}", path.display());
    Ok(path)
}

/// Verbosity-driven stderr logging for the CLI; `RUST_LOG` wins when set
pub fn setup_logging(verbose: u8, quiet: bool) {
    if quiet {
        return;
    }

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| match verbose {
        0 => EnvFilter::new("warn"),
        1 => EnvFilter::new("info"),
        2 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    });

    // Tests and embedding programs may already own the global subscriber
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(io::stderr)
        .try_init();
}
