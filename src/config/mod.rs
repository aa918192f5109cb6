//! Layered configuration
//!
//! Sources are merged with figment, later ones winning:
//! 1. defaults embedded from `default-config.toml`
//! 2. user file `~/.config/basictools/config.{toml,json,yaml,yml}`
//! 3. repository file `basictools.{toml,json,yaml,yml}`
//! 4. the file given with `--config`
//! 5. `BASICTOOLS_`-prefixed environment variables, `__` separating sections
//!    (`BASICTOOLS_PARALLEL__WORKERS=4`)
//! 6. command-line overrides

use crate::lock::FileLock;
use crate::logging::{LoggingError, parse_level};
use crate::parallel::WorkerCount;
use anyhow::{Context, Result};
use figment::Figment;
use figment::providers::{Env, Format, Json, Serialized, Toml, Yaml};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing_subscriber::filter::LevelFilter;

// Embed the default config at compile time
const DEFAULT_CONFIG: &str = include_str!("../../default-config.toml");

pub const ENV_PREFIX: &str = "BASICTOOLS_";

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub parallel: ParallelSettings,
    pub logging: LoggingSettings,
    pub lock: LockSettings,
    pub run_output: RunOutputSettings,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ParallelSettings {
    pub workers: WorkerCount,
    /// Show progress while dispatching
    pub verbose: bool,
    pub unit: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingSettings {
    pub level: String,
    /// Root of the dated log directories; empty logs to stderr instead
    pub root_dir: String,
    /// Mirror the log file to stdout
    pub stdout: bool,
}

impl LoggingSettings {
    pub fn level_filter(&self) -> std::result::Result<LevelFilter, LoggingError> {
        parse_level(&self.level)
    }

    pub fn log_dir(&self) -> Option<&Path> {
        (!self.root_dir.trim().is_empty()).then(|| Path::new(&self.root_dir))
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LockSettings {
    pub path: PathBuf,
    pub wait_ms: u64,
    pub process_name: String,
}

impl LockSettings {
    pub fn file_lock(&self) -> FileLock {
        FileLock::new(&self.path)
            .with_wait_time(Duration::from_millis(self.wait_ms))
            .with_process_name(&self.process_name)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RunOutputSettings {
    pub filename: String,
    pub save_every_set: bool,
    /// Column holding the source path of collected rows
    pub file_column: String,
}

pub struct BasicToolsConfig {
    figment: Figment,
}

impl BasicToolsConfig {
    pub fn load<T: Serialize>(custom_config: Option<&str>, cli_overrides: Option<T>) -> Result<Self> {
        tracing::trace!("CONFIG LOAD: Starting");

        let user_base = Self::user_config_base_path();
        let mut figment = Figment::new().merge(Toml::string(DEFAULT_CONFIG));
        figment = Self::merge_any_format(figment, &user_base);
        figment = Self::merge_any_format(figment, Path::new("basictools"));

        if let Some(custom_path) = custom_config {
            figment = match Path::new(custom_path).extension().and_then(|ext| ext.to_str()) {
                Some("json") => figment.merge(Json::file(custom_path)),
                Some("yaml" | "yml") => figment.merge(Yaml::file(custom_path)),
                _ => figment.merge(Toml::file(custom_path)),
            };
        }

        // Environment variables beat every file
        figment = figment.merge(Env::prefixed(ENV_PREFIX).split("__"));

        if let Some(cli) = cli_overrides {
            tracing::trace!("CONFIG LOAD: Applying CLI overrides");
            figment = figment.merge(Serialized::defaults(cli));
        }

        Ok(BasicToolsConfig { figment })
    }

    fn merge_any_format(figment: Figment, base: &Path) -> Figment {
        let with_ext = |ext: &str| base.with_extension(ext);
        figment
            .merge(Toml::file(with_ext("toml")))
            .merge(Json::file(with_ext("json")))
            .merge(Yaml::file(with_ext("yaml")))
            .merge(Yaml::file(with_ext("yml")))
    }

    /// Typed view of the merged configuration
    pub fn settings(&self) -> Result<Settings> {
        self.figment
            .extract()
            .context("Invalid basictools configuration")
    }

    /// Get a nested object/section as JSON
    pub fn get_section(&self, path: &str) -> Result<serde_json::Value> {
        let value = self.figment.extract_inner(path)?;
        Ok(value)
    }

    /// Get the full merged configuration as a structured value
    pub fn get_full_config(&self) -> Result<serde_json::Value> {
        let value = self.figment.extract()?;
        Ok(value)
    }

    fn user_config_base_path() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("~"))
            .join(".config")
            .join("basictools")
            .join("config")
    }
}

#[cfg(test)]
mod tests;
