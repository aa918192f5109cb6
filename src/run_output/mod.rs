//! JSON record of a script run
//!
//! A [`RunOutputFile`] holds a JSON object of results plus per-level log messages and
//! persists them to `{output_dir}/{filename}.out.json`. Opening a recorder on an existing
//! file picks up where the previous run left off, so a long experiment can be resumed or
//! inspected at any time. [`collect`] gathers many such files into rows.
//!
//! Saved layout:
//!
//! ```json
//! {
//!     "datetime": "2024-03-07 10:30:00.123456",
//!     "data": { "...": "..." },
//!     "logs": { "INFO": ["..."] },
//!     "path": "runs/run_output.out.json",
//!     "ENV": { "HOME": "..." }
//! }
//! ```

pub mod collect;

use crate::collections::ravel_dict;
use chrono::Local;
use serde::Serialize;
use serde_json::ser::PrettyFormatter;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::env;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::Level;

pub use collect::{CollectOptions, find_output_files, parse_results_from_dir};

pub const EXT: &str = ".out.json";
pub const DEFAULT_FILENAME: &str = "run_output";
pub const RAVEL_KEY_SEP: &str = ".";

#[derive(Debug, Error)]
pub enum RunOutputError {
    #[error("failed to access {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid run output {path}: {source}")]
    Json {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("{path} does not hold a JSON object")]
    NotAnObject { path: PathBuf },
    #[error(transparent)]
    Collect(#[from] crate::parallel::DispatchError<std::convert::Infallible>),
}

#[derive(Serialize)]
struct SavedState<'a> {
    datetime: String,
    data: &'a Map<String, Value>,
    logs: &'a BTreeMap<String, Vec<String>>,
    path: String,
    #[serde(rename = "ENV")]
    env: BTreeMap<String, String>,
}

#[derive(Debug, Clone)]
pub struct RunOutputFile {
    output_dir: PathBuf,
    filename: String,
    save_every_set: bool,
    data: Map<String, Value>,
    logs: BTreeMap<String, Vec<String>>,
}

impl RunOutputFile {
    /// Open the recorder, loading `{output_dir}/{filename}.out.json` when it exists
    ///
    /// A file that cannot be read or parsed is ignored and the recorder starts empty.
    /// With `save_every_set`, the file is written immediately and after every change.
    pub fn new(
        output_dir: impl Into<PathBuf>,
        filename: impl Into<String>,
        save_every_set: bool,
    ) -> Result<Self, RunOutputError> {
        Self::with_data(output_dir, filename, Map::new(), save_every_set)
    }

    /// Like [`new`](Self::new), then merge `data` over whatever was loaded
    pub fn with_data(
        output_dir: impl Into<PathBuf>,
        filename: impl Into<String>,
        data: Map<String, Value>,
        save_every_set: bool,
    ) -> Result<Self, RunOutputError> {
        let mut output = Self {
            output_dir: output_dir.into(),
            filename: filename.into(),
            save_every_set,
            data: Map::new(),
            logs: BTreeMap::new(),
        };
        output.load_if_exists();
        output.data.extend(data);
        output.save_if_save_every_set()?;
        Ok(output)
    }

    /// Open the recorder backing an existing `*.out.json` path
    pub fn from_file(path: impl AsRef<Path>, save_every_set: bool) -> Result<Self, RunOutputError> {
        let path = path.as_ref();
        let output_dir = path.parent().map(Path::to_path_buf).unwrap_or_default();
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        let filename = file_name
            .strip_suffix(EXT)
            .map(str::to_string)
            .unwrap_or(file_name);
        Self::new(output_dir, filename, save_every_set)
    }

    /// Flattened data of the file at `path`, or an empty map if it cannot be loaded
    pub fn raveled_state_from_file(path: impl AsRef<Path>) -> Map<String, Value> {
        let path = path.as_ref();
        match Self::from_file(path, false).and_then(|output| output.require_loaded()) {
            Ok(output) => output.raveled_state(),
            Err(e) => {
                tracing::debug!("Skipping {}: {}", path.display(), e);
                Map::new()
            }
        }
    }

    fn require_loaded(self) -> Result<Self, RunOutputError> {
        if self.exists() {
            Ok(self)
        } else {
            Err(RunOutputError::Io {
                path: self.path(),
                source: std::io::ErrorKind::NotFound.into(),
            })
        }
    }

    pub fn path(&self) -> PathBuf {
        self.output_dir.join(format!("{}{}", self.filename, EXT))
    }

    pub fn exists(&self) -> bool {
        self.path().exists()
    }

    pub fn data(&self) -> &Map<String, Value> {
        &self.data
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.data.get(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.data.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.data.keys()
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Result<(), RunOutputError> {
        self.data.insert(key.into(), value.into());
        self.save_if_save_every_set()
    }

    pub fn remove(&mut self, key: &str) -> Result<Option<Value>, RunOutputError> {
        let removed = self.data.remove(key);
        self.save_if_save_every_set()?;
        Ok(removed)
    }

    /// Merge `other` into the data and log the new entries
    pub fn update(&mut self, other: Map<String, Value>) -> Result<(), RunOutputError> {
        let rendered = serde_json::to_string_pretty(&other).unwrap_or_default();
        self.extend(other)?;
        tracing::info!("New Data:\n{}", rendered);
        Ok(())
    }

    /// Merge `other` into the data without logging
    pub fn extend(&mut self, other: Map<String, Value>) -> Result<(), RunOutputError> {
        self.data.extend(other);
        self.save_if_save_every_set()
    }

    /// Drop every listed key; absent keys are ignored
    pub fn subtract<I, S>(&mut self, keys: I) -> Result<(), RunOutputError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for key in keys {
            self.data.remove(key.as_ref());
        }
        self.save_if_save_every_set()
    }

    pub fn raveled_state(&self) -> Map<String, Value> {
        self.raveled_state_with(RAVEL_KEY_SEP)
    }

    pub fn raveled_state_with(&self, sep: &str) -> Map<String, Value> {
        ravel_dict(&self.data, sep)
    }

    /// Record `msg` under `level` and forward it to the tracing pipeline
    pub fn log(&mut self, level: Level, msg: impl Into<String>) -> Result<(), RunOutputError> {
        let msg = msg.into();
        match level {
            Level::ERROR => tracing::error!("{}", msg),
            Level::WARN => tracing::warn!("{}", msg),
            Level::INFO => tracing::info!("{}", msg),
            Level::DEBUG => tracing::debug!("{}", msg),
            Level::TRACE => tracing::trace!("{}", msg),
        }
        self.logs.entry(level.to_string()).or_default().push(msg);
        self.save_if_save_every_set()
    }

    pub fn logs(&self, level: Level) -> &[String] {
        self.logs
            .get(level.as_str())
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn save(&self) -> Result<(), RunOutputError> {
        let path = self.path();
        if !self.output_dir.as_os_str().is_empty() {
            fs::create_dir_all(&self.output_dir).map_err(|source| RunOutputError::Io {
                path: self.output_dir.clone(),
                source,
            })?;
        }

        let state = SavedState {
            datetime: Local::now().format("%Y-%m-%d %H:%M:%S%.6f").to_string(),
            data: &self.data,
            logs: &self.logs,
            path: path.display().to_string(),
            env: env::vars_os()
                .filter_map(|(k, v)| Some((k.into_string().ok()?, v.into_string().ok()?)))
                .collect(),
        };

        let io_error = |source| RunOutputError::Io {
            path: path.clone(),
            source,
        };
        let file = File::create(&path).map_err(io_error)?;
        let mut writer = BufWriter::new(file);
        let mut serializer =
            serde_json::Serializer::with_formatter(&mut writer, PrettyFormatter::with_indent(b"    "));
        state
            .serialize(&mut serializer)
            .map_err(|source| RunOutputError::Json {
                path: path.clone(),
                source,
            })?;
        writer.flush().map_err(io_error)?;

        tracing::trace!("Saved run output to {}", path.display());
        Ok(())
    }

    /// Merge the saved file into memory
    ///
    /// Files without both `data` and `logs` at the top level are treated as the data itself.
    pub fn load(&mut self) -> Result<(), RunOutputError> {
        let path = self.path();
        let content = fs::read_to_string(&path).map_err(|source| RunOutputError::Io {
            path: path.clone(),
            source,
        })?;
        let saved: Value = serde_json::from_str(&content).map_err(|source| RunOutputError::Json {
            path: path.clone(),
            source,
        })?;
        let Value::Object(mut saved) = saved else {
            return Err(RunOutputError::NotAnObject { path });
        };

        if !(saved.contains_key("data") && saved.contains_key("logs")) {
            self.data.extend(saved);
            return Ok(());
        }

        if let Some(Value::Object(data)) = saved.remove("data") {
            self.data.extend(data);
        }
        if let Some(Value::Object(logs)) = saved.remove("logs") {
            for (level, messages) in logs {
                let messages = match messages {
                    Value::Array(items) => items
                        .into_iter()
                        .map(|item| match item {
                            Value::String(s) => s,
                            other => other.to_string(),
                        })
                        .collect(),
                    _ => Vec::new(),
                };
                self.logs.insert(level, messages);
            }
        }
        Ok(())
    }

    fn load_if_exists(&mut self) {
        if !self.exists() {
            return;
        }
        if let Err(e) = self.load() {
            tracing::debug!("Ignoring unreadable run output: {}", e);
        }
    }

    fn save_if_save_every_set(&self) -> Result<(), RunOutputError> {
        if self.save_every_set {
            self.save()?;
        }
        Ok(())
    }
}
