use super::{EXT, RunOutputError, RunOutputFile};
use crate::parallel::{DispatchOptions, WorkerCount, dispatch};
use serde_json::{Map, Value};
use std::convert::Infallible;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

pub const DEFAULT_FILE_COLUMN: &str = "_file";

/// How [`parse_results_from_dir`] builds its rows
#[derive(Debug, Clone)]
pub struct CollectOptions {
    /// Rows lacking any of these columns (or holding `null` there) are dropped
    pub required_columns: Vec<String>,
    /// Column receiving the path of the file a row came from
    pub file_column: String,
    pub workers: WorkerCount,
    /// Show a progress bar while loading
    pub verbose: bool,
    /// Per-item label of the progress bar
    pub unit: String,
}

impl Default for CollectOptions {
    fn default() -> Self {
        Self {
            required_columns: Vec::new(),
            file_column: DEFAULT_FILE_COLUMN.to_string(),
            workers: WorkerCount::default(),
            verbose: true,
            unit: "files".to_string(),
        }
    }
}

impl CollectOptions {
    /// Progress settings of the dispatch loading the files below `root`
    pub fn dispatch_options(&self, root: &Path) -> DispatchOptions<PathBuf, Map<String, Value>> {
        let absolute = std::path::absolute(root).unwrap_or_else(|_| root.to_path_buf());
        DispatchOptions::new()
            .with_description(format!("Processing files '{EXT}' in {}", absolute.display()))
            .with_unit(self.unit.clone())
            .verbose(self.verbose)
    }
}

/// Every `*.out.json` below `root`, in a stable, name-sorted walk order
pub fn find_output_files(root: impl AsRef<Path>) -> Vec<PathBuf> {
    WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(e) => {
                tracing::warn!("Skipping unreadable entry: {}", e);
                None
            }
        })
        .filter(|entry| entry.file_type().is_file())
        .filter(|entry| entry.file_name().to_string_lossy().ends_with(EXT))
        .map(|entry| entry.into_path())
        .collect()
}

fn file_row(path: &PathBuf, extra: &Map<String, Value>) -> Result<Map<String, Value>, Infallible> {
    let mut row = RunOutputFile::raveled_state_from_file(path);
    row.extend(extra.clone());
    Ok(row)
}

/// Load every run output below `root` as one flattened row per file
///
/// Files are read through the parallel dispatcher; rows keep the walk order of
/// [`find_output_files`].
pub fn parse_results_from_dir(
    root: impl AsRef<Path>,
    options: &CollectOptions,
) -> Result<Vec<Map<String, Value>>, RunOutputError> {
    let root = root.as_ref();
    let files = find_output_files(root);
    tracing::info!("Found {} '{}' files in {}", files.len(), EXT, root.display());

    let kwargs: Vec<Map<String, Value>> = files
        .iter()
        .map(|file| {
            let mut extra = Map::new();
            extra.insert(
                options.file_column.clone(),
                Value::String(file.display().to_string()),
            );
            extra
        })
        .collect();

    let rows = dispatch(
        file_row,
        files,
        Some(kwargs),
        options.workers,
        options.dispatch_options(root),
    )?;

    let total = rows.len();
    let rows: Vec<_> = rows
        .into_iter()
        .filter(|row| {
            options
                .required_columns
                .iter()
                .all(|column| row.get(column).is_some_and(|value| !value.is_null()))
        })
        .collect();
    if rows.len() < total {
        tracing::info!(
            "Dropped {} rows missing a required column",
            total - rows.len()
        );
    }

    Ok(rows)
}
