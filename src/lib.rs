//! # basictools - parallel dispatch and everyday research utilities
//!
//! basictools applies one function over many inputs on a pool of worker threads while
//! relaying every worker's log events to a single place, and bundles the small helpers
//! that tend to travel with such batch jobs:
//!
//! - **Parallel dispatch**: ordered results, progress reporting and log relaying ([`parallel`])
//! - **Run outputs**: JSON records of a run that can be saved, reloaded and collected ([`run_output`])
//! - **Versioning**: PEP 440 versions read from and written to source files ([`version`])
//! - **File locks**: cooperative exclusion between processes ([`lock`])
//! - **Logging**: dated log files and a stderr subscriber ([`logging`])
//! - **Slurm**: submission command generation ([`slurm`])
//!
//! ## Quick Start
//!
//! ```bash
//! # Gather every run output below ./runs as JSON rows
//! basictools collect runs --require accuracy
//!
//! # Bump the minor segment of ./__init__.py
//! basictools version bump --segment minor
//!
//! # Serialize a job behind a lock file
//! basictools lock --path ./gpu.lck -- python train.py
//! ```

pub mod cli;
pub mod collections;
pub mod config;
pub mod lock;
pub mod logging;
pub mod parallel;
pub mod run_output;
pub mod slurm;
pub mod utils;
pub mod version;

pub use cli::{Cli, Output};
pub use config::BasicToolsConfig;
pub use parallel::{DispatchOptions, WorkerCount, dispatch};

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const PKG_NAME: &str = env!("CARGO_PKG_NAME");
