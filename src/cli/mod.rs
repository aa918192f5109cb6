//! Command-line interface for basictools
//!
//! clap derive parsing; each subcommand lives in its own module under [`commands`]
//! with an `Args` struct and an `execute` function.

pub mod commands;
pub mod output;

pub use commands::Cli;
pub use output::Output;
