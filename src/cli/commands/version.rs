use crate::cli::Output;
use crate::version::{
    Segment, Version, get_version_from_file, increment_version, infer_affected_version_segment_from_msg,
    parse_increment, set_version_in_file,
    file::{DEFAULT_VERSION_ATTR, DEFAULT_VERSION_FILE},
};
use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use std::collections::HashMap;
use std::path::PathBuf;

#[derive(Args)]
pub struct VersionArgs {
    #[command(subcommand)]
    pub command: VersionCommand,
}

#[derive(Args)]
pub struct VersionFileArgs {
    /// File holding the version assignment
    #[arg(short, long, default_value = DEFAULT_VERSION_FILE)]
    pub file: PathBuf,

    /// Attribute assigned the version; empty means the whole first line
    #[arg(short, long, default_value = DEFAULT_VERSION_ATTR)]
    pub attr: String,
}

#[derive(Subcommand)]
pub enum VersionCommand {
    /// Print the version stored in a file
    Get(VersionFileArgs),
    /// Write a version into a file
    Set {
        version: String,
        #[command(flatten)]
        file: VersionFileArgs,
    },
    /// Increment segments of the version stored in a file
    Bump {
        /// Segment to bump, `name` or `name=amount` (repeatable)
        #[arg(short, long = "segment", value_name = "SEGMENT[=N]")]
        segments: Vec<String>,

        /// Commit message used to pick the segment when none is given
        #[arg(short, long)]
        message: Option<String>,

        /// Print the new version without writing it
        #[arg(long)]
        dry_run: bool,

        #[command(flatten)]
        file: VersionFileArgs,
    },
    /// Print the segment a commit message would bump
    Infer { message: String },
}

pub fn execute(args: VersionArgs, output: &Output) -> Result<()> {
    match args.command {
        VersionCommand::Get(file) => {
            let version = get_version_from_file(&file.file, &file.attr)?;
            println!("{version}");
        }
        VersionCommand::Set { version, file } => {
            let version = Version::parse(&version)?;
            let written = set_version_in_file(&version, &file.file, &file.attr)?;
            output.success(&format!("Set version {} in {}", written, file.file.display()));
        }
        VersionCommand::Bump {
            segments,
            message,
            dry_run,
            file,
        } => {
            let current = get_version_from_file(&file.file, &file.attr)
                .with_context(|| format!("Cannot read the version from {}", file.file.display()))?;
            let increments = increments(&segments, message.as_deref())?;
            let bumped = increment_version(&current, &increments);
            output.verbose(&format!("{current} -> {bumped}"));

            if dry_run {
                output.info("Dry run, file left unchanged");
            } else {
                set_version_in_file(&bumped, &file.file, &file.attr)?;
            }
            println!("{bumped}");
        }
        VersionCommand::Infer { message } => {
            let segment = infer_affected_version_segment_from_msg(&message, &HashMap::new())?;
            println!("{segment}");
        }
    }
    Ok(())
}

/// Explicit segments win; otherwise the message decides, and a bare bump is a micro bump
fn increments(segments: &[String], message: Option<&str>) -> Result<Vec<(Segment, u64)>> {
    if !segments.is_empty() {
        return segments
            .iter()
            .map(|spec| parse_increment(spec).map_err(Into::into))
            .collect();
    }
    match message {
        Some(msg) => Ok(vec![(infer_affected_version_segment_from_msg(msg, &HashMap::new())?, 1)]),
        None => Ok(vec![(Segment::Micro, 1)]),
    }
}
