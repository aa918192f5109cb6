use crate::config::BasicToolsConfig;
use anyhow::Result;
use clap::{Args, Subcommand};
use serde_json::Value;

#[derive(Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Subcommand)]
pub enum ConfigCommand {
    /// Display current merged configuration as JSON
    Show,
    /// Get configuration value (dotted path, e.g. `parallel.workers`)
    Get { key: String },
}

pub fn execute(args: ConfigArgs, config: &BasicToolsConfig) -> Result<()> {
    match args.command {
        ConfigCommand::Show => {
            println!("{}", serde_json::to_string_pretty(&config.get_full_config()?)?);
        }
        ConfigCommand::Get { key } => {
            let value = config
                .get_section(&key)
                .map_err(|_| anyhow::anyhow!("Configuration key '{}' not found", key))?;
            print_value(value)?;
        }
    }
    Ok(())
}

fn print_value(value: Value) -> Result<()> {
    match value {
        Value::Object(_) => println!("{}", serde_json::to_string_pretty(&value)?),
        // One array item per line
        Value::Array(items) => {
            for item in items {
                match item {
                    Value::String(s) => println!("{s}"),
                    other => println!("{other}"),
                }
            }
        }
        Value::String(s) => println!("{s}"),
        other => println!("{other}"),
    }
    Ok(())
}
