//! CLI argument parsing definitions

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Set the log level (trace, debug, info, warn, error)
    #[arg(long, value_name = "LEVEL", global = true)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run a load test and gate on its thresholds
    Run {
        /// Path to the run configuration
        #[arg(long, value_name = "PATH")]
        config: Option<PathBuf>,

        /// Write the JSON summary to this file
        #[arg(long, value_name = "PATH")]
        summary_export: Option<PathBuf>,
    },

    /// Validate a run configuration without generating load
    Validate {
        /// Path to the run configuration
        #[arg(long, value_name = "PATH")]
        config: PathBuf,
    },

    /// Configuration management commands
    Config {
        #[command(subcommand)]
        config_cmd: ConfigCommands,
    },
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Generate a sample configuration file
    Generate {
        /// Output file path
        #[arg(long, value_name = "PATH")]
        output: PathBuf,

        /// Overwrite existing file
        #[arg(long)]
        force: bool,
    },
}
