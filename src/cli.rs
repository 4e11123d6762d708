//! CLI arguments and subcommands for faas-inspector.
//!
//! This module defines the command-line interface structure using the clap library,
//! including all flags, options, and subcommands.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Log level options for CLI parsing
#[derive(Debug, Clone, ValueEnum)]
pub enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Configuration format options for output
#[derive(Debug, Clone, ValueEnum)]
pub enum ConfigFormat {
    Yaml,
    Json,
    Toml,
}

/// Output format for the invocation record
#[derive(Debug, Clone, ValueEnum)]
pub enum RecordFormat {
    Json,
    Yaml,
}

/// Main CLI arguments structure
#[derive(Parser, Debug)]
#[command(
    name = "faas-inspector",
    about = "Per-invocation host telemetry for serverless function handlers",
    long_about = "Per-invocation host telemetry for serverless function handlers.\n\n\
                  Runs a local invocation the way a function handler would: inspects CPU, \
                  memory, container, platform and kernel attributes, runs a trivial function \
                  body, collects the exit deltas and prints the resulting record.",
    version = "0.1.0",
    propagate_version = true
)]
pub struct Args {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Log level, overrides `log_level` from the config (logs go to stderr)
    #[arg(long, value_enum)]
    pub log_level: Option<LogLevel>,

    /// Config file (YAML/JSON/TOML)
    #[arg(short = 'c', long)]
    pub config: Option<PathBuf>,

    /// Disable all config file loading
    #[arg(long)]
    pub no_config: bool,

    /// Root of the proc filesystem (override config)
    #[arg(long)]
    pub proc_root: Option<PathBuf>,

    /// Persisted container id file (override config)
    #[arg(long)]
    pub container_id_path: Option<PathBuf>,

    /// Print effective merged config and exit
    #[arg(long)]
    pub show_config: bool,

    /// Output format for --show-config
    #[arg(long, value_enum, default_value = "yaml")]
    pub config_format: ConfigFormat,

    /// Validate config and exit (return code 1 on error)
    #[arg(long)]
    pub check_config: bool,
}

/// Subcommands for additional functionality
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run one local invocation and print the record (default)
    Invoke {
        /// Name passed to the hello function
        #[arg(short = 'n', long, default_value = "")]
        name: String,

        /// Output format
        #[arg(long, value_enum, default_value = "json")]
        format: RecordFormat,
    },

    /// Generate configuration files
    Config {
        /// Output file path ("-" for stdout)
        #[arg(short = 'o', long)]
        output: Option<PathBuf>,

        /// Output format
        #[arg(long, value_enum, default_value = "yaml")]
        format: ConfigFormat,

        /// Include comments and examples
        #[arg(long)]
        commented: bool,
    },

    /// Check which host sources are readable
    Check,
}
