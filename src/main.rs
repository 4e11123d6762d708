//! faas-inspector - version 0.1.0
//!
//! Local invocation harness for the inspector library.
//! This is the main entry point that resolves configuration and dispatches subcommands.

mod cli;
mod commands;

use clap::Parser;
use faas_inspector::{load_config, validate_config, HostSources, InspectorConfig};
use tracing::info;
use tracing_subscriber::filter::LevelFilter;

use cli::{Args, Commands, ConfigFormat, LogLevel, RecordFormat};
use commands::{command_check, command_config, command_invoke};

/// Initializes tracing logging subsystem with the effective log level.
fn setup_logging(config: &InspectorConfig, args: &Args) {
    let log_level = match &args.log_level {
        Some(LogLevel::Off) => LevelFilter::OFF,
        Some(LogLevel::Error) => LevelFilter::ERROR,
        Some(LogLevel::Warn) => LevelFilter::WARN,
        Some(LogLevel::Info) => LevelFilter::INFO,
        Some(LogLevel::Debug) => LevelFilter::DEBUG,
        Some(LogLevel::Trace) => LevelFilter::TRACE,
        None => config.log_level.parse().unwrap_or(LevelFilter::WARN),
    };

    let subscriber = tracing_subscriber::fmt()
        .with_max_level(log_level)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(true)
        .with_line_number(true)
        .with_writer(std::io::stderr)
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
        return;
    }

    info!("Logging initialized with level: {}", log_level);
}

/// Resolves the effective configuration (CLI > config file > defaults).
fn resolve_config(args: &Args) -> Result<InspectorConfig, Box<dyn std::error::Error>> {
    let mut config = if args.no_config {
        InspectorConfig::default()
    } else {
        load_config(args.config.as_deref())?
    };

    if let Some(proc_root) = &args.proc_root {
        let sources = HostSources::with_proc_root(proc_root);
        config.proc_root = sources.proc_root;
        config.cgroup_path = sources.cgroup_path;
    }

    if let Some(path) = &args.container_id_path {
        config.container_id_path = path.clone();
    }

    Ok(config)
}

/// Prints the effective configuration in the requested format.
fn show_config(
    config: &InspectorConfig,
    format: &ConfigFormat,
) -> Result<(), Box<dyn std::error::Error>> {
    let output = match format {
        ConfigFormat::Json => serde_json::to_string_pretty(config)?,
        ConfigFormat::Toml => toml::to_string_pretty(config)?,
        ConfigFormat::Yaml => serde_yaml::to_string(config)?,
    };

    println!("{output}");
    Ok(())
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    // Early config resolution for show/check modes
    let config = resolve_config(&args)?;

    if args.check_config {
        if let Err(e) = validate_config(&config) {
            eprintln!("❌ Configuration invalid: {}", e);
            std::process::exit(1);
        }
        println!("✅ Configuration is valid");
        return Ok(());
    }

    if args.show_config {
        return show_config(&config, &args.config_format);
    }

    setup_logging(&config, &args);

    match &args.command {
        Some(Commands::Config {
            output,
            format,
            commented,
        }) => command_config(output.clone(), format.clone(), *commented)?,
        Some(Commands::Check) => command_check(&config)?,
        Some(Commands::Invoke { name, format }) => {
            if let Err(e) = validate_config(&config) {
                eprintln!("❌ Configuration invalid: {}", e);
                std::process::exit(1);
            }
            command_invoke(name, format.clone(), &config)?
        }
        None => {
            if let Err(e) = validate_config(&config) {
                eprintln!("❌ Configuration invalid: {}", e);
                std::process::exit(1);
            }
            command_invoke("", RecordFormat::Json, &config)?
        }
    }

    Ok(())
}
