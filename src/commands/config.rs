//! Config command implementation.
//!
//! Generates configuration files in various formats.

use anyhow::{Context, Result};
use faas_inspector::InspectorConfig;
use std::fs;
use std::path::PathBuf;

use crate::cli::ConfigFormat;

/// Generates configuration files.
pub fn command_config(output: Option<PathBuf>, format: ConfigFormat, commented: bool) -> Result<()> {
    let config = InspectorConfig::default();
    let output = output.unwrap_or_else(|| PathBuf::from("faas-inspector.yaml"));

    let content = match format {
        ConfigFormat::Json => serde_json::to_string_pretty(&config)?,
        ConfigFormat::Toml => toml::to_string_pretty(&config)?,
        ConfigFormat::Yaml => {
            let mut content = serde_yaml::to_string(&config)?;
            if commented {
                content = add_config_comments(content);
            }
            content
        }
    };

    if output.to_string_lossy() == "-" {
        print!("{}", content);
    } else {
        fs::write(&output, content)
            .with_context(|| format!("Failed to write {}", output.display()))?;
        println!("✅ Configuration written to: {}", output.display());
    }

    Ok(())
}

/// Adds comments to YAML configuration.
fn add_config_comments(yaml: String) -> String {
    let comments = r#"# faas-inspector Configuration
# ============================
#
# Host Sources
# ------------
# proc_root: "/proc"                         # Root of the proc filesystem
# cgroup_path: "/proc/self/cgroup"           # Read for the AWS Lambda sandbox VM id
# hypervisor_uuid_path: "/sys/hypervisor/uuid" # Read for the IBM Cloud Functions VM id
#
# Container Identity
# ------------------
# container_id_path: "/tmp/container-id"     # Must be absolute; survives warm starts
#
# Record Bootstrap
# ----------------
# lang: "rust"                               # Value of the "lang" attribute
# schema_version: 0.5                        # Value of the "version" attribute
#
# Logging
# -------
# log_level: "warn"                          # off, error, warn, info, debug, trace
"#;

    format!("{comments}\n{yaml}")
}
