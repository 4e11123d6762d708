//! Configuration management for faas-inspector.
//!
//! This module handles loading and validating the inspector configuration
//! from YAML, JSON, or TOML files. Every field has a default, so an absent
//! or partial file is always usable.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::container::DEFAULT_CONTAINER_ID_PATH;
use crate::error::ConfigError;
use crate::system::HostSources;

// Default configuration constants
pub const DEFAULT_SCHEMA_VERSION: f64 = 0.5;
pub const DEFAULT_LANG: &str = "rust";
pub const DEFAULT_LOG_LEVEL: &str = "warn";

const DEFAULT_CONFIG_LOCATIONS: [&str; 4] = [
    "/etc/faas-inspector/config.yaml",
    "/etc/faas-inspector/config.yml",
    "./faas-inspector.yaml",
    "./faas-inspector.json",
];

/// Inspector configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InspectorConfig {
    /// Root of the proc filesystem.
    pub proc_root: PathBuf,
    /// Persisted container id file.
    #[serde(alias = "container-id-path")]
    pub container_id_path: PathBuf,
    /// cgroup descriptor used to find the Lambda sandbox VM id.
    #[serde(alias = "cgroup-path")]
    pub cgroup_path: PathBuf,
    /// Hypervisor UUID file used on IBM Cloud Functions.
    #[serde(alias = "hypervisor-uuid-path")]
    pub hypervisor_uuid_path: PathBuf,
    /// Value of the `lang` bootstrap attribute.
    pub lang: String,
    /// Value of the `version` bootstrap attribute.
    #[serde(alias = "schema-version")]
    pub schema_version: f64,
    /// off, error, warn, info, debug, trace
    #[serde(alias = "log-level")]
    pub log_level: String,
}

impl Default for InspectorConfig {
    fn default() -> Self {
        let sources = HostSources::default();
        Self {
            proc_root: sources.proc_root,
            container_id_path: PathBuf::from(DEFAULT_CONTAINER_ID_PATH),
            cgroup_path: sources.cgroup_path,
            hypervisor_uuid_path: sources.hypervisor_uuid_path,
            lang: DEFAULT_LANG.to_string(),
            schema_version: DEFAULT_SCHEMA_VERSION,
            log_level: DEFAULT_LOG_LEVEL.to_string(),
        }
    }
}

impl InspectorConfig {
    /// Source locations described by this configuration.
    pub fn host_sources(&self) -> HostSources {
        HostSources {
            proc_root: self.proc_root.clone(),
            cgroup_path: self.cgroup_path.clone(),
            hypervisor_uuid_path: self.hypervisor_uuid_path.clone(),
        }
    }
}

/// Validate effective config (used by --check-config and at startup)
pub fn validate_config(cfg: &InspectorConfig) -> Result<(), ConfigError> {
    let paths = [
        ("proc_root", &cfg.proc_root),
        ("container_id_path", &cfg.container_id_path),
        ("cgroup_path", &cfg.cgroup_path),
        ("hypervisor_uuid_path", &cfg.hypervisor_uuid_path),
    ];
    for (name, path) in paths {
        if path.as_os_str().is_empty() {
            return Err(ConfigError::EmptyPath(name));
        }
    }

    // Id file must not depend on the working directory
    if cfg.container_id_path.is_relative() {
        return Err(ConfigError::RelativeContainerIdPath(
            cfg.container_id_path.clone(),
        ));
    }

    match cfg.log_level.as_str() {
        "off" | "error" | "warn" | "info" | "debug" | "trace" => Ok(()),
        other => Err(ConfigError::InvalidLogLevel(other.to_string())),
    }
}

/// Loads configuration from `path`, or from the first default location that
/// exists. Falls back to defaults when no file is found.
pub fn load_config(path: Option<&Path>) -> Result<InspectorConfig, Box<dyn std::error::Error>> {
    let path = match path {
        Some(p) => p.to_path_buf(),
        None => match DEFAULT_CONFIG_LOCATIONS
            .iter()
            .map(PathBuf::from)
            .find(|p| p.exists())
        {
            Some(p) => p,
            None => return Ok(InspectorConfig::default()),
        },
    };

    if !path.exists() {
        return Ok(InspectorConfig::default());
    }

    let content = fs::read_to_string(&path)?;

    match path.extension().and_then(|s| s.to_str()) {
        Some("json") => {
            let config: InspectorConfig = serde_json::from_str(&content)?;
            info!("Loaded JSON configuration from: {}", path.display());
            Ok(config)
        }
        Some("toml") => {
            let config: InspectorConfig = toml::from_str(&content)?;
            info!("Loaded TOML configuration from: {}", path.display());
            Ok(config)
        }
        _ => {
            // Default to YAML
            let config: InspectorConfig = serde_yaml::from_str(&content)?;
            info!("Loaded YAML configuration from: {}", path.display());
            Ok(config)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_default_config_is_valid() {
        let config = InspectorConfig::default();
        assert!(validate_config(&config).is_ok());
        assert_eq!(config.container_id_path, PathBuf::from("/tmp/container-id"));
        assert_eq!(config.lang, "rust");
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = InspectorConfig {
            container_id_path: PathBuf::from("container-id"),
            ..InspectorConfig::default()
        };
        assert!(matches!(
            validate_config(&config),
            Err(ConfigError::RelativeContainerIdPath(_))
        ));

        config.container_id_path = PathBuf::new();
        assert!(matches!(
            validate_config(&config),
            Err(ConfigError::EmptyPath("container_id_path"))
        ));

        config = InspectorConfig {
            log_level: "loud".into(),
            ..InspectorConfig::default()
        };
        assert!(matches!(
            validate_config(&config),
            Err(ConfigError::InvalidLogLevel(_))
        ));
    }

    #[test]
    fn test_load_partial_yaml_keeps_defaults() {
        let dir = tempdir().expect("Failed to create temp dir");
        let path = dir.path().join("inspector.yaml");
        fs::write(&path, "proc_root: /host/proc\nlog-level: debug\n").unwrap();

        let config = load_config(Some(&path)).expect("valid yaml");
        assert_eq!(config.proc_root, PathBuf::from("/host/proc"));
        assert_eq!(config.log_level, "debug");
        assert_eq!(config.schema_version, DEFAULT_SCHEMA_VERSION);
    }

    #[test]
    fn test_load_json_and_toml() {
        let dir = tempdir().expect("Failed to create temp dir");

        let json = dir.path().join("inspector.json");
        fs::write(&json, r#"{"lang": "rust-test"}"#).unwrap();
        assert_eq!(load_config(Some(&json)).unwrap().lang, "rust-test");

        let toml_path = dir.path().join("inspector.toml");
        fs::write(&toml_path, "container_id_path = \"/var/tmp/id\"\n").unwrap();
        assert_eq!(
            load_config(Some(&toml_path)).unwrap().container_id_path,
            PathBuf::from("/var/tmp/id")
        );
    }

    #[test]
    fn test_load_missing_file_uses_defaults() {
        let dir = tempdir().expect("Failed to create temp dir");
        let config = load_config(Some(&dir.path().join("absent.yaml"))).unwrap();
        assert_eq!(config.lang, DEFAULT_LANG);
    }
}
