//! Configuration module for junban.
//!
//! This module provides all configuration types and loading functionality.
//! The YAML file doubles as the dependency graph store: it declares the
//! services, the global dependency edges and the profile overrides.

mod logging;
mod orchestrator;
mod server;
mod services;

pub use logging::{LogFormat, LogLevel, LogOutput, LoggingConfig};
pub use orchestrator::{HealthConfig, OrchestratorConfig};
pub use server::ServerConfig;
pub use services::{EdgeDefinition, ProfileDefinition, ServiceDefinition};

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};

use crate::error::JunbanError;

/// Environment variable naming the configuration file.
pub const ENV_CONFIG_PATH: &str = "JUNBAN_CONFIG";

/// Paths searched when neither a path nor the environment variable is given.
const DEFAULT_PATHS: [&str; 4] = [
    "/etc/junban/config.yaml",
    "/etc/junban/config.yml",
    "junban.yaml",
    "junban.yml",
];

/// Application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Control API configuration.
    pub server: ServerConfig,

    /// Logging configuration.
    pub logging: LoggingConfig,

    /// Orchestrator defaults.
    pub orchestrator: OrchestratorConfig,

    /// Health check configuration.
    pub health: HealthConfig,

    /// Profile applied when none is given on the command line.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub active_profile: Option<String>,

    /// Service definitions keyed by service id.
    pub services: BTreeMap<String, ServiceDefinition>,

    /// Global dependency edges.
    pub dependencies: Vec<EdgeDefinition>,

    /// Profiles keyed by profile id.
    pub profiles: BTreeMap<String, ProfileDefinition>,
}

impl Config {
    /// Loads configuration with the following priority:
    /// 1. Explicit path (if provided)
    /// 2. `JUNBAN_CONFIG` environment variable
    /// 3. Default search paths
    ///
    /// Returns default config if no file exists.
    pub fn load(explicit_path: Option<&Path>) -> Result<Self, JunbanError> {
        if let Some(path) = explicit_path {
            return Self::load_from_path(path);
        }

        if let Ok(path) = std::env::var(ENV_CONFIG_PATH) {
            return Self::load_from_path(PathBuf::from(path));
        }

        for path in &DEFAULT_PATHS {
            if Path::new(path).exists() {
                return Self::load_from_path(path);
            }
        }

        Ok(Self::default())
    }

    /// Loads configuration from a YAML file.
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self, JunbanError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            JunbanError::config_with_source(
                format!("Failed to read config file '{}'", path.display()),
                e,
            )
        })?;

        Self::load_from_str(&content)
    }

    /// Loads configuration from a YAML string.
    pub fn load_from_str(content: &str) -> Result<Self, JunbanError> {
        let config: Config = serde_yaml::from_str(content)
            .map_err(|e| JunbanError::config_with_source("Failed to parse config", e))?;

        config.validate()?;
        Ok(config)
    }

    /// Validates configuration.
    pub fn validate(&self) -> Result<(), JunbanError> {
        if self.server.port == 0 {
            return Err(JunbanError::config("server.port must be > 0"));
        }

        if self.logging.output == LogOutput::File && self.logging.file_path.is_none() {
            return Err(JunbanError::config(
                "logging.file_path is required when output is file",
            ));
        }

        if self.orchestrator.min_poll_interval_ms == 0 {
            return Err(JunbanError::config(
                "orchestrator.min_poll_interval_ms must be > 0",
            ));
        }

        for (name, def) in &self.services {
            if name.trim().is_empty() {
                return Err(JunbanError::config("service ids must not be empty"));
            }
            if let Some(url) = &def.health_check_url {
                if !(url.starts_with("http://") || url.starts_with("https://")) {
                    return Err(JunbanError::config(format!(
                        "services.{}.health_check_url must be an http(s) URL",
                        name
                    )));
                }
            }
        }

        self.validate_edges("dependencies", &self.dependencies)?;

        for (profile, def) in &self.profiles {
            for service in &def.services {
                if !self.services.contains_key(service) {
                    return Err(JunbanError::config(format!(
                        "profiles.{}.services references unknown service '{}'",
                        profile, service
                    )));
                }
            }
            self.validate_edges(&format!("profiles.{}.dependencies", profile), &def.dependencies)?;
        }

        if let Some(profile) = &self.active_profile {
            if !self.profiles.contains_key(profile) {
                return Err(JunbanError::ProfileNotFound {
                    profile: profile.clone(),
                });
            }
        }

        Ok(())
    }

    /// Validates one scope's edge list.
    fn validate_edges(&self, section: &str, edges: &[EdgeDefinition]) -> Result<(), JunbanError> {
        let mut seen = HashSet::new();

        for edge in edges {
            if edge.from == edge.to {
                return Err(JunbanError::config(format!(
                    "{}: service '{}' cannot depend on itself",
                    section, edge.from
                )));
            }
            for endpoint in [&edge.from, &edge.to] {
                if !self.services.contains_key(endpoint) {
                    return Err(JunbanError::config(format!(
                        "{}: unknown service '{}'",
                        section, endpoint
                    )));
                }
            }
            if !seen.insert((edge.from.as_str(), edge.to.as_str())) {
                return Err(JunbanError::config(format!(
                    "{}: duplicate edge {} -> {}",
                    section, edge.from, edge.to
                )));
            }
        }

        Ok(())
    }

    /// Returns the host name reported by the control API.
    pub fn host_name(&self) -> String {
        hostname::get()
            .ok()
            .and_then(|h| h.into_string().ok())
            .unwrap_or_else(|| "unknown".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::DependencyType;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const FLEET: &str = r#"
orchestrator:
  default_timeout_seconds: 30

active_profile: dev

services:
  registry:
    order: 1
    health_check_url: "http://127.0.0.1:8761/health"
    start: "registry --daemon"
    stop: "pkill registry"
  cache:
    order: 2
  gateway:
    order: 3
    env:
      - "PORT=8080"

dependencies:
  - from: gateway
    to: registry
    health_check_required: true
  - from: cache
    to: registry
    type: soft

profiles:
  dev:
    services: [registry, cache]
    dependencies:
      - from: cache
        to: registry
        timeout_seconds: 5
"#;

    #[test]
    fn test_default_config() {
        let config = Config::default();

        assert_eq!(config.server.port, 7878);
        assert_eq!(config.logging.level, LogLevel::Info);
        assert_eq!(config.orchestrator.default_timeout_seconds, 120);
        assert!(config.services.is_empty());
        assert!(config.active_profile.is_none());
    }

    #[test]
    fn test_load_fleet_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(FLEET.as_bytes()).unwrap();

        let config = Config::load_from_path(file.path()).unwrap();

        assert_eq!(config.services.len(), 3);
        assert_eq!(config.active_profile.as_deref(), Some("dev"));
        assert_eq!(config.dependencies.len(), 2);
        assert_eq!(config.dependencies[1].dependency_type, DependencyType::Soft);

        let registry = &config.services["registry"];
        assert_eq!(registry.order, 1);
        assert_eq!(registry.start.as_deref(), Some("registry --daemon"));

        let dev = &config.profiles["dev"];
        assert_eq!(dev.services, vec!["registry", "cache"]);
        assert_eq!(dev.dependencies[0].timeout_seconds, Some(5));
    }

    #[test]
    fn test_validation_self_edge() {
        let yaml = r#"
services:
  a: {}
dependencies:
  - from: a
    to: a
"#;
        let err = Config::load_from_str(yaml).unwrap_err();
        assert!(err.to_string().contains("cannot depend on itself"));
    }

    #[test]
    fn test_validation_duplicate_edge_in_scope() {
        let yaml = r#"
services:
  a: {}
  b: {}
dependencies:
  - { from: a, to: b }
  - { from: a, to: b, type: soft }
"#;
        let err = Config::load_from_str(yaml).unwrap_err();
        assert!(err.to_string().contains("duplicate edge"));
    }

    #[test]
    fn test_same_edge_allowed_in_different_scopes() {
        let yaml = r#"
services:
  a: {}
  b: {}
dependencies:
  - { from: a, to: b }
profiles:
  dev:
    dependencies:
      - { from: a, to: b, type: soft }
"#;
        assert!(Config::load_from_str(yaml).is_ok());
    }

    #[test]
    fn test_validation_unknown_service_in_edge() {
        let yaml = r#"
services:
  a: {}
dependencies:
  - { from: a, to: ghost }
"#;
        let err = Config::load_from_str(yaml).unwrap_err();
        assert!(err.to_string().contains("ghost"));
    }

    #[test]
    fn test_validation_unknown_active_profile() {
        let yaml = "active_profile: prod\n";
        let err = Config::load_from_str(yaml).unwrap_err();
        assert!(matches!(err, JunbanError::ProfileNotFound { .. }));
    }

    #[test]
    fn test_validation_port_zero() {
        let err = Config::load_from_str("server:\n  port: 0\n").unwrap_err();
        assert!(err.to_string().contains("port"));
    }

    #[test]
    fn test_validation_bad_health_url() {
        let yaml = r#"
services:
  a:
    health_check_url: "localhost:8080/health"
"#;
        let err = Config::load_from_str(yaml).unwrap_err();
        assert!(err.to_string().contains("health_check_url"));
    }

    #[test]
    fn test_config_serialization() {
        let config = Config::load_from_str(FLEET).unwrap();
        let yaml = serde_yaml::to_string(&config).unwrap();

        assert!(yaml.contains("registry"));
        assert!(yaml.contains("default_timeout_seconds"));
        assert!(Config::load_from_str(&yaml).is_ok());
    }

    #[test]
    fn test_host_name_not_empty() {
        assert!(!Config::default().host_name().is_empty());
    }
}
