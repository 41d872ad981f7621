//! Service, dependency and profile configuration types.

use serde::{Deserialize, Serialize};

use crate::config::OrchestratorConfig;
use crate::model::{DependencyEdge, DependencyType};

/// Service definition.
///
/// The command fields are consumed by the exec process controller and
/// the status-command health checker; the orchestrator itself only reads
/// `order`, `enabled` and `health_check_url`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceDefinition {
    /// Display name (defaults to the service id).
    pub name: Option<String>,

    /// Preferred order among services with no dependency relationship.
    pub order: i64,

    /// Whether the service is eligible to run.
    pub enabled: bool,

    /// HTTP health endpoint.
    pub health_check_url: Option<String>,

    /// Start command.
    pub start: Option<String>,

    /// Stop command.
    pub stop: Option<String>,

    /// Liveness command (exit 0 = running).
    pub status: Option<String>,

    /// Working directory.
    pub working_dir: Option<String>,

    /// Environment variables.
    pub env: Vec<String>,

    /// Command timeout in seconds.
    pub timeout: Option<u64>,
}

impl Default for ServiceDefinition {
    fn default() -> Self {
        Self {
            name: None,
            order: 0,
            enabled: true,
            health_check_url: None,
            start: None,
            stop: None,
            status: None,
            working_dir: None,
            env: Vec::new(),
            timeout: None,
        }
    }
}

/// Profile definition: a named bundle of services and dependency overrides.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ProfileDefinition {
    /// Free text.
    pub description: String,

    /// Services enabled under this profile (empty = every enabled service).
    pub services: Vec<String>,

    /// Profile-scoped dependency edges.
    pub dependencies: Vec<EdgeDefinition>,
}

impl ProfileDefinition {
    /// Whether the profile narrows the service set to include `service`.
    pub fn includes(&self, service: &str) -> bool {
        self.services.is_empty() || self.services.iter().any(|s| s == service)
    }
}

/// Dependency edge as written in the config file.
///
/// Timing fields left out fall back to the `orchestrator:` defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EdgeDefinition {
    /// Dependent service.
    pub from: String,

    /// Service being depended on.
    pub to: String,

    /// Hard or soft.
    #[serde(rename = "type", default)]
    pub dependency_type: DependencyType,

    /// Wait for `healthy` instead of merely running.
    #[serde(default)]
    pub health_check_required: bool,

    /// Wall-clock wait budget in seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_seconds: Option<u64>,

    /// Poll interval in seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry_interval_seconds: Option<u64>,

    /// Whether an unsatisfied edge prevents the dependent from launching.
    #[serde(default = "default_required")]
    pub required: bool,

    /// Free text.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
}

fn default_required() -> bool {
    true
}

impl EdgeDefinition {
    /// Builds the runtime edge, filling timing gaps from `defaults`.
    pub fn to_edge(&self, defaults: &OrchestratorConfig) -> DependencyEdge {
        DependencyEdge {
            from: self.from.clone(),
            to: self.to.clone(),
            dependency_type: self.dependency_type,
            health_check_required: self.health_check_required,
            timeout_seconds: self
                .timeout_seconds
                .unwrap_or(defaults.default_timeout_seconds),
            retry_interval_seconds: self
                .retry_interval_seconds
                .unwrap_or(defaults.default_retry_interval_seconds),
            required: self.required,
            description: self.description.clone(),
        }
    }
}
