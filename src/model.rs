//! Core data model shared by the store, resolver, prober and engine.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::JunbanError;

/// Stable service identifier (the key under `services:` in the config).
pub type ServiceId = String;

/// Profile identifier (the key under `profiles:` in the config).
pub type ProfileId = String;

/// Default wait budget for a dependency edge.
pub const DEFAULT_TIMEOUT_SECONDS: u64 = 120;

/// Default poll interval for a dependency edge.
pub const DEFAULT_RETRY_INTERVAL_SECONDS: u64 = 5;

/// A managed service as seen by the orchestrator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Service {
    /// Stable id.
    pub id: ServiceId,
    /// Display name.
    pub name: String,
    /// Health endpoint, if any.
    pub health_check_url: Option<String>,
    /// Whether the service is eligible to run.
    pub enabled: bool,
    /// Preferred position among otherwise unordered services.
    pub order: i64,
}

impl Service {
    /// Creates an enabled service with the given id and preferred order.
    pub fn new(id: impl Into<String>, order: i64) -> Self {
        let id = id.into();
        Self {
            name: id.clone(),
            id,
            health_check_url: None,
            enabled: true,
            order,
        }
    }

    /// Sets the health endpoint.
    pub fn with_health_check_url(mut self, url: impl Into<String>) -> Self {
        self.health_check_url = Some(url.into());
        self
    }

    /// Marks the service as disabled.
    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }
}

/// Kind of dependency edge.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DependencyType {
    /// Target must be satisfied before the dependent starts.
    #[default]
    Hard,
    /// Ordering preference only.
    Soft,
}

impl fmt::Display for DependencyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DependencyType::Hard => write!(f, "hard"),
            DependencyType::Soft => write!(f, "soft"),
        }
    }
}

impl FromStr for DependencyType {
    type Err = JunbanError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "hard" => Ok(DependencyType::Hard),
            "soft" => Ok(DependencyType::Soft),
            _ => Err(JunbanError::config(format!(
                "Unknown dependency type: {}",
                s
            ))),
        }
    }
}

/// Directed edge `from -> to`: `from` depends on `to`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependencyEdge {
    /// Dependent service.
    pub from: ServiceId,
    /// Service being depended on.
    pub to: ServiceId,
    /// Hard or soft.
    #[serde(rename = "type", default)]
    pub dependency_type: DependencyType,
    /// Wait for `healthy` instead of merely running.
    #[serde(default)]
    pub health_check_required: bool,
    /// Wall-clock wait budget.
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
    /// Poll interval while waiting.
    #[serde(default = "default_retry_interval_seconds")]
    pub retry_interval_seconds: u64,
    /// Whether an unsatisfied edge prevents the dependent from launching.
    #[serde(default = "default_required")]
    pub required: bool,
    /// Free text.
    #[serde(default)]
    pub description: String,
}

fn default_timeout_seconds() -> u64 {
    DEFAULT_TIMEOUT_SECONDS
}

fn default_retry_interval_seconds() -> u64 {
    DEFAULT_RETRY_INTERVAL_SECONDS
}

fn default_required() -> bool {
    true
}

impl DependencyEdge {
    /// Hard, required edge with default timing and no health gate.
    pub fn hard(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
            dependency_type: DependencyType::Hard,
            health_check_required: false,
            timeout_seconds: DEFAULT_TIMEOUT_SECONDS,
            retry_interval_seconds: DEFAULT_RETRY_INTERVAL_SECONDS,
            required: true,
            description: String::new(),
        }
    }

    /// Soft edge with default timing.
    pub fn soft(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            dependency_type: DependencyType::Soft,
            ..Self::hard(from, to)
        }
    }

    /// Requires the target to report `healthy`.
    pub fn health_gated(mut self) -> Self {
        self.health_check_required = true;
        self
    }

    /// Sets the wait budget and poll interval.
    pub fn with_timing(mut self, timeout_seconds: u64, retry_interval_seconds: u64) -> Self {
        self.timeout_seconds = timeout_seconds;
        self.retry_interval_seconds = retry_interval_seconds;
        self
    }

    /// Marks the edge as optional.
    pub fn optional(mut self) -> Self {
        self.required = false;
        self
    }

    /// True for soft edges.
    pub fn is_soft(&self) -> bool {
        self.dependency_type == DependencyType::Soft
    }

    /// Hard and required: an unsatisfied edge stops the dependent.
    pub fn is_blocking(&self) -> bool {
        self.dependency_type == DependencyType::Hard && self.required
    }

    /// Hard edges are waited on; soft edges never are.
    pub fn is_waited_on(&self) -> bool {
        self.dependency_type == DependencyType::Hard
    }
}

impl fmt::Display for DependencyEdge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {} ({}", self.from, self.to, self.dependency_type)?;
        if self.health_check_required {
            write!(f, ", health")?;
        }
        if !self.required {
            write!(f, ", optional")?;
        }
        write!(f, ")")
    }
}

/// Where a set of edges applies.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "scope", content = "profile", rename_all = "lowercase")]
pub enum DependencyScope {
    /// Applies to every activation.
    Global,
    /// Applies only while the named profile is active.
    Profile(ProfileId),
}

impl fmt::Display for DependencyScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DependencyScope::Global => write!(f, "global"),
            DependencyScope::Profile(id) => write!(f, "profile:{}", id),
        }
    }
}

/// Readiness of a service as last observed by the prober.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReadinessState {
    /// Never observed.
    #[default]
    Unknown,
    /// Running but not yet reporting health.
    Starting,
    /// Running and healthy.
    Healthy,
    /// Running but failing its health check (or unreachable).
    Unhealthy,
    /// Not running.
    Stopped,
}

impl ReadinessState {
    /// The process is at least running.
    pub fn is_running(&self) -> bool {
        !matches!(self, ReadinessState::Unknown | ReadinessState::Stopped)
    }

    /// Whether this state satisfies a wait for `healthy` (or merely running).
    pub fn satisfies(&self, want_healthy: bool) -> bool {
        if want_healthy {
            *self == ReadinessState::Healthy
        } else {
            self.is_running()
        }
    }
}

impl fmt::Display for ReadinessState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReadinessState::Unknown => write!(f, "unknown"),
            ReadinessState::Starting => write!(f, "starting"),
            ReadinessState::Healthy => write!(f, "healthy"),
            ReadinessState::Unhealthy => write!(f, "unhealthy"),
            ReadinessState::Stopped => write!(f, "stopped"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_edge_defaults_from_yaml() {
        let edge: DependencyEdge = serde_yaml::from_str("from: cache\nto: registry\n").unwrap();

        assert_eq!(edge.dependency_type, DependencyType::Hard);
        assert_eq!(edge.timeout_seconds, 120);
        assert_eq!(edge.retry_interval_seconds, 5);
        assert!(edge.required);
        assert!(!edge.health_check_required);
        assert!(edge.description.is_empty());
    }

    #[test]
    fn test_edge_blocking_rules() {
        assert!(DependencyEdge::hard("a", "b").is_blocking());
        assert!(!DependencyEdge::hard("a", "b").optional().is_blocking());
        assert!(DependencyEdge::hard("a", "b").optional().is_waited_on());
        assert!(!DependencyEdge::soft("a", "b").is_blocking());
        assert!(!DependencyEdge::soft("a", "b").is_waited_on());
    }

    #[test]
    fn test_readiness_satisfaction() {
        assert!(ReadinessState::Healthy.satisfies(true));
        assert!(!ReadinessState::Starting.satisfies(true));
        assert!(!ReadinessState::Unhealthy.satisfies(true));

        assert!(ReadinessState::Starting.satisfies(false));
        assert!(ReadinessState::Unhealthy.satisfies(false));
        assert!(!ReadinessState::Unknown.satisfies(false));
        assert!(!ReadinessState::Stopped.satisfies(false));
    }

    #[test]
    fn test_dependency_type_parse() {
        assert_eq!("HARD".parse::<DependencyType>().unwrap(), DependencyType::Hard);
        assert_eq!("soft".parse::<DependencyType>().unwrap(), DependencyType::Soft);
        assert!("weak".parse::<DependencyType>().is_err());
    }

    #[test]
    fn test_scope_display() {
        assert_eq!(DependencyScope::Global.to_string(), "global");
        assert_eq!(
            DependencyScope::Profile("dev".to_string()).to_string(),
            "profile:dev"
        );
    }

    #[test]
    fn test_edge_display() {
        let edge = DependencyEdge::hard("gateway", "registry")
            .health_gated()
            .optional();
        assert_eq!(edge.to_string(), "gateway -> registry (hard, health, optional)");
    }
}
