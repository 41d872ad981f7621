//! Orchestrator and health check configuration types.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::model::{DEFAULT_RETRY_INTERVAL_SECONDS, DEFAULT_TIMEOUT_SECONDS};

/// Orchestrator configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OrchestratorConfig {
    /// Timeout applied to edges that omit `timeout_seconds`.
    pub default_timeout_seconds: u64,

    /// Poll interval applied to edges that omit `retry_interval_seconds`.
    pub default_retry_interval_seconds: u64,

    /// Floor for readiness polling, used when an edge asks for 0 seconds.
    pub min_poll_interval_ms: u64,

    /// Timeout for start/stop commands run by the exec controller.
    pub launch_timeout_seconds: u64,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            default_timeout_seconds: DEFAULT_TIMEOUT_SECONDS,
            default_retry_interval_seconds: DEFAULT_RETRY_INTERVAL_SECONDS,
            min_poll_interval_ms: 100,
            launch_timeout_seconds: 60,
        }
    }
}

impl OrchestratorConfig {
    /// Polling floor as a duration.
    pub fn min_poll_interval(&self) -> Duration {
        Duration::from_millis(self.min_poll_interval_ms)
    }
}

/// Health check configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HealthConfig {
    /// HTTP request timeout for health endpoints.
    pub http_timeout_seconds: u64,

    /// Timeout for status commands.
    pub command_timeout_seconds: u64,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            http_timeout_seconds: 5,
            command_timeout_seconds: 10,
        }
    }
}
