//! API response types and formatting.
//!
//! This module defines the standard API response format used by all endpoints.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::engine::{RunSummary, ServiceStatus, TransitionEvent};
use crate::error::{ErrorResponse, JunbanError};
use crate::model::ReadinessState;

/// Standard API response wrapper.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    /// Whether the request was successful.
    pub success: bool,
    /// Response data (present on success).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    /// Error information (present on failure).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorResponse>,
    /// Response timestamp.
    pub timestamp: DateTime<Utc>,
}

impl<T> ApiResponse<T> {
    /// Creates a successful response with data.
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            timestamp: Utc::now(),
        }
    }

    /// Creates a failed response with an error.
    pub fn error(error: ErrorResponse) -> ApiResponse<T> {
        ApiResponse {
            success: false,
            data: None,
            error: Some(error),
            timestamp: Utc::now(),
        }
    }

    /// Creates a failed response from a JunbanError.
    pub fn from_error(err: &JunbanError) -> ApiResponse<T> {
        Self::error(ErrorResponse::from_error(err))
    }
}

/// Health check response data.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthData {
    /// Health status.
    pub status: HealthStatus,
    /// Application version.
    pub version: String,
    /// Uptime in seconds.
    pub uptime_seconds: u64,
}

/// Health status enumeration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    /// System is healthy.
    Healthy,
    /// System is degraded but operational.
    Degraded,
}

/// Orchestrator status response data.
#[derive(Debug, Clone, Serialize)]
pub struct StatusData {
    /// Host the orchestrator runs on.
    pub host: String,
    /// Profile used when a request names none.
    pub active_profile: Option<String>,
    /// Declared profiles.
    pub profiles: Vec<String>,
    /// Operation in progress, if any.
    pub operation: Option<String>,
    /// Server information.
    pub server: ServerInfo,
    /// Latest start outcome per service.
    pub summary: String,
    /// Statistics.
    pub stats: StatsInfo,
    /// Application version.
    pub version: String,
    /// Uptime in seconds.
    pub uptime_seconds: u64,
}

/// Server information.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerInfo {
    /// Bind address.
    pub bind: String,
    /// Port number.
    pub port: u16,
}

/// Statistics information.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StatsInfo {
    /// Total requests received.
    pub requests_total: u64,
    /// Successful requests.
    pub requests_success: u64,
    /// Failed requests.
    pub requests_failed: u64,
}

/// Response for a run accepted with `wait=false`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunAcceptedData {
    /// Request ID.
    pub request_id: Uuid,
    /// Operation started in the background.
    pub operation: String,
    /// Profile the run was resolved for.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profile: Option<String>,
    /// Message.
    pub message: String,
}

/// Response for a completed start run.
#[derive(Debug, Clone, Serialize)]
pub struct RunData {
    /// Request ID.
    pub request_id: Uuid,
    /// Profile the run was resolved for.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profile: Option<String>,
    /// Per-service outcomes.
    pub summary: RunSummary,
    /// Human-readable counts.
    pub message: String,
}

/// Service list response data.
#[derive(Debug, Clone, Serialize)]
pub struct ServicesListData {
    /// List of services.
    pub services: Vec<ServiceInfo>,
    /// Total number of services.
    pub total: usize,
    /// Limit used in query.
    pub limit: usize,
    /// Offset used in query.
    pub offset: usize,
}

/// Basic service information.
#[derive(Debug, Clone, Serialize)]
pub struct ServiceInfo {
    /// Service id.
    pub name: String,
    /// Display name.
    pub display_name: String,
    /// Position in the startup order (1-based).
    pub position: usize,
    /// Readiness as last observed.
    pub readiness: ReadinessState,
    /// Engine status, if the service has been started or stopped.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<ServiceStatus>,
    /// Services this one waits on.
    pub depends_on: Vec<String>,
    /// Services waiting on this one.
    pub required_by: Vec<String>,
}

/// Service operation response data.
#[derive(Debug, Clone, Serialize)]
pub struct ServiceOperationData {
    /// Service name.
    pub service: String,
    /// Action performed.
    pub action: String,
    /// Whether the operation was successful.
    pub success: bool,
    /// Previous state.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub previous_state: Option<ServiceStatus>,
    /// Current state.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_state: Option<ServiceStatus>,
    /// Operation message.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Transition history response data.
#[derive(Debug, Clone, Serialize)]
pub struct EventsData {
    /// Events, oldest first.
    pub events: Vec<TransitionEvent>,
    /// Number of retained events matching the query.
    pub total: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_response_success() {
        let response: ApiResponse<String> = ApiResponse::success("test data".to_string());

        assert!(response.success);
        assert_eq!(response.data, Some("test data".to_string()));
        assert!(response.error.is_none());
    }

    #[test]
    fn test_api_response_error() {
        let err = JunbanError::CycleDetected {
            path: vec!["a".to_string(), "b".to_string()],
        };
        let response: ApiResponse<String> = ApiResponse::from_error(&err);

        assert!(!response.success);
        assert!(response.data.is_none());
        let error = response.error.unwrap();
        assert_eq!(error.code, crate::error::ErrorCode::CycleDetected);
        assert!(error.message.contains("a -> b -> a"));
    }

    #[test]
    fn test_health_status_serialization() {
        let json = serde_json::to_string(&HealthStatus::Healthy).unwrap();
        assert_eq!(json, "\"healthy\"");

        let json = serde_json::to_string(&HealthStatus::Degraded).unwrap();
        assert_eq!(json, "\"degraded\"");
    }

    #[test]
    fn test_service_info_serialization() {
        let info = ServiceInfo {
            name: "cache".to_string(),
            display_name: "Cache".to_string(),
            position: 2,
            readiness: ReadinessState::Healthy,
            status: Some(ServiceStatus::Started),
            depends_on: vec!["registry".to_string()],
            required_by: vec![],
        };

        let json = serde_json::to_value(&info).unwrap();
        assert_eq!(json["name"], "cache");
        assert_eq!(json["readiness"], "healthy");
        assert_eq!(json["status"]["state"], "started");
        assert_eq!(json["depends_on"][0], "registry");
    }
}
