//! Error types and error handling for junban.
//!
//! This module defines all error types used throughout the application,
//! including error codes, error responses for the API, and CLI exit codes.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use thiserror::Error;

/// Stable error codes.
/// Each error has a unique code for identification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorCode {
    /// E001: Configuration is invalid
    #[serde(rename = "E001")]
    ConfigInvalid,

    /// E002: Service does not exist
    #[serde(rename = "E002")]
    ServiceNotFound,

    /// E003: Profile does not exist
    #[serde(rename = "E003")]
    ProfileNotFound,

    /// E004: Dependency graph contains a cycle
    #[serde(rename = "E004")]
    CycleDetected,

    /// E005: Dependency did not become ready in time
    #[serde(rename = "E005")]
    DependencyTimeout,

    /// E006: Process controller failed to launch a service
    #[serde(rename = "E006")]
    LaunchFailed,

    /// E007: Process controller failed to terminate a service
    #[serde(rename = "E007")]
    TerminateFailed,

    /// E008: Health endpoint could not be reached
    #[serde(rename = "E008")]
    HealthCheckUnreachable,

    /// E009: Operation timed out
    #[serde(rename = "E009")]
    Timeout,

    /// E010: Request is invalid
    #[serde(rename = "E010")]
    InvalidRequest,

    /// E011: Orchestrator is busy
    #[serde(rename = "E011")]
    Busy,
}

impl ErrorCode {
    /// Returns the error code as a string (e.g., "E001").
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::ConfigInvalid => "E001",
            ErrorCode::ServiceNotFound => "E002",
            ErrorCode::ProfileNotFound => "E003",
            ErrorCode::CycleDetected => "E004",
            ErrorCode::DependencyTimeout => "E005",
            ErrorCode::LaunchFailed => "E006",
            ErrorCode::TerminateFailed => "E007",
            ErrorCode::HealthCheckUnreachable => "E008",
            ErrorCode::Timeout => "E009",
            ErrorCode::InvalidRequest => "E010",
            ErrorCode::Busy => "E011",
        }
    }

    /// Returns the default message for this error code.
    pub fn default_message(&self) -> &'static str {
        match self {
            ErrorCode::ConfigInvalid => "Configuration is invalid",
            ErrorCode::ServiceNotFound => "Service not found",
            ErrorCode::ProfileNotFound => "Profile not found",
            ErrorCode::CycleDetected => "Dependency cycle detected",
            ErrorCode::DependencyTimeout => "Dependency did not become ready in time",
            ErrorCode::LaunchFailed => "Failed to launch service",
            ErrorCode::TerminateFailed => "Failed to terminate service",
            ErrorCode::HealthCheckUnreachable => "Health endpoint is unreachable",
            ErrorCode::Timeout => "Operation timed out",
            ErrorCode::InvalidRequest => "Request is invalid",
            ErrorCode::Busy => "Orchestrator is busy",
        }
    }

    /// Returns the HTTP status code for this error.
    pub fn http_status(&self) -> u16 {
        match self {
            ErrorCode::ConfigInvalid => 500,
            ErrorCode::ServiceNotFound => 404,
            ErrorCode::ProfileNotFound => 404,
            ErrorCode::CycleDetected => 422,
            ErrorCode::DependencyTimeout => 504,
            ErrorCode::LaunchFailed => 500,
            ErrorCode::TerminateFailed => 500,
            ErrorCode::HealthCheckUnreachable => 502,
            ErrorCode::Timeout => 504,
            ErrorCode::InvalidRequest => 400,
            ErrorCode::Busy => 409,
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// CLI exit codes.
pub mod exit_code {
    /// Success
    pub const SUCCESS: i32 = 0;
    /// General error
    pub const GENERAL_ERROR: i32 = 1;
    /// Configuration error
    pub const CONFIG_ERROR: i32 = 2;
    /// Dependency graph is invalid
    pub const GRAPH_ERROR: i32 = 3;
    /// Timeout error
    pub const TIMEOUT_ERROR: i32 = 4;
    /// Some services did not start
    pub const PARTIAL_FAILURE: i32 = 5;
    /// Command line argument error
    pub const CLI_ERROR: i32 = 64;
}

/// The main error type for junban.
#[derive(Debug, Error)]
pub enum JunbanError {
    /// Configuration is invalid or cannot be loaded.
    #[error("Configuration error: {message}")]
    Config {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Service does not exist.
    #[error("Service not found: {service}")]
    ServiceNotFound { service: String },

    /// Profile does not exist.
    #[error("Profile not found: {profile}")]
    ProfileNotFound { profile: String },

    /// The effective dependency graph contains a cycle of blocking edges.
    #[error("Dependency cycle detected: {}", format_cycle(.path))]
    CycleDetected { path: Vec<String> },

    /// A dependency did not reach its readiness condition in time.
    #[error("Dependency timeout: {service} waited {seconds}s for {dependency}")]
    DependencyTimeout {
        service: String,
        dependency: String,
        seconds: u64,
    },

    /// The process controller failed to launch a service.
    #[error("Launch failed for {service}: {message}")]
    Launch {
        service: String,
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// The process controller failed to terminate a service.
    #[error("Terminate failed for {service}: {message}")]
    Terminate {
        service: String,
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// A health endpoint could not be reached.
    #[error("Health check unreachable for {service}: {message}")]
    HealthCheckUnreachable { service: String, message: String },

    /// Operation timed out.
    #[error("Timeout: {operation} (waited {seconds}s)")]
    Timeout { operation: String, seconds: u64 },

    /// Request is invalid.
    #[error("Invalid request: {message}")]
    InvalidRequest { message: String },

    /// A start run is already in progress.
    #[error("Orchestrator is busy: {reason}")]
    Busy { reason: String },

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML parsing error.
    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// JSON parsing error.
    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),
}

fn format_cycle(path: &[String]) -> String {
    match path.first() {
        Some(first) => format!("{} -> {}", path.join(" -> "), first),
        None => "<empty>".to_string(),
    }
}

impl JunbanError {
    /// Returns the error code for this error.
    pub fn code(&self) -> ErrorCode {
        match self {
            JunbanError::Config { .. } => ErrorCode::ConfigInvalid,
            JunbanError::ServiceNotFound { .. } => ErrorCode::ServiceNotFound,
            JunbanError::ProfileNotFound { .. } => ErrorCode::ProfileNotFound,
            JunbanError::CycleDetected { .. } => ErrorCode::CycleDetected,
            JunbanError::DependencyTimeout { .. } => ErrorCode::DependencyTimeout,
            JunbanError::Launch { .. } => ErrorCode::LaunchFailed,
            JunbanError::Terminate { .. } => ErrorCode::TerminateFailed,
            JunbanError::HealthCheckUnreachable { .. } => ErrorCode::HealthCheckUnreachable,
            JunbanError::Timeout { .. } => ErrorCode::Timeout,
            JunbanError::InvalidRequest { .. } => ErrorCode::InvalidRequest,
            JunbanError::Busy { .. } => ErrorCode::Busy,
            JunbanError::Io(_) => ErrorCode::LaunchFailed,
            JunbanError::Yaml(_) => ErrorCode::ConfigInvalid,
            JunbanError::Json(_) => ErrorCode::InvalidRequest,
        }
    }

    /// Returns the CLI exit code for this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            JunbanError::Config { .. }
            | JunbanError::Yaml(_)
            | JunbanError::ProfileNotFound { .. } => exit_code::CONFIG_ERROR,
            JunbanError::CycleDetected { .. } => exit_code::GRAPH_ERROR,
            JunbanError::Timeout { .. } | JunbanError::DependencyTimeout { .. } => {
                exit_code::TIMEOUT_ERROR
            }
            _ => exit_code::GENERAL_ERROR,
        }
    }

    /// Creates a configuration error with a message.
    pub fn config(message: impl Into<String>) -> Self {
        JunbanError::Config {
            message: message.into(),
            source: None,
        }
    }

    /// Creates a configuration error with a message and source.
    pub fn config_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        JunbanError::Config {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Creates a launch error.
    pub fn launch(service: impl Into<String>, message: impl Into<String>) -> Self {
        JunbanError::Launch {
            service: service.into(),
            message: message.into(),
            source: None,
        }
    }

    /// Creates a launch error with a source.
    pub fn launch_with_source(
        service: impl Into<String>,
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        JunbanError::Launch {
            service: service.into(),
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Creates a terminate error.
    pub fn terminate(service: impl Into<String>, message: impl Into<String>) -> Self {
        JunbanError::Terminate {
            service: service.into(),
            message: message.into(),
            source: None,
        }
    }

    /// Creates a terminate error with a source.
    pub fn terminate_with_source(
        service: impl Into<String>,
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        JunbanError::Terminate {
            service: service.into(),
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Creates an unreachable health check error.
    pub fn unreachable(service: impl Into<String>, message: impl Into<String>) -> Self {
        JunbanError::HealthCheckUnreachable {
            service: service.into(),
            message: message.into(),
        }
    }

    /// Creates a service-not-found error.
    pub fn service_not_found(service: impl Into<String>) -> Self {
        JunbanError::ServiceNotFound {
            service: service.into(),
        }
    }

    /// Creates an invalid request error.
    pub fn invalid_request(message: impl Into<String>) -> Self {
        JunbanError::InvalidRequest {
            message: message.into(),
        }
    }
}

/// Error details for API responses.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorDetails {
    /// Additional context fields.
    #[serde(flatten)]
    pub fields: HashMap<String, serde_json::Value>,
}

impl ErrorDetails {
    /// Creates empty error details.
    pub fn new() -> Self {
        Self {
            fields: HashMap::new(),
        }
    }

    /// Adds a field to the error details.
    pub fn with_field(
        mut self,
        key: impl Into<String>,
        value: impl Into<serde_json::Value>,
    ) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }
}

impl Default for ErrorDetails {
    fn default() -> Self {
        Self::new()
    }
}

/// Error response structure for the API.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Error code (e.g., "E001").
    pub code: ErrorCode,

    /// Human-readable error message.
    pub message: String,

    /// Additional error details.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<ErrorDetails>,
}

impl ErrorResponse {
    /// Creates a new error response.
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            details: None,
        }
    }

    /// Creates an error response from a JunbanError.
    pub fn from_error(error: &JunbanError) -> Self {
        let code = error.code();
        let message = error.to_string();

        let details = match error {
            JunbanError::ServiceNotFound { service } => {
                Some(ErrorDetails::new().with_field("service", service.clone()))
            }
            JunbanError::ProfileNotFound { profile } => {
                Some(ErrorDetails::new().with_field("profile", profile.clone()))
            }
            JunbanError::CycleDetected { path } => Some(
                ErrorDetails::new()
                    .with_field("path", path.clone())
                    .with_field(
                        "suggestion",
                        "Remove one hard dependency in the cycle or mark it soft",
                    ),
            ),
            JunbanError::DependencyTimeout {
                service,
                dependency,
                seconds,
            } => Some(
                ErrorDetails::new()
                    .with_field("service", service.clone())
                    .with_field("dependency", dependency.clone())
                    .with_field("timeout_seconds", *seconds),
            ),
            JunbanError::Timeout { operation, seconds } => Some(
                ErrorDetails::new()
                    .with_field("operation", operation.clone())
                    .with_field("timeout_seconds", *seconds),
            ),
            _ => None,
        };

        Self {
            code,
            message,
            details,
        }
    }
}

/// Result type alias for junban operations.
pub type Result<T> = std::result::Result<T, JunbanError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code_as_str() {
        assert_eq!(ErrorCode::ConfigInvalid.as_str(), "E001");
        assert_eq!(ErrorCode::ServiceNotFound.as_str(), "E002");
        assert_eq!(ErrorCode::ProfileNotFound.as_str(), "E003");
        assert_eq!(ErrorCode::CycleDetected.as_str(), "E004");
        assert_eq!(ErrorCode::DependencyTimeout.as_str(), "E005");
        assert_eq!(ErrorCode::LaunchFailed.as_str(), "E006");
        assert_eq!(ErrorCode::TerminateFailed.as_str(), "E007");
        assert_eq!(ErrorCode::HealthCheckUnreachable.as_str(), "E008");
        assert_eq!(ErrorCode::Timeout.as_str(), "E009");
        assert_eq!(ErrorCode::InvalidRequest.as_str(), "E010");
        assert_eq!(ErrorCode::Busy.as_str(), "E011");
    }

    #[test]
    fn test_error_code_http_status() {
        assert_eq!(ErrorCode::ServiceNotFound.http_status(), 404);
        assert_eq!(ErrorCode::CycleDetected.http_status(), 422);
        assert_eq!(ErrorCode::InvalidRequest.http_status(), 400);
        assert_eq!(ErrorCode::Busy.http_status(), 409);
    }

    #[test]
    fn test_cycle_display_closes_the_loop() {
        let err = JunbanError::CycleDetected {
            path: vec!["a".to_string(), "b".to_string(), "c".to_string()],
        };
        assert_eq!(err.to_string(), "Dependency cycle detected: a -> b -> c -> a");
        assert_eq!(err.code(), ErrorCode::CycleDetected);
        assert_eq!(err.exit_code(), exit_code::GRAPH_ERROR);
    }

    #[test]
    fn test_exit_codes() {
        assert_eq!(
            JunbanError::config("bad").exit_code(),
            exit_code::CONFIG_ERROR
        );
        assert_eq!(
            JunbanError::ProfileNotFound {
                profile: "dev".to_string()
            }
            .exit_code(),
            exit_code::CONFIG_ERROR
        );
        assert_eq!(
            JunbanError::DependencyTimeout {
                service: "a".to_string(),
                dependency: "b".to_string(),
                seconds: 5,
            }
            .exit_code(),
            exit_code::TIMEOUT_ERROR
        );
        assert_eq!(
            JunbanError::launch("a", "boom").exit_code(),
            exit_code::GENERAL_ERROR
        );
    }

    #[test]
    fn test_error_response_from_cycle() {
        let err = JunbanError::CycleDetected {
            path: vec!["a".to_string(), "b".to_string()],
        };
        let response = ErrorResponse::from_error(&err);

        assert_eq!(response.code, ErrorCode::CycleDetected);
        let details = response.details.unwrap();
        assert_eq!(
            details.fields.get("path"),
            Some(&serde_json::json!(["a", "b"]))
        );
    }

    #[test]
    fn test_error_response_serialization() {
        let response = ErrorResponse::new(ErrorCode::ServiceNotFound, "Service not found: cache");
        let json = serde_json::to_string(&response).unwrap();

        assert!(json.contains("\"code\":\"E002\""));
        assert!(json.contains("Service not found: cache"));
    }

    #[test]
    fn test_error_display() {
        let err = JunbanError::DependencyTimeout {
            service: "gateway".to_string(),
            dependency: "registry".to_string(),
            seconds: 5,
        };
        assert_eq!(
            format!("{}", err),
            "Dependency timeout: gateway waited 5s for registry"
        );

        let err = JunbanError::launch("cache", "exit status 1");
        assert_eq!(format!("{}", err), "Launch failed for cache: exit status 1");
    }
}
