//! Per-service engine states, transition events and run summaries.

use crate::model::ServiceId;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;

/// Engine-side status of a service.
///
/// Start: `Pending -> Waiting(dep)* -> Launching -> Started | Failed`, or
/// `Skipped` from any waiting state. Stop: `-> Stopping -> Stopped | Failed`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "dependency", rename_all = "lowercase")]
pub enum ServiceStatus {
    Pending,
    /// Blocked on the named dependency.
    Waiting(ServiceId),
    Launching,
    Started,
    Failed,
    Skipped,
    Stopping,
    Stopped,
}

impl ServiceStatus {
    /// Whether a start or stop run ends in this status.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ServiceStatus::Started
                | ServiceStatus::Failed
                | ServiceStatus::Skipped
                | ServiceStatus::Stopped
        )
    }
}

impl fmt::Display for ServiceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServiceStatus::Pending => write!(f, "pending"),
            ServiceStatus::Waiting(dep) => write!(f, "waiting({})", dep),
            ServiceStatus::Launching => write!(f, "launching"),
            ServiceStatus::Started => write!(f, "started"),
            ServiceStatus::Failed => write!(f, "failed"),
            ServiceStatus::Skipped => write!(f, "skipped"),
            ServiceStatus::Stopping => write!(f, "stopping"),
            ServiceStatus::Stopped => write!(f, "stopped"),
        }
    }
}

/// Why a transition happened.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TransitionReason {
    /// Normal progress of a start or stop request.
    Requested,
    /// A dependency did not become ready within its timeout.
    DependencyTimeout { dependency: ServiceId, seconds: u64 },
    /// A dependency failed to launch.
    DependencyFailed { dependency: ServiceId },
    /// A dependency was skipped, so it will never be ready.
    DependencyUnavailable { dependency: ServiceId },
    /// The process controller refused to launch the service.
    LaunchError { message: String },
    /// A stop request cancelled the wait.
    CancelledByStop,
    /// The process controller failed to stop the service.
    TerminateError { message: String },
}

impl fmt::Display for TransitionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransitionReason::Requested => write!(f, "requested"),
            TransitionReason::DependencyTimeout {
                dependency,
                seconds,
            } => write!(f, "{} not ready after {}s", dependency, seconds),
            TransitionReason::DependencyFailed { dependency } => {
                write!(f, "{} failed", dependency)
            }
            TransitionReason::DependencyUnavailable { dependency } => {
                write!(f, "{} was skipped", dependency)
            }
            TransitionReason::LaunchError { message } => write!(f, "launch error: {}", message),
            TransitionReason::CancelledByStop => write!(f, "cancelled by stop"),
            TransitionReason::TerminateError { message } => {
                write!(f, "terminate error: {}", message)
            }
        }
    }
}

/// One state change of one service.
#[derive(Debug, Clone, Serialize)]
pub struct TransitionEvent {
    pub service_id: ServiceId,
    pub from: ServiceStatus,
    pub to: ServiceStatus,
    pub reason: TransitionReason,
    pub timestamp: DateTime<Utc>,
}

impl TransitionEvent {
    pub fn new(
        service_id: impl Into<ServiceId>,
        from: ServiceStatus,
        to: ServiceStatus,
        reason: TransitionReason,
    ) -> Self {
        Self {
            service_id: service_id.into(),
            from,
            to,
            reason,
            timestamp: Utc::now(),
        }
    }
}

/// Terminal result of one service in a start run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServiceOutcome {
    pub service_id: ServiceId,
    pub status: ServiceStatus,
    pub reason: TransitionReason,
}

/// Result of a start run, in resolved order.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunSummary {
    pub outcomes: Vec<ServiceOutcome>,
    pub elapsed_ms: u64,
}

impl RunSummary {
    fn count(&self, status: &ServiceStatus) -> usize {
        self.outcomes.iter().filter(|o| &o.status == status).count()
    }

    pub fn started(&self) -> usize {
        self.count(&ServiceStatus::Started)
    }

    pub fn failed(&self) -> usize {
        self.count(&ServiceStatus::Failed)
    }

    pub fn skipped(&self) -> usize {
        self.count(&ServiceStatus::Skipped)
    }

    /// Every service started.
    pub fn is_success(&self) -> bool {
        self.started() == self.outcomes.len()
    }

    /// Outcome for a single service.
    pub fn outcome(&self, service: &str) -> Option<&ServiceOutcome> {
        self.outcomes.iter().find(|o| o.service_id == service)
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} started, {} failed, {} skipped",
            self.started(),
            self.failed(),
            self.skipped()
        )
    }
}

/// Result of a stop run, in shutdown order.
#[derive(Debug, Clone, Default, Serialize)]
pub struct StopSummary {
    pub stopped: Vec<ServiceId>,
    pub failed: Vec<(ServiceId, String)>,
}

impl StopSummary {
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }
}

impl fmt::Display for StopSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} stopped, {} failed", self.stopped.len(), self.failed.len())
    }
}
