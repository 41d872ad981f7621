//! Per-service start worker.

use crate::engine::{Shared, ServiceOutcome, ServiceStatus, TransitionReason};
use crate::model::{DependencyEdge, ServiceId};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Terminal status of a worker, published to its dependents.
pub(crate) type OutcomeCell = watch::Sender<Option<ServiceStatus>>;

enum EdgeResult {
    Satisfied,
    Unsatisfied(TransitionReason),
    Cancelled,
}

/// Drives one service from `Pending` to a terminal start status.
pub(crate) struct Worker {
    pub shared: Arc<Shared>,
    pub service: ServiceId,
    pub edges: Vec<DependencyEdge>,
    /// Outcome cells of dependencies launched in the same run.
    pub upstream: HashMap<ServiceId, watch::Receiver<Option<ServiceStatus>>>,
    pub outcome: Option<OutcomeCell>,
    pub poll_interval: Duration,
    pub cancel: CancellationToken,
}

impl Worker {
    pub async fn run(self) -> ServiceOutcome {
        let outcome = self.drive().await;
        if let Some(cell) = &self.outcome {
            cell.send_replace(Some(outcome.status.clone()));
        }
        outcome
    }

    async fn drive(&self) -> ServiceOutcome {
        for edge in &self.edges {
            if edge.is_soft() {
                let state = self.shared.prober.observe(&edge.to);
                if !state.satisfies(edge.health_check_required) {
                    warn!(
                        service = %self.service,
                        dependency = %edge.to,
                        state = %state,
                        "Soft dependency not ready, starting anyway"
                    );
                }
                continue;
            }

            self.shared.transition(
                &self.service,
                ServiceStatus::Waiting(edge.to.clone()),
                TransitionReason::Requested,
            );

            match self.wait_for(edge).await {
                EdgeResult::Satisfied => {
                    debug!(service = %self.service, dependency = %edge.to, "Dependency satisfied");
                }
                EdgeResult::Cancelled => {
                    return self.finish(ServiceStatus::Skipped, TransitionReason::CancelledByStop);
                }
                EdgeResult::Unsatisfied(reason) if edge.required => {
                    return self.finish(ServiceStatus::Skipped, reason);
                }
                EdgeResult::Unsatisfied(reason) => {
                    warn!(
                        service = %self.service,
                        dependency = %edge.to,
                        reason = %reason,
                        "Optional dependency not satisfied, starting anyway"
                    );
                }
            }
        }

        if self.cancel.is_cancelled() {
            return self.finish(ServiceStatus::Skipped, TransitionReason::CancelledByStop);
        }

        self.shared.transition(
            &self.service,
            ServiceStatus::Launching,
            TransitionReason::Requested,
        );
        debug!(
            service = %self.service,
            controller = self.shared.controller.name(),
            "Launching service"
        );

        match self.shared.controller.launch(&self.service).await {
            Ok(()) => {
                self.shared.prober.track(&self.service, self.poll_interval);
                self.finish(ServiceStatus::Started, TransitionReason::Requested)
            }
            Err(e) => self.finish(
                ServiceStatus::Failed,
                TransitionReason::LaunchError {
                    message: e.to_string(),
                },
            ),
        }
    }

    /// Waits on one hard edge.
    ///
    /// A dependency started in the same run is first awaited until its
    /// worker finishes; only then does the readiness budget start.
    async fn wait_for(&self, edge: &DependencyEdge) -> EdgeResult {
        if let Some(rx) = self.upstream.get(&edge.to) {
            let mut rx = rx.clone();
            let settled = tokio::select! {
                _ = self.cancel.cancelled() => return EdgeResult::Cancelled,
                result = rx.wait_for(Option::is_some) => result.ok().and_then(|s| s.clone()),
            };

            let dependency = edge.to.clone();
            match settled {
                Some(ServiceStatus::Started) => {}
                Some(ServiceStatus::Failed) => {
                    return EdgeResult::Unsatisfied(TransitionReason::DependencyFailed {
                        dependency,
                    })
                }
                _ => {
                    return EdgeResult::Unsatisfied(TransitionReason::DependencyUnavailable {
                        dependency,
                    })
                }
            }
        }

        let outcome = tokio::select! {
            _ = self.cancel.cancelled() => return EdgeResult::Cancelled,
            outcome = self.shared.prober.await_state(
                &edge.to,
                edge.health_check_required,
                Duration::from_secs(edge.timeout_seconds),
                Duration::from_secs(edge.retry_interval_seconds),
            ) => outcome,
        };

        if outcome.satisfied {
            EdgeResult::Satisfied
        } else {
            debug!(
                service = %self.service,
                dependency = %edge.to,
                last_state = %outcome.last_state,
                elapsed_ms = outcome.elapsed.as_millis() as u64,
                "Dependency wait timed out"
            );
            EdgeResult::Unsatisfied(TransitionReason::DependencyTimeout {
                dependency: edge.to.clone(),
                seconds: edge.timeout_seconds,
            })
        }
    }

    fn finish(&self, status: ServiceStatus, reason: TransitionReason) -> ServiceOutcome {
        self.shared
            .transition(&self.service, status.clone(), reason.clone());
        ServiceOutcome {
            service_id: self.service.clone(),
            status,
            reason,
        }
    }
}
