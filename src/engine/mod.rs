//! Orchestration engine.
//!
//! [`Orchestrator::start_all`] spawns one worker per service in the resolved
//! order. A worker waits on each hard edge of its service, then launches it
//! through the [`ProcessController`] and hands it to the prober so that
//! dependents can unblock as soon as it turns ready. Services without a
//! dependency relationship start concurrently.
//!
//! [`Orchestrator::stop_all`] cancels a run in progress, waits for its
//! workers to settle, then terminates every service in reverse order.

mod state;
mod worker;


pub use state::{
    RunSummary, ServiceOutcome, ServiceStatus, StopSummary, TransitionEvent, TransitionReason,
};

use crate::adapters::ProcessController;
use crate::error::{JunbanError, Result};
use crate::model::ServiceId;
use crate::prober::ReadinessProber;
use crate::reporter::ResultReporter;
use crate::resolver::ResolvedOrder;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use worker::Worker;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

/// State shared between the orchestrator and its workers.
pub(crate) struct Shared {
    pub controller: Arc<dyn ProcessController>,
    pub prober: ReadinessProber,
    reporter: Arc<dyn ResultReporter>,
    statuses: Mutex<BTreeMap<ServiceId, ServiceStatus>>,
}

impl Shared {
    /// Records a transition and reports it.
    pub fn transition(&self, service: &str, to: ServiceStatus, reason: TransitionReason) {
        let from = lock(&self.statuses)
            .insert(service.to_string(), to.clone())
            .unwrap_or(ServiceStatus::Pending);
        if from == to {
            return;
        }

        debug!(service = service, from = %from, to = %to, reason = %reason, "Transition");
        self.reporter
            .report(TransitionEvent::new(service, from, to, reason));
    }

    async fn stop_service(&self, service: &str) -> Result<()> {
        self.transition(service, ServiceStatus::Stopping, TransitionReason::Requested);

        match self.controller.terminate(service).await {
            Ok(()) => {
                self.prober.release(service);
                self.transition(service, ServiceStatus::Stopped, TransitionReason::Requested);
                Ok(())
            }
            Err(e) => {
                self.transition(
                    service,
                    ServiceStatus::Failed,
                    TransitionReason::TerminateError {
                        message: e.to_string(),
                    },
                );
                Err(e)
            }
        }
    }
}

/// A start run (or single-service operation) in progress.
struct ActiveRun {
    operation: String,
    cancel: CancellationToken,
    done: watch::Receiver<bool>,
}

/// Clears the active run slot when the operation ends.
struct RunGuard<'a> {
    slot: &'a Mutex<Option<ActiveRun>>,
    done: watch::Sender<bool>,
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        lock(self.slot).take();
        self.done.send_replace(true);
    }
}

/// Starts and stops a resolved order of services.
pub struct Orchestrator {
    shared: Arc<Shared>,
    active: Mutex<Option<ActiveRun>>,
}

impl Orchestrator {
    pub fn new(
        controller: Arc<dyn ProcessController>,
        prober: ReadinessProber,
        reporter: Arc<dyn ResultReporter>,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                controller,
                prober,
                reporter,
                statuses: Mutex::new(BTreeMap::new()),
            }),
            active: Mutex::new(None),
        }
    }

    /// The prober shared with the workers.
    pub fn prober(&self) -> &ReadinessProber {
        &self.shared.prober
    }

    /// Last known engine status of every service touched so far.
    pub fn statuses(&self) -> BTreeMap<ServiceId, ServiceStatus> {
        lock(&self.shared.statuses).clone()
    }

    /// Name of the operation in progress, if any.
    pub fn active_operation(&self) -> Option<String> {
        lock(&self.active).as_ref().map(|run| run.operation.clone())
    }

    fn claim(&self, operation: String) -> Result<(CancellationToken, RunGuard<'_>)> {
        let mut slot = lock(&self.active);
        if let Some(run) = slot.as_ref() {
            return Err(JunbanError::Busy {
                reason: format!("{} is in progress", run.operation),
            });
        }

        let cancel = CancellationToken::new();
        let (done_tx, done_rx) = watch::channel(false);
        *slot = Some(ActiveRun {
            operation,
            cancel: cancel.clone(),
            done: done_rx,
        });

        Ok((
            cancel,
            RunGuard {
                slot: &self.active,
                done: done_tx,
            },
        ))
    }

    fn worker(
        &self,
        plan: &ResolvedOrder,
        service: &str,
        cancel: &CancellationToken,
    ) -> Worker {
        Worker {
            shared: self.shared.clone(),
            service: service.to_string(),
            edges: plan.dependencies_of(service).to_vec(),
            upstream: HashMap::new(),
            outcome: None,
            poll_interval: self.poll_interval_for(plan, service),
            cancel: cancel.clone(),
        }
    }

    /// Smallest retry interval any dependent asked for.
    fn poll_interval_for(&self, plan: &ResolvedOrder, service: &str) -> Duration {
        plan.edges
            .values()
            .flatten()
            .filter(|e| e.to == service)
            .map(|e| Duration::from_secs(e.retry_interval_seconds))
            .min()
            .unwrap_or(self.shared.prober.config().default_poll_interval)
    }

    /// Starts every service of `plan`.
    ///
    /// Failures stay local to a service and its dependents; the run always
    /// completes and reports one outcome per service.
    pub async fn start_all(&self, plan: &ResolvedOrder) -> Result<RunSummary> {
        let (cancel, _guard) = self.claim("start".to_string())?;
        // Dropping this future cancels the workers still waiting.
        let _cancel_on_drop = cancel.clone().drop_guard();
        let started = Instant::now();

        info!(services = plan.len(), "Starting services");

        let mut outcomes: HashMap<&str, watch::Sender<Option<ServiceStatus>>> = HashMap::new();
        let mut watchers: HashMap<&str, watch::Receiver<Option<ServiceStatus>>> = HashMap::new();
        for id in &plan.order {
            let (tx, rx) = watch::channel(None);
            outcomes.insert(id.as_str(), tx);
            watchers.insert(id.as_str(), rx);
            self.shared
                .transition(id, ServiceStatus::Pending, TransitionReason::Requested);
        }

        let mut handles = Vec::with_capacity(plan.len());
        for id in &plan.order {
            let mut worker = self.worker(plan, id, &cancel);
            worker.upstream = worker
                .edges
                .iter()
                .filter(|e| e.is_waited_on())
                .filter_map(|e| watchers.get(e.to.as_str()).map(|rx| (e.to.clone(), rx.clone())))
                .collect();
            worker.outcome = outcomes.remove(id.as_str());

            handles.push((id.clone(), tokio::spawn(worker.run())));
        }

        let mut summary = RunSummary::default();
        for (id, handle) in handles {
            let outcome = match handle.await {
                Ok(outcome) => outcome,
                Err(e) => {
                    error!(service = %id, error = %e, "Start worker aborted");
                    let reason = TransitionReason::LaunchError {
                        message: format!("worker aborted: {}", e),
                    };
                    self.shared
                        .transition(&id, ServiceStatus::Failed, reason.clone());
                    ServiceOutcome {
                        service_id: id,
                        status: ServiceStatus::Failed,
                        reason,
                    }
                }
            };
            summary.outcomes.push(outcome);
        }
        summary.elapsed_ms = started.elapsed().as_millis() as u64;

        info!(
            started = summary.started(),
            failed = summary.failed(),
            skipped = summary.skipped(),
            elapsed_ms = summary.elapsed_ms,
            "Start run finished"
        );

        Ok(summary)
    }

    /// Stops every service of `plan` in reverse order.
    ///
    /// A run in progress is cancelled first: waiting services end `Skipped`
    /// and services mid-launch finish launching, then everything is stopped.
    /// A failure to stop one service does not prevent stopping the others.
    pub async fn stop_all(&self, plan: &ResolvedOrder) -> StopSummary {
        self.cancel_active().await;

        info!(services = plan.len(), "Stopping services");

        let mut summary = StopSummary::default();
        for id in plan.shutdown_order() {
            match self.shared.stop_service(id).await {
                Ok(()) => summary.stopped.push(id.clone()),
                Err(e) => {
                    warn!(service = %id, error = %e, "Failed to stop service, continuing");
                    summary.failed.push((id.clone(), e.to_string()));
                }
            }
        }

        info!(
            stopped = summary.stopped.len(),
            failed = summary.failed.len(),
            "Stop run finished"
        );
        summary
    }

    /// Cancels the operation in progress and waits until it has settled.
    async fn cancel_active(&self) {
        let running = lock(&self.active)
            .as_ref()
            .map(|run| (run.operation.clone(), run.cancel.clone(), run.done.clone()));

        if let Some((operation, cancel, mut done)) = running {
            info!(operation = %operation, "Cancelling operation in progress");
            cancel.cancel();
            let _ = done.wait_for(|finished| *finished).await;
        }
    }

    /// Starts one service, honouring its dependency waits.
    ///
    /// Dependencies are not started; they are only waited on.
    pub async fn start_one(&self, plan: &ResolvedOrder, service: &str) -> Result<ServiceOutcome> {
        if !plan.contains(service) {
            return Err(JunbanError::service_not_found(service));
        }

        let (cancel, _guard) = self.claim(format!("start {}", service))?;
        let _cancel_on_drop = cancel.clone().drop_guard();

        self.shared
            .transition(service, ServiceStatus::Pending, TransitionReason::Requested);
        Ok(self.worker(plan, service, &cancel).run().await)
    }

    /// Stops one service.
    pub async fn stop_one(&self, plan: &ResolvedOrder, service: &str) -> Result<()> {
        if !plan.contains(service) {
            return Err(JunbanError::service_not_found(service));
        }

        let (_cancel, _guard) = self.claim(format!("stop {}", service))?;
        self.shared.stop_service(service).await
    }

    /// Stops then starts one service.
    pub async fn restart_one(&self, plan: &ResolvedOrder, service: &str) -> Result<ServiceOutcome> {
        if !plan.contains(service) {
            return Err(JunbanError::service_not_found(service));
        }

        let (cancel, _guard) = self.claim(format!("restart {}", service))?;
        let _cancel_on_drop = cancel.clone().drop_guard();

        self.shared.stop_service(service).await?;
        self.shared
            .transition(service, ServiceStatus::Pending, TransitionReason::Requested);
        Ok(self.worker(plan, service, &cancel).run().await)
    }
}
