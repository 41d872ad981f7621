//! Readiness prober.
//!
//! Keeps one readiness cell per service. Each cell is written only by that
//! service's polling loop (plus [`ReadinessProber::release`]) and read by any
//! number of waiters through a `tokio::sync::watch` channel, so unrelated
//! services never contend on a shared lock while waiting.
//!
//! A polling loop runs while the service is tracked (the engine launched it)
//! or while at least one waiter is blocked on it. Concurrent waiters share
//! that single loop; its interval is the smallest one any of them asked for.
//! When a loop goes idle its cell falls back to `unknown`, so a later waiter
//! never accepts a reading that no running loop vouches for.

use crate::adapters::HealthChecker;
use crate::config::OrchestratorConfig;
use crate::model::{ReadinessState, ServiceId};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::{watch, Notify};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Interval sentinel: nobody asked for a specific interval.
const NO_INTERVAL: u64 = u64::MAX;

/// Prober tuning.
#[derive(Debug, Clone, Copy)]
pub struct ProberConfig {
    /// Lower bound for any polling interval.
    pub min_poll_interval: Duration,
    /// Interval used when no waiter asked for one.
    pub default_poll_interval: Duration,
}

impl Default for ProberConfig {
    fn default() -> Self {
        Self {
            min_poll_interval: Duration::from_millis(100),
            default_poll_interval: Duration::from_secs(5),
        }
    }
}

impl From<&OrchestratorConfig> for ProberConfig {
    fn from(config: &OrchestratorConfig) -> Self {
        Self {
            min_poll_interval: config.min_poll_interval(),
            default_poll_interval: Duration::from_secs(config.default_retry_interval_seconds),
        }
    }
}

/// Result of [`ReadinessProber::await_state`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct WaitOutcome {
    /// The wanted condition was reached before the timeout.
    pub satisfied: bool,
    /// Last state seen by the waiter.
    pub last_state: ReadinessState,
    /// Time spent waiting.
    pub elapsed: Duration,
}

struct ProbeCell {
    state: watch::Sender<ReadinessState>,
    interval_ms: AtomicU64,
    tracked: AtomicBool,
    waiters: AtomicUsize,
    wake: Notify,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl ProbeCell {
    fn new() -> Self {
        let (state, _) = watch::channel(ReadinessState::Unknown);
        Self {
            state,
            interval_ms: AtomicU64::new(NO_INTERVAL),
            tracked: AtomicBool::new(false),
            waiters: AtomicUsize::new(0),
            wake: Notify::new(),
            task: Mutex::new(None),
        }
    }

    /// Publishes a state; returns true when it changed.
    fn publish(&self, next: ReadinessState) -> bool {
        self.state.send_if_modified(|current| {
            if *current == next {
                false
            } else {
                *current = next;
                true
            }
        })
    }

    fn request_interval(&self, interval: Duration) {
        let ms = u64::try_from(interval.as_millis()).unwrap_or(NO_INTERVAL - 1);
        let previous = self.interval_ms.fetch_min(ms, Ordering::SeqCst);
        // Wake a sleeping loop so a shorter interval applies right away.
        if previous != NO_INTERVAL && ms < previous {
            self.wake.notify_one();
        }
    }

    fn interval(&self, fallback: Duration) -> Duration {
        match self.interval_ms.load(Ordering::SeqCst) {
            NO_INTERVAL => fallback,
            ms => Duration::from_millis(ms),
        }
    }

    fn wanted(&self) -> bool {
        self.tracked.load(Ordering::SeqCst) || self.waiters.load(Ordering::SeqCst) > 0
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

/// Registered waiter; keeps the polling loop alive until dropped.
struct Waiter {
    cell: Arc<ProbeCell>,
}

impl Drop for Waiter {
    fn drop(&mut self) {
        self.cell.waiters.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Shared, per-service readiness polling.
#[derive(Clone)]
pub struct ReadinessProber {
    checker: Arc<dyn HealthChecker>,
    cells: Arc<Mutex<HashMap<ServiceId, Arc<ProbeCell>>>>,
    config: ProberConfig,
    shutdown: CancellationToken,
}

impl ReadinessProber {
    pub fn new(checker: Arc<dyn HealthChecker>, config: ProberConfig) -> Self {
        Self {
            checker,
            cells: Arc::new(Mutex::new(HashMap::new())),
            config,
            shutdown: CancellationToken::new(),
        }
    }

    pub fn config(&self) -> &ProberConfig {
        &self.config
    }

    /// Non-blocking snapshot of a service's readiness.
    pub fn observe(&self, service: &str) -> ReadinessState {
        lock(&self.cells)
            .get(service)
            .map(|cell| *cell.state.borrow())
            .unwrap_or_default()
    }

    /// Subscribes to readiness changes of a service.
    pub fn subscribe(&self, service: &str) -> watch::Receiver<ReadinessState> {
        self.cell(service).state.subscribe()
    }

    /// Readiness of every service the prober has seen.
    pub fn snapshot(&self) -> BTreeMap<ServiceId, ReadinessState> {
        lock(&self.cells)
            .iter()
            .map(|(id, cell)| (id.clone(), *cell.state.borrow()))
            .collect()
    }

    /// Starts (or joins) polling a launched service until it is released.
    pub fn track(&self, service: &str, interval: Duration) {
        let cell = self.cell(service);
        cell.tracked.store(true, Ordering::SeqCst);
        cell.request_interval(self.floor(interval));
        self.ensure_polling(service, &cell);
    }

    /// Stops polling a service on behalf of the engine and marks it stopped.
    ///
    /// Waiters still blocked on the service keep the loop alive.
    pub fn release(&self, service: &str) {
        let Some(cell) = lock(&self.cells).get(service).cloned() else {
            return;
        };

        cell.tracked.store(false, Ordering::SeqCst);
        {
            let mut task = lock(&cell.task);
            if cell.waiters.load(Ordering::SeqCst) == 0 {
                if let Some(handle) = task.take() {
                    handle.abort();
                }
                cell.interval_ms.store(NO_INTERVAL, Ordering::SeqCst);
            }
        }
        cell.publish(ReadinessState::Stopped);
        debug!(service = service, "Readiness polling released");
    }

    /// Waits until `service` is healthy (or merely running when
    /// `want_healthy` is false), polling at `interval`, for at most
    /// `timeout` of wall-clock time.
    ///
    /// A zero timeout runs a single health check and answers from it.
    pub async fn await_state(
        &self,
        service: &str,
        want_healthy: bool,
        timeout: Duration,
        interval: Duration,
    ) -> WaitOutcome {
        let started = Instant::now();

        if timeout.is_zero() {
            let state = check(self.checker.as_ref(), service).await;
            return WaitOutcome {
                satisfied: state.satisfies(want_healthy),
                last_state: state,
                elapsed: started.elapsed(),
            };
        }

        let cell = self.cell(service);
        let mut rx = cell.state.subscribe();

        let mut last = *rx.borrow_and_update();
        if last.satisfies(want_healthy) {
            return WaitOutcome {
                satisfied: true,
                last_state: last,
                elapsed: started.elapsed(),
            };
        }

        let _waiter = self.join(service, &cell, interval);
        let deadline = started + timeout;

        loop {
            tokio::select! {
                changed = rx.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    last = *rx.borrow_and_update();
                    if last.satisfies(want_healthy) {
                        return WaitOutcome {
                            satisfied: true,
                            last_state: last,
                            elapsed: started.elapsed(),
                        };
                    }
                }
                _ = tokio::time::sleep_until(deadline) => break,
            }
        }

        WaitOutcome {
            satisfied: false,
            last_state: last,
            elapsed: started.elapsed(),
        }
    }

    /// Stops every polling loop.
    pub fn shutdown(&self) {
        self.shutdown.cancel();
        for cell in lock(&self.cells).values() {
            if let Some(handle) = lock(&cell.task).take() {
                handle.abort();
                cell.publish(ReadinessState::Unknown);
            }
        }
        info!("Readiness prober stopped");
    }

    fn cell(&self, service: &str) -> Arc<ProbeCell> {
        lock(&self.cells)
            .entry(service.to_string())
            .or_insert_with(|| Arc::new(ProbeCell::new()))
            .clone()
    }

    fn floor(&self, interval: Duration) -> Duration {
        interval.max(self.config.min_poll_interval)
    }

    fn join(&self, service: &str, cell: &Arc<ProbeCell>, interval: Duration) -> Waiter {
        cell.waiters.fetch_add(1, Ordering::SeqCst);
        cell.request_interval(self.floor(interval));
        self.ensure_polling(service, cell);
        Waiter { cell: cell.clone() }
    }

    fn ensure_polling(&self, service: &str, cell: &Arc<ProbeCell>) {
        if self.shutdown.is_cancelled() {
            return;
        }

        let mut task = lock(&cell.task);
        if task.as_ref().is_some_and(|handle| !handle.is_finished()) {
            return;
        }

        *task = Some(tokio::spawn(poll_loop(
            service.to_string(),
            cell.clone(),
            self.checker.clone(),
            self.config.default_poll_interval,
            self.shutdown.clone(),
        )));
    }
}

/// One health check; checker errors fold into `unhealthy`.
async fn check(checker: &dyn HealthChecker, service: &str) -> ReadinessState {
    match checker.check(service).await {
        Ok(state) => state,
        Err(e) => {
            debug!(service = %service, error = %e, "Health check failed, treating as unhealthy");
            ReadinessState::Unhealthy
        }
    }
}

async fn poll_loop(
    service: ServiceId,
    cell: Arc<ProbeCell>,
    checker: Arc<dyn HealthChecker>,
    fallback: Duration,
    shutdown: CancellationToken,
) {
    debug!(service = %service, "Readiness polling started");

    loop {
        let state = tokio::select! {
            _ = shutdown.cancelled() => return,
            state = check(checker.as_ref(), &service) => state,
        };

        if cell.publish(state) {
            debug!(service = %service, state = %state, "Readiness changed");
        }

        tokio::select! {
            _ = shutdown.cancelled() => return,
            _ = cell.wake.notified() => {}
            _ = tokio::time::sleep(cell.interval(fallback)) => {}
        }

        let keep_polling = {
            let mut task = lock(&cell.task);
            if cell.wanted() {
                true
            } else {
                *task = None;
                cell.interval_ms.store(NO_INTERVAL, Ordering::SeqCst);
                cell.publish(ReadinessState::Unknown);
                false
            }
        };

        if !keep_polling {
            debug!(service = %service, "Readiness polling idle, stopping");
            return;
        }
    }
}
