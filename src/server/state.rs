//! Application state management.
//!
//! This module wires the store, resolver, prober and orchestrator shared
//! across HTTP request handlers.

use crate::adapters::{ExecController, HealthChecker, ProcessController, ServiceHealthChecker};
use crate::config::Config;
use crate::engine::Orchestrator;
use crate::error::Result;
use crate::prober::{ProberConfig, ReadinessProber};
use crate::reporter::{FanoutReporter, RecordingReporter, TracingReporter};
use crate::resolver::{GraphResolver, ResolvedOrder};
use crate::store::{ConfigStore, YamlStore};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// Shared application state.
pub struct AppState {
    /// Loaded configuration.
    pub config: Arc<Config>,
    /// Graph resolver over the configured store.
    pub resolver: GraphResolver,
    /// Start/stop engine.
    pub orchestrator: Arc<Orchestrator>,
    /// Recent transition events.
    pub history: Arc<RecordingReporter>,
    /// Application start time.
    pub start_time: Instant,
    /// Host name reported by the status endpoint.
    pub host_name: String,
    /// Statistics counters.
    pub stats: Stats,
}

impl AppState {
    /// Creates the application state from configuration, using the exec
    /// controller and the command/HTTP health checker.
    pub fn new(config: Config) -> Self {
        let controller = Arc::new(ExecController::from_config(&config));
        let checker = Arc::new(ServiceHealthChecker::from_config(&config));
        let config = Arc::new(config);
        let store = Arc::new(YamlStore::new(config.clone()));
        Self::with_parts(config, store, controller, checker)
    }

    /// Creates the application state from explicit collaborators.
    pub fn with_parts(
        config: Arc<Config>,
        store: Arc<dyn ConfigStore>,
        controller: Arc<dyn ProcessController>,
        checker: Arc<dyn HealthChecker>,
    ) -> Self {
        let history = Arc::new(RecordingReporter::new(config.server.event_history));
        let reporter = FanoutReporter::default()
            .with(Arc::new(TracingReporter))
            .with(history.clone());
        let prober = ReadinessProber::new(checker, ProberConfig::from(&config.orchestrator));
        let orchestrator = Arc::new(Orchestrator::new(controller, prober, Arc::new(reporter)));

        Self {
            resolver: GraphResolver::new(store),
            orchestrator,
            history,
            start_time: Instant::now(),
            host_name: config.host_name(),
            config,
            stats: Stats::default(),
        }
    }

    /// Profile used when a request names none.
    pub fn active_profile(&self) -> Option<&str> {
        self.config.active_profile.as_deref()
    }

    /// Resolves the startup order for `profile`, or the active profile.
    pub async fn plan(&self, profile: Option<&str>) -> Result<ResolvedOrder> {
        self.resolver
            .resolve_for_profile(profile.or(self.active_profile()))
            .await
    }

    /// Returns the uptime in seconds.
    pub fn uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }

    /// Increments the total request counter.
    pub fn increment_requests(&self) {
        self.stats.requests_total.fetch_add(1, Ordering::Relaxed);
    }

    /// Increments the successful request counter.
    pub fn increment_success(&self) {
        self.stats.requests_success.fetch_add(1, Ordering::Relaxed);
    }

    /// Increments the failed request counter.
    pub fn increment_failed(&self) {
        self.stats.requests_failed.fetch_add(1, Ordering::Relaxed);
    }
}

/// Statistics counters.
#[derive(Default)]
pub struct Stats {
    /// Total requests received.
    pub requests_total: AtomicU64,
    /// Successful requests.
    pub requests_success: AtomicU64,
    /// Failed requests.
    pub requests_failed: AtomicU64,
}

impl Stats {
    /// Gets the current statistics as a snapshot.
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            requests_total: self.requests_total.load(Ordering::Relaxed),
            requests_success: self.requests_success.load(Ordering::Relaxed),
            requests_failed: self.requests_failed.load(Ordering::Relaxed),
        }
    }
}

/// Snapshot of statistics counters.
#[derive(Debug, Clone, Default)]
pub struct StatsSnapshot {
    /// Total requests received.
    pub requests_total: u64,
    /// Successful requests.
    pub requests_success: u64,
    /// Failed requests.
    pub requests_failed: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_config() -> Config {
        Config::load_from_str(
            r#"
active_profile: dev
services:
  registry: { order: 1, start: "true", status: "true" }
  cache: { order: 2, start: "true", status: "true" }
dependencies:
  - { from: cache, to: registry }
profiles:
  dev: {}
"#,
        )
        .unwrap()
    }

    #[test]
    fn test_app_state_new() {
        let state = AppState::new(create_test_config());

        assert_eq!(state.active_profile(), Some("dev"));
        assert_eq!(state.config.server.port, 7878);
        assert!(state.orchestrator.active_operation().is_none());
    }

    #[tokio::test]
    async fn test_app_state_plan() {
        let state = AppState::new(create_test_config());
        let plan = state.plan(None).await.unwrap();

        assert_eq!(plan.profile.as_deref(), Some("dev"));
        assert_eq!(plan.order, vec!["registry", "cache"]);
    }

    #[test]
    fn test_app_state_uptime() {
        let state = AppState::new(create_test_config());

        // Uptime should be very small right after creation
        assert!(state.uptime_seconds() < 1);
    }

    #[test]
    fn test_stats_increment() {
        let state = AppState::new(create_test_config());

        state.increment_requests();
        state.increment_requests();
        state.increment_success();
        state.increment_failed();

        let snapshot = state.stats.snapshot();
        assert_eq!(snapshot.requests_total, 2);
        assert_eq!(snapshot.requests_success, 1);
        assert_eq!(snapshot.requests_failed, 1);
    }
}
