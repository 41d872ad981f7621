//! Process controller and health checker adapters.
//!
//! The orchestrator never starts processes or probes endpoints itself.
//! It talks to a [`ProcessController`] and a [`HealthChecker`], so the
//! same engine drives shell commands in production and scripted mocks in
//! tests.

mod command;
pub mod exec;
pub mod health;


pub use exec::ExecController;
pub use health::ServiceHealthChecker;

use crate::error::Result;
use crate::model::ReadinessState;
use async_trait::async_trait;

/// Starts and stops services.
///
/// `launch` returns once the launch has been initiated; readiness is
/// observed through the [`HealthChecker`]. `terminate` must be safe to call
/// on a service that is already stopped.
#[async_trait]
pub trait ProcessController: Send + Sync {
    /// Returns the controller name (e.g., "exec").
    fn name(&self) -> &'static str;

    /// Initiates the launch of a service.
    async fn launch(&self, service: &str) -> Result<()>;

    /// Stops a service.
    async fn terminate(&self, service: &str) -> Result<()>;
}

/// Reports the readiness of a single service.
#[async_trait]
pub trait HealthChecker: Send + Sync {
    /// Checks a service once.
    ///
    /// An `Err` means the check itself could not complete (for example an
    /// unreachable endpoint); the prober treats it as `unhealthy`.
    async fn check(&self, service: &str) -> Result<ReadinessState>;
}
