//! Exec process controller.
//!
//! Runs the `start` and `stop` commands declared for each service. Start
//! commands are expected to return once the service has been spawned
//! (for example `docker compose up -d` or a script that backgrounds the
//! process); readiness is observed separately by the health checker.

use crate::adapters::command;
use crate::adapters::ProcessController;
use crate::config::{Config, ServiceDefinition};
use crate::error::{JunbanError, Result};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::{debug, error, info};

/// Process controller backed by per-service shell commands.
pub struct ExecController {
    services: BTreeMap<String, ServiceDefinition>,
    default_timeout: Duration,
}

impl ExecController {
    /// Creates a controller over the given definitions.
    pub fn new(services: BTreeMap<String, ServiceDefinition>, default_timeout: Duration) -> Self {
        Self {
            services,
            default_timeout,
        }
    }

    /// Creates a controller from the loaded configuration.
    pub fn from_config(config: &Config) -> Self {
        Self::new(
            config.services.clone(),
            Duration::from_secs(config.orchestrator.launch_timeout_seconds),
        )
    }

    fn get_service(&self, name: &str) -> Result<&ServiceDefinition> {
        self.services
            .get(name)
            .ok_or_else(|| JunbanError::service_not_found(name))
    }

    fn timeout_for(&self, definition: &ServiceDefinition) -> Duration {
        definition
            .timeout
            .map(Duration::from_secs)
            .unwrap_or(self.default_timeout)
    }

    /// Runs the status command, if any; `None` when liveness is unknown.
    async fn is_running(&self, service: &str, definition: &ServiceDefinition) -> Option<bool> {
        let status = definition.status.as_deref()?;
        match command::run(service, status, definition, self.timeout_for(definition)).await {
            Ok(out) => Some(out.success),
            Err(e) => {
                debug!(service = service, error = %e, "Status command failed");
                None
            }
        }
    }
}

#[async_trait]
impl ProcessController for ExecController {
    fn name(&self) -> &'static str {
        "exec"
    }

    async fn launch(&self, service: &str) -> Result<()> {
        let definition = self.get_service(service)?;
        let start = definition
            .start
            .as_deref()
            .ok_or_else(|| JunbanError::launch(service, "no start command configured"))?;

        if self.is_running(service, definition).await == Some(true) {
            info!(service = service, "Service is already running");
            return Ok(());
        }

        info!(service = service, "Starting service");
        let out = command::run(service, start, definition, self.timeout_for(definition))
            .await
            .map_err(|e| JunbanError::launch_with_source(service, "start command failed", e))?;

        if !out.success {
            error!(service = service, output = %out.output, "Failed to start service");
            return Err(JunbanError::launch(
                service,
                format!("start command exited with failure: {}", out.output),
            ));
        }

        Ok(())
    }

    async fn terminate(&self, service: &str) -> Result<()> {
        let definition = self.get_service(service)?;
        let Some(stop) = definition.stop.as_deref() else {
            debug!(service = service, "No stop command configured");
            return Ok(());
        };

        if self.is_running(service, definition).await == Some(false) {
            info!(service = service, "Service is already stopped");
            return Ok(());
        }

        info!(service = service, "Stopping service");
        let out = command::run(service, stop, definition, self.timeout_for(definition))
            .await
            .map_err(|e| JunbanError::terminate_with_source(service, "stop command failed", e))?;

        if !out.success {
            error!(service = service, output = %out.output, "Failed to stop service");
            return Err(JunbanError::terminate(
                service,
                format!("stop command exited with failure: {}", out.output),
            ));
        }

        Ok(())
    }
}
