//! Health checker combining status commands and HTTP health endpoints.

use crate::adapters::command;
use crate::adapters::HealthChecker;
use crate::config::{Config, ServiceDefinition};
use crate::error::{JunbanError, Result};
use crate::model::ReadinessState;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::debug;

/// Checks liveness with the service's `status` command and health with a
/// GET on its `health_check_url`.
///
/// | status command | URL | result |
/// |---|---|---|
/// | exits non-zero | any | `stopped` |
/// | exits zero / none | 2xx | `healthy` |
/// | exits zero / none | other status | `unhealthy` |
/// | exits zero | unreachable | `HealthCheckUnreachable` error |
/// | none | unreachable | `unknown` |
/// | exits zero | none | `healthy` |
/// | none | none | `unknown` |
///
/// The `none | unreachable` row intentionally departs from the prober's
/// "failed check counts as unhealthy" rule: with no status command there
/// is no evidence the process exists, so a refused connection means the
/// service is not up yet rather than up and broken. Either way a gated
/// wait is not satisfied.
pub struct ServiceHealthChecker {
    services: BTreeMap<String, ServiceDefinition>,
    client: reqwest::Client,
    command_timeout: Duration,
}

impl ServiceHealthChecker {
    /// Creates a checker over the given definitions.
    pub fn new(
        services: BTreeMap<String, ServiceDefinition>,
        http_timeout: Duration,
        command_timeout: Duration,
    ) -> Self {
        let client = reqwest::Client::builder()
            .timeout(http_timeout)
            .build()
            .unwrap_or_default();

        Self {
            services,
            client,
            command_timeout,
        }
    }

    /// Creates a checker from the loaded configuration.
    pub fn from_config(config: &Config) -> Self {
        Self::new(
            config.services.clone(),
            Duration::from_secs(config.health.http_timeout_seconds),
            Duration::from_secs(config.health.command_timeout_seconds),
        )
    }

    async fn probe_url(&self, service: &str, url: &str) -> Result<ReadinessState> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| JunbanError::unreachable(service, e.to_string()))?;

        let status = response.status();
        debug!(service = service, url = url, status = %status, "Health endpoint responded");

        if status.is_success() {
            Ok(ReadinessState::Healthy)
        } else {
            Ok(ReadinessState::Unhealthy)
        }
    }
}

#[async_trait]
impl HealthChecker for ServiceHealthChecker {
    async fn check(&self, service: &str) -> Result<ReadinessState> {
        let Some(definition) = self.services.get(service) else {
            return Ok(ReadinessState::Unknown);
        };

        let running = match &definition.status {
            Some(status) => {
                let out = command::run(service, status, definition, self.command_timeout).await?;
                if !out.success {
                    return Ok(ReadinessState::Stopped);
                }
                true
            }
            None => false,
        };

        match (&definition.health_check_url, running) {
            (Some(url), true) => self.probe_url(service, url).await,
            (Some(url), false) => match self.probe_url(service, url).await {
                Err(JunbanError::HealthCheckUnreachable { .. }) => Ok(ReadinessState::Unknown),
                other => other,
            },
            (None, true) => Ok(ReadinessState::Healthy),
            (None, false) => Ok(ReadinessState::Unknown),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn checker(url: &str, status: Option<&str>) -> ServiceHealthChecker {
        let mut services = BTreeMap::new();
        services.insert(
            "api".to_string(),
            ServiceDefinition {
                health_check_url: Some(url.to_string()),
                status: status.map(str::to_string),
                ..Default::default()
            },
        );
        ServiceHealthChecker::new(services, Duration::from_secs(1), Duration::from_secs(5))
    }

    /// Serves a single fixed status code on an ephemeral port.
    async fn serve(status: axum::http::StatusCode) -> String {
        let app = axum::Router::new().route("/health", axum::routing::get(move || async move { status }));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}/health", addr)
    }

    /// A URL on a port nothing listens on.
    async fn closed_url() -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        format!("http://{}/health", addr)
    }

    #[tokio::test]
    async fn test_healthy_endpoint() {
        let url = serve(axum::http::StatusCode::OK).await;
        assert_eq!(
            checker(&url, None).check("api").await.unwrap(),
            ReadinessState::Healthy
        );
    }

    #[tokio::test]
    async fn test_unhealthy_endpoint() {
        let url = serve(axum::http::StatusCode::SERVICE_UNAVAILABLE).await;
        assert_eq!(
            checker(&url, Some("true")).check("api").await.unwrap(),
            ReadinessState::Unhealthy
        );
    }

    #[tokio::test]
    async fn test_unreachable_while_running() {
        let url = closed_url().await;
        let result = checker(&url, Some("true")).check("api").await;
        assert!(matches!(
            result,
            Err(JunbanError::HealthCheckUnreachable { .. })
        ));
    }

    #[tokio::test]
    async fn test_unreachable_without_status_command() {
        let url = closed_url().await;
        assert_eq!(
            checker(&url, None).check("api").await.unwrap(),
            ReadinessState::Unknown
        );
    }

    #[tokio::test]
    async fn test_stopped_skips_endpoint() {
        let url = closed_url().await;
        assert_eq!(
            checker(&url, Some("false")).check("api").await.unwrap(),
            ReadinessState::Stopped
        );
    }
}
