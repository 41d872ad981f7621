//! HTTP request handlers.
//!
//! This module contains all the HTTP endpoint handlers for the junban API.

use crate::engine::{ServiceStatus, StopSummary};
use crate::error::{JunbanError, Result};
use crate::resolver::ResolvedOrder;
use crate::server::response::{
    ApiResponse, EventsData, HealthData, HealthStatus, RunAcceptedData, RunData, ServerInfo,
    ServiceInfo, ServiceOperationData, ServicesListData, StatsInfo, StatusData,
};
use crate::server::state::AppState;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{error, info, warn};
use uuid::Uuid;

/// Version string for the application.
const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Builds an error reply with the status code mapped from the error code.
fn failure<T>(state: &AppState, err: &JunbanError) -> (StatusCode, Json<ApiResponse<T>>) {
    state.increment_failed();
    let status = StatusCode::from_u16(err.code().http_status())
        .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, Json(ApiResponse::from_error(err)))
}

/// Query parameters selecting a profile.
#[derive(Debug, Default, Deserialize)]
pub struct ProfileQuery {
    /// Profile to resolve for; defaults to the active profile.
    pub profile: Option<String>,
}

/// Query parameters for whole-graph runs.
#[derive(Debug, Deserialize)]
pub struct RunQuery {
    /// Profile to resolve for; defaults to the active profile.
    pub profile: Option<String>,
    /// Block until the run finishes.
    #[serde(default = "default_wait")]
    pub wait: bool,
}

fn default_wait() -> bool {
    true
}

/// Health check handler.
///
/// GET /api/v1/health
pub async fn health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    state.increment_requests();

    // Degraded while the latest start outcome of some service is a failure.
    let status = if state.history.summary().failed() > 0 {
        HealthStatus::Degraded
    } else {
        HealthStatus::Healthy
    };
    let data = HealthData {
        status,
        version: VERSION.to_string(),
        uptime_seconds: state.uptime_seconds(),
    };

    state.increment_success();
    (StatusCode::OK, Json(ApiResponse::success(data)))
}

/// Orchestrator status handler.
///
/// GET /api/v1/status
pub async fn status(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    state.increment_requests();

    let stats_snapshot = state.stats.snapshot();

    let data = StatusData {
        host: state.host_name.clone(),
        active_profile: state.active_profile().map(str::to_string),
        profiles: state.resolver.profiles().await.unwrap_or_default(),
        operation: state.orchestrator.active_operation(),
        server: ServerInfo {
            bind: state.config.server.bind.clone(),
            port: state.config.server.port,
        },
        summary: state.history.summary().to_string(),
        stats: StatsInfo {
            requests_total: stats_snapshot.requests_total,
            requests_success: stats_snapshot.requests_success,
            requests_failed: stats_snapshot.requests_failed,
        },
        version: VERSION.to_string(),
        uptime_seconds: state.uptime_seconds(),
    };

    state.increment_success();
    (StatusCode::OK, Json(ApiResponse::success(data)))
}

/// Resolved order handler.
///
/// GET /api/v1/plan
pub async fn plan(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ProfileQuery>,
) -> impl IntoResponse {
    state.increment_requests();

    match state.plan(query.profile.as_deref()).await {
        Ok(plan) => {
            state.increment_success();
            (StatusCode::OK, Json(ApiResponse::success(plan)))
        }
        Err(err) => failure::<ResolvedOrder>(&state, &err),
    }
}

/// Start-all handler.
///
/// POST /api/v1/start
pub async fn start_all(
    State(state): State<Arc<AppState>>,
    Query(query): Query<RunQuery>,
) -> Response {
    state.increment_requests();

    let request_id = Uuid::new_v4();
    let plan = match state.plan(query.profile.as_deref()).await {
        Ok(plan) => plan,
        Err(err) => return failure::<RunData>(&state, &err).into_response(),
    };

    info!(
        request_id = %request_id,
        profile = ?plan.profile,
        services = plan.len(),
        wait = query.wait,
        "Processing start request"
    );

    if !query.wait {
        if let Some(operation) = state.orchestrator.active_operation() {
            let err = JunbanError::Busy {
                reason: format!("{} is in progress", operation),
            };
            return failure::<RunAcceptedData>(&state, &err).into_response();
        }

        let data = RunAcceptedData {
            request_id,
            operation: "start".to_string(),
            profile: plan.profile.clone(),
            message: format!("starting {} services", plan.len()),
        };
        let orchestrator = state.orchestrator.clone();
        tokio::spawn(async move {
            if let Err(e) = orchestrator.start_all(&plan).await {
                warn!(request_id = %request_id, error = %e, "Background start run rejected");
            }
        });

        state.increment_success();
        return (StatusCode::ACCEPTED, Json(ApiResponse::success(data))).into_response();
    }

    match state.orchestrator.start_all(&plan).await {
        Ok(summary) => {
            let data = RunData {
                request_id,
                profile: plan.profile.clone(),
                message: summary.to_string(),
                summary,
            };
            state.increment_success();
            (StatusCode::OK, Json(ApiResponse::success(data))).into_response()
        }
        Err(err) => {
            error!(request_id = %request_id, error = %err, "Start request failed");
            failure::<RunData>(&state, &err).into_response()
        }
    }
}

/// Stop-all handler.
///
/// POST /api/v1/stop
pub async fn stop_all(
    State(state): State<Arc<AppState>>,
    Query(query): Query<RunQuery>,
) -> Response {
    state.increment_requests();

    let request_id = Uuid::new_v4();
    let plan = match state.plan(query.profile.as_deref()).await {
        Ok(plan) => plan,
        Err(err) => return failure::<StopSummary>(&state, &err).into_response(),
    };

    info!(
        request_id = %request_id,
        profile = ?plan.profile,
        services = plan.len(),
        wait = query.wait,
        "Processing stop request"
    );

    if !query.wait {
        let data = RunAcceptedData {
            request_id,
            operation: "stop".to_string(),
            profile: plan.profile.clone(),
            message: format!("stopping {} services", plan.len()),
        };
        let orchestrator = state.orchestrator.clone();
        tokio::spawn(async move {
            orchestrator.stop_all(&plan).await;
        });

        state.increment_success();
        return (StatusCode::ACCEPTED, Json(ApiResponse::success(data))).into_response();
    }

    let summary = state.orchestrator.stop_all(&plan).await;
    state.increment_success();
    (StatusCode::OK, Json(ApiResponse::success(summary))).into_response()
}

/// Query parameters for listing services.
#[derive(Debug, Deserialize)]
pub struct ListServicesQuery {
    /// Profile to resolve for; defaults to the active profile.
    pub profile: Option<String>,
    /// Maximum number of results.
    #[serde(default = "default_limit")]
    pub limit: usize,
    /// Offset for pagination.
    #[serde(default)]
    pub offset: usize,
}

fn default_limit() -> usize {
    100
}

/// List services handler.
///
/// GET /api/v1/services
pub async fn list_services(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListServicesQuery>,
) -> impl IntoResponse {
    state.increment_requests();

    let plan = match state.plan(query.profile.as_deref()).await {
        Ok(plan) => plan,
        Err(err) => return failure::<ServicesListData>(&state, &err),
    };

    let statuses = state.orchestrator.statuses();
    let prober = state.orchestrator.prober();
    let services: Vec<ServiceInfo> = plan
        .order
        .iter()
        .enumerate()
        .map(|(i, id)| ServiceInfo {
            name: id.clone(),
            display_name: plan
                .services
                .get(id)
                .map(|s| s.name.clone())
                .unwrap_or_else(|| id.clone()),
            position: i + 1,
            readiness: prober.observe(id),
            status: statuses.get(id).cloned(),
            depends_on: plan
                .dependencies_of(id)
                .iter()
                .map(|e| e.to.clone())
                .collect(),
            required_by: plan.dependents_of(id).into_iter().cloned().collect(),
        })
        .collect();

    let total = services.len();

    // Apply pagination
    let services: Vec<ServiceInfo> = services
        .into_iter()
        .skip(query.offset)
        .take(query.limit)
        .collect();

    let data = ServicesListData {
        services,
        total,
        limit: query.limit,
        offset: query.offset,
    };

    state.increment_success();
    (StatusCode::OK, Json(ApiResponse::success(data)))
}

/// Start service handler.
///
/// POST /api/v1/services/:name/start
pub async fn start_service(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
    Query(query): Query<ProfileQuery>,
) -> impl IntoResponse {
    service_action(state, name, query.profile, "start").await
}

/// Stop service handler.
///
/// POST /api/v1/services/:name/stop
pub async fn stop_service(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
    Query(query): Query<ProfileQuery>,
) -> impl IntoResponse {
    service_action(state, name, query.profile, "stop").await
}

/// Restart service handler.
///
/// POST /api/v1/services/:name/restart
pub async fn restart_service(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
    Query(query): Query<ProfileQuery>,
) -> impl IntoResponse {
    service_action(state, name, query.profile, "restart").await
}

/// Common service action handler.
async fn service_action(
    state: Arc<AppState>,
    service: String,
    profile: Option<String>,
    action: &'static str,
) -> (StatusCode, Json<ApiResponse<ServiceOperationData>>) {
    state.increment_requests();

    info!(
        service = %service,
        action = action,
        "Processing service action"
    );

    let previous_state = state.orchestrator.statuses().get(&service).cloned();

    let result = match state.plan(profile.as_deref()).await {
        Ok(plan) => run_action(&state, &plan, &service, action).await,
        Err(err) => Err(err),
    };

    match result {
        Ok((success, message)) => {
            let data = ServiceOperationData {
                current_state: state.orchestrator.statuses().get(&service).cloned(),
                service,
                action: action.to_string(),
                success,
                previous_state,
                message,
            };

            state.increment_success();
            (StatusCode::OK, Json(ApiResponse::success(data)))
        }
        Err(err) => {
            error!(error = %err, "Service action failed");
            failure(&state, &err)
        }
    }
}

async fn run_action(
    state: &AppState,
    plan: &ResolvedOrder,
    service: &str,
    action: &str,
) -> Result<(bool, Option<String>)> {
    let outcome = match action {
        "stop" => {
            state.orchestrator.stop_one(plan, service).await?;
            return Ok((true, None));
        }
        "restart" => state.orchestrator.restart_one(plan, service).await?,
        _ => state.orchestrator.start_one(plan, service).await?,
    };

    let success = outcome.status == ServiceStatus::Started;
    let message = (!success).then(|| outcome.reason.to_string());
    Ok((success, message))
}

/// Query parameters for the event history.
#[derive(Debug, Deserialize)]
pub struct EventsQuery {
    /// Only events of this service.
    pub service: Option<String>,
    /// Most recent events to return.
    #[serde(default = "default_limit")]
    pub limit: usize,
}

/// Transition history handler.
///
/// GET /api/v1/events
pub async fn events(
    State(state): State<Arc<AppState>>,
    Query(query): Query<EventsQuery>,
) -> impl IntoResponse {
    state.increment_requests();

    let mut events = match &query.service {
        Some(service) => state.history.for_service(service),
        None => state.history.events(),
    };
    let total = events.len();
    if total > query.limit {
        events.drain(..total - query.limit);
    }

    state.increment_success();
    (
        StatusCode::OK,
        Json(ApiResponse::success(EventsData { events, total })),
    )
}
