//! HTTP Server module - control API implementation.
//!
//! This module provides the HTTP server for junban, including
//! routing, request handling, and response formatting.

pub mod handlers;
pub mod response;
pub mod state;

#[cfg(test)]
mod handlers_tests;

use crate::config::Config;
use crate::error::{JunbanError, Result};
use axum::{
    routing::{get, post},
    Router,
};
use state::AppState;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::info;

/// Creates the API router with all endpoints.
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        // Health and status endpoints
        .route("/api/v1/health", get(handlers::health))
        .route("/api/v1/status", get(handlers::status))
        // Whole-graph endpoints
        .route("/api/v1/plan", get(handlers::plan))
        .route("/api/v1/start", post(handlers::start_all))
        .route("/api/v1/stop", post(handlers::stop_all))
        // Service endpoints
        .route("/api/v1/services", get(handlers::list_services))
        .route(
            "/api/v1/services/:name/start",
            post(handlers::start_service),
        )
        .route("/api/v1/services/:name/stop", post(handlers::stop_service))
        .route(
            "/api/v1/services/:name/restart",
            post(handlers::restart_service),
        )
        .route("/api/v1/events", get(handlers::events))
        // Add tracing layer
        .layer(TraceLayer::new_for_http())
        // Add state
        .with_state(state)
}

/// Starts the HTTP server and runs until it fails.
pub async fn serve(config: Config) -> Result<()> {
    let addr = SocketAddr::new(
        config
            .server
            .bind
            .parse()
            .map_err(|e| JunbanError::config_with_source("Invalid bind address", e))?,
        config.server.port,
    );

    let state = Arc::new(AppState::new(config));
    let prober = state.orchestrator.prober().clone();
    let router = create_router(state);

    info!("Starting HTTP server on {}", addr);

    let listener = TcpListener::bind(addr).await?;
    let result = axum::serve(listener, router).await;

    prober.shutdown();
    result.map_err(JunbanError::from)
}
