//! junban - Dependency-ordered startup and shutdown of local services
//!
//! This crate starts a fleet of local services in an order derived from
//! their declared dependencies, gates each start on the readiness of the
//! services it depends on, and stops the fleet in reverse.
//!
//! # Overview
//!
//! A run goes through three stages:
//!
//! 1. [`GraphResolver`] merges global and profile edges, breaks soft cycles
//!    and produces a deterministic [`ResolvedOrder`].
//! 2. [`Orchestrator`] launches services concurrently wherever the graph
//!    allows, waiting on hard edges through the [`ReadinessProber`].
//! 3. Every state change is handed to a [`reporter::ResultReporter`].
//!
//! # Modules
//!
//! - [`adapters`] - Process controller and health checker seams
//! - [`cli`] - Command-line interface definitions
//! - [`config`] - Configuration file parsing and validation
//! - [`engine`] - Start/stop orchestration
//! - [`error`] - Error types and error handling
//! - [`model`] - Services, edges and readiness states
//! - [`prober`] - Shared readiness polling
//! - [`reporter`] - Transition event sinks
//! - [`resolver`] - Dependency graph resolution
//! - [`server`] - Control API
//! - [`store`] - Service and edge storage

pub mod adapters;
pub mod cli;
pub mod config;
pub mod engine;
pub mod error;
pub mod model;
pub mod prober;
pub mod reporter;
pub mod resolver;
pub mod server;
pub mod store;

#[cfg(test)]
mod testing;

// Re-exports for convenience
pub use cli::Cli;
pub use config::Config;
pub use engine::Orchestrator;
pub use error::{ErrorCode, JunbanError, Result};
pub use prober::ReadinessProber;
pub use resolver::{GraphResolver, ResolvedOrder};
pub use server::serve;
