//! Dependency graph store.
//!
//! The orchestrator reads services and dependency edges through the
//! [`ConfigStore`] trait. [`YamlStore`] serves them from the loaded
//! configuration file; [`MemoryStore`] keeps them in memory for embedders
//! and tests.

mod memory;
mod yaml;

pub use memory::MemoryStore;
pub use yaml::YamlStore;

use crate::error::Result;
use crate::model::{DependencyEdge, DependencyScope, ProfileId, Service};
use async_trait::async_trait;

/// Read access to the persisted services and dependency edges.
///
/// Reads are taken once per resolve; edits made afterwards are only seen
/// by the next resolve.
#[async_trait]
pub trait ConfigStore: Send + Sync {
    /// Returns the edges declared in `scope`, in declaration order.
    async fn load_edges(&self, scope: &DependencyScope) -> Result<Vec<DependencyEdge>>;

    /// Returns every known service, with `enabled` narrowed by `profile`.
    async fn load_services(&self, profile: Option<&str>) -> Result<Vec<Service>>;

    /// Returns the declared profile ids.
    async fn profiles(&self) -> Result<Vec<ProfileId>>;
}
