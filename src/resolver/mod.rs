//! Dependency graph resolution.
//!
//! [`GraphResolver`] reads services and edges from a [`ConfigStore`],
//! merges profile-scoped edges over the global ones, breaks cycles made of
//! soft edges and produces a deterministic [`ResolvedOrder`].

mod graph;
mod plan;

pub use graph::build_order;
pub use plan::ResolvedOrder;

use crate::error::{JunbanError, Result};
use crate::model::{DependencyScope, ProfileId, ServiceId};
use crate::store::ConfigStore;
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, info};

/// Resolves startup orders against a store.
#[derive(Clone)]
pub struct GraphResolver {
    store: Arc<dyn ConfigStore>,
}

impl GraphResolver {
    pub fn new(store: Arc<dyn ConfigStore>) -> Self {
        Self { store }
    }

    /// Declared profile ids.
    pub async fn profiles(&self) -> Result<Vec<ProfileId>> {
        self.store.profiles().await
    }

    /// Resolves the order for an explicit set of enabled services.
    ///
    /// Every id in `enabled` must be known to the store. Edges pointing at
    /// services outside `enabled` are kept on their dependent and reported
    /// as warnings.
    pub async fn resolve(
        &self,
        active_profile: Option<&str>,
        enabled: &BTreeSet<ServiceId>,
    ) -> Result<ResolvedOrder> {
        let known = self.store.load_services(active_profile).await?;

        for id in enabled {
            if !known.iter().any(|s| &s.id == id) {
                return Err(JunbanError::service_not_found(id));
            }
        }

        let services = known
            .into_iter()
            .filter(|s| enabled.contains(&s.id))
            .map(|mut s| {
                s.enabled = true;
                s
            })
            .collect();

        self.resolve_services(active_profile, services).await
    }

    /// Resolves the order for every service the profile enables.
    pub async fn resolve_for_profile(&self, active_profile: Option<&str>) -> Result<ResolvedOrder> {
        let services = self
            .store
            .load_services(active_profile)
            .await?
            .into_iter()
            .filter(|s| s.enabled)
            .collect();

        self.resolve_services(active_profile, services).await
    }

    async fn resolve_services(
        &self,
        active_profile: Option<&str>,
        services: Vec<crate::model::Service>,
    ) -> Result<ResolvedOrder> {
        let global = self.store.load_edges(&DependencyScope::Global).await?;
        let profile_edges = match active_profile {
            Some(id) => {
                self.store
                    .load_edges(&DependencyScope::Profile(id.to_string()))
                    .await?
            }
            None => Vec::new(),
        };

        debug!(
            profile = ?active_profile,
            services = services.len(),
            global_edges = global.len(),
            profile_edges = profile_edges.len(),
            "Resolving dependency graph"
        );

        let plan = build_order(active_profile, services, &global, &profile_edges)?;

        info!(
            profile = ?active_profile,
            order = %plan.order.join(", "),
            warnings = plan.warnings.len(),
            "Dependency graph resolved"
        );

        Ok(plan)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{DependencyEdge, Service};
    use crate::store::MemoryStore;

    fn store() -> Arc<MemoryStore> {
        Arc::new(
            MemoryStore::new()
                .with_service(Service::new("gateway", 3))
                .with_service(Service::new("cache", 2))
                .with_service(Service::new("registry", 1))
                .with_service(Service::new("metrics", 4).disabled())
                .with_edge(DependencyEdge::hard("gateway", "registry").health_gated())
                .with_edge(DependencyEdge::hard("gateway", "cache").health_gated())
                .with_edge(DependencyEdge::hard("cache", "registry").health_gated())
                .with_profile_edge("dev", DependencyEdge::soft("cache", "registry")),
        )
    }

    #[tokio::test]
    async fn test_resolve_for_profile_skips_disabled() {
        let resolver = GraphResolver::new(store());
        let plan = resolver.resolve_for_profile(None).await.unwrap();

        assert_eq!(plan.order, vec!["registry", "cache", "gateway"]);
        assert!(!plan.contains("metrics"));
    }

    #[tokio::test]
    async fn test_resolve_explicit_set() {
        let resolver = GraphResolver::new(store());
        let enabled: BTreeSet<ServiceId> = ["gateway", "registry"]
            .iter()
            .map(|s| s.to_string())
            .collect();

        let plan = resolver.resolve(None, &enabled).await.unwrap();

        assert_eq!(plan.order, vec!["registry", "gateway"]);
        assert_eq!(plan.warnings.len(), 1);
        assert!(plan.warnings[0].contains("cache"));
    }

    #[tokio::test]
    async fn test_resolve_unknown_service() {
        let resolver = GraphResolver::new(store());
        let enabled: BTreeSet<ServiceId> = ["nope".to_string()].into_iter().collect();

        let result = resolver.resolve(None, &enabled).await;
        assert!(matches!(result, Err(JunbanError::ServiceNotFound { .. })));
    }

    #[tokio::test]
    async fn test_resolve_with_profile_override() {
        let resolver = GraphResolver::new(store());
        let plan = resolver.resolve_for_profile(Some("dev")).await.unwrap();

        assert!(plan.dependencies_of("cache")[0].is_soft());
        assert!(!plan.dependencies_of("gateway")[0].is_soft());
        assert_eq!(plan.profile.as_deref(), Some("dev"));
    }

    #[tokio::test]
    async fn test_resolve_unknown_profile() {
        let resolver = GraphResolver::new(store());
        let result = resolver.resolve_for_profile(Some("prod")).await;
        assert!(matches!(result, Err(JunbanError::ProfileNotFound { .. })));
    }

    #[tokio::test]
    async fn test_edits_seen_by_next_resolve() {
        let store = store();
        let resolver = GraphResolver::new(store.clone());

        let before = resolver.resolve_for_profile(None).await.unwrap();
        store.set_enabled("metrics", true);
        store.add_edge(
            DependencyScope::Global,
            DependencyEdge::hard("metrics", "gateway"),
        );
        let after = resolver.resolve_for_profile(None).await.unwrap();

        assert_eq!(before.len(), 3);
        assert_eq!(after.order.last().map(String::as_str), Some("metrics"));
    }

    #[tokio::test]
    async fn test_plan_display() {
        let resolver = GraphResolver::new(store());
        let plan = resolver.resolve_for_profile(None).await.unwrap();
        let text = plan.to_string();

        assert!(text.contains("Startup plan (global)"));
        assert!(text.contains("1. registry [global]"));
        assert!(text.contains("waits for registry healthy within 120s"));
    }
}
