//! In-memory store.

use crate::error::{JunbanError, Result};
use crate::model::{DependencyEdge, DependencyScope, ProfileId, Service};
use crate::store::ConfigStore;
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::sync::RwLock;

#[derive(Debug, Default)]
struct Inner {
    services: Vec<Service>,
    edges: HashMap<DependencyScope, Vec<DependencyEdge>>,
    profiles: BTreeMap<ProfileId, Option<Vec<String>>>,
}

/// Store holding services and edges in memory.
///
/// Mutations through `&self` are visible to the next read, which lets
/// callers model edits made between two activations.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

impl MemoryStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a service.
    pub fn with_service(self, service: Service) -> Self {
        self.add_service(service);
        self
    }

    /// Adds a global edge.
    pub fn with_edge(self, edge: DependencyEdge) -> Self {
        self.add_edge(DependencyScope::Global, edge);
        self
    }

    /// Declares a profile; `services` narrows the enabled set when given.
    pub fn with_profile(self, id: impl Into<String>, services: Option<Vec<String>>) -> Self {
        self.write().profiles.insert(id.into(), services);
        self
    }

    /// Adds an edge under a profile scope, declaring the profile if needed.
    pub fn with_profile_edge(self, profile: impl Into<String>, edge: DependencyEdge) -> Self {
        let profile = profile.into();
        self.write().profiles.entry(profile.clone()).or_insert(None);
        self.add_edge(DependencyScope::Profile(profile), edge);
        self
    }

    /// Adds or replaces a service.
    pub fn add_service(&self, service: Service) {
        let mut inner = self.write();
        inner.services.retain(|s| s.id != service.id);
        inner.services.push(service);
    }

    /// Appends an edge to a scope.
    pub fn add_edge(&self, scope: DependencyScope, edge: DependencyEdge) {
        self.write().edges.entry(scope).or_default().push(edge);
    }

    /// Enables or disables a service.
    pub fn set_enabled(&self, id: &str, enabled: bool) {
        let mut inner = self.write();
        if let Some(service) = inner.services.iter_mut().find(|s| s.id == id) {
            service.enabled = enabled;
        }
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, Inner> {
        self.inner.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, Inner> {
        self.inner.write().unwrap_or_else(|e| e.into_inner())
    }

    fn check_profile(inner: &Inner, id: &str) -> Result<()> {
        if inner.profiles.contains_key(id) {
            Ok(())
        } else {
            Err(JunbanError::ProfileNotFound {
                profile: id.to_string(),
            })
        }
    }
}

#[async_trait]
impl ConfigStore for MemoryStore {
    async fn load_edges(&self, scope: &DependencyScope) -> Result<Vec<DependencyEdge>> {
        let inner = self.read();
        if let DependencyScope::Profile(id) = scope {
            Self::check_profile(&inner, id)?;
        }
        Ok(inner.edges.get(scope).cloned().unwrap_or_default())
    }

    async fn load_services(&self, profile: Option<&str>) -> Result<Vec<Service>> {
        let inner = self.read();
        let narrowed = match profile {
            Some(id) => {
                Self::check_profile(&inner, id)?;
                inner.profiles.get(id).cloned().flatten()
            }
            None => None,
        };

        let mut services: Vec<Service> = inner
            .services
            .iter()
            .cloned()
            .map(|mut s| {
                if let Some(allowed) = &narrowed {
                    s.enabled = s.enabled && allowed.contains(&s.id);
                }
                s
            })
            .collect();
        services.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(services)
    }

    async fn profiles(&self) -> Result<Vec<ProfileId>> {
        Ok(self.read().profiles.keys().cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_store_scopes() {
        let store = MemoryStore::new()
            .with_service(Service::new("a", 1))
            .with_service(Service::new("b", 2))
            .with_edge(DependencyEdge::hard("a", "b"))
            .with_profile_edge("dev", DependencyEdge::soft("a", "b"));

        let global = store.load_edges(&DependencyScope::Global).await.unwrap();
        let dev = store
            .load_edges(&DependencyScope::Profile("dev".to_string()))
            .await
            .unwrap();

        assert_eq!(global.len(), 1);
        assert!(!global[0].is_soft());
        assert_eq!(dev.len(), 1);
        assert!(dev[0].is_soft());
        assert_eq!(store.profiles().await.unwrap(), vec!["dev"]);
    }

    #[tokio::test]
    async fn test_memory_store_profile_narrowing() {
        let store = MemoryStore::new()
            .with_service(Service::new("a", 1))
            .with_service(Service::new("b", 2))
            .with_profile("solo", Some(vec!["a".to_string()]));

        let services = store.load_services(Some("solo")).await.unwrap();
        assert!(services[0].enabled);
        assert!(!services[1].enabled);

        assert!(store.load_services(Some("missing")).await.is_err());
    }

    #[tokio::test]
    async fn test_memory_store_edits_visible_on_next_read() {
        let store = MemoryStore::new().with_service(Service::new("a", 1));
        store.set_enabled("a", false);
        store.add_edge(DependencyScope::Global, DependencyEdge::hard("a", "b"));

        let services = store.load_services(None).await.unwrap();
        assert!(!services[0].enabled);
        assert_eq!(
            store.load_edges(&DependencyScope::Global).await.unwrap().len(),
            1
        );
    }
}
