//! Store backed by the YAML configuration file.

use crate::config::Config;
use crate::error::{JunbanError, Result};
use crate::model::{DependencyEdge, DependencyScope, ProfileId, Service};
use crate::store::ConfigStore;
use async_trait::async_trait;
use std::sync::Arc;

/// Serves services and edges from a validated [`Config`].
#[derive(Debug, Clone)]
pub struct YamlStore {
    config: Arc<Config>,
}

impl YamlStore {
    /// Creates a store over the given configuration.
    pub fn new(config: Arc<Config>) -> Self {
        Self { config }
    }
}

#[async_trait]
impl ConfigStore for YamlStore {
    async fn load_edges(&self, scope: &DependencyScope) -> Result<Vec<DependencyEdge>> {
        let defaults = &self.config.orchestrator;
        let edges = match scope {
            DependencyScope::Global => &self.config.dependencies,
            DependencyScope::Profile(id) => {
                &self
                    .config
                    .profiles
                    .get(id)
                    .ok_or_else(|| JunbanError::ProfileNotFound {
                        profile: id.clone(),
                    })?
                    .dependencies
            }
        };

        Ok(edges.iter().map(|def| def.to_edge(defaults)).collect())
    }

    async fn load_services(&self, profile: Option<&str>) -> Result<Vec<Service>> {
        let profile_def = match profile {
            Some(id) => Some(self.config.profiles.get(id).ok_or_else(|| {
                JunbanError::ProfileNotFound {
                    profile: id.to_string(),
                }
            })?),
            None => None,
        };

        let services = self
            .config
            .services
            .iter()
            .map(|(id, def)| Service {
                id: id.clone(),
                name: def.name.clone().unwrap_or_else(|| id.clone()),
                health_check_url: def.health_check_url.clone(),
                enabled: def.enabled && profile_def.map_or(true, |p| p.includes(id)),
                order: def.order,
            })
            .collect();

        Ok(services)
    }

    async fn profiles(&self) -> Result<Vec<ProfileId>> {
        Ok(self.config.profiles.keys().cloned().collect())
    }
}
