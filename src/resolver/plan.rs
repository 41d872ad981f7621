//! Resolved startup order.

use crate::model::{DependencyEdge, DependencyScope, ProfileId, Service, ServiceId};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

/// Output of the graph resolver: a deterministic startup order plus the
/// effective edges each service waits on.
///
/// Derived state only; recompute it whenever the profile, its edges or the
/// enabled service set change.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ResolvedOrder {
    /// Profile the order was resolved for.
    pub profile: Option<ProfileId>,
    /// Enabled services, each exactly once, dependencies first.
    pub order: Vec<ServiceId>,
    /// Enabled services by id.
    pub services: BTreeMap<ServiceId, Service>,
    /// Effective edges per dependent, in declaration order.
    pub edges: BTreeMap<ServiceId, Vec<DependencyEdge>>,
    /// Scope each service's edges came from.
    pub scopes: BTreeMap<ServiceId, DependencyScope>,
    /// Soft edges removed to break cycles.
    pub dropped: Vec<DependencyEdge>,
    /// Non-fatal findings.
    pub warnings: Vec<String>,
}

impl ResolvedOrder {
    /// Number of services in the order.
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// True when no service is enabled.
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Whether `id` is part of the order.
    pub fn contains(&self, id: &str) -> bool {
        self.services.contains_key(id)
    }

    /// Zero-based position of `id` in the startup order.
    pub fn position(&self, id: &str) -> Option<usize> {
        self.order.iter().position(|s| s == id)
    }

    /// Effective edges of `id`, in declaration order.
    pub fn dependencies_of(&self, id: &str) -> &[DependencyEdge] {
        self.edges.get(id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Services with an effective edge pointing at `id`, in startup order.
    pub fn dependents_of(&self, id: &str) -> Vec<&ServiceId> {
        self.order
            .iter()
            .filter(|s| self.dependencies_of(s).iter().any(|e| e.to == id))
            .collect()
    }

    /// Edges whose target is not enabled; they can never be satisfied.
    pub fn is_dangling(&self, edge: &DependencyEdge) -> bool {
        !self.services.contains_key(&edge.to)
    }

    /// Startup order reversed.
    pub fn shutdown_order(&self) -> impl Iterator<Item = &ServiceId> {
        self.order.iter().rev()
    }
}

impl fmt::Display for ResolvedOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.profile {
            Some(profile) => writeln!(f, "Startup plan (profile: {})", profile)?,
            None => writeln!(f, "Startup plan (global)")?,
        }
        writeln!(f, "=====================")?;

        if self.order.is_empty() {
            writeln!(f, "  (no enabled services)")?;
        }

        for (i, id) in self.order.iter().enumerate() {
            let scope = self
                .scopes
                .get(id)
                .map(|s| format!(" [{}]", s))
                .unwrap_or_default();
            writeln!(f, "  {}. {}{}", i + 1, id, scope)?;

            for edge in self.dependencies_of(id) {
                let line = if edge.is_soft() {
                    format!("after {} (soft)", edge.to)
                } else {
                    let want = if edge.health_check_required {
                        "healthy"
                    } else {
                        "running"
                    };
                    let optional = if edge.required { "" } else { " (optional)" };
                    format!(
                        "waits for {} {} within {}s{}",
                        edge.to, want, edge.timeout_seconds, optional
                    )
                };
                let dangling = if self.is_dangling(edge) {
                    " [not enabled]"
                } else {
                    ""
                };
                writeln!(f, "       {}{}", line, dangling)?;
            }
        }

        if !self.warnings.is_empty() {
            writeln!(f)?;
            writeln!(f, "Warnings:")?;
            for warning in &self.warnings {
                writeln!(f, "  - {}", warning)?;
            }
        }

        Ok(())
    }
}
