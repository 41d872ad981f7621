//! Effective graph construction, cycle detection and ordering.

use crate::error::{JunbanError, Result};
use crate::model::{DependencyEdge, DependencyScope, Service, ServiceId};
use crate::resolver::plan::ResolvedOrder;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use tracing::{debug, warn};

/// DFS marking.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mark {
    InProgress,
    Done,
}

/// Builds the startup order for the enabled `services`.
///
/// `profile_edges` replaces `global_edges` per dependent: a service with at
/// least one profile-scoped edge uses exactly those, every other service
/// uses its global edges.
pub fn build_order(
    profile: Option<&str>,
    services: Vec<Service>,
    global_edges: &[DependencyEdge],
    profile_edges: &[DependencyEdge],
) -> Result<ResolvedOrder> {
    let services: BTreeMap<ServiceId, Service> =
        services.into_iter().map(|s| (s.id.clone(), s)).collect();

    let mut plan = ResolvedOrder {
        profile: profile.map(str::to_string),
        ..Default::default()
    };

    for id in services.keys() {
        let overrides: Vec<&DependencyEdge> =
            profile_edges.iter().filter(|e| &e.from == id).collect();

        let (scope, declared) = match profile {
            Some(p) if !overrides.is_empty() => (DependencyScope::Profile(p.to_string()), overrides),
            _ => (
                DependencyScope::Global,
                global_edges.iter().filter(|e| &e.from == id).collect(),
            ),
        };

        let mut seen = HashSet::new();
        let mut effective = Vec::with_capacity(declared.len());
        for edge in declared {
            if edge.to == edge.from {
                plan.warnings
                    .push(format!("{}: ignoring self dependency", edge.from));
                continue;
            }
            if !seen.insert(edge.to.as_str()) {
                plan.warnings.push(format!(
                    "{}: ignoring duplicate dependency on {}",
                    edge.from, edge.to
                ));
                continue;
            }
            if !services.contains_key(&edge.to) {
                plan.warnings.push(format!(
                    "{} depends on {}, which is not enabled",
                    edge.from, edge.to
                ));
            }
            effective.push(edge.clone());
        }

        plan.scopes.insert(id.clone(), scope);
        plan.edges.insert(id.clone(), effective);
    }

    // Ordering graph: only edges between enabled services.
    let mut arcs: Vec<DependencyEdge> = plan
        .edges
        .values()
        .flatten()
        .filter(|e| services.contains_key(&e.to))
        .cloned()
        .collect();

    while let Some(cycle) = find_cycle(&services, &arcs) {
        let path: Vec<ServiceId> = cycle.iter().map(|&i| arcs[i].from.clone()).collect();

        let victim = cycle
            .iter()
            .copied()
            .filter(|&i| arcs[i].is_soft())
            .max_by_key(|&i| {
                let edge = &arcs[i];
                (order_of(&services, &edge.to), edge.from.clone(), edge.to.clone())
            });

        let Some(victim) = victim else {
            return Err(JunbanError::CycleDetected { path });
        };

        let dropped = arcs.remove(victim);
        warn!(
            from = %dropped.from,
            to = %dropped.to,
            cycle = %path.join(" -> "),
            "Breaking dependency cycle by dropping soft edge"
        );
        plan.warnings.push(format!(
            "dropped soft dependency {} -> {} to break cycle {} -> {}",
            dropped.from,
            dropped.to,
            path.join(" -> "),
            path[0]
        ));
        plan.dropped.push(dropped);
    }

    plan.order = topological_order(&services, &arcs)?;
    debug!(order = ?plan.order, "Resolved startup order");

    plan.services = services;
    Ok(plan)
}

fn order_of(services: &BTreeMap<ServiceId, Service>, id: &str) -> i64 {
    services.get(id).map_or(i64::MAX, |s| s.order)
}

/// Tie-break key: preferred order, then id.
fn sort_key<'a>(services: &'a BTreeMap<ServiceId, Service>, id: &'a str) -> (i64, &'a str) {
    (order_of(services, id), id)
}

/// Finds one cycle with a three-colour depth-first search.
///
/// Returns the indices into `arcs` forming the cycle, in traversal order.
/// Roots and neighbours are visited by (preferred order, id), so the result
/// does not depend on how the edges were declared.
fn find_cycle(services: &BTreeMap<ServiceId, Service>, arcs: &[DependencyEdge]) -> Option<Vec<usize>> {
    let mut adjacency: HashMap<&str, Vec<usize>> = HashMap::new();
    for (i, arc) in arcs.iter().enumerate() {
        adjacency.entry(arc.from.as_str()).or_default().push(i);
    }
    for out in adjacency.values_mut() {
        out.sort_by(|&a, &b| {
            sort_key(services, &arcs[a].to).cmp(&sort_key(services, &arcs[b].to))
        });
    }

    let mut roots: Vec<&str> = services.keys().map(String::as_str).collect();
    roots.sort_by_key(|&id| sort_key(services, id));

    let mut marks: HashMap<&str, Mark> = HashMap::new();
    let mut stack: Vec<usize> = Vec::new();

    for root in roots {
        if marks.contains_key(root) {
            continue;
        }
        if let Some(cycle) = visit(root, arcs, &adjacency, &mut marks, &mut stack) {
            return Some(cycle);
        }
    }

    None
}

fn visit<'a>(
    node: &'a str,
    arcs: &'a [DependencyEdge],
    adjacency: &HashMap<&'a str, Vec<usize>>,
    marks: &mut HashMap<&'a str, Mark>,
    stack: &mut Vec<usize>,
) -> Option<Vec<usize>> {
    marks.insert(node, Mark::InProgress);

    for &i in adjacency.get(node).map(Vec::as_slice).unwrap_or(&[]) {
        let next = arcs[i].to.as_str();
        match marks.get(next) {
            Some(Mark::InProgress) => {
                let start = stack
                    .iter()
                    .position(|&s| arcs[s].from == next)
                    .unwrap_or(stack.len());
                let mut cycle = stack[start..].to_vec();
                cycle.push(i);
                return Some(cycle);
            }
            Some(Mark::Done) => {}
            None => {
                stack.push(i);
                if let Some(cycle) = visit(next, arcs, adjacency, marks, stack) {
                    return Some(cycle);
                }
                stack.pop();
            }
        }
    }

    marks.insert(node, Mark::Done);
    None
}

/// Kahn's algorithm; among ready services the lowest (order, id) goes first.
fn topological_order(
    services: &BTreeMap<ServiceId, Service>,
    arcs: &[DependencyEdge],
) -> Result<Vec<ServiceId>> {
    let mut in_degree: HashMap<&str, usize> =
        services.keys().map(|id| (id.as_str(), 0)).collect();
    let mut dependents: HashMap<&str, Vec<&str>> = HashMap::new();

    for arc in arcs {
        *in_degree.entry(arc.from.as_str()).or_insert(0) += 1;
        dependents
            .entry(arc.to.as_str())
            .or_default()
            .push(arc.from.as_str());
    }

    let mut ready: BTreeSet<(i64, &str)> = in_degree
        .iter()
        .filter(|(_, &degree)| degree == 0)
        .map(|(&id, _)| sort_key(services, id))
        .collect();

    let mut order = Vec::with_capacity(services.len());
    while let Some((_, id)) = ready.pop_first() {
        order.push(id.to_string());

        for &dependent in dependents.get(id).map(Vec::as_slice).unwrap_or(&[]) {
            if let Some(degree) = in_degree.get_mut(dependent) {
                *degree -= 1;
                if *degree == 0 {
                    ready.insert(sort_key(services, dependent));
                }
            }
        }
    }

    if order.len() != services.len() {
        let placed: HashSet<&str> = order.iter().map(String::as_str).collect();
        let path = services
            .keys()
            .filter(|id| !placed.contains(id.as_str()))
            .cloned()
            .collect();
        return Err(JunbanError::CycleDetected { path });
    }

    Ok(order)
}
