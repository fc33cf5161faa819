//! Static-library link ordering.
//!
//! A single-pass linker needs every static library to appear after all the
//! libraries that use it. Dependencies are declared the other way round
//! ("X depends on Y"), so the order is a topological sort of the transitive
//! dependency closure with dependents first.

use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};

use miette::Diagnostic;
use petgraph::algo::tarjan_scc;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::Direction;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::builder::graph::TargetGraph;
use crate::core::target::{TargetId, TargetKind};

/// Errors raised while ordering link inputs.
#[derive(Debug, Error, Diagnostic)]
pub enum LinkOrderError {
    #[error("dependency cycle while ordering link inputs of `{target}`: {}", .members.join(", "))]
    #[diagnostic(
        code(modbuild::link_order::cycle),
        help("static libraries cannot depend on each other in a loop; break the cycle by merging the libraries or removing one of the edges")
    )]
    Cycle { target: String, members: Vec<String> },

    #[error("no target named `{0}`")]
    #[diagnostic(code(modbuild::link_order::unknown_target))]
    UnknownTarget(String),
}

/// The resolved link inputs of one target.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkOrder {
    /// Every resolved dependency, dependents first
    pub order: Vec<TargetId>,
    /// Artifact names of the static libraries, in linker order
    pub static_libs: Vec<String>,
    /// Artifact names of the shared libraries, in the same order
    pub shared_libs: Vec<String>,
    /// Dependency names that matched no declared target
    pub unresolved: Vec<TargetId>,
}

struct Visited {
    index: usize,
    deps: Vec<TargetId>,
}

/// Compute the link order for the target named `target`.
///
/// Dependency names with no declared target are skipped with a warning and
/// reported in [`LinkOrder::unresolved`]. Static dependencies of shared
/// libraries and programs are linked into those artifacts and do not reach
/// the caller's order.
pub fn resolve_link_order(graph: &TargetGraph, target: &str) -> Result<LinkOrder, LinkOrderError> {
    let root = graph
        .get(target)
        .ok_or_else(|| LinkOrderError::UnknownTarget(target.to_string()))?;

    // Breadth-first closure, memoized by name.
    let mut visited: Vec<(TargetId, Visited)> = Vec::new();
    let mut seen: HashSet<TargetId> = HashSet::new();
    let mut unresolved: Vec<TargetId> = Vec::new();
    let mut queue: VecDeque<TargetId> = root.deps.iter().cloned().collect();

    while let Some(name) = queue.pop_front() {
        if !seen.insert(name.clone()) {
            continue;
        }

        let Some(index) = graph.index_of(name.as_str()) else {
            tracing::warn!("`{}` depends on `{}`, which is not declared", target, name);
            unresolved.push(name);
            continue;
        };

        let dep = &graph.targets()[index];
        let deps: Vec<TargetId> = if dep.kind.encapsulates_static_deps() {
            dep.deps
                .iter()
                .filter(|d| {
                    graph
                        .get(d.as_str())
                        .map_or(true, |t| t.kind != TargetKind::StaticLib)
                })
                .cloned()
                .collect()
        } else {
            dep.deps.clone()
        };

        queue.extend(deps.iter().cloned());
        visited.push((name, Visited { index, deps }));
    }

    // Edges point from a target to the targets it depends on.
    let mut dag: DiGraph<usize, ()> = DiGraph::new();
    let nodes: Vec<NodeIndex> = (0..visited.len()).map(|i| dag.add_node(i)).collect();
    let position: HashMap<&TargetId, usize> = visited
        .iter()
        .enumerate()
        .map(|(i, (name, _))| (name, i))
        .collect();

    for (i, (_, v)) in visited.iter().enumerate() {
        for dep in &v.deps {
            if let Some(&j) = position.get(dep) {
                dag.update_edge(nodes[i], nodes[j], ());
            }
        }
    }

    // Kahn's algorithm over "has no remaining dependents". Ready nodes are
    // taken in first-visit order.
    let mut dependents: Vec<usize> = nodes
        .iter()
        .map(|&n| dag.neighbors_directed(n, Direction::Incoming).count())
        .collect();
    let mut ready: BTreeSet<usize> = (0..nodes.len()).filter(|&i| dependents[i] == 0).collect();
    let mut ordered: Vec<usize> = Vec::with_capacity(nodes.len());

    while let Some(i) = ready.pop_first() {
        ordered.push(i);
        for dep in dag.neighbors_directed(nodes[i], Direction::Outgoing) {
            let j = dag[dep];
            dependents[j] -= 1;
            if dependents[j] == 0 {
                ready.insert(j);
            }
        }
    }

    if ordered.len() < nodes.len() {
        let members = cycle_members(&dag, &visited);
        return Err(LinkOrderError::Cycle {
            target: target.to_string(),
            members,
        });
    }

    let mut order = LinkOrder {
        unresolved,
        ..LinkOrder::default()
    };
    for i in ordered {
        let (name, v) = &visited[i];
        let dep = &graph.targets()[v.index];
        match dep.kind {
            TargetKind::StaticLib => order.static_libs.push(dep.artifact.clone()),
            TargetKind::SharedLib => order.shared_libs.push(dep.artifact.clone()),
            TargetKind::Program | TargetKind::Test => {}
        }
        order.order.push(name.clone());
    }

    tracing::debug!("link order for `{}`: {:?}", target, order.static_libs);
    Ok(order)
}

/// Names of the targets on a cycle, in first-visit order.
fn cycle_members(dag: &DiGraph<usize, ()>, visited: &[(TargetId, Visited)]) -> Vec<String> {
    let mut members: Vec<usize> = tarjan_scc(dag)
        .into_iter()
        .filter(|scc| scc.len() > 1 || dag.contains_edge(scc[0], scc[0]))
        .flatten()
        .map(|n| dag[n])
        .collect();
    members.sort_unstable();
    members
        .into_iter()
        .map(|i| visited[i].0.to_string())
        .collect()
}

impl TargetGraph {
    /// Resolve and attach the link inputs of every declared target.
    ///
    /// Targets are looked up by id, so when an id is declared more than once
    /// every declaration gets the link inputs of the latest one.
    pub fn resolve_link_orders(&mut self) -> Result<Vec<(TargetId, LinkOrder)>, LinkOrderError> {
        let mut resolved = Vec::with_capacity(self.targets().len());
        for target in self.targets() {
            let order = resolve_link_order(self, target.id.as_str())?;
            resolved.push((target.id.clone(), order));
        }

        // Duplicate identities resolve through their latest declaration.
        for (target, (_, order)) in self.targets_mut().iter_mut().zip(&resolved) {
            target.link.static_libs = order.static_libs.clone();
            target.link.shared_libs = order.shared_libs.clone();
        }
        Ok(resolved)
    }
}
