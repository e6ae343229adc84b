//! Build order and critical path.
//!
//! # Algorithm
//!
//! 1. Break cycles ([`break_cycles`]); every removed edge is reported.
//! 2. Kahn's algorithm on the acyclic view, dependencies first. Among ready
//!    nodes the lowest id goes next, so the order is reproducible.
//! 3. Longest weighted path by dynamic programming over that order:
//!    `best[n] = max(weight(n → d) + best[d])` over the dependencies `d`
//!    of `n`. Ties keep the lowest dependency id.
//!
//! The critical path is reported from the dependent end to the deepest
//! dependency, e.g. `[A, B, C]` for `A → B → C`.

#![allow(clippy::module_name_repetitions)]

use std::cmp::Reverse;
use std::collections::{BTreeSet, BinaryHeap, HashSet, VecDeque};

use depgraph_core::error::PlanError;
use depgraph_core::model::Graph;
use petgraph::Direction;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::graph::DependencyGraph;
use crate::schedule::breaks::{ForcedBreak, break_cycles};

// ---------------------------------------------------------------------------
// Public types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuildOrderMetrics {
    pub node_count: usize,
    /// Length of `order`; smaller than `node_count` when restricted to a
    /// change set.
    pub ordered_count: usize,
    /// Edges on the critical path.
    pub critical_path_length: usize,
    /// Sum of edge weights along the critical path.
    pub critical_path_cost: f64,
    /// Sum of node costs along the critical path.
    pub critical_path_duration: f64,
    /// Sum of node costs over `order`.
    pub total_duration: f64,
    pub forced_break_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuildOrderResult {
    /// Node ids, every dependency before its dependents.
    pub order: Vec<String>,
    /// Dependent first, deepest dependency last.
    pub critical_path: Vec<String>,
    pub forced_breaks: Vec<ForcedBreak>,
    /// Nodes whose self-loop was left out of planning.
    pub self_loops: Vec<String>,
    pub metrics: BuildOrderMetrics,
}

// ---------------------------------------------------------------------------
// Entry points
// ---------------------------------------------------------------------------

/// Plan a build order for `graph` with default weights.
///
/// With `changed`, `order` keeps only the changed nodes and everything that
/// transitively depends on them. The critical path is always computed over
/// the whole graph.
///
/// # Errors
///
/// [`PlanError::EmptyGraph`] for a graph without nodes and
/// [`PlanError::UnknownNode`] for a changed id not in the graph.
pub fn plan_build_order(
    graph: &Graph,
    changed: Option<&BTreeSet<String>>,
) -> Result<BuildOrderResult, PlanError> {
    if graph.is_empty() {
        return Err(PlanError::EmptyGraph);
    }
    plan_build_order_with(&DependencyGraph::from_graph(graph), changed)
}

/// [`plan_build_order`] over an existing dependency view.
///
/// # Errors
///
/// Same as [`plan_build_order`].
#[instrument(skip_all, fields(nodes = dg.node_count(), changed = changed.map_or(0, BTreeSet::len)))]
pub fn plan_build_order_with(
    dg: &DependencyGraph,
    changed: Option<&BTreeSet<String>>,
) -> Result<BuildOrderResult, PlanError> {
    if dg.is_empty() {
        return Err(PlanError::EmptyGraph);
    }
    let rebuild = changed.map(|ids| rebuild_set(dg, ids)).transpose()?;

    let view = break_cycles(dg);
    let topo = topological_order(&view.graph);
    let (critical, critical_path_cost) = critical_path(&view.graph, &topo);

    let order: Vec<NodeIndex> = match &rebuild {
        Some(keep) => topo.into_iter().filter(|n| keep.contains(n)).collect(),
        None => topo,
    };
    debug!(ordered = order.len(), "build order planned");

    let metrics = BuildOrderMetrics {
        node_count: dg.node_count(),
        ordered_count: order.len(),
        critical_path_length: critical.len().saturating_sub(1),
        critical_path_cost,
        critical_path_duration: critical.iter().map(|&n| dg.cost(n)).sum(),
        total_duration: order.iter().map(|&n| dg.cost(n)).sum(),
        forced_break_count: view.forced_breaks.len(),
    };

    Ok(BuildOrderResult {
        order: dg.ids(&order),
        critical_path: dg.ids(&critical),
        forced_breaks: view.forced_breaks,
        self_loops: dg.self_loops.clone(),
        metrics,
    })
}

// ---------------------------------------------------------------------------
// Algorithms
// ---------------------------------------------------------------------------

/// Kahn's algorithm, dependencies first, lowest index among ready nodes.
///
/// `graph` must be acyclic; nodes on a cycle are left out.
#[must_use]
pub fn topological_order<N, E>(graph: &DiGraph<N, E>) -> Vec<NodeIndex> {
    let mut remaining: Vec<usize> = graph
        .node_indices()
        .map(|n| graph.neighbors_directed(n, Direction::Outgoing).count())
        .collect();

    let mut ready: BinaryHeap<Reverse<NodeIndex>> = graph
        .node_indices()
        .filter(|n| remaining[n.index()] == 0)
        .map(Reverse)
        .collect();

    let mut order = Vec::with_capacity(graph.node_count());
    while let Some(Reverse(node)) = ready.pop() {
        order.push(node);
        for dependent in graph.neighbors_directed(node, Direction::Incoming) {
            let left = &mut remaining[dependent.index()];
            *left = left.saturating_sub(1);
            if *left == 0 {
                ready.push(Reverse(dependent));
            }
        }
    }
    order
}

/// Maximum-weight path over `topo` (dependencies first).
///
/// Returns the path dependent-first and its accumulated edge weight. With
/// no edges the path is the lowest-id node alone.
fn critical_path(graph: &DiGraph<String, f64>, topo: &[NodeIndex]) -> (Vec<NodeIndex>, f64) {
    let n = graph.node_count();
    let mut best = vec![0.0_f64; n];
    let mut next: Vec<Option<NodeIndex>> = vec![None; n];

    for &node in topo {
        let mut deps: Vec<(NodeIndex, f64)> = graph
            .edges_directed(node, Direction::Outgoing)
            .map(|e| (e.target(), *e.weight()))
            .collect();
        deps.sort_unstable_by_key(|&(d, _)| d);

        for (dep, weight) in deps {
            let candidate = weight + best[dep.index()];
            if next[node.index()].is_none() || candidate > best[node.index()] {
                best[node.index()] = candidate;
                next[node.index()] = Some(dep);
            }
        }
    }

    let Some(start) = graph
        .node_indices()
        .reduce(|acc, i| if best[i.index()] > best[acc.index()] { i } else { acc })
    else {
        return (Vec::new(), 0.0);
    };

    let mut path = vec![start];
    let mut cursor = start;
    while let Some(dep) = next[cursor.index()] {
        path.push(dep);
        cursor = dep;
    }
    (path, best[start.index()])
}

/// Changed nodes plus everything that transitively depends on them.
fn rebuild_set(
    dg: &DependencyGraph,
    changed: &BTreeSet<String>,
) -> Result<HashSet<NodeIndex>, PlanError> {
    let mut keep = HashSet::new();
    let mut queue = VecDeque::new();
    for id in changed {
        let idx = dg
            .index_of(id)
            .ok_or_else(|| PlanError::UnknownNode { id: id.clone() })?;
        if keep.insert(idx) {
            queue.push_back(idx);
        }
    }
    while let Some(node) = queue.pop_front() {
        for dependent in dg.graph.neighbors_directed(node, Direction::Incoming) {
            if keep.insert(dependent) {
                queue.push_back(dependent);
            }
        }
    }
    Ok(keep)
}
