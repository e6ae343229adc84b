//! Cycle & complexity analysis.
//!
//! - `cycles`: see [`crate::graph::cycles`].
//! - `cyclomatic_complexity`: `E − N + 2P` on the simplified dependency
//!   view, where `P` is the number of weakly connected components.
//! - `dependency_depth`: longest path, in edges, through the condensation
//!   DAG, so cycles count as a single step.

use depgraph_core::model::Graph;
use petgraph::algo::connected_components;
use serde::{Deserialize, Serialize};
use tracing::{instrument, warn};

use crate::graph::{Condensed, DependencyGraph, find_all_cycles};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComplexityReport {
    pub cycles: Vec<Vec<String>>,
    pub cyclomatic_complexity: usize,
    pub dependency_depth: usize,
}

/// Analyze a model graph with default weights.
#[must_use]
pub fn analyze(graph: &Graph) -> ComplexityReport {
    let dg = DependencyGraph::from_graph(graph);
    analyze_dependency_graph(&dg, &Condensed::from_dependency_graph(&dg))
}

/// Analyze an already-built dependency view.
#[must_use]
#[instrument(skip_all, fields(nodes = dg.node_count(), edges = dg.edge_count()))]
pub fn analyze_dependency_graph(dg: &DependencyGraph, condensed: &Condensed) -> ComplexityReport {
    let cycles = find_all_cycles(dg);
    if !cycles.is_empty() {
        warn!(count = cycles.len(), "dependency cycles detected");
    }

    ComplexityReport {
        cycles,
        cyclomatic_complexity: cyclomatic_complexity(dg),
        dependency_depth: condensed.longest_path_len(),
    }
}

/// `E − N + 2P`. Never negative, since `E ≥ N − P` for any graph.
#[must_use]
pub fn cyclomatic_complexity(dg: &DependencyGraph) -> usize {
    if dg.is_empty() {
        return 0;
    }
    let components = connected_components(&dg.graph);
    (dg.edge_count() + 2 * components).saturating_sub(dg.node_count())
}
