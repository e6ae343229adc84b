//! Forced cycle breaking.
//!
//! Planners need a DAG, but real graphs have cycles. Rather than fail, the
//! planners remove edges until the dependency view is acyclic and report
//! every removal as a [`ForcedBreak`].
//!
//! # Algorithm
//!
//! For each strongly connected component with more than one member, run the
//! id-ordered DFS from [`back_edges_in_scc`]. Every back edge closes one
//! detected cycle; removing all of them leaves the component acyclic, so a
//! single pass over the components suffices. Breaks are reported per
//! component, lowest weight first (ties by dependent id, then dependency
//! id).

use petgraph::algo::is_cyclic_directed;
use petgraph::graph::DiGraph;
use serde::{Deserialize, Serialize};
use tracing::{instrument, warn};

use crate::graph::DependencyGraph;
use crate::graph::cycles::{back_edges_in_scc, cyclic_components};

/// A dependency edge removed to make the graph schedulable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForcedBreak {
    /// The node whose dependency was dropped.
    pub dependent: String,
    /// The dependency that was dropped.
    pub dependency: String,
    pub weight: f64,
    /// Sorted members of the cycle the edge was part of.
    pub cycle: Vec<String>,
}

/// The dependency view with all cycles broken.
#[derive(Debug, Clone)]
pub struct AcyclicView {
    /// Same node indices as the source [`DependencyGraph`].
    pub graph: DiGraph<String, f64>,
    pub forced_breaks: Vec<ForcedBreak>,
}

/// Break every cycle in `dg`.
///
/// Self-loops are already outside `dg.graph` and never appear here.
#[must_use]
#[instrument(skip_all, fields(nodes = dg.node_count(), edges = dg.edge_count()))]
pub fn break_cycles(dg: &DependencyGraph) -> AcyclicView {
    let mut graph = dg.graph.clone();
    let mut forced_breaks = Vec::new();

    for component in cyclic_components(&dg.graph) {
        let mut chosen: Vec<_> = back_edges_in_scc(&dg.graph, &component)
            .into_iter()
            .filter_map(|e| {
                let (a, b) = dg.graph.edge_endpoints(e)?;
                let w = dg.graph.edge_weight(e).copied()?;
                Some((a, b, w))
            })
            .collect();
        chosen.sort_by(|x, y| x.2.total_cmp(&y.2).then(x.0.cmp(&y.0)).then(x.1.cmp(&y.1)));

        let cycle = dg.ids(&component);
        for (a, b, weight) in chosen {
            if let Some(edge) = graph.find_edge(a, b) {
                graph.remove_edge(edge);
            }
            let brk = ForcedBreak {
                dependent: dg.id(a).to_string(),
                dependency: dg.id(b).to_string(),
                weight,
                cycle: cycle.clone(),
            };
            warn!(
                dependent = %brk.dependent,
                dependency = %brk.dependency,
                weight,
                "forced break to resolve dependency cycle"
            );
            forced_breaks.push(brk);
        }
    }
    debug_assert!(!is_cyclic_directed(&graph));

    AcyclicView {
        graph,
        forced_breaks,
    }
}
