//! Summary statistics for a dependency graph.
//!
//! Counts refer to the simplified dependency view (parallel edges collapsed,
//! self-loops held aside) unless noted.
//!
//! - **density**: `edge_count / (node_count * (node_count - 1))`; zero for
//!   graphs with fewer than two nodes.
//! - **scc_count / cycle_count**: components of the condensation, and how
//!   many of them hold more than one node.
//! - **redundant_edge_count**: edges implied by longer paths (removed by
//!   transitive reduction of the condensation). `None` when the
//!   condensation has more components than the configured limit.

use petgraph::Direction;
use petgraph::algo::connected_components;
use serde::{Deserialize, Serialize};

use crate::graph::build::DependencyGraph;
use tracing::debug;

use crate::graph::normalize::{Condensed, redundant_edges};

// ---------------------------------------------------------------------------
// GraphStats
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphStats {
    pub node_count: usize,
    pub edge_count: usize,
    pub self_loop_count: usize,
    pub density: f64,
    pub scc_count: usize,
    pub cycle_count: usize,
    pub weakly_connected_component_count: usize,
    /// Nodes with no dependencies and no dependents.
    pub isolated_node_count: usize,
    /// Most dependents on one node.
    pub max_in_degree: usize,
    /// Most dependencies of one node.
    pub max_out_degree: usize,
    pub redundant_edge_count: Option<usize>,
}

impl GraphStats {
    /// Stats for `dg`. The redundant-edge scan is skipped when the
    /// condensation has more than `reduction_limit` components.
    #[must_use]
    pub fn compute(dg: &DependencyGraph, condensed: &Condensed, reduction_limit: usize) -> Self {
        let g = &dg.graph;
        let node_count = g.node_count();
        let edge_count = g.edge_count();

        let degree = |dir: Direction| g.node_indices().map(move |n| g.neighbors_directed(n, dir).count());

        let isolated_node_count = g
            .node_indices()
            .filter(|&n| {
                g.neighbors_directed(n, Direction::Incoming).next().is_none()
                    && g.neighbors_directed(n, Direction::Outgoing).next().is_none()
                    && !dg.has_self_loop(dg.id(n))
            })
            .count();

        let redundant_edge_count = if condensed.scc_count() <= reduction_limit {
            Some(redundant_edges(&condensed.dag).len())
        } else {
            debug!(
                components = condensed.scc_count(),
                limit = reduction_limit,
                "skipping redundant edge scan"
            );
            None
        };

        Self {
            node_count,
            edge_count,
            self_loop_count: dg.self_loops.len(),
            density: compute_density(node_count, edge_count),
            scc_count: condensed.scc_count(),
            cycle_count: condensed.cycle_count() + dg.self_loops.len(),
            weakly_connected_component_count: connected_components(g),
            isolated_node_count,
            max_in_degree: degree(Direction::Incoming).max().unwrap_or(0),
            max_out_degree: degree(Direction::Outgoing).max().unwrap_or(0),
            redundant_edge_count,
        }
    }
}

#[allow(clippy::cast_precision_loss)]
fn compute_density(nodes: usize, edges: usize) -> f64 {
    if nodes < 2 {
        return 0.0;
    }
    edges as f64 / (nodes as f64 * (nodes - 1) as f64)
}
