//! SCC condensation and transitive reduction of the dependency view.
//!
//! # Overview
//!
//! 1. **SCC Condensation**: every strongly connected component collapses
//!    into a single [`SccNode`]. The result is a DAG even when the source
//!    graph has dependency cycles, which keeps depth well-defined.
//!
//! 2. **Transitive Reduction**: an edge `A → C` is redundant when a path
//!    `A → B → C` already exists. Dropping every redundant edge keeps the
//!    same reachability with the minimum edge set; their number is reported
//!    as a graph statistic.

#![allow(clippy::module_name_repetitions)]

use std::collections::HashSet;

use fixedbitset::FixedBitSet;
use petgraph::Direction;
use petgraph::algo::{condensation, is_cyclic_directed, toposort};
use petgraph::graph::{DiGraph, EdgeIndex, NodeIndex};
use petgraph::visit::EdgeRef;
use tracing::instrument;

use crate::graph::build::DependencyGraph;

// ---------------------------------------------------------------------------
// Condensed
// ---------------------------------------------------------------------------

/// One strongly connected component.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SccNode {
    /// Member ids, sorted.
    pub members: Vec<String>,
}

impl SccNode {
    /// More than one member means a dependency cycle.
    #[must_use]
    pub fn is_cycle(&self) -> bool {
        self.members.len() > 1
    }
}

/// The condensation DAG of a [`DependencyGraph`].
#[derive(Debug, Clone)]
pub struct Condensed {
    /// Nodes are SCCs; an edge `A → B` means some member of A depends on
    /// some member of B.
    pub dag: DiGraph<SccNode, ()>,
}

impl Condensed {
    /// Condense `dg`.
    #[must_use]
    #[instrument(skip_all, fields(nodes = dg.node_count()))]
    pub fn from_dependency_graph(dg: &DependencyGraph) -> Self {
        let unweighted: DiGraph<String, ()> = dg.graph.map(|_, id| id.clone(), |_, _| ());
        let condensed: DiGraph<Vec<String>, ()> = condensation(unweighted, true);

        let mut dag: DiGraph<SccNode, ()> = condensed.map(
            |_, members| {
                let mut sorted = members.clone();
                sorted.sort_unstable();
                SccNode { members: sorted }
            },
            |_, _| (),
        );
        // condensation keeps parallel edges between components.
        dedup_edges(&mut dag);
        Self { dag }
    }

    #[must_use]
    pub fn scc_count(&self) -> usize {
        self.dag.node_count()
    }

    /// Number of SCCs with more than one member.
    #[must_use]
    pub fn cycle_count(&self) -> usize {
        self.dag.node_weights().filter(|n| n.is_cycle()).count()
    }

    /// Longest path, counted in edges, through the condensation DAG.
    ///
    /// Zero for an empty graph or a graph without edges.
    #[must_use]
    pub fn longest_path_len(&self) -> usize {
        let Ok(topo) = toposort(&self.dag, None) else {
            return 0;
        };
        // Reverse topological order: sinks first.
        let mut depth = vec![0_usize; self.dag.node_count()];
        for &v in topo.iter().rev() {
            depth[v.index()] = self
                .dag
                .neighbors_directed(v, Direction::Outgoing)
                .map(|w| depth[w.index()] + 1)
                .max()
                .unwrap_or(0);
        }
        depth.into_iter().max().unwrap_or(0)
    }
}

fn dedup_edges<N>(graph: &mut DiGraph<N, ()>) {
    let mut seen: HashSet<(NodeIndex, NodeIndex)> = HashSet::new();
    graph.retain_edges(|g, e| {
        g.edge_endpoints(e)
            .is_some_and(|(a, b)| a != b && seen.insert((a, b)))
    });
}

// ---------------------------------------------------------------------------
// Transitive reduction
// ---------------------------------------------------------------------------

/// Edges of a DAG that are implied by a longer path, in index order.
///
/// Removing them gives the transitive reduction. One bitset over the nodes
/// is reused for every source, so memory stays linear. A cyclic input has
/// no reduction and yields nothing.
#[must_use]
pub fn redundant_edges<N, E>(g: &DiGraph<N, E>) -> Vec<EdgeIndex> {
    if is_cyclic_directed(g) {
        return Vec::new();
    }

    let mut reach = FixedBitSet::with_capacity(g.node_count());
    let mut stack: Vec<NodeIndex> = Vec::new();
    let mut redundant = Vec::new();

    for u in g.node_indices() {
        reach.clear();
        // Everything two or more steps away from u.
        stack.extend(
            g.neighbors_directed(u, Direction::Outgoing)
                .flat_map(|v| g.neighbors_directed(v, Direction::Outgoing)),
        );
        while let Some(w) = stack.pop() {
            if !reach.put(w.index()) {
                stack.extend(g.neighbors_directed(w, Direction::Outgoing));
            }
        }
        redundant.extend(
            g.edges_directed(u, Direction::Outgoing)
                .filter(|e| reach.contains(e.target().index()))
                .map(|e| e.id()),
        );
    }
    redundant.sort_unstable();
    redundant
}
