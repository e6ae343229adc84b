//! The petgraph dependency view every analyzer runs on.
//!
//! # Edge Direction
//!
//! An edge `A → B` here always means "A **depends on** B": B must be built
//! (or run) before A. Model edges are normalized through
//! [`Edge::dependency`](depgraph_core::model::Edge::dependency), so
//! `imports`/`calls`/`inherits`/`depends-on` keep their direction and
//! `precedes` is flipped.
//!
//! ## Simplification
//!
//! - Parallel edges (same endpoints, any kind) collapse into one edge
//!   carrying the maximum weight.
//! - Self-loops are not added to the petgraph graph. They are listed in
//!   [`DependencyGraph::self_loops`] and logged as anomalies.
//!
//! ## Index Order
//!
//! Nodes are inserted in id-ascending order, so comparing two `NodeIndex`
//! values compares their ids. Algorithms rely on this for cheap,
//! deterministic tie-breaks.

#![allow(clippy::module_name_repetitions)]

use std::collections::{BTreeMap, BTreeSet, HashMap};

use depgraph_core::config::PlanConfig;
use depgraph_core::model::Graph;
use petgraph::Direction;
use petgraph::graph::{DiGraph, NodeIndex};
use tracing::{instrument, warn};

// ---------------------------------------------------------------------------
// DependencyGraph
// ---------------------------------------------------------------------------

/// Simplified dependency view of a [`Graph`].
#[derive(Debug, Clone)]
pub struct DependencyGraph {
    /// Nodes = ids, edges = `dependent → dependency` with weight.
    pub graph: DiGraph<String, f64>,
    /// Id → index.
    pub node_map: HashMap<String, NodeIndex>,
    /// Expected duration per node, indexed by `NodeIndex::index()`.
    pub costs: Vec<f64>,
    /// Ids of nodes with a self-loop edge, sorted.
    pub self_loops: Vec<String>,
    /// [`Graph::content_hash`] of the source graph.
    pub content_hash: String,
}

impl DependencyGraph {
    /// Build the dependency view with default weights and costs.
    #[must_use]
    pub fn from_graph(graph: &Graph) -> Self {
        Self::with_weights(graph, &PlanConfig::default())
    }

    /// Build the dependency view using `weights` for missing edge weights
    /// and node costs.
    #[must_use]
    #[instrument(skip_all, fields(nodes = graph.node_count(), edges = graph.edge_count()))]
    pub fn with_weights(graph: &Graph, weights: &PlanConfig) -> Self {
        let mut dg = DiGraph::<String, f64>::with_capacity(graph.node_count(), graph.edge_count());
        let mut node_map = HashMap::with_capacity(graph.node_count());
        let mut costs = Vec::with_capacity(graph.node_count());

        for node in graph.nodes() {
            let idx = dg.add_node(node.id.clone());
            node_map.insert(node.id.clone(), idx);
            costs.push(node.cost(weights.default_node_cost));
        }

        let mut collapsed: BTreeMap<(NodeIndex, NodeIndex), f64> = BTreeMap::new();
        let mut self_loops: BTreeSet<String> = BTreeSet::new();

        for edge in graph.edges() {
            let (dependent, dependency) = edge.dependency();
            if dependent == dependency {
                self_loops.insert(dependent.to_string());
                continue;
            }
            let (Some(&from), Some(&to)) = (node_map.get(dependent), node_map.get(dependency))
            else {
                continue;
            };
            let weight = edge.weight(weights.default_edge_weight);
            collapsed
                .entry((from, to))
                .and_modify(|w| *w = w.max(weight))
                .or_insert(weight);
        }

        for ((from, to), weight) in collapsed {
            dg.add_edge(from, to, weight);
        }

        for id in &self_loops {
            warn!(node = %id, "self-loop excluded from planning");
        }

        Self {
            graph: dg,
            node_map,
            costs,
            self_loops: self_loops.into_iter().collect(),
            content_hash: graph.content_hash(),
        }
    }

    #[must_use]
    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    /// Edge count after simplification.
    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.graph.node_count() == 0
    }

    #[must_use]
    pub fn index_of(&self, id: &str) -> Option<NodeIndex> {
        self.node_map.get(id).copied()
    }

    /// Id of a node index. Unknown indices read as the empty string.
    #[must_use]
    pub fn id(&self, idx: NodeIndex) -> &str {
        self.graph.node_weight(idx).map_or("", String::as_str)
    }

    #[must_use]
    pub fn cost(&self, idx: NodeIndex) -> f64 {
        self.costs.get(idx.index()).copied().unwrap_or(0.0)
    }

    /// Whether `id` has a self-loop edge in the source graph.
    #[must_use]
    pub fn has_self_loop(&self, id: &str) -> bool {
        self.self_loops.binary_search_by(|s| s.as_str().cmp(id)).is_ok()
    }

    /// Direct dependencies of `idx`, id-ascending.
    #[must_use]
    pub fn dependencies(&self, idx: NodeIndex) -> Vec<NodeIndex> {
        sorted_neighbors(&self.graph, idx, Direction::Outgoing)
    }

    /// Direct dependents of `idx`, id-ascending.
    #[must_use]
    pub fn dependents(&self, idx: NodeIndex) -> Vec<NodeIndex> {
        sorted_neighbors(&self.graph, idx, Direction::Incoming)
    }

    /// Map indices back to ids.
    #[must_use]
    pub fn ids(&self, indices: &[NodeIndex]) -> Vec<String> {
        indices.iter().map(|&i| self.id(i).to_string()).collect()
    }
}

/// Neighbors in one direction, sorted by index (and therefore by id).
#[must_use]
pub fn sorted_neighbors<N, E>(
    graph: &DiGraph<N, E>,
    idx: NodeIndex,
    direction: Direction,
) -> Vec<NodeIndex> {
    let mut out: Vec<NodeIndex> = graph.neighbors_directed(idx, direction).collect();
    out.sort_unstable();
    out.dedup();
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{graph_with_nodes_and_edges, weighted_graph};
    use depgraph_core::model::{Edge, EdgeKind, Node, NodeKind, NodeType};

    #[test]
    fn indices_follow_id_order() {
        let graph = graph_with_nodes_and_edges(&["c", "a", "b"], &[("c", "a")]);
        let dg = DependencyGraph::from_graph(&graph);

        let a = dg.index_of("a").expect("a");
        let b = dg.index_of("b").expect("b");
        let c = dg.index_of("c").expect("c");
        assert!(a < b && b < c);
        assert_eq!(dg.dependencies(c), vec![a]);
        assert_eq!(dg.dependents(a), vec![c]);
    }

    #[test]
    fn precedes_edges_are_flipped() {
        let graph = Graph::from_parts(
            [
                Node::new("checkout", NodeKind::empty(NodeType::PipelineStep)),
                Node::new("build", NodeKind::empty(NodeType::PipelineStep)),
            ],
            [Edge::new("checkout", "build", EdgeKind::Precedes)],
        )
        .expect("valid graph");
        let dg = DependencyGraph::from_graph(&graph);

        let build = dg.index_of("build").expect("build");
        assert_eq!(dg.ids(&dg.dependencies(build)), vec!["checkout"]);
    }

    #[test]
    fn parallel_edges_collapse_to_max_weight() {
        let mut graph = weighted_graph(&["a", "b"], &[("a", "b", 2.0)]);
        let mut calls = Edge::new("a", "b", EdgeKind::Calls);
        calls.attributes.insert("weight", 5.0);
        graph = Graph::from_parts(graph.nodes().cloned(), graph.edges().cloned().chain([calls]))
            .expect("valid graph");

        let dg = DependencyGraph::from_graph(&graph);
        assert_eq!(dg.edge_count(), 1);
        let w = dg.graph.edge_weights().next().copied().unwrap_or_default();
        assert!((w - 5.0).abs() < f64::EPSILON);
    }

    #[test]
    fn self_loops_are_split_out() {
        let graph = graph_with_nodes_and_edges(&["a", "b"], &[("a", "a"), ("a", "b")]);
        let dg = DependencyGraph::from_graph(&graph);

        assert_eq!(dg.self_loops, vec!["a".to_string()]);
        assert!(dg.has_self_loop("a"));
        assert!(!dg.has_self_loop("b"));
        assert_eq!(dg.edge_count(), 1);
    }
}
