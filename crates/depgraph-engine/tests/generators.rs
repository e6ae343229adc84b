//! proptest strategies for random dependency graphs.

use depgraph_core::model::{Attributes, Edge, EdgeKind, Graph, Node, NodeKind, NodeType};
use proptest::prelude::*;

pub fn node_id(i: usize) -> String {
    format!("n{i:03}")
}

fn assemble(costs: &[f64], edges: &[(usize, usize)]) -> Graph {
    let nodes = costs.iter().enumerate().map(|(i, &cost)| {
        Node::new(node_id(i), NodeKind::empty(NodeType::File))
            .with_attributes(Attributes::new().with("estimated_duration", cost))
    });
    let edges = edges
        .iter()
        .map(|&(a, b)| Edge::new(node_id(a), node_id(b), EdgeKind::Imports));
    Graph::from_parts(nodes, edges).expect("generated graph is valid")
}

/// Raw ingredients: node costs and index pairs.
fn arb_parts(max_nodes: usize) -> impl Strategy<Value = (Vec<f64>, Vec<(usize, usize)>)> {
    (1..=max_nodes).prop_flat_map(|n| {
        (
            prop::collection::vec(0.5_f64..10.0, n),
            prop::collection::vec((0..n, 0..n), 0..=n * 2),
        )
    })
}

/// Acyclic graphs: every edge points from a higher index to a lower one.
pub fn arb_dag(max_nodes: usize) -> impl Strategy<Value = Graph> {
    arb_parts(max_nodes).prop_map(|(costs, pairs)| {
        let edges: Vec<(usize, usize)> = pairs
            .into_iter()
            .filter(|(a, b)| a != b)
            .map(|(a, b)| (a.max(b), a.min(b)))
            .collect();
        assemble(&costs, &edges)
    })
}

/// Arbitrary graphs, including cycles and self-loops.
pub fn arb_graph(max_nodes: usize) -> impl Strategy<Value = Graph> {
    arb_parts(max_nodes).prop_map(|(costs, pairs)| assemble(&costs, &pairs))
}
