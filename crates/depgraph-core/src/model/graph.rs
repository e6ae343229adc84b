//! The dependency graph arena.
//!
//! A [`Graph`] owns its nodes in an id-keyed map and stores edges as id
//! pairs, never as node handles. That makes it trivially cloneable and
//! serializable, and means there is no ownership cycle to manage even when
//! the dependency relation itself is cyclic.
//!
//! Graphs are built once per request (see [`crate::build`]) and are
//! immutable afterwards. All iteration is id-ascending so every consumer sees
//! the same order.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::error::BuildError;
use crate::model::edge::{Edge, EdgeKey};
use crate::model::node::{Node, NodeType};

/// A validated set of nodes plus edges between them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "GraphRepr", into = "GraphRepr")]
pub struct Graph {
    nodes: BTreeMap<String, Node>,
    edges: BTreeMap<EdgeKey, Edge>,
}

/// Wire shape: plain node and edge lists.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct GraphRepr {
    #[serde(default)]
    nodes: Vec<Node>,
    #[serde(default)]
    edges: Vec<Edge>,
}

impl TryFrom<GraphRepr> for Graph {
    type Error = BuildError;

    fn try_from(repr: GraphRepr) -> Result<Self, Self::Error> {
        Self::from_parts(repr.nodes, repr.edges)
    }
}

impl From<Graph> for GraphRepr {
    fn from(graph: Graph) -> Self {
        Self {
            nodes: graph.nodes.into_values().collect(),
            edges: graph.edges.into_values().collect(),
        }
    }
}

impl Graph {
    /// An empty graph.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            nodes: BTreeMap::new(),
            edges: BTreeMap::new(),
        }
    }

    /// Assemble a graph from already-resolved nodes and edges.
    ///
    /// Duplicate node ids keep the last node. Duplicate edge keys keep the
    /// last edge.
    ///
    /// # Errors
    ///
    /// [`BuildError::EmptyNodeId`] for a node with an empty id, and
    /// [`BuildError::DanglingEdge`] for an edge whose endpoint is missing.
    pub fn from_parts(
        nodes: impl IntoIterator<Item = Node>,
        edges: impl IntoIterator<Item = Edge>,
    ) -> Result<Self, BuildError> {
        let mut graph = Self::new();
        for node in nodes {
            if node.id.is_empty() {
                return Err(BuildError::EmptyNodeId {
                    context: "node list".to_string(),
                });
            }
            graph.nodes.insert(node.id.clone(), node);
        }
        for edge in edges {
            graph.check_endpoints(&edge)?;
            graph.edges.insert(edge.key(), edge);
        }
        Ok(graph)
    }

    pub(crate) fn check_endpoints(&self, edge: &Edge) -> Result<(), BuildError> {
        for endpoint in [&edge.source, &edge.target] {
            if !self.nodes.contains_key(endpoint) {
                return Err(BuildError::DanglingEdge {
                    from: edge.source.clone(),
                    to: edge.target.clone(),
                    kind: edge.kind,
                    missing: endpoint.clone(),
                });
            }
        }
        Ok(())
    }

    pub(crate) fn nodes_mut(&mut self) -> &mut BTreeMap<String, Node> {
        &mut self.nodes
    }

    pub(crate) fn edges_mut(&mut self) -> &mut BTreeMap<EdgeKey, Edge> {
        &mut self.edges
    }

    /// Look up a node by id.
    #[must_use]
    pub fn node(&self, id: &str) -> Option<&Node> {
        self.nodes.get(id)
    }

    /// Whether a node with `id` exists.
    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.nodes.contains_key(id)
    }

    /// Whether an edge with `key` exists.
    #[must_use]
    pub fn contains_edge(&self, key: &EdgeKey) -> bool {
        self.edges.contains_key(key)
    }

    /// Nodes in id-ascending order.
    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }

    /// Node ids in ascending order.
    pub fn node_ids(&self) -> impl Iterator<Item = &str> {
        self.nodes.keys().map(String::as_str)
    }

    /// Edges ordered by `(source, target, kind)`.
    pub fn edges(&self) -> impl Iterator<Item = &Edge> {
        self.edges.values()
    }

    /// Number of nodes.
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Number of edges (distinct `(source, target, kind)` keys).
    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// Whether the graph has no nodes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Count nodes by type tag.
    #[must_use]
    pub fn count_by_type(&self) -> BTreeMap<NodeType, usize> {
        let mut counts = BTreeMap::new();
        for node in self.nodes.values() {
            *counts.entry(node.node_type()).or_insert(0) += 1;
        }
        counts
    }

    /// The induced subgraph on `ids`.
    ///
    /// Unknown ids are ignored; edges are kept when both endpoints survive.
    #[must_use]
    pub fn subgraph(&self, ids: &BTreeSet<String>) -> Self {
        let nodes = self
            .nodes
            .iter()
            .filter(|(id, _)| ids.contains(*id))
            .map(|(id, node)| (id.clone(), node.clone()))
            .collect();
        let edges = self
            .edges
            .iter()
            .filter(|(key, _)| ids.contains(&key.source) && ids.contains(&key.target))
            .map(|(key, edge)| (key.clone(), edge.clone()))
            .collect();
        Self { nodes, edges }
    }

    /// Same nodes, only the edges for which `keep` returns true.
    #[must_use]
    pub fn filter_edges(&self, keep: impl Fn(&Edge) -> bool) -> Self {
        Self {
            nodes: self.nodes.clone(),
            edges: self
                .edges
                .iter()
                .filter(|(_, edge)| keep(edge))
                .map(|(key, edge)| (key.clone(), edge.clone()))
                .collect(),
        }
    }

    /// BLAKE3 hash of every node and edge, attributes included.
    ///
    /// Used as the graph identity in cache fingerprints, so any observable
    /// difference (a package version, a language, a weight) changes it.
    #[must_use]
    pub fn content_hash(&self) -> String {
        let mut hasher = blake3::Hasher::new();
        for node in self.nodes.values() {
            hash_canonical(&mut hasher, node);
        }
        hasher.update(b"\x01");
        for edge in self.edges.values() {
            hash_canonical(&mut hasher, edge);
        }
        format!("blake3:{}", hasher.finalize())
    }
}

/// Canonical JSON of `value`, NUL-terminated. Every map in the model is a
/// `BTreeMap`, so the encoding is key-ordered.
fn hash_canonical<T: Serialize + std::fmt::Debug>(hasher: &mut blake3::Hasher, value: &T) {
    match serde_json::to_vec(value) {
        Ok(bytes) => {
            hasher.update(&bytes);
        }
        Err(_) => {
            hasher.update(format!("{value:?}").as_bytes());
        }
    }
    hasher.update(b"\x00");
}
