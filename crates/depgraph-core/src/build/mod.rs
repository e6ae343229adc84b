//! Graph Builder: turns upstream [`RawFact`]s into a validated [`Graph`].
//!
//! The build is two-phase. Every fact first contributes the nodes it
//! observes; only then are edges resolved against the complete node set, so
//! fact order never matters. A target that resolves to nothing is a
//! [`BuildError::DanglingEdge`] unless the caller opted into permissive mode,
//! which stubs the missing node with kind `unknown`.

pub mod fact;

use std::collections::btree_map::Entry;
use std::collections::{BTreeMap, BTreeSet, VecDeque};

use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};

use crate::error::BuildError;
use crate::model::{Edge, EdgeKey, EdgeKind, Graph, KindMerge, Node, NodeKind, NodeType};

pub use fact::{
    CallFact, FactFamily, ImportFact, InheritanceFact, NodeFact, PackageFact, RawFact, StepFact,
};

/// Builder switches.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildOptions {
    /// Stub unresolved edge targets instead of failing.
    pub permissive: bool,
    /// Synthesize transitive `depends-on` edges between packages.
    pub expand_package_closure: bool,
}

/// Counters describing what a build produced.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildReport {
    pub facts: usize,
    pub files: usize,
    pub imports: usize,
    pub calls: usize,
    pub classes: usize,
    pub functions: usize,
    pub packages: usize,
    pub steps: usize,
    pub direct_dependencies: usize,
    pub transitive_dependencies: usize,
    pub dev_dependencies: usize,
    /// Ids created as `unknown` stubs in permissive mode.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub stubbed_nodes: Vec<String>,
    /// Ids whose kind was observed inconsistently.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub kind_conflicts: Vec<String>,
}

impl BuildReport {
    /// Node and edge counters of an existing graph, with no fact history.
    #[must_use]
    pub fn for_graph(graph: &Graph) -> Self {
        let mut report = Self::default();
        report.tally(graph);
        report
    }

    fn tally(&mut self, graph: &Graph) {
        for node in graph.nodes() {
            match &node.kind {
                NodeKind::File { .. } => self.files += 1,
                NodeKind::Class { .. } => self.classes += 1,
                NodeKind::Function { .. } => self.functions += 1,
                NodeKind::Package { is_dev, .. } => {
                    self.packages += 1;
                    if *is_dev == Some(true) {
                        self.dev_dependencies += 1;
                    }
                }
                NodeKind::PipelineStep { .. } => self.steps += 1,
                NodeKind::Unknown => {}
            }
        }
        for edge in graph.edges() {
            match edge.kind {
                EdgeKind::Imports => self.imports += 1,
                EdgeKind::Calls => self.calls += 1,
                EdgeKind::DependsOn if edge.is_direct => self.direct_dependencies += 1,
                EdgeKind::DependsOn => self.transitive_dependencies += 1,
                EdgeKind::Inherits | EdgeKind::Precedes => {}
            }
        }
    }
}

/// Stateless graph builder. Holds options only; nothing survives a call.
#[derive(Debug, Clone, Copy, Default)]
pub struct GraphBuilder {
    options: BuildOptions,
}

impl GraphBuilder {
    #[must_use]
    pub const fn new(options: BuildOptions) -> Self {
        Self { options }
    }

    #[must_use]
    pub const fn options(&self) -> BuildOptions {
        self.options
    }

    /// Build a graph from facts.
    ///
    /// # Errors
    ///
    /// See [`GraphBuilder::build_with_report`].
    pub fn build(&self, facts: &[RawFact]) -> Result<Graph, BuildError> {
        self.build_with_report(facts).map(|(graph, _)| graph)
    }

    /// Build a graph and report what went into it.
    ///
    /// # Errors
    ///
    /// - [`BuildError::EmptyNodeId`] if any fact mentions an empty id.
    /// - [`BuildError::DanglingEdge`] if an edge target is unknown and the
    ///   builder is not permissive.
    #[instrument(skip(self, facts), fields(facts = facts.len(), permissive = self.options.permissive))]
    pub fn build_with_report(&self, facts: &[RawFact]) -> Result<(Graph, BuildReport), BuildError> {
        let mut report = BuildReport {
            facts: facts.len(),
            ..BuildReport::default()
        };
        let mut graph = Graph::new();

        // Phase 1: nodes.
        for fact in facts {
            if fact.ids().iter().any(|id| id.is_empty()) {
                return Err(BuildError::EmptyNodeId {
                    context: fact.label().to_string(),
                });
            }
            for obs in fact.observed_nodes() {
                observe_node(&mut graph, obs, &mut report);
            }
        }

        // Phase 2: edges.
        for fact in facts {
            for obs in fact.observed_edges() {
                let edge = Edge {
                    source: obs.source,
                    target: obs.target,
                    kind: obs.kind,
                    is_direct: obs.is_direct,
                    attributes: obs.attributes,
                };
                self.resolve_endpoints(&mut graph, &edge, &mut report)?;
                insert_edge(&mut graph, edge);
            }
        }

        if self.options.expand_package_closure {
            let added = expand_package_closure(&mut graph);
            debug!(added, "expanded package closure");
        }

        report.tally(&graph);
        debug!(
            nodes = graph.node_count(),
            edges = graph.edge_count(),
            stubs = report.stubbed_nodes.len(),
            "graph built"
        );
        Ok((graph, report))
    }

    fn resolve_endpoints(
        &self,
        graph: &mut Graph,
        edge: &Edge,
        report: &mut BuildReport,
    ) -> Result<(), BuildError> {
        if !self.options.permissive {
            return graph.check_endpoints(edge);
        }
        for endpoint in [&edge.source, &edge.target] {
            if !graph.contains(endpoint) {
                debug!(id = %endpoint, kind = %edge.kind, "stubbing unresolved node");
                graph
                    .nodes_mut()
                    .insert(endpoint.clone(), Node::new(endpoint.clone(), NodeKind::Unknown));
                report.stubbed_nodes.push(endpoint.clone());
            }
        }
        Ok(())
    }
}

/// Build with default (strict) options.
///
/// # Errors
///
/// See [`GraphBuilder::build_with_report`].
pub fn build(facts: &[RawFact]) -> Result<Graph, BuildError> {
    GraphBuilder::default().build(facts)
}

fn observe_node(graph: &mut Graph, obs: fact::NodeObservation, report: &mut BuildReport) {
    let mut slot = match graph.nodes_mut().entry(obs.id.clone()) {
        Entry::Vacant(slot) => {
            slot.insert(Node::new(obs.id, obs.kind).with_attributes(obs.attributes));
            return;
        }
        Entry::Occupied(slot) => slot,
    };
    let existing = slot.get_mut();

    match existing.kind.merge_from(&obs.kind, obs.authoritative) {
        KindMerge::Merged => {}
        KindMerge::Conflict => {
            warn!(
                id = %obs.id,
                kept = %existing.node_type(),
                observed = %obs.kind.node_type(),
                "conflicting node kind, keeping first observation"
            );
            if !report.kind_conflicts.contains(&obs.id) {
                report.kind_conflicts.push(obs.id.clone());
            }
        }
        KindMerge::Replaced => {
            debug!(id = %obs.id, kind = %obs.kind.node_type(), "authoritative kind replaced");
        }
    }
    existing
        .attributes
        .merge_from(&obs.attributes, obs.authoritative);
}

fn insert_edge(graph: &mut Graph, edge: Edge) {
    let edges = graph.edges_mut();
    match edges.get_mut(&edge.key()) {
        Some(existing) => {
            existing.is_direct |= edge.is_direct;
            existing.attributes.merge_from(&edge.attributes, false);
        }
        None => {
            edges.insert(edge.key(), edge);
        }
    }
}

/// Add `depends-on` edges from every package to each package it reaches
/// through two or more hops. Returns how many edges were added.
fn expand_package_closure(graph: &mut Graph) -> usize {
    let is_package = |g: &Graph, id: &str| {
        g.node(id)
            .is_some_and(|n| n.node_type() == NodeType::Package)
    };

    let mut adjacency: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
    for edge in graph.edges() {
        if edge.kind == EdgeKind::DependsOn
            && !edge.is_self_loop()
            && is_package(graph, &edge.source)
            && is_package(graph, &edge.target)
        {
            adjacency.entry(&edge.source).or_default().push(&edge.target);
        }
    }

    let mut synthesized: Vec<Edge> = Vec::new();
    for (&start, direct) in &adjacency {
        let mut seen: BTreeSet<&str> = BTreeSet::from([start]);
        let mut queue: VecDeque<(&str, usize)> = VecDeque::new();
        for &next in direct {
            if seen.insert(next) {
                queue.push_back((next, 1));
            }
        }
        while let Some((current, depth)) = queue.pop_front() {
            if depth >= 2 {
                let key = EdgeKey {
                    source: start.to_string(),
                    target: current.to_string(),
                    kind: EdgeKind::DependsOn,
                };
                if graph.contains_edge(&key) {
                    continue;
                }
                let mut edge = Edge::new(start, current, EdgeKind::DependsOn);
                edge.is_direct = false;
                synthesized.push(edge);
            }
            for &next in adjacency.get(current).map_or(&[][..], Vec::as_slice) {
                if seen.insert(next) {
                    queue.push_back((next, depth + 1));
                }
            }
        }
    }

    let added = synthesized.len();
    let edges = graph.edges_mut();
    for edge in synthesized {
        edges.entry(edge.key()).or_insert(edge);
    }
    added
}
