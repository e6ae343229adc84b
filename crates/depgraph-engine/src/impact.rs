//! Change impact analysis.
//!
//! The affected set is everything that transitively depends on a changed
//! node: a breadth-first search over dependents starting one hop away from
//! the change set. A changed node is itself affected only when it is reached
//! through another node (it depends on something else that changed, sits on
//! a cycle, or has a self-loop).
//!
//! # Risk
//!
//! Factors are reported individually so the verdict can be explained:
//!
//! | Factor          | Severity | Trigger |
//! |-----------------|----------|---------|
//! | `high_fan_in`   | high     | an affected node has more direct dependents than `high_dependents_threshold` |
//! | `cyclic_change` | high     | a changed node sits on a dependency cycle |
//! | `blast_radius`  | medium   | affected / total exceeds `medium_affected_fraction` |
//!
//! `overall_risk` is the highest factor severity, `low` without factors.

#![allow(clippy::module_name_repetitions)]

use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};

use depgraph_core::config::ImpactConfig;
use depgraph_core::error::PlanError;
use depgraph_core::model::{Graph, NodeType};
use petgraph::graph::NodeIndex;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::graph::DependencyGraph;
use crate::graph::cycles::cyclic_nodes;

// ---------------------------------------------------------------------------
// Test lookup
// ---------------------------------------------------------------------------

/// Caller-supplied mapping from node id to associated test identifiers.
pub trait TestLookup {
    /// Tests for `node_id`; `None` or empty when nothing is declared.
    fn tests_for(&self, node_id: &str) -> Option<&[String]>;
}

impl TestLookup for BTreeMap<String, Vec<String>> {
    fn tests_for(&self, node_id: &str) -> Option<&[String]> {
        self.get(node_id).map(Vec::as_slice)
    }
}

impl<S: std::hash::BuildHasher> TestLookup for HashMap<String, Vec<String>, S> {
    fn tests_for(&self, node_id: &str) -> Option<&[String]> {
        self.get(node_id).map(Vec::as_slice)
    }
}

/// A lookup with no mappings.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoTests;

impl TestLookup for NoTests {
    fn tests_for(&self, _node_id: &str) -> Option<&[String]> {
        None
    }
}

// ---------------------------------------------------------------------------
// Result types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AffectedNode {
    pub id: String,
    pub node_type: NodeType,
    /// Hops from the nearest changed node.
    pub distance: usize,
    /// One hop from a changed node.
    pub direct: bool,
    /// Direct dependents in the whole graph.
    pub dependents_count: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl RiskLevel {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }
}

impl std::fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RiskFactor {
    pub factor: String,
    pub description: String,
    pub severity: RiskLevel,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskAssessment {
    pub overall_risk: RiskLevel,
    pub factors: Vec<RiskFactor>,
    /// Affected nodes over total nodes.
    pub affected_ratio: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestRecommendation {
    pub node_id: String,
    pub node_type: NodeType,
    pub tests: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImpactResult {
    pub changed_nodes: Vec<String>,
    /// Sorted by distance, then id.
    pub affected_nodes: Vec<AffectedNode>,
    pub direct_count: usize,
    pub indirect_count: usize,
    pub risk_assessment: RiskAssessment,
    pub test_recommendations: Vec<TestRecommendation>,
    /// Union of all recommended tests, sorted.
    pub recommended_tests: Vec<String>,
}

impl ImpactResult {
    /// Ids of all affected nodes.
    pub fn affected_ids(&self) -> impl Iterator<Item = &str> {
        self.affected_nodes.iter().map(|a| a.id.as_str())
    }
}

// ---------------------------------------------------------------------------
// Entry points
// ---------------------------------------------------------------------------

/// Analyze the impact of changing `changed` in `graph`.
///
/// # Errors
///
/// [`PlanError::UnknownNode`] when a changed id is not in the graph.
pub fn analyze_impact(
    graph: &Graph,
    changed: &BTreeSet<String>,
    tests: &dyn TestLookup,
    config: &ImpactConfig,
) -> Result<ImpactResult, PlanError> {
    analyze_impact_in(graph, &DependencyGraph::from_graph(graph), changed, tests, config)
}

/// [`analyze_impact`] with a dependency view already built from `graph`.
///
/// # Errors
///
/// Same as [`analyze_impact`].
#[instrument(skip_all, fields(nodes = dg.node_count(), changed = changed.len()))]
pub fn analyze_impact_in(
    graph: &Graph,
    dg: &DependencyGraph,
    changed: &BTreeSet<String>,
    tests: &dyn TestLookup,
    config: &ImpactConfig,
) -> Result<ImpactResult, PlanError> {
    let sources: Vec<NodeIndex> = changed
        .iter()
        .map(|id| {
            dg.index_of(id)
                .ok_or_else(|| PlanError::UnknownNode { id: id.clone() })
        })
        .collect::<Result<_, _>>()?;

    let distances = reverse_reachable(dg, &sources);
    let node_type = |id: &str| graph.node(id).map_or(NodeType::Unknown, |n| n.node_type());

    let mut affected_nodes: Vec<AffectedNode> = distances
        .iter()
        .map(|(&idx, &distance)| {
            let id = dg.id(idx);
            AffectedNode {
                id: id.to_string(),
                node_type: node_type(id),
                distance,
                direct: distance == 1,
                dependents_count: dg.dependents(idx).len(),
            }
        })
        .collect();
    affected_nodes.sort_unstable_by(|a, b| a.distance.cmp(&b.distance).then_with(|| a.id.cmp(&b.id)));

    let direct_count = affected_nodes.iter().filter(|a| a.direct).count();
    let risk_assessment = assess_risk(dg, changed, &affected_nodes, config);

    let mut test_recommendations: Vec<TestRecommendation> = affected_nodes
        .iter()
        .filter(|a| a.node_type.is_code())
        .filter_map(|a| {
            let tests = tests.tests_for(&a.id).filter(|t| !t.is_empty())?;
            Some(TestRecommendation {
                node_id: a.id.clone(),
                node_type: a.node_type,
                tests: tests.to_vec(),
            })
        })
        .collect();
    test_recommendations.sort_unstable_by(|a, b| a.node_id.cmp(&b.node_id));

    let recommended_tests: Vec<String> = test_recommendations
        .iter()
        .flat_map(|r| r.tests.iter().cloned())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();

    debug!(
        affected = affected_nodes.len(),
        risk = %risk_assessment.overall_risk,
        "impact analyzed"
    );

    Ok(ImpactResult {
        changed_nodes: changed.iter().cloned().collect(),
        direct_count,
        indirect_count: affected_nodes.len() - direct_count,
        affected_nodes,
        risk_assessment,
        test_recommendations,
        recommended_tests,
    })
}

// ---------------------------------------------------------------------------
// Internals
// ---------------------------------------------------------------------------

/// Hop distance of every node reachable over dependents from `sources`.
fn reverse_reachable(dg: &DependencyGraph, sources: &[NodeIndex]) -> BTreeMap<NodeIndex, usize> {
    let mut distance: BTreeMap<NodeIndex, usize> = BTreeMap::new();
    let mut queue: VecDeque<NodeIndex> = VecDeque::new();

    let mut seed = |node: NodeIndex, distance: &mut BTreeMap<NodeIndex, usize>| {
        if !distance.contains_key(&node) {
            distance.insert(node, 1);
            queue.push_back(node);
        }
    };
    for &source in sources {
        if dg.has_self_loop(dg.id(source)) {
            seed(source, &mut distance);
        }
        for dependent in dg.dependents(source) {
            seed(dependent, &mut distance);
        }
    }

    while let Some(node) = queue.pop_front() {
        let next = distance.get(&node).copied().unwrap_or(0) + 1;
        for dependent in dg.dependents(node) {
            if let std::collections::btree_map::Entry::Vacant(slot) = distance.entry(dependent) {
                slot.insert(next);
                queue.push_back(dependent);
            }
        }
    }
    distance
}

fn assess_risk(
    dg: &DependencyGraph,
    changed: &BTreeSet<String>,
    affected: &[AffectedNode],
    config: &ImpactConfig,
) -> RiskAssessment {
    let mut factors = Vec::new();

    let fan_in: Vec<&AffectedNode> = affected
        .iter()
        .filter(|a| a.dependents_count > config.high_dependents_threshold)
        .collect();
    if !fan_in.is_empty() {
        let names: Vec<String> = fan_in
            .iter()
            .map(|a| format!("{} ({})", a.id, a.dependents_count))
            .collect();
        factors.push(RiskFactor {
            factor: "high_fan_in".into(),
            description: format!(
                "affected nodes with more than {} dependents: {}",
                config.high_dependents_threshold,
                names.join(", ")
            ),
            severity: RiskLevel::High,
        });
    }

    let on_cycle: Vec<&str> = {
        let cyclic = cyclic_nodes(dg);
        changed
            .iter()
            .filter(|id| cyclic.contains(id.as_str()))
            .map(String::as_str)
            .collect()
    };
    if !on_cycle.is_empty() {
        factors.push(RiskFactor {
            factor: "cyclic_change".into(),
            description: format!("changed nodes on a dependency cycle: {}", on_cycle.join(", ")),
            severity: RiskLevel::High,
        });
    }

    let affected_ratio = ratio(affected.len(), dg.node_count());
    if affected_ratio > config.medium_affected_fraction {
        factors.push(RiskFactor {
            factor: "blast_radius".into(),
            description: format!(
                "{} of {} nodes affected ({:.0}%)",
                affected.len(),
                dg.node_count(),
                affected_ratio * 100.0
            ),
            severity: RiskLevel::Medium,
        });
    }

    RiskAssessment {
        overall_risk: factors.iter().map(|f| f.severity).max().unwrap_or(RiskLevel::Low),
        factors,
        affected_ratio,
    }
}

#[allow(clippy::cast_precision_loss)]
fn ratio(part: usize, total: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }
    part as f64 / total as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::graph_with_nodes_and_edges;

    fn changed(ids: &[&str]) -> BTreeSet<String> {
        ids.iter().map(ToString::to_string).collect()
    }

    fn impact(graph: &Graph, ids: &[&str]) -> ImpactResult {
        analyze_impact(graph, &changed(ids), &NoTests, &ImpactConfig::default()).expect("impact")
    }

    #[test]
    fn dependents_are_affected_dependencies_are_not() {
        let graph = graph_with_nodes_and_edges(&["A", "B", "C"], &[("A", "B"), ("B", "C")]);
        let result = impact(&graph, &["B"]);
        assert_eq!(result.affected_ids().collect::<Vec<_>>(), vec!["A"]);
        assert_eq!(result.direct_count, 1);
        assert_eq!(result.indirect_count, 0);
    }

    #[test]
    fn distances_grow_along_the_chain() {
        let graph = graph_with_nodes_and_edges(
            &["a", "b", "c", "d"],
            &[("a", "b"), ("b", "c"), ("c", "d")],
        );
        let result = impact(&graph, &["d"]);
        let hops: Vec<(&str, usize)> = result
            .affected_nodes
            .iter()
            .map(|a| (a.id.as_str(), a.distance))
            .collect();
        assert_eq!(hops, vec![("c", 1), ("b", 2), ("a", 3)]);
        assert_eq!(result.indirect_count, 2);
    }

    #[test]
    fn changed_node_reached_through_another_change_is_affected() {
        let graph = graph_with_nodes_and_edges(&["a", "b", "c"], &[("a", "b"), ("b", "c")]);
        let result = impact(&graph, &["b", "c"]);
        assert_eq!(result.affected_ids().collect::<Vec<_>>(), vec!["a", "b"]);
    }

    #[test]
    fn cyclic_change_is_high_risk() {
        let graph = graph_with_nodes_and_edges(&["x", "y", "z"], &[("x", "y"), ("y", "x")]);
        let result = impact(&graph, &["x"]);
        assert_eq!(result.risk_assessment.overall_risk, RiskLevel::High);
        assert!(result
            .risk_assessment
            .factors
            .iter()
            .any(|f| f.factor == "cyclic_change"));
        assert_eq!(result.affected_ids().collect::<Vec<_>>(), vec!["y", "x"]);
    }

    #[test]
    fn high_fan_in_uses_threshold() {
        let nodes = ["core", "a", "b", "c"];
        let graph = graph_with_nodes_and_edges(
            &nodes,
            &[("a", "core"), ("b", "core"), ("c", "core"), ("core", "base")],
        );
        let config = ImpactConfig {
            high_dependents_threshold: 2,
            medium_affected_fraction: 1.0,
        };
        let result = analyze_impact(&graph, &changed(&["base"]), &NoTests, &config).expect("impact");
        assert_eq!(result.risk_assessment.overall_risk, RiskLevel::High);
        assert_eq!(result.risk_assessment.factors.len(), 1);
        assert_eq!(result.risk_assessment.factors[0].factor, "high_fan_in");
    }

    #[test]
    fn blast_radius_is_medium_risk() {
        let graph = graph_with_nodes_and_edges(
            &["a", "b", "c", "d"],
            &[("a", "d"), ("b", "d")],
        );
        let result = impact(&graph, &["d"]);
        assert_eq!(result.risk_assessment.overall_risk, RiskLevel::Medium);
        assert!((result.risk_assessment.affected_ratio - 0.5).abs() < 1e-9);
    }

    #[test]
    fn small_change_is_low_risk() {
        let graph = graph_with_nodes_and_edges(
            &["a", "b", "c", "d", "e"],
            &[("a", "b")],
        );
        let result = impact(&graph, &["b"]);
        assert_eq!(result.risk_assessment.overall_risk, RiskLevel::Low);
        assert!(result.risk_assessment.factors.is_empty());
    }

    #[test]
    fn tests_come_only_from_the_lookup() {
        let graph = graph_with_nodes_and_edges(
            &["app.rs", "lib.rs", "util.rs"],
            &[("app.rs", "lib.rs"), ("util.rs", "lib.rs")],
        );
        let lookup = BTreeMap::from([
            ("app.rs".to_string(), vec!["tests/app.rs".to_string()]),
            ("lib.rs".to_string(), vec!["tests/lib.rs".to_string()]),
        ]);
        let result = analyze_impact(&graph, &changed(&["lib.rs"]), &lookup, &ImpactConfig::default())
            .expect("impact");
        assert_eq!(result.test_recommendations.len(), 1);
        assert_eq!(result.test_recommendations[0].node_id, "app.rs");
        assert_eq!(result.recommended_tests, vec!["tests/app.rs"]);
    }

    #[test]
    fn unknown_change_is_rejected() {
        let graph = graph_with_nodes_and_edges(&["a"], &[]);
        let err = analyze_impact(&graph, &changed(&["nope"]), &NoTests, &ImpactConfig::default());
        assert_eq!(err, Err(PlanError::UnknownNode { id: "nope".into() }));
    }

    #[test]
    fn repeated_runs_agree() {
        let graph = graph_with_nodes_and_edges(
            &["a", "b", "c"],
            &[("a", "b"), ("b", "c"), ("c", "a")],
        );
        assert_eq!(impact(&graph, &["b"]), impact(&graph, &["b"]));
    }
}
