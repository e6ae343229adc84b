//! Known-topology regression tests for the analyzers and planners.
//!
//! Each test uses a hand-crafted graph whose expected output is worked out
//! by hand and hardcoded, so any algorithm change that shifts ordering,
//! grouping, or risk shows up here.

use std::collections::{BTreeMap, BTreeSet};

use depgraph_core::build::{BuildOptions, GraphBuilder, RawFact};
use depgraph_core::config::ImpactConfig;
use depgraph_core::model::{Attributes, Edge, EdgeKind, Graph, Node, NodeKind, NodeType};
use depgraph_engine::impact::{NoTests, RiskLevel, analyze_impact};
use depgraph_engine::{analyze, plan_build_order, plan_parallel_groups};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn build_graph(nodes: &[&str], edges: &[(&str, &str)]) -> Graph {
    let mut all: BTreeSet<&str> = nodes.iter().copied().collect();
    all.extend(edges.iter().flat_map(|&(a, b)| [a, b]));
    Graph::from_parts(
        all.into_iter()
            .map(|id| Node::new(id, NodeKind::empty(NodeType::File))),
        edges
            .iter()
            .map(|&(a, b)| Edge::new(a, b, EdgeKind::Imports)),
    )
    .expect("valid graph")
}

fn ids(list: &[&str]) -> Vec<String> {
    list.iter().map(ToString::to_string).collect()
}

fn set(list: &[&str]) -> BTreeSet<String> {
    list.iter().map(ToString::to_string).collect()
}

// ---------------------------------------------------------------------------
// Scenarios
// ---------------------------------------------------------------------------

#[test]
fn chain_with_transitive_shortcut() {
    let graph = build_graph(&["A", "B", "C"], &[("A", "B"), ("B", "C"), ("A", "C")]);
    let result = plan_build_order(&graph, None).expect("plan");

    assert_eq!(result.order, ids(&["C", "B", "A"]));
    assert_eq!(result.critical_path, ids(&["A", "B", "C"]));
    assert_eq!(result.metrics.critical_path_length, 2);
}

#[test]
fn two_cycle_with_isolated_node() {
    let graph = build_graph(&["X", "Y", "Z"], &[("X", "Y"), ("Y", "X")]);

    assert_eq!(analyze(&graph).cycles, vec![ids(&["X", "Y"])]);

    let result = plan_build_order(&graph, None).expect("plan");
    assert_eq!(result.order.len(), 3);
    assert_eq!(result.forced_breaks.len(), 1);
}

#[test]
fn six_independent_nodes_two_at_a_time() {
    let costs = [("n1", 2.0), ("n2", 9.0), ("n3", 4.0), ("n4", 7.0), ("n5", 1.0), ("n6", 5.0)];
    let graph = Graph::from_parts(
        costs.iter().map(|&(id, cost)| {
            Node::new(id, NodeKind::empty(NodeType::PipelineStep))
                .with_attributes(Attributes::new().with("estimated_duration", cost))
        }),
        [],
    )
    .expect("valid graph");

    let plan = plan_parallel_groups(&graph, 2).expect("plan");
    assert_eq!(plan.levels.len(), 1);
    assert_eq!(
        plan.levels[0].groups,
        vec![ids(&["n2", "n4"]), ids(&["n6", "n3"]), ids(&["n1", "n5"])]
    );
    assert!(plan.groups.iter().all(|g| g.len() == 2));
    // 9 + 5 + 2
    assert!((plan.metrics.estimated_time - 16.0).abs() < 1e-9);
}

#[test]
fn impact_follows_dependents_only() {
    let graph = build_graph(&["A", "B", "C"], &[("A", "B"), ("B", "C")]);
    let result =
        analyze_impact(&graph, &set(&["B"]), &NoTests, &ImpactConfig::default()).expect("impact");
    assert_eq!(result.affected_ids().collect::<Vec<_>>(), vec!["A"]);
}

// ---------------------------------------------------------------------------
// Mixed graphs
// ---------------------------------------------------------------------------

#[test]
fn pipeline_steps_from_facts() {
    let facts: Vec<RawFact> = serde_json::from_value(serde_json::json!([
        {"fact": "step", "id": "checkout", "estimated_duration": 1.0},
        {"fact": "step", "id": "lint", "needs": ["checkout"], "estimated_duration": 2.0},
        {"fact": "step", "id": "test", "needs": ["checkout"], "estimated_duration": 8.0},
        {"fact": "step", "id": "build", "needs": ["checkout"], "estimated_duration": 5.0},
        {"fact": "step", "id": "deploy", "needs": ["lint", "test", "build"], "estimated_duration": 3.0}
    ]))
    .expect("facts");
    let graph = GraphBuilder::new(BuildOptions::default())
        .build(&facts)
        .expect("graph");

    let order = plan_build_order(&graph, None).expect("order");
    assert_eq!(order.order, ids(&["checkout", "build", "lint", "test", "deploy"]));
    assert_eq!(order.critical_path, ids(&["deploy", "build", "checkout"]));
    // 3 + 5 + 1
    assert!((order.metrics.critical_path_duration - 9.0).abs() < 1e-9);

    let plan = plan_parallel_groups(&graph, 2).expect("parallel");
    assert_eq!(
        plan.groups,
        vec![
            ids(&["checkout"]),
            ids(&["test", "build"]),
            ids(&["lint"]),
            ids(&["deploy"])
        ]
    );
    // 1 + 8 + 2 + 3
    assert!((plan.metrics.estimated_time - 14.0).abs() < 1e-9);
    assert!((plan.metrics.sequential_time - 19.0).abs() < 1e-9);
}

#[test]
fn layered_service_graph() {
    // api → {auth, billing} → db; billing → queue; worker → queue
    let graph = build_graph(
        &["api", "auth", "billing", "db", "queue", "worker"],
        &[
            ("api", "auth"),
            ("api", "billing"),
            ("auth", "db"),
            ("billing", "db"),
            ("billing", "queue"),
            ("worker", "queue"),
        ],
    );

    let report = analyze(&graph);
    assert!(report.cycles.is_empty());
    assert_eq!(report.dependency_depth, 2);
    // 6 − 6 + 2·1
    assert_eq!(report.cyclomatic_complexity, 2);

    let order = plan_build_order(&graph, None).expect("order");
    assert_eq!(order.order, ids(&["db", "auth", "queue", "billing", "api", "worker"]));

    let changed = set(&["queue"]);
    let restricted = plan_build_order(&graph, Some(&changed)).expect("order");
    assert_eq!(restricted.order, ids(&["queue", "billing", "api", "worker"]));

    let mapping = BTreeMap::from([
        ("billing".to_string(), vec!["billing_tests".to_string()]),
        ("worker".to_string(), vec!["worker_tests".to_string()]),
    ]);
    let impact =
        analyze_impact(&graph, &changed, &mapping, &ImpactConfig::default()).expect("impact");
    assert_eq!(
        impact.affected_ids().collect::<Vec<_>>(),
        vec!["billing", "worker", "api"]
    );
    assert_eq!(impact.direct_count, 2);
    assert_eq!(impact.recommended_tests, ids(&["billing_tests", "worker_tests"]));
    // 3 of 6 affected
    assert_eq!(impact.risk_assessment.overall_risk, RiskLevel::Medium);
}

#[test]
fn complete_digraph_is_ordered_after_breaking() {
    let names = ["a", "b", "c", "d", "e", "f", "g", "h"];
    let edges: Vec<(&str, &str)> = names
        .iter()
        .flat_map(|&from| names.iter().map(move |&to| (from, to)))
        .filter(|(from, to)| from != to)
        .collect();
    let graph = build_graph(&names, &edges);

    let result = plan_build_order(&graph, None).expect("plan");
    assert_eq!(result.forced_breaks.len(), 28);
    assert_eq!(result.metrics.forced_break_count, 28);
    // Only a → b → … → h style edges remain, so h builds first.
    assert_eq!(result.order, ids(&["h", "g", "f", "e", "d", "c", "b", "a"]));
}
