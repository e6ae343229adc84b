use std::collections::{BTreeSet, HashMap, VecDeque};

use depgraph_core::config::ImpactConfig;
use depgraph_core::model::Graph;
use depgraph_engine::graph::DependencyGraph;
use depgraph_engine::impact::{NoTests, analyze_impact};
use depgraph_engine::{analyze, plan_build_order, plan_parallel_groups};
use petgraph::algo::has_path_connecting;
use proptest::prelude::*;

#[path = "generators.rs"]
mod generators;
use generators::*;

fn positions(order: &[String]) -> HashMap<&str, usize> {
    order.iter().enumerate().map(|(i, id)| (id.as_str(), i)).collect()
}

/// Every node reachable from `changed` over reversed edges, by brute force.
fn reverse_reachable(graph: &Graph, changed: &BTreeSet<String>) -> BTreeSet<String> {
    let mut dependents: HashMap<&str, Vec<&str>> = HashMap::new();
    for edge in graph.edges() {
        dependents
            .entry(edge.target.as_str())
            .or_default()
            .push(edge.source.as_str());
    }
    let mut seen = BTreeSet::new();
    let mut queue: VecDeque<&str> = changed.iter().map(String::as_str).collect();
    while let Some(node) = queue.pop_front() {
        for &dep in dependents.get(node).into_iter().flatten() {
            if seen.insert(dep.to_string()) {
                queue.push_back(dep);
            }
        }
    }
    seen
}

proptest! {
    #![proptest_config(proptest::test_runner::Config::with_cases(256))]

    #[test]
    fn planning_is_deterministic(graph in arb_graph(24), cap in 1_i64..6) {
        let a = plan_build_order(&graph, None).expect("plan");
        let b = plan_build_order(&graph, None).expect("plan");
        prop_assert_eq!(
            serde_json::to_string(&a).expect("json"),
            serde_json::to_string(&b).expect("json")
        );

        let p = plan_parallel_groups(&graph, cap).expect("plan");
        let q = plan_parallel_groups(&graph, cap).expect("plan");
        prop_assert_eq!(
            serde_json::to_string(&p).expect("json"),
            serde_json::to_string(&q).expect("json")
        );
    }

    #[test]
    fn dependencies_come_first(graph in arb_dag(24)) {
        let result = plan_build_order(&graph, None).expect("plan");
        prop_assert_eq!(result.order.len(), graph.node_count());
        prop_assert!(result.forced_breaks.is_empty());

        let pos = positions(&result.order);
        for edge in graph.edges() {
            prop_assert!(pos[edge.target.as_str()] < pos[edge.source.as_str()]);
        }
    }

    #[test]
    fn broken_cycles_still_order_remaining_edges(graph in arb_graph(24)) {
        let result = plan_build_order(&graph, None).expect("plan");
        prop_assert_eq!(result.order.len(), graph.node_count());

        let broken: BTreeSet<(&str, &str)> = result
            .forced_breaks
            .iter()
            .map(|b| (b.dependent.as_str(), b.dependency.as_str()))
            .collect();
        let pos = positions(&result.order);
        for edge in graph.edges().filter(|e| !e.is_self_loop()) {
            if broken.contains(&(edge.source.as_str(), edge.target.as_str())) {
                continue;
            }
            prop_assert!(pos[edge.target.as_str()] < pos[edge.source.as_str()]);
        }
    }

    #[test]
    fn groups_are_independent_and_bounded(graph in arb_dag(24), cap in 1_i64..6) {
        let plan = plan_parallel_groups(&graph, cap).expect("plan");
        let dg = DependencyGraph::from_graph(&graph);

        let mut seen = 0;
        for group in &plan.groups {
            prop_assert!(!group.is_empty());
            prop_assert!(group.len() <= usize::try_from(cap).expect("positive"));
            seen += group.len();
            for a in group {
                for b in group {
                    if a == b {
                        continue;
                    }
                    let ia = dg.index_of(a).expect("known");
                    let ib = dg.index_of(b).expect("known");
                    prop_assert!(!has_path_connecting(&dg.graph, ia, ib, None));
                }
            }
        }
        prop_assert_eq!(seen, graph.node_count());
    }

    #[test]
    fn every_cycle_is_a_closed_walk(graph in arb_graph(16)) {
        let dg = DependencyGraph::from_graph(&graph);
        let cyclic = petgraph::algo::is_cyclic_directed(&dg.graph) || !dg.self_loops.is_empty();
        let cycles = analyze(&graph).cycles;
        prop_assert_eq!(cyclic, !cycles.is_empty());

        for cycle in &cycles {
            if cycle.len() == 1 {
                prop_assert!(dg.has_self_loop(&cycle[0]));
                continue;
            }
            prop_assert_eq!(cycle.iter().min(), cycle.first());
            for (i, from) in cycle.iter().enumerate() {
                let to = &cycle[(i + 1) % cycle.len()];
                let a = dg.index_of(from).expect("known");
                let b = dg.index_of(to).expect("known");
                prop_assert!(dg.graph.contains_edge(a, b));
            }
        }
    }

    #[test]
    fn impact_is_exactly_reverse_reachability(
        graph in arb_graph(20),
        picks in prop::collection::vec(0_usize..20, 1..4),
    ) {
        let changed: BTreeSet<String> = picks
            .into_iter()
            .map(node_id)
            .filter(|id| graph.contains(id))
            .collect();
        prop_assume!(!changed.is_empty());

        let config = ImpactConfig::default();
        let result = analyze_impact(&graph, &changed, &NoTests, &config).expect("impact");
        let affected: BTreeSet<String> = result.affected_ids().map(ToString::to_string).collect();
        prop_assert_eq!(&affected, &reverse_reachable(&graph, &changed));

        let again = analyze_impact(&graph, &changed, &NoTests, &config).expect("impact");
        prop_assert_eq!(result.risk_assessment, again.risk_assessment);
    }
}
