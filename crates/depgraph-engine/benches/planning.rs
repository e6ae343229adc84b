use std::collections::BTreeSet;

use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use depgraph_core::config::ImpactConfig;
use depgraph_core::model::{Attributes, Edge, EdgeKind, Graph, Node, NodeKind, NodeType};
use depgraph_engine::impact::{NoTests, analyze_impact};
use depgraph_engine::{analyze, plan_build_order, plan_parallel_groups};

/// (name, layers, nodes per layer)
const TIERS: [(&str, usize, usize); 3] = [("small", 8, 16), ("medium", 20, 50), ("large", 40, 125)];

/// Layered graph: every node depends on up to three nodes of the layer
/// below, plus one back edge per layer so cycle breaking has work to do.
fn layered_graph(layers: usize, width: usize) -> Graph {
    let id = |layer: usize, i: usize| format!("l{layer:03}_{i:04}");
    let mut nodes = Vec::with_capacity(layers * width);
    let mut edges = Vec::new();

    for layer in 0..layers {
        for i in 0..width {
            let cost = f64::from(u32::try_from((layer * 7 + i * 13) % 17 + 1).unwrap_or(1));
            nodes.push(
                Node::new(id(layer, i), NodeKind::empty(NodeType::File))
                    .with_attributes(Attributes::new().with("estimated_duration", cost)),
            );
            if layer > 0 {
                for k in 0..3 {
                    let target = (i * 31 + k * 17) % width;
                    edges.push(Edge::new(id(layer, i), id(layer - 1, target), EdgeKind::Imports));
                }
            }
        }
        if layer > 1 {
            edges.push(Edge::new(id(layer - 2, 0), id(layer, 0), EdgeKind::Imports));
        }
    }
    Graph::from_parts(nodes, edges).unwrap_or_default()
}

fn bench_planning(c: &mut Criterion) {
    let mut group = c.benchmark_group("planning");

    for (name, layers, width) in TIERS {
        let graph = layered_graph(layers, width);
        group.throughput(Throughput::Elements(graph.node_count() as u64));

        group.bench_with_input(BenchmarkId::new("complexity", name), &graph, |b, g| {
            b.iter(|| black_box(analyze(g).cyclomatic_complexity));
        });
        group.bench_with_input(BenchmarkId::new("build_order", name), &graph, |b, g| {
            b.iter(|| black_box(plan_build_order(g, None).map(|r| r.order.len())));
        });
        group.bench_with_input(BenchmarkId::new("parallel", name), &graph, |b, g| {
            b.iter(|| black_box(plan_parallel_groups(g, 8).map(|r| r.metrics.wave_count)));
        });

        let changed: BTreeSet<String> = ["l000_0000".to_string()].into();
        group.bench_with_input(BenchmarkId::new("impact", name), &graph, |b, g| {
            b.iter(|| {
                black_box(
                    analyze_impact(g, &changed, &NoTests, &ImpactConfig::default())
                        .map(|r| r.affected_nodes.len()),
                )
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_planning);
criterion_main!(benches);
