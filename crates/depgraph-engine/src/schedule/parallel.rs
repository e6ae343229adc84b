//! Level-based parallel execution planning.
//!
//! `level(n) = 0` for a node without dependencies, otherwise
//! `1 + max(level(d))` over its dependencies. Nodes on one level never
//! depend on each other and form a candidate group.
//!
//! When a level is larger than the concurrency cap it is split into waves
//! of at most `cap` nodes, longest expected duration first. This is a greedy
//! heuristic, not optimal bin packing.
//!
//! Estimated wall-clock time is the sum over waves of the slowest node in
//! each wave.

#![allow(clippy::module_name_repetitions)]

use std::collections::BTreeMap;
use std::num::NonZeroUsize;

use depgraph_core::error::PlanError;
use depgraph_core::model::Graph;
use petgraph::Direction;
use petgraph::graph::NodeIndex;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::graph::DependencyGraph;
use crate::schedule::breaks::{ForcedBreak, break_cycles};
use crate::schedule::order::topological_order;

// ---------------------------------------------------------------------------
// Public types
// ---------------------------------------------------------------------------

/// One dependency level, split into cap-sized groups.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Level {
    pub level: usize,
    pub groups: Vec<Vec<String>>,
}

/// One sequential step of the execution plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Wave {
    /// Position in the plan, from 0.
    pub wave: usize,
    pub level: usize,
    pub nodes: Vec<String>,
    /// Cost of the slowest node in the wave.
    pub duration: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParallelMetrics {
    pub node_count: usize,
    pub level_count: usize,
    pub wave_count: usize,
    pub max_group_size: usize,
    /// `None` when unbounded.
    pub max_parallel: Option<usize>,
    /// Sum of all node costs.
    pub sequential_time: f64,
    /// Sum of wave durations.
    pub estimated_time: f64,
    /// `sequential_time / estimated_time`, 1.0 when nothing takes time.
    pub speedup: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParallelPlanResult {
    pub levels: Vec<Level>,
    /// Every group in execution order; same as the waves' node lists.
    pub groups: Vec<Vec<String>>,
    pub execution_plan: Vec<Wave>,
    pub forced_breaks: Vec<ForcedBreak>,
    pub self_loops: Vec<String>,
    pub metrics: ParallelMetrics,
}

// ---------------------------------------------------------------------------
// Entry points
// ---------------------------------------------------------------------------

/// Group `graph` into parallel waves of at most `max_parallel` nodes.
///
/// # Errors
///
/// [`PlanError::InvalidParallelism`] when `max_parallel` is not positive,
/// [`PlanError::EmptyGraph`] when `graph` has no nodes.
pub fn plan_parallel_groups(graph: &Graph, max_parallel: i64) -> Result<ParallelPlanResult, PlanError> {
    let cap = parallelism(max_parallel)?;
    if graph.is_empty() {
        return Err(PlanError::EmptyGraph);
    }
    plan_parallel(&DependencyGraph::from_graph(graph), Some(cap))
}

/// Validate a requested concurrency cap.
///
/// # Errors
///
/// [`PlanError::InvalidParallelism`] for zero or negative values.
pub fn parallelism(max_parallel: i64) -> Result<NonZeroUsize, PlanError> {
    usize::try_from(max_parallel)
        .ok()
        .and_then(NonZeroUsize::new)
        .ok_or(PlanError::InvalidParallelism { value: max_parallel })
}

/// Plan over an existing dependency view; `cap = None` means unbounded.
///
/// # Errors
///
/// [`PlanError::EmptyGraph`] when `dg` has no nodes.
#[instrument(skip_all, fields(nodes = dg.node_count(), cap = cap.map(NonZeroUsize::get)))]
pub fn plan_parallel(
    dg: &DependencyGraph,
    cap: Option<NonZeroUsize>,
) -> Result<ParallelPlanResult, PlanError> {
    if dg.is_empty() {
        return Err(PlanError::EmptyGraph);
    }

    let view = break_cycles(dg);
    let topo = topological_order(&view.graph);

    let mut level_of = vec![0_usize; dg.node_count()];
    for &node in &topo {
        level_of[node.index()] = view
            .graph
            .neighbors_directed(node, Direction::Outgoing)
            .map(|dep| level_of[dep.index()] + 1)
            .max()
            .unwrap_or(0);
    }

    let mut by_level: BTreeMap<usize, Vec<NodeIndex>> = BTreeMap::new();
    for &node in &topo {
        by_level.entry(level_of[node.index()]).or_default().push(node);
    }

    let mut levels = Vec::with_capacity(by_level.len());
    let mut execution_plan = Vec::new();
    for (level, mut nodes) in by_level {
        nodes.sort_unstable_by(|&a, &b| dg.cost(b).total_cmp(&dg.cost(a)).then(a.cmp(&b)));
        let size = cap.map_or(nodes.len(), NonZeroUsize::get).max(1);

        let mut groups = Vec::new();
        for chunk in nodes.chunks(size) {
            let duration = chunk.iter().map(|&n| dg.cost(n)).fold(0.0, f64::max);
            let ids = dg.ids(chunk);
            execution_plan.push(Wave {
                wave: execution_plan.len(),
                level,
                nodes: ids.clone(),
                duration,
            });
            groups.push(ids);
        }
        levels.push(Level { level, groups });
    }

    let sequential_time: f64 = (0..dg.node_count()).map(|i| dg.cost(NodeIndex::new(i))).sum();
    let estimated_time: f64 = execution_plan.iter().map(|w| w.duration).sum();
    let speedup = if estimated_time > 0.0 {
        sequential_time / estimated_time
    } else {
        1.0
    };

    let groups: Vec<Vec<String>> = execution_plan.iter().map(|w| w.nodes.clone()).collect();
    let metrics = ParallelMetrics {
        node_count: dg.node_count(),
        level_count: levels.len(),
        wave_count: execution_plan.len(),
        max_group_size: groups.iter().map(Vec::len).max().unwrap_or(0),
        max_parallel: cap.map(NonZeroUsize::get),
        sequential_time,
        estimated_time,
        speedup,
    };
    debug!(levels = metrics.level_count, waves = metrics.wave_count, "parallel plan ready");

    Ok(ParallelPlanResult {
        levels,
        groups,
        execution_plan,
        forced_breaks: view.forced_breaks,
        self_loops: dg.self_loops.clone(),
        metrics,
    })
}
