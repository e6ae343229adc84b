//! Cycle detection over the dependency view.
//!
//! # Reporting
//!
//! Every strongly connected component with more than one member, and every
//! self-loop, is one cycle. A cycle is reported as a closed walk: each
//! consecutive pair is an edge, and so is `last → first`. The walk starts at
//! the lowest id in the component. When the component is a single simple
//! cycle the walk is that cycle; for denser components the walk may revisit
//! nodes so that it still covers every member.

#![allow(clippy::module_name_repetitions)]

use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};

use petgraph::Direction;
use petgraph::algo::tarjan_scc;
use petgraph::graph::{DiGraph, EdgeIndex, NodeIndex};
use serde::{Deserialize, Serialize};

use crate::graph::build::{DependencyGraph, sorted_neighbors};

/// All cycles in `dg`, sorted.
///
/// Self-loops (held outside the petgraph view) are reported as one-element
/// walks `[id]`.
#[must_use]
pub fn find_all_cycles(dg: &DependencyGraph) -> Vec<Vec<String>> {
    let mut cycles: Vec<Vec<String>> = cyclic_components(&dg.graph)
        .into_iter()
        .map(|component| dg.ids(&closed_walk(&dg.graph, &component)))
        .collect();
    cycles.extend(dg.self_loops.iter().map(|id| vec![id.clone()]));
    cycles.sort_unstable();
    cycles
}

/// Strongly connected components with more than one member.
///
/// Each component is sorted by index; components are sorted by their lowest
/// member.
#[must_use]
pub fn cyclic_components<N, E>(graph: &DiGraph<N, E>) -> Vec<Vec<NodeIndex>> {
    let mut components: Vec<Vec<NodeIndex>> = tarjan_scc(graph)
        .into_iter()
        .filter(|c| c.len() > 1)
        .map(|mut c| {
            c.sort_unstable();
            c
        })
        .collect();
    components.sort_unstable();
    components
}

/// Ids of every node that sits on some cycle (including self-loops).
#[must_use]
pub fn cyclic_nodes(dg: &DependencyGraph) -> BTreeSet<String> {
    cyclic_components(&dg.graph)
        .iter()
        .flatten()
        .map(|&idx| dg.id(idx).to_string())
        .chain(dg.self_loops.iter().cloned())
        .collect()
}

/// Closed walk through every member of a non-trivial SCC.
///
/// Starting from the lowest member, repeatedly take the shortest path (BFS,
/// neighbors in id order) to the lowest member not yet visited. The walk
/// closes implicitly with the shortest path back to the start, whose
/// interior nodes are appended.
fn closed_walk<N, E>(graph: &DiGraph<N, E>, component: &[NodeIndex]) -> Vec<NodeIndex> {
    let members: HashSet<NodeIndex> = component.iter().copied().collect();
    let Some(&start) = component.first() else {
        return Vec::new();
    };

    let mut walk = vec![start];
    let mut visited: HashSet<NodeIndex> = HashSet::from([start]);
    let mut current = start;

    while let Some(&target) = component.iter().find(|n| !visited.contains(n)) {
        let path = shortest_path(graph, &members, current, target);
        for &step in path.iter().skip(1) {
            visited.insert(step);
            walk.push(step);
        }
        current = target;
    }

    let back = shortest_path(graph, &members, current, start);
    if back.len() > 2 {
        walk.extend_from_slice(&back[1..back.len() - 1]);
    }
    walk
}

/// BFS shortest path inside `members`, inclusive of both ends.
///
/// Inside an SCC a path always exists; an empty result means the caller
/// passed nodes from different components.
fn shortest_path<N, E>(
    graph: &DiGraph<N, E>,
    members: &HashSet<NodeIndex>,
    from: NodeIndex,
    to: NodeIndex,
) -> Vec<NodeIndex> {
    let mut parent: HashMap<NodeIndex, NodeIndex> = HashMap::new();
    let mut seen: HashSet<NodeIndex> = HashSet::from([from]);
    let mut queue = VecDeque::from([from]);

    while let Some(current) = queue.pop_front() {
        for next in sorted_neighbors(graph, current, Direction::Outgoing) {
            if !members.contains(&next) {
                continue;
            }
            if next == to {
                let mut path = vec![to, current];
                let mut cursor = current;
                while let Some(&p) = parent.get(&cursor) {
                    path.push(p);
                    cursor = p;
                }
                path.reverse();
                return path;
            }
            if seen.insert(next) {
                parent.insert(next, current);
                queue.push_back(next);
            }
        }
    }
    Vec::new()
}

// ---------------------------------------------------------------------------
// Cycle break suggestions
// ---------------------------------------------------------------------------

/// A cycle with the back edges whose removal makes it acyclic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CycleReport {
    /// Sorted member ids.
    pub members: Vec<String>,
    /// Closed walk through the members.
    pub walk: Vec<String>,
    /// `(dependent, dependency)` edges closing the cycle, sorted.
    pub suggested_breaks: Vec<(String, String)>,
}

/// Detect all cycles and suggest edges to remove to break each one.
///
/// Self-loops are reported with the single edge `(id, id)` as the break.
#[must_use]
pub fn report_cycles_with_breaks(dg: &DependencyGraph) -> Vec<CycleReport> {
    let mut reports: Vec<CycleReport> = cyclic_components(&dg.graph)
        .into_iter()
        .map(|component| {
            let suggested_breaks = back_edges_in_scc(&dg.graph, &component)
                .into_iter()
                .filter_map(|e| dg.graph.edge_endpoints(e))
                .map(|(a, b)| (dg.id(a).to_string(), dg.id(b).to_string()))
                .collect();
            CycleReport {
                members: dg.ids(&component),
                walk: dg.ids(&closed_walk(&dg.graph, &component)),
                suggested_breaks,
            }
        })
        .collect();

    reports.extend(dg.self_loops.iter().map(|id| CycleReport {
        members: vec![id.clone()],
        walk: vec![id.clone()],
        suggested_breaks: vec![(id.clone(), id.clone())],
    }));
    reports.sort_unstable_by(|a, b| a.members.cmp(&b.members));
    reports
}

/// Back edges of an iterative DFS over one SCC.
///
/// The DFS starts from the lowest member and visits neighbors in index
/// order, restarting from the next unvisited member if needed. A back edge
/// points to a node on the current DFS path; removing all of them leaves
/// the component acyclic. Returned sorted by endpoints.
#[must_use]
pub fn back_edges_in_scc<N, E>(graph: &DiGraph<N, E>, component: &[NodeIndex]) -> Vec<EdgeIndex> {
    let members: HashSet<NodeIndex> = component.iter().copied().collect();
    let inside = |idx: NodeIndex| -> Vec<NodeIndex> {
        sorted_neighbors(graph, idx, Direction::Outgoing)
            .into_iter()
            .filter(|n| members.contains(n))
            .collect()
    };

    let mut visited: HashSet<NodeIndex> = HashSet::new();
    let mut on_path: HashSet<NodeIndex> = HashSet::new();
    let mut back: Vec<(NodeIndex, NodeIndex)> = Vec::new();
    // (node, in-component neighbors, next neighbor position)
    let mut stack: Vec<(NodeIndex, Vec<NodeIndex>, usize)> = Vec::new();

    let mut roots = component.iter().copied();
    loop {
        let Some(frame) = stack.last_mut() else {
            let Some(root) = roots.find(|r| !visited.contains(r)) else {
                break;
            };
            visited.insert(root);
            on_path.insert(root);
            stack.push((root, inside(root), 0));
            continue;
        };

        let current = frame.0;
        if let Some(&next) = frame.1.get(frame.2) {
            frame.2 += 1;
            if on_path.contains(&next) {
                back.push((current, next));
            } else if visited.insert(next) {
                on_path.insert(next);
                stack.push((next, inside(next), 0));
            }
        } else {
            stack.pop();
            on_path.remove(&current);
        }
    }

    back.sort_unstable();
    back.into_iter()
        .filter_map(|(a, b)| graph.find_edge(a, b))
        .collect()
}
