//! Graph visualization payloads.
//!
//! Filtering happens in this order:
//!
//! 1. keep nodes whose type is in `include_node_types` (all when unset);
//! 2. keep edges whose kind is in `include_edge_types` (all when unset);
//! 3. truncate to `max_nodes` by keeping the highest-degree nodes first
//!    (ties by id) and taking the induced subgraph.
//!
//! Output is either the filtered [`Graph`] as JSON, or Graphviz DOT with one
//! cluster per group when `group_by` is set.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt::Write as _;

use depgraph_core::model::{EdgeKind, Graph, Node, NodeType};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

// ---------------------------------------------------------------------------
// Options
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Layout {
    #[default]
    Hierarchical,
    Force,
    Circular,
    Radial,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GroupBy {
    Type,
    Language,
    Directory,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VisualizationFormat {
    #[default]
    Json,
    Dot,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VisualizationOptions {
    pub layout: Layout,
    pub include_node_types: Option<Vec<NodeType>>,
    pub include_edge_types: Option<Vec<EdgeKind>>,
    pub group_by: Option<GroupBy>,
    pub max_nodes: Option<usize>,
    pub format: VisualizationFormat,
}

// ---------------------------------------------------------------------------
// Response
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum VisualizationData {
    Graph(Graph),
    Dot(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VisualizationStats {
    pub total_nodes: usize,
    pub total_edges: usize,
    pub visible_nodes: usize,
    pub visible_edges: usize,
    /// Nodes were dropped by `max_nodes`.
    pub truncated: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VisualizationResponse {
    pub format: VisualizationFormat,
    pub data: VisualizationData,
    pub layout: Layout,
    /// Group label → member ids, when `group_by` is set.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub groups: Option<BTreeMap<String, Vec<String>>>,
    pub stats: VisualizationStats,
}

// ---------------------------------------------------------------------------
// Rendering
// ---------------------------------------------------------------------------

/// Filter, truncate, and render `graph`.
#[must_use]
#[instrument(skip_all, fields(nodes = graph.node_count(), max_nodes = ?options.max_nodes))]
pub fn visualize(graph: &Graph, options: &VisualizationOptions) -> VisualizationResponse {
    let typed: BTreeSet<String> = graph
        .nodes()
        .filter(|n| {
            options
                .include_node_types
                .as_ref()
                .is_none_or(|types| types.contains(&n.node_type()))
        })
        .map(|n| n.id.clone())
        .collect();
    let filtered = graph.subgraph(&typed).filter_edges(|e| {
        options
            .include_edge_types
            .as_ref()
            .is_none_or(|kinds| kinds.contains(&e.kind))
    });

    let (visible, truncated) = match options.max_nodes {
        Some(limit) if filtered.node_count() > limit => {
            (filtered.subgraph(&retain_by_degree(&filtered, limit)), true)
        }
        _ => (filtered, false),
    };
    debug!(visible = visible.node_count(), truncated, "visualization filtered");

    let groups = options.group_by.map(|by| group_nodes(&visible, by));
    let stats = VisualizationStats {
        total_nodes: graph.node_count(),
        total_edges: graph.edge_count(),
        visible_nodes: visible.node_count(),
        visible_edges: visible.edge_count(),
        truncated,
    };

    let data = match options.format {
        VisualizationFormat::Json => VisualizationData::Graph(visible),
        VisualizationFormat::Dot => VisualizationData::Dot(to_dot(&visible, groups.as_ref(), options.layout)),
    };

    VisualizationResponse {
        format: options.format,
        data,
        layout: options.layout,
        groups,
        stats,
    }
}

/// The `limit` highest-degree node ids, ties broken by id.
fn retain_by_degree(graph: &Graph, limit: usize) -> BTreeSet<String> {
    let mut degree: HashMap<&str, usize> = graph.node_ids().map(|id| (id, 0)).collect();
    for edge in graph.edges() {
        for end in [edge.source.as_str(), edge.target.as_str()] {
            if let Some(d) = degree.get_mut(end) {
                *d += 1;
            }
        }
    }

    let mut ranked: Vec<(&str, usize)> = degree.into_iter().collect();
    ranked.sort_unstable_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(b.0)));
    ranked
        .into_iter()
        .take(limit)
        .map(|(id, _)| id.to_string())
        .collect()
}

/// Group label for one node.
#[must_use]
pub fn group_label(node: &Node, by: GroupBy) -> String {
    match by {
        GroupBy::Type => node.node_type().to_string(),
        GroupBy::Language => node.language().unwrap_or("unknown").to_string(),
        GroupBy::Directory => node
            .path()
            .unwrap_or(&node.id)
            .rsplit_once('/')
            .map_or_else(|| ".".to_string(), |(dir, _)| dir.to_string()),
    }
}

fn group_nodes(graph: &Graph, by: GroupBy) -> BTreeMap<String, Vec<String>> {
    let mut groups: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for node in graph.nodes() {
        groups.entry(group_label(node, by)).or_default().push(node.id.clone());
    }
    groups
}

fn dot_escape(s: &str) -> String {
    s.replace('\\', "\\\\").replace('"', "\\\"")
}

const fn rankdir(layout: Layout) -> &'static str {
    match layout {
        Layout::Hierarchical => "layout=dot; rankdir=LR;",
        Layout::Force => "layout=fdp;",
        Layout::Circular => "layout=circo;",
        Layout::Radial => "layout=twopi;",
    }
}

/// Graphviz DOT for `graph`, edges drawn `source -> target`.
#[must_use]
pub fn to_dot(
    graph: &Graph,
    groups: Option<&BTreeMap<String, Vec<String>>>,
    layout: Layout,
) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "digraph depgraph {{");
    let _ = writeln!(out, "  {}", rankdir(layout));
    let _ = writeln!(out, "  node [shape=box, style=rounded, fontname=\"Helvetica\"];");

    let node_line = |out: &mut String, indent: &str, node: &Node| {
        let _ = writeln!(
            out,
            "{indent}\"{}\" [label=\"{}\", tooltip=\"{}\"];",
            dot_escape(&node.id),
            dot_escape(&node.id),
            node.node_type()
        );
    };

    match groups {
        Some(groups) => {
            for (i, (label, members)) in groups.iter().enumerate() {
                let _ = writeln!(out, "  subgraph cluster_{i} {{");
                let _ = writeln!(out, "    label=\"{}\";", dot_escape(label));
                for node in members.iter().filter_map(|id| graph.node(id)) {
                    node_line(&mut out, "    ", node);
                }
                let _ = writeln!(out, "  }}");
            }
        }
        None => {
            for node in graph.nodes() {
                node_line(&mut out, "  ", node);
            }
        }
    }

    for edge in graph.edges() {
        let style = if edge.is_direct { "" } else { ", style=dashed" };
        let _ = writeln!(
            out,
            "  \"{}\" -> \"{}\" [label=\"{}\"{style}];",
            dot_escape(&edge.source),
            dot_escape(&edge.target),
            edge.kind
        );
    }
    let _ = writeln!(out, "}}");
    out
}
