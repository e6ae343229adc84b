//! `dg viz`: filtered, size-capped graph for rendering (JSON or Graphviz DOT).

use std::io::{self, Write};

use anyhow::Result;
use clap::Args;
use depgraph_core::model::{EdgeKind, NodeType};
use depgraph_engine::visualize::{
    GroupBy, Layout, VisualizationData, VisualizationFormat, VisualizationOptions,
    VisualizationResponse,
};

use super::{Context, SourceArgs, load_facts, parse_serde};
use crate::output::{pretty_kv, pretty_section, render_mode};

/// Arguments for `dg viz`.
#[derive(Args, Debug)]
pub struct VizArgs {
    #[command(flatten)]
    pub source: SourceArgs,

    /// Layout hint passed through to the renderer.
    #[arg(long, value_parser = parse_serde::<Layout>, default_value = "hierarchical")]
    pub layout: Layout,

    /// Keep only these node types (repeatable).
    #[arg(long = "node-type", value_name = "TYPE", value_parser = parse_serde::<NodeType>)]
    pub node_types: Vec<NodeType>,

    /// Keep only these edge kinds (repeatable).
    #[arg(long = "edge-type", value_name = "KIND", value_parser = parse_serde::<EdgeKind>)]
    pub edge_types: Vec<EdgeKind>,

    /// Group nodes by type, language, or directory.
    #[arg(long, value_parser = parse_serde::<GroupBy>)]
    pub group_by: Option<GroupBy>,

    /// Keep at most this many nodes, highest degree first.
    #[arg(long, value_name = "N")]
    pub max_nodes: Option<usize>,

    /// Emit Graphviz DOT instead of a node/edge listing.
    #[arg(long)]
    pub dot: bool,
}

impl VizArgs {
    fn options(&self) -> VisualizationOptions {
        VisualizationOptions {
            layout: self.layout,
            include_node_types: (!self.node_types.is_empty()).then(|| self.node_types.clone()),
            include_edge_types: (!self.edge_types.is_empty()).then(|| self.edge_types.clone()),
            group_by: self.group_by,
            max_nodes: self.max_nodes,
            format: if self.dot {
                VisualizationFormat::Dot
            } else {
                VisualizationFormat::Json
            },
        }
    }
}

/// Execute `dg viz`.
///
/// # Errors
///
/// Returns an error if the facts cannot be loaded or the graph fails to
/// build.
pub fn run_viz(args: &VizArgs, ctx: &Context) -> Result<()> {
    let facts = load_facts(&args.source.facts)?;
    let response = ctx
        .engine(&args.source)
        .visualize(&args.options(), &facts)?;
    render_mode(ctx.output, &response, render_text, render_pretty)
}

fn render_text(r: &VisualizationResponse, w: &mut dyn Write) -> io::Result<()> {
    match &r.data {
        VisualizationData::Dot(dot) => write!(w, "{dot}"),
        VisualizationData::Graph(graph) => {
            for node in graph.nodes() {
                writeln!(w, "node\t{}\t{}", node.id, node.node_type())?;
            }
            for edge in graph.edges() {
                writeln!(w, "edge\t{}\t{}\t{}", edge.source, edge.target, edge.kind)?;
            }
            Ok(())
        }
    }
}

fn render_pretty(r: &VisualizationResponse, w: &mut dyn Write) -> io::Result<()> {
    if let VisualizationData::Dot(dot) = &r.data {
        return write!(w, "{dot}");
    }
    let s = &r.stats;
    pretty_section(w, "Visualization")?;
    pretty_kv(w, "Nodes", format!("{} of {}", s.visible_nodes, s.total_nodes))?;
    pretty_kv(w, "Edges", format!("{} of {}", s.visible_edges, s.total_edges))?;
    if s.truncated {
        pretty_kv(w, "Truncated", "yes (lowest-degree nodes dropped)")?;
    }
    if let Some(groups) = &r.groups {
        writeln!(w)?;
        pretty_section(w, "Groups")?;
        for (label, members) in groups {
            writeln!(w, "{label} ({}): {}", members.len(), members.join(", "))?;
        }
    }
    writeln!(w)?;
    render_text(r, w)
}
