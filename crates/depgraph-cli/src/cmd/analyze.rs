//! `dg analyze`: metrics, complexity, and graph statistics for a project.

use std::io::{self, Write};

use anyhow::Result;
use clap::Args;
use depgraph_engine::service::{DependencyAnalysisRequest, DependencyAnalysisResponse};

use super::{Context, SourceArgs, load_facts};
use crate::output::{pretty_kv, pretty_section, render_mode};

/// Arguments for `dg analyze`.
#[derive(Args, Debug)]
pub struct AnalyzeArgs {
    #[command(flatten)]
    pub source: SourceArgs,

    /// Keep only code nodes in these languages (repeatable).
    #[arg(long = "language", value_name = "LANG")]
    pub languages: Vec<String>,

    /// Keep only nodes whose path matches a glob (repeatable).
    #[arg(long = "include", value_name = "GLOB")]
    pub include: Vec<String>,

    /// Drop nodes whose path matches a glob (repeatable).
    #[arg(long = "exclude", value_name = "GLOB")]
    pub exclude: Vec<String>,

    /// Ignore import facts.
    #[arg(long)]
    pub no_imports: bool,

    /// Ignore call facts.
    #[arg(long)]
    pub no_calls: bool,

    /// Ignore inheritance facts.
    #[arg(long)]
    pub no_classes: bool,

    /// Ignore package facts.
    #[arg(long)]
    pub no_packages: bool,

    /// Drop package facts deeper than this in the dependency tree.
    #[arg(long, value_name = "N")]
    pub max_depth: Option<u32>,
}

impl AnalyzeArgs {
    fn request(&self) -> DependencyAnalysisRequest {
        let non_empty = |v: &[String]| (!v.is_empty()).then(|| v.to_vec());
        DependencyAnalysisRequest {
            languages: non_empty(&self.languages),
            include_patterns: non_empty(&self.include),
            exclude_patterns: non_empty(&self.exclude),
            analyze_imports: !self.no_imports,
            analyze_function_calls: !self.no_calls,
            analyze_class_hierarchy: !self.no_classes,
            analyze_packages: !self.no_packages,
            max_depth: self.max_depth,
            ..DependencyAnalysisRequest::new(self.source.project_path.clone())
        }
    }
}

/// Execute `dg analyze`.
///
/// # Errors
///
/// Returns an error if the facts cannot be loaded or the analysis fails.
pub fn run_analyze(args: &AnalyzeArgs, ctx: &Context) -> Result<()> {
    let facts = load_facts(&args.source.facts)?;
    let response = ctx
        .engine(&args.source)
        .analyze_dependencies(&args.request(), &facts)?;
    render_mode(ctx.output, &response, render_text, render_pretty)
}

fn render_text(r: &DependencyAnalysisResponse, w: &mut dyn Write) -> io::Result<()> {
    let m = &r.metrics;
    writeln!(w, "nodes={} edges={}", m.node_count, m.edge_count)?;
    writeln!(
        w,
        "files={}/{} imports={} calls={} classes={} functions={} packages={}",
        m.analyzed_files,
        m.total_files,
        m.total_imports,
        m.total_calls,
        m.total_classes,
        m.total_functions,
        m.total_packages
    )?;
    writeln!(
        w,
        "dependencies direct={} transitive={} dev={}",
        m.direct_dependencies, m.transitive_dependencies, m.dev_dependencies
    )?;
    writeln!(
        w,
        "cyclomatic={} depth={} cycles={}",
        r.complexity.cyclomatic_complexity,
        r.complexity.dependency_depth,
        r.complexity.cycles.len()
    )?;
    for cycle in &r.complexity.cycles {
        writeln!(w, "cycle {}", cycle.join(" "))?;
    }
    Ok(())
}

fn render_pretty(r: &DependencyAnalysisResponse, w: &mut dyn Write) -> io::Result<()> {
    let m = &r.metrics;
    pretty_section(w, "Metrics")?;
    pretty_kv(w, "Nodes", m.node_count.to_string())?;
    pretty_kv(w, "Edges", m.edge_count.to_string())?;
    pretty_kv(w, "Files", format!("{} of {}", m.analyzed_files, m.total_files))?;
    pretty_kv(w, "Imports", m.total_imports.to_string())?;
    pretty_kv(w, "Calls", m.total_calls.to_string())?;
    pretty_kv(w, "Classes", m.total_classes.to_string())?;
    pretty_kv(w, "Packages", m.total_packages.to_string())?;
    pretty_kv(
        w,
        "Dependencies",
        format!(
            "{} direct, {} transitive, {} dev",
            m.direct_dependencies, m.transitive_dependencies, m.dev_dependencies
        ),
    )?;
    if !m.stubbed_nodes.is_empty() {
        pretty_kv(w, "Stubbed", m.stubbed_nodes.join(", "))?;
    }
    writeln!(w)?;

    pretty_section(w, "Complexity")?;
    pretty_kv(w, "Cyclomatic", r.complexity.cyclomatic_complexity.to_string())?;
    pretty_kv(w, "Depth", r.complexity.dependency_depth.to_string())?;
    if r.complexity.cycles.is_empty() {
        pretty_kv(w, "Cycles", "none")?;
    } else {
        pretty_kv(w, "Cycles", r.complexity.cycles.len().to_string())?;
        for cycle in &r.complexity.cycles {
            writeln!(w, "  {}", cycle.join(" -> "))?;
        }
    }
    writeln!(w)?;

    let s = &r.stats;
    pretty_section(w, "Structure")?;
    pretty_kv(w, "Density", format!("{:.4}", s.density))?;
    pretty_kv(w, "Components", s.weakly_connected_component_count.to_string())?;
    pretty_kv(w, "Isolated", s.isolated_node_count.to_string())?;
    pretty_kv(w, "Max fan-in", s.max_in_degree.to_string())?;
    pretty_kv(w, "Self-loops", s.self_loop_count.to_string())?;
    Ok(())
}
