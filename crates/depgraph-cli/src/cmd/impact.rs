//! `dg impact`: what a change affects, how risky it is, and which tests to run.

use std::collections::BTreeMap;
use std::io::{self, Write};
use std::path::PathBuf;

use anyhow::Result;
use clap::Args;
use depgraph_engine::service::{ImpactAnalysisRequest, ImpactAnalysisResponse};

use super::{Context, SourceArgs, load_facts, read_document};
use crate::output::{pretty_kv, pretty_section, render_mode};

/// Arguments for `dg impact`.
#[derive(Args, Debug)]
pub struct ImpactArgs {
    #[command(flatten)]
    pub source: SourceArgs,

    /// Changed file or node id (repeatable).
    #[arg(long = "changed", value_name = "PATH", required = true)]
    pub changed: Vec<String>,

    /// JSON/YAML map of node id to the tests that cover it.
    #[arg(long, value_name = "FILE")]
    pub tests: Option<PathBuf>,
}

/// Execute `dg impact`.
///
/// # Errors
///
/// Returns an error if the facts or test map cannot be loaded, or the
/// analysis fails.
pub fn run_impact(args: &ImpactArgs, ctx: &Context) -> Result<()> {
    let facts = load_facts(&args.source.facts)?;
    let test_mapping = args
        .tests
        .as_deref()
        .map(read_document::<BTreeMap<String, Vec<String>>>)
        .transpose()?;
    let request = ImpactAnalysisRequest {
        project_path: args.source.project_path.clone(),
        changed_files: args.changed.clone(),
        test_mapping,
    };
    let response = ctx
        .engine(&args.source)
        .analyze_impact(&request, &facts)?;
    render_mode(ctx.output, &response, render_text, render_pretty)
}

fn render_text(r: &ImpactAnalysisResponse, w: &mut dyn Write) -> io::Result<()> {
    writeln!(
        w,
        "risk={} affected={} direct={} indirect={}",
        r.risk_assessment.overall_risk,
        r.metrics.affected_count,
        r.metrics.direct_count,
        r.metrics.indirect_count
    )?;
    for node in &r.affected_components {
        writeln!(w, "{}\t{}\t{}", node.distance, node.node_type, node.id)?;
    }
    for rec in &r.test_recommendations {
        writeln!(w, "test\t{}\t{}", rec.node_id, rec.tests.join(" "))?;
    }
    for path in &r.unresolved_files {
        writeln!(w, "unresolved\t{path}")?;
    }
    Ok(())
}

fn render_pretty(r: &ImpactAnalysisResponse, w: &mut dyn Write) -> io::Result<()> {
    let risk = &r.risk_assessment;
    pretty_section(w, "Impact")?;
    pretty_kv(w, "Risk", risk.overall_risk.to_string())?;
    pretty_kv(w, "Changed", r.metrics.changed_count.to_string())?;
    pretty_kv(
        w,
        "Affected",
        format!(
            "{} of {} ({:.1}%)",
            r.metrics.affected_count,
            r.metrics.total_nodes,
            risk.affected_ratio * 100.0
        ),
    )?;
    pretty_kv(
        w,
        "Breakdown",
        format!("{} direct, {} indirect", r.metrics.direct_count, r.metrics.indirect_count),
    )?;
    for factor in &risk.factors {
        writeln!(w, "  [{}] {}: {}", factor.severity, factor.factor, factor.description)?;
    }
    writeln!(w)?;

    if !r.affected_components.is_empty() {
        pretty_section(w, "Affected")?;
        for node in &r.affected_components {
            let marker = if node.direct { "*" } else { " " };
            writeln!(
                w,
                "{marker} {:>3}  {:<14} {}",
                node.distance,
                node.node_type.as_str(),
                node.id
            )?;
        }
        writeln!(w)?;
    }

    if !r.test_recommendations.is_empty() {
        pretty_section(w, "Recommended tests")?;
        for rec in &r.test_recommendations {
            writeln!(w, "{}: {}", rec.node_id, rec.tests.join(", "))?;
        }
        writeln!(w)?;
    }

    if !r.unresolved_files.is_empty() {
        pretty_kv(w, "Unresolved", r.unresolved_files.join(", "))?;
    }
    Ok(())
}
