//! `dg order`: dependency-respecting build order and critical path.

use std::io::{self, Write};

use anyhow::Result;
use clap::Args;
use depgraph_engine::service::{BuildOptimizationRequest, BuildOrderOptimizationResponse};

use super::{Context, SourceArgs, load_facts};
use crate::output::{pretty_kv, pretty_section, render_mode};

/// Arguments for `dg order`.
#[derive(Args, Debug)]
pub struct OrderArgs {
    #[command(flatten)]
    pub source: SourceArgs,

    /// Only order what must rebuild after these files change (repeatable).
    #[arg(long = "changed", value_name = "PATH")]
    pub changed: Vec<String>,
}

/// Execute `dg order`.
///
/// # Errors
///
/// Returns an error if the facts cannot be loaded or planning fails.
pub fn run_order(args: &OrderArgs, ctx: &Context) -> Result<()> {
    let facts = load_facts(&args.source.facts)?;
    let request = BuildOptimizationRequest {
        project_path: args.source.project_path.clone(),
        changed_files: (!args.changed.is_empty()).then(|| args.changed.clone()),
        max_parallel_jobs: None,
    };
    let response = ctx
        .engine(&args.source)
        .optimize_build_order(&request, &facts)?;
    render_mode(ctx.output, &response, render_text, render_pretty)
}

fn render_text(r: &BuildOrderOptimizationResponse, w: &mut dyn Write) -> io::Result<()> {
    for id in &r.build_order {
        writeln!(w, "{id}")?;
    }
    writeln!(w, "critical_path\t{}", r.critical_path.join(" "))?;
    for b in &r.forced_breaks {
        writeln!(w, "forced_break\t{}->{}", b.dependent, b.dependency)?;
    }
    for path in &r.unresolved_files {
        writeln!(w, "unresolved\t{path}")?;
    }
    Ok(())
}

fn render_pretty(r: &BuildOrderOptimizationResponse, w: &mut dyn Write) -> io::Result<()> {
    pretty_section(w, &format!("Build order ({} nodes)", r.build_order.len()))?;
    for (i, id) in r.build_order.iter().enumerate() {
        writeln!(w, "{:>4}. {id}", i + 1)?;
    }
    writeln!(w)?;

    pretty_section(w, "Critical path")?;
    if r.critical_path.is_empty() {
        writeln!(w, "(empty)")?;
    } else {
        writeln!(w, "{}", r.critical_path.join(" -> "))?;
    }
    pretty_kv(w, "Length", r.metrics.critical_path_length.to_string())?;
    pretty_kv(w, "Duration", format!("{:.2}", r.metrics.critical_path_duration))?;
    pretty_kv(w, "Total", format!("{:.2}", r.metrics.total_duration))?;

    if !r.forced_breaks.is_empty() || !r.self_loops.is_empty() {
        writeln!(w)?;
        pretty_section(w, "Cycle handling")?;
        for b in &r.forced_breaks {
            writeln!(
                w,
                "dropped {} -> {} (weight {}) in cycle [{}]",
                b.dependent,
                b.dependency,
                b.weight,
                b.cycle.join(", ")
            )?;
        }
        for id in &r.self_loops {
            writeln!(w, "ignored self-loop on {id}")?;
        }
    }

    if !r.unresolved_files.is_empty() {
        writeln!(w)?;
        pretty_kv(w, "Unresolved", r.unresolved_files.join(", "))?;
    }
    Ok(())
}
