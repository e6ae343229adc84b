//! `dg cycles`: dependency cycles with suggested edges to break them.

use std::io::{self, Write};

use anyhow::Result;
use clap::Args;
use depgraph_engine::graph::{CycleReport, DependencyGraph, report_cycles_with_breaks};
use serde::Serialize;

use super::{Context, SourceArgs, load_facts};
use crate::output::{pretty_section, render_mode};

/// Arguments for `dg cycles`.
#[derive(Args, Debug)]
pub struct CyclesArgs {
    #[command(flatten)]
    pub source: SourceArgs,
}

#[derive(Debug, Serialize)]
struct CyclesOutput {
    cycles: Vec<CycleReport>,
}

/// Execute `dg cycles`.
///
/// # Errors
///
/// Returns an error if the facts cannot be loaded or the graph fails to
/// build.
pub fn run_cycles(args: &CyclesArgs, ctx: &Context) -> Result<()> {
    let facts = load_facts(&args.source.facts)?;
    let engine = ctx.engine(&args.source);
    let (graph, _) = engine.build_graph(&facts)?;
    let dg = DependencyGraph::with_weights(&graph, &engine.config().plan);
    let payload = CyclesOutput {
        cycles: report_cycles_with_breaks(&dg),
    };
    render_mode(ctx.output, &payload, render_text, render_pretty)
}

fn render_text(payload: &CyclesOutput, w: &mut dyn Write) -> io::Result<()> {
    for cycle in &payload.cycles {
        let breaks: Vec<String> = cycle
            .suggested_breaks
            .iter()
            .map(|(a, b)| format!("{a}->{b}"))
            .collect();
        writeln!(w, "{}\tbreak={}", cycle.walk.join(" "), breaks.join(","))?;
    }
    Ok(())
}

fn render_pretty(payload: &CyclesOutput, w: &mut dyn Write) -> io::Result<()> {
    if payload.cycles.is_empty() {
        return writeln!(w, "No dependency cycles.");
    }
    pretty_section(w, &format!("Dependency cycles ({})", payload.cycles.len()))?;
    for (i, cycle) in payload.cycles.iter().enumerate() {
        let mut walk = cycle.walk.clone();
        if let Some(first) = walk.first().cloned() {
            walk.push(first);
        }
        writeln!(w, "{:>3}. {}", i + 1, walk.join(" -> "))?;
        for (dependent, dependency) in &cycle.suggested_breaks {
            writeln!(w, "     break: {dependent} -> {dependency}")?;
        }
    }
    Ok(())
}
