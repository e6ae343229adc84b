//! `dg parallel`: group independent nodes into bounded parallel waves.

use std::io::{self, Write};

use anyhow::Result;
use clap::Args;
use depgraph_engine::service::{BuildOptimizationRequest, ParallelExecutionOptimizationResponse};

use super::{Context, SourceArgs, load_facts};
use crate::output::{pretty_kv, pretty_section, render_mode};

/// Arguments for `dg parallel`.
#[derive(Args, Debug)]
pub struct ParallelArgs {
    #[command(flatten)]
    pub source: SourceArgs,

    /// Maximum nodes per wave. Unbounded when omitted.
    #[arg(long, short = 'j', value_name = "N", allow_negative_numbers = true)]
    pub max_parallel: Option<i64>,
}

/// Execute `dg parallel`.
///
/// # Errors
///
/// Returns an error if the facts cannot be loaded, `--max-parallel` is not
/// positive, or planning fails.
pub fn run_parallel(args: &ParallelArgs, ctx: &Context) -> Result<()> {
    let facts = load_facts(&args.source.facts)?;
    let request = BuildOptimizationRequest {
        project_path: args.source.project_path.clone(),
        changed_files: None,
        max_parallel_jobs: args.max_parallel,
    };
    let response = ctx
        .engine(&args.source)
        .optimize_parallel_execution(&request, &facts)?;
    render_mode(ctx.output, &response, render_text, render_pretty)
}

fn render_text(r: &ParallelExecutionOptimizationResponse, w: &mut dyn Write) -> io::Result<()> {
    for wave in &r.execution_plan {
        writeln!(w, "{}\t{}\t{}", wave.wave, wave.level, wave.nodes.join(" "))?;
    }
    writeln!(
        w,
        "estimated_time={} sequential_time={} speedup={:.2}",
        r.metrics.estimated_time, r.metrics.sequential_time, r.metrics.speedup
    )
}

fn render_pretty(r: &ParallelExecutionOptimizationResponse, w: &mut dyn Write) -> io::Result<()> {
    let m = &r.metrics;
    pretty_section(
        w,
        &format!("Execution plan ({} waves over {} levels)", m.wave_count, m.level_count),
    )?;
    for wave in &r.execution_plan {
        writeln!(
            w,
            "wave {:>3}  level {:>3}  {:>8.2}  {}",
            wave.wave,
            wave.level,
            wave.duration,
            wave.nodes.join(", ")
        )?;
    }
    writeln!(w)?;

    pretty_section(w, "Estimate")?;
    let cap = m
        .max_parallel
        .map_or_else(|| "unbounded".to_string(), |n| n.to_string());
    pretty_kv(w, "Max parallel", cap)?;
    pretty_kv(w, "Widest wave", m.max_group_size.to_string())?;
    pretty_kv(w, "Sequential", format!("{:.2}", m.sequential_time))?;
    pretty_kv(w, "Parallel", format!("{:.2}", m.estimated_time))?;
    pretty_kv(w, "Speedup", format!("{:.2}x", m.speedup))?;

    if !r.forced_breaks.is_empty() {
        writeln!(w)?;
        for b in &r.forced_breaks {
            writeln!(w, "dropped cycle edge {} -> {}", b.dependent, b.dependency)?;
        }
    }
    Ok(())
}
