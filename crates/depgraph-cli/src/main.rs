#![forbid(unsafe_code)]

mod cmd;
mod output;

use std::env;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{CommandFactory, Parser, Subcommand};
use depgraph_core::config::{
    EngineConfig, PROJECT_CONFIG_PATH, resolve_config, user_config_path,
};
use depgraph_core::error::{AnalysisError, ErrorCode};
use depgraph_core::timing;
use output::{CliError, OutputMode, render_error, resolve_output_mode};
use tracing::debug;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use crate::cmd::Context;

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "dg: dependency graph analysis and build planning",
    long_about = None
)]
struct Cli {
    /// Output format. Defaults to pretty on a terminal, text when piped.
    #[arg(long, global = true, value_enum)]
    format: Option<OutputMode>,

    /// Shorthand for `--format json`.
    #[arg(long, global = true, hide = true)]
    json: bool,

    /// Emit phase timing report to stderr.
    #[arg(long, global = true)]
    timing: bool,

    /// Config file used instead of `.depgraph/config.toml`.
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    #[command(
        next_help_heading = "Analyze",
        about = "Summarize dependencies, complexity, and structure",
        long_about = "Build the dependency graph from a facts document, apply language and path filters, and report metrics, cycles, cyclomatic complexity, and dependency depth.",
        after_help = "EXAMPLES:\n    # Analyze everything\n    dg analyze --facts facts.json\n\n    # Only Rust sources outside tests/\n    dg analyze --facts facts.json --language rust --exclude 'tests/**'\n\n    # Emit machine-readable output\n    dg analyze --facts facts.json --json"
    )]
    Analyze(cmd::analyze::AnalyzeArgs),

    #[command(
        next_help_heading = "Analyze",
        about = "List dependency cycles",
        long_about = "List every dependency cycle (including self-loops) with the edges whose removal would break it.",
        after_help = "EXAMPLES:\n    # Show cycles\n    dg cycles --facts facts.json\n\n    # Emit machine-readable output\n    dg cycles --facts facts.json --json"
    )]
    Cycles(cmd::cycles::CyclesArgs),

    #[command(
        next_help_heading = "Plan",
        about = "Compute a build order and critical path",
        long_about = "Order nodes so every dependency comes before its dependents and report the critical path. Cycles are broken at the back edges of an id-ordered search, lightest first, and every break is reported.",
        after_help = "EXAMPLES:\n    # Full build order\n    dg order --facts facts.json\n\n    # Only what must rebuild after a change\n    dg order --facts facts.json --changed src/lib.rs"
    )]
    Order(cmd::order::OrderArgs),

    #[command(
        next_help_heading = "Plan",
        about = "Group work into parallel waves",
        long_about = "Group mutually independent nodes into waves of at most --max-parallel nodes and estimate the parallel run time.",
        after_help = "EXAMPLES:\n    # Unbounded parallelism\n    dg parallel --facts pipeline.yaml\n\n    # At most four jobs at a time\n    dg parallel --facts pipeline.yaml -j 4"
    )]
    Parallel(cmd::parallel::ParallelArgs),

    #[command(
        next_help_heading = "Plan",
        about = "Assess the impact of changed files",
        long_about = "Find every node that transitively depends on the changed files, assess the risk of the change, and recommend tests.",
        after_help = "EXAMPLES:\n    # Impact of one file\n    dg impact --facts facts.json --changed src/db.rs\n\n    # With a test map\n    dg impact --facts facts.json --changed src/db.rs --tests tests.yaml"
    )]
    Impact(cmd::impact::ImpactArgs),

    #[command(
        next_help_heading = "Analyze",
        about = "Export the graph for visualization",
        long_about = "Filter the graph by node and edge type, cap its size, and emit it as JSON or Graphviz DOT.",
        after_help = "EXAMPLES:\n    # DOT clustered by directory\n    dg viz --facts facts.json --dot --group-by directory | dot -Tsvg > graph.svg\n\n    # The 50 best-connected files as JSON\n    dg viz --facts facts.json --node-type file --max-nodes 50 --json"
    )]
    Viz(cmd::viz::VizArgs),

    #[command(
        about = "Generate shell completions",
        after_help = "EXAMPLES:\n    # Bash\n    dg completions bash > ~/.local/share/bash-completion/completions/dg"
    )]
    Completions(cmd::completions::CompletionsArgs),
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env("DEPGRAPH_LOG").unwrap_or_else(|_| {
        EnvFilter::new(if env::var("DEBUG").is_ok() {
            "depgraph=debug,info"
        } else {
            "depgraph=info,warn"
        })
    });

    let format = env::var("DEPGRAPH_LOG_FORMAT").unwrap_or_else(|_| "compact".to_string());

    let registry = tracing_subscriber::registry().with(filter);

    match format.as_str() {
        "json" => {
            registry
                .with(fmt::layer().json().with_ansi(false).with_writer(std::io::stderr))
                .init();
        }
        _ => {
            registry
                .with(fmt::layer().compact().with_writer(std::io::stderr))
                .init();
        }
    }
}

/// User config, then the project config or `--config`.
fn load_config(explicit: Option<&Path>) -> Result<EngineConfig, CliError> {
    let config_error = |message: String| CliError::coded(ErrorCode::ConfigParseError, message);

    let project = match explicit {
        Some(path) if !path.exists() => {
            return Err(config_error(format!(
                "config file not found: {}",
                path.display()
            )));
        }
        Some(path) => path.to_path_buf(),
        None => env::current_dir()
            .map_err(|e| CliError::new(format!("cannot read current directory: {e}")))?
            .join(PROJECT_CONFIG_PATH),
    };
    let user = user_config_path();
    debug!(project = %project.display(), user = ?user, "loading config");
    resolve_config(user.as_deref(), Some(&project)).map_err(|e| config_error(format!("{e:#}")))
}

fn run(command: &Commands, ctx: &Context) -> anyhow::Result<()> {
    match command {
        Commands::Analyze(args) => {
            timing::timed("cmd.analyze", || cmd::analyze::run_analyze(args, ctx))
        }
        Commands::Cycles(args) => timing::timed("cmd.cycles", || cmd::cycles::run_cycles(args, ctx)),
        Commands::Order(args) => timing::timed("cmd.order", || cmd::order::run_order(args, ctx)),
        Commands::Parallel(args) => {
            timing::timed("cmd.parallel", || cmd::parallel::run_parallel(args, ctx))
        }
        Commands::Impact(args) => timing::timed("cmd.impact", || cmd::impact::run_impact(args, ctx)),
        Commands::Viz(args) => timing::timed("cmd.viz", || cmd::viz::run_viz(args, ctx)),
        Commands::Completions(args) => timing::timed("cmd.completions", || {
            let mut command = Cli::command();
            cmd::completions::run_completions(args.shell, &mut command)
        }),
    }
}

fn to_cli_error(err: &anyhow::Error) -> CliError {
    err.downcast_ref::<AnalysisError>()
        .map_or_else(|| CliError::new(format!("{err:#}")), CliError::from)
}

fn main() -> ExitCode {
    init_tracing();

    let cli = Cli::parse();
    let output = resolve_output_mode(cli.format, cli.json);
    let timing_enabled = cli.timing || timing::timing_enabled_from_env();
    timing::set_timing_enabled(timing_enabled);
    timing::clear_timings();

    let outcome = if matches!(cli.command, Commands::Completions(_)) {
        let ctx = Context {
            output,
            config: EngineConfig::default(),
        };
        run(&cli.command, &ctx).map_err(|e| to_cli_error(&e))
    } else {
        load_config(cli.config.as_deref()).and_then(|config| {
            let ctx = Context { output, config };
            run(&cli.command, &ctx).map_err(|e| to_cli_error(&e))
        })
    };

    if timing_enabled {
        let report = timing::collect_report();
        if report.is_empty() {
            eprintln!("timing report: no samples recorded");
        } else {
            eprintln!("timing report:");
            eprintln!("{}", report.display_table());
            if let Ok(json) = serde_json::to_string_pretty(&report) {
                eprintln!("timing report (json):");
                eprintln!("{json}");
            }
        }
    }

    match outcome {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            let _ = render_error(output, &error);
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_flag_parses_before_subcommand() {
        let cli = Cli::parse_from(["dg", "--format", "text", "cycles", "--facts", "f.json"]);
        assert_eq!(cli.format, Some(OutputMode::Text));
        assert!(matches!(cli.command, Commands::Cycles(_)));
    }

    #[test]
    fn global_flags_parse_after_subcommand() {
        let cli = Cli::parse_from(["dg", "order", "--facts", "f.json", "--json", "--timing"]);
        assert!(cli.json);
        assert!(cli.timing);
    }

    #[test]
    fn config_flag_is_global() {
        let cli = Cli::parse_from(["dg", "viz", "--facts", "f.json", "--config", "c.toml"]);
        assert_eq!(cli.config, Some(PathBuf::from("c.toml")));
    }

    #[test]
    fn negative_parallelism_reaches_the_engine() {
        let cli = Cli::parse_from(["dg", "parallel", "--facts", "f.json", "--max-parallel", "-2"]);
        match cli.command {
            Commands::Parallel(args) => assert_eq!(args.max_parallel, Some(-2)),
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn impact_requires_changed() {
        assert!(Cli::try_parse_from(["dg", "impact", "--facts", "f.json"]).is_err());
    }

    #[test]
    fn facts_flag_is_required() {
        assert!(Cli::try_parse_from(["dg", "analyze"]).is_err());
    }

    #[test]
    fn all_subcommands_listed() {
        let command = Cli::command();
        let names: Vec<&str> = command.get_subcommands().map(clap::Command::get_name).collect();
        for expected in ["analyze", "cycles", "order", "parallel", "impact", "viz", "completions"] {
            assert!(names.contains(&expected), "missing subcommand {expected}");
        }
    }

    #[test]
    fn missing_explicit_config_is_an_error() {
        let err = load_config(Some(Path::new("/nonexistent/depgraph.toml")))
            .expect_err("should fail");
        assert_eq!(err.error_code.as_deref(), Some("E1007"));
    }

    #[test]
    fn explicit_config_is_loaded() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("depgraph.toml");
        std::fs::write(&path, "[limits]\nmax_nodes = 3\n").expect("write");
        let config = load_config(Some(&path)).expect("load");
        assert_eq!(config.limits.max_nodes, 3);
    }
}
