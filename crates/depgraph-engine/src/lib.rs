#![forbid(unsafe_code)]
#![allow(clippy::module_name_repetitions)]
//! depgraph-engine: analyses and plans over a [`depgraph_core::Graph`].
//!
//! - [`graph`]: the petgraph dependency view, cycles, condensation, stats.
//! - [`complexity`]: cycles, cyclomatic complexity, dependency depth.
//! - [`schedule`]: forced cycle breaks, build order, critical path, and
//!   parallel waves.
//! - [`impact`]: blast radius, risk factors, test recommendations.
//! - [`visualize`]: filtered/truncated graph payloads (JSON or DOT).
//! - [`service`]: request/response orchestration with cancellation and an
//!   optional metrics store.
//!
//! Every algorithm is a pure, single-threaded function of its inputs.
//! Ties are always broken by node id so results are byte-identical across
//! runs.

pub mod complexity;
pub mod graph;
pub mod impact;
pub mod schedule;
pub mod service;
pub mod visualize;

pub use complexity::{ComplexityReport, analyze};
pub use impact::{ImpactResult, RiskLevel, TestLookup, analyze_impact};
pub use schedule::{BuildOrderResult, ParallelPlanResult, plan_build_order, plan_parallel_groups};
pub use service::Engine;
pub use visualize::{VisualizationOptions, VisualizationResponse, visualize};
