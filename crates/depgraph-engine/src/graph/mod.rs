//! petgraph views over the model graph.
//!
//! ## Pipeline
//!
//! ```text
//! depgraph_core::model::Graph
//!        ↓  build::DependencyGraph::with_weights()
//! DependencyGraph (dependent → dependency, may contain cycles)
//!        ↓  normalize::Condensed::from_dependency_graph()
//! Condensed (SCCs collapsed, DAG)
//!        ↓  stats::GraphStats::compute()
//! GraphStats (density, components, cycle count, …)
//! ```
//!
//! [`DependencyGraph::content_hash`] carries the model graph's BLAKE3 hash
//! for cache fingerprints.

pub mod build;
pub mod cycles;
pub mod normalize;
pub mod stats;

pub use build::DependencyGraph;
pub use cycles::{CycleReport, find_all_cycles, report_cycles_with_breaks};
pub use normalize::{Condensed, SccNode};
pub use stats::GraphStats;
