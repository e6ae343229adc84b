#![forbid(unsafe_code)]
#![allow(clippy::module_name_repetitions)]
//! depgraph-core: the dependency graph model and everything shared across
//! depgraph crates.
//!
//! - [`model`]: typed nodes, edges, and the id-keyed [`Graph`] arena.
//! - [`build`]: the fact-driven Graph Builder.
//! - [`error`]: error taxonomy with stable codes.
//! - [`config`]: `.depgraph/config.toml` loading.
//! - [`cancel`]: cooperative cancellation between phases.
//! - [`store`]: the external metrics/cache interface and fingerprints.
//! - [`timing`]: opt-in per-phase timing.
//!
//! # Conventions
//!
//! - **Errors**: typed `thiserror` enums in library APIs; `anyhow` only for
//!   config loading and binaries.
//! - **Logging**: `tracing` macros. Anomalies (self-loops, forced breaks,
//!   kind conflicts) are `warn!`, never errors.

pub mod build;
pub mod cancel;
pub mod config;
pub mod error;
pub mod model;
pub mod store;
pub mod timing;

pub use build::{BuildOptions, BuildReport, GraphBuilder, RawFact};
pub use cancel::CancellationToken;
pub use config::EngineConfig;
pub use error::{AnalysisError, BuildError, ErrorCode, ErrorKind, PlanError};
pub use model::{Edge, EdgeKind, Graph, Node, NodeKind, NodeType};
pub use store::{Fingerprint, InMemoryStore, MetricsStore, StoreError};
