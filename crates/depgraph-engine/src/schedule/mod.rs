//! Build scheduling over the dependency view.
//!
//! - [`breaks`]: make the view acyclic, reporting every removed edge.
//! - [`order`]: build order and critical path.
//! - [`parallel`]: level grouping into capped waves.

pub mod breaks;
pub mod order;
pub mod parallel;

pub use breaks::{AcyclicView, ForcedBreak, break_cycles};
pub use order::{BuildOrderMetrics, BuildOrderResult, plan_build_order, plan_build_order_with};
pub use parallel::{
    Level, ParallelMetrics, ParallelPlanResult, Wave, parallelism, plan_parallel,
    plan_parallel_groups,
};
