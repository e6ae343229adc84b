//! Typed node/edge/graph data structures.
//!
//! # Overview
//!
//! ```text
//! Graph
//!   ├─ nodes: id → Node { id, kind: NodeKind, attributes }
//!   └─ edges: (source, target, kind) → Edge { is_direct, attributes }
//! ```
//!
//! Edges reference nodes by id only. See [`edge`] for how each edge kind maps
//! onto the dependency relation the analyzers consume.

pub mod attr;
pub mod edge;
pub mod graph;
pub mod node;

pub use attr::{AttrValue, Attributes};
pub use edge::{DependencyDirection, Edge, EdgeKey, EdgeKind};
pub use graph::Graph;
pub use node::{KindMerge, Node, NodeKind, NodeType};
