//! Error taxonomy shared by every depgraph layer.
//!
//! - [`BuildError`]: graph construction rejected the input facts.
//! - [`PlanError`]: an algorithm rejected its input before computing.
//! - [`AnalysisError`]: request-level failures, wrapping the two above plus
//!   cancellation, size limits, and malformed request fields.
//!
//! Every error maps to a stable [`ErrorCode`] and an [`ErrorKind`] so callers
//! can distinguish "fix your input" from "retry with a smaller scope".
//! Structural anomalies (cycles, self-loops) are never errors; they are data
//! in the analysis results.

use std::fmt;

use crate::model::EdgeKind;

/// Machine-readable error codes for agent-friendly decision making.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    DanglingEdge,
    EmptyNodeId,
    EmptyGraph,
    UnknownNode,
    InvalidParallelism,
    InvalidRequest,
    ConfigParseError,
    Cancelled,
    GraphTooLarge,
    InternalUnexpected,
}

/// Broad error category used for retry policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Input was rejected before computation. Retrying unchanged won't help.
    Validation,
    /// Cancelled or over configured limits. Retry with a narrower scope.
    Resource,
    /// Invariant violation inside depgraph.
    Internal,
}

impl ErrorCode {
    /// Stable code identifier (`E####`) for machine parsing.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::DanglingEdge => "E1001",
            Self::EmptyNodeId => "E1002",
            Self::EmptyGraph => "E1003",
            Self::UnknownNode => "E1004",
            Self::InvalidParallelism => "E1005",
            Self::InvalidRequest => "E1006",
            Self::ConfigParseError => "E1007",
            Self::Cancelled => "E5001",
            Self::GraphTooLarge => "E5002",
            Self::InternalUnexpected => "E9001",
        }
    }

    /// Short human-facing summary for logs and terminal output.
    #[must_use]
    pub const fn message(self) -> &'static str {
        match self {
            Self::DanglingEdge => "Edge references an unknown node",
            Self::EmptyNodeId => "Node id is empty",
            Self::EmptyGraph => "Graph has no nodes",
            Self::UnknownNode => "Node not found in graph",
            Self::InvalidParallelism => "Parallelism must be positive",
            Self::InvalidRequest => "Invalid request field",
            Self::ConfigParseError => "Config file parse error",
            Self::Cancelled => "Request cancelled",
            Self::GraphTooLarge => "Graph exceeds configured limits",
            Self::InternalUnexpected => "Internal unexpected error",
        }
    }

    /// Optional remediation hint that can be surfaced to operators and agents.
    #[must_use]
    pub const fn hint(self) -> Option<&'static str> {
        match self {
            Self::DanglingEdge => {
                Some("Declare the missing node, or build in permissive mode to stub it.")
            }
            Self::EmptyNodeId => Some("Fix the upstream producer to emit non-empty identifiers."),
            Self::EmptyGraph => Some("Check include/exclude filters; nothing was left to plan."),
            Self::UnknownNode => Some("Use node ids exactly as they appear in the graph."),
            Self::InvalidParallelism => Some("Pass a max parallelism of at least 1."),
            Self::InvalidRequest => None,
            Self::ConfigParseError => Some("Fix syntax in .depgraph/config.toml and retry."),
            Self::Cancelled => Some("Retry the request; cancellation is always safe."),
            Self::GraphTooLarge => {
                Some("Narrow the scope (max_depth, filters, changed_files) or raise [limits].")
            }
            Self::InternalUnexpected => Some("Retry once. If persistent, report a bug with logs."),
        }
    }

    /// Category used for retry decisions.
    #[must_use]
    pub const fn kind(self) -> ErrorKind {
        match self {
            Self::DanglingEdge
            | Self::EmptyNodeId
            | Self::EmptyGraph
            | Self::UnknownNode
            | Self::InvalidParallelism
            | Self::InvalidRequest
            | Self::ConfigParseError => ErrorKind::Validation,
            Self::Cancelled | Self::GraphTooLarge => ErrorKind::Resource,
            Self::InternalUnexpected => ErrorKind::Internal,
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Graph construction failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BuildError {
    /// An edge endpoint does not resolve to a known node.
    #[error("edge {from} -[{kind}]-> {to} references unknown node '{missing}'")]
    DanglingEdge {
        from: String,
        to: String,
        kind: EdgeKind,
        missing: String,
    },

    /// A fact or declaration carried an empty identifier.
    #[error("empty node id in {context}")]
    EmptyNodeId { context: String },
}

impl BuildError {
    /// Machine-readable code.
    #[must_use]
    pub const fn error_code(&self) -> ErrorCode {
        match self {
            Self::DanglingEdge { .. } => ErrorCode::DanglingEdge,
            Self::EmptyNodeId { .. } => ErrorCode::EmptyNodeId,
        }
    }
}

/// Algorithm input rejections.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PlanError {
    /// The graph has zero nodes.
    #[error("graph has no nodes")]
    EmptyGraph,

    /// A requested node id is not present in the graph.
    #[error("node '{id}' not found in graph")]
    UnknownNode { id: String },

    /// Parallelism cap was zero or negative.
    #[error("max_parallel must be a positive integer, got {value}")]
    InvalidParallelism { value: i64 },
}

impl PlanError {
    /// Machine-readable code.
    #[must_use]
    pub const fn error_code(&self) -> ErrorCode {
        match self {
            Self::EmptyGraph => ErrorCode::EmptyGraph,
            Self::UnknownNode { .. } => ErrorCode::UnknownNode,
            Self::InvalidParallelism { .. } => ErrorCode::InvalidParallelism,
        }
    }
}

/// Request-level failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AnalysisError {
    #[error(transparent)]
    Build(#[from] BuildError),

    #[error(transparent)]
    Plan(#[from] PlanError),

    /// The caller cancelled between phases.
    #[error("request cancelled before phase '{phase}'")]
    Cancelled { phase: String },

    /// The graph exceeds a configured size limit.
    #[error("graph too large: {actual} {what} exceeds the limit of {limit}")]
    GraphTooLarge {
        what: &'static str,
        actual: usize,
        limit: usize,
    },

    /// A request field failed validation.
    #[error("invalid request field `{field}`: {reason}")]
    InvalidRequest { field: String, reason: String },
}

impl AnalysisError {
    /// Machine-readable code.
    #[must_use]
    pub const fn error_code(&self) -> ErrorCode {
        match self {
            Self::Build(e) => e.error_code(),
            Self::Plan(e) => e.error_code(),
            Self::Cancelled { .. } => ErrorCode::Cancelled,
            Self::GraphTooLarge { .. } => ErrorCode::GraphTooLarge,
            Self::InvalidRequest { .. } => ErrorCode::InvalidRequest,
        }
    }

    /// Broad category for retry policy.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        self.error_code().kind()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    const ALL: [ErrorCode; 10] = [
        ErrorCode::DanglingEdge,
        ErrorCode::EmptyNodeId,
        ErrorCode::EmptyGraph,
        ErrorCode::UnknownNode,
        ErrorCode::InvalidParallelism,
        ErrorCode::InvalidRequest,
        ErrorCode::ConfigParseError,
        ErrorCode::Cancelled,
        ErrorCode::GraphTooLarge,
        ErrorCode::InternalUnexpected,
    ];

    #[test]
    fn all_codes_are_unique() {
        let mut seen = HashSet::new();
        for code in ALL {
            assert!(seen.insert(code.code()), "duplicate code {}", code.code());
        }
    }

    #[test]
    fn code_format_is_machine_friendly() {
        for code in ALL {
            let text = code.code();
            assert_eq!(text.len(), 5);
            assert!(text.starts_with('E'));
            assert!(text.chars().skip(1).all(|c| c.is_ascii_digit()));
        }
    }

    #[test]
    fn dangling_edge_names_offending_ids() {
        let err = BuildError::DanglingEdge {
            from: "a.py".into(),
            to: "missing.py".into(),
            kind: EdgeKind::Imports,
            missing: "missing.py".into(),
        };
        let text = err.to_string();
        assert!(text.contains("a.py"));
        assert!(text.contains("missing.py"));
        assert_eq!(err.error_code(), ErrorCode::DanglingEdge);
    }

    #[test]
    fn resource_errors_are_retryable_category() {
        let cancelled = AnalysisError::Cancelled {
            phase: "plan".into(),
        };
        assert_eq!(cancelled.kind(), ErrorKind::Resource);

        let wrapped = AnalysisError::from(PlanError::EmptyGraph);
        assert_eq!(wrapped.kind(), ErrorKind::Validation);
        assert_eq!(wrapped.error_code(), ErrorCode::EmptyGraph);
    }
}
