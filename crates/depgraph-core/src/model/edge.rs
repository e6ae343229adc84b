//! Directed relationships between nodes.
//!
//! # Direction
//!
//! Edge direction is declared per [`EdgeKind`]. Code relationships
//! (`imports`, `calls`, `inherits`, `depends-on`) point from the dependent to
//! its dependency: `a.py imports b.py` means `a.py` needs `b.py`. Pipeline
//! precedence points the other way: `checkout precedes build` means `build`
//! needs `checkout`. [`Edge::dependency`] normalizes both into a
//! `(dependent, dependency)` pair, which is the only direction the analysis
//! algorithms ever look at.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::model::attr::Attributes;

/// Attribute key for an explicit edge weight.
pub const ATTR_WEIGHT: &str = "weight";
/// Fallback attribute key for an edge weight.
pub const ATTR_COST: &str = "cost";

/// The relationship an edge represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EdgeKind {
    Imports,
    Calls,
    Inherits,
    DependsOn,
    Precedes,
}

/// How an edge kind maps onto the dependency relation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DependencyDirection {
    /// `source` depends on `target`.
    SourceDependsOnTarget,
    /// `target` depends on `source`.
    TargetDependsOnSource,
}

impl EdgeKind {
    /// Stable wire name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Imports => "imports",
            Self::Calls => "calls",
            Self::Inherits => "inherits",
            Self::DependsOn => "depends-on",
            Self::Precedes => "precedes",
        }
    }

    /// Declared direction of this kind relative to the dependency relation.
    #[must_use]
    pub const fn dependency_direction(self) -> DependencyDirection {
        match self {
            Self::Imports | Self::Calls | Self::Inherits | Self::DependsOn => {
                DependencyDirection::SourceDependsOnTarget
            }
            Self::Precedes => DependencyDirection::TargetDependsOnSource,
        }
    }
}

impl fmt::Display for EdgeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EdgeKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "imports" => Ok(Self::Imports),
            "calls" => Ok(Self::Calls),
            "inherits" => Ok(Self::Inherits),
            "depends-on" | "depends_on" => Ok(Self::DependsOn),
            "precedes" => Ok(Self::Precedes),
            other => Err(format!("unknown edge type '{other}'")),
        }
    }
}

/// Identity of an edge inside a [`crate::model::Graph`].
///
/// Two observations with the same key are the same edge.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EdgeKey {
    pub source: String,
    pub target: String,
    pub kind: EdgeKind,
}

/// A directed relationship `source → target`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Edge {
    pub source: String,
    pub target: String,
    #[serde(rename = "type")]
    pub kind: EdgeKind,
    /// `true` when observed from a single source statement, `false` when
    /// synthesized by closure/expansion.
    #[serde(default = "default_true")]
    pub is_direct: bool,
    #[serde(default, skip_serializing_if = "Attributes::is_empty")]
    pub attributes: Attributes,
}

const fn default_true() -> bool {
    true
}

impl Edge {
    /// Create a direct edge with no attributes.
    #[must_use]
    pub fn new(source: impl Into<String>, target: impl Into<String>, kind: EdgeKind) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
            kind,
            is_direct: true,
            attributes: Attributes::new(),
        }
    }

    /// Identity key of this edge.
    #[must_use]
    pub fn key(&self) -> EdgeKey {
        EdgeKey {
            source: self.source.clone(),
            target: self.target.clone(),
            kind: self.kind,
        }
    }

    /// Normalized `(dependent, dependency)` pair.
    #[must_use]
    pub fn dependency(&self) -> (&str, &str) {
        match self.kind.dependency_direction() {
            DependencyDirection::SourceDependsOnTarget => (&self.source, &self.target),
            DependencyDirection::TargetDependsOnSource => (&self.target, &self.source),
        }
    }

    /// Whether source and target are the same node.
    #[must_use]
    pub fn is_self_loop(&self) -> bool {
        self.source == self.target
    }

    /// Edge weight from `weight`/`cost` attributes, falling back to `default`.
    ///
    /// Negative and non-finite values are treated as absent.
    #[must_use]
    pub fn weight(&self, default: f64) -> f64 {
        let valid = |w: &f64| w.is_finite() && *w >= 0.0;
        self.attributes
            .get_number(ATTR_WEIGHT)
            .filter(valid)
            .or_else(|| self.attributes.get_number(ATTR_COST).filter(valid))
            .unwrap_or(default)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn imports_point_at_dependency() {
        let edge = Edge::new("a.py", "b.py", EdgeKind::Imports);
        assert_eq!(edge.dependency(), ("a.py", "b.py"));
    }

    #[test]
    fn precedes_is_reversed() {
        let edge = Edge::new("checkout", "build", EdgeKind::Precedes);
        assert_eq!(edge.dependency(), ("build", "checkout"));
    }

    #[test]
    fn weight_falls_back_through_cost_then_default() {
        let mut edge = Edge::new("a", "b", EdgeKind::DependsOn);
        assert!((edge.weight(1.0) - 1.0).abs() < f64::EPSILON);

        edge.attributes.insert(ATTR_COST, 3.0);
        assert!((edge.weight(1.0) - 3.0).abs() < f64::EPSILON);

        edge.attributes.insert(ATTR_WEIGHT, 5.0);
        assert!((edge.weight(1.0) - 5.0).abs() < f64::EPSILON);

        edge.attributes.insert(ATTR_WEIGHT, -2.0);
        assert!((edge.weight(1.0) - 3.0).abs() < f64::EPSILON);
    }

    #[test]
    fn invalid_weight_and_cost_fall_back_to_default() {
        let mut edge = Edge::new("a", "b", EdgeKind::Imports);
        edge.attributes.insert(ATTR_WEIGHT, f64::NAN);
        edge.attributes.insert(ATTR_COST, 4.0);
        assert!((edge.weight(1.0) - 4.0).abs() < f64::EPSILON);

        edge.attributes.insert(ATTR_COST, f64::INFINITY);
        assert!((edge.weight(2.0) - 2.0).abs() < f64::EPSILON);
    }

    #[test]
    fn edge_kind_round_trips_through_str() {
        for kind in [
            EdgeKind::Imports,
            EdgeKind::Calls,
            EdgeKind::Inherits,
            EdgeKind::DependsOn,
            EdgeKind::Precedes,
        ] {
            assert_eq!(kind.as_str().parse::<EdgeKind>(), Ok(kind));
        }
    }
}
