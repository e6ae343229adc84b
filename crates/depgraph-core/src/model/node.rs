//! Graph vertices and their per-type payloads.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::model::attr::{AttrValue, Attributes};

/// Attribute key for a node's expected execution/build duration.
pub const ATTR_ESTIMATED_DURATION: &str = "estimated_duration";
/// Attribute key for a node's source language.
pub const ATTR_LANGUAGE: &str = "language";
/// Attribute key for a node's filesystem path.
pub const ATTR_PATH: &str = "path";

/// Fieldless node type tag used in filters and payloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum NodeType {
    File,
    Package,
    Class,
    Function,
    PipelineStep,
    Unknown,
}

impl NodeType {
    /// Stable wire name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::File => "file",
            Self::Package => "package",
            Self::Class => "class",
            Self::Function => "function",
            Self::PipelineStep => "pipeline-step",
            Self::Unknown => "unknown",
        }
    }

    /// Whether nodes of this type are code artifacts that tests can cover.
    #[must_use]
    pub const fn is_code(self) -> bool {
        matches!(self, Self::File | Self::Class | Self::Function)
    }
}

impl fmt::Display for NodeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NodeType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "file" => Ok(Self::File),
            "package" => Ok(Self::Package),
            "class" => Ok(Self::Class),
            "function" => Ok(Self::Function),
            "pipeline-step" | "pipeline_step" | "step" => Ok(Self::PipelineStep),
            "unknown" => Ok(Self::Unknown),
            other => Err(format!("unknown node type '{other}'")),
        }
    }
}

/// Per-type node payload.
///
/// Each variant carries only the typed fields relevant to it; anything else
/// the producer knows goes into the node's generic [`Attributes`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum NodeKind {
    File {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        path: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        language: Option<String>,
    },
    Package {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        version: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        is_dev: Option<bool>,
    },
    Class {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        language: Option<String>,
    },
    Function {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        language: Option<String>,
    },
    PipelineStep {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        estimated_duration: Option<f64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        resources: Option<BTreeMap<String, AttrValue>>,
    },
    /// Stub created for an unresolved reference in permissive builds.
    Unknown,
}

/// Outcome of merging one [`NodeKind`] observation into another.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KindMerge {
    /// Kinds agreed (or one side was `Unknown`).
    Merged,
    /// Kinds disagreed and the existing kind was kept.
    Conflict,
    /// Kinds disagreed and the incoming authoritative kind replaced it.
    Replaced,
}

impl NodeKind {
    /// Empty payload for a given type tag.
    #[must_use]
    pub const fn empty(node_type: NodeType) -> Self {
        match node_type {
            NodeType::File => Self::File {
                path: None,
                language: None,
            },
            NodeType::Package => Self::Package {
                version: None,
                is_dev: None,
            },
            NodeType::Class => Self::Class { language: None },
            NodeType::Function => Self::Function { language: None },
            NodeType::PipelineStep => Self::PipelineStep {
                estimated_duration: None,
                resources: None,
            },
            NodeType::Unknown => Self::Unknown,
        }
    }

    /// The fieldless type tag.
    #[must_use]
    pub const fn node_type(&self) -> NodeType {
        match self {
            Self::File { .. } => NodeType::File,
            Self::Package { .. } => NodeType::Package,
            Self::Class { .. } => NodeType::Class,
            Self::Function { .. } => NodeType::Function,
            Self::PipelineStep { .. } => NodeType::PipelineStep,
            Self::Unknown => NodeType::Unknown,
        }
    }

    /// Merge a repeated observation into `self`.
    ///
    /// `Unknown` never wins over a concrete kind. For matching kinds, unset
    /// fields are filled; set fields are only overwritten when
    /// `authoritative` is true.
    pub fn merge_from(&mut self, other: &Self, authoritative: bool) -> KindMerge {
        if matches!(other, Self::Unknown) {
            return KindMerge::Merged;
        }
        if matches!(self, Self::Unknown) {
            *self = other.clone();
            return KindMerge::Merged;
        }

        match (self, other) {
            (
                Self::File { path, language },
                Self::File {
                    path: p2,
                    language: l2,
                },
            ) => {
                fill(path, p2, authoritative);
                fill(language, l2, authoritative);
                KindMerge::Merged
            }
            (
                Self::Package { version, is_dev },
                Self::Package {
                    version: v2,
                    is_dev: d2,
                },
            ) => {
                fill(version, v2, authoritative);
                fill(is_dev, d2, authoritative);
                KindMerge::Merged
            }
            (Self::Class { language }, Self::Class { language: l2 })
            | (Self::Function { language }, Self::Function { language: l2 }) => {
                fill(language, l2, authoritative);
                KindMerge::Merged
            }
            (
                Self::PipelineStep {
                    estimated_duration,
                    resources,
                },
                Self::PipelineStep {
                    estimated_duration: e2,
                    resources: r2,
                },
            ) => {
                fill(estimated_duration, e2, authoritative);
                fill(resources, r2, authoritative);
                KindMerge::Merged
            }
            (current, incoming) => {
                if authoritative {
                    *current = incoming.clone();
                    KindMerge::Replaced
                } else {
                    KindMerge::Conflict
                }
            }
        }
    }
}

fn fill<T: Clone>(slot: &mut Option<T>, incoming: &Option<T>, authoritative: bool) {
    if let Some(value) = incoming {
        if slot.is_none() || authoritative {
            *slot = Some(value.clone());
        }
    }
}

/// A dependency-graph vertex.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    /// Globally unique id within a graph; never changes once created.
    pub id: String,
    /// Type tag and typed fields.
    #[serde(flatten)]
    pub kind: NodeKind,
    /// Producer-defined extra attributes.
    #[serde(default, skip_serializing_if = "Attributes::is_empty")]
    pub attributes: Attributes,
}

impl Node {
    /// Create a node with no attributes.
    #[must_use]
    pub fn new(id: impl Into<String>, kind: NodeKind) -> Self {
        Self {
            id: id.into(),
            kind,
            attributes: Attributes::new(),
        }
    }

    /// Attach attributes, returning `self` for chaining.
    #[must_use]
    pub fn with_attributes(mut self, attributes: Attributes) -> Self {
        self.attributes = attributes;
        self
    }

    /// The fieldless type tag.
    #[must_use]
    pub const fn node_type(&self) -> NodeType {
        self.kind.node_type()
    }

    /// Expected duration of this node, falling back to `default`.
    ///
    /// The typed pipeline-step field wins over the generic attribute.
    #[must_use]
    pub fn cost(&self, default: f64) -> f64 {
        let typed = match &self.kind {
            NodeKind::PipelineStep {
                estimated_duration, ..
            } => *estimated_duration,
            _ => None,
        };
        let valid = |c: &f64| c.is_finite() && *c >= 0.0;
        typed
            .filter(valid)
            .or_else(|| self.attributes.get_number(ATTR_ESTIMATED_DURATION).filter(valid))
            .unwrap_or(default)
    }

    /// Source language, from the typed field or the `language` attribute.
    #[must_use]
    pub fn language(&self) -> Option<&str> {
        let typed = match &self.kind {
            NodeKind::File { language, .. }
            | NodeKind::Class { language }
            | NodeKind::Function { language } => language.as_deref(),
            _ => None,
        };
        typed.or_else(|| self.attributes.get_str(ATTR_LANGUAGE))
    }

    /// Filesystem path, from the typed field or the `path` attribute.
    #[must_use]
    pub fn path(&self) -> Option<&str> {
        let typed = match &self.kind {
            NodeKind::File { path, .. } => path.as_deref(),
            _ => None,
        };
        typed.or_else(|| self.attributes.get_str(ATTR_PATH))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_is_replaced_by_concrete_kind() {
        let mut kind = NodeKind::Unknown;
        let outcome = kind.merge_from(&NodeKind::empty(NodeType::Class), false);
        assert_eq!(outcome, KindMerge::Merged);
        assert_eq!(kind.node_type(), NodeType::Class);
    }

    #[test]
    fn set_fields_survive_non_authoritative_merge() {
        let mut kind = NodeKind::Package {
            version: Some("1.2.0".into()),
            is_dev: None,
        };
        kind.merge_from(
            &NodeKind::Package {
                version: Some("9.9.9".into()),
                is_dev: Some(true),
            },
            false,
        );
        assert_eq!(
            kind,
            NodeKind::Package {
                version: Some("1.2.0".into()),
                is_dev: Some(true),
            }
        );
    }

    #[test]
    fn conflicting_kinds_keep_first_unless_authoritative() {
        let mut kind = NodeKind::empty(NodeType::File);
        assert_eq!(
            kind.merge_from(&NodeKind::empty(NodeType::Function), false),
            KindMerge::Conflict
        );
        assert_eq!(kind.node_type(), NodeType::File);

        assert_eq!(
            kind.merge_from(&NodeKind::empty(NodeType::Function), true),
            KindMerge::Replaced
        );
        assert_eq!(kind.node_type(), NodeType::Function);
    }

    #[test]
    fn cost_prefers_typed_duration() {
        let node = Node::new(
            "build",
            NodeKind::PipelineStep {
                estimated_duration: Some(30.0),
                resources: None,
            },
        )
        .with_attributes(Attributes::new().with(ATTR_ESTIMATED_DURATION, 5.0));
        assert!((node.cost(1.0) - 30.0).abs() < f64::EPSILON);

        let plain = Node::new("lint", NodeKind::empty(NodeType::PipelineStep));
        assert!((plain.cost(1.0) - 1.0).abs() < f64::EPSILON);

        let negative = Node::new(
            "test",
            NodeKind::PipelineStep {
                estimated_duration: Some(-4.0),
                resources: None,
            },
        )
        .with_attributes(Attributes::new().with(ATTR_ESTIMATED_DURATION, 6.0));
        assert!((negative.cost(1.0) - 6.0).abs() < f64::EPSILON);
    }

    #[test]
    fn node_serializes_flat() {
        let node = Node::new(
            "src/app.py",
            NodeKind::File {
                path: Some("src/app.py".into()),
                language: Some("python".into()),
            },
        );
        let json = serde_json::to_value(&node).expect("serialize");
        assert_eq!(json["type"], "file");
        assert_eq!(json["language"], "python");

        let back: Node = serde_json::from_value(json).expect("deserialize");
        assert_eq!(back, node);
    }

    #[test]
    fn node_type_parses_aliases() {
        assert_eq!("step".parse::<NodeType>(), Ok(NodeType::PipelineStep));
        assert!("module".parse::<NodeType>().is_err());
    }
}
