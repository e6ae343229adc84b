//! Raw dependency facts produced by upstream analyzers and pipeline adapters.
//!
//! Each fact names an observed *source* entity and, for relationship facts,
//! a *target* reference. Facts are plain serde values so analyzers written in
//! any language can emit them as JSON or YAML.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::model::{AttrValue, Attributes, EdgeKind, NodeKind, NodeType};

/// One upstream observation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "fact", rename_all = "snake_case")]
pub enum RawFact {
    /// `source` file imports `target` module/file.
    Import(ImportFact),
    /// `source` function calls `target` function.
    Call(CallFact),
    /// `source` class inherits from `target` class.
    Inheritance(InheritanceFact),
    /// `source` package/project depends on `target` package.
    Package(PackageFact),
    /// A pipeline step and the steps it needs.
    Step(StepFact),
    /// Explicit node declaration.
    Node(NodeFact),
}

/// Fact families, used by request-level toggles and counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FactFamily {
    Import,
    Call,
    Inheritance,
    Package,
    Step,
    Node,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportFact {
    pub source: String,
    pub target: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line: Option<u32>,
    #[serde(default, skip_serializing_if = "Attributes::is_empty")]
    pub attributes: Attributes,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallFact {
    pub source: String,
    pub target: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line: Option<u32>,
    #[serde(default, skip_serializing_if = "Attributes::is_empty")]
    pub attributes: Attributes,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InheritanceFact {
    pub source: String,
    pub target: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    #[serde(default, skip_serializing_if = "Attributes::is_empty")]
    pub attributes: Attributes,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PackageFact {
    pub source: String,
    pub target: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default)]
    pub is_dev: bool,
    /// `false` for entries resolved from a lockfile closure.
    #[serde(default = "default_true")]
    pub is_direct: bool,
    /// Distance from the project root in the resolved dependency tree.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub depth: Option<u32>,
    #[serde(default, skip_serializing_if = "Attributes::is_empty")]
    pub attributes: Attributes,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepFact {
    pub id: String,
    /// Steps that must complete before this one.
    #[serde(default)]
    pub needs: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub estimated_duration: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resources: Option<BTreeMap<String, AttrValue>>,
    #[serde(default)]
    pub authoritative: bool,
    #[serde(default, skip_serializing_if = "Attributes::is_empty")]
    pub attributes: Attributes,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeFact {
    pub id: String,
    #[serde(flatten)]
    pub kind: NodeKind,
    #[serde(default)]
    pub authoritative: bool,
    #[serde(default, skip_serializing_if = "Attributes::is_empty")]
    pub attributes: Attributes,
}

const fn default_true() -> bool {
    true
}

/// A node observation extracted from a fact.
#[derive(Debug, Clone)]
pub(crate) struct NodeObservation {
    pub id: String,
    pub kind: NodeKind,
    pub attributes: Attributes,
    pub authoritative: bool,
}

/// An edge observation extracted from a fact, still unresolved.
#[derive(Debug, Clone)]
pub(crate) struct EdgeObservation {
    pub source: String,
    pub target: String,
    pub kind: EdgeKind,
    pub is_direct: bool,
    pub attributes: Attributes,
}

impl RawFact {
    /// Which family this fact belongs to.
    #[must_use]
    pub const fn family(&self) -> FactFamily {
        match self {
            Self::Import(_) => FactFamily::Import,
            Self::Call(_) => FactFamily::Call,
            Self::Inheritance(_) => FactFamily::Inheritance,
            Self::Package(_) => FactFamily::Package,
            Self::Step(_) => FactFamily::Step,
            Self::Node(_) => FactFamily::Node,
        }
    }

    /// Language declared by the fact, if any.
    #[must_use]
    pub fn language(&self) -> Option<&str> {
        match self {
            Self::Import(f) => f.language.as_deref(),
            Self::Call(f) => f.language.as_deref(),
            Self::Inheritance(f) => f.language.as_deref(),
            Self::Node(f) => match &f.kind {
                NodeKind::File { language, .. }
                | NodeKind::Class { language }
                | NodeKind::Function { language } => language.as_deref(),
                _ => None,
            }
            .or_else(|| f.attributes.get_str("language")),
            Self::Package(_) | Self::Step(_) => None,
        }
    }

    /// Filesystem path of the observed source entity, if known.
    #[must_use]
    pub fn source_path(&self) -> Option<&str> {
        match self {
            Self::Import(f) => f.path.as_deref().or(Some(f.source.as_str())),
            Self::Node(f) => match &f.kind {
                NodeKind::File { path, .. } => path.as_deref().or(Some(f.id.as_str())),
                _ => f.attributes.get_str("path"),
            },
            Self::Call(f) => f.attributes.get_str("path"),
            Self::Inheritance(f) => f.attributes.get_str("path"),
            Self::Package(_) | Self::Step(_) => None,
        }
    }

    /// Human-readable label for error context.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Import(_) => "import fact",
            Self::Call(_) => "call fact",
            Self::Inheritance(_) => "inheritance fact",
            Self::Package(_) => "package fact",
            Self::Step(_) => "step fact",
            Self::Node(_) => "node fact",
        }
    }

    /// Every id this fact mentions, for validation.
    pub(crate) fn ids(&self) -> Vec<&str> {
        match self {
            Self::Import(ImportFact { source, target, .. })
            | Self::Call(CallFact { source, target, .. })
            | Self::Inheritance(InheritanceFact { source, target, .. })
            | Self::Package(PackageFact { source, target, .. }) => vec![source, target],
            Self::Step(f) => std::iter::once(f.id.as_str())
                .chain(f.needs.iter().map(String::as_str))
                .collect(),
            Self::Node(f) => vec![f.id.as_str()],
        }
    }

    /// Nodes this fact directly observes.
    pub(crate) fn observed_nodes(&self) -> Vec<NodeObservation> {
        match self {
            Self::Import(f) => vec![NodeObservation {
                id: f.source.clone(),
                kind: NodeKind::File {
                    path: f.path.clone(),
                    language: f.language.clone(),
                },
                attributes: Attributes::new(),
                authoritative: false,
            }],
            Self::Call(f) => vec![NodeObservation {
                id: f.source.clone(),
                kind: NodeKind::Function {
                    language: f.language.clone(),
                },
                attributes: Attributes::new(),
                authoritative: false,
            }],
            Self::Inheritance(f) => vec![NodeObservation {
                id: f.source.clone(),
                kind: NodeKind::Class {
                    language: f.language.clone(),
                },
                attributes: Attributes::new(),
                authoritative: false,
            }],
            Self::Package(f) => vec![
                NodeObservation {
                    id: f.source.clone(),
                    kind: NodeKind::empty(NodeType::Package),
                    attributes: Attributes::new(),
                    authoritative: false,
                },
                NodeObservation {
                    id: f.target.clone(),
                    kind: NodeKind::Package {
                        version: f.version.clone(),
                        is_dev: Some(f.is_dev),
                    },
                    attributes: Attributes::new(),
                    authoritative: false,
                },
            ],
            Self::Step(f) => vec![NodeObservation {
                id: f.id.clone(),
                kind: NodeKind::PipelineStep {
                    estimated_duration: f.estimated_duration,
                    resources: f.resources.clone(),
                },
                attributes: f.attributes.clone(),
                authoritative: f.authoritative,
            }],
            Self::Node(f) => vec![NodeObservation {
                id: f.id.clone(),
                kind: f.kind.clone(),
                attributes: f.attributes.clone(),
                authoritative: f.authoritative,
            }],
        }
    }

    /// Edges this fact asserts.
    pub(crate) fn observed_edges(&self) -> Vec<EdgeObservation> {
        match self {
            Self::Import(f) => {
                let mut attributes = f.attributes.clone();
                if let Some(line) = f.line {
                    attributes.insert("line", f64::from(line));
                }
                vec![EdgeObservation {
                    source: f.source.clone(),
                    target: f.target.clone(),
                    kind: EdgeKind::Imports,
                    is_direct: true,
                    attributes,
                }]
            }
            Self::Call(f) => {
                let mut attributes = f.attributes.clone();
                if let Some(line) = f.line {
                    attributes.insert("line", f64::from(line));
                }
                vec![EdgeObservation {
                    source: f.source.clone(),
                    target: f.target.clone(),
                    kind: EdgeKind::Calls,
                    is_direct: true,
                    attributes,
                }]
            }
            Self::Inheritance(f) => vec![EdgeObservation {
                source: f.source.clone(),
                target: f.target.clone(),
                kind: EdgeKind::Inherits,
                is_direct: true,
                attributes: f.attributes.clone(),
            }],
            Self::Package(f) => vec![EdgeObservation {
                source: f.source.clone(),
                target: f.target.clone(),
                kind: EdgeKind::DependsOn,
                is_direct: f.is_direct,
                attributes: f.attributes.clone(),
            }],
            Self::Step(f) => f
                .needs
                .iter()
                .map(|need| EdgeObservation {
                    source: need.clone(),
                    target: f.id.clone(),
                    kind: EdgeKind::Precedes,
                    is_direct: true,
                    attributes: Attributes::new(),
                })
                .collect(),
            Self::Node(_) => Vec::new(),
        }
    }
}
