//! Request and response payloads at the service boundary.
//!
//! Identifiers are strings and counts are unsigned. Optional request fields
//! default to "no filter"; the `analyze_*` switches select fact families and
//! default to enabled.

use std::collections::BTreeMap;

use depgraph_core::build::BuildReport;
use depgraph_core::model::{EdgeKind, Graph, NodeType};
use serde::{Deserialize, Serialize};

use crate::complexity::ComplexityReport;
use crate::graph::GraphStats;
use crate::impact::{AffectedNode, RiskAssessment, TestRecommendation};
use crate::schedule::{BuildOrderMetrics, ForcedBreak, Level, ParallelMetrics, Wave};

const fn enabled() -> bool {
    true
}

// ---------------------------------------------------------------------------
// Dependency analysis
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependencyAnalysisRequest {
    pub project_path: String,
    #[serde(default)]
    pub languages: Option<Vec<String>>,
    /// Glob patterns matched against node paths (or ids).
    #[serde(default)]
    pub include_patterns: Option<Vec<String>>,
    #[serde(default)]
    pub exclude_patterns: Option<Vec<String>>,
    #[serde(default = "enabled")]
    pub analyze_imports: bool,
    #[serde(default = "enabled")]
    pub analyze_function_calls: bool,
    #[serde(default = "enabled")]
    pub analyze_class_hierarchy: bool,
    #[serde(default = "enabled")]
    pub analyze_packages: bool,
    /// Drop package facts deeper than this in the dependency tree.
    #[serde(default)]
    pub max_depth: Option<u32>,
}

impl DependencyAnalysisRequest {
    /// A request with every family enabled and no filters.
    #[must_use]
    pub fn new(project_path: impl Into<String>) -> Self {
        Self {
            project_path: project_path.into(),
            languages: None,
            include_patterns: None,
            exclude_patterns: None,
            analyze_imports: true,
            analyze_function_calls: true,
            analyze_class_hierarchy: true,
            analyze_packages: true,
            max_depth: None,
        }
    }
}

/// One code-level edge (imports, calls, inherits).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeDependency {
    pub source: String,
    pub target: String,
    pub kind: EdgeKind,
    pub is_direct: bool,
}

/// One package-level `depends-on` edge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageDependency {
    pub package: String,
    pub dependency: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    pub is_direct: bool,
    pub is_dev: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependencyMetrics {
    /// Files in the built graph before request filters.
    pub total_files: usize,
    /// Files left after request filters.
    pub analyzed_files: usize,
    pub total_imports: usize,
    pub total_calls: usize,
    pub total_classes: usize,
    pub total_functions: usize,
    pub total_packages: usize,
    pub direct_dependencies: usize,
    pub transitive_dependencies: usize,
    pub dev_dependencies: usize,
    pub node_count: usize,
    pub edge_count: usize,
    pub nodes_by_type: BTreeMap<NodeType, usize>,
    /// Ids stubbed as `unknown` during a permissive build.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub stubbed_nodes: Vec<String>,
}

impl DependencyMetrics {
    /// Combine the unfiltered build report with the filtered graph.
    #[must_use]
    pub fn new(full: &BuildReport, analyzed: &Graph) -> Self {
        let visible = BuildReport::for_graph(analyzed);
        Self {
            total_files: full.files,
            analyzed_files: visible.files,
            total_imports: visible.imports,
            total_calls: visible.calls,
            total_classes: visible.classes,
            total_functions: visible.functions,
            total_packages: visible.packages,
            direct_dependencies: visible.direct_dependencies,
            transitive_dependencies: visible.transitive_dependencies,
            dev_dependencies: visible.dev_dependencies,
            node_count: analyzed.node_count(),
            edge_count: analyzed.edge_count(),
            nodes_by_type: analyzed.count_by_type(),
            stubbed_nodes: full.stubbed_nodes.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DependencyAnalysisResponse {
    pub dependency_graph: Graph,
    pub code_dependencies: Vec<CodeDependency>,
    pub package_dependencies: Vec<PackageDependency>,
    pub complexity: ComplexityReport,
    pub stats: GraphStats,
    pub metrics: DependencyMetrics,
}

// ---------------------------------------------------------------------------
// Impact analysis
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImpactAnalysisRequest {
    pub project_path: String,
    pub changed_files: Vec<String>,
    /// Node id → associated test identifiers.
    #[serde(default)]
    pub test_mapping: Option<BTreeMap<String, Vec<String>>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ImpactMetrics {
    pub changed_count: usize,
    pub affected_count: usize,
    pub direct_count: usize,
    pub indirect_count: usize,
    pub max_distance: usize,
    pub total_nodes: usize,
    pub recommended_test_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImpactAnalysisResponse {
    /// Affected nodes of type `file`.
    pub affected_files: Vec<String>,
    /// Affected nodes of type `package`.
    pub affected_packages: Vec<String>,
    /// Every affected node with distance and fan-in.
    pub affected_components: Vec<AffectedNode>,
    /// Changed plus affected nodes and the edges between them.
    pub impact_graph: Graph,
    pub metrics: ImpactMetrics,
    pub risk_assessment: RiskAssessment,
    pub test_recommendations: Vec<TestRecommendation>,
    /// Changed paths that matched no node.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub unresolved_files: Vec<String>,
}

// ---------------------------------------------------------------------------
// Build optimization
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildOptimizationRequest {
    pub project_path: String,
    #[serde(default)]
    pub changed_files: Option<Vec<String>>,
    /// Must be positive when set; unset means unbounded.
    #[serde(default)]
    pub max_parallel_jobs: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuildOrderOptimizationResponse {
    pub build_order: Vec<String>,
    pub critical_path: Vec<String>,
    pub forced_breaks: Vec<ForcedBreak>,
    pub self_loops: Vec<String>,
    pub metrics: BuildOrderMetrics,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub unresolved_files: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParallelExecutionOptimizationResponse {
    pub parallel_groups: Vec<Level>,
    pub execution_plan: Vec<Wave>,
    pub forced_breaks: Vec<ForcedBreak>,
    pub self_loops: Vec<String>,
    pub metrics: ParallelMetrics,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn analysis_request_defaults_enable_all_families() {
        let request: DependencyAnalysisRequest =
            serde_json::from_str(r#"{"project_path": "."}"#).expect("parse");
        assert_eq!(request, DependencyAnalysisRequest::new("."));
    }

    #[test]
    fn family_switches_can_be_turned_off() {
        let request: DependencyAnalysisRequest = serde_json::from_str(
            r#"{"project_path": ".", "analyze_function_calls": false, "max_depth": 1}"#,
        )
        .expect("parse");
        assert!(!request.analyze_function_calls);
        assert!(request.analyze_imports);
        assert_eq!(request.max_depth, Some(1));
    }

    #[test]
    fn optimization_request_accepts_negative_parallelism_for_validation() {
        let request: BuildOptimizationRequest =
            serde_json::from_str(r#"{"project_path": ".", "max_parallel_jobs": -1}"#)
                .expect("parse");
        assert_eq!(request.max_parallel_jobs, Some(-1));
        assert_eq!(request.changed_files, None);
    }
}
