//! Request-level orchestration.
//!
//! An [`Engine`] runs one request at a time over facts supplied by the
//! caller: build the graph, apply request filters, check size limits, then
//! analyze or plan. Cancellation is checked between these phases only.
//! When a [`MetricsStore`] is attached, responses are cached under a
//! [`Fingerprint`] of (algorithm, graph hash, changed nodes, parameters);
//! store failures are logged and never fail the request.
//!
//! ## Changed files
//!
//! Paths in `changed_files` are matched to node ids in this order: exact
//! id, id after stripping `./` or the project path prefix, then the node's
//! declared `path`. Paths that match nothing are returned in
//! `unresolved_files` instead of failing the request.

pub mod payload;

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use depgraph_core::build::{BuildReport, FactFamily, GraphBuilder, RawFact};
use depgraph_core::cancel::CancellationToken;
use depgraph_core::config::EngineConfig;
use depgraph_core::error::AnalysisError;
use depgraph_core::model::{EdgeKind, Graph, NodeKind, NodeType};
use depgraph_core::store::{Fingerprint, MetricsStore};
use depgraph_core::timing::timed;
use glob::{MatchOptions, Pattern};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, instrument, warn};

use crate::complexity::analyze_dependency_graph;
use crate::graph::{Condensed, DependencyGraph, GraphStats};
use crate::impact::{NoTests, TestLookup, analyze_impact_in};
use crate::schedule::{parallelism, plan_build_order_with, plan_parallel};
use crate::visualize::{VisualizationOptions, VisualizationResponse, visualize};

pub use payload::{
    BuildOptimizationRequest, BuildOrderOptimizationResponse, CodeDependency,
    DependencyAnalysisRequest, DependencyAnalysisResponse, DependencyMetrics,
    ImpactAnalysisRequest, ImpactAnalysisResponse, ImpactMetrics, PackageDependency,
    ParallelExecutionOptimizationResponse,
};

const GLOB_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: true,
    require_literal_separator: true,
    require_literal_leading_dot: false,
};

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

/// Stateless request runner. Cheap to clone; share one per process.
#[derive(Clone, Default)]
pub struct Engine {
    config: EngineConfig,
    store: Option<Arc<dyn MetricsStore>>,
    cancel: CancellationToken,
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("config", &self.config)
            .field("store", &self.store.is_some())
            .field("cancelled", &self.cancel.is_cancelled())
            .finish()
    }
}

impl Engine {
    #[must_use]
    pub fn new(config: EngineConfig) -> Self {
        Self {
            config,
            store: None,
            cancel: CancellationToken::new(),
        }
    }

    /// Cache responses in `store`.
    #[must_use]
    pub fn with_store(mut self, store: Arc<dyn MetricsStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Observe `token` between phases.
    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    #[must_use]
    pub const fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Build and size-check a graph from `facts`.
    ///
    /// # Errors
    ///
    /// Build failures, [`AnalysisError::GraphTooLarge`], or
    /// [`AnalysisError::Cancelled`].
    pub fn build_graph(&self, facts: &[RawFact]) -> Result<(Graph, BuildReport), AnalysisError> {
        self.cancel.check("build")?;
        let (graph, report) = timed("engine.build", || {
            GraphBuilder::new(self.config.build).build_with_report(facts)
        })?;
        self.check_limits(&graph)?;
        Ok((graph, report))
    }

    /// Full dependency analysis with request filters applied.
    ///
    /// # Errors
    ///
    /// [`AnalysisError::InvalidRequest`] for a malformed glob, plus
    /// everything [`Engine::build_graph`] returns.
    #[instrument(skip_all, fields(project = %request.project_path, facts = facts.len()))]
    pub fn analyze_dependencies(
        &self,
        request: &DependencyAnalysisRequest,
        facts: &[RawFact],
    ) -> Result<DependencyAnalysisResponse, AnalysisError> {
        let filter = NodeFilter::from_request(request)?;
        let selected = select_facts(request, facts);
        let (built, report) = self.build_graph(&selected)?;
        let key = self.fingerprint("analyze_dependencies", &built, [], request);

        self.cached(&key, || {
            let graph = filter.apply(&built);
            self.cancel.check("analyze")?;

            timed("engine.analyze", || {
                let dg = DependencyGraph::with_weights(&graph, &self.config.plan);
                let condensed = Condensed::from_dependency_graph(&dg);
                Ok(DependencyAnalysisResponse {
                    code_dependencies: code_dependencies(&graph),
                    package_dependencies: package_dependencies(&graph),
                    complexity: analyze_dependency_graph(&dg, &condensed),
                    stats: GraphStats::compute(
                        &dg,
                        &condensed,
                        self.config.limits.max_reduction_nodes,
                    ),
                    metrics: DependencyMetrics::new(&report, &graph),
                    dependency_graph: graph,
                })
            })
        })
    }

    /// Blast radius, risk, and test recommendations for changed files.
    ///
    /// # Errors
    ///
    /// Everything [`Engine::build_graph`] returns.
    #[instrument(skip_all, fields(project = %request.project_path, changed = request.changed_files.len()))]
    pub fn analyze_impact(
        &self,
        request: &ImpactAnalysisRequest,
        facts: &[RawFact],
    ) -> Result<ImpactAnalysisResponse, AnalysisError> {
        let (graph, _) = self.build_graph(facts)?;
        let (changed, unresolved_files) =
            resolve_changed(&graph, &request.project_path, &request.changed_files);
        let key = self.fingerprint(
            "analyze_impact",
            &graph,
            changed.iter().map(String::as_str),
            request,
        );

        self.cached(&key, || {
            self.cancel.check("analyze")?;
            let tests: &dyn TestLookup = match &request.test_mapping {
                Some(mapping) => mapping,
                None => &NoTests,
            };
            let dg = DependencyGraph::with_weights(&graph, &self.config.plan);
            let result = timed("engine.impact", || {
                analyze_impact_in(&graph, &dg, &changed, tests, &self.config.impact)
            })?;

            let of_type = |t: NodeType| -> Vec<String> {
                result
                    .affected_nodes
                    .iter()
                    .filter(|a| a.node_type == t)
                    .map(|a| a.id.clone())
                    .collect()
            };
            let mut visible = changed.clone();
            visible.extend(result.affected_ids().map(ToString::to_string));

            Ok(ImpactAnalysisResponse {
                affected_files: of_type(NodeType::File),
                affected_packages: of_type(NodeType::Package),
                impact_graph: graph.subgraph(&visible),
                metrics: ImpactMetrics {
                    changed_count: changed.len(),
                    affected_count: result.affected_nodes.len(),
                    direct_count: result.direct_count,
                    indirect_count: result.indirect_count,
                    max_distance: result
                        .affected_nodes
                        .iter()
                        .map(|a| a.distance)
                        .max()
                        .unwrap_or(0),
                    total_nodes: graph.node_count(),
                    recommended_test_count: result.recommended_tests.len(),
                },
                affected_components: result.affected_nodes,
                risk_assessment: result.risk_assessment,
                test_recommendations: result.test_recommendations,
                unresolved_files: unresolved_files.clone(),
            })
        })
    }

    /// Build order and critical path, optionally limited to what must
    /// rebuild after `changed_files`.
    ///
    /// # Errors
    ///
    /// [`PlanError::EmptyGraph`](depgraph_core::error::PlanError) plus
    /// everything [`Engine::build_graph`] returns.
    #[instrument(skip_all, fields(project = %request.project_path))]
    pub fn optimize_build_order(
        &self,
        request: &BuildOptimizationRequest,
        facts: &[RawFact],
    ) -> Result<BuildOrderOptimizationResponse, AnalysisError> {
        let (graph, _) = self.build_graph(facts)?;
        let (changed, unresolved_files) = match &request.changed_files {
            Some(files) => {
                let (ids, unresolved) = resolve_changed(&graph, &request.project_path, files);
                (Some(ids), unresolved)
            }
            None => (None, Vec::new()),
        };
        let key = self.fingerprint(
            "optimize_build_order",
            &graph,
            changed.iter().flatten().map(String::as_str),
            request,
        );

        self.cached(&key, || {
            self.cancel.check("plan")?;
            let dg = DependencyGraph::with_weights(&graph, &self.config.plan);
            let result = timed("engine.order", || plan_build_order_with(&dg, changed.as_ref()))?;
            Ok(BuildOrderOptimizationResponse {
                build_order: result.order,
                critical_path: result.critical_path,
                forced_breaks: result.forced_breaks,
                self_loops: result.self_loops,
                metrics: result.metrics,
                unresolved_files: unresolved_files.clone(),
            })
        })
    }

    /// Parallel waves under `max_parallel_jobs` (unbounded when unset).
    ///
    /// # Errors
    ///
    /// [`PlanError::InvalidParallelism`](depgraph_core::error::PlanError)
    /// before anything is built, [`PlanError::EmptyGraph`](depgraph_core::error::PlanError),
    /// plus everything [`Engine::build_graph`] returns.
    #[instrument(skip_all, fields(project = %request.project_path, max_parallel = ?request.max_parallel_jobs))]
    pub fn optimize_parallel_execution(
        &self,
        request: &BuildOptimizationRequest,
        facts: &[RawFact],
    ) -> Result<ParallelExecutionOptimizationResponse, AnalysisError> {
        let cap = request.max_parallel_jobs.map(parallelism).transpose()?;
        let (graph, _) = self.build_graph(facts)?;
        let key = self.fingerprint("optimize_parallel_execution", &graph, [], request);

        self.cached(&key, || {
            self.cancel.check("plan")?;
            let dg = DependencyGraph::with_weights(&graph, &self.config.plan);
            let result = timed("engine.parallel", || plan_parallel(&dg, cap))?;
            Ok(ParallelExecutionOptimizationResponse {
                parallel_groups: result.levels,
                execution_plan: result.execution_plan,
                forced_breaks: result.forced_breaks,
                self_loops: result.self_loops,
                metrics: result.metrics,
            })
        })
    }

    /// Filtered, truncated visualization payload.
    ///
    /// # Errors
    ///
    /// Everything [`Engine::build_graph`] returns.
    #[instrument(skip_all, fields(facts = facts.len()))]
    pub fn visualize(
        &self,
        options: &VisualizationOptions,
        facts: &[RawFact],
    ) -> Result<VisualizationResponse, AnalysisError> {
        let (graph, _) = self.build_graph(facts)?;
        let key = self.fingerprint("visualize", &graph, [], options);
        self.cached(&key, || {
            self.cancel.check("analyze")?;
            Ok(timed("engine.visualize", || visualize(&graph, options)))
        })
    }

    // -----------------------------------------------------------------------
    // Internals
    // -----------------------------------------------------------------------

    fn check_limits(&self, graph: &Graph) -> Result<(), AnalysisError> {
        let limits = self.config.limits;
        if graph.node_count() > limits.max_nodes {
            return Err(AnalysisError::GraphTooLarge {
                what: "nodes",
                actual: graph.node_count(),
                limit: limits.max_nodes,
            });
        }
        if graph.edge_count() > limits.max_edges {
            return Err(AnalysisError::GraphTooLarge {
                what: "edges",
                actual: graph.edge_count(),
                limit: limits.max_edges,
            });
        }
        Ok(())
    }

    fn fingerprint<'a>(
        &self,
        algorithm: &str,
        graph: &Graph,
        changed: impl IntoIterator<Item = &'a str>,
        request: &impl Serialize,
    ) -> Fingerprint {
        let mut params = serde_json::Map::new();
        params.insert("request".into(), serde_json::to_value(request).unwrap_or_default());
        params.insert("config".into(), serde_json::to_value(&self.config).unwrap_or_default());
        Fingerprint::new(
            algorithm,
            &graph.content_hash(),
            changed,
            &serde_json::Value::Object(params),
        )
    }

    /// Serve from the store when possible, otherwise compute and store.
    fn cached<T>(
        &self,
        key: &Fingerprint,
        compute: impl FnOnce() -> Result<T, AnalysisError>,
    ) -> Result<T, AnalysisError>
    where
        T: Serialize + DeserializeOwned,
    {
        let Some(store) = &self.store else {
            return compute();
        };

        match store.get(key) {
            Ok(Some(value)) => match serde_json::from_value(value) {
                Ok(hit) => {
                    debug!(%key, "cache hit");
                    return Ok(hit);
                }
                Err(e) => {
                    warn!(%key, error = %e, "discarding undecodable cache entry");
                    if let Err(e) = store.invalidate(key) {
                        warn!(%key, error = %e, "failed to invalidate cache entry");
                    }
                }
            },
            Ok(None) => debug!(%key, "cache miss"),
            Err(e) => warn!(%key, error = %e, "metrics store read failed"),
        }

        let value = compute()?;
        match serde_json::to_value(&value) {
            Ok(json) => {
                if let Err(e) = store.put(key, json) {
                    warn!(%key, error = %e, "metrics store write failed");
                }
            }
            Err(e) => warn!(%key, error = %e, "response not cacheable"),
        }
        Ok(value)
    }
}

// ---------------------------------------------------------------------------
// Request filters
// ---------------------------------------------------------------------------

/// Drop fact families the request turned off and packages below
/// `max_depth`. Node declarations and pipeline steps always pass.
fn select_facts(request: &DependencyAnalysisRequest, facts: &[RawFact]) -> Vec<RawFact> {
    facts
        .iter()
        .filter(|fact| match fact.family() {
            FactFamily::Import => request.analyze_imports,
            FactFamily::Call => request.analyze_function_calls,
            FactFamily::Inheritance => request.analyze_class_hierarchy,
            FactFamily::Package => request.analyze_packages,
            FactFamily::Step | FactFamily::Node => true,
        })
        .filter(|fact| match (fact, request.max_depth) {
            (RawFact::Package(p), Some(max)) => p.depth.is_none_or(|d| d <= max),
            _ => true,
        })
        .cloned()
        .collect()
}

/// Language and path filters over the built graph.
///
/// Languages apply to code nodes (file, class, function); a code node
/// without a declared language is dropped when a language filter is set.
/// Path globs apply to nodes with a path (files fall back to their id);
/// other nodes pass.
struct NodeFilter {
    languages: Option<BTreeSet<String>>,
    include: Vec<Pattern>,
    exclude: Vec<Pattern>,
}

impl NodeFilter {
    fn from_request(request: &DependencyAnalysisRequest) -> Result<Self, AnalysisError> {
        Ok(Self {
            languages: request
                .languages
                .as_ref()
                .map(|l| l.iter().map(|s| s.to_ascii_lowercase()).collect()),
            include: compile_globs("include_patterns", request.include_patterns.as_deref())?,
            exclude: compile_globs("exclude_patterns", request.exclude_patterns.as_deref())?,
        })
    }

    fn is_noop(&self) -> bool {
        self.languages.is_none() && self.include.is_empty() && self.exclude.is_empty()
    }

    fn apply(&self, graph: &Graph) -> Graph {
        if self.is_noop() {
            return graph.clone();
        }
        let keep: BTreeSet<String> = graph
            .nodes()
            .filter(|node| {
                let language_ok = match &self.languages {
                    Some(allowed) if node.node_type().is_code() => node
                        .language()
                        .is_some_and(|l| allowed.contains(&l.to_ascii_lowercase())),
                    _ => true,
                };
                let path = node.path().or_else(|| {
                    matches!(node.kind, NodeKind::File { .. }).then_some(node.id.as_str())
                });
                let path_ok = path.is_none_or(|p| {
                    (self.include.is_empty()
                        || self.include.iter().any(|g| g.matches_with(p, GLOB_OPTIONS)))
                        && !self.exclude.iter().any(|g| g.matches_with(p, GLOB_OPTIONS))
                });
                language_ok && path_ok
            })
            .map(|node| node.id.clone())
            .collect();
        debug!(kept = keep.len(), total = graph.node_count(), "request filters applied");
        graph.subgraph(&keep)
    }
}

fn compile_globs(field: &str, patterns: Option<&[String]>) -> Result<Vec<Pattern>, AnalysisError> {
    patterns
        .unwrap_or_default()
        .iter()
        .map(|p| {
            Pattern::new(p).map_err(|e| AnalysisError::InvalidRequest {
                field: field.to_string(),
                reason: format!("invalid glob `{p}`: {e}"),
            })
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Response helpers
// ---------------------------------------------------------------------------

fn code_dependencies(graph: &Graph) -> Vec<CodeDependency> {
    graph
        .edges()
        .filter(|e| matches!(e.kind, EdgeKind::Imports | EdgeKind::Calls | EdgeKind::Inherits))
        .map(|e| CodeDependency {
            source: e.source.clone(),
            target: e.target.clone(),
            kind: e.kind,
            is_direct: e.is_direct,
        })
        .collect()
}

fn package_dependencies(graph: &Graph) -> Vec<PackageDependency> {
    graph
        .edges()
        .filter(|e| e.kind == EdgeKind::DependsOn)
        .map(|e| {
            let (version, is_dev) = match graph.node(&e.target).map(|n| &n.kind) {
                Some(NodeKind::Package { version, is_dev }) => {
                    (version.clone(), is_dev.unwrap_or(false))
                }
                _ => (None, false),
            };
            PackageDependency {
                package: e.source.clone(),
                dependency: e.target.clone(),
                version,
                is_direct: e.is_direct,
                is_dev,
            }
        })
        .collect()
}

/// Map changed paths to node ids; unmatched paths come back separately.
fn resolve_changed(
    graph: &Graph,
    project_path: &str,
    files: &[String],
) -> (BTreeSet<String>, Vec<String>) {
    let by_path: HashMap<&str, &str> = graph
        .nodes()
        .filter_map(|n| n.path().map(|p| (p, n.id.as_str())))
        .collect();
    let prefix = project_path.trim_end_matches('/');

    let mut resolved = BTreeSet::new();
    let mut unresolved = Vec::new();
    for file in files {
        let stripped = file.strip_prefix("./").unwrap_or(file);
        let relative = if prefix.is_empty() || prefix == "." {
            stripped
        } else {
            stripped
                .strip_prefix(prefix)
                .and_then(|rest| rest.strip_prefix('/'))
                .unwrap_or(stripped)
        };

        let hit = [file.as_str(), stripped, relative]
            .into_iter()
            .find(|c| graph.contains(c))
            .or_else(|| {
                [file.as_str(), stripped, relative]
                    .into_iter()
                    .find_map(|c| by_path.get(c).copied())
            });
        match hit {
            Some(id) => {
                resolved.insert(id.to_string());
            }
            None => {
                debug!(file = %file, "changed file matches no node");
                unresolved.push(file.clone());
            }
        }
    }
    (resolved, unresolved)
}

#[cfg(test)]
mod tests {
    use super::*;
    use depgraph_core::error::{ErrorKind, PlanError};
    use depgraph_core::store::InMemoryStore;
    use serde_json::json;

    fn facts(value: serde_json::Value) -> Vec<RawFact> {
        serde_json::from_value(value).expect("valid facts")
    }

    fn project() -> Vec<RawFact> {
        facts(json!([
            {"fact": "import", "source": "src/app.rs", "target": "src/lib.rs", "language": "rust"},
            {"fact": "import", "source": "src/lib.rs", "target": "src/util.rs", "language": "rust"},
            {"fact": "import", "source": "src/util.rs", "target": "src/lib.rs", "language": "rust"},
            {"fact": "import", "source": "tests/it.rs", "target": "src/app.rs", "language": "rust"},
            {"fact": "call", "source": "app::main", "target": "lib::run", "language": "rust"},
            {"fact": "node", "id": "lib::run", "type": "function", "language": "rust"},
            {"fact": "package", "source": "app", "target": "serde", "version": "1.0", "depth": 1},
            {"fact": "package", "source": "serde", "target": "serde_derive", "version": "1.0", "is_direct": false, "depth": 2},
            {"fact": "package", "source": "app", "target": "proptest", "version": "1.4", "is_dev": true, "depth": 1}
        ]))
    }

    #[test]
    fn analyze_dependencies_reports_metrics_and_cycles() {
        let engine = Engine::default();
        let response = engine
            .analyze_dependencies(&DependencyAnalysisRequest::new("."), &project())
            .expect("analysis");

        assert_eq!(response.metrics.total_files, 4);
        assert_eq!(response.metrics.analyzed_files, 4);
        assert_eq!(response.metrics.total_imports, 4);
        assert_eq!(response.metrics.total_calls, 1);
        assert_eq!(response.metrics.direct_dependencies, 2);
        assert_eq!(response.metrics.transitive_dependencies, 1);
        assert_eq!(response.metrics.dev_dependencies, 1);
        assert_eq!(response.code_dependencies.len(), 5);
        assert_eq!(response.package_dependencies.len(), 3);
        assert_eq!(
            response.complexity.cycles,
            vec![vec!["src/lib.rs".to_string(), "src/util.rs".to_string()]]
        );
    }

    #[test]
    fn request_filters_narrow_the_graph() {
        let request = DependencyAnalysisRequest {
            exclude_patterns: Some(vec!["tests/**".into()]),
            analyze_function_calls: false,
            analyze_packages: false,
            ..DependencyAnalysisRequest::new(".")
        };
        let response = Engine::default()
            .analyze_dependencies(&request, &project())
            .expect("analysis");
        assert_eq!(response.metrics.total_files, 4);
        assert_eq!(response.metrics.analyzed_files, 3);
        assert_eq!(response.metrics.total_calls, 0);
        assert!(response.package_dependencies.is_empty());
        assert!(!response.dependency_graph.contains("tests/it.rs"));
        // Declared function nodes pass the family switch.
        assert!(response.dependency_graph.contains("lib::run"));
    }

    #[test]
    fn max_depth_drops_deep_packages() {
        let request = DependencyAnalysisRequest {
            max_depth: Some(1),
            ..DependencyAnalysisRequest::new(".")
        };
        let response = Engine::default()
            .analyze_dependencies(&request, &project())
            .expect("analysis");
        assert_eq!(response.package_dependencies.len(), 2);
        assert!(!response.dependency_graph.contains("serde_derive"));
    }

    #[test]
    fn bad_glob_is_an_invalid_request() {
        let request = DependencyAnalysisRequest {
            include_patterns: Some(vec!["src/[".into()]),
            ..DependencyAnalysisRequest::new(".")
        };
        let err = Engine::default()
            .analyze_dependencies(&request, &project())
            .expect_err("bad glob");
        assert!(matches!(err, AnalysisError::InvalidRequest { ref field, .. } if field == "include_patterns"));
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[test]
    fn impact_resolves_paths_and_reports_unmatched() {
        let request = ImpactAnalysisRequest {
            project_path: "/work/repo".into(),
            changed_files: vec!["/work/repo/src/app.rs".into(), "README.md".into()],
            test_mapping: Some(
                [("tests/it.rs".to_string(), vec!["it::smoke".to_string()])]
                    .into_iter()
                    .collect(),
            ),
        };
        let response = Engine::default()
            .analyze_impact(&request, &project())
            .expect("impact");
        assert_eq!(response.affected_files, vec!["tests/it.rs"]);
        assert_eq!(response.unresolved_files, vec!["README.md"]);
        assert_eq!(response.metrics.changed_count, 1);
        assert_eq!(response.impact_graph.node_count(), 2);
        assert_eq!(response.test_recommendations[0].tests, vec!["it::smoke"]);
    }

    #[test]
    fn build_order_restricts_to_changed_dependents() {
        let request = BuildOptimizationRequest {
            project_path: ".".into(),
            changed_files: Some(vec!["./src/app.rs".into()]),
            max_parallel_jobs: None,
        };
        let response = Engine::default()
            .optimize_build_order(&request, &project())
            .expect("order");
        assert_eq!(response.build_order, vec!["src/app.rs", "tests/it.rs"]);
        assert_eq!(response.forced_breaks.len(), 1);
    }

    #[test]
    fn invalid_parallelism_fails_before_building() {
        let request = BuildOptimizationRequest {
            project_path: ".".into(),
            changed_files: None,
            max_parallel_jobs: Some(0),
        };
        let err = Engine::default()
            .optimize_parallel_execution(&request, &[])
            .expect_err("zero jobs");
        assert_eq!(err, AnalysisError::Plan(PlanError::InvalidParallelism { value: 0 }));
    }

    #[test]
    fn empty_facts_cannot_be_planned() {
        let request = BuildOptimizationRequest {
            project_path: ".".into(),
            changed_files: None,
            max_parallel_jobs: Some(2),
        };
        let err = Engine::default()
            .optimize_parallel_execution(&request, &[])
            .expect_err("empty");
        assert_eq!(err, AnalysisError::Plan(PlanError::EmptyGraph));
    }

    #[test]
    fn limits_reject_large_graphs() {
        let mut config = EngineConfig::default();
        config.limits.max_nodes = 2;
        let err = Engine::new(config)
            .build_graph(&project())
            .expect_err("too large");
        assert!(matches!(err, AnalysisError::GraphTooLarge { what: "nodes", limit: 2, .. }));
        assert_eq!(err.kind(), ErrorKind::Resource);
    }

    #[test]
    fn cancelled_engine_stops_before_build() {
        let token = CancellationToken::new();
        token.cancel();
        let err = Engine::default()
            .with_cancellation(token)
            .build_graph(&project())
            .expect_err("cancelled");
        assert_eq!(err, AnalysisError::Cancelled { phase: "build".into() });
    }

    #[test]
    fn responses_are_cached_by_fingerprint() {
        let store = Arc::new(InMemoryStore::new());
        let engine = Engine::default().with_store(store.clone());
        let request = BuildOptimizationRequest {
            project_path: ".".into(),
            changed_files: None,
            max_parallel_jobs: Some(2),
        };

        let first = engine
            .optimize_parallel_execution(&request, &project())
            .expect("plan");
        assert_eq!(store.len(), 1);
        let second = engine
            .optimize_parallel_execution(&request, &project())
            .expect("plan");
        assert_eq!(store.len(), 1);
        assert_eq!(first, second);

        let other = BuildOptimizationRequest {
            max_parallel_jobs: Some(3),
            ..request
        };
        engine
            .optimize_parallel_execution(&other, &project())
            .expect("plan");
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn cached_analysis_tracks_package_versions() {
        let store = Arc::new(InMemoryStore::new());
        let engine = Engine::default().with_store(store.clone());
        let request = DependencyAnalysisRequest::new(".");
        let manifest = |version: &str| {
            facts(json!([
                {"fact": "package", "source": "app", "target": "serde", "version": version}
            ]))
        };
        let versions = |response: &DependencyAnalysisResponse| -> Vec<Option<String>> {
            response
                .package_dependencies
                .iter()
                .map(|p| p.version.clone())
                .collect()
        };

        let first = engine
            .analyze_dependencies(&request, &manifest("1.0"))
            .expect("analysis");
        let second = engine
            .analyze_dependencies(&request, &manifest("2.0"))
            .expect("analysis");

        assert_eq!(versions(&first), vec![Some("1.0".to_string())]);
        assert_eq!(versions(&second), vec![Some("2.0".to_string())]);
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn cached_visualization_tracks_languages() {
        let store = Arc::new(InMemoryStore::new());
        let engine = Engine::default().with_store(store.clone());
        let options = VisualizationOptions {
            group_by: Some(crate::visualize::GroupBy::Language),
            ..VisualizationOptions::default()
        };
        let source = |language: &str| {
            facts(json!([
                {"fact": "node", "id": "main.src", "type": "file", "language": language}
            ]))
        };

        let rust = engine.visualize(&options, &source("rust")).expect("viz");
        let python = engine.visualize(&options, &source("python")).expect("viz");

        let labels = |r: &VisualizationResponse| -> Vec<String> {
            r.groups.iter().flat_map(|g| g.keys().cloned()).collect()
        };
        assert_eq!(labels(&rust), vec!["rust"]);
        assert_eq!(labels(&python), vec!["python"]);
        assert_eq!(store.len(), 2);
    }
}
