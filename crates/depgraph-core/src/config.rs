//! Engine configuration.
//!
//! Loaded from `<project>/.depgraph/config.toml`, layered over the user
//! config at `<config_dir>/depgraph/config.toml`. Missing files mean
//! defaults. Every section and field is optional.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::build::BuildOptions;

/// Project-relative location of the project config.
pub const PROJECT_CONFIG_PATH: &str = ".depgraph/config.toml";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub limits: LimitsConfig,
    pub impact: ImpactConfig,
    pub plan: PlanConfig,
    pub build: BuildOptions,
}

/// Hard caps that reject a request with `GraphTooLarge`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    pub max_nodes: usize,
    pub max_edges: usize,
    /// Above this many condensed components the redundant-edge statistic
    /// is skipped.
    pub max_reduction_nodes: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_nodes: 100_000,
            max_edges: 1_000_000,
            max_reduction_nodes: 10_000,
        }
    }
}

/// Risk thresholds for impact analysis.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImpactConfig {
    /// An affected node with more direct dependents than this is high risk.
    pub high_dependents_threshold: usize,
    /// Affected/total above this fraction is medium risk.
    pub medium_affected_fraction: f64,
}

impl Default for ImpactConfig {
    fn default() -> Self {
        Self {
            high_dependents_threshold: 10,
            medium_affected_fraction: 0.25,
        }
    }
}

/// Planner defaults for missing weights and costs.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlanConfig {
    pub default_edge_weight: f64,
    pub default_node_cost: f64,
}

impl Default for PlanConfig {
    fn default() -> Self {
        Self {
            default_edge_weight: 1.0,
            default_node_cost: 1.0,
        }
    }
}

/// Read one config file. A missing file yields `None`.
///
/// # Errors
///
/// Returns an error if the file exists but cannot be read or parsed.
pub fn load_config_file(path: &Path) -> Result<Option<toml::Table>> {
    if !path.exists() {
        return Ok(None);
    }
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let table = toml::from_str::<toml::Table>(&content)
        .with_context(|| format!("Failed to parse {}", path.display()))?;
    Ok(Some(table))
}

/// User-level config path, if the platform has a config dir.
#[must_use]
pub fn user_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("depgraph/config.toml"))
}

/// Load the project config only.
///
/// # Errors
///
/// Returns an error if `.depgraph/config.toml` exists but is invalid.
pub fn load_project_config(project_root: &Path) -> Result<EngineConfig> {
    resolve_config(None, Some(&project_root.join(PROJECT_CONFIG_PATH)))
}

/// Layer `project` over `user` and deserialize the result.
///
/// Tables merge key by key, so a project file that sets only
/// `[limits] max_nodes` keeps the user's `max_edges`.
///
/// # Errors
///
/// Returns an error if either file is unreadable or the merged table does
/// not match the schema.
pub fn resolve_config(user: Option<&Path>, project: Option<&Path>) -> Result<EngineConfig> {
    let mut merged = toml::Table::new();
    for path in [user, project].into_iter().flatten() {
        if let Some(table) = load_config_file(path)? {
            merge_tables(&mut merged, table);
        }
    }
    toml::Value::Table(merged)
        .try_into::<EngineConfig>()
        .context("Invalid depgraph configuration")
}

fn merge_tables(base: &mut toml::Table, overlay: toml::Table) {
    for (key, value) in overlay {
        match value {
            toml::Value::Table(incoming) => {
                if let Some(toml::Value::Table(existing)) = base.get_mut(&key) {
                    merge_tables(existing, incoming);
                } else {
                    base.insert(key, toml::Value::Table(incoming));
                }
            }
            other => {
                base.insert(key, other);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_files_give_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        let config = load_project_config(dir.path()).expect("load");
        assert_eq!(config, EngineConfig::default());
        assert_eq!(config.limits.max_nodes, 100_000);
        assert_eq!(config.impact.high_dependents_threshold, 10);
    }

    #[test]
    fn project_overrides_user_per_key() {
        let dir = tempfile::tempdir().expect("tempdir");
        let user = dir.path().join("user.toml");
        let project = dir.path().join("project.toml");
        std::fs::write(&user, "[limits]\nmax_nodes = 50\nmax_edges = 70\n").expect("write");
        std::fs::write(&project, "[limits]\nmax_nodes = 5\n\n[build]\npermissive = true\n")
            .expect("write");

        let config = resolve_config(Some(&user), Some(&project)).expect("resolve");
        assert_eq!(config.limits.max_nodes, 5);
        assert_eq!(config.limits.max_edges, 70);
        assert_eq!(config.limits.max_reduction_nodes, 10_000);
        assert!(config.build.permissive);
        assert!(!config.build.expand_package_closure);
    }

    #[test]
    fn malformed_file_reports_path() {
        let dir = tempfile::tempdir().expect("tempdir");
        let cfg_dir = dir.path().join(".depgraph");
        std::fs::create_dir_all(&cfg_dir).expect("mkdir");
        std::fs::write(cfg_dir.join("config.toml"), "[limits\n").expect("write");

        let err = load_project_config(dir.path()).expect_err("parse error");
        assert!(format!("{err:#}").contains("config.toml"));
    }
}
