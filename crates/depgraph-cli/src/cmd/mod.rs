pub mod analyze;
pub mod completions;
pub mod cycles;
pub mod impact;
pub mod order;
pub mod parallel;
pub mod viz;

use std::path::{Path, PathBuf};

use anyhow::{Context as _, Result};
use clap::Args;
use depgraph_core::build::RawFact;
use depgraph_core::config::EngineConfig;
use depgraph_engine::Engine;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::output::OutputMode;

/// Where the facts come from, shared by every analysis command.
#[derive(Args, Debug, Clone)]
pub struct SourceArgs {
    /// Facts document (JSON or YAML) produced by an upstream analyzer.
    #[arg(long, value_name = "FILE")]
    pub facts: PathBuf,

    /// Stub unknown edge targets as `unknown` nodes instead of failing.
    #[arg(long)]
    pub permissive: bool,

    /// Project path used to resolve changed files and tag the request.
    #[arg(long, value_name = "PATH", default_value = ".")]
    pub project_path: String,
}

/// Per-invocation state handed to every command.
#[derive(Debug)]
pub struct Context {
    pub output: OutputMode,
    pub config: EngineConfig,
}

impl Context {
    /// An engine over the loaded config, with `--permissive` applied.
    pub fn engine(&self, source: &SourceArgs) -> Engine {
        let mut config = self.config.clone();
        config.build.permissive |= source.permissive;
        Engine::new(config)
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum FactsDocument {
    Wrapped { facts: Vec<RawFact> },
    Bare(Vec<RawFact>),
}

/// Read facts from a `{facts: [...]}` document or a bare list.
///
/// # Errors
///
/// Returns an error if the file is unreadable or not a facts document.
pub fn load_facts(path: &Path) -> Result<Vec<RawFact>> {
    let document: FactsDocument = read_document(path)?;
    let facts = match document {
        FactsDocument::Wrapped { facts } | FactsDocument::Bare(facts) => facts,
    };
    debug!(path = %path.display(), facts = facts.len(), "loaded facts");
    Ok(facts)
}

/// Deserialize a JSON or YAML file, picked by extension.
///
/// # Errors
///
/// Returns an error if the file is unreadable or does not parse as `T`.
pub fn read_document<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let is_yaml = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("yaml") || ext.eq_ignore_ascii_case("yml"));
    if is_yaml {
        serde_yaml::from_str(&content).with_context(|| format!("Failed to parse {}", path.display()))
    } else {
        serde_json::from_str(&content).with_context(|| format!("Failed to parse {}", path.display()))
    }
}

/// clap value parser for enums that already speak serde.
pub fn parse_serde<T: DeserializeOwned>(value: &str) -> std::result::Result<T, String> {
    serde_json::from_value(serde_json::Value::String(value.to_string()))
        .map_err(|_| format!("unsupported value '{value}'"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use depgraph_core::model::NodeType;

    #[test]
    fn loads_wrapped_json_and_bare_yaml() {
        let dir = tempfile::tempdir().expect("tempdir");
        let json = dir.path().join("facts.json");
        std::fs::write(
            &json,
            r#"{"facts": [{"fact": "step", "id": "build"}, {"fact": "step", "id": "test", "needs": ["build"]}]}"#,
        )
        .expect("write");
        assert_eq!(load_facts(&json).expect("json").len(), 2);

        let yaml = dir.path().join("facts.yml");
        std::fs::write(&yaml, "- fact: step\n  id: build\n").expect("write");
        assert_eq!(load_facts(&yaml).expect("yaml").len(), 1);
    }

    #[test]
    fn malformed_document_names_the_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("broken.json");
        std::fs::write(&path, "{not json").expect("write");
        let err = load_facts(&path).expect_err("should fail");
        assert!(format!("{err:#}").contains("broken.json"));
    }

    #[test]
    fn serde_values_parse_from_flags() {
        assert_eq!(parse_serde::<NodeType>("pipeline-step"), Ok(NodeType::PipelineStep));
        assert!(parse_serde::<NodeType>("spaceship").is_err());
    }

    #[test]
    fn permissive_flag_overrides_config() {
        let ctx = Context {
            output: OutputMode::Json,
            config: EngineConfig::default(),
        };
        let source = SourceArgs {
            facts: PathBuf::from("facts.json"),
            permissive: true,
            project_path: ".".into(),
        };
        assert!(ctx.engine(&source).config().build.permissive);
    }
}
