//! `flowcheck.toml` loading

use anyhow::{Context, Result};
use flowcheck_core::DataflowConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FlowcheckConfig {
    pub dataflow: DataflowConfig,
    pub checks: ChecksConfig,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChecksConfig {
    /// Checker names to skip
    pub disabled: Vec<String>,
    /// Extra type names the symbol table should resolve
    pub known_types: Vec<String>,
}

impl FlowcheckConfig {
    pub fn from_file(path: &Path) -> Result<Self> {
        let content =
            std::fs::read_to_string(path).with_context(|| format!("failed to read config {}", path.display()))?;
        toml::from_str(&content).with_context(|| format!("invalid config {}", path.display()))
    }

    /// The file at `path`, or defaults when no path is given
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::from_file(path),
            None => Ok(Self::default()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_config_keeps_defaults() {
        let config: FlowcheckConfig = toml::from_str(
            r#"
            [checks]
            disabled = ["constant-condition"]
            "#,
        )
        .unwrap();
        assert_eq!(config.checks.disabled, vec!["constant-condition"]);
        assert!(config.checks.known_types.is_empty());
        assert_eq!(config.dataflow, DataflowConfig::default());
    }

    #[test]
    fn test_dataflow_section() {
        let config: FlowcheckConfig = toml::from_str(
            r#"
            [dataflow]
            max_visits_per_node = 8
            "#,
        )
        .unwrap();
        assert_eq!(config.dataflow.max_visits_per_node, 8);
        assert_eq!(config.dataflow.min_visit_limit, DataflowConfig::default().min_visit_limit);
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let err = FlowcheckConfig::from_file(Path::new("/nonexistent/flowcheck.toml")).unwrap_err();
        assert!(err.to_string().contains("failed to read config"));
    }
}
