//! Evaluation context configuration.
//!
//! Loaded from a TOML file (or string) by the embedding scheduler:
//!
//! ```toml
//! class_memoization = true
//!
//! [escape]
//! target_prefixes = ["${node.unique.", "${attr.unique.", "${meta.unique."]
//! operands = ["distinct_hosts"]
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};
use warpgrid_state::ConstraintOperand;

use crate::error::{EvalError, EvalResult};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EvalConfig {
    /// Memoize feasibility per computed node class. When off, every class
    /// reports as escaped and callers evaluate each node individually.
    pub class_memoization: bool,
    pub escape: EscapeConfig,
}

/// Which constraints cannot be captured by computed-class equality.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EscapeConfig {
    /// A constraint whose left or right target starts with one of these
    /// references a per-node value and escapes.
    pub target_prefixes: Vec<String>,
    /// Constraints using one of these operands escape.
    pub operands: Vec<String>,
}

impl Default for EvalConfig {
    fn default() -> Self {
        Self {
            class_memoization: true,
            escape: EscapeConfig::default(),
        }
    }
}

impl Default for EscapeConfig {
    fn default() -> Self {
        Self {
            target_prefixes: vec![
                "${node.unique.".to_string(),
                "${attr.unique.".to_string(),
                "${meta.unique.".to_string(),
            ],
            operands: vec![ConstraintOperand::DistinctHosts.as_str().to_string()],
        }
    }
}

impl EvalConfig {
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> anyhow::Result<Self> {
        let config: EvalConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml_string(&self) -> anyhow::Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> EvalResult<()> {
        if self.escape.target_prefixes.iter().any(String::is_empty) {
            return Err(EvalError::Config(
                "escape.target_prefixes must not contain empty prefixes".to_string(),
            ));
        }
        for operand in &self.escape.operands {
            if ConstraintOperand::from_name(operand).is_none() {
                return Err(EvalError::Config(format!(
                    "unknown constraint operand in escape.operands: {operand:?}"
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_uses_defaults() {
        let config = EvalConfig::from_toml_str("").unwrap();
        assert_eq!(config, EvalConfig::default());
        assert!(config.class_memoization);
        assert_eq!(config.escape.operands, vec!["distinct_hosts"]);
    }

    #[test]
    fn partial_document_overrides_fields() {
        let config = EvalConfig::from_toml_str(
            r#"
class_memoization = false

[escape]
target_prefixes = ["${meta.rack_id"]
"#,
        )
        .unwrap();

        assert!(!config.class_memoization);
        assert_eq!(config.escape.target_prefixes, vec!["${meta.rack_id"]);
        assert_eq!(config.escape.operands, vec!["distinct_hosts"]);
    }

    #[test]
    fn rejects_unknown_operand() {
        let err = EvalConfig::from_toml_str(
            r#"
[escape]
operands = ["near"]
"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("near"));
    }

    #[test]
    fn rejects_empty_prefix() {
        let mut config = EvalConfig::default();
        config.escape.target_prefixes.push(String::new());
        assert!(matches!(config.validate(), Err(EvalError::Config(_))));
    }

    #[test]
    fn round_trips_through_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("eval.toml");
        let mut config = EvalConfig::default();
        config.class_memoization = false;
        std::fs::write(&path, config.to_toml_string().unwrap()).unwrap();

        assert_eq!(EvalConfig::from_file(&path).unwrap(), config);
    }
}
