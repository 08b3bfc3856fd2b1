//! Engine settings, loaded from TOML.
//!
//! ```toml
//! [logging]
//! filter = "info,actorflow_core=debug"
//! json = false
//!
//! [engine]
//! placeholders = "error"
//! max_expression_operations = 100000
//! ```

use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Environment variable overriding `logging.filter`.
pub const LOG_ENV: &str = "ACTORFLOW_LOG";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub logging: LoggingSettings,
    pub engine: EngineSettings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// `tracing_subscriber::EnvFilter` directive string.
    pub filter: String,
    /// Emit JSON lines instead of the human readable format.
    pub json: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            filter: "info".to_string(),
            json: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineSettings {
    /// What to do with `@{name}` placeholders that have no storage value.
    pub placeholders: PlaceholderPolicy,
    /// Upper bound on operations for a single condition/expression evaluation.
    pub max_expression_operations: u64,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            placeholders: PlaceholderPolicy::Error,
            max_expression_operations: 100_000,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlaceholderPolicy {
    /// Fail the expanding actor.
    #[default]
    Error,
    /// Replace with an empty string.
    Empty,
    /// Leave the placeholder text untouched.
    Keep,
}

impl Settings {
    pub fn from_toml_str(content: &str) -> anyhow::Result<Self> {
        toml::from_str(content).context("failed to parse actorflow settings")
    }

    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read settings from {}", path.display()))?;
        Self::from_toml_str(&content)
    }

    /// Applies overrides from the process environment.
    pub fn apply_env(mut self) -> Self {
        if let Ok(filter) = std::env::var(LOG_ENV) {
            if !filter.trim().is_empty() {
                self.logging.filter = filter;
            }
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let settings = Settings::from_toml_str(
            r#"
            [engine]
            placeholders = "keep"
            "#,
        )
        .unwrap();
        assert_eq!(settings.engine.placeholders, PlaceholderPolicy::Keep);
        assert_eq!(settings.engine.max_expression_operations, 100_000);
        assert_eq!(settings.logging, LoggingSettings::default());
    }

    #[test]
    fn test_invalid_policy_is_rejected() {
        let result = Settings::from_toml_str("[engine]\nplaceholders = \"ignore\"\n");
        assert!(result.is_err());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("actorflow.toml");
        std::fs::write(&path, "[logging]\njson = true\nfilter = \"debug\"\n").unwrap();
        let settings = Settings::load(&path).unwrap();
        assert!(settings.logging.json);
        assert_eq!(settings.logging.filter, "debug");
    }
}
