//! Loader configuration.
//!
//! Read from the `[loader]` table of a TOML file. Every field has a default,
//! so an empty file (or no file) is a valid configuration.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_EXTENSION: &str = "json";

/// Errors raised while reading a configuration file.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {}: {message}", path.display())]
    Read { path: PathBuf, message: String },

    #[error("invalid loader config: {0}")]
    Parse(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoaderConfig {
    /// Directory searched for units.
    #[serde(default = "default_source_root")]
    pub source_root: PathBuf,

    /// Extension appended to unit names that do not already carry it.
    #[serde(default = "default_extension")]
    pub extension: String,

    /// How long an async `require` waits before giving up. Absent means
    /// forever.
    #[serde(default)]
    pub require_timeout_ms: Option<u64>,

    /// Log filter used when `RUST_LOG` is not set.
    #[serde(default)]
    pub log_filter: Option<String>,
}

fn default_source_root() -> PathBuf {
    PathBuf::from(".")
}

fn default_extension() -> String {
    DEFAULT_EXTENSION.to_string()
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            source_root: default_source_root(),
            extension: default_extension(),
            require_timeout_ms: None,
            log_filter: None,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigFile {
    #[serde(default)]
    loader: LoaderConfig,
}

impl LoaderConfig {
    /// Parse the `[loader]` table out of TOML text.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let file: ConfigFile = toml::from_str(text).map_err(|e| ConfigError::Parse(e.to_string()))?;
        Ok(file.loader)
    }

    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        Self::from_toml_str(&text)
    }

    pub fn with_source_root(mut self, source_root: impl Into<PathBuf>) -> Self {
        self.source_root = source_root.into();
        self
    }

    pub fn with_require_timeout(mut self, timeout: Duration) -> Self {
        self.require_timeout_ms = Some(u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX));
        self
    }

    pub fn require_timeout(&self) -> Option<Duration> {
        self.require_timeout_ms.map(Duration::from_millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_text_yields_defaults() {
        let config = LoaderConfig::from_toml_str("").expect("empty config parses");
        assert_eq!(config, LoaderConfig::default());
        assert_eq!(config.extension, "json");
        assert_eq!(config.require_timeout(), None);
    }

    #[test]
    fn loader_table_overrides_defaults() {
        let config = LoaderConfig::from_toml_str(
            r#"
            [loader]
            source_root = "demos/bundle"
            require_timeout_ms = 250
            log_filter = "modgraph_kernel=debug"
            "#,
        )
        .expect("config parses");

        assert_eq!(config.source_root, PathBuf::from("demos/bundle"));
        assert_eq!(config.extension, "json");
        assert_eq!(config.require_timeout(), Some(Duration::from_millis(250)));
        assert_eq!(config.log_filter.as_deref(), Some("modgraph_kernel=debug"));
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let err = LoaderConfig::from_toml_str("[loader]\nsource_dir = \"x\"\n")
            .expect_err("typo must be reported");
        assert!(matches!(err, ConfigError::Parse(message) if message.contains("source_dir")));
    }

    #[test]
    fn missing_file_reports_path() {
        let err = LoaderConfig::load("/nonexistent/modgraph.toml").expect_err("must fail");
        assert!(err.to_string().contains("/nonexistent/modgraph.toml"));
    }

    #[test]
    fn builders_override_fields() {
        let config = LoaderConfig::default()
            .with_source_root("units")
            .with_require_timeout(Duration::from_secs(2));
        assert_eq!(config.source_root, PathBuf::from("units"));
        assert_eq!(config.require_timeout_ms, Some(2000));
    }
}
