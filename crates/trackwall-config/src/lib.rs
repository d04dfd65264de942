//! # Trackwall Configuration
//!
//! Typed configuration for the engine: bundled asset paths, the blocking
//! granularity flag, the persisted block-state location, and logging.
//! Loadable from YAML, JSON, or TOML by file extension, with sensible
//! defaults for everything.

#![warn(missing_docs)]
#![warn(clippy::all)]

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Configuration error.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// IO error reading the file.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML parse error.
    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// JSON parse error.
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML parse error.
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Semantic validation failure.
    #[error("Validation error: {0}")]
    Validation(String),

    /// Configuration file not found.
    #[error("File not found: {0}")]
    NotFound(PathBuf),
}

/// Result type for configuration operations.
pub type Result<T> = std::result::Result<T, ConfigError>;

/// Main configuration for the Trackwall engine.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Bundled asset locations.
    pub assets: AssetsConfig,

    /// Blocking-granularity settings.
    pub blocking: BlockingConfig,

    /// Persisted block-state location.
    pub state: StateConfig,

    /// Logging configuration.
    pub logging: LoggingConfig,
}

impl Config {
    /// Loads configuration from a file, dispatching on extension.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ConfigError::NotFound(path.to_path_buf()));
        }

        let content = std::fs::read_to_string(path)?;

        let config = match path.extension().and_then(|e| e.to_str()) {
            Some("yaml") | Some("yml") => serde_yaml::from_str(&content)?,
            Some("json") => serde_json::from_str(&content)?,
            Some("toml") => toml::from_str(&content)?,
            _ => serde_yaml::from_str(&content)?, // Default to YAML
        };

        Ok(config)
    }

    /// Loads configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    /// Validates the configuration.
    pub fn validate(&self) -> Result<()> {
        self.logging.validate()?;

        for (label, path) in [
            ("assets.companies", self.assets.companies.as_deref()),
            ("assets.categories", self.assets.categories.as_deref()),
            ("assets.ip_list", self.assets.ip_list.as_deref()),
            ("assets.merged_hosts", self.assets.merged_hosts.as_deref()),
        ] {
            if let Some(path) = path {
                if !path.exists() {
                    return Err(ConfigError::Validation(format!(
                        "{label}: no such file: {}",
                        path.display()
                    )));
                }
            }
        }

        Ok(())
    }

    /// Serialises to YAML.
    pub fn to_yaml(&self) -> Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }
}

/// Locations of the bundled directory assets. Unset sources are skipped
/// at load time.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AssetsConfig {
    /// Ontology source A: broad company/country taxonomy (JSON).
    pub companies: Option<PathBuf>,

    /// Ontology source B: curated category taxonomy (JSON), merged after
    /// A.
    pub categories: Option<PathBuf>,

    /// Static IP blocklist (newline text, `#` comments).
    pub ip_list: Option<PathBuf>,

    /// Merged hosts blocklist produced by the download/merge collaborator.
    pub merged_hosts: Option<PathBuf>,
}

/// Blocking-granularity settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BlockingConfig {
    /// Give each domain its own blockable identity instead of
    /// deduplicating by owning company.
    pub domain_based: bool,
}

/// Persisted block-state location.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StateConfig {
    /// Path of the block-state document. Unset means in-memory only.
    pub path: Option<PathBuf>,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error.
    pub level: String,

    /// Log format: "text" or "json".
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "text".to_string(),
        }
    }
}

impl LoggingConfig {
    fn validate(&self) -> Result<()> {
        match self.level.as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            other => {
                return Err(ConfigError::Validation(format!(
                    "logging.level: unknown level {other:?}"
                )))
            }
        }
        match self.format.as_str() {
            "text" | "json" => Ok(()),
            other => Err(ConfigError::Validation(format!(
                "logging.format: unknown format {other:?}"
            ))),
        }
    }
}
