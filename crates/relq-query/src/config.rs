//! Compiler configuration.
//!
//! ```toml
//! provider = "sqlite"
//! parameter_prefix = "p"
//! use_relational_nulls = false
//!
//! [plan_cache]
//! enabled = true
//! max_entries = 1024
//! ```

use crate::providers::SqlDialect;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

static IDENTIFIER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("valid identifier regex"));

/// Errors raised while loading configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("TOML parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueryConfig {
    /// Target database provider
    pub provider: SqlDialect,

    /// Prefix of generated placeholder names (`p` gives `p0`, `p1`, ...)
    pub parameter_prefix: String,

    /// Compare nullable operands with plain SQL equality
    pub use_relational_nulls: bool,

    pub plan_cache: PlanCacheConfig,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            provider: SqlDialect::default(),
            parameter_prefix: "p".to_string(),
            use_relational_nulls: false,
            plan_cache: PlanCacheConfig::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlanCacheConfig {
    pub enabled: bool,

    /// Upper bound on retained finalized plans
    pub max_entries: usize,
}

impl Default for PlanCacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_entries: 1024,
        }
    }
}

impl QueryConfig {
    /// Parse and validate a TOML document. Missing keys take their defaults.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: QueryConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !IDENTIFIER.is_match(&self.parameter_prefix) {
            return Err(ConfigError::Invalid(format!(
                "parameter_prefix '{}' is not a valid identifier",
                self.parameter_prefix
            )));
        }
        if self.plan_cache.enabled && self.plan_cache.max_entries == 0 {
            return Err(ConfigError::Invalid(
                "plan_cache.max_entries must be positive when the cache is enabled".to_string(),
            ));
        }
        Ok(())
    }
}
