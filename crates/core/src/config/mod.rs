//! Run configuration.
//!
//! Stored as JSON or YAML; every field has a default so `{}` is a valid
//! configuration.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::markov::DEFAULT_CUTOFF;
use crate::model::StringEncoding;
use crate::naming::{self, NamingRules, DEFAULT_MAX_NAME_LEN, DEFAULT_PREFIX};
use crate::rename::{HashSuffix, NumericSuffix, Uniquifier, DEFAULT_MAX_ATTEMPTS};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config {}: {source}", .path.display())]
    Io { path: PathBuf, source: std::io::Error },
    #[error("Failed to parse config {}: {message}", .path.display())]
    Parse { path: PathBuf, message: String },
    #[error("Unsupported config extension for {}", .0.display())]
    UnsupportedFormat(PathBuf),
    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// Propagation strategy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    /// Rename nodes with exactly one qualifying reference to a named node.
    #[default]
    Direct,
    /// Rename nodes whose majority reference (after culling) is named.
    Markov,
}

impl Strategy {
    pub fn as_str(self) -> &'static str {
        match self {
            Strategy::Direct => "direct",
            Strategy::Markov => "markov",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UniquifierKind {
    #[default]
    Numeric,
    Hash,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UniquifierConfig {
    #[serde(default)]
    pub kind: UniquifierKind,
    /// Suffixed candidates tried after the bare name.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: usize,
}

impl Default for UniquifierConfig {
    fn default() -> Self {
        Self { kind: UniquifierKind::default(), max_attempts: DEFAULT_MAX_ATTEMPTS }
    }
}

impl UniquifierConfig {
    pub fn build(&self) -> Box<dyn Uniquifier> {
        match self.kind {
            UniquifierKind::Numeric => Box::new(NumericSuffix { max_suffixes: self.max_attempts }),
            UniquifierKind::Hash => Box::new(HashSuffix { max_suffixes: self.max_attempts }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AutonameConfig {
    #[serde(default)]
    pub strategy: Strategy,
    /// Minimum edge weight kept by the Markov strategy.
    #[serde(default = "default_cutoff")]
    pub cutoff: f64,
    /// Marker prepended to every inferred name.
    #[serde(default = "default_prefix")]
    pub prefix: String,
    /// Upper bound for names derived from string literals.
    #[serde(default = "default_max_name_len")]
    pub max_name_len: usize,
    #[serde(default)]
    pub string_encoding: StringEncoding,
    /// Rename string literals themselves before anchoring functions.
    #[serde(default = "default_true")]
    pub rename_string_literals: bool,
    /// Seed function names from singly-referenced string literals.
    #[serde(default = "default_true")]
    pub anchor_strings: bool,
    /// Skip ordinary fall-through references when collecting references.
    #[serde(default = "default_true")]
    pub ignore_flow_refs: bool,
    /// Optional ceiling on propagation passes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_passes: Option<usize>,
    #[serde(default)]
    pub uniquifier: UniquifierConfig,
    /// SQLite file receiving the audit trail of each run.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audit_db: Option<String>,
}

fn default_cutoff() -> f64 {
    DEFAULT_CUTOFF
}

fn default_prefix() -> String {
    DEFAULT_PREFIX.to_string()
}

fn default_max_name_len() -> usize {
    DEFAULT_MAX_NAME_LEN
}

fn default_max_attempts() -> usize {
    DEFAULT_MAX_ATTEMPTS
}

fn default_true() -> bool {
    true
}

impl Default for AutonameConfig {
    fn default() -> Self {
        Self {
            strategy: Strategy::default(),
            cutoff: DEFAULT_CUTOFF,
            prefix: default_prefix(),
            max_name_len: DEFAULT_MAX_NAME_LEN,
            string_encoding: StringEncoding::default(),
            rename_string_literals: true,
            anchor_strings: true,
            ignore_flow_refs: true,
            max_passes: None,
            uniquifier: UniquifierConfig::default(),
            audit_db: None,
        }
    }
}

impl AutonameConfig {
    pub fn with_strategy(mut self, strategy: Strategy) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.cutoff > 0.0 && self.cutoff <= 1.0) {
            return Err(ConfigError::Invalid(format!(
                "cutoff must be in (0, 1], got {}",
                self.cutoff
            )));
        }
        if self.prefix.is_empty() || !self.prefix.ends_with('_') {
            return Err(ConfigError::Invalid(format!(
                "prefix must be non-empty and end with '_', got '{}'",
                self.prefix
            )));
        }
        if !naming::is_named(&format!("{}x", self.prefix)) {
            return Err(ConfigError::Invalid(format!(
                "prefix '{}' collides with a placeholder prefix",
                self.prefix
            )));
        }
        if !self.naming_rules()?.has_marker(&format!("{}x", self.prefix)) {
            return Err(ConfigError::Invalid(format!(
                "prefix '{}' is not recognized as a marker",
                self.prefix
            )));
        }
        if self.max_name_len <= self.prefix.len() {
            return Err(ConfigError::Invalid(format!(
                "max_name_len must exceed the prefix length, got {}",
                self.max_name_len
            )));
        }
        if self.uniquifier.max_attempts == 0 {
            return Err(ConfigError::Invalid("uniquifier.max_attempts must be > 0".into()));
        }
        Ok(())
    }

    /// Naming rules for the configured prefix.
    pub fn naming_rules(&self) -> Result<NamingRules, ConfigError> {
        NamingRules::new(&self.prefix).map_err(|e| ConfigError::Invalid(e.to_string()))
    }
}

/// Load and validate a config from `.json`, `.yaml` or `.yml`.
pub fn load_config(path: &Path) -> Result<AutonameConfig, ConfigError> {
    let body = fs::read_to_string(path)
        .map_err(|source| ConfigError::Io { path: path.to_path_buf(), source })?;
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or_default();
    let config: AutonameConfig = match ext {
        "json" => serde_json::from_str(&body).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?,
        "yaml" | "yml" => serde_yaml::from_str(&body).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?,
        _ => return Err(ConfigError::UnsupportedFormat(path.to_path_buf())),
    };
    config.validate()?;
    Ok(config)
}
