//! Configuration resolution.
//!
//! Settings come from four sources, lowest precedence first:
//!
//! 1. Built-in defaults
//! 2. `symdex.json` in the workspace root
//! 3. Environment variables (`SYMDEX_*`)
//! 4. CLI flags
//!
//! Every resolved value remembers its [`ConfigSource`].

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use symdex_core::index::IndexOptions;
use symdex_core::transform::ExtractionOptions;

use crate::loader::LoadOptions;

/// Project config file name.
pub const PROJECT_CONFIG_FILE: &str = "symdex.json";

pub const ENV_INCLUDE_TESTS: &str = "SYMDEX_INCLUDE_TESTS";
pub const ENV_INCLUDE_PRIVATE: &str = "SYMDEX_INCLUDE_PRIVATE";
pub const ENV_MIN_TYPES: &str = "SYMDEX_MIN_TYPES";
pub const ENV_MIN_METHODS: &str = "SYMDEX_MIN_METHODS";

// ============================================================================
// Errors
// ============================================================================

/// Errors from reading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid {}: {message}", path.display())]
    Parse { path: PathBuf, message: String },

    /// A setting holds a value of the wrong shape.
    #[error("invalid value '{value}' for {key}: {reason}")]
    InvalidValue {
        key: String,
        value: String,
        reason: String,
    },
}

pub type ConfigResult<T> = Result<T, ConfigError>;

// ============================================================================
// Configuration Sources
// ============================================================================

/// Configuration value source (for precedence tracking).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfigSource {
    /// Built-in default value.
    Default = 0,
    /// From `symdex.json`.
    ProjectConfig = 1,
    /// From environment variable.
    EnvVar = 2,
    /// From CLI flag (highest precedence).
    CliFlag = 3,
}

/// A configuration value with its source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigValue<T> {
    pub value: T,
    pub source: ConfigSource,
}

impl<T> ConfigValue<T> {
    pub fn new(value: T, source: ConfigSource) -> Self {
        ConfigValue { value, source }
    }

    /// Merge with another value, preferring higher precedence.
    pub fn merge(self, other: Self) -> Self {
        if other.source >= self.source {
            other
        } else {
            self
        }
    }
}

// ============================================================================
// Project Config
// ============================================================================

/// Contents of `symdex.json`. Every field is optional.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProjectConfig {
    pub include_tests: Option<bool>,
    pub include_private: Option<bool>,
    pub load_docs: Option<bool>,
    pub build_tags: Option<Vec<String>>,
    pub min_types: Option<usize>,
    pub min_methods: Option<usize>,
    pub exclude_packages: Option<Vec<String>>,
    pub exclude_types: Option<Vec<String>>,
    pub exclude_methods: Option<Vec<String>>,
    pub test_command: Option<Vec<String>>,
}

impl ProjectConfig {
    /// Read `symdex.json` from `workspace_root`; absent means empty.
    pub fn load(workspace_root: &Path) -> ConfigResult<Self> {
        let path = workspace_root.join(PROJECT_CONFIG_FILE);
        if !path.is_file() {
            return Ok(ProjectConfig::default());
        }
        let text = fs::read_to_string(&path).map_err(|source| ConfigError::Read {
            path: path.clone(),
            source,
        })?;
        serde_json::from_str(&text).map_err(|e| ConfigError::Parse {
            path,
            message: e.to_string(),
        })
    }
}

/// CLI configuration overrides.
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub include_tests: Option<bool>,
    pub include_private: Option<bool>,
    pub min_types: Option<usize>,
    pub min_methods: Option<usize>,
    pub build_tags: Vec<String>,
}

// ============================================================================
// Configuration Resolution
// ============================================================================

/// Resolved configuration with precedence information.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedConfig {
    pub include_tests: ConfigValue<bool>,
    pub include_private: ConfigValue<bool>,
    pub load_docs: ConfigValue<bool>,
    pub build_tags: ConfigValue<Vec<String>>,
    pub min_types: ConfigValue<usize>,
    pub min_methods: ConfigValue<usize>,
    pub exclude_packages: Vec<String>,
    pub exclude_types: Vec<String>,
    pub exclude_methods: Vec<String>,
    pub test_command: Option<ConfigValue<Vec<String>>>,
}

impl Default for ResolvedConfig {
    fn default() -> Self {
        let extraction = ExtractionOptions::default();
        ResolvedConfig {
            include_tests: ConfigValue::new(false, ConfigSource::Default),
            include_private: ConfigValue::new(false, ConfigSource::Default),
            load_docs: ConfigValue::new(true, ConfigSource::Default),
            build_tags: ConfigValue::new(Vec::new(), ConfigSource::Default),
            min_types: ConfigValue::new(extraction.min_types, ConfigSource::Default),
            min_methods: ConfigValue::new(extraction.min_methods, ConfigSource::Default),
            exclude_packages: Vec::new(),
            exclude_types: Vec::new(),
            exclude_methods: Vec::new(),
            test_command: None,
        }
    }
}

impl ResolvedConfig {
    /// Resolve configuration from all sources, reading the process
    /// environment.
    pub fn resolve(workspace_root: &Path, cli: &CliOverrides) -> ConfigResult<Self> {
        Self::resolve_with_env(workspace_root, cli, |key| std::env::var(key).ok())
    }

    /// Resolve with `env` standing in for the process environment.
    pub fn resolve_with_env(
        workspace_root: &Path,
        cli: &CliOverrides,
        env: impl Fn(&str) -> Option<String>,
    ) -> ConfigResult<Self> {
        let mut config = ResolvedConfig::default();
        config.apply_project_config(&ProjectConfig::load(workspace_root)?);
        config.apply_env_vars(env)?;
        config.apply_cli_overrides(cli);
        tracing::debug!(
            include_tests = config.include_tests.value,
            include_private = config.include_private.value,
            min_types = config.min_types.value,
            min_methods = config.min_methods.value,
            "resolved configuration"
        );
        Ok(config)
    }

    fn apply_project_config(&mut self, project: &ProjectConfig) {
        let from = ConfigSource::ProjectConfig;
        set(&mut self.include_tests, project.include_tests, from);
        set(&mut self.include_private, project.include_private, from);
        set(&mut self.load_docs, project.load_docs, from);
        set(&mut self.build_tags, project.build_tags.clone(), from);
        set(&mut self.min_types, project.min_types, from);
        set(&mut self.min_methods, project.min_methods, from);
        self.exclude_packages = project.exclude_packages.clone().unwrap_or_default();
        self.exclude_types = project.exclude_types.clone().unwrap_or_default();
        self.exclude_methods = project.exclude_methods.clone().unwrap_or_default();
        self.test_command = project
            .test_command
            .clone()
            .map(|c| ConfigValue::new(c, from));
    }

    fn apply_env_vars(&mut self, env: impl Fn(&str) -> Option<String>) -> ConfigResult<()> {
        let from = ConfigSource::EnvVar;
        if let Some(v) = env(ENV_INCLUDE_TESTS) {
            set(&mut self.include_tests, Some(parse_bool(ENV_INCLUDE_TESTS, &v)?), from);
        }
        if let Some(v) = env(ENV_INCLUDE_PRIVATE) {
            set(&mut self.include_private, Some(parse_bool(ENV_INCLUDE_PRIVATE, &v)?), from);
        }
        if let Some(v) = env(ENV_MIN_TYPES) {
            set(&mut self.min_types, Some(parse_count(ENV_MIN_TYPES, &v)?), from);
        }
        if let Some(v) = env(ENV_MIN_METHODS) {
            set(&mut self.min_methods, Some(parse_count(ENV_MIN_METHODS, &v)?), from);
        }
        Ok(())
    }

    fn apply_cli_overrides(&mut self, cli: &CliOverrides) {
        let from = ConfigSource::CliFlag;
        set(&mut self.include_tests, cli.include_tests, from);
        set(&mut self.include_private, cli.include_private, from);
        set(&mut self.min_types, cli.min_types, from);
        set(&mut self.min_methods, cli.min_methods, from);
        if !cli.build_tags.is_empty() {
            set(&mut self.build_tags, Some(cli.build_tags.clone()), from);
        }
    }

    pub fn load_options(&self) -> LoadOptions {
        LoadOptions {
            include_tests: self.include_tests.value,
            include_private: self.include_private.value,
            load_docs: self.load_docs.value,
            build_tags: self.build_tags.value.clone(),
        }
    }

    pub fn index_options(&self) -> IndexOptions {
        IndexOptions {
            include_tests: self.include_tests.value,
            include_private: self.include_private.value,
        }
    }

    /// Extraction options seeded from this config; per-run fields keep
    /// their defaults.
    pub fn extraction_options(&self) -> ExtractionOptions {
        ExtractionOptions {
            min_types: self.min_types.value,
            min_methods: self.min_methods.value,
            include_private: self.include_private.value,
            exclude_packages: self.exclude_packages.clone(),
            exclude_types: self.exclude_types.clone(),
            exclude_methods: self.exclude_methods.clone(),
            ..Default::default()
        }
    }
}

fn set<T: Clone>(slot: &mut ConfigValue<T>, value: Option<T>, source: ConfigSource) {
    if let Some(value) = value {
        *slot = slot.clone().merge(ConfigValue::new(value, source));
    }
}

fn parse_bool(key: &str, value: &str) -> ConfigResult<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            key: key.to_string(),
            value: value.to_string(),
            reason: "expected a boolean".to_string(),
        }),
    }
}

fn parse_count(key: &str, value: &str) -> ConfigResult<usize> {
    value.trim().parse().map_err(|_| ConfigError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
        reason: "expected a non-negative integer".to_string(),
    })
}

// ============================================================================
// Tests
// ============================================================================
