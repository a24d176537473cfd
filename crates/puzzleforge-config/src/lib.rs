//! Configuration system for PuzzleForge.
//!
//! Load generator settings from TOML or YAML files to tune sampling budgets,
//! solver limits and regeneration without touching specifications.
//!
//! # Examples
//!
//! Load configuration from TOML string:
//!
//! ```
//! use puzzleforge_config::GeneratorConfig;
//! use std::time::Duration;
//!
//! let config = GeneratorConfig::from_toml_str(r#"
//!     random_seed = 7
//!
//!     [sampler]
//!     max_attempts = 500
//!
//!     [solver]
//!     time_limit_ms = 2000
//! "#).unwrap();
//!
//! assert_eq!(config.sampler.max_attempts, 500);
//! assert_eq!(config.solver.time_limit(), Some(Duration::from_millis(2000)));
//! ```
//!
//! Use default config when file is missing:
//!
//! ```
//! use puzzleforge_config::GeneratorConfig;
//!
//! let config = GeneratorConfig::load("generator.toml").unwrap_or_default();
//! assert_eq!(config.sampler.max_attempts, 1000);
//! ```

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Configuration error
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Main generator configuration.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct GeneratorConfig {
    /// Random seed for reproducible batches.
    #[serde(default)]
    pub random_seed: Option<u64>,

    /// Combinatorial sampler limits.
    #[serde(default)]
    pub sampler: SamplerConfig,

    /// Constraint solver limits.
    #[serde(default)]
    pub solver: SolverSettings,

    /// Top-level generation loop.
    #[serde(default)]
    pub generation: GenerationConfig,
}

impl GeneratorConfig {
    /// Creates a new default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads configuration from a file, picking the format by extension.
    ///
    /// # Errors
    ///
    /// Returns error if file doesn't exist or cannot be parsed.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        match path.extension().and_then(|e| e.to_str()) {
            Some("yaml") | Some("yml") => Self::from_yaml_file(path),
            _ => Self::from_toml_file(path),
        }
    }

    /// Loads configuration from a TOML file.
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }

    /// Parses configuration from a TOML string.
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    /// Loads configuration from a YAML file.
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&contents)
    }

    /// Parses configuration from a YAML string.
    pub fn from_yaml_str(s: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_yaml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    /// Checks value ranges serde cannot express.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.sampler.max_attempts == 0 {
            return Err(ConfigError::Invalid(
                "sampler.max_attempts must be at least 1".to_string(),
            ));
        }
        let [lo, hi] = self.solver.default_int_bounds;
        if lo > hi {
            return Err(ConfigError::Invalid(format!(
                "solver.default_int_bounds [{lo}, {hi}] is empty"
            )));
        }
        if self.solver.real_step.is_nan() || self.solver.real_step <= 0.0 {
            return Err(ConfigError::Invalid(
                "solver.real_step must be positive".to_string(),
            ));
        }
        if self.generation.threads == Some(0) {
            return Err(ConfigError::Invalid(
                "generation.threads must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Sets the random seed.
    pub fn with_random_seed(mut self, seed: u64) -> Self {
        self.random_seed = Some(seed);
        self
    }

    /// Sets the rejection-sampling retry budget.
    pub fn with_max_attempts(mut self, attempts: usize) -> Self {
        self.sampler.max_attempts = attempts;
        self
    }

    /// Sets the solver time limit in milliseconds.
    pub fn with_time_limit_ms(mut self, ms: u64) -> Self {
        self.solver.time_limit_ms = Some(ms);
        self
    }

    /// Sets the continuous-mode regeneration bound.
    pub fn with_max_regenerations(mut self, n: usize) -> Self {
        self.generation.max_regenerations = n;
        self
    }
}

/// Sampler configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case", default)]
pub struct SamplerConfig {
    /// Batches drawn before a sampling request fails.
    pub max_attempts: usize,

    /// Largest candidate pool the sampler will enumerate.
    pub max_pool_size: usize,
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            max_attempts: 1000,
            max_pool_size: 2_000_000,
        }
    }
}

/// Solver configuration.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case", default)]
pub struct SolverSettings {
    /// Wall-clock limit per solver check.
    pub time_limit_ms: Option<u64>,

    /// Maximum search nodes per solver check.
    pub node_limit: Option<u64>,

    /// Bounds for integer unknowns with no declared or inferred range.
    pub default_int_bounds: [i64; 2],

    /// Grid step for real-valued unknowns.
    pub real_step: f64,

    /// Solutions enumerated to pick a post-generation baseline.
    pub post_gen_baseline_limit: usize,
}

impl Default for SolverSettings {
    fn default() -> Self {
        Self {
            time_limit_ms: Some(15_000),
            node_limit: None,
            default_int_bounds: [-100, 100],
            real_step: 0.5,
            post_gen_baseline_limit: 10,
        }
    }
}

impl SolverSettings {
    /// Returns the time limit as a Duration, if any.
    pub fn time_limit(&self) -> Option<Duration> {
        match self.time_limit_ms {
            Some(ms) if ms > 0 => Some(Duration::from_millis(ms)),
            _ => None,
        }
    }
}

/// Generation loop configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case", default)]
pub struct GenerationConfig {
    /// Attempts discarded by continuous mode before giving up.
    pub max_regenerations: usize,

    /// Worker threads for batch generation (rayon default when unset).
    pub threads: Option<usize>,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            max_regenerations: 1000,
            threads: None,
        }
    }
}
