//! Configuration types for evaluation runs

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::{EvalError, Result};

/// Main configuration for the evaluation harness
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct EvaliteConfig {
    /// Task execution configuration
    #[serde(default)]
    pub runner: RunnerConfig,

    /// Run history configuration
    #[serde(default)]
    pub history: HistoryConfig,

    /// Derived metrics configuration
    #[serde(default)]
    pub metrics: MetricsConfig,
}

/// Task execution configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct RunnerConfig {
    /// Maximum rows executing at once (unbounded when unset)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_concurrency: Option<usize>,

    /// Per-row task timeout; a row that exceeds it fails
    #[serde(
        default,
        with = "humantime_serde",
        skip_serializing_if = "Option::is_none"
    )]
    pub task_timeout: Option<Duration>,
}

/// Run history configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct HistoryConfig {
    /// Runs kept per evaluation name, oldest dropped first (unlimited when unset)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_runs_per_eval: Option<usize>,
}

/// Derived metrics configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    /// Absolute difference under which two scores count as unchanged
    #[serde(default)]
    pub score_tolerance: f64,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            score_tolerance: 0.0,
        }
    }
}

/// Builder for EvaliteConfig
pub struct ConfigBuilder {
    config: EvaliteConfig,
}

impl ConfigBuilder {
    /// Create a new configuration builder
    pub fn new() -> Self {
        Self {
            config: EvaliteConfig::default(),
        }
    }

    /// Limit how many rows run at once
    pub fn max_concurrency(mut self, max: usize) -> Self {
        self.config.runner.max_concurrency = Some(max);
        self
    }

    /// Fail rows whose task runs longer than `timeout`
    pub fn task_timeout(mut self, timeout: Duration) -> Self {
        self.config.runner.task_timeout = Some(timeout);
        self
    }

    /// Keep at most `max` runs per evaluation
    pub fn max_runs_per_eval(mut self, max: usize) -> Self {
        self.config.history.max_runs_per_eval = Some(max);
        self
    }

    /// Set the tolerance used for score state classification
    pub fn score_tolerance(mut self, tolerance: f64) -> Self {
        self.config.metrics.score_tolerance = tolerance;
        self
    }

    /// Build the configuration
    pub fn build(self) -> EvaliteConfig {
        self.config
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl EvaliteConfig {
    /// Create a configuration builder
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::new()
    }

    /// Load configuration from file and environment variables.
    ///
    /// Loads in this order:
    /// 1. Default configuration
    /// 2. Configuration file (evalite.toml, then the path in EVALITE_CONFIG_PATH)
    /// 3. Environment variable overrides (`EVALITE_RUNNER__MAX_CONCURRENCY=8`)
    ///
    /// # Errors
    ///
    /// Returns an error if a configuration source is invalid or the merged
    /// configuration fails validation.
    pub fn load() -> Result<Self> {
        use figment::{
            Figment,
            providers::{Env, Format, Serialized, Toml},
        };

        let mut figment = Figment::from(Serialized::defaults(EvaliteConfig::default()))
            .merge(Toml::file("evalite.toml"));

        if let Ok(path) = std::env::var("EVALITE_CONFIG_PATH") {
            figment = figment.merge(Toml::file(path));
        }

        let figment = figment.merge(
            Env::prefixed("EVALITE_")
                .ignore(&["CONFIG_PATH"])
                .split("__"),
        );

        let config: EvaliteConfig = figment.extract().map_err(|e| {
            EvalError::Configuration(format!("Failed to load configuration: {}", e))
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file path.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: impl AsRef<std::path::Path>) -> Result<Self> {
        use figment::{
            Figment,
            providers::{Format, Serialized, Toml},
        };

        let config: EvaliteConfig = Figment::from(Serialized::defaults(EvaliteConfig::default()))
            .merge(Toml::file(path))
            .extract()
            .map_err(|e| {
                EvalError::Configuration(format!("Failed to load configuration file: {}", e))
            })?;

        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if a limit is zero or the tolerance is not a
    /// non-negative finite number.
    pub fn validate(&self) -> Result<()> {
        if self.runner.max_concurrency == Some(0) {
            return Err(EvalError::Configuration(
                "runner.max_concurrency must be at least 1".to_string(),
            ));
        }
        if self.history.max_runs_per_eval == Some(0) {
            return Err(EvalError::Configuration(
                "history.max_runs_per_eval must be at least 1".to_string(),
            ));
        }
        let tolerance = self.metrics.score_tolerance;
        if !tolerance.is_finite() || tolerance < 0.0 {
            return Err(EvalError::Configuration(format!(
                "metrics.score_tolerance must be a non-negative number, got {}",
                tolerance
            )));
        }
        Ok(())
    }
}
