//! Configuration loading for meterbench.
//!
//! Supports loading configuration from TOML files, with sensible defaults
//! for all settings.

use anyhow::{ensure, Context, Result};
use meterbench_core::{ArrangementKind, MeterSet, Resolution, TimeMeter};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;

/// Top-level configuration for meterbench.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Settings for planning and ordering a run.
    pub run: RunConfig,
    /// Built-in meters.
    pub meters: MeterConfig,
    /// Result presentation.
    pub output: OutputConfig,
}

/// Configuration for planning and ordering a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// Run count for benchmark methods that declare none.
    pub default_runs: u32,
    /// Execution-order strategy.
    pub arrangement: ArrangementKind,
    /// Seed for randomized arrangements (drawn from entropy when unset).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
    /// Only run benchmarks whose `Class::method` id contains this string.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filter: Option<String>,
}

/// Configuration for the built-in meters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MeterConfig {
    /// Whether wall-clock time is measured.
    pub time: bool,
    /// Unit of the time meter.
    pub resolution: Resolution,
}

/// Configuration for result output.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Print the result table to the terminal.
    pub terminal: bool,
    /// Use colors in terminal output.
    pub colors: bool,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            default_runs: 1,
            arrangement: ArrangementKind::Sequential,
            seed: None,
            filter: None,
        }
    }
}

impl Default for MeterConfig {
    fn default() -> Self {
        Self {
            time: true,
            resolution: Resolution::Nanos,
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            terminal: true,
            colors: true,
        }
    }
}

impl MeterConfig {
    /// The configured built-in meters.
    pub fn build(&self) -> MeterSet {
        let mut meters = MeterSet::new();
        if self.time {
            // The set is empty, so registration cannot collide.
            let _ = meters.register(Arc::new(TimeMeter::new(self.resolution)));
        }
        meters
    }
}

/// Default configuration file name.
pub const DEFAULT_CONFIG_FILE: &str = ".meterbench.toml";

impl Config {
    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, parsed or validated.
    pub fn load(path: &Path) -> Result<Config> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        config
            .validate()
            .with_context(|| format!("Invalid config file: {}", path.display()))?;

        Ok(config)
    }

    /// Load configuration from the default file (`.meterbench.toml`) or use defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration file exists but cannot be parsed.
    pub fn load_or_default() -> Result<Config> {
        let path = Path::new(DEFAULT_CONFIG_FILE);

        if path.exists() {
            Self::load(path)
        } else {
            Ok(Config::default())
        }
    }

    /// Load configuration from the specified path, or try the default location.
    ///
    /// # Errors
    ///
    /// Returns an error if the specified file cannot be read or parsed.
    pub fn load_from(path: Option<&Path>) -> Result<Config> {
        match path {
            Some(p) => Self::load(p),
            None => Self::load_or_default(),
        }
    }

    /// Check values that deserialize fine but cannot drive a run.
    pub fn validate(&self) -> Result<()> {
        ensure!(
            self.run.default_runs >= 1,
            "run.default_runs must be at least 1"
        );
        Ok(())
    }
}
