//! Configuration system for simulations.
//!
//! Run parameters and reusable bus shapes can be declared in YAML or JSON and
//! loaded at start-up.
//!
//! # Configuration File Structure
//!
//! ```yaml
//! simulation:
//!   name: adder
//!   max_ticks: 100
//!   log_level: info
//!   warn_latches: true
//!   collect_stats: true
//!
//! shapes:
//!   - name: Operand
//!     signals:
//!       - name: valid
//!         ty: { kind: bool }
//!         default: false
//!       - name: value
//!         ty: { kind: uint, bits: 32 }
//!   - name: Sum
//!     clocked: true
//!     initialized: true
//!     signals:
//!       - name: value
//!         ty: { kind: uint, bits: 33 }
//! ```

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use thiserror::Error;

use crate::bus::BusShape;

/// Errors that can occur during configuration loading.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Unknown file format: {0}")]
    UnknownFormat(String),
}

/// Result type for configuration operations.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Global run parameters.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimulationParams {
    /// Simulation name, used in logs and statistics
    #[serde(default)]
    pub name: String,

    /// Upper bound on the number of ticks; unbounded when absent
    #[serde(default)]
    pub max_ticks: Option<u64>,

    /// Logging level (trace, debug, info, warn, error).
    ///
    /// The kernel never installs a subscriber itself; the embedding program
    /// passes this to [`init_logging`](crate::init_logging).
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Warn when a combinational process leaves output signals unwritten
    #[serde(default = "default_true")]
    pub warn_latches: bool,

    /// Whether to collect run statistics
    #[serde(default)]
    pub collect_stats: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_true() -> bool {
    true
}

impl Default for SimulationParams {
    fn default() -> Self {
        Self {
            name: String::new(),
            max_ticks: None,
            log_level: default_log_level(),
            warn_latches: true,
            collect_stats: false,
        }
    }
}

impl SimulationParams {
    pub fn validate(&self) -> ConfigResult<()> {
        const LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];
        if !LEVELS.contains(&self.log_level.to_lowercase().as_str()) {
            return Err(ConfigError::Validation(format!(
                "Unknown log level: {}",
                self.log_level
            )));
        }
        if self.max_ticks == Some(0) {
            tracing::warn!("max_ticks is 0; the simulation will not run any tick");
        }
        Ok(())
    }
}

/// Complete simulation configuration.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimConfig {
    /// Global run parameters
    #[serde(default)]
    pub simulation: SimulationParams,

    /// Bus shape definitions
    #[serde(default)]
    pub shapes: Vec<BusShape>,
}

impl SimConfig {
    /// Creates a new default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads configuration from a YAML file.
    pub fn from_yaml_file<P: AsRef<Path>>(path: P) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Loads configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> ConfigResult<Self> {
        let config: SimConfig = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Loads configuration from a JSON file.
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    /// Loads configuration from a JSON string.
    pub fn from_json(json: &str) -> ConfigResult<Self> {
        let config: SimConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Loads configuration from a file, auto-detecting format.
    pub fn from_file<P: AsRef<Path>>(path: P) -> ConfigResult<Self> {
        let path = path.as_ref();
        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");

        match ext.to_lowercase().as_str() {
            "yaml" | "yml" => Self::from_yaml_file(path),
            "json" => Self::from_json_file(path),
            _ => Err(ConfigError::UnknownFormat(ext.to_string())),
        }
    }

    /// Validates the entire configuration.
    pub fn validate(&self) -> ConfigResult<()> {
        self.simulation.validate()?;

        let mut names = HashSet::new();
        for shape in &self.shapes {
            shape
                .validate()
                .map_err(|e| ConfigError::Validation(e.to_string()))?;
            if !names.insert(shape.name.as_str()) {
                return Err(ConfigError::Validation(format!(
                    "Duplicate shape name: {}",
                    shape.name
                )));
            }
        }
        Ok(())
    }

    /// Saves configuration to a YAML file.
    pub fn to_yaml_file<P: AsRef<Path>>(&self, path: P) -> ConfigResult<()> {
        let yaml = serde_yaml::to_string(self)?;
        std::fs::write(path, yaml)?;
        Ok(())
    }

    /// Saves configuration to a JSON file.
    pub fn to_json_file<P: AsRef<Path>>(&self, path: P) -> ConfigResult<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Converts to YAML string.
    pub fn to_yaml(&self) -> ConfigResult<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    /// Converts to JSON string.
    pub fn to_json(&self) -> ConfigResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn shape_count(&self) -> usize {
        self.shapes.len()
    }

    /// Finds a shape definition by name.
    pub fn find_shape(&self, name: &str) -> Option<&BusShape> {
        self.shapes.iter().find(|s| s.name == name)
    }
}

/// Builder for creating SimConfig programmatically.
#[derive(Default)]
pub struct SimConfigBuilder {
    config: SimConfig,
}

impl SimConfigBuilder {
    /// Creates a new builder.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.config.simulation.name = name.into();
        self
    }

    /// Sets the tick limit.
    pub fn max_ticks(mut self, ticks: u64) -> Self {
        self.config.simulation.max_ticks = Some(ticks);
        self
    }

    /// Sets the log level.
    pub fn log_level(mut self, level: impl Into<String>) -> Self {
        self.config.simulation.log_level = level.into();
        self
    }

    pub fn warn_latches(mut self, enable: bool) -> Self {
        self.config.simulation.warn_latches = enable;
        self
    }

    /// Enables statistics collection.
    pub fn collect_stats(mut self, enable: bool) -> Self {
        self.config.simulation.collect_stats = enable;
        self
    }

    /// Adds a bus shape.
    pub fn add_shape(mut self, shape: BusShape) -> Self {
        self.config.shapes.push(shape);
        self
    }

    /// Builds and validates the configuration.
    pub fn build(self) -> ConfigResult<SimConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}
