//! Configuration management
//!
//! A single `guardlab.toml` covers the estimator constants, the static
//! thermostat thresholds, the stage lists of the three tiers and the audit
//! backend. Every table is optional.

pub mod types;

#[cfg(test)]
mod tests;

pub use types::{AuditBackend, AuditConfig, ConfigError, PipelineConfig, StageSpec};

use crate::estimator::{EstimatorConfig, PreferenceEstimator, StaticThermostat};
use crate::guard::ValidationPipeline;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

pub const CONFIG_FILE_NAME: &str = "guardlab.toml";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub estimator: EstimatorConfig,
    pub thermostat: StaticThermostat,
    /// Absent means the standard three-tier preset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pipeline: Option<PipelineConfig>,
    pub audit: AuditConfig,
}

impl Config {
    /// Load from `path`, or from the first standard location that exists, or defaults.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(path) => Self::load_from(path),
            None => match find_config_file() {
                Some(path) => Self::load_from(&path),
                None => {
                    debug!("no config file found, using defaults");
                    Ok(Self::default())
                }
            },
        }
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)?;
        let config = Self::from_toml(&content)?;
        debug!(path = %path.display(), "loaded config");
        Ok(config)
    }

    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, self.to_toml()?)?;
        Ok(())
    }

    /// Check every value that the runtime types would reject
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.estimator.validate()?;
        self.thermostat.validate()?;
        if let Some(pipeline) = &self.pipeline {
            pipeline.build()?;
        }
        Ok(())
    }

    pub fn build_estimator(&self) -> Result<PreferenceEstimator, ConfigError> {
        Ok(PreferenceEstimator::new(&self.estimator)?)
    }

    pub fn build_pipeline(&self) -> Result<ValidationPipeline, ConfigError> {
        match &self.pipeline {
            Some(pipeline) => Ok(pipeline.build()?),
            None => Ok(ValidationPipeline::standard()),
        }
    }
}

/// Find the configuration file in standard locations
pub fn find_config_file() -> Option<PathBuf> {
    if let Ok(cwd) = std::env::current_dir() {
        let path = cwd.join(CONFIG_FILE_NAME);
        if path.exists() {
            return Some(path);
        }
    }

    let path = get_config_dir()?.join(CONFIG_FILE_NAME);
    path.exists().then_some(path)
}

/// Get the configuration directory path
pub fn get_config_dir() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("guardlab"))
}
