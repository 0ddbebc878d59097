//! Configuration management for the posture classifier

use crate::types::report::ConfidenceThresholds;
use anyhow::{Context, Result};
use config::{Config, File, FileFormat};
use serde::Deserialize;
use std::path::Path;

/// Default configuration file location
pub const DEFAULT_CONFIG_PATH: &str = "config/config.toml";

/// Main application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub model: ModelConfig,
    #[serde(default)]
    pub classification: ClassificationConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Model configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ModelConfig {
    /// Path to the exported ANFIS model (JSON)
    pub path: String,
    /// Convert raw TSK outputs into a probability-like distribution
    #[serde(default = "default_apply_softmax")]
    pub apply_softmax: bool,
    /// Largest model file accepted, in bytes; the loader default when unset
    #[serde(default)]
    pub max_bytes: Option<usize>,
}

fn default_apply_softmax() -> bool {
    true
}

/// Report shaping
#[derive(Debug, Clone, Deserialize)]
pub struct ClassificationConfig {
    /// Number of ranked classes included in each report
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    /// Confidence level boundaries
    #[serde(default)]
    pub confidence_levels: ConfidenceThresholds,
}

fn default_top_k() -> usize {
    3
}

impl Default for ClassificationConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
            confidence_levels: ConfidenceThresholds::default(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
    /// Log format (json, pretty)
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

impl AppConfig {
    /// Load configuration from the default file
    pub fn load() -> Result<Self> {
        Self::load_from_path(DEFAULT_CONFIG_PATH)
    }

    /// Load configuration from a specific path
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let config = Config::builder()
            .add_source(File::from(path.as_ref()))
            .build()
            .context("Failed to build configuration")?;

        config
            .try_deserialize()
            .context("Failed to deserialize configuration")
    }

    /// Parse configuration from TOML text
    pub fn from_toml_str(toml: &str) -> Result<Self> {
        let config = Config::builder()
            .add_source(File::from_str(toml, FileFormat::Toml))
            .build()
            .context("Failed to build configuration")?;

        config
            .try_deserialize()
            .context("Failed to deserialize configuration")
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            model: ModelConfig {
                path: "data/anfis_export.json".to_string(),
                apply_softmax: true,
                max_bytes: None,
            },
            classification: ClassificationConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}
