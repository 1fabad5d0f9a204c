/*!
 * Configuration types for pfact
 */

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

use crate::error::{PfactError, Result};

/// How the coordinator picks the divisor for the next stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Schedule {
    /// Next divisor is the first value the newest stage lets through
    #[default]
    Survivors,

    /// Next divisor is the previous divisor plus one
    Sequential,
}

impl fmt::Display for Schedule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Schedule::Survivors => write!(f, "survivors"),
            Schedule::Sequential => write!(f, "sequential"),
        }
    }
}

/// Format of the final report
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Verdict line followed by the stage count
    #[default]
    Human,

    /// A single JSON object
    Json,
}

/// Log level for diagnostic output
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Only errors
    Error,

    /// Warnings and errors
    #[default]
    Warn,

    /// Info, warnings, and errors
    Info,

    /// Debug and above
    Debug,

    /// All messages including traces
    Trace,
}

impl LogLevel {
    /// Convert to tracing::Level
    pub fn to_tracing_level(&self) -> tracing::Level {
        match self {
            LogLevel::Error => tracing::Level::ERROR,
            LogLevel::Warn => tracing::Level::WARN,
            LogLevel::Info => tracing::Level::INFO,
            LogLevel::Debug => tracing::Level::DEBUG,
            LogLevel::Trace => tracing::Level::TRACE,
        }
    }
}

/// Main configuration for a pipeline run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Divisor schedule (survivors, sequential)
    #[serde(default)]
    pub schedule: Schedule,

    /// Capacity of each bounded inter-stage channel, in values
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,

    /// Maximum number of stages a run may spawn
    #[serde(default = "default_max_stages")]
    pub max_stages: usize,

    /// Report format
    #[serde(default)]
    pub output: OutputFormat,

    /// Log level for diagnostic output
    #[serde(default)]
    pub log_level: LogLevel,

    /// Log file path (None = stderr)
    #[serde(default)]
    pub log_file: Option<PathBuf>,

    /// Enable verbose logging (shorthand for log_level = debug)
    #[serde(default)]
    pub verbose: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            schedule: Schedule::Survivors,
            channel_capacity: default_channel_capacity(),
            max_stages: default_max_stages(),
            output: OutputFormat::Human,
            log_level: LogLevel::Warn,
            log_file: None,
            verbose: false,
        }
    }
}

// Default value functions for serde
fn default_channel_capacity() -> usize {
    1024
}

fn default_max_stages() -> usize {
    4096
}

impl PipelineConfig {
    /// Load configuration from a TOML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            PfactError::Config(format!("Failed to read {}: {}", path.display(), e))
        })?;
        let config: PipelineConfig = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a TOML file
    pub fn to_file(&self, path: &Path) -> Result<()> {
        let contents = toml::to_string_pretty(self)
            .map_err(|e| PfactError::Config(format!("TOML serialize error: {}", e)))?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    /// Reject settings the pipeline cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.channel_capacity == 0 {
            return Err(PfactError::Config(
                "channel_capacity must be at least 1".to_string(),
            ));
        }
        if self.max_stages == 0 {
            return Err(PfactError::Config(
                "max_stages must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}
