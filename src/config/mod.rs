//! Configuration types for scene flow replay.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::processors::scanner::FRAME_FILE_PATTERN;

/// Configuration for the sequential reader.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplayConfig {
    /// Regex matched case-insensitively against whole file names
    #[serde(default = "default_file_pattern")]
    pub file_pattern: String,

    /// Log every non-zero residual cell at trace level after a read
    #[serde(default)]
    pub log_nonzero_residuals: bool,
}

fn default_file_pattern() -> String {
    FRAME_FILE_PATTERN.to_string()
}

impl Default for ReplayConfig {
    fn default() -> Self {
        Self {
            file_pattern: default_file_pattern(),
            log_nonzero_residuals: false,
        }
    }
}

/// Configuration for generated outputs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Width of residual heatmaps in pixels
    #[serde(default = "default_plot_width")]
    pub plot_width: u32,

    /// Height of residual heatmaps in pixels
    #[serde(default = "default_plot_height")]
    pub plot_height: u32,
}

fn default_plot_width() -> u32 {
    800
}

fn default_plot_height() -> u32 {
    600
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            plot_width: default_plot_width(),
            plot_height: default_plot_height(),
        }
    }
}

/// Top-level configuration combining all sub-configs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub replay: ReplayConfig,

    #[serde(default)]
    pub output: OutputConfig,
}

impl AppConfig {
    /// Load configuration from a YAML file.
    pub fn from_yaml<P: AsRef<Path>>(path: P) -> Result<Self, Box<dyn std::error::Error>> {
        let content = std::fs::read_to_string(path)?;
        let config: AppConfig = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to a YAML file.
    pub fn to_yaml<P: AsRef<Path>>(&self, path: P) -> Result<(), Box<dyn std::error::Error>> {
        let content = serde_yaml::to_string(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_replay_config() {
        let config = ReplayConfig::default();
        assert_eq!(config.file_pattern, r"sflow_[0-9]{5}\.xml");
        assert!(!config.log_nonzero_residuals);
    }

    #[test]
    fn test_partial_yaml_uses_defaults() {
        let config: AppConfig =
            serde_yaml::from_str("replay:\n  log_nonzero_residuals: true\n").unwrap();
        assert!(config.replay.log_nonzero_residuals);
        assert_eq!(config.replay.file_pattern, FRAME_FILE_PATTERN);
        assert_eq!(config.output.plot_width, 800);
    }

    #[test]
    fn test_yaml_round_trip() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.yaml");

        let mut config = AppConfig::default();
        config.output.plot_height = 1024;
        config.to_yaml(&path).unwrap();

        let loaded = AppConfig::from_yaml(&path).unwrap();
        assert_eq!(loaded, config);
    }
}
