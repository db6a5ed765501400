//! Configuration file handling.
//!
//! This module handles loading and merging configuration from
//! `.futscope.toml` files.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// General settings.
    #[serde(default)]
    pub general: GeneralConfig,

    /// Analysis settings.
    #[serde(default)]
    pub analysis: AnalysisConfig,

    /// Scanner settings.
    #[serde(default)]
    pub scanner: ScannerConfig,

    /// Report settings.
    #[serde(default)]
    pub report: ReportConfig,
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Default output file path.
    #[serde(default = "default_output")]
    pub output: String,

    /// Enable verbose logging by default.
    #[serde(default)]
    pub verbose: bool,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            output: default_output(),
            verbose: false,
        }
    }
}

pub(crate) fn default_output() -> String {
    "futscope_report.md".to_string()
}

/// Signal-pipeline settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisConfig {
    /// Minimum prior-day open interest for a day to survive filtering.
    #[serde(default = "default_oi_floor")]
    pub oi_floor: f64,

    /// Days trimmed from each end of a contract (rollover noise).
    #[serde(default = "default_trim_days")]
    pub trim_days: usize,

    /// Minimum pre-trim rows for a contract to be analyzed.
    #[serde(default = "default_min_contract_days")]
    pub min_contract_days: usize,

    /// Rolling-average window over open interest, in rows.
    #[serde(default = "default_oi_window")]
    pub oi_window: usize,

    /// Observations required before the rolling average is defined.
    #[serde(default = "default_oi_min_periods")]
    pub oi_min_periods: usize,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            oi_floor: default_oi_floor(),
            trim_days: default_trim_days(),
            min_contract_days: default_min_contract_days(),
            oi_window: default_oi_window(),
            oi_min_periods: default_oi_min_periods(),
        }
    }
}

fn default_oi_floor() -> f64 {
    2000.0
}

fn default_trim_days() -> usize {
    3
}

fn default_min_contract_days() -> usize {
    7
}

fn default_oi_window() -> usize {
    20
}

fn default_oi_min_periods() -> usize {
    5
}

/// Data-folder scanner settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScannerConfig {
    /// File extension to include (without dot).
    #[serde(default = "default_extension")]
    pub extension: String,

    /// Maximum file size in bytes.
    #[serde(default = "default_max_file_size")]
    pub max_file_size: u64,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            extension: default_extension(),
            max_file_size: default_max_file_size(),
        }
    }
}

fn default_extension() -> String {
    "csv".to_string()
}

fn default_max_file_size() -> u64 {
    50 * 1024 * 1024 // 50MB
}

/// Report generation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportConfig {
    /// Decimal places for metric values.
    #[serde(default = "default_decimals")]
    pub decimals: u32,

    /// Add a flat-days column (days that closed at their open).
    #[serde(default)]
    pub include_flat_days: bool,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            decimals: default_decimals(),
            include_flat_days: false,
        }
    }
}

fn default_decimals() -> u32 {
    4
}

impl Config {
    /// Load configuration from a file path.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Try to load configuration from the default location.
    ///
    /// Returns `Ok(None)` if the file doesn't exist, `Err` if it exists but can't be parsed.
    pub fn load_default() -> Result<Option<Self>> {
        let default_path = Path::new(".futscope.toml");

        if default_path.exists() {
            Ok(Some(Self::load(default_path)?))
        } else {
            Ok(None)
        }
    }

    /// Merge this configuration with CLI arguments.
    ///
    /// CLI arguments take precedence over config file settings; optional
    /// flags only override when explicitly provided.
    pub fn merge_with_args(&mut self, args: &crate::cli::Args) {
        if let Some(ref output) = args.output {
            self.general.output = output.display().to_string();
        }

        if let Some(floor) = args.oi_floor {
            self.analysis.oi_floor = floor;
        }

        if args.verbose {
            self.general.verbose = true;
        }
    }

    /// Generate a default configuration file content.
    pub fn default_toml() -> String {
        let config = Config::default();
        toml::to_string_pretty(&config).unwrap_or_else(|_| String::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.general.output, "futscope_report.md");
        assert_eq!(config.analysis.oi_floor, 2000.0);
        assert_eq!(config.analysis.oi_window, 20);
        assert_eq!(config.scanner.extension, "csv");
        assert_eq!(config.report.decimals, 4);
    }

    #[test]
    fn test_parse_config() {
        let toml_content = r#"
[general]
output = "q1_report.md"
verbose = true

[analysis]
oi_floor = 5000.0
trim_days = 2

[report]
decimals = 2
include_flat_days = true
"#;

        let config: Config = toml::from_str(toml_content).unwrap();
        assert_eq!(config.general.output, "q1_report.md");
        assert!(config.general.verbose);
        assert_eq!(config.analysis.oi_floor, 5000.0);
        assert_eq!(config.analysis.trim_days, 2);
        // Unspecified keys fall back to defaults.
        assert_eq!(config.analysis.oi_min_periods, 5);
        assert_eq!(config.report.decimals, 2);
        assert!(config.report.include_flat_days);
    }

    #[test]
    fn test_default_toml_generation() {
        let toml_str = Config::default_toml();
        assert!(!toml_str.is_empty());
        assert!(toml_str.contains("[general]"));
        assert!(toml_str.contains("[analysis]"));
        assert!(toml_str.contains("[scanner]"));
        assert!(toml_str.contains("[report]"));
    }
}
