//! Command-line interface argument parsing.
//!
//! This module handles all CLI argument parsing using clap,
//! including validation and default values.

use clap::Parser;
use std::path::PathBuf;

/// futscope - volume/open-interest analyzer for NSE futures CSVs
///
/// Reads a folder of historical futures CSVs (one file per instrument
/// and period), classifies gain/loss days per contract, and writes a
/// compiled contract report plus a year-wise summary.
///
/// Examples:
///   futscope
///   futscope --data-dir ./nse_dumps --oi-floor 5000
///   futscope --format csv --output reports/q1.csv
///   futscope --dry-run
///   futscope --init-config
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Args {
    /// Directory containing the futures CSV files
    ///
    /// Scanned recursively; file names follow the NSE convention,
    /// e.g. FUTIDX_BANKNIFTY_01-Apr-2024_TO_30-Jun-2024.csv.
    #[arg(
        short,
        long,
        default_value = "data_folder",
        value_name = "DIR",
        env = "FUTSCOPE_DATA_DIR"
    )]
    pub data_dir: PathBuf,

    /// Output file path for the report
    ///
    /// Defaults to futscope_report with an extension matching --format.
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Output format (markdown, json, csv)
    ///
    /// CSV writes two files: <stem>_contracts.csv and <stem>_yearly.csv.
    #[arg(short, long, default_value = "markdown", value_name = "FORMAT")]
    pub format: OutputFormat,

    /// Minimum prior-day open interest for a day to count
    ///
    /// Days whose previous trading day held less open interest than this
    /// are treated as illiquid and dropped.
    #[arg(long, value_name = "CONTRACTS", env = "FUTSCOPE_OI_FLOOR")]
    pub oi_floor: Option<f64>,

    /// Path to configuration file
    ///
    /// If not specified, looks for .futscope.toml in the current directory
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Enable verbose logging output
    #[arg(short, long)]
    pub verbose: bool,

    /// Run in quiet mode (minimal output)
    #[arg(short, long)]
    pub quiet: bool,

    /// Dry run: scan the data folder and list files without analyzing
    #[arg(long)]
    pub dry_run: bool,

    /// Generate a default .futscope.toml configuration file
    #[arg(long)]
    pub init_config: bool,
}

/// Output format for the report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum OutputFormat {
    /// Markdown format (default)
    #[default]
    Markdown,
    /// JSON format
    Json,
    /// CSV format (two files)
    Csv,
}

impl OutputFormat {
    /// Conventional file extension for the format.
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Markdown => "md",
            OutputFormat::Json => "json",
            OutputFormat::Csv => "csv",
        }
    }
}

impl Args {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Validate the parsed arguments.
    pub fn validate(&self) -> Result<(), String> {
        // Skip validation for --init-config
        if self.init_config {
            return Ok(());
        }

        if let Some(floor) = self.oi_floor {
            if !floor.is_finite() || floor < 0.0 {
                return Err("OI floor must be a non-negative number".to_string());
            }
        }

        // Check for conflicting options
        if self.verbose && self.quiet {
            return Err("Cannot use both --verbose and --quiet".to_string());
        }

        Ok(())
    }

    /// Returns the log level based on verbosity settings.
    pub fn log_level(&self) -> tracing::Level {
        if self.quiet {
            tracing::Level::ERROR
        } else if self.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_args() -> Args {
        Args {
            data_dir: PathBuf::from("data_folder"),
            output: None,
            format: OutputFormat::Markdown,
            oi_floor: None,
            config: None,
            verbose: false,
            quiet: false,
            dry_run: false,
            init_config: false,
        }
    }

    #[test]
    fn test_validation_accepts_defaults() {
        assert!(make_args().validate().is_ok());
    }

    #[test]
    fn test_validation_negative_floor() {
        let mut args = make_args();
        args.oi_floor = Some(-1.0);
        assert!(args.validate().is_err());

        args.oi_floor = Some(f64::NAN);
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_validation_conflicting_options() {
        let mut args = make_args();
        args.verbose = true;
        args.quiet = true;
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_init_config_skips_validation() {
        let mut args = make_args();
        args.init_config = true;
        args.verbose = true;
        args.quiet = true;
        assert!(args.validate().is_ok());
    }

    #[test]
    fn test_log_level() {
        let mut args = make_args();
        assert_eq!(args.log_level(), tracing::Level::INFO);

        args.verbose = true;
        assert_eq!(args.log_level(), tracing::Level::DEBUG);

        args.verbose = false;
        args.quiet = true;
        assert_eq!(args.log_level(), tracing::Level::ERROR);
    }

    #[test]
    fn test_format_extensions() {
        assert_eq!(OutputFormat::Markdown.extension(), "md");
        assert_eq!(OutputFormat::Json.extension(), "json");
        assert_eq!(OutputFormat::Csv.extension(), "csv");
    }
}
