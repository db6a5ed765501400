//! futscope - NSE Futures Volume/OI Analyzer
//!
//! A CLI tool that reads a folder of historical futures CSVs, computes
//! per-contract volume/open-interest signals, classifies gain and loss
//! days, and writes compiled and year-wise summary reports.
//!
//! Exit codes:
//!   0 - Success
//!   1 - Runtime error (missing data folder, I/O, config failure)
//!   2 - No analyzable data after cleaning and filtering

mod analysis;
mod cli;
mod config;
mod ingest;
mod models;
mod report;
mod scanner;

use anyhow::{bail, Context, Result};
use chrono::Utc;
use cli::{Args, OutputFormat};
use config::Config;
use indicatif::{ProgressBar, ProgressStyle};
use models::{AnalyzedContract, Report, ReportMetadata};
use std::collections::BTreeSet;
use std::path::PathBuf;
use std::time::Instant;
use tracing::{debug, error, info, warn};
use tracing_subscriber::FmtSubscriber;

fn main() -> Result<()> {
    // Parse command-line arguments
    let args = Args::parse_args();

    // Validate arguments
    if let Err(e) = args.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    // Handle --init-config early (no logging needed)
    if args.init_config {
        return handle_init_config();
    }

    // Initialize logging
    init_logging(&args);

    info!("futscope v{}", env!("CARGO_PKG_VERSION"));
    debug!("Arguments: {:?}", args);

    // Run the analysis
    match run_analysis(args) {
        Ok(exit_code) => {
            std::process::exit(exit_code);
        }
        Err(e) => {
            error!("Analysis failed: {}", e);
            eprintln!("\n❌ Error: {}", e);
            std::process::exit(1);
        }
    }
}

/// Handle --init-config: generate a default .futscope.toml.
fn handle_init_config() -> Result<()> {
    let path = std::path::Path::new(".futscope.toml");

    if path.exists() {
        eprintln!("⚠️  .futscope.toml already exists. Remove it first or edit it manually.");
        std::process::exit(1);
    }

    let content = Config::default_toml();
    std::fs::write(path, &content).context("Failed to write .futscope.toml")?;

    println!("✅ Created .futscope.toml with default settings.");
    println!("   Edit it to customize the OI floor, trimming, and report options.");
    Ok(())
}

/// Initialize logging based on verbosity settings.
fn init_logging(args: &Args) {
    let level = args.log_level();

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .finish();

    tracing::subscriber::set_global_default(subscriber).expect("Failed to set tracing subscriber");
}

/// Run the complete analysis workflow. Returns exit code (0 or 2).
fn run_analysis(args: Args) -> Result<i32> {
    let start_time = Instant::now();

    // Load configuration
    let mut config = load_config(&args)?;
    config.merge_with_args(&args);

    // Step 1: Discover input files
    let scan_config = scanner::ScanConfig::from(&config.scanner);
    let data_scanner = scanner::DataScanner::new(args.data_dir.clone(), scan_config);

    println!("🔍 Scanning data folder: {}", args.data_dir.display());
    let files = data_scanner.scan()?;

    if files.is_empty() {
        bail!("No CSV files found in {}", args.data_dir.display());
    }
    println!("   Found {} CSV file(s)\n", files.len());

    // Handle --dry-run: list files and exit
    if args.dry_run {
        return handle_dry_run(&files);
    }

    let options = analysis::AnalysisOptions::from(&config.analysis);
    info!(
        "OI floor: {}, trim: {} day(s) per end, window: {} rows",
        options.oi_floor, options.trim_days, options.oi_window
    );

    // Step 2: Parse and analyze each file sequentially
    let progress = if args.quiet {
        None
    } else {
        let pb = ProgressBar::new(files.len() as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
                .unwrap()
                .progress_chars("#>-"),
        );
        Some(pb)
    };
    let emit = |line: String| {
        if let Some(ref pb) = progress {
            pb.println(line);
        }
    };

    let mut contracts: Vec<AnalyzedContract> = Vec::new();
    let mut files_processed = 0usize;
    let mut files_skipped = 0usize;

    for file in &files {
        if let Some(ref pb) = progress {
            pb.set_message(file.stem.clone());
        }

        match ingest::parse_file(&file.path, file.instrument()) {
            Ok(parsed) => {
                if parsed.rows_dropped > 0 {
                    warn!(
                        "{}: dropped {} of {} row(s)",
                        file.stem, parsed.rows_dropped, parsed.rows_read
                    );
                }

                let result = analysis::analyze_file(
                    &parsed,
                    file.instrument(),
                    file.base_instrument(),
                    &options,
                );

                if result.contracts_skipped > 0 {
                    debug!(
                        "{}: {} contract(s) skipped for insufficient data",
                        file.stem, result.contracts_skipped
                    );
                }

                if result.contracts.is_empty() {
                    files_skipped += 1;
                    emit(format!("✗ Skipped: {} (insufficient data)", file.stem));
                } else {
                    files_processed += 1;
                    emit(format!(
                        "✓ Processed: {} ({} rows) -> {}",
                        file.stem,
                        result.surviving_rows(),
                        file.base_instrument()
                    ));
                    contracts.extend(result.contracts);
                }
            }
            Err(e) => {
                files_skipped += 1;
                warn!("{}", e);
                emit(format!("✗ Failed: {} - {}", file.stem, e));
            }
        }

        if let Some(ref pb) = progress {
            pb.inc(1);
        }
    }

    if let Some(ref pb) = progress {
        pb.finish_and_clear();
    }

    if contracts.is_empty() {
        eprintln!("\n⛔ No analyzable data found in any CSV file (exit code 2).");
        return Ok(2);
    }

    // Step 3: Rank next-day OI responses globally, then aggregate
    println!("\n📝 Generating report...");

    analysis::assign_oi_percentiles(&mut contracts);
    let compiled = analysis::compile_report(&contracts, config.report.decimals);
    let yearly = analysis::yearly_summaries(&contracts, config.report.decimals);

    let rows_analyzed: usize = contracts.iter().map(|c| c.days.len()).sum();
    let instruments: BTreeSet<&str> = contracts
        .iter()
        .map(|c| c.base_instrument.as_str())
        .collect();
    let duration = start_time.elapsed().as_secs_f64();

    let metadata = ReportMetadata {
        data_dir: args.data_dir.display().to_string(),
        analysis_date: Utc::now(),
        files_processed,
        files_skipped,
        rows_analyzed,
        instruments: instruments.len(),
        contracts: contracts.len(),
        oi_floor: options.oi_floor,
        duration_seconds: duration,
    };

    let report = Report {
        metadata,
        contracts: compiled.contracts,
        instrument_averages: compiled.instrument_averages,
        overall: compiled.overall,
        yearly,
    };

    // Step 4: Render and save the report
    let output = resolve_output(&args, &config);
    let saved = match args.format {
        OutputFormat::Markdown => {
            let content = report::generate_markdown_report(&report, &config.report);
            std::fs::write(&output, content)
                .with_context(|| format!("Failed to write report to {}", output.display()))?;
            vec![output.clone()]
        }
        OutputFormat::Json => {
            let content = report::generate_json_report(&report)?;
            std::fs::write(&output, content)
                .with_context(|| format!("Failed to write report to {}", output.display()))?;
            vec![output.clone()]
        }
        OutputFormat::Csv => {
            let (contracts_path, yearly_path) =
                report::write_csv_reports(&report, &config.report, &output)?;
            vec![contracts_path, yearly_path]
        }
    };

    // Print summary
    println!("\n📊 Analysis Summary:");
    println!(
        "   Files: {} processed, {} skipped",
        files_processed, files_skipped
    );
    println!("   Rows analyzed: {}", rows_analyzed);
    println!(
        "   Base instruments: {} | Contracts: {}",
        report.metadata.instruments, report.metadata.contracts
    );
    println!(
        "   Loss days: {} | Gain days: {}",
        report.overall.loss_days, report.overall.gain_days
    );
    println!("   Duration: {:.1}s", duration);

    println!("\n✅ Analysis complete!");
    for path in &saved {
        println!("   Report saved to: {}", path.display());
    }

    Ok(0)
}

/// Handle --dry-run: list discovered files, exit without parsing.
fn handle_dry_run(files: &[scanner::ScannedFile]) -> Result<i32> {
    println!("🔍 Dry run: listing files without analyzing...\n");

    for file in files {
        println!(
            "   📄 {} ({} bytes) -> {}",
            file.stem,
            file.size,
            file.base_instrument()
        );
    }
    println!("\n   Total: {} file(s)", files.len());

    println!("\n✅ Dry run complete. No files were parsed.");
    Ok(0)
}

/// Resolve the output path.
///
/// The built-in default follows the chosen format's extension; an
/// explicit path (CLI or config file) is used as-is.
fn resolve_output(args: &Args, config: &Config) -> PathBuf {
    let mut path = PathBuf::from(&config.general.output);
    if args.output.is_none() && config.general.output == config::default_output() {
        path.set_extension(args.format.extension());
    }
    path
}

/// Load configuration from file or use defaults.
fn load_config(args: &Args) -> Result<Config> {
    // Try explicit config path
    if let Some(ref config_path) = args.config {
        info!("Loading config from: {}", config_path.display());
        return Config::load(config_path);
    }

    // Try default location
    match Config::load_default() {
        Ok(Some(config)) => {
            info!("Loaded default config from .futscope.toml");
            Ok(config)
        }
        Ok(None) => {
            debug!("No config file found, using defaults");
            Ok(Config::default())
        }
        Err(e) => {
            warn!("Failed to load config: {}", e);
            Ok(Config::default())
        }
    }
}
