//! Report rendering.
//!
//! This module renders the analysis report as Markdown, JSON, or a
//! pair of CSV files (compiled contract table + year-wise table).

use crate::config::ReportConfig;
use crate::models::{InstrumentSummary, OutcomeMetrics, Report, ReportMetadata};
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

/// Generate a complete Markdown report.
pub fn generate_markdown_report(report: &Report, config: &ReportConfig) -> String {
    let mut output = String::new();

    output.push_str("# Futures Volume/OI Analysis\n\n");
    output.push_str(&generate_metadata_section(&report.metadata));
    output.push_str(&generate_compiled_section(report, config));
    output.push_str(&generate_yearly_section(report, config));
    output.push_str(&generate_footer());

    output
}

/// Generate the metadata section.
fn generate_metadata_section(metadata: &ReportMetadata) -> String {
    let mut section = String::new();

    section.push_str("## Metadata\n\n");
    section.push_str(&format!("- **Data Folder:** `{}`\n", metadata.data_dir));
    section.push_str(&format!(
        "- **Analysis Date:** {}\n",
        metadata.analysis_date.format("%Y-%m-%d %H:%M:%S UTC")
    ));
    section.push_str(&format!(
        "- **Files Processed:** {}\n",
        metadata.files_processed
    ));
    if metadata.files_skipped > 0 {
        section.push_str(&format!("- **Files Skipped:** {}\n", metadata.files_skipped));
    }
    section.push_str(&format!("- **Rows Analyzed:** {}\n", metadata.rows_analyzed));
    section.push_str(&format!("- **Base Instruments:** {}\n", metadata.instruments));
    section.push_str(&format!("- **Contracts:** {}\n", metadata.contracts));
    section.push_str(&format!("- **OI Floor:** {}\n", metadata.oi_floor));
    section.push_str(&format!(
        "- **Analysis Duration:** {:.1}s\n",
        metadata.duration_seconds
    ));
    section.push('\n');

    section
}

/// Generate the compiled contract-level table, with instrument-average
/// rows and the overall-average row appended.
fn generate_compiled_section(report: &Report, config: &ReportConfig) -> String {
    let mut section = String::new();

    section.push_str("## Compiled Contract Analysis\n\n");

    if report.contracts.is_empty() {
        section.push_str("No contracts survived filtering.\n\n");
        return section;
    }

    let mut headers = vec!["Instrument", "Contract", "Total Days", "Loss Days", "Gain Days"];
    if config.include_flat_days {
        headers.push("Flat Days");
    }
    headers.extend(metric_headers());
    push_table_header(&mut section, &headers);

    for row in &report.contracts {
        let mut cells = vec![
            row.instrument.clone(),
            row.contract_id.clone(),
            row.total_days.to_string(),
            row.loss_days.to_string(),
            row.gain_days.to_string(),
        ];
        if config.include_flat_days {
            cells.push(row.flat_days().to_string());
        }
        cells.extend(metric_cells(&row.after_loss, config.decimals));
        cells.extend(metric_cells(&row.after_gain, config.decimals));
        push_table_row(&mut section, &cells);
    }

    for avg in &report.instrument_averages {
        push_table_row(&mut section, &average_cells(avg, config, None));
    }
    push_table_row(
        &mut section,
        &average_cells(&report.overall, config, Some("OVERALL AVERAGE")),
    );

    section.push('\n');
    section
}

/// Cells for an average row; bolded so it stands out among contract rows.
fn average_cells(avg: &InstrumentSummary, config: &ReportConfig, label: Option<&str>) -> Vec<String> {
    let name = match label {
        Some(l) => l.to_string(),
        None => format!("{} - AVERAGE", avg.base_instrument),
    };
    let mut cells = vec![
        format!("**{}**", name),
        String::new(),
        avg.total_days.to_string(),
        avg.loss_days.to_string(),
        avg.gain_days.to_string(),
    ];
    if config.include_flat_days {
        cells.push(avg.flat_days().to_string());
    }
    cells.extend(metric_cells(&avg.after_loss, config.decimals));
    cells.extend(metric_cells(&avg.after_gain, config.decimals));
    cells
}

/// Generate the year-wise summary table.
fn generate_yearly_section(report: &Report, config: &ReportConfig) -> String {
    let mut section = String::new();

    section.push_str("## Year-Wise Summary\n\n");

    if report.yearly.is_empty() {
        section.push_str("No year-wise data available.\n\n");
        return section;
    }

    let mut headers = vec!["Instrument", "Year", "Period", "Total Days", "Loss Days", "Gain Days"];
    if config.include_flat_days {
        headers.push("Flat Days");
    }
    headers.extend(metric_headers());
    push_table_header(&mut section, &headers);

    for row in &report.yearly {
        let mut cells = vec![
            row.instrument.clone(),
            row.year.to_string(),
            row.period.clone(),
            row.total_days.to_string(),
            row.loss_days.to_string(),
            row.gain_days.to_string(),
        ];
        if config.include_flat_days {
            cells.push(row.flat_days().to_string());
        }
        cells.extend(metric_cells(&row.after_loss, config.decimals));
        cells.extend(metric_cells(&row.after_gain, config.decimals));
        push_table_row(&mut section, &cells);
    }

    section.push('\n');
    section
}

/// Generate the report footer.
fn generate_footer() -> String {
    "---\n\n*Report generated by futscope*\n".to_string()
}

fn metric_headers() -> Vec<&'static str> {
    vec![
        "Avg OI Pctl (Loss)",
        "Avg Next-Day Vol % (Loss)",
        "Avg Next-Day OI Norm (Loss)",
        "OI Increase % (Loss)",
        "Avg OI Pctl (Gain)",
        "Avg Next-Day Vol % (Gain)",
        "Avg Next-Day OI Norm (Gain)",
        "OI Increase % (Gain)",
    ]
}

fn metric_cells(metrics: &OutcomeMetrics, decimals: u32) -> Vec<String> {
    vec![
        fmt_metric(metrics.avg_oi_percentile, decimals),
        fmt_metric(metrics.avg_next_day_volume_change, decimals),
        fmt_metric(metrics.avg_next_day_oi_normalized, decimals),
        fmt_metric(metrics.pct_oi_increase, decimals),
    ]
}

fn fmt_metric(value: Option<f64>, decimals: u32) -> String {
    match value {
        Some(v) => format!("{:.*}", decimals as usize, v),
        None => "n/a".to_string(),
    }
}

fn push_table_header(out: &mut String, headers: &[&str]) {
    out.push_str(&format!("| {} |\n", headers.join(" | ")));
    out.push_str(&format!("|{}\n", "---|".repeat(headers.len())));
}

fn push_table_row(out: &mut String, cells: &[String]) {
    out.push_str(&format!("| {} |\n", cells.join(" | ")));
}

/// Generate a JSON report.
pub fn generate_json_report(report: &Report) -> Result<String> {
    serde_json::to_string_pretty(report).map_err(Into::into)
}

/// Write the CSV rendition: `<stem>_contracts.csv` and `<stem>_yearly.csv`
/// next to the requested output path. Returns both paths.
pub fn write_csv_reports(
    report: &Report,
    config: &ReportConfig,
    output: &Path,
) -> Result<(PathBuf, PathBuf)> {
    let stem = output
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("futscope_report");
    let parent = match output.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };

    let contracts_path = parent.join(format!("{stem}_contracts.csv"));
    let yearly_path = parent.join(format!("{stem}_yearly.csv"));

    write_contracts_csv(report, config, &contracts_path)?;
    write_yearly_csv(report, config, &yearly_path)?;

    Ok((contracts_path, yearly_path))
}

fn write_contracts_csv(report: &Report, config: &ReportConfig, path: &Path) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("Failed to create {}", path.display()))?;

    let mut headers = vec![
        "Instrument",
        "Base_Instrument",
        "Contract_ID",
        "Total_Days",
        "Loss_Days",
        "Gain_Days",
    ];
    if config.include_flat_days {
        headers.push("Flat_Days");
    }
    headers.extend(csv_metric_headers());
    writer.write_record(&headers)?;

    for row in &report.contracts {
        let mut cells = vec![
            row.instrument.clone(),
            row.base_instrument.clone(),
            row.contract_id.clone(),
            row.total_days.to_string(),
            row.loss_days.to_string(),
            row.gain_days.to_string(),
        ];
        if config.include_flat_days {
            cells.push(row.flat_days().to_string());
        }
        cells.extend(csv_metric_cells(&row.after_loss, config.decimals));
        cells.extend(csv_metric_cells(&row.after_gain, config.decimals));
        writer.write_record(&cells)?;
    }

    for avg in &report.instrument_averages {
        writer.write_record(&csv_average_cells(
            avg,
            config,
            &format!("{} - AVERAGE", avg.base_instrument),
            &avg.base_instrument,
        ))?;
    }
    writer.write_record(&csv_average_cells(
        &report.overall,
        config,
        "OVERALL AVERAGE",
        "ALL",
    ))?;

    writer
        .flush()
        .with_context(|| format!("Failed to write {}", path.display()))
}

fn csv_average_cells(
    avg: &InstrumentSummary,
    config: &ReportConfig,
    label: &str,
    base: &str,
) -> Vec<String> {
    let mut cells = vec![
        label.to_string(),
        base.to_string(),
        String::new(),
        avg.total_days.to_string(),
        avg.loss_days.to_string(),
        avg.gain_days.to_string(),
    ];
    if config.include_flat_days {
        cells.push(avg.flat_days().to_string());
    }
    cells.extend(csv_metric_cells(&avg.after_loss, config.decimals));
    cells.extend(csv_metric_cells(&avg.after_gain, config.decimals));
    cells
}

fn write_yearly_csv(report: &Report, config: &ReportConfig, path: &Path) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("Failed to create {}", path.display()))?;

    let mut headers = vec![
        "Instrument",
        "Year",
        "Period",
        "Total_Days",
        "Loss_Days",
        "Gain_Days",
    ];
    if config.include_flat_days {
        headers.push("Flat_Days");
    }
    headers.extend(csv_metric_headers());
    writer.write_record(&headers)?;

    for row in &report.yearly {
        let mut cells = vec![
            row.instrument.clone(),
            row.year.to_string(),
            row.period.clone(),
            row.total_days.to_string(),
            row.loss_days.to_string(),
            row.gain_days.to_string(),
        ];
        if config.include_flat_days {
            cells.push(row.flat_days().to_string());
        }
        cells.extend(csv_metric_cells(&row.after_loss, config.decimals));
        cells.extend(csv_metric_cells(&row.after_gain, config.decimals));
        writer.write_record(&cells)?;
    }

    writer
        .flush()
        .with_context(|| format!("Failed to write {}", path.display()))
}

fn csv_metric_headers() -> Vec<&'static str> {
    vec![
        "Avg_OI_Percentile_AfterLoss",
        "Avg_NextDay_Volume_Change_AfterLoss",
        "Avg_NextDay_OI_Normalized_AfterLoss",
        "Pct_OI_Increase_AfterLoss",
        "Avg_OI_Percentile_AfterGain",
        "Avg_NextDay_Volume_Change_AfterGain",
        "Avg_NextDay_OI_Normalized_AfterGain",
        "Pct_OI_Increase_AfterGain",
    ]
}

/// CSV cells leave undefined metrics empty rather than writing "n/a".
fn csv_metric_cells(metrics: &OutcomeMetrics, decimals: u32) -> Vec<String> {
    let fmt = |v: Option<f64>| match v {
        Some(v) => format!("{:.*}", decimals as usize, v),
        None => String::new(),
    };
    vec![
        fmt(metrics.avg_oi_percentile),
        fmt(metrics.avg_next_day_volume_change),
        fmt(metrics.avg_next_day_oi_normalized),
        fmt(metrics.pct_oi_increase),
    ]
}
