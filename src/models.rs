//! Data models for the futures analyzer.
//!
//! This module contains the core data structures used throughout the
//! application: raw daily records, derived per-day signals, and the
//! summary rows that make up the final report.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Direction of a trading day, judged open-to-close.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    /// Close below open.
    Loss,
    /// Close above open.
    Gain,
    /// Close equal to open; counted in totals but in neither block.
    Flat,
}

impl Outcome {
    /// Classify a day from its open-to-close change.
    pub fn from_change(change: f64) -> Self {
        if change < 0.0 {
            Outcome::Loss
        } else if change > 0.0 {
            Outcome::Gain
        } else {
            Outcome::Flat
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Loss => write!(f, "Loss"),
            Outcome::Gain => write!(f, "Gain"),
            Outcome::Flat => write!(f, "Flat"),
        }
    }
}

/// A single cleaned row from an input CSV.
#[derive(Debug, Clone)]
pub struct DailyRecord {
    /// Trading date.
    pub date: NaiveDate,
    /// Opening price.
    pub open: f64,
    /// Closing price.
    pub close: f64,
    /// Contracts traded ("No. of contracts" in NSE exports).
    pub volume: f64,
    /// Open interest; absent when the file has no "Open Int" column
    /// or the cell did not parse.
    pub open_interest: Option<f64>,
    /// Contract identifier (expiry date string, or the instrument name
    /// when the file carries no expiry column).
    pub contract_id: String,
}

/// One surviving trading day with all derived signals attached.
#[derive(Debug, Clone)]
pub struct SignalRow {
    pub date: NaiveDate,
    pub outcome: Outcome,
    /// Close minus open.
    pub daily_change: f64,
    pub volume: f64,
    pub open_interest: Option<f64>,
    /// Percent change in volume versus the previous surviving day.
    pub volume_pct_change: Option<f64>,
    /// Open-interest change versus the previous surviving day.
    pub oi_change: Option<f64>,
    /// Trailing rolling mean of open interest (window/min-periods per config).
    pub oi_rolling_avg: Option<f64>,
    /// `oi_change` normalized by the rolling average.
    pub oi_normalized_change: Option<f64>,
    /// Percent change in volume on the following day.
    pub next_day_volume_pct_change: Option<f64>,
    /// Open-interest change on the following day.
    pub next_day_oi_change: Option<f64>,
    /// Next-day OI change normalized by today's rolling average.
    pub next_day_oi_normalized_change: Option<f64>,
    /// Global percentile of `next_day_oi_normalized_change`; filled in
    /// once every file has been analyzed.
    pub next_day_oi_percentile: Option<f64>,
}

/// All surviving days of one contract, with identity attached.
#[derive(Debug, Clone)]
pub struct AnalyzedContract {
    /// Full instrument name (the file stem).
    pub instrument: String,
    /// Underlying symbol shared by all of an instrument's contracts.
    pub base_instrument: String,
    /// Contract identifier within the instrument.
    pub contract_id: String,
    /// Surviving days in date order.
    pub days: Vec<SignalRow>,
}

/// Next-day response metrics over the days of one outcome.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OutcomeMetrics {
    /// Mean global percentile of the next-day normalized OI change.
    pub avg_oi_percentile: Option<f64>,
    /// Mean next-day volume percent change.
    pub avg_next_day_volume_change: Option<f64>,
    /// Mean next-day normalized OI change.
    pub avg_next_day_oi_normalized: Option<f64>,
    /// Share of days (%) whose next-day open interest rose.
    pub pct_oi_increase: Option<f64>,
}

impl OutcomeMetrics {
    /// Compute the metric block over a set of days.
    ///
    /// Means skip undefined values; the OI-increase share counts every
    /// day in the denominator but stays undefined when no day carries
    /// an OI change at all.
    pub fn over(days: &[&SignalRow]) -> Self {
        Self {
            avg_oi_percentile: mean(days.iter().filter_map(|d| d.next_day_oi_percentile)),
            avg_next_day_volume_change: mean(
                days.iter().filter_map(|d| d.next_day_volume_pct_change),
            ),
            avg_next_day_oi_normalized: mean(
                days.iter().filter_map(|d| d.next_day_oi_normalized_change),
            ),
            pct_oi_increase: share_of_increases(days),
        }
    }

    /// Returns a copy with every value rounded to `decimals` places.
    pub fn rounded(&self, decimals: u32) -> Self {
        Self {
            avg_oi_percentile: self.avg_oi_percentile.map(|v| round_to(v, decimals)),
            avg_next_day_volume_change: self
                .avg_next_day_volume_change
                .map(|v| round_to(v, decimals)),
            avg_next_day_oi_normalized: self
                .avg_next_day_oi_normalized
                .map(|v| round_to(v, decimals)),
            pct_oi_increase: self.pct_oi_increase.map(|v| round_to(v, decimals)),
        }
    }
}

/// Mean of an iterator of values, `None` when empty.
pub fn mean(values: impl Iterator<Item = f64>) -> Option<f64> {
    let mut sum = 0.0;
    let mut count = 0usize;
    for v in values {
        sum += v;
        count += 1;
    }
    if count == 0 {
        None
    } else {
        Some(sum / count as f64)
    }
}

/// Round a value to the given number of decimal places.
pub fn round_to(value: f64, decimals: u32) -> f64 {
    let factor = 10f64.powi(decimals as i32);
    (value * factor).round() / factor
}

/// Share (%) of days with a positive next-day OI change.
///
/// Days with an undefined change count toward the denominator, so the
/// share reflects the whole block; if no day has a defined change the
/// share itself is undefined.
fn share_of_increases(days: &[&SignalRow]) -> Option<f64> {
    if days.is_empty() || days.iter().all(|d| d.next_day_oi_change.is_none()) {
        return None;
    }
    let increases = days
        .iter()
        .filter(|d| matches!(d.next_day_oi_change, Some(c) if c > 0.0))
        .count();
    Some(increases as f64 / days.len() as f64 * 100.0)
}

/// Summary row for one contract of one instrument.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContractSummary {
    pub instrument: String,
    pub base_instrument: String,
    pub contract_id: String,
    pub total_days: usize,
    pub loss_days: usize,
    pub gain_days: usize,
    pub after_loss: OutcomeMetrics,
    pub after_gain: OutcomeMetrics,
}

impl ContractSummary {
    /// Days that closed exactly where they opened.
    pub fn flat_days(&self) -> usize {
        self.total_days - self.loss_days - self.gain_days
    }
}

/// Average row across one base instrument's contracts (or across all
/// contracts, for the overall row).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstrumentSummary {
    pub base_instrument: String,
    pub total_days: usize,
    pub loss_days: usize,
    pub gain_days: usize,
    pub after_loss: OutcomeMetrics,
    pub after_gain: OutcomeMetrics,
}

impl InstrumentSummary {
    pub fn flat_days(&self) -> usize {
        self.total_days - self.loss_days - self.gain_days
    }
}

/// One base instrument's aggregate over a calendar year.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct YearlySummary {
    /// Base instrument name.
    pub instrument: String,
    pub year: i32,
    /// Covered date range, e.g. "01 Apr 2024 to 30 Jun 2024".
    pub period: String,
    pub total_days: usize,
    pub loss_days: usize,
    pub gain_days: usize,
    pub after_loss: OutcomeMetrics,
    pub after_gain: OutcomeMetrics,
}

impl YearlySummary {
    pub fn flat_days(&self) -> usize {
        self.total_days - self.loss_days - self.gain_days
    }
}

/// Metadata about an analysis run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportMetadata {
    /// Directory the CSV files were read from.
    pub data_dir: String,
    /// Date and time of the analysis.
    pub analysis_date: DateTime<Utc>,
    /// Number of files that produced data.
    pub files_processed: usize,
    /// Number of files skipped or failed.
    pub files_skipped: usize,
    /// Total surviving rows across all contracts.
    pub rows_analyzed: usize,
    /// Number of distinct base instruments.
    pub instruments: usize,
    /// Number of distinct (instrument, contract) pairs.
    pub contracts: usize,
    /// Open-interest floor applied during filtering.
    pub oi_floor: f64,
    /// Duration of the analysis in seconds.
    pub duration_seconds: f64,
}

/// The complete analysis report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Report {
    /// Metadata about the run.
    pub metadata: ReportMetadata,
    /// Contract-level summary rows, sorted by (base instrument, contract).
    pub contracts: Vec<ContractSummary>,
    /// Per-instrument average rows.
    pub instrument_averages: Vec<InstrumentSummary>,
    /// Average row across every contract.
    pub overall: InstrumentSummary,
    /// Year-wise rows, sorted by (instrument, year).
    pub yearly: Vec<YearlySummary>,
}
