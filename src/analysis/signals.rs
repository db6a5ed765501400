//! Per-contract signal computation.
//!
//! Each contract's daily rows go through the same cleaning pipeline:
//! contracts with too few rows are skipped, the first and last days are
//! trimmed as rollover noise, and days are dropped while the prior
//! day's open interest sits under the floor. Signals are then computed
//! over the surviving sequence, so "previous day" always means the
//! previous surviving day.

use crate::ingest::ParsedFile;
use crate::models::{AnalyzedContract, DailyRecord, Outcome, SignalRow};
use std::collections::BTreeMap;

/// Tunable knobs for the signal pipeline.
#[derive(Debug, Clone)]
pub struct AnalysisOptions {
    /// Minimum prior-day open interest for a day to survive.
    pub oi_floor: f64,
    /// Days trimmed from each end of a contract (rollover noise).
    pub trim_days: usize,
    /// Minimum pre-trim rows for a contract to be analyzed at all.
    pub min_contract_days: usize,
    /// Rolling-average window over open interest.
    pub oi_window: usize,
    /// Observations required before the rolling average is defined.
    pub oi_min_periods: usize,
}

impl Default for AnalysisOptions {
    fn default() -> Self {
        Self {
            oi_floor: 2000.0,
            trim_days: 3,
            min_contract_days: 7,
            oi_window: 20,
            oi_min_periods: 5,
        }
    }
}

impl From<&crate::config::AnalysisConfig> for AnalysisOptions {
    fn from(config: &crate::config::AnalysisConfig) -> Self {
        Self {
            oi_floor: config.oi_floor,
            trim_days: config.trim_days,
            min_contract_days: config.min_contract_days,
            oi_window: config.oi_window,
            oi_min_periods: config.oi_min_periods,
        }
    }
}

/// Result of analyzing one parsed file.
#[derive(Debug, Clone)]
pub struct FileAnalysis {
    /// Contracts that survived cleaning, keyed order by contract id.
    pub contracts: Vec<AnalyzedContract>,
    /// Contracts skipped for insufficient data.
    pub contracts_skipped: usize,
}

impl FileAnalysis {
    /// Total surviving rows across the file's contracts.
    pub fn surviving_rows(&self) -> usize {
        self.contracts.iter().map(|c| c.days.len()).sum()
    }
}

/// Analyze every contract in a parsed file.
pub fn analyze_file(
    parsed: &ParsedFile,
    instrument: &str,
    base_instrument: &str,
    options: &AnalysisOptions,
) -> FileAnalysis {
    let mut by_contract: BTreeMap<&str, Vec<&DailyRecord>> = BTreeMap::new();
    for record in &parsed.records {
        by_contract
            .entry(record.contract_id.as_str())
            .or_default()
            .push(record);
    }

    let mut contracts = Vec::new();
    let mut contracts_skipped = 0usize;

    for (contract_id, mut records) in by_contract {
        records.sort_by_key(|r| r.date);

        match analyze_contract(&records, parsed.has_open_interest, options) {
            Some(days) => contracts.push(AnalyzedContract {
                instrument: instrument.to_string(),
                base_instrument: base_instrument.to_string(),
                contract_id: contract_id.to_string(),
                days,
            }),
            None => contracts_skipped += 1,
        }
    }

    FileAnalysis {
        contracts,
        contracts_skipped,
    }
}

/// Run the cleaning pipeline and compute signals for one contract.
///
/// Returns `None` when the contract has too little data to analyze.
fn analyze_contract(
    records: &[&DailyRecord],
    has_open_interest: bool,
    options: &AnalysisOptions,
) -> Option<Vec<SignalRow>> {
    if records.len() < options.min_contract_days {
        return None;
    }
    if records.len() <= 2 * options.trim_days {
        return None;
    }

    let trimmed = &records[options.trim_days..records.len() - options.trim_days];

    // The prior-day filter can never keep the first trimmed day: it has
    // no predecessor to clear the floor.
    let surviving: Vec<&DailyRecord> = if has_open_interest {
        trimmed
            .iter()
            .enumerate()
            .filter(|(i, _)| {
                *i > 0 && matches!(trimmed[i - 1].open_interest, Some(oi) if oi >= options.oi_floor)
            })
            .map(|(_, r)| *r)
            .collect()
    } else {
        trimmed.to_vec()
    };

    if surviving.len() < 2 {
        return None;
    }

    let rolling = rolling_oi_averages(&surviving, options);

    let rows = surviving
        .iter()
        .enumerate()
        .map(|(i, record)| {
            let prev = (i > 0).then(|| surviving[i - 1]);
            let next = surviving.get(i + 1).copied();

            let daily_change = record.close - record.open;

            let oi_change = if has_open_interest {
                diff(prev.and_then(|p| p.open_interest), record.open_interest)
            } else {
                None
            };
            let next_day_oi_change = if has_open_interest {
                diff(record.open_interest, next.and_then(|n| n.open_interest))
            } else {
                None
            };

            SignalRow {
                date: record.date,
                outcome: Outcome::from_change(daily_change),
                daily_change,
                volume: record.volume,
                open_interest: record.open_interest,
                volume_pct_change: prev.and_then(|p| pct_change(p.volume, record.volume)),
                oi_change,
                oi_rolling_avg: rolling[i],
                oi_normalized_change: normalize(oi_change, rolling[i]),
                next_day_volume_pct_change: next
                    .and_then(|n| pct_change(record.volume, n.volume)),
                next_day_oi_change,
                next_day_oi_normalized_change: normalize(next_day_oi_change, rolling[i]),
                next_day_oi_percentile: None,
            }
        })
        .collect();

    Some(rows)
}

/// Trailing rolling mean of open interest, including the current day.
///
/// Undefined cells inside the window are skipped; the mean is defined
/// once at least `oi_min_periods` observations fall in the window.
fn rolling_oi_averages(days: &[&DailyRecord], options: &AnalysisOptions) -> Vec<Option<f64>> {
    days.iter()
        .enumerate()
        .map(|(i, _)| {
            let start = (i + 1).saturating_sub(options.oi_window);
            let window: Vec<f64> = days[start..=i]
                .iter()
                .filter_map(|d| d.open_interest)
                .collect();
            if window.len() >= options.oi_min_periods {
                Some(window.iter().sum::<f64>() / window.len() as f64)
            } else {
                None
            }
        })
        .collect()
}

fn pct_change(prev: f64, current: f64) -> Option<f64> {
    if prev == 0.0 {
        None
    } else {
        Some((current - prev) / prev * 100.0)
    }
}

fn diff(prev: Option<f64>, current: Option<f64>) -> Option<f64> {
    match (prev, current) {
        (Some(p), Some(c)) => Some(c - p),
        _ => None,
    }
}

fn normalize(change: Option<f64>, average: Option<f64>) -> Option<f64> {
    match (change, average) {
        (Some(c), Some(a)) if a != 0.0 => Some(c / a),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn record(day: u32, open: f64, close: f64, volume: f64, oi: Option<f64>) -> DailyRecord {
        DailyRecord {
            date: NaiveDate::from_ymd_opt(2024, 4, day).unwrap(),
            open,
            close,
            volume,
            open_interest: oi,
            contract_id: "25-Apr-2024".to_string(),
        }
    }

    fn flat_series(n: u32, oi: Option<f64>) -> Vec<DailyRecord> {
        (1..=n).map(|d| record(d, 100.0, 101.0, 500.0, oi)).collect()
    }

    fn parsed(records: Vec<DailyRecord>, has_oi: bool) -> ParsedFile {
        ParsedFile {
            has_open_interest: has_oi,
            rows_read: records.len(),
            rows_dropped: 0,
            records,
        }
    }

    #[test]
    fn test_short_contract_is_skipped() {
        let input = parsed(flat_series(6, Some(5000.0)), true);
        let analysis = analyze_file(&input, "FUTIDX_NIFTY_q1", "NIFTY", &AnalysisOptions::default());

        assert!(analysis.contracts.is_empty());
        assert_eq!(analysis.contracts_skipped, 1);
    }

    #[test]
    fn test_trim_and_floor_drop_expected_days() {
        // 12 days -> trim leaves days 4..=9 -> floor filter drops day 4
        // (no predecessor), so days 5..=9 survive.
        let input = parsed(flat_series(12, Some(5000.0)), true);
        let analysis = analyze_file(&input, "FUTIDX_NIFTY_q1", "NIFTY", &AnalysisOptions::default());

        assert_eq!(analysis.contracts.len(), 1);
        let days = &analysis.contracts[0].days;
        assert_eq!(days.len(), 5);
        assert_eq!(days[0].date, NaiveDate::from_ymd_opt(2024, 4, 5).unwrap());
        assert_eq!(days[4].date, NaiveDate::from_ymd_opt(2024, 4, 9).unwrap());
    }

    #[test]
    fn test_floor_drops_day_after_thin_oi() {
        // Day 6's open interest sits under the floor, so day 7 is dropped
        // while day 6 itself survives (the filter looks at the prior day).
        let mut records = flat_series(12, Some(5000.0));
        records[5].open_interest = Some(1000.0); // day 6
        let input = parsed(records, true);
        let analysis = analyze_file(&input, "FUTIDX_NIFTY_q1", "NIFTY", &AnalysisOptions::default());

        let dates: Vec<u32> = analysis.contracts[0]
            .days
            .iter()
            .map(|d| chrono::Datelike::day(&d.date))
            .collect();
        assert_eq!(dates, vec![5, 6, 8, 9]);
    }

    #[test]
    fn test_volume_and_next_day_signals_without_oi() {
        // No OI column: no floor filter, trimmed days all survive.
        let mut records = flat_series(9, None);
        // Surviving days after trim: 4, 5, 6.
        records[3].volume = 100.0;
        records[4].volume = 200.0;
        records[5].volume = 300.0;
        records[4].open = 100.0;
        records[4].close = 98.0; // a loss day
        let input = parsed(records, false);
        let analysis = analyze_file(&input, "FUTIDX_NIFTY_q1", "NIFTY", &AnalysisOptions::default());

        let days = &analysis.contracts[0].days;
        assert_eq!(days.len(), 3);

        assert_eq!(days[0].volume_pct_change, None);
        assert_eq!(days[1].volume_pct_change, Some(100.0));
        assert_eq!(days[2].volume_pct_change, Some(50.0));

        assert_eq!(days[0].next_day_volume_pct_change, Some(100.0));
        assert_eq!(days[1].next_day_volume_pct_change, Some(50.0));
        assert_eq!(days[2].next_day_volume_pct_change, None);

        assert_eq!(days[1].outcome, Outcome::Loss);
        assert_eq!(days[1].daily_change, -2.0);
        assert_eq!(days[0].outcome, Outcome::Gain);

        // No OI column: the whole OI signal family stays undefined.
        assert!(days.iter().all(|d| d.oi_change.is_none()));
        assert!(days.iter().all(|d| d.oi_rolling_avg.is_none()));
        assert!(days.iter().all(|d| d.next_day_oi_normalized_change.is_none()));
    }

    #[test]
    fn test_rolling_average_needs_min_periods() {
        // 15 days -> trim leaves 9, floor drops the first -> 8 survive.
        let input = parsed(flat_series(15, Some(4000.0)), true);
        let analysis = analyze_file(&input, "FUTIDX_NIFTY_q1", "NIFTY", &AnalysisOptions::default());

        let days = &analysis.contracts[0].days;
        assert_eq!(days.len(), 8);

        // Fewer than 5 observations in the window: average undefined.
        for day in &days[..4] {
            assert_eq!(day.oi_rolling_avg, None);
            assert_eq!(day.oi_normalized_change, None);
            assert_eq!(day.next_day_oi_normalized_change, None);
        }
        // From the 5th surviving day the window is deep enough.
        for day in &days[4..] {
            assert_eq!(day.oi_rolling_avg, Some(4000.0));
        }
        assert_eq!(days[4].oi_normalized_change, Some(0.0));
        assert_eq!(days[4].next_day_oi_change, Some(0.0));
        assert_eq!(days[4].next_day_oi_normalized_change, Some(0.0));
        // Last day has no next day to respond to.
        assert_eq!(days[7].next_day_oi_change, None);
    }

    #[test]
    fn test_contracts_separated_and_sorted_by_date() {
        let mut records = Vec::new();
        // Two contracts interleaved, each with 12 days, inserted out of order.
        for day in (1..=12).rev() {
            let mut near = record(day, 100.0, 101.0, 500.0, Some(5000.0));
            near.contract_id = "25-Apr-2024".to_string();
            records.push(near);

            let mut far = record(day, 200.0, 199.0, 300.0, Some(6000.0));
            far.contract_id = "30-May-2024".to_string();
            records.push(far);
        }
        let input = parsed(records, true);
        let analysis = analyze_file(&input, "FUTIDX_NIFTY_q1", "NIFTY", &AnalysisOptions::default());

        assert_eq!(analysis.contracts.len(), 2);
        assert_eq!(analysis.contracts[0].contract_id, "25-Apr-2024");
        assert_eq!(analysis.contracts[1].contract_id, "30-May-2024");

        for contract in &analysis.contracts {
            let dates: Vec<NaiveDate> = contract.days.iter().map(|d| d.date).collect();
            let mut sorted = dates.clone();
            sorted.sort();
            assert_eq!(dates, sorted);
        }
    }
}
