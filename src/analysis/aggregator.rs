//! Aggregation of analyzed contracts into report rows.
//!
//! This module ranks next-day OI responses globally, then rolls the
//! per-day signals up into contract summaries, instrument averages,
//! an overall average, and the year-wise table.

use crate::models::{
    mean, AnalyzedContract, ContractSummary, InstrumentSummary, Outcome, OutcomeMetrics,
    SignalRow, YearlySummary,
};
use chrono::Datelike;
use std::collections::BTreeMap;

/// Date format used in the year-wise period column.
const PERIOD_FORMAT: &str = "%d %b %Y";

/// Assign every defined next-day normalized OI change its percentile
/// across all contracts of all files. Undefined values stay undefined.
pub fn assign_oi_percentiles(contracts: &mut [AnalyzedContract]) {
    let mut slots: Vec<(usize, usize)> = Vec::new();
    let mut values: Vec<f64> = Vec::new();

    for (ci, contract) in contracts.iter().enumerate() {
        for (di, day) in contract.days.iter().enumerate() {
            if let Some(v) = day.next_day_oi_normalized_change {
                slots.push((ci, di));
                values.push(v);
            }
        }
    }

    if values.is_empty() {
        return;
    }

    let percentiles = percentile_ranks(&values);
    for ((ci, di), pct) in slots.into_iter().zip(percentiles) {
        contracts[ci].days[di].next_day_oi_percentile = Some(pct);
    }
}

/// Percentile rank (in (0, 100]) of each value, averaging ranks over ties.
pub fn percentile_ranks(values: &[f64]) -> Vec<f64> {
    let n = values.len();
    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&a, &b| {
        values[a]
            .partial_cmp(&values[b])
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut ranks = vec![0.0; n];
    let mut i = 0;
    while i < n {
        // Walk the tie group sharing this value.
        let mut j = i;
        while j + 1 < n && values[order[j + 1]] == values[order[i]] {
            j += 1;
        }
        // 1-based ranks i+1..=j+1 average to (i + j + 2) / 2.
        let average_rank = (i + j + 2) as f64 / 2.0;
        for k in i..=j {
            ranks[order[k]] = average_rank / n as f64 * 100.0;
        }
        i = j + 1;
    }
    ranks
}

/// The compiled contract-level report.
#[derive(Debug, Clone)]
pub struct CompiledReport {
    pub contracts: Vec<ContractSummary>,
    pub instrument_averages: Vec<InstrumentSummary>,
    pub overall: InstrumentSummary,
}

/// Build the compiled report: one row per contract, one average row per
/// base instrument, one overall average row.
///
/// Averages are computed from unrounded contract metrics; rounding is
/// applied to every row at the end.
pub fn compile_report(contracts: &[AnalyzedContract], decimals: u32) -> CompiledReport {
    let mut rows: Vec<ContractSummary> = contracts.iter().map(summarize_contract).collect();
    rows.sort_by(|a, b| {
        (&a.base_instrument, &a.contract_id, &a.instrument)
            .cmp(&(&b.base_instrument, &b.contract_id, &b.instrument))
    });

    let mut groups: BTreeMap<&str, Vec<&ContractSummary>> = BTreeMap::new();
    for row in &rows {
        groups.entry(row.base_instrument.as_str()).or_default().push(row);
    }

    let instrument_averages: Vec<InstrumentSummary> = groups
        .iter()
        .map(|(base, group)| average_of(base, group, decimals))
        .collect();

    let all: Vec<&ContractSummary> = rows.iter().collect();
    let overall = average_of("ALL", &all, decimals);

    let contracts = rows
        .into_iter()
        .map(|mut row| {
            row.after_loss = row.after_loss.rounded(decimals);
            row.after_gain = row.after_gain.rounded(decimals);
            row
        })
        .collect();

    CompiledReport {
        contracts,
        instrument_averages,
        overall,
    }
}

fn summarize_contract(contract: &AnalyzedContract) -> ContractSummary {
    let loss: Vec<&SignalRow> = outcome_days(&contract.days, Outcome::Loss);
    let gain: Vec<&SignalRow> = outcome_days(&contract.days, Outcome::Gain);

    ContractSummary {
        instrument: contract.instrument.clone(),
        base_instrument: contract.base_instrument.clone(),
        contract_id: contract.contract_id.clone(),
        total_days: contract.days.len(),
        loss_days: loss.len(),
        gain_days: gain.len(),
        after_loss: OutcomeMetrics::over(&loss),
        after_gain: OutcomeMetrics::over(&gain),
    }
}

fn outcome_days(days: &[SignalRow], outcome: Outcome) -> Vec<&SignalRow> {
    days.iter().filter(|d| d.outcome == outcome).collect()
}

fn average_of(base: &str, rows: &[&ContractSummary], decimals: u32) -> InstrumentSummary {
    InstrumentSummary {
        base_instrument: base.to_string(),
        total_days: rows.iter().map(|r| r.total_days).sum(),
        loss_days: rows.iter().map(|r| r.loss_days).sum(),
        gain_days: rows.iter().map(|r| r.gain_days).sum(),
        after_loss: average_blocks(rows.iter().map(|r| &r.after_loss), decimals),
        after_gain: average_blocks(rows.iter().map(|r| &r.after_gain), decimals),
    }
}

/// Field-wise mean over metric blocks, skipping undefined values.
fn average_blocks<'a>(
    blocks: impl Iterator<Item = &'a OutcomeMetrics>,
    decimals: u32,
) -> OutcomeMetrics {
    let blocks: Vec<&OutcomeMetrics> = blocks.collect();
    OutcomeMetrics {
        avg_oi_percentile: mean(blocks.iter().filter_map(|b| b.avg_oi_percentile)),
        avg_next_day_volume_change: mean(
            blocks.iter().filter_map(|b| b.avg_next_day_volume_change),
        ),
        avg_next_day_oi_normalized: mean(
            blocks.iter().filter_map(|b| b.avg_next_day_oi_normalized),
        ),
        pct_oi_increase: mean(blocks.iter().filter_map(|b| b.pct_oi_increase)),
    }
    .rounded(decimals)
}

/// Build the year-wise table: one row per (base instrument, year),
/// pooling every contract's surviving days for that year.
pub fn yearly_summaries(contracts: &[AnalyzedContract], decimals: u32) -> Vec<YearlySummary> {
    let mut groups: BTreeMap<(&str, i32), Vec<&SignalRow>> = BTreeMap::new();
    for contract in contracts {
        for day in &contract.days {
            groups
                .entry((contract.base_instrument.as_str(), day.date.year()))
                .or_default()
                .push(day);
        }
    }

    groups
        .into_iter()
        .map(|((base, year), days)| {
            let first = days.iter().map(|d| d.date).min().expect("group is non-empty");
            let last = days.iter().map(|d| d.date).max().expect("group is non-empty");

            let loss: Vec<&SignalRow> = days
                .iter()
                .copied()
                .filter(|d| d.outcome == Outcome::Loss)
                .collect();
            let gain: Vec<&SignalRow> = days
                .iter()
                .copied()
                .filter(|d| d.outcome == Outcome::Gain)
                .collect();

            YearlySummary {
                instrument: base.to_string(),
                year,
                period: format!(
                    "{} to {}",
                    first.format(PERIOD_FORMAT),
                    last.format(PERIOD_FORMAT)
                ),
                total_days: days.len(),
                loss_days: loss.len(),
                gain_days: gain.len(),
                after_loss: OutcomeMetrics::over(&loss).rounded(decimals),
                after_gain: OutcomeMetrics::over(&gain).rounded(decimals),
            }
        })
        .collect()
}
