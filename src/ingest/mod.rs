//! CSV ingestion for NSE futures exports.
//!
//! Turns one bhavcopy-style CSV into clean [`DailyRecord`]s. Headers are
//! matched case-insensitively after trimming; rows that fail to parse are
//! dropped and counted rather than failing the file (skip-and-warn).
//!
//! Required columns: `Date` (`%d-%b-%Y`), `Open`, `Close`,
//! `No. of contracts`. Optional: `Open Int` (enables the OI signal
//! family) and `Expiry` / `Expiry Date` (contract identifier).

use crate::models::DailyRecord;
use chrono::NaiveDate;
use csv::StringRecord;
use std::collections::HashMap;
use std::fs::File;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

/// Date format used by NSE exports, e.g. `01-Apr-2024`.
const DATE_FORMAT: &str = "%d-%b-%Y";

/// File-level ingestion failure.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("failed to open {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to read CSV structure of {path}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("{path}: missing required column \"{column}\"")]
    MissingColumn { path: PathBuf, column: String },
}

/// A fully parsed input file.
#[derive(Debug, Clone)]
pub struct ParsedFile {
    /// Whether the file carries an `Open Int` column.
    pub has_open_interest: bool,
    /// Clean rows in file order.
    pub records: Vec<DailyRecord>,
    /// Data rows seen in the file.
    pub rows_read: usize,
    /// Rows dropped for missing or unparseable required fields.
    pub rows_dropped: usize,
}

/// Column indexes resolved from the header row.
struct Columns {
    date: usize,
    open: usize,
    close: usize,
    volume: usize,
    open_interest: Option<usize>,
    expiry: Option<usize>,
}

impl Columns {
    fn resolve(headers: &StringRecord, path: &Path) -> Result<Self, IngestError> {
        let map: HashMap<String, usize> = headers
            .iter()
            .enumerate()
            .map(|(i, h)| (h.trim().to_lowercase(), i))
            .collect();

        let require = |name: &str| -> Result<usize, IngestError> {
            map.get(name).copied().ok_or_else(|| IngestError::MissingColumn {
                path: path.to_path_buf(),
                column: name.to_string(),
            })
        };

        Ok(Self {
            date: require("date")?,
            open: require("open")?,
            close: require("close")?,
            volume: require("no. of contracts")?,
            open_interest: map.get("open int").copied(),
            expiry: ["expiry", "expiry date", "expiry_date"]
                .iter()
                .find_map(|name| map.get(*name).copied()),
        })
    }
}

/// Parse one CSV file into daily records.
///
/// `contract_fallback` keys the whole file as a single contract when no
/// expiry column exists (normally the instrument name).
pub fn parse_file(path: &Path, contract_fallback: &str) -> Result<ParsedFile, IngestError> {
    let file = File::open(path).map_err(|source| IngestError::Open {
        path: path.to_path_buf(),
        source,
    })?;

    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(file);

    let headers = reader
        .headers()
        .map_err(|source| IngestError::Csv {
            path: path.to_path_buf(),
            source,
        })?
        .clone();

    let columns = Columns::resolve(&headers, path)?;

    let mut records = Vec::new();
    let mut rows_read = 0usize;
    let mut rows_dropped = 0usize;

    for (line, result) in reader.records().enumerate() {
        rows_read += 1;

        let record = match result {
            Ok(r) => r,
            Err(e) => {
                debug!("{}: row {}: unreadable record: {}", path.display(), line + 2, e);
                rows_dropped += 1;
                continue;
            }
        };

        match parse_row(&record, &columns, contract_fallback) {
            Some(daily) => records.push(daily),
            None => {
                debug!(
                    "{}: row {}: dropped (missing or unparseable required field)",
                    path.display(),
                    line + 2
                );
                rows_dropped += 1;
            }
        }
    }

    Ok(ParsedFile {
        has_open_interest: columns.open_interest.is_some(),
        records,
        rows_read,
        rows_dropped,
    })
}

fn parse_row(record: &StringRecord, columns: &Columns, contract_fallback: &str) -> Option<DailyRecord> {
    let date = parse_date(record.get(columns.date)?)?;
    let open = parse_number(record.get(columns.open)?)?;
    let close = parse_number(record.get(columns.close)?)?;
    let volume = parse_number(record.get(columns.volume)?)?;

    // Open interest is best-effort: a blank cell keeps the row.
    let open_interest = columns
        .open_interest
        .and_then(|i| record.get(i))
        .and_then(parse_number);

    let contract_id = columns
        .expiry
        .and_then(|i| record.get(i))
        .filter(|s| !s.is_empty())
        .unwrap_or(contract_fallback)
        .to_string();

    Some(DailyRecord {
        date,
        open,
        close,
        volume,
        open_interest,
        contract_id,
    })
}

fn parse_date(field: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(field.trim(), DATE_FORMAT).ok()
}

/// Parse a numeric cell, tolerating thousands separators.
fn parse_number(field: &str) -> Option<f64> {
    let cleaned = field.replace(',', "");
    let cleaned = cleaned.trim();
    if cleaned.is_empty() || cleaned == "-" {
        return None;
    }
    cleaned.parse::<f64>().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_csv(content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(".csv").tempfile().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_parse_full_file() {
        let csv = "\
Instrument,Date,Expiry,Open,High,Low,Close,No. of contracts,Open Int
FUTIDX,01-Apr-2024,25-Apr-2024,47200.5,47400,47100,47350.25,\"1,250\",105000
FUTIDX,02-Apr-2024,25-Apr-2024,47350,47500,47200,47275.00,1310,106500
";
        let file = write_csv(csv);
        let parsed = parse_file(file.path(), "FALLBACK").unwrap();

        assert!(parsed.has_open_interest);
        assert_eq!(parsed.rows_read, 2);
        assert_eq!(parsed.rows_dropped, 0);
        assert_eq!(parsed.records.len(), 2);

        let first = &parsed.records[0];
        assert_eq!(first.date, NaiveDate::from_ymd_opt(2024, 4, 1).unwrap());
        assert_eq!(first.open, 47200.5);
        assert_eq!(first.close, 47350.25);
        assert_eq!(first.volume, 1250.0); // thousands separator stripped
        assert_eq!(first.open_interest, Some(105000.0));
        assert_eq!(first.contract_id, "25-Apr-2024");
    }

    #[test]
    fn test_bad_rows_are_dropped_not_fatal() {
        let csv = "\
Date,Expiry,Open,Close,No. of contracts
01-Apr-2024,25-Apr-2024,100,101,500
not-a-date,25-Apr-2024,100,101,500
02-Apr-2024,25-Apr-2024,,101,500
03-Apr-2024,25-Apr-2024,100,101,500
";
        let file = write_csv(csv);
        let parsed = parse_file(file.path(), "FALLBACK").unwrap();

        assert!(!parsed.has_open_interest);
        assert_eq!(parsed.rows_read, 4);
        assert_eq!(parsed.rows_dropped, 2);
        assert_eq!(parsed.records.len(), 2);
    }

    #[test]
    fn test_blank_open_interest_keeps_row() {
        let csv = "\
Date,Expiry,Open,Close,No. of contracts,Open Int
01-Apr-2024,25-Apr-2024,100,101,500,2400
02-Apr-2024,25-Apr-2024,101,102,510,-
";
        let file = write_csv(csv);
        let parsed = parse_file(file.path(), "FALLBACK").unwrap();

        assert_eq!(parsed.records.len(), 2);
        assert_eq!(parsed.records[0].open_interest, Some(2400.0));
        assert_eq!(parsed.records[1].open_interest, None);
    }

    #[test]
    fn test_missing_expiry_uses_fallback_contract() {
        let csv = "\
Date,Open,Close,No. of contracts
01-Apr-2024,100,101,500
";
        let file = write_csv(csv);
        let parsed = parse_file(file.path(), "FUTIDX_NIFTY_q1").unwrap();

        assert_eq!(parsed.records[0].contract_id, "FUTIDX_NIFTY_q1");
    }

    #[test]
    fn test_missing_date_column_is_fatal() {
        let csv = "Open,Close,No. of contracts\n100,101,500\n";
        let file = write_csv(csv);
        let err = parse_file(file.path(), "X").unwrap_err();

        assert!(matches!(err, IngestError::MissingColumn { ref column, .. } if column == "date"));
    }

    #[test]
    fn test_parse_bhavcopy_fixture_end_to_end() {
        let path = std::path::Path::new(env!("CARGO_MANIFEST_DIR"))
            .join("fixtures")
            .join("FUTIDX_NIFTY_01-Apr-2024_TO_30-Jun-2024.csv");

        let parsed = parse_file(&path, "FUTIDX_NIFTY_01-Apr-2024_TO_30-Jun-2024").unwrap();
        assert!(parsed.has_open_interest);
        assert_eq!(parsed.rows_read, 14);
        assert_eq!(parsed.rows_dropped, 0);
        assert!(parsed.records.iter().all(|r| r.contract_id == "25-Apr-2024"));

        // 14 days -> trim 3 per end -> 8 -> prior-day OI filter drops the
        // first -> 7 surviving days flow into the signal pipeline.
        let analysis = crate::analysis::analyze_file(
            &parsed,
            "FUTIDX_NIFTY_01-Apr-2024_TO_30-Jun-2024",
            "NIFTY",
            &crate::analysis::AnalysisOptions::default(),
        );
        assert_eq!(analysis.contracts.len(), 1);
        assert_eq!(analysis.contracts[0].days.len(), 7);
    }

    #[test]
    fn test_headers_match_case_insensitively() {
        let csv = "\
DATE,EXPIRY,OPEN,CLOSE,NO. OF CONTRACTS,OPEN INT
01-Apr-2024,25-Apr-2024,100,101,500,3000
";
        let file = write_csv(csv);
        let parsed = parse_file(file.path(), "X").unwrap();

        assert!(parsed.has_open_interest);
        assert_eq!(parsed.records.len(), 1);
    }
}
