//! Data-folder scanner for discovering input CSV files.
//!
//! This module finds the CSV files to analyze and derives instrument
//! names from the NSE filename convention,
//! e.g. `FUTIDX_BANKNIFTY_01-Apr-2024_TO_30-Jun-2024.csv`.

use anyhow::{bail, Result};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::{DirEntry, WalkDir};

/// Configuration for data-folder scanning.
#[derive(Debug, Clone)]
pub struct ScanConfig {
    /// File extension to include (without dot).
    pub extension: String,
    /// Maximum file size in bytes.
    pub max_file_size: u64,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            extension: "csv".to_string(),
            max_file_size: 50 * 1024 * 1024, // 50MB
        }
    }
}

impl From<&crate::config::ScannerConfig> for ScanConfig {
    fn from(config: &crate::config::ScannerConfig) -> Self {
        Self {
            extension: config.extension.clone(),
            max_file_size: config.max_file_size,
        }
    }
}

/// A discovered input file.
#[derive(Debug, Clone)]
pub struct ScannedFile {
    /// Absolute or data-dir-relative path to the file.
    pub path: PathBuf,
    /// File name without the extension; doubles as the instrument name.
    pub stem: String,
    /// File size in bytes.
    pub size: u64,
}

impl ScannedFile {
    /// Full instrument name, e.g. `FUTIDX_BANKNIFTY_01-Apr-2024_TO_30-Jun-2024`.
    pub fn instrument(&self) -> &str {
        &self.stem
    }

    /// Underlying symbol extracted from the filename.
    pub fn base_instrument(&self) -> &str {
        base_instrument(&self.stem)
    }
}

/// Extract the underlying symbol from a file stem.
///
/// The NSE convention puts the symbol after the segment prefix:
/// `FUTIDX_BANKNIFTY_...` -> `BANKNIFTY`, `FUTSTK_TATAMOTORS_...` ->
/// `TATAMOTORS`. Stems without at least two underscore-separated parts
/// are used whole.
pub fn base_instrument(stem: &str) -> &str {
    let mut parts = stem.split('_');
    match (parts.next(), parts.next()) {
        (Some(_), Some(symbol)) if !symbol.is_empty() => symbol,
        _ => stem,
    }
}

/// Scanner for the data directory.
pub struct DataScanner {
    root: PathBuf,
    config: ScanConfig,
}

impl DataScanner {
    /// Create a new scanner rooted at the data directory.
    pub fn new(root: PathBuf, config: ScanConfig) -> Self {
        Self { root, config }
    }

    /// Discover all matching CSV files, sorted by file name.
    ///
    /// Fails when the data directory is missing, since that is almost
    /// always a misconfigured path rather than an empty dataset.
    pub fn scan(&self) -> Result<Vec<ScannedFile>> {
        if !self.root.exists() {
            bail!("Data folder not found: {}", self.root.display());
        }
        if !self.root.is_dir() {
            bail!("Data path is not a directory: {}", self.root.display());
        }

        let mut files = Vec::new();

        for entry in WalkDir::new(&self.root)
            .follow_links(false)
            .into_iter()
            .filter_entry(|e| e.depth() == 0 || !is_hidden(e))
        {
            let entry = match entry {
                Ok(e) => e,
                Err(e) => {
                    debug!("Cannot read entry under {}: {}", self.root.display(), e);
                    continue;
                }
            };

            if !entry.file_type().is_file() {
                continue;
            }

            let path = entry.path();
            if !self.matches_extension(path) {
                continue;
            }

            let size = match entry.metadata() {
                Ok(m) => m.len(),
                Err(e) => {
                    debug!("Cannot stat {}: {}", path.display(), e);
                    continue;
                }
            };

            if size > self.config.max_file_size {
                warn!(
                    "Skipping {} ({} bytes, over the {} byte limit)",
                    path.display(),
                    size,
                    self.config.max_file_size
                );
                continue;
            }

            let stem = match path.file_stem().and_then(|s| s.to_str()) {
                Some(s) => s.to_string(),
                None => continue,
            };

            files.push(ScannedFile {
                path: path.to_path_buf(),
                stem,
                size,
            });
        }

        files.sort_by(|a, b| a.stem.cmp(&b.stem));
        Ok(files)
    }

    fn matches_extension(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .map(|e| e.eq_ignore_ascii_case(&self.config.extension))
            .unwrap_or(false)
    }
}

fn is_hidden(entry: &DirEntry) -> bool {
    entry
        .file_name()
        .to_str()
        .map(|name| name.starts_with('.'))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_base_instrument_extraction() {
        assert_eq!(
            base_instrument("FUTIDX_BANKNIFTY_01-Apr-2024_TO_30-Jun-2024"),
            "BANKNIFTY"
        );
        assert_eq!(
            base_instrument("FUTSTK_TATAMOTORS_01-Jan-2022_TO_31-Mar-2022"),
            "TATAMOTORS"
        );
        assert_eq!(base_instrument("NIFTY"), "NIFTY");
        assert_eq!(base_instrument("FUTIDX_"), "FUTIDX_");
    }

    #[test]
    fn test_scan_filters_and_sorts() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();

        fs::write(root.join("FUTSTK_SBIN_q1.csv"), "Date,Open\n").unwrap();
        fs::write(root.join("FUTIDX_NIFTY_q1.csv"), "Date,Open\n").unwrap();
        fs::write(root.join("notes.txt"), "not data").unwrap();
        fs::write(root.join(".hidden.csv"), "Date,Open\n").unwrap();
        fs::create_dir(root.join("2023")).unwrap();
        fs::write(root.join("2023").join("FUTIDX_NIFTY_q2.CSV"), "Date,Open\n").unwrap();

        let scanner = DataScanner::new(root.to_path_buf(), ScanConfig::default());
        let files = scanner.scan().unwrap();

        let stems: Vec<&str> = files.iter().map(|f| f.stem.as_str()).collect();
        assert_eq!(
            stems,
            vec!["FUTIDX_NIFTY_q1", "FUTIDX_NIFTY_q2", "FUTSTK_SBIN_q1"]
        );
        assert_eq!(files[0].base_instrument(), "NIFTY");
    }

    #[test]
    fn test_scan_enforces_size_limit() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("FUTIDX_NIFTY_big.csv"), "x".repeat(64)).unwrap();

        let config = ScanConfig {
            max_file_size: 16,
            ..ScanConfig::default()
        };
        let scanner = DataScanner::new(dir.path().to_path_buf(), config);
        assert!(scanner.scan().unwrap().is_empty());
    }

    #[test]
    fn test_scan_missing_dir_is_an_error() {
        let scanner = DataScanner::new(PathBuf::from("/no/such/data_folder"), ScanConfig::default());
        assert!(scanner.scan().is_err());
    }
}
