use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Engine tunables. Defaults match the masters and template layouts issued
/// with the return forms; a settings file only needs the fields it overrides.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Rows scanned from the top of the parties sheet for the code row.
    #[serde(default = "default_code_scan_rows")]
    pub code_scan_rows: usize,
    /// Consecutive non-meaningful rows that end the ledger scan.
    #[serde(default = "default_max_empty_run")]
    pub max_empty_run: usize,
    /// Reconciliation tolerance in whole rupees (inclusive).
    #[serde(default = "default_tolerance")]
    pub tolerance: u32,
    /// First data row of both template regions (1-based).
    #[serde(default = "default_data_start_row")]
    pub data_start_row: u32,
    /// Fallback totals row of the challan region when discovery fails.
    #[serde(default = "default_challan_totals_row")]
    pub challan_totals_row: u32,
    /// Fallback totals row of the deductee region when discovery fails.
    #[serde(default = "default_deductee_totals_row")]
    pub deductee_totals_row: u32,
}

fn default_code_scan_rows() -> usize {
    10
}

fn default_max_empty_run() -> usize {
    5
}

fn default_tolerance() -> u32 {
    1
}

fn default_data_start_row() -> u32 {
    4
}

fn default_challan_totals_row() -> u32 {
    8
}

fn default_deductee_totals_row() -> u32 {
    55
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            code_scan_rows: default_code_scan_rows(),
            max_empty_run: default_max_empty_run(),
            tolerance: default_tolerance(),
            data_start_row: default_data_start_row(),
            challan_totals_row: default_challan_totals_row(),
            deductee_totals_row: default_deductee_totals_row(),
        }
    }
}

fn config_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config")
        .join("tdsmate")
}

fn settings_path() -> PathBuf {
    config_dir().join("settings.json")
}

pub fn load_settings() -> Settings {
    let path = settings_path();
    if path.exists() {
        let content = std::fs::read_to_string(&path).unwrap_or_default();
        serde_json::from_str(&content).unwrap_or_default()
    } else {
        Settings::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let s = Settings::default();
        assert_eq!(s.code_scan_rows, 10);
        assert_eq!(s.max_empty_run, 5);
        assert_eq!(s.tolerance, 1);
        assert_eq!(s.data_start_row, 4);
        assert_eq!(s.challan_totals_row, 8);
        assert_eq!(s.deductee_totals_row, 55);
    }

    #[test]
    fn test_partial_file_merges_with_defaults() {
        let json = r#"{"max_empty_run": 8}"#;
        let s: Settings = serde_json::from_str(json).unwrap();
        assert_eq!(s.max_empty_run, 8);
        assert_eq!(s.tolerance, 1);
        assert_eq!(s.deductee_totals_row, 55);
    }

    #[test]
    fn test_roundtrip() {
        let settings = Settings {
            tolerance: 2,
            ..Settings::default()
        };
        let json = serde_json::to_string_pretty(&settings).unwrap();
        let loaded: Settings = serde_json::from_str(&json).unwrap();
        assert_eq!(loaded.tolerance, 2);
        assert_eq!(loaded.code_scan_rows, 10);
    }
}
