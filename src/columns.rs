use std::collections::HashMap;

use regex::Regex;

use crate::models::{Diagnostic, DiagnosticKind, FieldCode};

// ---------------------------------------------------------------------------
// Column resolution for the masters sheet
// ---------------------------------------------------------------------------

/// Where a field code landed in the sheet.
#[derive(Debug, Clone)]
pub struct ColumnEntry {
    /// Zero-based column index into the grid.
    pub col: usize,
    /// Header text above the code row, for reporting.
    pub header: String,
}

/// Field-code to column mapping. First occurrence of a code wins.
#[derive(Debug, Clone, Default)]
pub struct ColumnMap {
    entries: HashMap<FieldCode, ColumnEntry>,
}

impl ColumnMap {
    pub fn get(&self, code: FieldCode) -> Option<&ColumnEntry> {
        self.entries.get(&code)
    }

    pub fn col(&self, code: FieldCode) -> Option<usize> {
        self.entries.get(&code).map(|e| e.col)
    }

    pub fn insert_if_absent(&mut self, code: FieldCode, entry: ColumnEntry) {
        self.entries.entry(code).or_insert(entry);
    }

    pub fn mandatory_missing(&self) -> Vec<FieldCode> {
        FieldCode::ALL
            .iter()
            .copied()
            .filter(|c| c.is_mandatory() && !self.entries.contains_key(c))
            .collect()
    }
}

/// Outcome of scanning a sheet for its code row and columns.
#[derive(Debug, Clone)]
pub struct ResolvedColumns {
    pub map: ColumnMap,
    /// Zero-based grid row holding the codes, when one was found.
    pub code_row: Option<usize>,
    /// Zero-based grid row treated as headers.
    pub header_row: usize,
    pub diagnostics: Vec<Diagnostic>,
}

/// Find the code row and build the column map. Scans the first
/// `scan_window` rows for cells carrying codes as `(417)` or `-417`;
/// the row above the code row supplies header names. Codes the scan
/// misses fall back to header-alias matching.
pub fn resolve(grid: &[Vec<String>], scan_window: usize) -> ResolvedColumns {
    let mut diagnostics = Vec::new();
    let code_re = Regex::new(r"\(([0-9]+[A-F]?)\)|-([0-9]+[A-F]?)\b").ok();

    let mut map = ColumnMap::default();
    let mut code_row = None;

    if let Some(code_re) = &code_re {
        for (row_idx, row) in grid.iter().take(scan_window).enumerate() {
            let mut hits = 0;
            for (col_idx, cell) in row.iter().enumerate() {
                for caps in code_re.captures_iter(cell) {
                    let token = caps
                        .get(1)
                        .or_else(|| caps.get(2))
                        .map(|m| m.as_str())
                        .unwrap_or("");
                    if let Some(code) = FieldCode::from_token(token) {
                        hits += 1;
                        let header = header_for(grid, row_idx, col_idx);
                        map.insert_if_absent(code, ColumnEntry { col: col_idx, header });
                    }
                }
            }
            if hits > 0 {
                code_row = Some(row_idx);
                break;
            }
        }
    }

    let header_row = match code_row {
        Some(r) if r > 0 => r - 1,
        _ => 0,
    };
    let headers = grid.get(header_row).cloned().unwrap_or_default();

    // Alias fallback for anything the code row did not cover. Alias lists
    // run most-specific first so "Challan Serial No" beats plain "No".
    for code in FieldCode::ALL {
        if map.get(code).is_some() {
            continue;
        }
        'alias: for alias in code.aliases() {
            let needle = alias.to_lowercase();
            for (col_idx, header) in headers.iter().enumerate() {
                if header.trim().to_lowercase().contains(&needle) {
                    map.insert_if_absent(
                        code,
                        ColumnEntry {
                            col: col_idx,
                            header: header.trim().to_string(),
                        },
                    );
                    break 'alias;
                }
            }
        }
    }

    for code in map.mandatory_missing() {
        diagnostics.push(Diagnostic::new(
            DiagnosticKind::MissingColumn,
            format!("no column found for {code}"),
        ));
    }

    ResolvedColumns {
        map,
        code_row,
        header_row,
        diagnostics,
    }
}

fn header_for(grid: &[Vec<String>], code_row: usize, col: usize) -> String {
    if code_row == 0 {
        return String::new();
    }
    grid[code_row - 1]
        .get(col)
        .map(|h| h.trim().to_string())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid(rows: &[&[&str]]) -> Vec<Vec<String>> {
        rows.iter()
            .map(|r| r.iter().map(|c| c.to_string()).collect())
            .collect()
    }

    #[test]
    fn test_code_row_detection() {
        let g = grid(&[
            &["TDS PARTIES"],
            &["Name of the Deductee", "PAN", "Section", "TDS"],
            &["(417)", "(416)", "(415A)", "(421)"],
            &["Acme Traders", "ABCPE1234F", "94C", "1500"],
        ]);
        let resolved = resolve(&g, 10);
        assert_eq!(resolved.code_row, Some(2));
        assert_eq!(resolved.map.col(FieldCode::Name), Some(0));
        assert_eq!(resolved.map.col(FieldCode::Section), Some(2));
        assert_eq!(
            resolved.map.get(FieldCode::Name).unwrap().header,
            "Name of the Deductee"
        );
    }

    #[test]
    fn test_dashed_codes() {
        let g = grid(&[
            &["Header"],
            &["-417", "-416", "-415A", "-421"],
            &["Acme", "ABCPE1234F", "94C", "100"],
        ]);
        let resolved = resolve(&g, 10);
        assert_eq!(resolved.code_row, Some(1));
        assert_eq!(resolved.map.col(FieldCode::Pan), Some(1));
        assert_eq!(resolved.map.col(FieldCode::Tds), Some(3));
    }

    #[test]
    fn test_alias_fallback_without_code_row() {
        let g = grid(&[
            &[
                "Deductee Name",
                "PAN No",
                "Nature of Payment",
                "TDS Amount",
                "Challan Serial No",
            ],
            &["Acme", "ABCPE1234F", "94C", "100", "00042"],
        ]);
        let resolved = resolve(&g, 10);
        assert_eq!(resolved.code_row, None);
        assert_eq!(resolved.map.col(FieldCode::Name), Some(0));
        assert_eq!(resolved.map.col(FieldCode::Pan), Some(1));
        assert_eq!(resolved.map.col(FieldCode::Section), Some(2));
        assert_eq!(resolved.map.col(FieldCode::Tds), Some(3));
        assert_eq!(resolved.map.col(FieldCode::ChallanNo), Some(4));
    }

    #[test]
    fn test_alias_order_prefers_specific_name() {
        // "Rate" appears inside "TDS Deducted Rates %" too; the specific
        // alias must claim the rate column before the generic one runs.
        let g = grid(&[
            &["Section", "TDS", "TDS Deducted Rates %", "Separate Rate"],
            &["94C", "100", "10", "5"],
        ]);
        let resolved = resolve(&g, 10);
        assert_eq!(resolved.map.col(FieldCode::Rate), Some(2));
    }

    #[test]
    fn test_strategies_agree_when_both_apply() {
        // Same sheet with and without its code row resolves every shared
        // code to the same physical column.
        let with_codes = grid(&[
            &[
                "Name of the Deductee",
                "PAN of the Deductee",
                "Section Under Payment Made",
                "Amount Paid /Credited",
                "TDS Amount",
            ],
            &["(417)", "(416)", "(415A)", "(419)", "(421)"],
            &["Acme", "ABCPE1234F", "94C", "1000", "100"],
        ]);
        let mut without_codes = with_codes.clone();
        without_codes.remove(1);

        let by_code = resolve(&with_codes, 10);
        let by_alias = resolve(&without_codes, 10);
        assert!(by_code.code_row.is_some());
        assert!(by_alias.code_row.is_none());
        for code in FieldCode::ALL {
            assert_eq!(
                by_code.map.col(code),
                by_alias.map.col(code),
                "{code} resolved differently"
            );
        }
    }

    #[test]
    fn test_first_wins_on_duplicate_codes() {
        let g = grid(&[
            &["A", "B"],
            &["(421)", "(421)"],
            &["1", "2"],
        ]);
        let resolved = resolve(&g, 10);
        assert_eq!(resolved.map.col(FieldCode::Tds), Some(0));
    }

    #[test]
    fn test_mandatory_missing_reports_diagnostics() {
        let g = grid(&[&["Deductee Name"], &["Acme"]]);
        let resolved = resolve(&g, 10);
        assert!(!resolved.diagnostics.is_empty());
        assert!(resolved
            .map
            .mandatory_missing()
            .contains(&FieldCode::Section));
    }

    #[test]
    fn test_scan_window_limits_code_search() {
        let mut rows: Vec<Vec<String>> = (0..12).map(|_| vec![String::new()]).collect();
        rows.push(vec!["(421)".to_string()]);
        let resolved = resolve(&rows, 10);
        assert_eq!(resolved.code_row, None);
    }
}
