use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::Path;

use rust_decimal::Decimal;

use crate::error::{Result, TdsError};
use crate::models::{ChallanRecord, Diagnostic, DiagnosticKind};

// ---------------------------------------------------------------------------
// Challan ingestion
// ---------------------------------------------------------------------------

/// Load challan records from the extraction stage's export: a JSON array of
/// string maps or a headered CSV file.
pub fn load_challans(path: &Path) -> Result<ChallanLoad> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "json" => load_json(path),
        "csv" => load_csv(path),
        other => Err(TdsError::UnknownFormat(other.to_string())),
    }
}

#[derive(Debug, Clone, Default)]
pub struct ChallanLoad {
    pub records: Vec<ChallanRecord>,
    pub diagnostics: Vec<Diagnostic>,
}

fn load_json(path: &Path) -> Result<ChallanLoad> {
    let content = std::fs::read_to_string(path)?;
    let raw: Vec<HashMap<String, serde_json::Value>> = serde_json::from_str(&content)?;
    let file_name = display_name(path);

    let mut diagnostics = Vec::new();
    let records = raw
        .iter()
        .map(|entry| {
            let fields: HashMap<String, String> = entry
                .iter()
                .map(|(k, v)| (k.clone(), value_to_string(v)))
                .collect();
            ChallanRecord::from_fields(&fields, &file_name, &mut diagnostics)
        })
        .collect();

    Ok(ChallanLoad {
        records,
        diagnostics,
    })
}

fn load_csv(path: &Path) -> Result<ChallanLoad> {
    let mut reader = csv::Reader::from_path(path)?;
    let headers: Vec<String> = reader
        .headers()?
        .iter()
        .map(|h| h.trim().to_string())
        .collect();
    let file_name = display_name(path);

    let mut diagnostics = Vec::new();
    let mut records = Vec::new();
    for row in reader.records() {
        let row = row?;
        let fields: HashMap<String, String> = headers
            .iter()
            .zip(row.iter())
            .map(|(h, v)| (h.clone(), v.to_string()))
            .collect();
        records.push(ChallanRecord::from_fields(&fields, &file_name, &mut diagnostics));
    }

    Ok(ChallanLoad {
        records,
        diagnostics,
    })
}

fn value_to_string(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        serde_json::Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("challans")
        .to_string()
}

// ---------------------------------------------------------------------------
// Deduplication
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default)]
pub struct DedupResult {
    pub unique: Vec<ChallanRecord>,
    pub duplicates: usize,
    pub dropped_missing_key: usize,
    pub diagnostics: Vec<Diagnostic>,
}

/// Collapse repeated challan numbers. The first occurrence wins; repeats
/// with a different tax amount get a conflict diagnostic. Records without
/// a challan number cannot be keyed and are dropped with a warning.
pub fn dedup(records: Vec<ChallanRecord>) -> DedupResult {
    let mut result = DedupResult::default();
    let mut first_amounts: HashMap<String, Decimal> = HashMap::new();
    let mut flagged: HashSet<String> = HashSet::new();

    for record in records {
        let key = record.challan_no.trim().to_string();
        if key.is_empty() {
            result.dropped_missing_key += 1;
            result.diagnostics.push(Diagnostic::new(
                DiagnosticKind::DuplicateChallan,
                format!(
                    "{}: record without a challan number dropped",
                    record.file_name
                ),
            ));
            continue;
        }
        match first_amounts.get(&key) {
            None => {
                first_amounts.insert(key, record.tax_amount);
                result.unique.push(record);
            }
            Some(first_amount) => {
                result.duplicates += 1;
                if *first_amount != record.tax_amount && flagged.insert(key.clone()) {
                    result.diagnostics.push(Diagnostic::new(
                        DiagnosticKind::DuplicateChallan,
                        format!(
                            "challan {key} repeated with a different tax amount \
                             ({} kept, {} in {})",
                            first_amount, record.tax_amount, record.file_name
                        ),
                    ));
                }
            }
        }
    }

    result
}

// ---------------------------------------------------------------------------
// Summary
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SectionSummary {
    pub count: usize,
    pub total_tax: Decimal,
    pub total_deposit: Decimal,
}

/// Per-section count and totals after dedup, for display.
pub fn summary_by_section(records: &[ChallanRecord]) -> BTreeMap<String, SectionSummary> {
    let mut summary: BTreeMap<String, SectionSummary> = BTreeMap::new();
    for record in records {
        let entry = summary.entry(record.normalized_section()).or_default();
        entry.count += 1;
        entry.total_tax += record.tax_amount;
        entry.total_deposit += record.total_deposit();
    }
    summary
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    fn challan(no: &str, section: &str, tax: i64) -> ChallanRecord {
        ChallanRecord {
            challan_no: no.to_string(),
            nature_of_payment: section.to_string(),
            tax_amount: Decimal::from(tax),
            file_name: "test.json".to_string(),
            ..ChallanRecord::default()
        }
    }

    #[test]
    fn test_load_json() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("challans.json");
        std::fs::write(
            &path,
            r#"[
                {"challan_no": "00042", "nature_of_payment": "94C",
                 "tax_amount": "1500", "bsr_code": "0240018",
                 "tender_date": "07/05/2024"},
                {"challan_no": "00043", "nature_of_payment": "94A",
                 "tax_amount": 250.5}
            ]"#,
        )
        .unwrap();

        let load = load_challans(&path).unwrap();
        assert_eq!(load.records.len(), 2);
        assert_eq!(load.records[0].challan_no, "00042");
        assert_eq!(load.records[0].bsr_code, "0240018");
        assert_eq!(load.records[1].tax_amount, Decimal::new(2505, 1));
        assert!(load.diagnostics.is_empty());
    }

    #[test]
    fn test_load_csv() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("challans.csv");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, "challan_no,nature_of_payment,tax_amount,tender_date").unwrap();
        writeln!(file, "00042,94C,1500,07/05/2024").unwrap();
        writeln!(file, "00043,94A,250,08/05/2024").unwrap();
        drop(file);

        let load = load_challans(&path).unwrap();
        assert_eq!(load.records.len(), 2);
        assert_eq!(load.records[1].tender_date, "08/05/2024");
    }

    #[test]
    fn test_unknown_extension() {
        let err = load_challans(Path::new("challans.xml")).unwrap_err();
        assert!(matches!(err, TdsError::UnknownFormat(_)));
    }

    #[test]
    fn test_dedup_first_seen_wins_and_conflict_flagged() {
        let records = vec![
            challan("00042", "94C", 1500),
            challan("00042", "94C", 1600),
            challan("00043", "94A", 250),
        ];
        let result = dedup(records);
        assert_eq!(result.unique.len(), 2);
        assert_eq!(result.duplicates, 1);
        assert_eq!(result.unique[0].tax_amount, Decimal::from(1500));
        assert!(result
            .diagnostics
            .iter()
            .any(|d| d.kind == DiagnosticKind::DuplicateChallan));
    }

    #[test]
    fn test_dedup_exact_repeat_is_silent() {
        let records = vec![challan("00042", "94C", 1500), challan("00042", "94C", 1500)];
        let result = dedup(records);
        assert_eq!(result.unique.len(), 1);
        assert_eq!(result.duplicates, 1);
        assert!(result.diagnostics.is_empty());
    }

    #[test]
    fn test_dedup_missing_key_dropped() {
        let records = vec![challan("", "94C", 1500), challan("00042", "94C", 100)];
        let result = dedup(records);
        assert_eq!(result.unique.len(), 1);
        assert_eq!(result.dropped_missing_key, 1);
    }

    #[test]
    fn test_dedup_idempotent() {
        let records = vec![
            challan("00042", "94C", 1500),
            challan("00042", "94C", 1600),
            challan("00043", "94A", 250),
        ];
        let once = dedup(records);
        let twice = dedup(once.unique.clone());
        assert_eq!(once.unique, twice.unique);
        assert_eq!(twice.duplicates, 0);
    }

    #[test]
    fn test_summary_groups_normalized_sections() {
        let records = vec![
            challan("1", "94 C", 100),
            challan("2", "94C", 200),
            challan("3", "94A", 50),
        ];
        let summary = summary_by_section(&records);
        assert_eq!(summary.len(), 2);
        assert_eq!(summary["94C"].count, 2);
        assert_eq!(summary["94C"].total_tax, Decimal::from(300));
        assert_eq!(summary["94A"].total_tax, Decimal::from(50));
    }

    #[test]
    fn test_summary_deposit_includes_late_fee() {
        let mut record = challan("1", "94C", 100);
        record.interest = Decimal::from(5);
        record.fee_234e = Decimal::from(200);
        let summary = summary_by_section(&[record]);
        assert_eq!(summary["94C"].total_tax, Decimal::from(100));
        assert_eq!(summary["94C"].total_deposit, Decimal::from(305));
    }
}
