use std::collections::BTreeMap;

use rust_decimal::Decimal;

use crate::models::{ChallanRecord, Diagnostic, DiagnosticKind, LedgerRow};

// ---------------------------------------------------------------------------
// Per-section reconciliation
// ---------------------------------------------------------------------------

/// Ledger-vs-challan totals for one deduction section.
#[derive(Debug, Clone, PartialEq)]
pub struct CategoryComparison {
    pub section: String,
    pub ledger_total: Decimal,
    pub challan_total: Decimal,
}

impl CategoryComparison {
    pub fn difference(&self) -> Decimal {
        (self.ledger_total - self.challan_total).abs()
    }

    pub fn passed(&self, tolerance: u32) -> bool {
        self.difference() <= Decimal::from(tolerance)
    }
}

#[derive(Debug, Clone)]
pub struct ValidationReport {
    pub rows: Vec<CategoryComparison>,
    pub tolerance: u32,
    pub passed: bool,
    pub diagnostics: Vec<Diagnostic>,
}

/// Compare the TDS deducted per section against the tax deposited per
/// section. Sections are grouped after space-stripping, both sides are
/// summed independently, and a section present on only one side is
/// compared against zero.
pub fn reconcile(
    ledger: &[LedgerRow],
    challans: &[ChallanRecord],
    tolerance: u32,
) -> ValidationReport {
    let mut ledger_totals: BTreeMap<String, Decimal> = BTreeMap::new();
    for row in ledger {
        let section = match row.normalized_section() {
            Some(s) if !s.is_empty() => s,
            _ => continue,
        };
        *ledger_totals.entry(section).or_default() += row.tds.unwrap_or_default();
    }

    let mut challan_totals: BTreeMap<String, Decimal> = BTreeMap::new();
    for record in challans {
        let section = record.normalized_section();
        if section.is_empty() {
            continue;
        }
        *challan_totals.entry(section).or_default() += record.tax_amount;
    }

    let mut sections: Vec<String> = ledger_totals.keys().cloned().collect();
    for section in challan_totals.keys() {
        if !ledger_totals.contains_key(section) {
            sections.push(section.clone());
        }
    }
    sections.sort();

    let mut diagnostics = Vec::new();
    let mut rows = Vec::new();
    for section in sections {
        let ledger_total = ledger_totals.get(&section).copied().unwrap_or_default();
        let challan_total = challan_totals.get(&section).copied().unwrap_or_default();
        if !ledger_totals.contains_key(&section) {
            diagnostics.push(Diagnostic::new(
                DiagnosticKind::UnmatchedSection,
                format!("section {section} has challans but no ledger entries"),
            ));
        } else if !challan_totals.contains_key(&section) {
            diagnostics.push(Diagnostic::new(
                DiagnosticKind::UnmatchedSection,
                format!("section {section} has ledger entries but no challan"),
            ));
        }
        rows.push(CategoryComparison {
            section,
            ledger_total,
            challan_total,
        });
    }

    let passed = rows.iter().all(|r| r.passed(tolerance));
    ValidationReport {
        rows,
        tolerance,
        passed,
        diagnostics,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ledger_row(section: &str, tds: i64) -> LedgerRow {
        LedgerRow {
            section: Some(section.to_string()),
            tds: Some(Decimal::from(tds)),
            ..LedgerRow::default()
        }
    }

    fn challan(section: &str, tax: i64) -> ChallanRecord {
        ChallanRecord {
            nature_of_payment: section.to_string(),
            challan_no: "1".to_string(),
            tax_amount: Decimal::from(tax),
            ..ChallanRecord::default()
        }
    }

    #[test]
    fn test_tolerance_is_inclusive() {
        let report = reconcile(&[ledger_row("94C", 100)], &[challan("94C", 101)], 1);
        assert!(report.passed);
        let report = reconcile(&[ledger_row("94C", 100)], &[challan("94C", 102)], 1);
        assert!(!report.passed);
        // Symmetric the other way.
        let report = reconcile(&[ledger_row("94C", 102)], &[challan("94C", 100)], 1);
        assert!(!report.passed);
    }

    #[test]
    fn test_space_normalized_grouping() {
        let report = reconcile(
            &[ledger_row("94 A", 60), ledger_row("94A", 40)],
            &[challan("94A", 100)],
            1,
        );
        assert_eq!(report.rows.len(), 1);
        assert_eq!(report.rows[0].section, "94A");
        assert_eq!(report.rows[0].ledger_total, Decimal::from(100));
        assert!(report.passed);
    }

    #[test]
    fn test_challan_totals_are_summed() {
        let report = reconcile(
            &[ledger_row("94C", 300)],
            &[challan("94C", 100), challan("94C", 200)],
            1,
        );
        assert_eq!(report.rows[0].challan_total, Decimal::from(300));
        assert!(report.passed);
    }

    #[test]
    fn test_one_sided_sections_compared_against_zero() {
        let report = reconcile(&[ledger_row("94I", 500)], &[challan("94C", 500)], 1);
        assert!(!report.passed);
        assert_eq!(report.rows.len(), 2);
        let ledger_only = report.rows.iter().find(|r| r.section == "94I").unwrap();
        assert_eq!(ledger_only.challan_total, Decimal::ZERO);
        assert_eq!(report.diagnostics.len(), 2);
    }

    #[test]
    fn test_rows_without_section_are_ignored() {
        let mut no_section = ledger_row("94C", 100);
        no_section.section = None;
        let report = reconcile(
            &[no_section, ledger_row("94C", 100)],
            &[challan("94C", 100)],
            1,
        );
        assert_eq!(report.rows[0].ledger_total, Decimal::from(100));
    }
}
