use colored::Colorize;
use comfy_table::{Cell, Table};

use crate::challan::{self, DedupResult};
use crate::fmt::rupees;
use crate::ledger::LedgerRead;
use crate::models::{Diagnostic, FieldCode};
use crate::reconcile::ValidationReport;

pub fn dedup_summary(result: &DedupResult) {
    println!(
        "Challans: {} unique ({} duplicate{} skipped, {} without a challan number)",
        result.unique.len(),
        result.duplicates,
        if result.duplicates == 1 { "" } else { "s" },
        result.dropped_missing_key
    );

    let summary = challan::summary_by_section(&result.unique);
    if summary.is_empty() {
        return;
    }
    let mut table = Table::new();
    table.set_header(vec!["Section", "Challans", "Tax", "Total Deposited"]);
    for (section, entry) in &summary {
        table.add_row(vec![
            Cell::new(section),
            Cell::new(entry.count),
            Cell::new(rupees(entry.total_tax)),
            Cell::new(rupees(entry.total_deposit)),
        ]);
    }
    println!("{table}");
}

pub fn validation_table(report: &ValidationReport) {
    let mut table = Table::new();
    table.set_header(vec![
        "Section",
        "Ledger TDS",
        "Challan Tax",
        "Difference",
        "Status",
    ]);
    for row in &report.rows {
        let status = if row.passed(report.tolerance) {
            "PASS".green().bold().to_string()
        } else {
            "FAIL".red().bold().to_string()
        };
        table.add_row(vec![
            Cell::new(&row.section),
            Cell::new(rupees(row.ledger_total)),
            Cell::new(rupees(row.challan_total)),
            Cell::new(rupees(row.difference())),
            Cell::new(status),
        ]);
    }
    println!("Reconciliation (tolerance {} rupee)\n{table}", report.tolerance);

    if report.passed {
        println!("{}", "All sections reconcile.".green());
    } else {
        println!("{}", "Reconciliation failed for one or more sections.".red());
    }
}

pub fn column_map(read: &LedgerRead) {
    match read.code_row {
        Some(row) => println!(
            "Field codes found on sheet row {}, headers on row {}",
            row + 1,
            read.header_row + 1
        ),
        None => println!(
            "No code row found; columns resolved from the headers on row {}",
            read.header_row + 1
        ),
    }

    let mut table = Table::new();
    table.set_header(vec!["Code", "Column", "Header"]);
    for code in FieldCode::ALL {
        if let Some(entry) = read.columns.get(code) {
            table.add_row(vec![
                Cell::new(code.bracketed()),
                Cell::new(column_name(entry.col)),
                Cell::new(&entry.header),
            ]);
        }
    }
    println!("{table}");
}

fn column_name(col: usize) -> String {
    let mut n = col + 1;
    let mut letters = Vec::new();
    while n > 0 {
        let rem = (n - 1) % 26;
        letters.push((b'A' + rem as u8) as char);
        n = (n - 1) / 26;
    }
    letters.iter().rev().collect()
}

pub fn read_summary(read: &LedgerRead) {
    println!(
        "Ledger: {} parties, {} challan detail row{}",
        read.rows.len(),
        read.challan_details_rows,
        if read.challan_details_rows == 1 { "" } else { "s" }
    );
}

pub fn diagnostics(diags: &[Diagnostic]) {
    if diags.is_empty() {
        return;
    }
    println!("{}", format!("{} warning(s):", diags.len()).yellow());
    for diag in diags {
        println!("  {diag}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_column_name() {
        assert_eq!(column_name(0), "A");
        assert_eq!(column_name(25), "Z");
        assert_eq!(column_name(26), "AA");
    }
}
