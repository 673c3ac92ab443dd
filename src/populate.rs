use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use umya_spreadsheet::{Spreadsheet, Worksheet};

use crate::error::{Result, TdsError};
use crate::ledger::{self, LedgerRead, CHALLAN_DETAILS_SHEET, PARTIES_SHEET};
use crate::models::{ChallanRecord, Diagnostic, DiagnosticKind, FieldCode, LedgerRow};
use crate::settings::Settings;

pub const CHALLAN_SHEET: &str = "CHALLAN DETAILS";
pub const DEDUCTEE_SHEET: &str = "DEDUCTEE BREAK-UP";

// ---------------------------------------------------------------------------
// Region planning
// ---------------------------------------------------------------------------

/// One template region: a data window above a totals row. The row
/// adjustment is computed up front and applied as a single insert or
/// delete, so the totals row moves exactly once.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct RegionPlan {
    data_start: u32,
    totals_row: u32,
    needed: u32,
}

impl RegionPlan {
    fn new(data_start: u32, totals_row: u32, needed: u32) -> RegionPlan {
        RegionPlan {
            data_start,
            totals_row,
            needed,
        }
    }

    /// Insert or delete rows above the totals row so the data window fits
    /// `needed` exactly, then clear the window. Returns the plan with the
    /// totals row at its final position.
    fn apply(mut self, ws: &mut Worksheet, clear_cols: u32) -> RegionPlan {
        let available = self.totals_row.saturating_sub(self.data_start);
        if self.needed > available {
            let extra = self.needed - available;
            ws.insert_new_row(&self.totals_row, &extra);
            self.totals_row += extra;
        } else if self.needed < available {
            let surplus = available - self.needed;
            ws.remove_row(&(self.totals_row - surplus), &surplus);
            self.totals_row -= surplus;
        }

        for row in self.data_start..self.totals_row {
            for col in 1..=clear_cols {
                ws.get_cell_mut((col, row)).set_value("");
            }
        }
        self
    }

    fn last_data_row(&self) -> u32 {
        self.data_start + self.needed - 1
    }
}

/// Locate the totals row of a region: first a SUM formula in the amount
/// column, then a "total" label in the given columns, then the template
/// default.
fn find_totals_row(
    ws: &Worksheet,
    amount_col: u32,
    label_cols: &[u32],
    data_start: u32,
    default: u32,
    diagnostics: &mut Vec<Diagnostic>,
) -> u32 {
    let max_row = ws.get_highest_row().max(default);

    for row in data_start..=max_row {
        if let Some(cell) = ws.get_cell((amount_col, row)) {
            if cell.get_formula().to_uppercase().contains("SUM") {
                return row;
            }
        }
    }

    for row in data_start..=max_row {
        for col in label_cols {
            if ws.get_value((*col, row)).to_lowercase().contains("total") {
                return row;
            }
        }
    }

    diagnostics.push(Diagnostic::new(
        DiagnosticKind::TemplateLayout,
        format!("no totals row found below row {data_start}, using template default {default}"),
    ));
    default
}

// ---------------------------------------------------------------------------
// Cell helpers
// ---------------------------------------------------------------------------

fn col_letter(col: u32) -> String {
    let mut n = col;
    let mut letters = Vec::new();
    while n > 0 {
        let rem = (n - 1) % 26;
        letters.push((b'A' + rem as u8) as char);
        n = (n - 1) / 26;
    }
    letters.iter().rev().collect()
}

fn set_text(ws: &mut Worksheet, col: u32, row: u32, value: &str) {
    ws.get_cell_mut((col, row)).set_value_string(value);
}

fn set_number(ws: &mut Worksheet, col: u32, row: u32, value: i64) {
    ws.get_cell_mut((col, row)).set_value_number(value as f64);
}

/// Write a real date cell with the return's display format.
fn set_date(ws: &mut Worksheet, col: u32, row: u32, date: NaiveDate) {
    if let Some(epoch) = ledger::excel_epoch() {
        let serial = (date - epoch).num_days() as f64;
        ws.get_cell_mut((col, row)).set_value_number(serial);
        ws.get_style_mut((col, row))
            .get_number_format_mut()
            .set_format_code("DD/MM/YYYY");
    }
}

/// Date cell from a raw feed string: a parseable date becomes a real date
/// cell, anything else is written verbatim.
fn set_date_or_raw(ws: &mut Worksheet, col: u32, row: u32, raw: &str) {
    match ledger::parse_date(raw) {
        Some(date) => set_date(ws, col, row, date),
        None if !raw.is_empty() => set_text(ws, col, row, raw),
        None => {}
    }
}

fn set_bold(ws: &mut Worksheet, col: u32, row: u32) {
    ws.get_style_mut((col, row)).get_font_mut().set_bold(true);
}

fn sum_formula(col: u32, first: u32, last: u32) -> String {
    let letter = col_letter(col);
    format!("SUM({letter}{first}:{letter}{last})")
}

/// Output sheets round up to the next whole rupee.
fn ceil_rupees(value: Decimal) -> i64 {
    value.ceil().to_i64().unwrap_or(0)
}

/// The return form wants a space between the section number and its
/// letter suffix: "94A" becomes "94 A".
fn format_section(section: &str) -> String {
    let trimmed = section.trim();
    let chars: Vec<char> = trimmed.chars().collect();
    if chars.len() >= 3
        && !trimmed.contains(' ')
        && chars[0].is_ascii_digit()
        && chars[1].is_ascii_digit()
        && chars[2].is_alphabetic()
    {
        format!("{} {}", &trimmed[..2], &trimmed[2..])
    } else {
        trimmed.to_string()
    }
}

/// Render the deduction rate. Fractional rates were stored as decimals
/// (0.1 means 10%); absent rates fall back to tds/amount, then to 0%.
fn format_rate(rate: Option<Decimal>, amount: i64, tds: i64) -> String {
    if let Some(rate) = rate {
        let mut value = rate.to_f64().unwrap_or(0.0);
        if value < 1.0 {
            value *= 100.0;
        }
        return format!("{value:.2}%");
    }
    if amount > 0 && tds > 0 {
        let derived = tds as f64 / amount as f64 * 100.0;
        return format!("{derived:.2}%");
    }
    "0%".to_string()
}

/// Company/non-company code, two digits. Falls back to the PAN's fourth
/// character: P marks an individual (01), everything else a company (02).
fn deductee_code_for(row: &LedgerRow) -> String {
    if let Some(code) = row.deductee_code.as_deref() {
        let code = code.trim();
        if !code.is_empty() {
            if code.chars().all(|c| c.is_ascii_digit()) {
                return format!("{code:0>2}");
            }
            return code.to_string();
        }
    }
    match row.pan.as_deref().and_then(|p| p.chars().nth(3)) {
        Some(c) if c.eq_ignore_ascii_case(&'p') => "01".to_string(),
        Some(_) => "02".to_string(),
        None => "01".to_string(),
    }
}

// ---------------------------------------------------------------------------
// Output generation
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct PopulateResult {
    pub out_path: PathBuf,
    pub challan_rows: usize,
    pub deductee_rows: usize,
    pub diagnostics: Vec<Diagnostic>,
}

/// Fill the return template from the reconciled data and save it at
/// `out_path`. Both regions are resized to fit exactly.
pub fn generate_output(
    template: &Path,
    out_path: &Path,
    ledger: &LedgerRead,
    challans: &[ChallanRecord],
    settings: &Settings,
) -> Result<PopulateResult> {
    let mut book = umya_spreadsheet::reader::xlsx::read(template)
        .map_err(|e| TdsError::Workbook(e.to_string()))?;
    let mut diagnostics = Vec::new();

    let challan_rows = {
        let ws = sheet_mut(&mut book, CHALLAN_SHEET)?;
        write_challan_region(ws, challans, settings, &mut diagnostics)
    };
    let deductee_rows = {
        let ws = sheet_mut(&mut book, DEDUCTEE_SHEET)?;
        write_deductee_region(ws, &ledger.rows, challans, settings, &mut diagnostics)
    };

    umya_spreadsheet::writer::xlsx::write(&book, out_path)
        .map_err(|e| TdsError::Workbook(e.to_string()))?;

    Ok(PopulateResult {
        out_path: out_path.to_path_buf(),
        challan_rows,
        deductee_rows,
        diagnostics,
    })
}

fn sheet_mut<'a>(book: &'a mut Spreadsheet, name: &str) -> Result<&'a mut Worksheet> {
    book.get_sheet_by_name_mut(name)
        .ok_or_else(|| TdsError::MissingSheet(name.to_string()))
}

/// CHALLAN DETAILS: one row per deduplicated challan, 13 columns wide.
fn write_challan_region(
    ws: &mut Worksheet,
    challans: &[ChallanRecord],
    settings: &Settings,
    diagnostics: &mut Vec<Diagnostic>,
) -> usize {
    let data_start = settings.data_start_row;
    let totals_row = find_totals_row(
        ws,
        3,
        &[1, 2, 3],
        data_start,
        settings.challan_totals_row,
        diagnostics,
    );

    let plan = RegionPlan::new(data_start, totals_row, challans.len() as u32).apply(ws, 13);

    let mut row = plan.data_start;
    for (idx, challan) in challans.iter().enumerate() {
        set_number(ws, 1, row, (idx + 1) as i64);
        set_text(ws, 2, row, &format_section(&challan.nature_of_payment));
        set_number(ws, 3, row, ceil_rupees(challan.tax_amount));
        set_number(ws, 4, row, ceil_rupees(challan.surcharge));
        set_number(ws, 5, row, ceil_rupees(challan.cess));
        set_number(ws, 6, row, ceil_rupees(challan.interest));
        set_number(ws, 7, row, ceil_rupees(challan.penalty));
        ws.get_cell_mut((8, row))
            .set_formula(format!("SUM(C{row}:G{row})"));
        set_text(ws, 9, row, &challan.mode_of_payment);
        set_text(ws, 10, row, &challan.bsr_code);
        set_date_or_raw(ws, 11, row, &challan.tender_date);
        set_text(ws, 12, row, &challan.challan_no);
        set_text(ws, 13, row, "NO");
        row += 1;
    }

    set_text(ws, 2, plan.totals_row, "TOTAL");
    set_bold(ws, 2, plan.totals_row);
    if plan.needed > 0 {
        for col in 3..=8 {
            ws.get_cell_mut((col, plan.totals_row)).set_formula(sum_formula(
                col,
                plan.data_start,
                plan.last_data_row(),
            ));
            set_bold(ws, col, plan.totals_row);
        }
    }

    challans.len()
}

/// DEDUCTEE BREAK-UP: one row per ledger entry with a section, 22 columns
/// at fixed positions, joined to its challan by normalized section.
fn write_deductee_region(
    ws: &mut Worksheet,
    rows: &[LedgerRow],
    challans: &[ChallanRecord],
    settings: &Settings,
    diagnostics: &mut Vec<Diagnostic>,
) -> usize {
    let parties: Vec<&LedgerRow> = rows
        .iter()
        .filter(|r| r.normalized_section().map(|s| !s.is_empty()).unwrap_or(false))
        .collect();

    let data_start = settings.data_start_row;
    let totals_row = find_totals_row(
        ws,
        7,
        &[1],
        data_start,
        settings.deductee_totals_row,
        diagnostics,
    );

    let plan = RegionPlan::new(data_start, totals_row, parties.len() as u32).apply(ws, 22);

    let mut row = plan.data_start;
    for (idx, party) in parties.iter().enumerate() {
        let section = party.section.as_deref().unwrap_or("");
        let challan = challans
            .iter()
            .find(|c| Some(c.normalized_section()) == party.normalized_section());

        let amount = party.amount_paid.map(ceil_rupees).unwrap_or(0);
        let tds = party.tds.map(ceil_rupees).unwrap_or(0);

        set_number(ws, 1, row, (idx + 1) as i64);
        set_text(ws, 2, row, &deductee_code_for(party));
        set_text(ws, 3, row, &format_section(section));
        set_text(ws, 4, row, party.pan.as_deref().unwrap_or(""));
        set_text(ws, 5, row, party.name.as_deref().unwrap_or(""));
        if let Some(date) = party.payment_date {
            set_date(ws, 6, row, date);
        }
        set_number(ws, 7, row, amount);
        // Column 8, paid by book entry, stays blank.
        set_number(ws, 9, row, tds);
        set_number(ws, 10, row, 0);
        set_number(ws, 11, row, 0);
        ws.get_cell_mut((12, row))
            .set_formula(format!("I{row}+J{row}+K{row}"));
        ws.get_cell_mut((13, row)).set_formula(format!("L{row}"));
        set_number(ws, 14, row, 0);
        set_number(ws, 15, row, 0);
        ws.get_cell_mut((16, row))
            .set_formula(format!("M{row}+N{row}+O{row}"));

        // Challan fields: values already written back into the ledger win
        // over the section join.
        let bsr = party
            .bsr_code
            .clone()
            .filter(|v| !v.is_empty())
            .or_else(|| challan.map(|c| c.bsr_code.clone()))
            .unwrap_or_default();
        let challan_no = party
            .challan_no
            .clone()
            .filter(|v| !v.is_empty())
            .or_else(|| challan.map(|c| c.challan_no.clone()))
            .unwrap_or_default();
        set_text(ws, 17, row, &bsr);
        set_text(ws, 18, row, &challan_no);

        match party.deposit_date {
            Some(date) => set_date(ws, 19, row, date),
            None => {
                if let Some(challan) = challan {
                    set_date_or_raw(ws, 19, row, &challan.tender_date);
                }
            }
        }
        if let Some(date) = party.payment_date {
            set_date(ws, 20, row, date);
        }
        set_text(ws, 21, row, &format_rate(party.rate, amount, tds));
        set_text(ws, 22, row, "N.A");
        row += 1;
    }

    set_text(ws, 1, plan.totals_row, "TOTAL");
    set_bold(ws, 1, plan.totals_row);
    if plan.needed > 0 {
        for col in [7u32, 9, 10, 11, 12, 13, 14, 15, 16] {
            ws.get_cell_mut((col, plan.totals_row)).set_formula(sum_formula(
                col,
                plan.data_start,
                plan.last_data_row(),
            ));
            set_bold(ws, col, plan.totals_row);
        }
    }

    parties.len()
}

// ---------------------------------------------------------------------------
// Masters write-back
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct UpdateResult {
    pub out_path: PathBuf,
    pub rows_updated: usize,
    pub diagnostics: Vec<Diagnostic>,
}

/// Write the matched challan serial number and deposit date back into the
/// masters workbook, rewrite its Challan Details sheet, and save the
/// result alongside the original. The ledger rows are enriched in place
/// so the output populator sees the same values.
pub fn update_masters(
    masters_path: &Path,
    out_path: &Path,
    ledger: &mut LedgerRead,
    challans: &[ChallanRecord],
) -> Result<UpdateResult> {
    let mut book = umya_spreadsheet::reader::xlsx::read(masters_path)
        .map_err(|e| TdsError::Workbook(e.to_string()))?;
    let mut diagnostics = Vec::new();

    let challan_col = ledger.columns.col(FieldCode::ChallanNo);
    let deposit_col = ledger.columns.col(FieldCode::DepositDate);
    if challan_col.is_none() || deposit_col.is_none() {
        diagnostics.push(Diagnostic::new(
            DiagnosticKind::MissingColumn,
            "masters has no challan serial / deposit date columns, write-back limited",
        ));
    }

    let mut rows_updated = 0;
    {
        let ws = sheet_mut(&mut book, PARTIES_SHEET)?;
        for row in &mut ledger.rows {
            let challan = match row
                .normalized_section()
                .filter(|s| !s.is_empty())
                .and_then(|s| challans.iter().find(|c| c.normalized_section() == s))
            {
                Some(c) => c,
                None => continue,
            };

            if let Some(col) = challan_col {
                set_text(ws, (col + 1) as u32, row.row, &challan.challan_no);
                row.challan_no = Some(challan.challan_no.clone());
            }
            if let Some(col) = deposit_col {
                set_date_or_raw(ws, (col + 1) as u32, row.row, &challan.tender_date);
                row.deposit_date = ledger::parse_date(&challan.tender_date);
            }
            if row.bsr_code.as_deref().unwrap_or("").is_empty() {
                row.bsr_code = Some(challan.bsr_code.clone());
            }
            rows_updated += 1;
        }
    }

    {
        let ws = sheet_mut(&mut book, CHALLAN_DETAILS_SHEET)?;
        let max_row = ws.get_highest_row();
        let max_col = ws.get_highest_column().max(13);
        for row in 3..=max_row.max(3) {
            for col in 1..=max_col {
                ws.get_cell_mut((col, row)).set_value("");
            }
        }
        for (idx, challan) in challans.iter().enumerate() {
            let row = (idx + 3) as u32;
            set_number(ws, 1, row, (idx + 1) as i64);
            set_text(ws, 2, row, &challan.nature_of_payment);
            set_number(ws, 3, row, half_up_i64(challan.tax_amount));
            set_number(ws, 4, row, half_up_i64(challan.surcharge));
            set_number(ws, 5, row, half_up_i64(challan.cess));
            set_number(ws, 6, row, half_up_i64(challan.interest));
            set_number(ws, 7, row, half_up_i64(challan.penalty));
            ws.get_cell_mut((8, row))
                .set_formula(format!("SUM(C{row}:G{row})"));
            set_text(ws, 9, row, &challan.mode_of_payment);
            set_text(ws, 10, row, &challan.bsr_code);
            set_date_or_raw(ws, 11, row, &challan.tender_date);
            set_text(ws, 12, row, &challan.challan_no);
            set_text(ws, 13, row, "NO");
        }
    }

    umya_spreadsheet::writer::xlsx::write(&book, out_path)
        .map_err(|e| TdsError::Workbook(e.to_string()))?;

    Ok(UpdateResult {
        out_path: out_path.to_path_buf(),
        rows_updated,
        diagnostics,
    })
}

fn half_up_i64(value: Decimal) -> i64 {
    ledger::round_half_up(value).to_i64().unwrap_or(0)
}

/// Default name for the filled return, taken from the first payment date
/// in the ledger; the current month when the ledger has none.
pub fn output_filename(rows: &[LedgerRow]) -> String {
    let date = rows
        .iter()
        .find_map(|r| r.payment_date)
        .unwrap_or_else(|| chrono::Local::now().date_naive());
    format!("TDS_{}_{}.xlsx", date.format("%B"), date.format("%Y"))
}

/// Derive the updated-masters path: `masters.xlsx` -> `masters_UPDATED.xlsx`.
pub fn updated_masters_path(masters: &Path) -> PathBuf {
    let stem = masters
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("masters");
    masters.with_file_name(format!("{stem}_UPDATED.xlsx"))
}
