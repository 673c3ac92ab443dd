use std::path::Path;
use std::str::FromStr;

use calamine::{open_workbook_auto, Data, Range, Reader};
use chrono::{Duration, NaiveDate};
use regex::Regex;
use rust_decimal::{Decimal, RoundingStrategy};

use crate::columns::{self, ColumnMap};
use crate::error::{Result, TdsError};
use crate::models::{Diagnostic, DiagnosticKind, FieldCode, LedgerRow};
use crate::settings::Settings;

pub const PARTIES_SHEET: &str = "TDS PARTIES";
pub const CHALLAN_DETAILS_SHEET: &str = "Challan Details";

/// Everything pulled from the masters workbook in one pass.
#[derive(Debug, Clone)]
pub struct LedgerRead {
    pub rows: Vec<LedgerRow>,
    pub columns: ColumnMap,
    /// Zero-based grid row holding the field codes, when found.
    pub code_row: Option<usize>,
    pub header_row: usize,
    /// Populated data rows on the Challan Details sheet.
    pub challan_details_rows: usize,
    pub diagnostics: Vec<Diagnostic>,
}

// ---------------------------------------------------------------------------
// Workbook reading
// ---------------------------------------------------------------------------

/// Read the masters workbook: resolve columns on the TDS PARTIES sheet,
/// scan its data rows into typed ledger entries, and count the rows on the
/// Challan Details sheet.
pub fn read_masters(path: &Path, settings: &Settings) -> Result<LedgerRead> {
    let mut workbook =
        open_workbook_auto(path).map_err(|e| TdsError::Workbook(e.to_string()))?;

    let parties = workbook
        .worksheet_range(PARTIES_SHEET)
        .map_err(|_| TdsError::MissingSheet(PARTIES_SHEET.to_string()))?;
    let grid = grid_from_range(&parties);

    let resolved = columns::resolve(&grid, settings.code_scan_rows);
    let mandatory_resolved = FieldCode::ALL
        .iter()
        .filter(|c| c.is_mandatory() && resolved.map.get(**c).is_some())
        .count();
    if mandatory_resolved == 0 {
        return Err(TdsError::NoColumns(PARTIES_SHEET.to_string()));
    }

    let mut diagnostics = resolved.diagnostics.clone();

    let data_start = match resolved.code_row {
        Some(r) => r + 1,
        None => resolved.header_row + 1,
    };
    let rows = scan_rows(&grid, data_start, &resolved.map, settings, &mut diagnostics);

    let details = workbook
        .worksheet_range(CHALLAN_DETAILS_SHEET)
        .map_err(|_| TdsError::MissingSheet(CHALLAN_DETAILS_SHEET.to_string()))?;
    let details_grid = grid_from_range(&details);
    // Header offset of one row; data starts at sheet row 3.
    let challan_details_rows = details_grid
        .iter()
        .skip(2)
        .filter(|row| row.iter().any(|c| !c.trim().is_empty()))
        .count();

    Ok(LedgerRead {
        rows,
        columns: resolved.map,
        code_row: resolved.code_row,
        header_row: resolved.header_row,
        challan_details_rows,
        diagnostics,
    })
}

fn scan_rows(
    grid: &[Vec<String>],
    data_start: usize,
    columns: &ColumnMap,
    settings: &Settings,
    diagnostics: &mut Vec<Diagnostic>,
) -> Vec<LedgerRow> {
    let name_col = columns.col(FieldCode::Name);
    let pan_col = columns.col(FieldCode::Pan);
    let pan_re = Regex::new(r"^[A-Z]{5}[0-9]{4}[A-Z]$").ok();

    let mut rows = Vec::new();
    let mut empty_run = 0;

    for (offset, cells) in grid.iter().skip(data_start).enumerate() {
        let grid_row = data_start + offset;
        if !is_meaningful(cells, name_col, pan_col) {
            empty_run += 1;
            if empty_run >= settings.max_empty_run {
                break;
            }
            continue;
        }
        empty_run = 0;

        let sheet_row = (grid_row + 1) as u32;
        let cell = |code: FieldCode| -> Option<&str> {
            columns
                .col(code)
                .and_then(|c| cells.get(c))
                .map(|v| v.trim())
                .filter(|v| !v.is_empty())
        };
        let text = |code: FieldCode| cell(code).map(|v| v.to_string());

        let mut row = LedgerRow {
            row: sheet_row,
            deductee_code: text(FieldCode::DeducteeCode),
            section: text(FieldCode::Section),
            pan: text(FieldCode::Pan),
            name: text(FieldCode::Name),
            bsr_code: text(FieldCode::BsrCode),
            challan_no: text(FieldCode::ChallanNo),
            ..LedgerRow::default()
        };

        for (code, slot) in [
            (FieldCode::AmountPaid, &mut row.amount_paid),
            (FieldCode::Tds, &mut row.tds),
        ] {
            if let Some(raw) = cell(code) {
                match parse_amount(raw) {
                    Some(v) => *slot = Some(round_half_up(v)),
                    None => diagnostics.push(Diagnostic::new(
                        DiagnosticKind::BadAmount,
                        format!("row {sheet_row}: unreadable {code} amount '{raw}'"),
                    )),
                }
            }
        }
        // Rate keeps its full precision; only the percent sign is stripped.
        if let Some(raw) = cell(FieldCode::Rate) {
            row.rate = parse_amount(raw.trim_end_matches('%'));
        }

        for (code, slot) in [
            (FieldCode::PaymentDate, &mut row.payment_date),
            (FieldCode::DepositDate, &mut row.deposit_date),
        ] {
            if let Some(raw) = cell(code) {
                match parse_date(raw) {
                    Some(d) => *slot = Some(d),
                    None => diagnostics.push(Diagnostic::new(
                        DiagnosticKind::BadDate,
                        format!("row {sheet_row}: unreadable {code} date '{raw}'"),
                    )),
                }
            }
        }

        if let (Some(pan), Some(re)) = (row.pan.as_deref(), pan_re.as_ref()) {
            if !re.is_match(pan) {
                diagnostics.push(Diagnostic::new(
                    DiagnosticKind::BadPan,
                    format!("row {sheet_row}: PAN '{pan}' does not match the expected shape"),
                ));
            }
        }

        rows.push(row);
    }

    rows
}

/// A row counts as data when its anchor fields (name, PAN) hold something
/// other than blank or zero; formula-only filler rows evaluate to empty or
/// zero cells. Sheets without either anchor column fall back to the whole
/// row.
fn is_meaningful(cells: &[String], name_col: Option<usize>, pan_col: Option<usize>) -> bool {
    let live = |v: &str| {
        let v = v.trim();
        !v.is_empty() && v != "0" && v != "0.0"
    };
    let anchor = |col: Option<usize>| {
        col.and_then(|c| cells.get(c))
            .map(|v| live(v))
            .unwrap_or(false)
    };
    if name_col.is_some() || pan_col.is_some() {
        anchor(name_col) || anchor(pan_col)
    } else {
        cells.iter().any(|c| live(c))
    }
}

// ---------------------------------------------------------------------------
// Cell conversion and parsing
// ---------------------------------------------------------------------------

/// Flatten a calamine range into a dense grid anchored at cell A1, padding
/// for ranges that do not start there. grid[0] is sheet row 1.
pub fn grid_from_range(range: &Range<Data>) -> Vec<Vec<String>> {
    let (row_off, col_off) = match range.start() {
        Some((r, c)) => (r as usize, c as usize),
        None => return Vec::new(),
    };

    let mut grid = vec![Vec::new(); row_off];
    for row in range.rows() {
        let mut out = vec![String::new(); col_off];
        out.extend(row.iter().map(data_to_string));
        grid.push(out);
    }
    grid
}

fn data_to_string(data: &Data) -> String {
    match data {
        Data::Empty => String::new(),
        Data::String(s) => s.clone(),
        Data::Float(f) => {
            if f.fract() == 0.0 && f.abs() < 1e15 {
                format!("{}", *f as i64)
            } else {
                f.to_string()
            }
        }
        Data::Int(i) => i.to_string(),
        Data::Bool(b) => b.to_string(),
        Data::DateTime(dt) => dt.as_f64().to_string(),
        Data::DateTimeIso(s) => s.clone(),
        Data::DurationIso(s) => s.clone(),
        Data::Error(_) => String::new(),
    }
}

/// Parse a money or rate cell: currency symbols, commas, and spaces are
/// noise; anything left unparseable is `None`.
pub fn parse_amount(raw: &str) -> Option<Decimal> {
    let cleaned: String = raw
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.' || *c == '-')
        .collect();
    if cleaned.is_empty() {
        return None;
    }
    Decimal::from_str(&cleaned).ok()
}

/// Round to whole rupees, halves away from zero. 12.40 becomes 12,
/// 12.50 becomes 13.
pub fn round_half_up(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
}

const EXCEL_EPOCH: (i32, u32, u32) = (1899, 12, 30);

pub fn excel_epoch() -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(EXCEL_EPOCH.0, EXCEL_EPOCH.1, EXCEL_EPOCH.2)
}

/// Parse a date cell. Indian ledgers are day-first; ISO strings and raw
/// Excel serial numbers also occur once calamine has flattened the cell.
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let trimmed = raw.trim();
    let candidate = match trimmed.split_once('T') {
        Some((date_part, _)) => date_part,
        None => trimmed,
    };

    const FORMATS: [&str; 5] = ["%d/%m/%Y", "%d-%m-%Y", "%d.%m.%Y", "%Y-%m-%d", "%d/%m/%y"];
    for format in FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(candidate, format) {
            return Some(date);
        }
    }

    // Excel serial day count.
    if let Ok(serial) = candidate.parse::<f64>() {
        if serial > 0.0 && serial < 200_000.0 {
            return excel_epoch().map(|epoch| epoch + Duration::days(serial.trunc() as i64));
        }
    }
    None
}
