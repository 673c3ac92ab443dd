use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use rust_decimal::Decimal;

// ---------------------------------------------------------------------------
// Return-form field codes
// ---------------------------------------------------------------------------

/// Column codes from the quarterly return annexures. The masters workbook
/// carries these in a dedicated code row, e.g. `(417)` or `-417`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum FieldCode {
    /// (415) deductee code: company / non-company
    DeducteeCode,
    /// (415A) section under which payment made
    Section,
    /// (416) PAN of the deductee
    Pan,
    /// (417) name of the deductee
    Name,
    /// (418) date of payment or credit
    PaymentDate,
    /// (419) amount paid or credited
    AmountPaid,
    /// (421) tax deducted
    Tds,
    /// (425D) BSR code of the bank branch
    BsrCode,
    /// (425E) challan serial number
    ChallanNo,
    /// (425F) date on which tax deposited
    DepositDate,
    /// (427) rate at which deducted
    Rate,
}

impl FieldCode {
    pub const ALL: [FieldCode; 11] = [
        FieldCode::DeducteeCode,
        FieldCode::Section,
        FieldCode::Pan,
        FieldCode::Name,
        FieldCode::PaymentDate,
        FieldCode::AmountPaid,
        FieldCode::Tds,
        FieldCode::BsrCode,
        FieldCode::ChallanNo,
        FieldCode::DepositDate,
        FieldCode::Rate,
    ];

    /// The bare code token as it appears inside brackets.
    pub fn token(&self) -> &'static str {
        match self {
            FieldCode::DeducteeCode => "415",
            FieldCode::Section => "415A",
            FieldCode::Pan => "416",
            FieldCode::Name => "417",
            FieldCode::PaymentDate => "418",
            FieldCode::AmountPaid => "419",
            FieldCode::Tds => "421",
            FieldCode::BsrCode => "425D",
            FieldCode::ChallanNo => "425E",
            FieldCode::DepositDate => "425F",
            FieldCode::Rate => "427",
        }
    }

    pub fn bracketed(&self) -> String {
        format!("({})", self.token())
    }

    pub fn from_token(token: &str) -> Option<FieldCode> {
        FieldCode::ALL.iter().copied().find(|c| c.token() == token)
    }

    /// Header names accepted when the sheet has no code row. Ordered from
    /// most to least specific; matching is case-insensitive substring.
    pub fn aliases(&self) -> &'static [&'static str] {
        match self {
            FieldCode::DeducteeCode => {
                &["Deductee Code", "Individual/Company", "Indiv/Comp", "Code"]
            }
            FieldCode::Section => &[
                "Section Under Payment Made",
                "Type of Payment",
                "Nature of Payment",
                "Section",
            ],
            FieldCode::Pan => &["PAN of the Deductee", "PAN No", "Deductee PAN", "PAN"],
            FieldCode::Name => &["Name of the Deductee", "Deductee Name", "Party Name", "Name"],
            FieldCode::PaymentDate => &[
                "Date of Payment/credit",
                "Payment Date",
                "Date of Payment",
                "Credit Date",
            ],
            FieldCode::AmountPaid => &[
                "Amount Paid /Credited",
                "Amount Paid",
                "Gross Amount",
                "Payment Amount",
                "Amount",
            ],
            FieldCode::Tds => &["Tax Deducted", "TDS Amount", "TDS Rs.", "TDS"],
            FieldCode::BsrCode => &["BSR Code", "Bank BSR Code", "BSR"],
            FieldCode::ChallanNo => &["Challan Serial No", "Challan Number", "Challan No"],
            FieldCode::DepositDate => &[
                "Date on which deposited",
                "Date Deposited",
                "Deposit Date",
                "Challan Date",
            ],
            FieldCode::Rate => &[
                "TDS Deducted Rates %",
                "TDS Rate",
                "Rate %",
                "Deduction Rate",
                "Rate",
            ],
        }
    }

    /// A sheet where none of these resolve is not a usable masters sheet.
    pub fn is_mandatory(&self) -> bool {
        matches!(self, FieldCode::Section | FieldCode::Tds)
    }
}

impl fmt::Display for FieldCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({})", self.token())
    }
}

// ---------------------------------------------------------------------------
// Ledger and challan records
// ---------------------------------------------------------------------------

/// One deduction entry from the TDS PARTIES sheet. Every field is optional;
/// the reader records what it could not parse as diagnostics instead of
/// failing the row.
#[derive(Debug, Clone, Default)]
pub struct LedgerRow {
    /// 1-based sheet row the entry came from.
    pub row: u32,
    pub deductee_code: Option<String>,
    pub section: Option<String>,
    pub pan: Option<String>,
    pub name: Option<String>,
    pub payment_date: Option<NaiveDate>,
    pub amount_paid: Option<Decimal>,
    pub tds: Option<Decimal>,
    pub bsr_code: Option<String>,
    pub challan_no: Option<String>,
    pub deposit_date: Option<NaiveDate>,
    pub rate: Option<Decimal>,
}

impl LedgerRow {
    /// Section with internal spaces stripped, for grouping. "94 A" and
    /// "94A" are the same section.
    pub fn normalized_section(&self) -> Option<String> {
        self.section.as_ref().map(|s| normalize_section(s))
    }
}

/// One tax payment challan from the bank scrape.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChallanRecord {
    pub nature_of_payment: String,
    pub challan_no: String,
    /// Kept as the source string; challan feeds use several date shapes.
    pub tender_date: String,
    pub mode_of_payment: String,
    pub bsr_code: String,
    /// Source file the record came from, for conflict reporting.
    pub file_name: String,
    pub tax_amount: Decimal,
    pub surcharge: Decimal,
    pub cess: Decimal,
    pub interest: Decimal,
    pub penalty: Decimal,
    pub fee_234e: Decimal,
}

impl ChallanRecord {
    /// Build a record from a loosely-keyed map (JSON object or CSV row).
    /// Missing keys become empty strings and unparseable amounts become
    /// zero; each such amount produces a diagnostic.
    pub fn from_fields(
        fields: &HashMap<String, String>,
        file_name: &str,
        diagnostics: &mut Vec<Diagnostic>,
    ) -> ChallanRecord {
        let text = |key: &str| fields.get(key).map(|v| v.trim().to_string()).unwrap_or_default();
        let mut amount = |key: &str| -> Decimal {
            let raw = text(key);
            if raw.is_empty() {
                return Decimal::ZERO;
            }
            let cleaned: String = raw
                .chars()
                .filter(|c| c.is_ascii_digit() || *c == '.' || *c == '-')
                .collect();
            match Decimal::from_str(&cleaned) {
                Ok(v) => v,
                Err(_) => {
                    diagnostics.push(Diagnostic::new(
                        DiagnosticKind::BadAmount,
                        format!("{file_name}: unreadable {key} value '{raw}', treating as zero"),
                    ));
                    Decimal::ZERO
                }
            }
        };

        // The extraction stage stamps each record with its source file;
        // fall back to the feed's own name when the key is missing.
        let mut source = text("file_name");
        if source.is_empty() {
            source = file_name.to_string();
        }

        ChallanRecord {
            tax_amount: amount("tax_amount"),
            surcharge: amount("surcharge"),
            cess: amount("cess"),
            interest: amount("interest"),
            penalty: amount("penalty"),
            fee_234e: amount("fee_234e"),
            nature_of_payment: text("nature_of_payment"),
            challan_no: text("challan_no"),
            tender_date: text("tender_date"),
            mode_of_payment: text("mode_of_payment"),
            bsr_code: text("bsr_code"),
            file_name: source,
        }
    }

    pub fn normalized_section(&self) -> String {
        normalize_section(&self.nature_of_payment)
    }

    /// Everything deposited under this challan, late fee included.
    pub fn total_deposit(&self) -> Decimal {
        self.tax_amount + self.surcharge + self.cess + self.interest + self.penalty + self.fee_234e
    }
}

/// Strip every space so "94 A" groups with "94A".
pub fn normalize_section(raw: &str) -> String {
    raw.chars().filter(|c| !c.is_whitespace()).collect()
}

// ---------------------------------------------------------------------------
// Diagnostics
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiagnosticKind {
    BadAmount,
    BadDate,
    BadPan,
    DuplicateChallan,
    MissingColumn,
    UnmatchedSection,
    TemplateLayout,
}

impl DiagnosticKind {
    pub fn label(&self) -> &'static str {
        match self {
            DiagnosticKind::BadAmount => "amount",
            DiagnosticKind::BadDate => "date",
            DiagnosticKind::BadPan => "pan",
            DiagnosticKind::DuplicateChallan => "duplicate",
            DiagnosticKind::MissingColumn => "column",
            DiagnosticKind::UnmatchedSection => "section",
            DiagnosticKind::TemplateLayout => "template",
        }
    }
}

/// A non-fatal finding surfaced to the user alongside the result it belongs
/// to. Diagnostics never abort a run.
#[derive(Debug, Clone, PartialEq)]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    pub message: String,
}

impl Diagnostic {
    pub fn new(kind: DiagnosticKind, message: impl Into<String>) -> Diagnostic {
        Diagnostic {
            kind,
            message: message.into(),
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.kind.label(), self.message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_roundtrip() {
        for code in FieldCode::ALL {
            assert_eq!(FieldCode::from_token(code.token()), Some(code));
        }
        assert_eq!(FieldCode::from_token("999"), None);
    }

    #[test]
    fn test_bracketed() {
        assert_eq!(FieldCode::Section.bracketed(), "(415A)");
        assert_eq!(FieldCode::Name.bracketed(), "(417)");
    }

    #[test]
    fn test_normalize_section() {
        assert_eq!(normalize_section("94 A"), "94A");
        assert_eq!(normalize_section("94A"), "94A");
        assert_eq!(normalize_section(" 194 C "), "194C");
    }

    #[test]
    fn test_challan_from_fields_missing_and_bad() {
        let mut fields = HashMap::new();
        fields.insert("challan_no".to_string(), " 00042 ".to_string());
        fields.insert("tax_amount".to_string(), "₹1,234.50".to_string());
        fields.insert("interest".to_string(), "n/a".to_string());

        let mut diags = Vec::new();
        let rec = ChallanRecord::from_fields(&fields, "scrape.json", &mut diags);

        assert_eq!(rec.challan_no, "00042");
        assert_eq!(rec.tax_amount, Decimal::from_str("1234.50").unwrap());
        assert_eq!(rec.interest, Decimal::ZERO);
        assert_eq!(rec.surcharge, Decimal::ZERO);
        assert_eq!(rec.nature_of_payment, "");
        assert_eq!(diags.len(), 1);
        assert_eq!(diags[0].kind, DiagnosticKind::BadAmount);
    }
}
