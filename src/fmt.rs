use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

/// Format a rupee amount with Indian digit grouping: ₹12,34,567.
/// Whole rupees only; the engine rounds before display.
pub fn rupees(val: Decimal) -> String {
    let negative = val.is_sign_negative();
    let abs = val.abs().round().to_i128().unwrap_or(0);
    let digits = abs.to_string();

    // Last three digits stay together, then pairs.
    let mut grouped = String::new();
    for (i, c) in digits.chars().rev().enumerate() {
        if i == 3 || (i > 3 && (i - 3) % 2 == 0) {
            grouped.push(',');
        }
        grouped.push(c);
    }
    let grouped: String = grouped.chars().rev().collect();

    if negative {
        format!("-₹{grouped}")
    } else {
        format!("₹{grouped}")
    }
}
