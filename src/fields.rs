// 💱 Field-level value parsing
// Shared by the table and free-text strategies so malformed input always
// degrades to None instead of aborting a row.

use chrono::NaiveDate;

/// Parse a numeric field after stripping thousands separators.
///
/// "1,200.50" → Some(1200.5). Blank or malformed input → None, never an
/// error. This is the single place numeric fields are parsed.
pub fn parse_amount(raw: &str) -> Option<f64> {
    let cleaned = raw.trim().replace(',', "");
    if cleaned.is_empty() {
        return None;
    }
    cleaned.parse::<f64>().ok()
}

/// Parse a statement date in DD/MM/YYYY form.
pub fn parse_statement_date(raw: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(raw.trim(), "%d/%m/%Y").ok()
}

/// Parse a date of birth written out as "7 March 1992".
pub fn parse_date_of_birth(raw: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(raw.trim(), "%d %B %Y").ok()
}

/// Pick the transaction amount from the two captured statement values.
///
/// Inherited statement-format policy: when both values are positive one of
/// them is an incidental secondary figure, and the smaller one is the
/// transaction amount. When exactly one is positive, that one is the
/// amount. Neither positive yields 0.0.
pub fn pick_transaction_amount(first: f64, second: f64) -> f64 {
    if first > 0.0 && second > 0.0 {
        first.min(second)
    } else if first > 0.0 {
        first
    } else if second > 0.0 {
        second
    } else {
        0.0
    }
}
