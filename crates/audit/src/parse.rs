//! Numeric field parsing shared by every check.
//!
//! Source tables carry raw text; a field is only ever read as a number
//! through these functions, so blank vs malformed is decided in one place.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct NumberFormat {
    /// `.` or `,`. The other character is taken as a thousands separator.
    pub decimal_separator: char,
    /// Stripped before parsing, e.g. `€`, `$`, `EUR`.
    pub currency_symbols: Vec<String>,
}

impl Default for NumberFormat {
    fn default() -> Self {
        Self {
            decimal_separator: '.',
            currency_symbols: ["€", "$", "£", "EUR", "USD", "GBP"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

/// Outcome of reading one raw field as a number.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Parsed {
    Blank,
    Number(f64),
    Invalid,
}

impl Parsed {
    pub fn value(self) -> Option<f64> {
        match self {
            Parsed::Number(v) => Some(v),
            Parsed::Blank | Parsed::Invalid => None,
        }
    }
}

pub fn is_blank(raw: &str) -> bool {
    raw.trim().is_empty()
}

/// Parse a quantity or money field:
/// - Strip configured currency symbols and whitespace (including NBSP)
/// - Handle `(12.50)` → `-12.50`
/// - Thousands separators are dropped; a lone opposite separator that is
///   not followed by exactly three digits is read as the decimal point
///   (`8,05` → 8.05 under a `.` locale, `1,250` → 1250, `0,125` → 0.125)
pub fn parse_number(raw: &str, format: &NumberFormat) -> Parsed {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Parsed::Blank;
    }

    let (is_negative, inner) = if trimmed.starts_with('(') && trimmed.ends_with(')') {
        (true, &trimmed[1..trimmed.len() - 1])
    } else {
        (false, trimmed)
    };

    let mut stripped = inner.to_string();
    for symbol in &format.currency_symbols {
        if !symbol.is_empty() {
            stripped = stripped.replace(symbol.as_str(), "");
        }
    }
    let stripped: String = stripped
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '\u{a0}')
        .collect();
    if stripped.is_empty() {
        return Parsed::Invalid;
    }

    let decimal = format.decimal_separator;
    let other = if decimal == ',' { '.' } else { ',' };
    let normalized = if !stripped.contains(decimal) && stripped.matches(other).count() == 1 {
        let (before, after) = stripped.split_once(other).unwrap_or((stripped.as_str(), ""));
        // `0,125` is a fraction; no one groups thousands of zero
        let integer = before.trim_start_matches(['-', '+']);
        let zero_integer = integer.chars().all(|c| c == '0');
        if !zero_integer && after.len() == 3 && after.chars().all(|c| c.is_ascii_digit()) {
            stripped.replace(other, "")
        } else {
            stripped.replace(other, ".")
        }
    } else {
        stripped.replace(other, "").replace(decimal, ".")
    };

    for (i, c) in normalized.chars().enumerate() {
        match c {
            '0'..='9' | '.' => {}
            '-' | '+' if i == 0 && !is_negative => {}
            _ => return Parsed::Invalid,
        }
    }

    match normalized.parse::<f64>() {
        Ok(v) if v.is_finite() => Parsed::Number(if is_negative { -v } else { v }),
        _ => Parsed::Invalid,
    }
}

/// Tax rates are percentages: `20%`, `20` and `20,0 %` all read as 0.20.
pub fn parse_percentage(raw: &str, format: &NumberFormat) -> Parsed {
    let without_sign = raw.replace('%', "");
    if is_blank(&without_sign) && !is_blank(raw) {
        return Parsed::Invalid;
    }
    match parse_number(&without_sign, format) {
        Parsed::Number(v) => Parsed::Number(v / 100.0),
        other => other,
    }
}

/// Supplier codes are identifiers that must be all digits (leading zeros kept).
pub fn is_numeric_code(raw: &str) -> bool {
    let trimmed = raw.trim();
    !trimmed.is_empty() && trimmed.chars().all(|c| c.is_ascii_digit())
}
