//! Output formatting for evaluated amounts.

/// Maximum fraction digits kept in a formatted output.
pub const FRACTION_DIGITS: usize = 3;

/// Separator inserted between groups of three integer digits.
pub const GROUPING_SEPARATOR: char = ' ';

/// Render an amount in the fixed `###,###.###` layout.
///
/// At most three fraction digits are kept, trailing zeros are dropped,
/// and integer digits are grouped in threes with a space: `1234.5`
/// renders as `"1 234.5"`, `4.0` as `"4"`.
pub fn format_output(value: f64) -> String {
    let fixed = format!("{:.*}", FRACTION_DIGITS, value.abs());
    let (integer, fraction) = match fixed.split_once('.') {
        Some((i, f)) => (i, f.trim_end_matches('0')),
        None => (fixed.as_str(), ""),
    };

    let mut out = String::with_capacity(fixed.len() + fixed.len() / 3 + 1);
    let negative = value < 0.0 && (integer != "0" || !fraction.is_empty());
    if negative {
        out.push('-');
    }

    let digits = integer.len();
    for (i, c) in integer.chars().enumerate() {
        if i > 0 && (digits - i) % 3 == 0 {
            out.push(GROUPING_SEPARATOR);
        }
        out.push(c);
    }

    if !fraction.is_empty() {
        out.push('.');
        out.push_str(fraction);
    }

    out
}

/// Length of a formatted output as the user sees it.
pub fn display_len(formatted: &str) -> usize {
    formatted.chars().count()
}
