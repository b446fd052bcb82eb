//! Conversion of the displayed output into each active currency.

use ratekeeper_common::{CurrencyCode, CurrencySnapshot};
use tracing::warn;

use crate::error::ConversionError;
use crate::format::GROUPING_SEPARATOR;
use crate::normalize::normalize_amount;

fn parse_finite(text: &str) -> Option<f64> {
    text.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Parse an output amount, normalizing and retrying exactly once.
///
/// The first attempt takes the text as is, minus the grouping separator
/// that formatted output carries. If that fails, separators,
/// stray symbols, and non-ASCII digits are normalized and the parse is
/// retried; a second failure is returned to the caller.
pub fn parse_amount(raw: &str) -> Result<f64, ConversionError> {
    let ungrouped: String = raw.chars().filter(|c| *c != GROUPING_SEPARATOR).collect();
    if let Some(value) = parse_finite(&ungrouped) {
        return Ok(value);
    }

    let normalized = normalize_amount(raw);
    warn!(raw = %raw, normalized = %normalized, "Amount did not parse, retrying normalized");

    parse_finite(&normalized).ok_or(ConversionError::InvalidNumber {
        raw: raw.to_string(),
        normalized,
    })
}

/// Convert `raw_output`, an amount in the snapshot's base, into `target`.
///
/// Computes `amount / rate(base) * rate(target)`; the base rate is 1.0
/// unless the snapshot says otherwise. An empty output converts to 0.0.
/// The function has no side effects, so one failing currency never
/// affects the others in a recalculation pass.
pub fn convert(
    raw_output: &str,
    target: &CurrencyCode,
    snapshot: &CurrencySnapshot,
) -> Result<f64, ConversionError> {
    if raw_output.is_empty() {
        return Ok(0.0);
    }

    let amount = parse_amount(raw_output)?;
    let base_rate = snapshot.rate(snapshot.base()).unwrap_or(1.0);
    let target_rate = snapshot
        .rate(target)
        .ok_or_else(|| ConversionError::UnknownCurrency(target.clone()))?;

    let converted = amount / base_rate * target_rate;
    if !converted.is_finite() {
        return Err(ConversionError::NotFinite(target.clone()));
    }
    Ok(converted)
}
