//! Immutable exchange-rate snapshots.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::currency::CurrencyCode;
use crate::error::{ConverterError, Result};

/// A set of exchange rates fetched or cached together.
///
/// Every rate is relative to `base`. Rates are validated on construction
/// and the fields are private, so a snapshot never changes after it has
/// been built; an update replaces the whole snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawSnapshot")]
pub struct CurrencySnapshot {
    base: CurrencyCode,
    date: String,
    rates: BTreeMap<CurrencyCode, f64>,
}

/// Unvalidated wire form; deserialization goes through [`CurrencySnapshot::new`].
#[derive(Deserialize)]
struct RawSnapshot {
    base: CurrencyCode,
    date: String,
    rates: BTreeMap<CurrencyCode, f64>,
}

impl TryFrom<RawSnapshot> for CurrencySnapshot {
    type Error = ConverterError;

    fn try_from(raw: RawSnapshot) -> Result<Self> {
        Self::new(raw.base, raw.rates, raw.date)
    }
}

impl CurrencySnapshot {
    /// Build a snapshot, rejecting zero, negative, and non-finite rates.
    pub fn new(
        base: CurrencyCode,
        rates: impl IntoIterator<Item = (CurrencyCode, f64)>,
        date: impl Into<String>,
    ) -> Result<Self> {
        let mut validated = BTreeMap::new();
        for (code, rate) in rates {
            if !rate.is_finite() || rate <= 0.0 {
                return Err(ConverterError::InvalidRate {
                    code: code.to_string(),
                    rate,
                });
            }
            validated.insert(code, rate);
        }

        if validated.is_empty() {
            return Err(ConverterError::EmptySnapshot(base.to_string()));
        }

        Ok(Self {
            base,
            date: date.into(),
            rates: validated,
        })
    }

    /// Currency all rates are expressed against.
    pub fn base(&self) -> &CurrencyCode {
        &self.base
    }

    /// Timestamp stamped when the snapshot was fetched.
    pub fn date(&self) -> &str {
        &self.date
    }

    /// Rate of `code` relative to the base.
    ///
    /// The base itself is 1.0 even when the payload omitted it.
    pub fn rate(&self, code: &CurrencyCode) -> Option<f64> {
        match self.rates.get(code) {
            Some(rate) => Some(*rate),
            None if *code == self.base => Some(1.0),
            None => None,
        }
    }

    /// All rates, ordered by code.
    pub fn rates(&self) -> &BTreeMap<CurrencyCode, f64> {
        &self.rates
    }

    /// Number of currencies carried.
    pub fn len(&self) -> usize {
        self.rates.len()
    }

    /// Check if the snapshot carries no rates.
    pub fn is_empty(&self) -> bool {
        self.rates.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn usd_snapshot() -> CurrencySnapshot {
        CurrencySnapshot::new(
            CurrencyCode::usd(),
            vec![(CurrencyCode::eur(), 0.9), (CurrencyCode::gbp(), 0.8)],
            "12:00:00 01.02.2024",
        )
        .unwrap()
    }

    #[test]
    fn test_rate_lookup() {
        let snapshot = usd_snapshot();

        assert_eq!(snapshot.rate(&CurrencyCode::eur()), Some(0.9));
        assert_eq!(snapshot.rate(&CurrencyCode::jpy()), None);
        assert_eq!(snapshot.len(), 2);
    }

    #[test]
    fn test_base_is_implicitly_one() {
        let snapshot = usd_snapshot();
        assert_eq!(snapshot.rate(&CurrencyCode::usd()), Some(1.0));
    }

    #[test]
    fn test_rejects_invalid_rates() {
        for bad in [0.0, -1.0, f64::NAN, f64::INFINITY] {
            let result = CurrencySnapshot::new(
                CurrencyCode::usd(),
                vec![(CurrencyCode::eur(), bad)],
                "",
            );
            assert!(matches!(result, Err(ConverterError::InvalidRate { .. })));
        }
    }

    #[test]
    fn test_rejects_empty() {
        let result = CurrencySnapshot::new(CurrencyCode::usd(), Vec::new(), "");
        assert!(matches!(result, Err(ConverterError::EmptySnapshot(_))));
    }

    #[test]
    fn test_json_shape() {
        let snapshot = usd_snapshot();
        let json = serde_json::to_value(&snapshot).unwrap();

        assert_eq!(json["base"], "USD");
        assert_eq!(json["rates"]["EUR"], 0.9);

        let back: CurrencySnapshot = serde_json::from_value(json).unwrap();
        assert_eq!(back, snapshot);
    }

    #[test]
    fn test_deserialize_validates_rates() {
        let negative = r#"{"base":"USD","date":"x","rates":{"USD":0.0,"EUR":-2.0}}"#;
        assert!(serde_json::from_str::<CurrencySnapshot>(negative).is_err());

        let empty = r#"{"base":"USD","date":"x","rates":{}}"#;
        assert!(serde_json::from_str::<CurrencySnapshot>(empty).is_err());

        let lower = r#"{"base":"usd","date":"x","rates":{"eur":0.9}}"#;
        let snapshot: CurrencySnapshot = serde_json::from_str(lower).unwrap();
        assert_eq!(snapshot.rate(&CurrencyCode::eur()), Some(0.9));
    }
}
