//! Currency codes and the per-currency display entries.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{ConverterError, Result};

/// ISO 4217 currency code.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String")]
pub struct CurrencyCode(String);

impl CurrencyCode {
    /// Create a new currency code, normalized to upper case.
    pub fn new(code: impl Into<String>) -> Self {
        Self(code.into().trim().to_uppercase())
    }

    /// Parse a user-supplied code, rejecting anything that is not three letters.
    pub fn parse(code: &str) -> Result<Self> {
        let trimmed = code.trim();
        if trimmed.len() == 3 && trimmed.chars().all(|c| c.is_ascii_alphabetic()) {
            Ok(Self::new(trimmed))
        } else {
            Err(ConverterError::InvalidCurrencyCode(code.to_string()))
        }
    }

    /// Get the currency code.
    pub fn code(&self) -> &str {
        &self.0
    }

    /// Common currencies
    pub fn usd() -> Self {
        Self::new("USD")
    }

    pub fn eur() -> Self {
        Self::new("EUR")
    }

    pub fn gbp() -> Self {
        Self::new("GBP")
    }

    pub fn jpy() -> Self {
        Self::new("JPY")
    }
}

impl fmt::Display for CurrencyCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for CurrencyCode {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl FromStr for CurrencyCode {
    type Err = ConverterError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

/// A currency as shown in the converter list.
///
/// `rate` is transient: it holds the last computed equivalent of the
/// current output in this currency and is rewritten after every
/// calculation pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurrencyEntry {
    /// Currency code, also the key into a snapshot.
    pub name: CurrencyCode,
    /// Human readable name.
    pub long_name: String,
    /// Display symbol.
    pub symbol: String,
    /// Selected by the user for display and calculation.
    pub is_active: bool,
    /// Last computed equivalent amount.
    #[serde(default)]
    pub rate: f64,
}

impl CurrencyEntry {
    /// Create a new entry with a zero rate.
    pub fn new(
        name: impl Into<CurrencyCode>,
        long_name: impl Into<String>,
        symbol: impl Into<String>,
        is_active: bool,
    ) -> Self {
        Self {
            name: name.into(),
            long_name: long_name.into(),
            symbol: symbol.into(),
            is_active,
            rate: 0.0,
        }
    }
}

impl From<String> for CurrencyCode {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

/// Currencies seeded into the store on first run.
const INITIAL_CURRENCIES: &[(&str, &str, &str, bool)] = &[
    ("EUR", "Euro", "€", true),
    ("USD", "United States Dollar", "$", true),
    ("GBP", "British Pound", "£", true),
    ("CHF", "Swiss Franc", "Fr", true),
    ("JPY", "Japanese Yen", "¥", true),
    ("TRY", "Turkish Lira", "₺", true),
    ("CAD", "Canadian Dollar", "$", false),
    ("AUD", "Australian Dollar", "$", false),
    ("NZD", "New Zealand Dollar", "$", false),
    ("CNY", "Chinese Yuan", "¥", false),
    ("HKD", "Hong Kong Dollar", "$", false),
    ("SGD", "Singapore Dollar", "$", false),
    ("SEK", "Swedish Krona", "kr", false),
    ("NOK", "Norwegian Krone", "kr", false),
    ("DKK", "Danish Krone", "kr", false),
    ("PLN", "Polish Zloty", "zł", false),
    ("CZK", "Czech Koruna", "Kč", false),
    ("HUF", "Hungarian Forint", "Ft", false),
    ("RUB", "Russian Ruble", "₽", false),
    ("INR", "Indian Rupee", "₹", false),
    ("BRL", "Brazilian Real", "R$", false),
    ("MXN", "Mexican Peso", "$", false),
    ("ZAR", "South African Rand", "R", false),
    ("KRW", "South Korean Won", "₩", false),
    ("BYR", "Belarusian Ruble (2000)", "Br", false),
    ("LTL", "Lithuanian Litas", "Lt", false),
];

/// Build the fixed initial currency catalogue.
pub fn initial_currencies() -> Vec<CurrencyEntry> {
    INITIAL_CURRENCIES
        .iter()
        .map(|(code, name, symbol, active)| CurrencyEntry::new(*code, *name, *symbol, *active))
        .collect()
}
