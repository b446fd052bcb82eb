//! FX error types.

use ratekeeper_common::{ConverterError, CurrencyCode};
use thiserror::Error;

/// Errors raised by rate sources and caches.
#[derive(Debug, Error)]
pub enum FxError {
    /// The rate source could not be reached or answered with a failure.
    #[error("Network error: {0}")]
    Network(String),

    /// The rate source answered, but the payload was unusable.
    #[error("Invalid rate payload: {0}")]
    InvalidPayload(String),

    /// Rate not available for the requested base.
    #[error("Rate not available for {0}")]
    RateNotAvailable(CurrencyCode),

    /// Offline cache read or write failed.
    #[error("Cache error: {0}")]
    Cache(String),
}

impl FxError {
    /// Check if a later attempt may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, FxError::Network(_) | FxError::Cache(_))
    }
}

impl From<ConverterError> for FxError {
    fn from(e: ConverterError) -> Self {
        FxError::InvalidPayload(e.to_string())
    }
}

impl From<std::io::Error> for FxError {
    fn from(e: std::io::Error) -> Self {
        FxError::Cache(e.to_string())
    }
}

impl From<serde_json::Error> for FxError {
    fn from(e: serde_json::Error) -> Self {
        FxError::Cache(e.to_string())
    }
}

/// Result type for FX operations.
pub type FxResult<T> = Result<T, FxError>;

/// Errors from evaluating the user's arithmetic input.
///
/// None of these are fatal: callers treat them as "no output".
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EvaluationError {
    /// Nothing to evaluate.
    #[error("Empty expression")]
    Empty,

    /// A character the grammar does not accept.
    #[error("Unexpected character {found:?} at {position}")]
    UnexpectedCharacter { found: char, position: usize },

    /// The expression ended where an operand was required.
    #[error("Unexpected end of expression")]
    UnexpectedEnd,

    /// Parentheses do not pair up.
    #[error("Unbalanced parenthesis at {0}")]
    UnbalancedParenthesis(usize),

    /// The result is NaN or infinite, e.g. division by zero.
    #[error("Result is not a finite number")]
    NotFinite,
}

/// Errors from converting an output amount into a target currency.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConversionError {
    /// The amount did not parse, even after normalization.
    #[error("Cannot parse {raw:?} as a number (normalized to {normalized:?})")]
    InvalidNumber { raw: String, normalized: String },

    /// The snapshot has no rate for the currency.
    #[error("No rate for {0}")]
    UnknownCurrency(CurrencyCode),

    /// The converted amount overflowed.
    #[error("Converted amount for {0} is not finite")]
    NotFinite(CurrencyCode),
}
