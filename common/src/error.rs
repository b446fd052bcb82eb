//! Error types for the Ratekeeper data model.

use thiserror::Error;

/// Errors raised while building or looking up model values.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConverterError {
    /// A currency code was not three ASCII letters.
    #[error("Invalid currency code: {0:?}")]
    InvalidCurrencyCode(String),

    /// A rate was zero, negative, or not finite.
    #[error("Invalid rate {rate} for {code}")]
    InvalidRate { code: String, rate: f64 },

    /// A snapshot carried no rates at all.
    #[error("Snapshot for {0} contains no rates")]
    EmptySnapshot(String),

    /// The currency store could not satisfy a request.
    #[error("Currency store error: {0}")]
    Store(String),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Configuration(String),
}

/// Result type alias for model operations.
pub type Result<T> = std::result::Result<T, ConverterError>;
