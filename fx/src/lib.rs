//! Ratekeeper FX
//!
//! Rate math and rate collaborators for the converter session.
//!
//! # Features
//!
//! - Arithmetic expression evaluation for the user's raw input
//! - Fixed output formatting with a length bound
//! - Base-pivot conversion with a single normalization retry
//! - Rate source and offline cache abstractions with in-memory and
//!   JSON-file caches
//!
//! # Example
//!
//! ```rust,ignore
//! use ratekeeper_fx::{convert, evaluate, format_output};
//!
//! let value = evaluate("2+2")?;
//! let output = format_output(value);
//! let eur = convert(&output, &CurrencyCode::eur(), &snapshot)?;
//! ```

pub mod cache;
pub mod conversion;
pub mod error;
pub mod expression;
pub mod format;
pub mod normalize;
pub mod provider;

pub use cache::{FileRateCache, InMemoryRateCache, RateCache};
pub use conversion::{convert, parse_amount};
pub use error::{ConversionError, EvaluationError, FxError, FxResult};
pub use expression::evaluate;
pub use format::format_output;
pub use provider::{RateSource, RatesPayload};

#[cfg(any(test, feature = "test-utils"))]
pub use provider::MockRateSource;
