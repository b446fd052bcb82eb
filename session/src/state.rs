//! Observable converter state.

use std::fmt;
use std::sync::Arc;

use ratekeeper_common::CurrencySnapshot;

/// State published to observers after every transition.
#[derive(Debug, Clone, PartialEq)]
pub enum ConverterState {
    /// A fetch is outstanding.
    Loading,
    /// Rates come from a fresh fetch or the held snapshot.
    Success(Arc<CurrencySnapshot>),
    /// The fetch failed and rates come from the offline cache.
    OfflineSuccess(Arc<CurrencySnapshot>),
    /// The fetch failed and nothing was cached for the base.
    Error,
    /// Not enough active currencies to convert between.
    FewCurrency,
    /// The formatted result of this input was too long to display.
    MaximumInput(String),
}

impl ConverterState {
    /// Check if this state ends a fetch attempt.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ConverterState::Success(_) | ConverterState::OfflineSuccess(_) | ConverterState::Error
        )
    }

    /// Snapshot carried by the state, if any.
    pub fn snapshot(&self) -> Option<&Arc<CurrencySnapshot>> {
        match self {
            ConverterState::Success(s) | ConverterState::OfflineSuccess(s) => Some(s),
            _ => None,
        }
    }

    /// Short name for logs and tallies.
    pub fn name(&self) -> &'static str {
        match self {
            ConverterState::Loading => "loading",
            ConverterState::Success(_) => "success",
            ConverterState::OfflineSuccess(_) => "offline_success",
            ConverterState::Error => "error",
            ConverterState::FewCurrency => "few_currency",
            ConverterState::MaximumInput(_) => "maximum_input",
        }
    }
}

impl fmt::Display for ConverterState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConverterState::Success(s) | ConverterState::OfflineSuccess(s) => {
                write!(f, "{} ({} @ {})", self.name(), s.base(), s.date())
            }
            ConverterState::MaximumInput(input) => write!(f, "{} ({:?})", self.name(), input),
            _ => f.write_str(self.name()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ratekeeper_common::CurrencyCode;

    #[test]
    fn test_terminal_states() {
        let snapshot = Arc::new(
            CurrencySnapshot::new(CurrencyCode::usd(), vec![(CurrencyCode::eur(), 0.9)], "now")
                .unwrap(),
        );

        assert!(!ConverterState::Loading.is_terminal());
        assert!(ConverterState::Success(snapshot.clone()).is_terminal());
        assert!(ConverterState::OfflineSuccess(snapshot.clone()).is_terminal());
        assert!(ConverterState::Error.is_terminal());
        assert!(!ConverterState::FewCurrency.is_terminal());

        assert_eq!(
            ConverterState::OfflineSuccess(snapshot.clone()).snapshot(),
            Some(&snapshot)
        );
        assert_eq!(
            ConverterState::Success(snapshot).to_string(),
            "success (USD @ now)"
        );
    }
}
