//! Per-session preferences passed explicitly into a session.

use ratekeeper_common::CurrencyCode;

/// Preferences one converter session works against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionContext {
    /// Base currency of the session; unset until the user picks one.
    pub current_base: Option<CurrencyCode>,
    /// Seed the currency store on the next data refresh.
    pub first_run: bool,
}

impl SessionContext {
    /// A first-run context with no base selected.
    pub fn new() -> Self {
        Self {
            current_base: None,
            first_run: true,
        }
    }

    /// Start from a known base.
    pub fn with_base(mut self, base: CurrencyCode) -> Self {
        self.current_base = Some(base);
        self
    }

    /// Mark the store as already seeded.
    pub fn seeded(mut self) -> Self {
        self.first_run = false;
        self
    }
}

impl Default for SessionContext {
    fn default() -> Self {
        Self::new()
    }
}
