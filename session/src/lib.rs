//! Ratekeeper Session
//!
//! A converter session turns raw user input into per-currency amounts. It
//! resolves rates with a live-then-cached-then-error ladder, keeps at most
//! one fetch in flight per base, and publishes every state transition to
//! its observers in order.

pub mod config;
pub mod context;
pub mod metrics;
pub mod policy;
pub mod session;
pub mod state;
pub mod store;

pub use config::SessionConfig;
pub use context::SessionContext;
pub use metrics::{MetricsSnapshot, SessionMetrics};
pub use policy::{FetchTicket, PolicyPhase, RateResolutionPolicy, ResolutionStep};
pub use session::{CalculationOutcome, ConverterSession, Resolution, INITIAL_OUTPUT};
pub use state::ConverterState;
pub use store::{CurrencyStore, InMemoryCurrencyStore};
