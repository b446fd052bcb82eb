//! Rate source trait and the payload it returns.

use async_trait::async_trait;
use ratekeeper_common::{CurrencyCode, CurrencySnapshot};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::warn;

use crate::error::{FxError, FxResult};

/// Raw answer of a rate source: rates against an echoed base.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RatesPayload {
    /// Base the source says it priced against.
    pub base: CurrencyCode,
    /// Rate per currency code.
    pub rates: HashMap<CurrencyCode, f64>,
}

impl RatesPayload {
    /// Create a new payload.
    pub fn new(base: CurrencyCode, rates: impl IntoIterator<Item = (CurrencyCode, f64)>) -> Self {
        Self {
            base,
            rates: rates.into_iter().collect(),
        }
    }

    /// Validate the payload and stamp it as a snapshot for `requested`.
    ///
    /// The snapshot carries the base the fetch was issued for; an echoed
    /// base that differs is logged and otherwise ignored.
    pub fn into_snapshot(
        self,
        requested: &CurrencyCode,
        date: impl Into<String>,
    ) -> FxResult<CurrencySnapshot> {
        if self.base != *requested {
            warn!(
                requested = %requested,
                echoed = %self.base,
                "Rate source echoed a different base"
            );
        }

        Ok(CurrencySnapshot::new(requested.clone(), self.rates, date)?)
    }
}

/// Remote service that prices every currency against a base.
#[async_trait]
pub trait RateSource: Send + Sync {
    /// Get the source name.
    fn name(&self) -> &str;

    /// Fetch a fresh rate payload for `base`.
    async fn fetch(&self, base: &CurrencyCode) -> FxResult<RatesPayload>;

    /// Check if this source prices the given currency.
    fn supports_currency(&self, _code: &CurrencyCode) -> bool {
        true
    }
}

/// Scripted rate source for testing.
#[cfg(any(test, feature = "test-utils"))]
pub struct MockRateSource {
    name: String,
    rates: dashmap::DashMap<CurrencyCode, RatesPayload>,
    unsupported: dashmap::DashSet<CurrencyCode>,
    offline: std::sync::atomic::AtomicBool,
    paused: std::sync::atomic::AtomicBool,
    gate: tokio::sync::Semaphore,
    fetches: std::sync::atomic::AtomicUsize,
    requested: parking_lot::Mutex<Vec<CurrencyCode>>,
}

#[cfg(any(test, feature = "test-utils"))]
impl MockRateSource {
    /// Create a new mock source with no rates.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            rates: dashmap::DashMap::new(),
            unsupported: dashmap::DashSet::new(),
            offline: std::sync::atomic::AtomicBool::new(false),
            paused: std::sync::atomic::AtomicBool::new(false),
            gate: tokio::sync::Semaphore::new(0),
            fetches: std::sync::atomic::AtomicUsize::new(0),
            requested: parking_lot::Mutex::new(Vec::new()),
        }
    }

    /// Set the payload returned for a base.
    pub fn set_rates(&self, base: CurrencyCode, rates: Vec<(CurrencyCode, f64)>) {
        self.rates.insert(base.clone(), RatesPayload::new(base, rates));
    }

    /// Make every fetch fail with a network error.
    pub fn set_offline(&self, offline: bool) {
        self.offline
            .store(offline, std::sync::atomic::Ordering::SeqCst);
    }

    /// Report a currency as unsupported.
    pub fn mark_unsupported(&self, code: CurrencyCode) {
        self.unsupported.insert(code);
    }

    /// Hold fetches until `release` is called.
    pub fn pause(&self) {
        self.paused.store(true, std::sync::atomic::Ordering::SeqCst);
    }

    /// Let one held fetch proceed.
    pub fn release(&self) {
        self.gate.add_permits(1);
    }

    /// Number of fetches issued so far.
    pub fn fetch_count(&self) -> usize {
        self.fetches.load(std::sync::atomic::Ordering::SeqCst)
    }

    /// Bases requested, in order.
    pub fn requested(&self) -> Vec<CurrencyCode> {
        self.requested.lock().clone()
    }
}

#[cfg(any(test, feature = "test-utils"))]
#[async_trait]
impl RateSource for MockRateSource {
    fn name(&self) -> &str {
        &self.name
    }

    async fn fetch(&self, base: &CurrencyCode) -> FxResult<RatesPayload> {
        self.fetches
            .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        self.requested.lock().push(base.clone());

        if self.paused.load(std::sync::atomic::Ordering::SeqCst) {
            if let Ok(permit) = self.gate.acquire().await {
                permit.forget();
            }
        }

        if self.offline.load(std::sync::atomic::Ordering::SeqCst) {
            return Err(FxError::Network(format!("{} is offline", self.name)));
        }

        self.rates
            .get(base)
            .map(|r| r.clone())
            .ok_or_else(|| FxError::RateNotAvailable(base.clone()))
    }

    fn supports_currency(&self, code: &CurrencyCode) -> bool {
        !self.unsupported.contains(code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ratekeeper_common::ConverterError;

    #[tokio::test]
    async fn test_mock_source() {
        let source = MockRateSource::new("test");
        source.set_rates(CurrencyCode::usd(), vec![(CurrencyCode::eur(), 0.9)]);

        let payload = source.fetch(&CurrencyCode::usd()).await.unwrap();

        assert_eq!(payload.base, CurrencyCode::usd());
        assert_eq!(payload.rates.get(&CurrencyCode::eur()), Some(&0.9));
        assert_eq!(source.fetch_count(), 1);
    }

    #[tokio::test]
    async fn test_mock_offline() {
        let source = MockRateSource::new("test");
        source.set_rates(CurrencyCode::usd(), vec![(CurrencyCode::eur(), 0.9)]);
        source.set_offline(true);

        let result = source.fetch(&CurrencyCode::usd()).await;

        assert!(matches!(result, Err(FxError::Network(_))));
        assert!(result.unwrap_err().is_retryable());
    }

    #[test]
    fn test_into_snapshot_uses_requested_base() {
        let payload = RatesPayload::new(CurrencyCode::eur(), vec![(CurrencyCode::gbp(), 0.85)]);
        let snapshot = payload
            .into_snapshot(&CurrencyCode::usd(), "10:00:00 01.01.2024")
            .unwrap();

        assert_eq!(snapshot.base(), &CurrencyCode::usd());
        assert_eq!(snapshot.date(), "10:00:00 01.01.2024");
    }

    #[test]
    fn test_into_snapshot_rejects_bad_rates() {
        let payload = RatesPayload::new(CurrencyCode::usd(), vec![(CurrencyCode::eur(), -1.0)]);
        let result = payload.into_snapshot(&CurrencyCode::usd(), "");

        assert!(matches!(result, Err(FxError::InvalidPayload(_))));

        let converted: FxError = ConverterError::EmptySnapshot("USD".to_string()).into();
        assert!(!converted.is_retryable());
    }

    #[test]
    fn test_payload_wire_shape() {
        let json = r#"{"base":"USD","rates":{"EUR":0.9,"GBP":0.8}}"#;
        let payload: RatesPayload = serde_json::from_str(json).unwrap();

        assert_eq!(payload.base, CurrencyCode::usd());
        assert_eq!(payload.rates.len(), 2);
    }
}
