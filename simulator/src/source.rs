//! Simulated rate source.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, info};

use ratekeeper_common::CurrencyCode;
use ratekeeper_fx::{FxError, FxResult, RateSource, RatesPayload};

/// Units of each currency per US dollar.
const REFERENCE_RATES: &[(&str, f64)] = &[
    ("USD", 1.0),
    ("EUR", 0.92),
    ("GBP", 0.79),
    ("CHF", 0.88),
    ("JPY", 149.5),
    ("TRY", 32.1),
    ("CAD", 1.36),
    ("AUD", 1.52),
    ("NZD", 1.64),
    ("CNY", 7.19),
    ("HKD", 7.82),
    ("SGD", 1.34),
    ("SEK", 10.4),
    ("NOK", 10.6),
    ("DKK", 6.87),
    ("PLN", 3.98),
    ("CZK", 23.1),
    ("HUF", 358.0),
    ("RUB", 91.5),
    ("INR", 83.1),
    ("BRL", 4.97),
    ("MXN", 17.1),
    ("ZAR", 18.9),
    ("KRW", 1331.0),
];

/// Rate source that prices a fixed table with random jitter.
///
/// Retired currencies (BYR, LTL) are not priced, so sessions drop them.
pub struct SimulatedRateSource {
    table: HashMap<CurrencyCode, f64>,
    rng: Mutex<StdRng>,
    jitter: f64,
    failure_rate: f64,
    latency: Duration,
    offline: AtomicBool,
    fetches: AtomicU64,
}

impl SimulatedRateSource {
    /// Create a source. `seed` makes jitter and failures reproducible.
    pub fn new(seed: Option<u64>, failure_rate: f64) -> Self {
        let rng = match seed {
            Some(s) => StdRng::seed_from_u64(s),
            None => StdRng::from_entropy(),
        };

        Self {
            table: REFERENCE_RATES
                .iter()
                .map(|(code, rate)| (CurrencyCode::new(*code), *rate))
                .collect(),
            rng: Mutex::new(rng),
            jitter: 0.005,
            failure_rate: failure_rate.clamp(0.0, 1.0),
            latency: Duration::from_millis(150),
            offline: AtomicBool::new(false),
            fetches: AtomicU64::new(0),
        }
    }

    /// Set the simulated round trip.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Set the relative jitter applied to every rate.
    pub fn with_jitter(mut self, jitter: f64) -> Self {
        self.jitter = jitter.abs().min(0.5);
        self
    }

    /// Take the source offline or bring it back.
    pub fn set_offline(&self, offline: bool) {
        info!(offline, "Simulated rate source connectivity changed");
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Check if the source is offline.
    pub fn is_offline(&self) -> bool {
        self.offline.load(Ordering::SeqCst)
    }

    /// Number of fetches served or failed.
    pub fn fetch_count(&self) -> u64 {
        self.fetches.load(Ordering::Relaxed)
    }

    /// Jittered table against `base_rate`, or `None` when this fetch should fail.
    fn roll(&self, base_rate: f64) -> Option<Vec<(CurrencyCode, f64)>> {
        let mut rng = self.rng.lock();

        if self.failure_rate > 0.0 && rng.gen_bool(self.failure_rate) {
            return None;
        }

        Some(self
            .table
            .iter()
            .map(|(code, rate)| {
                let factor = if self.jitter > 0.0 {
                    1.0 + rng.gen_range(-self.jitter..=self.jitter)
                } else {
                    1.0
                };
                (code.clone(), rate / base_rate * factor)
            })
            .collect())
    }
}

#[async_trait]
impl RateSource for SimulatedRateSource {
    fn name(&self) -> &str {
        "simulated"
    }

    async fn fetch(&self, base: &CurrencyCode) -> FxResult<RatesPayload> {
        self.fetches.fetch_add(1, Ordering::Relaxed);
        tokio::time::sleep(self.latency).await;

        if self.is_offline() {
            return Err(FxError::Network("simulated source is offline".to_string()));
        }

        let base_rate = *self
            .table
            .get(base)
            .ok_or_else(|| FxError::RateNotAvailable(base.clone()))?;

        let rates = self
            .roll(base_rate)
            .ok_or_else(|| FxError::Network("simulated transient failure".to_string()))?;

        debug!(base = %base, rates = rates.len(), "Simulated rates generated");
        Ok(RatesPayload::new(base.clone(), rates))
    }

    fn supports_currency(&self, code: &CurrencyCode) -> bool {
        self.table.contains_key(code)
    }
}
