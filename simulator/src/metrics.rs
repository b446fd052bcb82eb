//! Simulation metrics.

use std::collections::{BTreeMap, VecDeque};

use ratekeeper_session::ConverterState;

/// Simulation metrics.
#[derive(Debug, Clone)]
pub struct SimulationMetrics {
    /// Steps executed.
    pub steps: u64,
    /// Assertions that held.
    pub assertions_passed: u64,
    /// Assertions that did not hold.
    pub assertions_failed: u64,
    /// Observed states by name.
    states: BTreeMap<&'static str, u64>,
    /// Latency samples (ms) of steps that waited on a fetch.
    latency_samples: VecDeque<u64>,
    /// Maximum samples to keep.
    max_samples: usize,
}

impl SimulationMetrics {
    /// Create new metrics.
    pub fn new() -> Self {
        Self {
            steps: 0,
            assertions_passed: 0,
            assertions_failed: 0,
            states: BTreeMap::new(),
            latency_samples: VecDeque::with_capacity(10000),
            max_samples: 10000,
        }
    }

    /// Record one observed state.
    pub fn record_state(&mut self, state: &ConverterState) {
        *self.states.entry(state.name()).or_insert(0) += 1;
    }

    /// Record a step that waited on a fetch.
    pub fn record_fetch(&mut self, latency_ms: u64) {
        if self.latency_samples.len() >= self.max_samples {
            self.latency_samples.pop_front();
        }
        self.latency_samples.push_back(latency_ms);
    }

    /// Record an assertion outcome.
    pub fn record_assertion(&mut self, passed: bool) {
        if passed {
            self.assertions_passed += 1;
        } else {
            self.assertions_failed += 1;
        }
    }

    /// Times a state with this name was observed.
    pub fn state_count(&self, name: &str) -> u64 {
        self.states.get(name).copied().unwrap_or(0)
    }

    /// Observed state counts, by name.
    pub fn states(&self) -> impl Iterator<Item = (&'static str, u64)> + '_ {
        self.states.iter().map(|(name, count)| (*name, *count))
    }

    /// Get average fetch latency in ms.
    pub fn average_latency_ms(&self) -> u64 {
        if self.latency_samples.is_empty() {
            return 0;
        }

        let sum: u64 = self.latency_samples.iter().sum();
        sum / self.latency_samples.len() as u64
    }

    /// Get p99 fetch latency.
    pub fn p99_latency_ms(&self) -> u64 {
        self.percentile_latency(99)
    }

    fn percentile_latency(&self, percentile: usize) -> u64 {
        if self.latency_samples.is_empty() {
            return 0;
        }

        let mut sorted: Vec<_> = self.latency_samples.iter().copied().collect();
        sorted.sort_unstable();

        let idx = (sorted.len() * percentile / 100).min(sorted.len() - 1);
        sorted[idx]
    }

    /// Share of terminal states that came from live rates.
    pub fn live_rate(&self) -> f64 {
        let live = self.state_count("success");
        let terminal = live + self.state_count("offline_success") + self.state_count("error");
        if terminal == 0 {
            return 0.0;
        }

        live as f64 / terminal as f64
    }
}

impl Default for SimulationMetrics {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics() {
        let mut metrics = SimulationMetrics::new();

        metrics.record_state(&ConverterState::Loading);
        metrics.record_state(&ConverterState::Error);
        metrics.record_state(&ConverterState::FewCurrency);
        metrics.record_fetch(100);
        metrics.record_fetch(200);
        metrics.record_fetch(150);
        metrics.record_assertion(true);
        metrics.record_assertion(false);

        assert_eq!(metrics.state_count("loading"), 1);
        assert_eq!(metrics.state_count("success"), 0);
        assert_eq!(metrics.average_latency_ms(), 150);
        assert_eq!(metrics.p99_latency_ms(), 200);
        assert_eq!(metrics.live_rate(), 0.0);
        assert_eq!(metrics.assertions_failed, 1);
        assert_eq!(metrics.states().count(), 3);
    }
}
