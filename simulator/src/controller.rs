//! Simulation controller.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio::sync::broadcast::{self, error::TryRecvError};
use tracing::{debug, info, warn};

use ratekeeper_common::CurrencyCode;
use ratekeeper_fx::{FileRateCache, InMemoryRateCache, RateCache};
use ratekeeper_session::{
    CalculationOutcome, ConverterSession, ConverterState, CurrencyStore, InMemoryCurrencyStore,
    Resolution, SessionConfig, SessionContext,
};

use crate::metrics::SimulationMetrics;
use crate::scenario::{AssertCondition, FaultType, Scenario, ScenarioStep};
use crate::source::SimulatedRateSource;

/// Knobs for a simulation run.
#[derive(Debug, Clone)]
pub struct ControllerOptions {
    /// Base currency the session starts with.
    pub base: CurrencyCode,
    /// Random seed for reproducibility.
    pub seed: Option<u64>,
    /// Probability that a single fetch fails.
    pub failure_rate: f64,
    /// Simulation speed multiplier.
    pub speed: f64,
    /// Simulated fetch round trip.
    pub latency: Duration,
    /// Persist the offline cache here instead of in memory.
    pub cache_path: Option<PathBuf>,
}

impl Default for ControllerOptions {
    fn default() -> Self {
        Self {
            base: CurrencyCode::usd(),
            seed: None,
            failure_rate: 0.0,
            speed: 1.0,
            latency: Duration::from_millis(150),
            cache_path: None,
        }
    }
}

/// Controls the simulation.
pub struct SimulationController {
    speed: f64,
    rng: StdRng,
    source: Arc<SimulatedRateSource>,
    store: Arc<InMemoryCurrencyStore>,
    session: ConverterSession,
    states: broadcast::Receiver<ConverterState>,
    last_state: Option<ConverterState>,
    metrics: SimulationMetrics,
}

impl SimulationController {
    /// Create a new simulation controller.
    pub fn new(options: ControllerOptions) -> anyhow::Result<Self> {
        let rng = match options.seed {
            Some(s) => StdRng::seed_from_u64(s.wrapping_add(1)),
            None => StdRng::from_entropy(),
        };

        let source = Arc::new(
            SimulatedRateSource::new(options.seed, options.failure_rate)
                .with_latency(options.latency),
        );
        let cache: Arc<dyn RateCache> = match &options.cache_path {
            Some(path) => {
                info!(path = %path.display(), "Using file-backed offline cache");
                Arc::new(FileRateCache::new(path))
            }
            None => Arc::new(InMemoryRateCache::new()),
        };
        let store = Arc::new(InMemoryCurrencyStore::new());

        let session = ConverterSession::new(
            SessionConfig::from_env(),
            SessionContext::new().with_base(options.base),
            source.clone(),
            cache,
            store.clone(),
        )?;
        let states = session.subscribe_state();

        Ok(Self {
            speed: options.speed.max(0.01),
            rng,
            source,
            store,
            session,
            states,
            last_state: None,
            metrics: SimulationMetrics::new(),
        })
    }

    /// Initialize the simulation.
    pub async fn initialize(&mut self) -> anyhow::Result<()> {
        self.session.refresh_data()?;
        info!(
            session_id = %self.session.id(),
            active = self.session.currencies().len(),
            base = ?self.session.current_base(),
            "Simulation initialized"
        );
        Ok(())
    }

    /// Run a scenario.
    pub async fn run_scenario(&mut self, scenario: Scenario) -> anyhow::Result<()> {
        info!("Running scenario: {} - {}", scenario.name, scenario.description);

        for step in &scenario.steps {
            self.execute_step(step).await?;
        }

        Ok(())
    }

    /// Run random steps until `duration` elapses, or until Ctrl+C.
    pub async fn run(&mut self, duration: Option<Duration>) -> anyhow::Result<()> {
        info!("Running simulation in continuous mode");

        let stop = async move {
            match duration {
                Some(d) => tokio::time::sleep(d).await,
                None => {
                    if let Err(e) = tokio::signal::ctrl_c().await {
                        warn!(error = %e, "Failed to listen for Ctrl+C");
                    }
                }
            }
        };
        tokio::pin!(stop);

        let pace = Duration::from_millis((1000.0 / self.speed) as u64);
        loop {
            tokio::select! {
                _ = &mut stop => break,
                _ = tokio::time::sleep(pace) => {
                    let step = self.random_step();
                    self.execute_step(&step).await?;
                }
            }
        }

        Ok(())
    }

    fn random_step(&mut self) -> ScenarioStep {
        match self.rng.gen_range(0..100) {
            0..=49 => ScenarioStep::Input {
                text: self.rng.gen_range(1..1_000_000).to_string(),
            },
            50..=69 => ScenarioStep::Input {
                text: format!(
                    "{}+{}%",
                    self.rng.gen_range(1..10_000),
                    self.rng.gen_range(1..100)
                ),
            },
            70..=84 => {
                let currencies = self.session.currencies();
                if currencies.is_empty() {
                    return ScenarioStep::GetRates;
                }
                let pick = self.rng.gen_range(0..currencies.len());
                ScenarioStep::SwitchBase {
                    currency: currencies[pick].name.to_string(),
                }
            }
            85..=94 if self.source.is_offline() => ScenarioStep::ClearFaults,
            85..=94 => ScenarioStep::InjectFault {
                fault_type: FaultType::SourceOffline,
            },
            _ => ScenarioStep::Refresh,
        }
    }

    /// Execute a single scenario step.
    async fn execute_step(&mut self, step: &ScenarioStep) -> anyhow::Result<()> {
        debug!(?step, "Executing step");

        match step {
            ScenarioStep::Wait { millis } => {
                let adjusted = (*millis as f64 / self.speed) as u64;
                tokio::time::sleep(Duration::from_millis(adjusted)).await;
            }
            ScenarioStep::Input { text } => match self.session.calculate_output(text) {
                CalculationOutcome::Resolved(resolution) => self.settle(resolution).await,
                other => debug!(input = %text, outcome = ?other, "Input not resolved"),
            },
            ScenarioStep::SwitchBase { currency } => {
                let base = CurrencyCode::parse(currency)?;
                let resolution = self.session.update_current_base(Some(base));
                self.settle(resolution).await;
            }
            ScenarioStep::GetRates => {
                let resolution = self.session.get_rates();
                self.settle(resolution).await;
            }
            ScenarioStep::Refresh => {
                self.session.refresh_data()?;
            }
            ScenarioStep::SetActive { currency, active } => {
                self.store.set_active(&CurrencyCode::parse(currency)?, *active)?;
            }
            ScenarioStep::InjectFault { fault_type } => match fault_type {
                FaultType::SourceOffline => self.source.set_offline(true),
            },
            ScenarioStep::ClearFaults => {
                self.source.set_offline(false);
            }
            ScenarioStep::Assert { condition } => {
                let passed = self.check(condition);
                self.metrics.record_assertion(passed);
                if passed {
                    info!(?condition, "Assertion held");
                } else {
                    warn!(
                        ?condition,
                        last_state = ?self.last_state.as_ref().map(|s| s.name()),
                        output = %self.session.output(),
                        "Assertion failed"
                    );
                }
            }
        }

        self.metrics.steps += 1;
        self.drain_states();
        Ok(())
    }

    async fn settle(&mut self, resolution: Resolution) {
        if resolution.is_fetching() {
            let started = Instant::now();
            resolution.wait().await;
            self.metrics
                .record_fetch(started.elapsed().as_millis() as u64);
        }
    }

    fn check(&self, condition: &AssertCondition) -> bool {
        match condition {
            AssertCondition::LastState { state } => {
                self.last_state.as_ref().map(|s| s.name()) == Some(state.as_str())
            }
            AssertCondition::OutputEquals { output } => self.session.output() == *output,
            AssertCondition::BaseIs { currency } => {
                self.session.current_base() == Some(CurrencyCode::new(currency.as_str()))
            }
        }
    }

    fn drain_states(&mut self) {
        loop {
            match self.states.try_recv() {
                Ok(state) => {
                    info!(state = %state, "State observed");
                    self.metrics.record_state(&state);
                    self.last_state = Some(state);
                }
                Err(TryRecvError::Lagged(skipped)) => {
                    warn!(skipped, "State observer lagged");
                }
                Err(_) => break,
            }
        }
    }

    /// Get simulation metrics.
    pub fn get_metrics(&self) -> &SimulationMetrics {
        &self.metrics
    }

    /// Get the session under simulation.
    pub fn session(&self) -> &ConverterSession {
        &self.session
    }

    /// Number of fetches the simulated source handled.
    pub fn source_fetches(&self) -> u64 {
        self.source.fetch_count()
    }
}
