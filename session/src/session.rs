//! Converter session: the single writer of state, output, and currency list.

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use ratekeeper_common::{
    initial_currencies, local_timestamp, ConverterError, CurrencyCode, CurrencyEntry,
    CurrencySnapshot,
};
use ratekeeper_fx::format::display_len;
use ratekeeper_fx::{convert, evaluate, format_output, ConversionError, RateCache, RateSource};

use crate::config::SessionConfig;
use crate::context::SessionContext;
use crate::metrics::{MetricsSnapshot, SessionMetrics};
use crate::policy::{FetchTicket, RateResolutionPolicy, ResolutionStep};
use crate::state::ConverterState;
use crate::store::CurrencyStore;

/// Output shown before the first calculation.
pub const INITIAL_OUTPUT: &str = "0.0";

/// How a rate request was served.
#[derive(Debug)]
pub enum Resolution {
    /// Recomputed from the held snapshot; no fetch, no `Loading`.
    Reused,
    /// Joined a fetch already outstanding for the same base.
    Coalesced,
    /// A fetch was started; the handle finishes after the terminal state.
    Fetching(JoinHandle<()>),
    /// No base currency is selected; `Error` was emitted.
    NoBase,
}

impl Resolution {
    /// Check if this request started a fetch.
    pub fn is_fetching(&self) -> bool {
        matches!(self, Resolution::Fetching(_))
    }

    /// Wait for a started fetch to publish its terminal state.
    pub async fn wait(self) {
        if let Resolution::Fetching(handle) = self {
            if let Err(e) = handle.await {
                error!(error = %e, "Rate fetch task failed");
            }
        }
    }
}

/// Result of feeding one raw input into the session.
#[derive(Debug)]
pub enum CalculationOutcome {
    /// The input did not evaluate; the output was cleared.
    Cleared,
    /// The formatted result was too long; `MaximumInput` was emitted.
    MaximumInput,
    /// Too few active currencies; `FewCurrency` was emitted.
    FewCurrency,
    /// The output was published and rates were requested.
    Resolved(Resolution),
}

impl CalculationOutcome {
    /// Wait for any fetch this calculation started.
    pub async fn wait(self) {
        if let CalculationOutcome::Resolved(resolution) = self {
            resolution.wait().await;
        }
    }
}

struct Inner {
    context: SessionContext,
    policy: RateResolutionPolicy,
    currencies: Vec<CurrencyEntry>,
    output: String,
}

struct Shared {
    id: Uuid,
    config: SessionConfig,
    source: Arc<dyn RateSource>,
    cache: Arc<dyn RateCache>,
    store: Arc<dyn CurrencyStore>,
    metrics: SessionMetrics,
    inner: Mutex<Inner>,
    state_tx: broadcast::Sender<ConverterState>,
    output_tx: watch::Sender<String>,
    currencies_tx: watch::Sender<Vec<CurrencyEntry>>,
}

/// One converter screen's worth of state.
///
/// All mutation of the held snapshot, the output, and the active currency
/// list happens here or in the fetch tasks this session spawns. Methods
/// that may start a fetch must be called from within a Tokio runtime.
#[derive(Clone)]
pub struct ConverterSession {
    shared: Arc<Shared>,
}

impl ConverterSession {
    /// Create a new session.
    pub fn new(
        config: SessionConfig,
        mut context: SessionContext,
        source: Arc<dyn RateSource>,
        cache: Arc<dyn RateCache>,
        store: Arc<dyn CurrencyStore>,
    ) -> Result<Self, ConverterError> {
        config.validate()?;

        if context.current_base.is_none() {
            context.current_base = config.default_base.clone();
        }

        let (state_tx, _) = broadcast::channel(config.state_channel_capacity);
        let (output_tx, _) = watch::channel(INITIAL_OUTPUT.to_string());
        let (currencies_tx, _) = watch::channel(Vec::new());
        let id = Uuid::new_v4();

        info!(
            session_id = %id,
            source = source.name(),
            base = ?context.current_base,
            "Converter session created"
        );

        Ok(Self {
            shared: Arc::new(Shared {
                id,
                config,
                source,
                cache,
                store,
                metrics: SessionMetrics::new(),
                inner: Mutex::new(Inner {
                    context,
                    policy: RateResolutionPolicy::new(),
                    currencies: Vec::new(),
                    output: INITIAL_OUTPUT.to_string(),
                }),
                state_tx,
                output_tx,
                currencies_tx,
            }),
        })
    }

    /// Session identifier used in logs.
    pub fn id(&self) -> Uuid {
        self.shared.id
    }

    /// Subscribe to state transitions, in emission order.
    pub fn subscribe_state(&self) -> broadcast::Receiver<ConverterState> {
        self.shared.state_tx.subscribe()
    }

    /// Subscribe to the formatted output.
    pub fn subscribe_output(&self) -> watch::Receiver<String> {
        self.shared.output_tx.subscribe()
    }

    /// Subscribe to the active currency list.
    pub fn subscribe_currencies(&self) -> watch::Receiver<Vec<CurrencyEntry>> {
        self.shared.currencies_tx.subscribe()
    }

    /// Current formatted output.
    pub fn output(&self) -> String {
        self.shared.inner.lock().output.clone()
    }

    /// Current active currency list.
    pub fn currencies(&self) -> Vec<CurrencyEntry> {
        self.shared.inner.lock().currencies.clone()
    }

    /// Current base currency.
    pub fn current_base(&self) -> Option<CurrencyCode> {
        self.shared.inner.lock().context.current_base.clone()
    }

    /// Copy of the session context.
    pub fn context(&self) -> SessionContext {
        self.shared.inner.lock().context.clone()
    }

    /// Snapshot trusted for the current base, if any.
    pub fn held_snapshot(&self) -> Option<Arc<CurrencySnapshot>> {
        self.shared.inner.lock().policy.held().cloned()
    }

    /// Session counters.
    pub fn metrics(&self) -> MetricsSnapshot {
        self.shared.metrics.snapshot()
    }

    /// Reload the active currency list from the store.
    ///
    /// Drops the held snapshot; a fetch already in flight still lands. On
    /// first run the store is seeded with the initial catalogue first.
    /// Currencies the rate source does not price are left out of the list.
    #[instrument(skip(self), fields(session_id = %self.shared.id))]
    pub fn refresh_data(&self) -> Result<(), ConverterError> {
        let shared = &self.shared;
        let mut inner = shared.inner.lock();

        inner.policy.drop_held();
        inner.currencies.clear();

        if inner.context.first_run {
            shared.store.insert_initial(initial_currencies())?;
            inner.context.first_run = false;
            info!("Seeded initial currencies");
        }

        inner.currencies = shared
            .store
            .active_currencies()?
            .into_iter()
            .filter(|c| shared.source.supports_currency(&c.name))
            .collect();

        debug!(active = inner.currencies.len(), "Active currencies loaded");
        shared.currencies_tx.send_replace(inner.currencies.clone());
        Ok(())
    }

    /// Feed a raw input string through evaluation, formatting, and rate resolution.
    #[instrument(skip(self), fields(session_id = %self.shared.id))]
    pub fn calculate_output(&self, input: &str) -> CalculationOutcome {
        let shared = &self.shared;

        let value = match evaluate(input) {
            Ok(value) => value,
            Err(e) => {
                debug!(error = %e, "Input did not evaluate, clearing output");
                let mut inner = shared.inner.lock();
                inner.output.clear();
                for entry in inner.currencies.iter_mut() {
                    entry.rate = 0.0;
                }
                shared.output_tx.send_replace(String::new());
                shared.currencies_tx.send_replace(inner.currencies.clone());
                return CalculationOutcome::Cleared;
            }
        };

        let formatted = format_output(value);
        let mut inner = shared.inner.lock();

        if display_len(&formatted) > shared.config.max_output_length {
            debug!(formatted = %formatted, "Output exceeds maximum length");
            shared.emit(ConverterState::MaximumInput(input.to_string()));
            return CalculationOutcome::MaximumInput;
        }

        inner.output = formatted.clone();
        shared.output_tx.send_replace(formatted);

        if inner.currencies.len() < shared.config.minimum_active_currencies {
            shared.emit(ConverterState::FewCurrency);
            return CalculationOutcome::FewCurrency;
        }

        CalculationOutcome::Resolved(shared.resolve(&mut inner))
    }

    /// Recompute every active currency against the best available rates.
    pub fn get_rates(&self) -> Resolution {
        let mut inner = self.shared.inner.lock();
        self.shared.resolve(&mut inner)
    }

    /// Switch the base currency, dropping the held snapshot, and resolve again.
    #[instrument(skip(self), fields(session_id = %self.shared.id))]
    pub fn update_current_base(&self, base: Option<CurrencyCode>) -> Resolution {
        let mut inner = self.shared.inner.lock();
        inner.policy.invalidate();
        info!(from = ?inner.context.current_base, to = ?base, "Switching base currency");
        inner.context.current_base = base;
        self.shared.resolve(&mut inner)
    }

    /// Make sure the base is one of `choices`, falling back to the first active currency.
    ///
    /// Returns the base in effect afterwards. A switch triggered here runs
    /// its fetch in the background; observe it through the state stream.
    pub fn verify_current_base(&self, choices: &[CurrencyCode]) -> Option<CurrencyCode> {
        let fallback = {
            let inner = self.shared.inner.lock();
            match &inner.context.current_base {
                Some(base) if choices.contains(base) => None,
                _ => Some(inner.currencies.first().map(|c| c.name.clone())),
            }
        };

        if let Some(next) = fallback {
            let resolution = self.update_current_base(next);
            debug!(fetching = resolution.is_fetching(), "Base replaced after verification");
        }

        self.current_base()
    }

    /// Render `1 <BASE> = <rate>` for a currency from the held snapshot.
    pub fn clicked_item_rate(&self, name: &CurrencyCode) -> Option<String> {
        let inner = self.shared.inner.lock();
        let snapshot = inner.policy.held()?;
        let rate = snapshot.rate(name)?;
        Some(format!("1 {} = {}", snapshot.base(), rate))
    }

    /// Look up a currency in the store.
    pub fn currency_by_name(&self, name: &CurrencyCode) -> Result<Option<CurrencyEntry>, ConverterError> {
        self.shared.store.currency_by_name(name)
    }

    /// Reseed the store on the next `refresh_data`.
    pub fn reset_first_run(&self) {
        self.shared.inner.lock().context.first_run = true;
    }
}

impl Shared {
    fn emit(&self, state: ConverterState) {
        debug!(session_id = %self.id, state = %state, "State transition");
        // No subscribers is not an error.
        let _ = self.state_tx.send(state);
    }

    /// Write each active currency's equivalent of the current output.
    fn recompute(&self, inner: &mut Inner, snapshot: &CurrencySnapshot) {
        let output = inner.output.clone();

        for entry in inner.currencies.iter_mut() {
            match convert(&output, &entry.name, snapshot) {
                Ok(rate) => entry.rate = rate,
                Err(e @ ConversionError::UnknownCurrency(_)) => {
                    SessionMetrics::incr(&self.metrics.conversion_failures);
                    warn!(currency = %entry.name, error = %e, "Currency missing from snapshot");
                }
                Err(e) => {
                    SessionMetrics::incr(&self.metrics.conversion_failures);
                    error!(currency = %entry.name, error = %e, "Conversion failed");
                }
            }
        }

        self.currencies_tx.send_replace(inner.currencies.clone());
    }

    fn resolve(self: &Arc<Self>, inner: &mut Inner) -> Resolution {
        let Some(base) = inner.context.current_base.clone() else {
            warn!(session_id = %self.id, "No base currency selected");
            SessionMetrics::incr(&self.metrics.errors);
            self.emit(ConverterState::Error);
            return Resolution::NoBase;
        };

        match inner.policy.begin(&base) {
            ResolutionStep::Reuse(snapshot) => {
                self.recompute(inner, &snapshot);
                self.emit(ConverterState::Success(snapshot));
                Resolution::Reused
            }
            ResolutionStep::Coalesce => {
                SessionMetrics::incr(&self.metrics.coalesced_requests);
                debug!(session_id = %self.id, base = %base, "Fetch already in flight");
                Resolution::Coalesced
            }
            ResolutionStep::Fetch(ticket) => {
                SessionMetrics::incr(&self.metrics.fetches_started);
                self.emit(ConverterState::Loading);

                let shared = Arc::clone(self);
                Resolution::Fetching(tokio::spawn(async move {
                    shared.run_fetch(ticket).await;
                }))
            }
        }
    }

    async fn run_fetch(self: Arc<Self>, ticket: FetchTicket) {
        let base = ticket.base().clone();
        debug!(session_id = %self.id, base = %base, generation = ticket.generation(), "Fetching rates");

        let fetched = match self.source.fetch(&base).await {
            Ok(payload) => {
                payload.into_snapshot(&base, local_timestamp(&self.config.timestamp_format))
            }
            Err(e) => Err(e),
        };

        match fetched {
            Ok(snapshot) => {
                let snapshot = Arc::new(snapshot);
                {
                    let mut inner = self.inner.lock();
                    if !inner.policy.complete(&ticket, snapshot.clone()) {
                        self.discard_stale(&ticket);
                        return;
                    }

                    SessionMetrics::incr(&self.metrics.fetches_succeeded);
                    info!(
                        session_id = %self.id,
                        base = %base,
                        rates = snapshot.len(),
                        date = snapshot.date(),
                        "Rates downloaded"
                    );
                    self.recompute(&mut inner, &snapshot);
                    self.emit(ConverterState::Success(snapshot.clone()));
                }

                if let Err(e) = self.cache.put(&snapshot).await {
                    SessionMetrics::incr(&self.metrics.cache_write_failures);
                    warn!(session_id = %self.id, base = %base, error = %e, "Failed to persist rates");
                }
            }
            Err(e) => {
                SessionMetrics::incr(&self.metrics.fetches_failed);
                warn!(session_id = %self.id, base = %base, error = %e, "Rate download failed");

                let still_current = self.inner.lock().policy.is_current(&ticket);
                if !still_current {
                    self.discard_stale(&ticket);
                    return;
                }

                let cached = match self.cache.get(&base).await {
                    Ok(cached) => cached,
                    Err(e) => {
                        warn!(session_id = %self.id, base = %base, error = %e, "Offline cache read failed");
                        None
                    }
                };

                let mut inner = self.inner.lock();
                if !inner.policy.fail(&ticket) {
                    self.discard_stale(&ticket);
                    return;
                }

                match cached {
                    Some(snapshot) => {
                        SessionMetrics::incr(&self.metrics.offline_fallbacks);
                        info!(
                            session_id = %self.id,
                            base = %base,
                            date = snapshot.date(),
                            "Serving cached rates"
                        );
                        let snapshot = Arc::new(snapshot);
                        self.recompute(&mut inner, &snapshot);
                        self.emit(ConverterState::OfflineSuccess(snapshot));
                    }
                    None => {
                        SessionMetrics::incr(&self.metrics.errors);
                        warn!(session_id = %self.id, base = %base, "No cached rates for base");
                        self.emit(ConverterState::Error);
                    }
                }
            }
        }
    }

    fn discard_stale(&self, ticket: &FetchTicket) {
        SessionMetrics::incr(&self.metrics.stale_results);
        debug!(
            session_id = %self.id,
            base = %ticket.base(),
            generation = ticket.generation(),
            "Discarding stale rate result"
        );
    }
}
