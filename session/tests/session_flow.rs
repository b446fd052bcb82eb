//! End-to-end behaviour of a converter session against scripted collaborators.

use std::sync::Arc;

use ratekeeper_common::{parse_timestamp, CurrencyCode, CurrencyEntry, CurrencySnapshot};
use ratekeeper_fx::{FileRateCache, InMemoryRateCache, MockRateSource, RateCache};
use ratekeeper_session::{
    CalculationOutcome, ConverterSession, ConverterState, CurrencyStore, InMemoryCurrencyStore,
    Resolution, SessionConfig, SessionContext,
};
use tokio::sync::broadcast;

struct Harness {
    session: ConverterSession,
    source: Arc<MockRateSource>,
    cache: Arc<InMemoryRateCache>,
    store: Arc<InMemoryCurrencyStore>,
    states: broadcast::Receiver<ConverterState>,
}

fn entries(active: &[&str]) -> Vec<CurrencyEntry> {
    active
        .iter()
        .map(|code| CurrencyEntry::new(*code, *code, "", true))
        .collect()
}

fn harness_with(context: SessionContext, store_entries: Vec<CurrencyEntry>) -> Harness {
    let source = Arc::new(MockRateSource::new("mock"));
    source.set_rates(
        CurrencyCode::usd(),
        vec![
            (CurrencyCode::usd(), 1.0),
            (CurrencyCode::eur(), 0.9),
            (CurrencyCode::gbp(), 0.8),
        ],
    );
    source.set_rates(
        CurrencyCode::eur(),
        vec![
            (CurrencyCode::eur(), 1.0),
            (CurrencyCode::usd(), 1.1),
            (CurrencyCode::gbp(), 0.88),
        ],
    );

    let cache = Arc::new(InMemoryRateCache::new());
    let store = Arc::new(InMemoryCurrencyStore::with_entries(store_entries));

    let session = ConverterSession::new(
        SessionConfig::default(),
        context,
        source.clone(),
        cache.clone(),
        store.clone(),
    )
    .unwrap();
    let states = session.subscribe_state();

    session.refresh_data().unwrap();

    Harness {
        session,
        source,
        cache,
        store,
        states,
    }
}

fn harness() -> Harness {
    harness_with(
        SessionContext::new().with_base(CurrencyCode::usd()).seeded(),
        entries(&["USD", "EUR", "GBP"]),
    )
}

fn drain(rx: &mut broadcast::Receiver<ConverterState>) -> Vec<ConverterState> {
    let mut out = Vec::new();
    while let Ok(state) = rx.try_recv() {
        out.push(state);
    }
    out
}

fn cached_usd() -> CurrencySnapshot {
    CurrencySnapshot::new(
        CurrencyCode::usd(),
        vec![(CurrencyCode::eur(), 0.5), (CurrencyCode::gbp(), 0.25)],
        "08:00:00 01.01.2024",
    )
    .unwrap()
}

fn rate_of(session: &ConverterSession, code: &str) -> f64 {
    session
        .currencies()
        .into_iter()
        .find(|c| c.name == CurrencyCode::new(code))
        .map(|c| c.rate)
        .unwrap()
}

#[tokio::test]
async fn test_fetch_failure_without_cache_emits_error() {
    let mut h = harness();
    h.source.set_offline(true);

    let outcome = h.session.calculate_output("10");
    assert!(matches!(outcome, CalculationOutcome::Resolved(Resolution::Fetching(_))));
    outcome.wait().await;

    assert_eq!(drain(&mut h.states), vec![ConverterState::Loading, ConverterState::Error]);
    assert!(h.session.held_snapshot().is_none());
    assert_eq!(h.session.metrics().errors, 1);
}

#[tokio::test]
async fn test_fetch_failure_with_cache_emits_offline_success() {
    let mut h = harness();
    h.source.set_offline(true);
    h.cache.put(&cached_usd()).await.unwrap();

    h.session.calculate_output("10").wait().await;

    let states = drain(&mut h.states);
    assert_eq!(states.len(), 2);
    assert_eq!(states[0], ConverterState::Loading);
    assert_eq!(
        states[1],
        ConverterState::OfflineSuccess(Arc::new(cached_usd()))
    );

    assert!(h.session.held_snapshot().is_none());
    assert_eq!(rate_of(&h.session, "EUR"), 5.0);
    assert_eq!(h.session.metrics().offline_fallbacks, 1);
}

#[tokio::test]
async fn test_offline_success_is_not_held() {
    let mut h = harness();
    h.source.set_offline(true);
    h.cache.put(&cached_usd()).await.unwrap();

    h.session.calculate_output("10").wait().await;
    h.session.get_rates().wait().await;

    assert_eq!(h.source.fetch_count(), 2);
    let states = drain(&mut h.states);
    assert_eq!(
        states.iter().filter(|s| **s == ConverterState::Loading).count(),
        2
    );
}

#[tokio::test]
async fn test_successful_fetch_holds_and_persists() {
    let mut h = harness();

    h.session.calculate_output("10").wait().await;

    let states = drain(&mut h.states);
    assert_eq!(states.len(), 2);
    assert_eq!(states[0], ConverterState::Loading);

    let ConverterState::Success(snapshot) = &states[1] else {
        panic!("expected success, got {:?}", states[1]);
    };
    assert_eq!(snapshot.base(), &CurrencyCode::usd());
    assert!(parse_timestamp(snapshot.date()).is_some());

    assert_eq!(h.session.held_snapshot().as_ref(), Some(snapshot));
    assert_eq!(h.cache.peek(&CurrencyCode::usd()).as_ref(), Some(&**snapshot));
    assert_eq!(h.cache.write_count(), 1);
}

#[tokio::test]
async fn test_held_snapshot_is_reused() {
    let mut h = harness();
    h.session.calculate_output("10").wait().await;
    let held = h.session.held_snapshot().unwrap();
    drain(&mut h.states);

    assert!(matches!(h.session.get_rates(), Resolution::Reused));
    assert!(matches!(h.session.get_rates(), Resolution::Reused));

    assert_eq!(h.source.fetch_count(), 1);
    assert_eq!(
        drain(&mut h.states),
        vec![
            ConverterState::Success(held.clone()),
            ConverterState::Success(held)
        ]
    );
}

#[tokio::test]
async fn test_conversion_through_base() {
    let h = harness();

    h.session.calculate_output("10").wait().await;

    assert_eq!(h.session.output(), "10");
    assert!((rate_of(&h.session, "EUR") - 9.0).abs() < 1e-9);
    assert!((rate_of(&h.session, "GBP") - 8.0).abs() < 1e-9);
    assert_eq!(rate_of(&h.session, "USD"), 10.0);
}

#[tokio::test]
async fn test_expression_output() {
    let h = harness();
    let output = h.session.subscribe_output();
    assert_eq!(*output.borrow(), "0.0");

    h.session.calculate_output("2+2").wait().await;
    assert_eq!(*output.borrow(), "4");

    let outcome = h.session.calculate_output("");
    assert!(matches!(outcome, CalculationOutcome::Cleared));
    assert_eq!(*output.borrow(), "");
    assert!(h.session.currencies().iter().all(|c| c.rate == 0.0));
}

#[tokio::test]
async fn test_grouped_output_converts_after_retry() {
    let h = harness();

    h.session.calculate_output("1234").wait().await;

    assert_eq!(h.session.output(), "1 234");
    assert!((rate_of(&h.session, "EUR") - 1110.6).abs() < 1e-9);
    assert_eq!(h.session.metrics().conversion_failures, 0);
}

#[tokio::test]
async fn test_output_length_boundary() {
    let mut h = harness();

    let accepted = h.session.calculate_output("123456789012");
    assert!(matches!(accepted, CalculationOutcome::Resolved(_)));
    accepted.wait().await;
    assert_eq!(h.session.output(), "123 456 789 012");
    drain(&mut h.states);

    let rejected = h.session.calculate_output("12345678901.5");
    assert!(matches!(rejected, CalculationOutcome::MaximumInput));
    assert_eq!(
        drain(&mut h.states),
        vec![ConverterState::MaximumInput("12345678901.5".to_string())]
    );
    assert_eq!(h.session.output(), "123 456 789 012");
}

#[tokio::test]
async fn test_active_currency_boundary() {
    let mut one = harness_with(
        SessionContext::new().with_base(CurrencyCode::usd()).seeded(),
        entries(&["USD"]),
    );
    assert!(matches!(
        one.session.calculate_output("5"),
        CalculationOutcome::FewCurrency
    ));
    assert_eq!(drain(&mut one.states), vec![ConverterState::FewCurrency]);
    assert_eq!(one.source.fetch_count(), 0);

    let two = harness_with(
        SessionContext::new().with_base(CurrencyCode::usd()).seeded(),
        entries(&["USD", "EUR"]),
    );
    let outcome = two.session.calculate_output("5");
    assert!(matches!(outcome, CalculationOutcome::Resolved(Resolution::Fetching(_))));
    outcome.wait().await;
    assert_eq!(two.source.fetch_count(), 1);
}

#[tokio::test]
async fn test_base_switch_forces_fetch() {
    let h = harness();
    h.session.calculate_output("10").wait().await;
    assert!(h.session.held_snapshot().is_some());

    let resolution = h.session.update_current_base(Some(CurrencyCode::eur()));
    assert!(resolution.is_fetching());
    assert!(h.session.held_snapshot().is_none());
    resolution.wait().await;

    assert_eq!(h.source.requested(), vec![CurrencyCode::usd(), CurrencyCode::eur()]);
    assert_eq!(
        h.session.held_snapshot().unwrap().base(),
        &CurrencyCode::eur()
    );
    assert!((rate_of(&h.session, "USD") - 11.0).abs() < 1e-9);
}

#[tokio::test]
async fn test_duplicate_request_is_coalesced() {
    let mut h = harness();
    h.source.pause();

    let first = h.session.calculate_output("10");
    let second = h.session.get_rates();
    assert!(matches!(second, Resolution::Coalesced));

    h.source.release();
    first.wait().await;

    assert_eq!(h.source.fetch_count(), 1);
    let states = drain(&mut h.states);
    assert_eq!(states.len(), 2);
    assert_eq!(states[0], ConverterState::Loading);
    assert!(matches!(states[1], ConverterState::Success(_)));
    assert_eq!(h.session.metrics().coalesced_requests, 1);
}

#[tokio::test]
async fn test_stale_result_is_discarded() {
    let mut h = harness();
    h.source.pause();

    let usd = h.session.calculate_output("10");
    let eur = h.session.update_current_base(Some(CurrencyCode::eur()));

    h.source.release();
    h.source.release();
    usd.wait().await;
    eur.wait().await;

    let states = drain(&mut h.states);
    let successes: Vec<_> = states
        .iter()
        .filter_map(|s| match s {
            ConverterState::Success(snapshot) => Some(snapshot.base().clone()),
            _ => None,
        })
        .collect();

    assert_eq!(successes, vec![CurrencyCode::eur()]);
    assert_eq!(h.session.held_snapshot().unwrap().base(), &CurrencyCode::eur());
    assert_eq!(h.session.metrics().stale_results, 1);
    assert!(h.cache.peek(&CurrencyCode::usd()).is_none());
}

#[tokio::test]
async fn test_refresh_during_fetch_still_lands() {
    let mut h = harness();
    h.source.pause();

    let outcome = h.session.calculate_output("10");
    h.session.refresh_data().unwrap();
    h.source.release();
    outcome.wait().await;

    let states = drain(&mut h.states);
    assert_eq!(states.len(), 2);
    assert_eq!(states[0], ConverterState::Loading);
    assert!(matches!(states[1], ConverterState::Success(_)));

    assert!(h.session.held_snapshot().is_some());
    assert_eq!(h.session.metrics().stale_results, 0);
    assert!((rate_of(&h.session, "EUR") - 9.0).abs() < 1e-9);
}

#[tokio::test]
async fn test_invalid_cached_rates_yield_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("rates.json");
    std::fs::write(
        &path,
        r#"{"USD":{"base":"USD","date":"x","rates":{"USD":0.0,"EUR":-2.0}}}"#,
    )
    .unwrap();

    let source = Arc::new(MockRateSource::new("mock"));
    source.set_offline(true);
    let session = ConverterSession::new(
        SessionConfig::default(),
        SessionContext::new().with_base(CurrencyCode::usd()).seeded(),
        source,
        Arc::new(FileRateCache::new(&path)),
        Arc::new(InMemoryCurrencyStore::with_entries(entries(&["USD", "EUR"]))),
    )
    .unwrap();
    let mut states = session.subscribe_state();
    session.refresh_data().unwrap();

    session.calculate_output("10").wait().await;

    assert_eq!(drain(&mut states), vec![ConverterState::Loading, ConverterState::Error]);
    assert!(session.currencies().iter().all(|c| c.rate.is_finite()));
}

#[tokio::test]
async fn test_cache_write_failure_is_not_surfaced() {
    let mut h = harness();
    h.cache.set_failing(true);

    h.session.calculate_output("10").wait().await;

    let states = drain(&mut h.states);
    assert!(matches!(states.last(), Some(ConverterState::Success(_))));
    assert_eq!(h.session.metrics().cache_write_failures, 1);
}

#[tokio::test]
async fn test_cache_read_failure_yields_error() {
    let mut h = harness();
    h.source.set_offline(true);
    h.cache.set_failing(true);

    h.session.calculate_output("10").wait().await;

    assert_eq!(drain(&mut h.states), vec![ConverterState::Loading, ConverterState::Error]);
}

#[tokio::test]
async fn test_missing_base_emits_error() {
    let mut h = harness_with(SessionContext::new().seeded(), entries(&["USD", "EUR"]));

    assert!(matches!(h.session.get_rates(), Resolution::NoBase));
    assert_eq!(drain(&mut h.states), vec![ConverterState::Error]);
    assert_eq!(h.source.fetch_count(), 0);
}

#[tokio::test]
async fn test_first_run_seeds_catalogue() {
    let h = harness_with(
        SessionContext::new().with_base(CurrencyCode::usd()),
        Vec::new(),
    );

    let names: Vec<_> = h.session.currencies().into_iter().map(|c| c.name).collect();
    assert!(names.contains(&CurrencyCode::eur()));
    assert!(names.contains(&CurrencyCode::usd()));
    assert!(!h.session.context().first_run);
    assert!(!h.store.is_empty());
}

#[tokio::test]
async fn test_refresh_drops_unsupported_and_reseeds() {
    let h = harness();
    h.source.mark_unsupported(CurrencyCode::gbp());

    h.session.refresh_data().unwrap();
    let names: Vec<_> = h.session.currencies().into_iter().map(|c| c.name).collect();
    assert_eq!(names, vec![CurrencyCode::usd(), CurrencyCode::eur()]);

    h.session.reset_first_run();
    h.session.refresh_data().unwrap();
    assert!(h
        .session
        .currency_by_name(&CurrencyCode::jpy())
        .unwrap()
        .is_some());
}

#[tokio::test]
async fn test_refresh_drops_held_snapshot() {
    let h = harness();
    h.session.calculate_output("10").wait().await;

    h.session.refresh_data().unwrap();

    assert!(h.session.held_snapshot().is_none());
    assert!(h.session.get_rates().is_fetching());
}

#[tokio::test]
async fn test_clicked_item_rate() {
    let h = harness();
    assert_eq!(h.session.clicked_item_rate(&CurrencyCode::eur()), None);

    h.session.calculate_output("1").wait().await;

    assert_eq!(
        h.session.clicked_item_rate(&CurrencyCode::eur()),
        Some("1 USD = 0.9".to_string())
    );
    assert_eq!(h.session.clicked_item_rate(&CurrencyCode::jpy()), None);
}

#[tokio::test]
async fn test_verify_current_base() {
    let h = harness_with(SessionContext::new().seeded(), entries(&["EUR", "USD"]));

    let base = h.session.verify_current_base(&[CurrencyCode::usd(), CurrencyCode::eur()]);
    assert_eq!(base, Some(CurrencyCode::eur()));

    let kept = h.session.verify_current_base(&[CurrencyCode::eur()]);
    assert_eq!(kept, Some(CurrencyCode::eur()));

    let replaced = h.session.verify_current_base(&[CurrencyCode::gbp()]);
    assert_eq!(replaced, Some(CurrencyCode::eur()));
}

#[tokio::test]
async fn test_store_toggle_reaches_few_currency() {
    let mut h = harness();
    h.store.set_active(&CurrencyCode::eur(), false).unwrap();
    h.store.set_active(&CurrencyCode::gbp(), false).unwrap();
    h.session.refresh_data().unwrap();

    assert!(matches!(
        h.session.calculate_output("3"),
        CalculationOutcome::FewCurrency
    ));
    assert_eq!(drain(&mut h.states), vec![ConverterState::FewCurrency]);
}
