use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use farescope_core::{
    CabinClass, ComposedResponse, FlightProvider, ManualClock, Money, NormalisedRequest, Offer, ProviderError,
    ProviderErrorKind, SearchLimits, SearchRequest, SortKey, SortOrder,
};
use farescope_offer::{FilterPipeline, OfferOrdering};
use farescope_search::{
    FanOutExecutor, HistorySink, InMemoryHistoryStore, InMemoryResultStore, Lookup, ProviderRegistry, ResultCache,
    SearchError, SearchOrchestrator,
};
use rust_decimal::Decimal;
use std::cmp::Ordering as CmpOrdering;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 5, 1, 9, 0, 0).unwrap()
}

fn offer(flight: &str, price: i64) -> Offer {
    let departure = Utc.with_ymd_and_hms(2025, 6, 1, 7, 0, 0).unwrap();
    let airline = &flight[..2];
    Offer {
        id: format!("{}-{}", flight, price),
        provider: String::new(),
        also_from: vec![],
        origin: "LHR".to_string(),
        destination: "BCN".to_string(),
        departure_time: departure,
        arrival_time: departure + chrono::Duration::minutes(125),
        duration_minutes: 125,
        stops: 0,
        stop_details: vec![],
        airline_code: airline.to_string(),
        flight_number: flight[2..].to_string(),
        aircraft_code: None,
        cabin: CabinClass::Economy,
        price: Money::new(Decimal::new(price, 0), "EUR"),
        refundable: false,
        baggage_included: true,
        booking_url: None,
        valid_until: Utc.with_ymd_and_hms(2025, 5, 31, 0, 0, 0).unwrap(),
        seats_available: Some(4),
        relevance_score: 0.0,
    }
}

struct Scripted {
    name: &'static str,
    delay: Duration,
    reply: Result<Vec<Offer>, ProviderErrorKind>,
    calls: AtomicUsize,
}

impl Scripted {
    fn ok(name: &'static str, delay_ms: u64, offers: Vec<Offer>) -> Arc<Self> {
        Arc::new(Self {
            name,
            delay: Duration::from_millis(delay_ms),
            reply: Ok(offers),
            calls: AtomicUsize::new(0),
        })
    }

    fn failing(name: &'static str, kind: ProviderErrorKind) -> Arc<Self> {
        Arc::new(Self {
            name,
            delay: Duration::from_millis(20),
            reply: Err(kind),
            calls: AtomicUsize::new(0),
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl FlightProvider for Scripted {
    fn name(&self) -> &str {
        self.name
    }

    async fn search(&self, _: &NormalisedRequest, _: std::time::Instant) -> Result<Vec<Offer>, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        match &self.reply {
            Ok(offers) => Ok(offers.clone()),
            Err(kind) => Err(ProviderError::new(*kind, "scripted failure")),
        }
    }
}

struct Harness {
    orchestrator: Arc<SearchOrchestrator>,
    clock: Arc<ManualClock>,
}

fn harness_with(providers: Vec<Arc<Scripted>>, global_deadline: Duration) -> Harness {
    let clock = Arc::new(ManualClock::new(now()));
    let mut registry = ProviderRegistry::new();
    for provider in providers {
        registry.register(provider).unwrap();
    }
    let cache = ResultCache::new(
        Arc::new(InMemoryResultStore::new()),
        clock.clone(),
        Duration::from_secs(15 * 60),
    );
    let orchestrator = SearchOrchestrator::new(
        Arc::new(registry),
        FanOutExecutor::new(global_deadline, Duration::from_secs(20)),
        cache,
        clock.clone(),
        SearchLimits::default(),
    );
    Harness {
        orchestrator: Arc::new(orchestrator),
        clock,
    }
}

fn harness(providers: Vec<Arc<Scripted>>) -> Harness {
    harness_with(providers, Duration::from_secs(30))
}

fn scenario_request() -> SearchRequest {
    serde_json::from_value(serde_json::json!({
        "origin": "LHR",
        "destination": "BCN",
        "departure": "2025-06-01",
        "trip_type": "oneway",
        "passengers": 1,
        "cabin": "economy",
        "max_results": 10,
        "sort_by": "price",
        "sort_order": "asc"
    }))
    .unwrap()
}

fn amadeus() -> Arc<Scripted> {
    Scripted::ok(
        "amadeus",
        40,
        vec![offer("BA478", 120), offer("IB3151", 180), offer("VY7821", 200)],
    )
}

fn index() -> Arc<Scripted> {
    Scripted::ok("index", 15, vec![offer("U28011", 110), offer("IB3151", 180)])
}

fn prices(response: &ComposedResponse) -> Vec<Decimal> {
    response.offers.iter().map(|o| o.price.amount).collect()
}

fn eur(values: &[i64]) -> Vec<Decimal> {
    values.iter().map(|v| Decimal::new(*v, 0)).collect()
}

fn without_timing(response: &ComposedResponse) -> serde_json::Value {
    let mut value = serde_json::to_value(response).unwrap();
    value["metadata"]["search_time_ms"] = serde_json::json!(0);
    value
}

#[tokio::test(start_paused = true)]
async fn scenario_a_cold_search_merges_and_dedups() {
    let (amadeus, index) = (amadeus(), index());
    let h = harness(vec![amadeus.clone(), index.clone()]);

    let response = h.orchestrator.search(scenario_request()).await.unwrap();

    assert_eq!(prices(&response), eur(&[110, 120, 180, 200]));
    let shared = &response.offers[2];
    assert_eq!(shared.provider, "amadeus");
    assert_eq!(shared.also_from, vec!["index"]);
    assert_eq!(response.offers[0].provider, "index");

    let meta = &response.metadata;
    assert_eq!(meta.total_results, 4);
    assert_eq!(meta.results_returned, 4);
    assert_eq!(meta.providers_queried, vec!["amadeus", "index"]);
    assert_eq!(meta.providers_successful, vec!["amadeus", "index"]);
    assert!(meta.providers_errors.is_empty());
    assert!(!meta.cache_hit && !meta.from_cache);
    assert_eq!(meta.currency, "EUR");
    assert_eq!(meta.price_range.min, Decimal::new(110, 0));
    assert_eq!(meta.price_range.max, Decimal::new(200, 0));
    assert_eq!(meta.price_range.average, Decimal::new(15250, 2));
    assert_eq!(meta.duration_range.average, 125);
    assert_eq!(amadeus.calls(), 1);
    assert_eq!(index.calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn scenario_b_warm_search_is_served_from_cache() {
    let (amadeus, index) = (amadeus(), index());
    let h = harness(vec![amadeus.clone(), index.clone()]);

    let cold = h.orchestrator.search(scenario_request()).await.unwrap();
    h.clock.advance(chrono::Duration::minutes(5));
    let warm = h.orchestrator.search(scenario_request()).await.unwrap();

    assert!(warm.metadata.cache_hit);
    assert!(warm.metadata.from_cache);
    assert!(warm.metadata.providers_errors.is_empty());
    assert_eq!(warm.offers, cold.offers);
    assert_ne!(warm.search_id, cold.search_id);
    assert_eq!(warm.created_at, cold.created_at);
    assert_eq!(amadeus.calls(), 1);
    assert_eq!(index.calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn expired_entry_triggers_a_new_fan_out() {
    let amadeus = amadeus();
    let h = harness(vec![amadeus.clone()]);

    h.orchestrator.search(scenario_request()).await.unwrap();
    h.clock.advance(chrono::Duration::minutes(15));
    let again = h.orchestrator.search(scenario_request()).await.unwrap();

    assert!(!again.metadata.cache_hit);
    assert_eq!(amadeus.calls(), 2);
}

#[tokio::test(start_paused = true)]
async fn scenario_c_concurrent_misses_fan_out_once() {
    let (amadeus, index) = (amadeus(), index());
    let h = harness(vec![amadeus.clone(), index.clone()]);

    let mut tasks = tokio::task::JoinSet::new();
    for _ in 0..50 {
        let orchestrator = Arc::clone(&h.orchestrator);
        tasks.spawn(async move { orchestrator.search(scenario_request()).await });
    }
    let mut responses = Vec::new();
    while let Some(joined) = tasks.join_next().await {
        responses.push(joined.unwrap().unwrap());
    }

    assert_eq!(responses.len(), 50);
    assert_eq!(amadeus.calls(), 1);
    assert_eq!(index.calls(), 1);
    let first = without_timing(&responses[0]);
    for response in &responses[1..] {
        assert_eq!(without_timing(response), first);
    }
    assert!(responses.iter().all(|r| !r.metadata.cache_hit));
}

#[tokio::test(start_paused = true)]
async fn scenario_d_partial_failure_still_answers() {
    let amadeus = Scripted::failing("amadeus", ProviderErrorKind::Auth);
    let h = harness(vec![amadeus, index()]);

    let response = h.orchestrator.search(scenario_request()).await.unwrap();

    assert_eq!(prices(&response), eur(&[110, 180]));
    assert!(response.offers.iter().all(|o| o.provider == "index"));
    let meta = &response.metadata;
    assert_eq!(meta.providers_successful, vec!["index"]);
    assert_eq!(meta.providers_errors.len(), 1);
    assert_eq!(meta.providers_errors.get("amadeus"), Some(&ProviderErrorKind::Auth));
    assert_eq!(
        serde_json::to_value(&meta.providers_errors).unwrap(),
        serde_json::json!({"amadeus": "auth"})
    );
}

#[tokio::test(start_paused = true)]
async fn scenario_e_total_failure_is_not_cached() {
    let amadeus = Scripted::failing("amadeus", ProviderErrorKind::Upstream5xx);
    let index = Scripted::failing("index", ProviderErrorKind::Upstream5xx);
    let h = harness(vec![amadeus.clone(), index.clone()]);

    let err = h.orchestrator.search(scenario_request()).await.unwrap_err();
    let metadata = match err {
        SearchError::AllProvidersFailed { metadata } => metadata,
        other => panic!("expected AllProvidersFailed, got {:?}", other),
    };
    assert_eq!(metadata.providers_queried, vec!["amadeus", "index"]);
    assert!(metadata.providers_successful.is_empty());
    assert_eq!(metadata.providers_errors.get("amadeus"), Some(&ProviderErrorKind::Upstream5xx));
    assert_eq!(metadata.providers_errors.get("index"), Some(&ProviderErrorKind::Upstream5xx));

    let normalised = scenario_request()
        .normalise(now().date_naive(), &SearchLimits::default())
        .unwrap();
    let fingerprint = farescope_core::Fingerprint::of(&normalised);
    assert_eq!(h.orchestrator.cache().lookup(&fingerprint).await, Lookup::Miss);

    // Nothing cached, so the next attempt fans out again.
    h.orchestrator.search(scenario_request()).await.unwrap_err();
    assert_eq!(amadeus.calls(), 2);
    assert_eq!(index.calls(), 2);
}

#[tokio::test(start_paused = true)]
async fn scenario_f_global_deadline_times_out_slow_provider() {
    let amadeus = Scripted::ok("amadeus", 500, vec![offer("BA478", 120), offer("IB3151", 180), offer("VY7821", 200)]);
    let index = Scripted::ok("index", 10_000, vec![offer("U28011", 110)]);
    let h = harness_with(vec![amadeus, index], Duration::from_secs(2));

    let response = h.orchestrator.search(scenario_request()).await.unwrap();

    assert_eq!(prices(&response), eur(&[120, 180, 200]));
    let meta = &response.metadata;
    assert_eq!(meta.providers_successful, vec!["amadeus"]);
    assert_eq!(meta.providers_errors.get("index"), Some(&ProviderErrorKind::Timeout));
    assert!(meta.search_time_ms >= 2_000);
    assert!(meta.search_time_ms < 2_500);
    assert!(meta.search_time_ms >= meta.provider_latency_ms["amadeus"]);
}

#[tokio::test(start_paused = true)]
async fn filters_and_sort_run_over_the_cached_superset() {
    let (amadeus, index) = (amadeus(), index());
    let h = harness(vec![amadeus.clone(), index.clone()]);
    h.orchestrator.search(scenario_request()).await.unwrap();

    let mut narrowed = scenario_request();
    narrowed.excluded_airlines = vec!["ib".to_string()];
    narrowed.sort_order = Some(SortOrder::Desc);
    narrowed.max_results = Some(2);
    let response = h.orchestrator.search(narrowed).await.unwrap();

    assert!(response.metadata.cache_hit);
    assert_eq!(prices(&response), eur(&[200, 120]));
    assert_eq!(response.metadata.total_results, 4);
    assert_eq!(response.metadata.results_returned, 2);
    assert_eq!(amadeus.calls(), 1);
    assert_eq!(index.calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn zero_max_results_returns_metadata_only() {
    let h = harness(vec![amadeus(), index()]);
    let mut request = scenario_request();
    request.max_results = Some(0);

    let response = h.orchestrator.search(request).await.unwrap();
    assert!(response.offers.is_empty());
    assert_eq!(response.metadata.total_results, 4);
    assert_eq!(response.metadata.results_returned, 0);
    assert_eq!(response.metadata.price_range.max, Decimal::ZERO);
}

#[tokio::test(start_paused = true)]
async fn other_currency_offers_are_dropped_with_a_warning() {
    let h = harness(vec![amadeus(), index()]);
    let mut request = scenario_request();
    request.currency = Some("usd".to_string());

    let response = h.orchestrator.search(request).await.unwrap();
    assert!(response.offers.is_empty());
    assert_eq!(response.metadata.total_results, 0);
    assert_eq!(response.metadata.currency, "USD");
    assert!(response.metadata.warnings.iter().any(|w| w.contains("EUR")));
}

#[tokio::test(start_paused = true)]
async fn invalid_request_does_no_work() {
    let amadeus = amadeus();
    let h = harness(vec![amadeus.clone()]);
    let mut request = scenario_request();
    request.destination = "LHR".to_string();

    let err = h.orchestrator.search(request).await.unwrap_err();
    assert!(matches!(err, SearchError::InvalidRequest(_)));
    assert_eq!(amadeus.calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn every_offer_satisfies_filters_and_order() {
    let amadeus = Scripted::ok(
        "amadeus",
        10,
        (0..30).map(|i| {
            let mut o = offer(&format!("BA{}", 100 + i), 80 + (i % 7) * 15);
            o.stops = (i % 3) as u32;
            o.duration_minutes = 90 + (i % 5) as u32 * 40;
            o.arrival_time = o.departure_time + chrono::Duration::minutes(i64::from(o.duration_minutes));
            o
        })
        .collect(),
    );
    let index = Scripted::ok("index", 10, vec![offer("LH1800", 95), offer("AF1449", 140)]);
    let h = harness(vec![amadeus, index]);

    let mut request = scenario_request();
    request.max_stops = Some(1);
    request.max_price = Some(Decimal::new(150, 0));
    request.sort_by = Some(SortKey::Duration);
    request.max_results = Some(50);
    let response = h.orchestrator.search(request).await.unwrap();
    assert!(!response.offers.is_empty());

    let filters = FilterPipeline::from_filters(&response.request.filters);
    assert!(response.offers.iter().all(|o| filters.matches(o)));

    let ordering = OfferOrdering::new(response.request.sort, &["amadeus".to_string(), "index".to_string()]);
    for pair in response.offers.windows(2) {
        assert_ne!(ordering.compare(&pair[0], &pair[1]), CmpOrdering::Greater);
    }

    let json = serde_json::to_string(&response).unwrap();
    let back: ComposedResponse = serde_json::from_str(&json).unwrap();
    assert_eq!(back.offers, response.offers);
}

#[tokio::test(start_paused = true)]
async fn cancelled_search_stores_nothing() {
    let slow = Scripted::ok("amadeus", 5_000, vec![offer("BA478", 120)]);
    let h = harness(vec![slow.clone()]);

    let started = tokio::time::Instant::now();
    let err = h
        .orchestrator
        .search_until(scenario_request(), tokio::time::sleep(Duration::from_millis(100)))
        .await
        .unwrap_err();

    assert_eq!(err, SearchError::Cancelled);
    assert!(started.elapsed() < Duration::from_secs(1));
    let normalised = scenario_request()
        .normalise(now().date_naive(), &SearchLimits::default())
        .unwrap();
    let fingerprint = farescope_core::Fingerprint::of(&normalised);
    assert_eq!(h.orchestrator.cache().lookup(&fingerprint).await, Lookup::Miss);
}

#[tokio::test(start_paused = true)]
async fn follower_of_cancelled_leader_retries_as_leader() {
    let provider = Scripted::ok("amadeus", 1_000, vec![offer("BA478", 120)]);
    let h = harness(vec![provider.clone()]);

    let leader = {
        let orchestrator = Arc::clone(&h.orchestrator);
        tokio::spawn(async move {
            orchestrator
                .search_until(scenario_request(), tokio::time::sleep(Duration::from_millis(100)))
                .await
        })
    };
    tokio::task::yield_now().await;
    let follower = {
        let orchestrator = Arc::clone(&h.orchestrator);
        tokio::spawn(async move { orchestrator.search(scenario_request()).await })
    };

    assert_eq!(leader.await.unwrap().unwrap_err(), SearchError::Cancelled);
    let response = follower.await.unwrap().unwrap();
    assert_eq!(response.offers.len(), 1);
    assert_eq!(provider.calls(), 2);
}

#[tokio::test(start_paused = true)]
async fn completed_searches_land_in_history() {
    let clock = Arc::new(ManualClock::new(now()));
    let registry = ProviderRegistry::new().with(amadeus()).unwrap();
    let cache = ResultCache::new(Arc::new(InMemoryResultStore::new()), clock.clone(), Duration::from_secs(900));
    let store = Arc::new(InMemoryHistoryStore::new());
    let (sink, _worker) = HistorySink::spawn(store.clone(), None, 16);
    let orchestrator = SearchOrchestrator::new(
        Arc::new(registry),
        FanOutExecutor::new(Duration::from_secs(30), Duration::from_secs(20)),
        cache,
        clock,
        SearchLimits::default(),
    )
    .with_history(sink);

    let mut request = scenario_request();
    request.session_id = Some("sess-42".to_string());
    let response = orchestrator.search(request).await.unwrap();

    let mut record = None;
    for _ in 0..50 {
        record = orchestrator.find_search(response.search_id).await.unwrap();
        if record.is_some() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    let record = record.expect("history record written");
    assert_eq!(record.summary.total_results, 3);
    assert_eq!(record.request.session_id.expose(), "sess-42");
    assert_eq!(record.summary.top_offer_ids.len(), 3);
    assert_eq!(store.len(), 1);
}

#[tokio::test(start_paused = true)]
async fn cache_hits_from_different_sessions_keep_separate_history() {
    let clock = Arc::new(ManualClock::new(now()));
    let amadeus = amadeus();
    let registry = ProviderRegistry::new().with(amadeus.clone()).unwrap();
    let cache = ResultCache::new(Arc::new(InMemoryResultStore::new()), clock.clone(), Duration::from_secs(900));
    let store = Arc::new(InMemoryHistoryStore::new());
    let (sink, _worker) = HistorySink::spawn(store.clone(), None, 16);
    let orchestrator = SearchOrchestrator::new(
        Arc::new(registry),
        FanOutExecutor::new(Duration::from_secs(30), Duration::from_secs(20)),
        cache,
        clock,
        SearchLimits::default(),
    )
    .with_history(sink);

    let mut ids = Vec::new();
    for session in ["alice", "bob"] {
        let mut request = scenario_request();
        request.session_id = Some(session.to_string());
        ids.push((session, orchestrator.search(request).await.unwrap().search_id));
    }
    assert_eq!(amadeus.calls(), 1);
    assert_ne!(ids[0].1, ids[1].1);

    for _ in 0..50 {
        if store.len() == 2 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(store.len(), 2);
    for (session, search_id) in ids {
        let record = orchestrator.find_search(search_id).await.unwrap().expect("history record written");
        assert_eq!(record.search_id, search_id);
        assert_eq!(record.request.session_id.expose(), session);
    }
}
