use anyhow::{bail, Context};
use farescope_api::{airports::AirportSuggester, app, AppState};
use farescope_core::repository::{HistoryStore, OfferIndex, ResultStore, SearchEventPublisher};
use farescope_core::{AirportDirectory, Clock, FlightProvider, SearchLimits, SystemClock};
use farescope_search::{
    spawn_retention, FanOutExecutor, HistorySink, HttpProvider, InMemoryHistoryStore, InMemoryOfferIndex,
    InMemoryResultStore, IndexProvider, ProviderRegistry, ResultCache, SearchOrchestrator,
};
use farescope_store::app_config::{Config, HistoryBackend, ProviderKind, StorageBackend};
use farescope_store::{DbClient, EventProducer, PostgresHistoryStore, RedisClient};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const CLEANUP_INTERVAL: Duration = Duration::from_secs(60);
const RETENTION_SWEEP_INTERVAL: Duration = Duration::from_secs(3600);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "farescope_api=debug,farescope_search=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::load().context("Failed to load config")?;
    tracing::info!("Starting Farescope API on port {}", config.server.port);

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    let redis = match &config.storage.redis_url {
        Some(url) if config.storage.backend == StorageBackend::Redis || config.history.backend == HistoryBackend::Redis => {
            let client = RedisClient::new(url)
                .await
                .context("Failed to create Redis client")?
                .with_history_retention(config.history.retention());
            let client = match config.storage.index_ttl() {
                Some(ttl) => client.with_index_ttl(ttl),
                None => client,
            };
            client.ping().await.context("Failed to connect to Redis")?;
            Some(Arc::new(client))
        }
        _ => None,
    };

    // Result cache and offer index share a backend.
    let (result_store, offer_index): (Arc<dyn ResultStore>, Arc<dyn OfferIndex>) = match config.storage.backend {
        StorageBackend::Redis => {
            let redis = redis.clone().context("storage.redis_url is required for the redis backend")?;
            (redis.clone(), redis)
        }
        StorageBackend::Memory => {
            let store = Arc::new(InMemoryResultStore::new());
            store.clone().spawn_cleanup(clock.clone(), CLEANUP_INTERVAL);
            (store, Arc::new(InMemoryOfferIndex::new()))
        }
    };

    let mut available: HashMap<String, Arc<dyn FlightProvider>> = HashMap::new();
    let mut executor = FanOutExecutor::new(config.search.global_deadline(), config.search.provider_timeout());
    for name in &config.search.enabled_providers {
        let Some(provider) = config.providers.get(name) else {
            bail!("provider '{}' is enabled but has no [providers.{}] section", name, name);
        };
        let adapter: Arc<dyn FlightProvider> = match provider.kind {
            ProviderKind::Http => {
                let url = provider
                    .url
                    .clone()
                    .with_context(|| format!("provider '{}' needs a url", name))?;
                Arc::new(HttpProvider::new(name.clone(), url))
            }
            ProviderKind::Index => Arc::new(IndexProvider::new(name.clone(), offer_index.clone())),
        };
        if let Some(ms) = provider.timeout_ms {
            executor = executor.with_provider_timeout(name.clone(), Duration::from_millis(ms));
        }
        available.insert(name.clone(), adapter);
    }
    let registry = ProviderRegistry::from_enabled(&config.search.enabled_providers, available)?;
    tracing::info!(providers = ?registry.names(), "Provider registry ready");

    let history_store: Arc<dyn HistoryStore> = match config.history.backend {
        HistoryBackend::Memory => Arc::new(InMemoryHistoryStore::new()),
        HistoryBackend::Redis => redis.clone().context("storage.redis_url is required for redis history")?,
        HistoryBackend::Postgres => {
            let url = config
                .history
                .database_url
                .as_deref()
                .context("history.database_url is required for postgres history")?;
            let db = DbClient::new(url).await.context("Failed to connect to Postgres")?;
            db.migrate().await.context("Failed to run migrations")?;
            Arc::new(PostgresHistoryStore::new(db))
        }
    };
    let retention = chrono::Duration::from_std(config.history.retention()).context("history retention out of range")?;
    spawn_retention(history_store.clone(), clock.clone(), retention, RETENTION_SWEEP_INTERVAL);

    let publisher: Option<Arc<dyn SearchEventPublisher>> = if config.kafka.enabled {
        let producer = EventProducer::new(&config.kafka.brokers, &config.kafka.topic)
            .context("Failed to create Kafka producer")?;
        Some(Arc::new(producer))
    } else {
        None
    };
    let (history, _history_worker) = HistorySink::spawn(history_store, publisher, config.history.queue_capacity);

    let limits = SearchLimits {
        max_results_default: config.search.max_results_default,
        max_results_hard_cap: config.search.max_results_hard_cap,
        default_currency: config.search.default_currency.clone(),
    };
    let cache = ResultCache::new(result_store, clock.clone(), config.search.cache_ttl());
    let orchestrator = SearchOrchestrator::new(Arc::new(registry), executor, cache, clock, limits).with_history(history);

    let airports = AirportSuggester::new(
        AirportDirectory::builtin(),
        Duration::from_secs(config.suggest.cache_ttl_seconds),
        config.suggest.default_limit,
    );

    let state = AppState::new(Arc::new(orchestrator), Arc::new(airports), config.server.max_in_flight)
        .with_request_timeout(config.server.request_timeout());
    let app = app(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("Shutdown signal received");
        })
        .await?;
    Ok(())
}
