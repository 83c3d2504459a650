use crate::cache::{Fetched, ResultCache, Source};
use crate::error::SearchError;
use crate::executor::FanOutExecutor;
use crate::health::ProviderHealthTracker;
use crate::history::HistorySink;
use crate::registry::ProviderRegistry;
use farescope_core::repository::{HistoryRecord, StoreError};
use farescope_core::{
    CachedSearch, Clock, ComposedResponse, Fingerprint, NormalisedRequest, ProviderHealth, ProviderOutcome,
    ProviderReport, SearchLimits, SearchRequest,
};
use farescope_offer::{merge_offers, select_offers, MetadataAssembler, ProviderBatch};
use futures_util::FutureExt;
use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;
use tokio::time::Instant;
use tracing::{info, warn};
use uuid::Uuid;

/// Entry point for flight searches.
///
/// Normalises the request, serves it from the result cache or fans out to
/// every registered provider, then filters, orders and truncates the
/// merged offers for this particular caller.
pub struct SearchOrchestrator {
    registry: Arc<ProviderRegistry>,
    executor: FanOutExecutor,
    cache: ResultCache,
    health: Arc<ProviderHealthTracker>,
    clock: Arc<dyn Clock>,
    limits: SearchLimits,
    history: Option<HistorySink>,
}

impl SearchOrchestrator {
    pub fn new(
        registry: Arc<ProviderRegistry>,
        executor: FanOutExecutor,
        cache: ResultCache,
        clock: Arc<dyn Clock>,
        limits: SearchLimits,
    ) -> Self {
        Self {
            registry,
            executor,
            cache,
            health: Arc::new(ProviderHealthTracker::default()),
            clock,
            limits,
            history: None,
        }
    }

    pub fn with_history(mut self, sink: HistorySink) -> Self {
        self.history = Some(sink);
        self
    }

    pub fn with_health_tracker(mut self, health: Arc<ProviderHealthTracker>) -> Self {
        self.health = health;
        self
    }

    pub fn cache(&self) -> &ResultCache {
        &self.cache
    }

    pub fn provider_health(&self) -> BTreeMap<String, ProviderHealth> {
        self.health.snapshot(&self.registry.names())
    }

    pub async fn search(&self, request: SearchRequest) -> Result<ComposedResponse, SearchError> {
        self.search_until(request, std::future::pending()).await
    }

    /// Run a search that is abandoned as soon as `cancel` resolves.
    ///
    /// A cancelled search stores nothing and writes no history. Callers
    /// following this search through single-flight are unaffected.
    ///
    /// Followers share the leader's search id and response, so only the
    /// leader writes a history record for it.
    pub async fn search_until<C>(&self, request: SearchRequest, cancel: C) -> Result<ComposedResponse, SearchError>
    where
        C: Future<Output = ()>,
    {
        let started = Instant::now();
        let request = request.normalise(self.clock.today(), &self.limits)?;
        let fingerprint = Fingerprint::of(&request);
        let cancel = cancel.shared();

        let (response, source) = tokio::select! {
            biased;
            composed = self.compose(&request, &fingerprint, started, cancel.clone()) => composed?,
            _ = cancel => return Err(SearchError::Cancelled),
        };

        if let Some(history) = self.history.as_ref().filter(|_| source != Source::Shared) {
            history.record(HistoryRecord::new(&response, self.clock.now()));
        }
        info!(
            fingerprint = %fingerprint,
            search_id = %response.search_id,
            total_results = response.metadata.total_results,
            results_returned = response.metadata.results_returned,
            cache_hit = response.metadata.cache_hit,
            search_time_ms = response.metadata.search_time_ms,
            "Search completed"
        );
        Ok(response)
    }

    async fn compose<C>(
        &self,
        request: &NormalisedRequest,
        fingerprint: &Fingerprint,
        started: Instant,
        cancel: C,
    ) -> Result<(ComposedResponse, Source), SearchError>
    where
        C: Future<Output = ()>,
    {
        let fetched = self
            .cache
            .fetch_or_load(fingerprint, || self.load(request, started, cancel))
            .await?;
        let from_cache = fetched.from_cache();
        let Fetched { entry, source } = fetched;
        // A stored entry answers many searches; each gets its own id.
        let search_id = match source {
            Source::Cache => Uuid::new_v4(),
            Source::Loaded | Source::Shared => entry.search_id,
        };

        let provider_order = self.registry.names();
        let selection = select_offers(&entry.offers, request, &provider_order);
        let metadata = MetadataAssembler::new(&request.currency, &entry.providers)
            .from_cache(from_cache)
            .warnings(entry.warnings.iter().cloned().chain(selection.warnings))
            .assemble(&selection.offers, selection.total_results, started.elapsed());

        let response = ComposedResponse {
            search_id,
            request: request.clone(),
            offers: selection.offers,
            metadata,
            created_at: entry.created_at,
            expires_at: entry.expires_at,
        };
        Ok((response, source))
    }

    /// Fan out to every provider and merge what came back.
    async fn load<C>(&self, request: &NormalisedRequest, started: Instant, cancel: C) -> Result<CachedSearch, SearchError>
    where
        C: Future<Output = ()>,
    {
        let fan_out = self
            .executor
            .execute_until(request, self.registry.providers(), cancel)
            .await;
        if fan_out.cancelled {
            return Err(SearchError::Cancelled);
        }

        let mut reports = Vec::with_capacity(fan_out.outcomes.len());
        let mut batches = Vec::new();
        for (name, outcome) in fan_out.outcomes {
            self.health.record(&name, &outcome);
            reports.push(ProviderReport::from_outcome(&name, &outcome));
            match outcome {
                ProviderOutcome::Success { offers, .. } => batches.push(ProviderBatch { provider: name, offers }),
                ProviderOutcome::Error { kind, message, .. } => {
                    warn!(provider = %name, %kind, %message, "Provider failed");
                }
                ProviderOutcome::Timeout { latency } => {
                    warn!(provider = %name, latency_ms = latency.as_millis() as u64, "Provider timed out");
                }
                ProviderOutcome::Cancelled => {}
            }
        }

        if batches.is_empty() {
            let metadata = MetadataAssembler::new(&request.currency, &reports).assemble(&[], 0, started.elapsed());
            warn!(providers = reports.len(), "Every provider failed");
            return Err(SearchError::AllProvidersFailed {
                metadata: Box::new(metadata),
            });
        }

        let now = self.clock.now();
        let merged = merge_offers(batches, now);
        let ttl = chrono::Duration::from_std(self.cache.ttl()).unwrap_or(chrono::Duration::zero());
        Ok(CachedSearch {
            search_id: Uuid::new_v4(),
            created_at: now,
            expires_at: now + ttl,
            offers: merged.offers,
            providers: reports,
            warnings: merged.warnings,
        })
    }

    /// Look up a recorded search.
    pub async fn find_search(&self, search_id: Uuid) -> Result<Option<HistoryRecord>, StoreError> {
        match &self.history {
            Some(history) => history.find(search_id).await,
            None => Ok(None),
        }
    }
}
