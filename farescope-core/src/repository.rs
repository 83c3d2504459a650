use crate::fingerprint::Fingerprint;
use crate::offer::Offer;
use crate::provider::{ProviderError, ProviderErrorKind};
use crate::response::{CachedSearch, ComposedResponse, DurationRange, PriceRange};
use crate::search::NormalisedRequest;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use farescope_shared::models::events::SearchPerformedEvent;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;
use uuid::Uuid;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Storage backend error: {0}")]
    Backend(String),
    #[error("Stored payload could not be decoded: {0}")]
    Codec(String),
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::Codec(err.to_string())
    }
}

/// An unreachable backend reads as an upstream failure, a bad payload as
/// a parse failure.
impl From<StoreError> for ProviderError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Backend(msg) => ProviderError::new(ProviderErrorKind::Upstream5xx, msg),
            StoreError::Codec(msg) => ProviderError::new(ProviderErrorKind::Parse, msg),
        }
    }
}

/// Key-value storage behind the result cache.
#[async_trait]
pub trait ResultStore: Send + Sync {
    async fn get(&self, fingerprint: &Fingerprint) -> Result<Option<CachedSearch>, StoreError>;

    /// Last writer wins on the same fingerprint.
    async fn put(
        &self,
        fingerprint: &Fingerprint,
        entry: &CachedSearch,
        ttl: Duration,
    ) -> Result<(), StoreError>;

    async fn remove(&self, fingerprint: &Fingerprint) -> Result<(), StoreError>;
}

/// Compact outcome of one search, stored next to the request in history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchSummary {
    pub total_results: usize,
    pub results_returned: usize,
    pub search_time_ms: u64,
    pub cache_hit: bool,
    pub currency: String,
    pub price_range: PriceRange,
    pub duration_range: DurationRange,
    pub providers_successful: Vec<String>,
    pub providers_errors: BTreeMap<String, ProviderErrorKind>,
    pub top_offer_ids: Vec<String>,
}

const TOP_OFFERS_KEPT: usize = 5;

impl SearchSummary {
    pub fn from_response(response: &ComposedResponse) -> Self {
        let meta = &response.metadata;
        Self {
            total_results: meta.total_results,
            results_returned: meta.results_returned,
            search_time_ms: meta.search_time_ms,
            cache_hit: meta.cache_hit,
            currency: meta.currency.clone(),
            price_range: meta.price_range.clone(),
            duration_range: meta.duration_range,
            providers_successful: meta.providers_successful.clone(),
            providers_errors: meta.providers_errors.clone(),
            top_offer_ids: response
                .offers
                .iter()
                .take(TOP_OFFERS_KEPT)
                .map(|o| o.id.clone())
                .collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryRecord {
    pub search_id: Uuid,
    pub request: NormalisedRequest,
    pub summary: SearchSummary,
    pub recorded_at: DateTime<Utc>,
}

impl HistoryRecord {
    pub fn new(response: &ComposedResponse, recorded_at: DateTime<Utc>) -> Self {
        Self {
            search_id: response.search_id,
            request: response.request.clone(),
            summary: SearchSummary::from_response(response),
            recorded_at,
        }
    }

    pub fn to_event(&self) -> SearchPerformedEvent {
        SearchPerformedEvent {
            search_id: self.search_id,
            session_id: self.request.session_id.clone(),
            user_id: self.request.user_id.clone(),
            origin: self.request.origin.to_string(),
            destination: self.request.destination.to_string(),
            departure_date: self.request.departure_date,
            return_date: self.request.return_date,
            passengers: self.request.passengers,
            cabin: self.request.cabin.as_str().to_string(),
            total_results: self.summary.total_results,
            results_returned: self.summary.results_returned,
            cache_hit: self.summary.cache_hit,
            providers_successful: self.summary.providers_successful.clone(),
            providers_failed: self.summary.providers_errors.keys().cloned().collect(),
            search_time_ms: self.summary.search_time_ms,
            timestamp: self.recorded_at,
        }
    }
}

/// Persistent search history, keyed by search id (last writer wins).
#[async_trait]
pub trait HistoryStore: Send + Sync {
    async fn save(&self, record: &HistoryRecord) -> Result<(), StoreError>;

    async fn find(&self, search_id: Uuid) -> Result<Option<HistoryRecord>, StoreError>;

    /// Drop records older than `cutoff`; returns how many went.
    /// Backends with native expiry may return 0.
    async fn purge_before(&self, cutoff: DateTime<Utc>) -> Result<usize, StoreError>;
}

/// Pre-computed offers indexed by fingerprint.
#[async_trait]
pub trait OfferIndex: Send + Sync {
    async fn query_by_fingerprint(
        &self,
        fingerprint: &Fingerprint,
        request: &NormalisedRequest,
    ) -> Result<Vec<Offer>, StoreError>;

    async fn commit(&self, fingerprint: &Fingerprint, offers: &[Offer]) -> Result<(), StoreError>;
}

/// Outbound analytics bus.
#[async_trait]
pub trait SearchEventPublisher: Send + Sync {
    async fn publish_search(&self, event: &SearchPerformedEvent) -> Result<(), StoreError>;
}
