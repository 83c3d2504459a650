use crate::offer::Offer;
use crate::provider::{ProviderErrorKind, ProviderOutcome};
use crate::search::NormalisedRequest;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceRange {
    pub min: Decimal,
    pub max: Decimal,
    pub average: Decimal,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DurationRange {
    pub min: u32,
    pub max: u32,
    pub average: u32,
}

/// Non-offer portion of a response: provenance, timing and provider status.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchMetadata {
    pub total_results: usize,
    pub results_returned: usize,
    pub search_time_ms: u64,
    pub providers_queried: Vec<String>,
    pub providers_successful: Vec<String>,
    pub providers_errors: BTreeMap<String, ProviderErrorKind>,
    pub provider_latency_ms: BTreeMap<String, u64>,
    pub cache_hit: bool,
    pub from_cache: bool,
    pub currency: String,
    pub price_range: PriceRange,
    pub duration_range: DurationRange,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComposedResponse {
    pub search_id: Uuid,
    pub request: NormalisedRequest,
    pub offers: Vec<Offer>,
    pub metadata: SearchMetadata,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

/// Per-provider summary kept alongside cached offers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderReport {
    pub name: String,
    pub error: Option<ProviderErrorKind>,
    pub latency_ms: u64,
    pub offers: usize,
}

impl ProviderReport {
    pub fn from_outcome(name: &str, outcome: &ProviderOutcome) -> Self {
        let offers = match outcome {
            ProviderOutcome::Success { offers, .. } => offers.len(),
            _ => 0,
        };
        Self {
            name: name.to_string(),
            error: outcome.error_kind(),
            latency_ms: outcome.latency().as_millis() as u64,
            offers,
        }
    }

    pub fn succeeded(&self) -> bool {
        self.error.is_none()
    }
}

/// What the result cache holds for one fingerprint: the merged,
/// deduplicated superset of offers from one fan-out. Each request's
/// filters, ordering and truncation are applied on the way out.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachedSearch {
    pub search_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub offers: Vec<Offer>,
    pub providers: Vec<ProviderReport>,
    #[serde(default)]
    pub warnings: Vec<String>,
}

impl CachedSearch {
    /// Entries at or past their expiry are stale and behave like misses.
    pub fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        now < self.expires_at
    }

    pub fn any_provider_succeeded(&self) -> bool {
        self.providers.iter().any(ProviderReport::succeeded)
    }
}
