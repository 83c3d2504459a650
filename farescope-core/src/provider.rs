use crate::offer::Offer;
use crate::search::NormalisedRequest;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{Duration, Instant};

/// Classified provider failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderErrorKind {
    Auth,
    RateLimit,
    #[serde(rename = "upstream_5xx")]
    Upstream5xx,
    Timeout,
    Network,
    Parse,
    Other,
}

impl ProviderErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderErrorKind::Auth => "auth",
            ProviderErrorKind::RateLimit => "rate_limit",
            ProviderErrorKind::Upstream5xx => "upstream_5xx",
            ProviderErrorKind::Timeout => "timeout",
            ProviderErrorKind::Network => "network",
            ProviderErrorKind::Parse => "parse",
            ProviderErrorKind::Other => "other",
        }
    }
}

impl fmt::Display for ProviderErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{kind} error: {message}")]
pub struct ProviderError {
    pub kind: ProviderErrorKind,
    pub message: String,
}

impl ProviderError {
    pub fn new(kind: ProviderErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

/// Terminal state of one provider call within a fan-out.
#[derive(Debug, Clone, PartialEq)]
pub enum ProviderOutcome {
    Success { offers: Vec<Offer>, latency: Duration },
    Error { kind: ProviderErrorKind, message: String, latency: Duration },
    Timeout { latency: Duration },
    Cancelled,
}

impl ProviderOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, ProviderOutcome::Success { .. })
    }

    /// Kind reported in metadata for non-success outcomes.
    pub fn error_kind(&self) -> Option<ProviderErrorKind> {
        match self {
            ProviderOutcome::Success { .. } => None,
            ProviderOutcome::Error { kind, .. } => Some(*kind),
            ProviderOutcome::Timeout { .. } => Some(ProviderErrorKind::Timeout),
            ProviderOutcome::Cancelled => Some(ProviderErrorKind::Other),
        }
    }

    pub fn latency(&self) -> Duration {
        match self {
            ProviderOutcome::Success { latency, .. }
            | ProviderOutcome::Error { latency, .. }
            | ProviderOutcome::Timeout { latency } => *latency,
            ProviderOutcome::Cancelled => Duration::ZERO,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderHealth {
    Healthy,
    Degraded,
    Unhealthy,
}

/// A stateless flight-offer source: an external API adapter or the
/// internal offer index.
#[async_trait]
pub trait FlightProvider: Send + Sync {
    /// Stable name used in metadata, logs and configuration.
    fn name(&self) -> &str;

    /// Search offers for `request`. Implementations should give up on
    /// their own by `deadline`; the executor enforces it regardless.
    async fn search(
        &self,
        request: &NormalisedRequest,
        deadline: Instant,
    ) -> Result<Vec<Offer>, ProviderError>;
}
