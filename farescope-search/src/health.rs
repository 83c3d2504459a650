use farescope_core::{ProviderHealth, ProviderOutcome};
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap};
use tracing::{info, warn};

#[derive(Debug, Clone, Copy)]
struct HealthState {
    health: ProviderHealth,
    consecutive_failures: usize,
}

impl Default for HealthState {
    fn default() -> Self {
        Self {
            health: ProviderHealth::Healthy,
            consecutive_failures: 0,
        }
    }
}

/// Per-provider health derived from consecutive failures.
///
/// Informational only: nothing consults it before calling a provider.
#[derive(Debug)]
pub struct ProviderHealthTracker {
    unhealthy_after: usize,
    states: RwLock<HashMap<String, HealthState>>,
}

impl Default for ProviderHealthTracker {
    fn default() -> Self {
        Self::new(3)
    }
}

impl ProviderHealthTracker {
    /// One failure degrades a provider, `unhealthy_after` in a row marks it unhealthy.
    pub fn new(unhealthy_after: usize) -> Self {
        Self {
            unhealthy_after: unhealthy_after.max(1),
            states: RwLock::new(HashMap::new()),
        }
    }

    pub fn record(&self, provider: &str, outcome: &ProviderOutcome) {
        if matches!(outcome, ProviderOutcome::Cancelled) {
            return;
        }
        let mut states = self.states.write();
        let state = states.entry(provider.to_string()).or_default();
        let previous = state.health;

        if outcome.is_success() {
            state.consecutive_failures = 0;
            state.health = ProviderHealth::Healthy;
            if previous != ProviderHealth::Healthy {
                info!(provider, "Provider recovered");
            }
            return;
        }

        state.consecutive_failures += 1;
        state.health = if state.consecutive_failures >= self.unhealthy_after {
            ProviderHealth::Unhealthy
        } else {
            ProviderHealth::Degraded
        };
        if state.health != previous {
            warn!(
                provider,
                failures = state.consecutive_failures,
                health = ?state.health,
                kind = ?outcome.error_kind(),
                "Provider health changed"
            );
        }
    }

    pub fn health(&self, provider: &str) -> ProviderHealth {
        self.states
            .read()
            .get(provider)
            .map(|s| s.health)
            .unwrap_or(ProviderHealth::Healthy)
    }

    /// Health of every `provider`, healthy when never seen.
    pub fn snapshot(&self, providers: &[String]) -> BTreeMap<String, ProviderHealth> {
        providers
            .iter()
            .map(|name| (name.clone(), self.health(name)))
            .collect()
    }
}
