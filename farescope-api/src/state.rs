use crate::airports::AirportSuggester;
use farescope_search::SearchOrchestrator;
use std::sync::Arc;
use std::time::Duration;

const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(35);

#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<SearchOrchestrator>,
    pub airports: Arc<AirportSuggester>,
    /// Requests served concurrently before callers queue.
    pub max_in_flight: usize,
    pub request_timeout: Duration,
}

impl AppState {
    pub fn new(orchestrator: Arc<SearchOrchestrator>, airports: Arc<AirportSuggester>, max_in_flight: usize) -> Self {
        Self {
            orchestrator,
            airports,
            max_in_flight: max_in_flight.max(1),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }
}
