use crate::pii::Redacted;
use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Published to the analytics bus once per recorded search.
#[derive(Debug, serde::Serialize, serde::Deserialize, Clone)]
pub struct SearchPerformedEvent {
    pub search_id: Uuid,
    pub session_id: Redacted<String>,
    pub user_id: Option<Redacted<String>>,
    pub origin: String,
    pub destination: String,
    pub departure_date: chrono::NaiveDate,
    pub return_date: Option<chrono::NaiveDate>,
    pub passengers: u8,
    pub cabin: String,
    pub total_results: usize,
    pub results_returned: usize,
    pub cache_hit: bool,
    pub providers_successful: Vec<String>,
    pub providers_failed: Vec<String>,
    pub search_time_ms: u64,
    pub timestamp: DateTime<Utc>,
}

impl SearchPerformedEvent {
    /// Partition key on the bus; all events of one session land in order.
    pub fn partition_key(&self) -> &str {
        self.session_id.expose()
    }
}
