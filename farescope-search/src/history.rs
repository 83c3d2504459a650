use async_trait::async_trait;
use chrono::{DateTime, Utc};
use farescope_core::repository::{HistoryRecord, HistoryStore, SearchEventPublisher, StoreError};
use farescope_core::Clock;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Fire-and-forget audit trail of completed searches.
///
/// `record` only enqueues; a background worker writes to the history
/// store and, when configured, publishes the search event. Nothing here
/// ever fails a search.
#[derive(Clone)]
pub struct HistorySink {
    tx: mpsc::Sender<HistoryRecord>,
    store: Arc<dyn HistoryStore>,
}

impl HistorySink {
    pub fn spawn(
        store: Arc<dyn HistoryStore>,
        publisher: Option<Arc<dyn SearchEventPublisher>>,
        capacity: usize,
    ) -> (Self, JoinHandle<()>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let worker = tokio::spawn(run_worker(rx, Arc::clone(&store), publisher));
        (Self { tx, store }, worker)
    }

    /// Queue `record`. Returns false when it had to be dropped.
    pub fn record(&self, record: HistoryRecord) -> bool {
        match self.tx.try_send(record) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(record)) => {
                warn!(search_id = %record.search_id, "History queue full, dropping record");
                false
            }
            Err(mpsc::error::TrySendError::Closed(record)) => {
                warn!(search_id = %record.search_id, "History worker stopped, dropping record");
                false
            }
        }
    }

    pub async fn find(&self, search_id: Uuid) -> Result<Option<HistoryRecord>, StoreError> {
        self.store.find(search_id).await
    }
}

async fn run_worker(
    mut rx: mpsc::Receiver<HistoryRecord>,
    store: Arc<dyn HistoryStore>,
    publisher: Option<Arc<dyn SearchEventPublisher>>,
) {
    info!("History worker started");
    while let Some(record) = rx.recv().await {
        if let Err(err) = store.save(&record).await {
            error!(search_id = %record.search_id, error = %err, "Failed to save search history");
        }
        if let Some(publisher) = &publisher {
            if let Err(err) = publisher.publish_search(&record.to_event()).await {
                error!(search_id = %record.search_id, error = %err, "Failed to publish search event");
            }
        }
        debug!(search_id = %record.search_id, "Search history recorded");
    }
    info!("History worker stopped");
}

/// Periodically drop history older than `retention`.
pub fn spawn_retention(
    store: Arc<dyn HistoryStore>,
    clock: Arc<dyn Clock>,
    retention: chrono::Duration,
    every: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        loop {
            ticker.tick().await;
            match store.purge_before(clock.now() - retention).await {
                Ok(0) => {}
                Ok(purged) => info!(purged, "Purged expired search history"),
                Err(err) => error!(error = %err, "History retention sweep failed"),
            }
        }
    })
}

#[derive(Debug, Default)]
pub struct InMemoryHistoryStore {
    records: RwLock<HashMap<Uuid, HistoryRecord>>,
}

impl InMemoryHistoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }
}

#[async_trait]
impl HistoryStore for InMemoryHistoryStore {
    async fn save(&self, record: &HistoryRecord) -> Result<(), StoreError> {
        self.records.write().insert(record.search_id, record.clone());
        Ok(())
    }

    async fn find(&self, search_id: Uuid) -> Result<Option<HistoryRecord>, StoreError> {
        Ok(self.records.read().get(&search_id).cloned())
    }

    async fn purge_before(&self, cutoff: DateTime<Utc>) -> Result<usize, StoreError> {
        let mut records = self.records.write();
        let before = records.len();
        records.retain(|_, record| record.recorded_at >= cutoff);
        Ok(before - records.len())
    }
}
