use crate::error::SearchError;
use crate::single_flight::{Role, SingleFlight};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use farescope_core::repository::{ResultStore, StoreError};
use farescope_core::{CachedSearch, Clock, Fingerprint};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, PartialEq)]
pub enum Lookup {
    Fresh(CachedSearch),
    Stale,
    Miss,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Source {
    /// Served from a stored entry.
    Cache,
    /// This caller ran the loader.
    Loaded,
    /// Another caller ran the loader while this one waited.
    Shared,
}

#[derive(Debug, Clone)]
pub struct Fetched {
    pub entry: CachedSearch,
    pub source: Source,
}

impl Fetched {
    pub fn from_cache(&self) -> bool {
        self.source == Source::Cache
    }
}

/// Fingerprint-keyed cache of merged searches with single-flight loading.
pub struct ResultCache {
    store: Arc<dyn ResultStore>,
    clock: Arc<dyn Clock>,
    ttl: Duration,
    flights: SingleFlight<Fingerprint, Result<CachedSearch, SearchError>>,
}

impl ResultCache {
    pub fn new(store: Arc<dyn ResultStore>, clock: Arc<dyn Clock>, ttl: Duration) -> Self {
        Self {
            store,
            clock,
            ttl,
            flights: SingleFlight::new(),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Storage errors read as a miss.
    pub async fn lookup(&self, fingerprint: &Fingerprint) -> Lookup {
        match self.store.get(fingerprint).await {
            Ok(Some(entry)) if entry.is_fresh(self.clock.now()) => Lookup::Fresh(entry),
            Ok(Some(_)) => Lookup::Stale,
            Ok(None) => Lookup::Miss,
            Err(err) => {
                warn!(fingerprint = %fingerprint, error = %err, "Cache lookup failed, treating as miss");
                Lookup::Miss
            }
        }
    }

    /// Storage errors are logged and swallowed.
    pub async fn store(&self, fingerprint: &Fingerprint, entry: &CachedSearch) {
        if let Err(err) = self.store.put(fingerprint, entry, self.ttl).await {
            warn!(fingerprint = %fingerprint, error = %err, "Failed to store search in cache");
        }
    }

    pub async fn invalidate(&self, fingerprint: &Fingerprint) {
        if let Err(err) = self.store.remove(fingerprint).await {
            warn!(fingerprint = %fingerprint, error = %err, "Failed to invalidate cache entry");
        }
    }

    /// Serve `fingerprint` from the cache, or run `loader` exactly once
    /// across all concurrent callers missing on it.
    ///
    /// Followers get the leader's result, error included. When the leader
    /// goes away without a result (its caller was cancelled, or it
    /// panicked), followers start over and one of them leads.
    /// Successful loads are stored before followers are released; errors
    /// are never stored.
    pub async fn fetch_or_load<F, Fut>(&self, fingerprint: &Fingerprint, loader: F) -> Result<Fetched, SearchError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<CachedSearch, SearchError>>,
    {
        let guard = loop {
            if let Lookup::Fresh(entry) = self.lookup(fingerprint).await {
                debug!(fingerprint = %fingerprint, "Cache hit");
                return Ok(Fetched { entry, source: Source::Cache });
            }
            match self.flights.join(fingerprint) {
                Role::Leader(guard) => break guard,
                Role::Follower(follower) => match follower.wait().await {
                    Some(result) => {
                        return result.map(|entry| Fetched { entry, source: Source::Shared });
                    }
                    None => debug!(fingerprint = %fingerprint, "Leader abandoned its flight, retrying"),
                },
            }
        };

        // A previous leader may have stored between our lookup and join.
        if let Lookup::Fresh(entry) = self.lookup(fingerprint).await {
            guard.complete(Ok(entry.clone()));
            return Ok(Fetched { entry, source: Source::Cache });
        }

        let result = loader().await;
        match &result {
            Ok(entry) => self.store(fingerprint, entry).await,
            Err(SearchError::Cancelled) => return Err(SearchError::Cancelled),
            Err(err) => debug!(fingerprint = %fingerprint, error = %err, "Loader failed, not caching"),
        }
        guard.complete(result.clone());
        result.map(|entry| Fetched { entry, source: Source::Loaded })
    }
}

/// Process-local [`ResultStore`].
#[derive(Debug, Default)]
pub struct InMemoryResultStore {
    entries: RwLock<HashMap<Fingerprint, CachedSearch>>,
}

impl InMemoryResultStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Drop entries that expired at or before `now`.
    pub fn purge_expired(&self, now: DateTime<Utc>) -> usize {
        let mut entries = self.entries.write();
        let before = entries.len();
        entries.retain(|_, entry| entry.is_fresh(now));
        before - entries.len()
    }

    /// Periodically purge expired entries until the handle is aborted.
    pub fn spawn_cleanup(self: Arc<Self>, clock: Arc<dyn Clock>, every: Duration) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            loop {
                ticker.tick().await;
                let purged = self.purge_expired(clock.now());
                if purged > 0 {
                    info!(purged, "Purged expired cache entries");
                }
            }
        })
    }
}

#[async_trait]
impl ResultStore for InMemoryResultStore {
    async fn get(&self, fingerprint: &Fingerprint) -> Result<Option<CachedSearch>, StoreError> {
        Ok(self.entries.read().get(fingerprint).cloned())
    }

    async fn put(&self, fingerprint: &Fingerprint, entry: &CachedSearch, _ttl: Duration) -> Result<(), StoreError> {
        self.entries.write().insert(fingerprint.clone(), entry.clone());
        Ok(())
    }

    async fn remove(&self, fingerprint: &Fingerprint) -> Result<(), StoreError> {
        self.entries.write().remove(fingerprint);
        Ok(())
    }
}
