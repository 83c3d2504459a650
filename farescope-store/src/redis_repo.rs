use async_trait::async_trait;
use chrono::{DateTime, Utc};
use farescope_core::repository::{HistoryRecord, HistoryStore, OfferIndex, ResultStore, StoreError};
use farescope_core::{CachedSearch, Fingerprint, NormalisedRequest, Offer};
use redis::AsyncCommands;
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::{debug, info};
use uuid::Uuid;

const SEARCH_NAMESPACE: &str = "search";
const INDEX_NAMESPACE: &str = "offers";

fn history_key(search_id: Uuid) -> String {
    format!("history:{}", search_id)
}

fn backend(err: redis::RedisError) -> StoreError {
    StoreError::Backend(err.to_string())
}

fn decode<T: DeserializeOwned>(raw: Option<String>) -> Result<Option<T>, StoreError> {
    raw.map(|payload| serde_json::from_str(&payload))
        .transpose()
        .map_err(StoreError::from)
}

/// Redis-backed result store, history store and offer index.
///
/// Payloads are JSON strings; expiry is left to Redis (`SET EX`).
#[derive(Clone)]
pub struct RedisClient {
    client: redis::Client,
    history_ttl: Duration,
    index_ttl: Option<Duration>,
}

impl RedisClient {
    pub async fn new(connection_string: &str) -> Result<Self, redis::RedisError> {
        let client = redis::Client::open(connection_string)?;
        Ok(Self {
            client,
            history_ttl: Duration::from_secs(720 * 3600),
            index_ttl: None,
        })
    }

    pub fn with_history_retention(mut self, retention: Duration) -> Self {
        self.history_ttl = retention;
        self
    }

    pub fn with_index_ttl(mut self, ttl: Duration) -> Self {
        self.index_ttl = Some(ttl);
        self
    }

    pub async fn ping(&self) -> Result<(), redis::RedisError> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        redis::cmd("PING").query_async::<String>(&mut conn).await?;
        info!("Redis connection established");
        Ok(())
    }

    async fn get_json<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, StoreError> {
        let mut conn = self.client.get_multiplexed_async_connection().await.map_err(backend)?;
        let raw: Option<String> = conn.get(key).await.map_err(backend)?;
        decode(raw)
    }

    async fn set_json(&self, key: &str, payload: String, ttl: Option<Duration>) -> Result<(), StoreError> {
        let mut conn = self.client.get_multiplexed_async_connection().await.map_err(backend)?;
        match ttl {
            // EX takes whole seconds and rejects 0.
            Some(ttl) => conn
                .set_ex::<_, _, ()>(key, payload, ttl.as_secs().max(1))
                .await
                .map_err(backend)?,
            None => conn.set::<_, _, ()>(key, payload).await.map_err(backend)?,
        }
        Ok(())
    }
}

#[async_trait]
impl ResultStore for RedisClient {
    async fn get(&self, fingerprint: &Fingerprint) -> Result<Option<CachedSearch>, StoreError> {
        self.get_json(&fingerprint.storage_key(SEARCH_NAMESPACE)).await
    }

    async fn put(&self, fingerprint: &Fingerprint, entry: &CachedSearch, ttl: Duration) -> Result<(), StoreError> {
        let key = fingerprint.storage_key(SEARCH_NAMESPACE);
        self.set_json(&key, serde_json::to_string(entry)?, Some(ttl)).await?;
        debug!(fingerprint = %fingerprint, ttl_secs = ttl.as_secs(), "Cached search in Redis");
        Ok(())
    }

    async fn remove(&self, fingerprint: &Fingerprint) -> Result<(), StoreError> {
        let mut conn = self.client.get_multiplexed_async_connection().await.map_err(backend)?;
        conn.del::<_, ()>(fingerprint.storage_key(SEARCH_NAMESPACE))
            .await
            .map_err(backend)
    }
}

#[async_trait]
impl HistoryStore for RedisClient {
    async fn save(&self, record: &HistoryRecord) -> Result<(), StoreError> {
        let payload = serde_json::to_string(record)?;
        self.set_json(&history_key(record.search_id), payload, Some(self.history_ttl))
            .await
    }

    async fn find(&self, search_id: Uuid) -> Result<Option<HistoryRecord>, StoreError> {
        self.get_json(&history_key(search_id)).await
    }

    async fn purge_before(&self, _cutoff: DateTime<Utc>) -> Result<usize, StoreError> {
        // Keys carry their own expiry.
        Ok(0)
    }
}

#[async_trait]
impl OfferIndex for RedisClient {
    async fn query_by_fingerprint(
        &self,
        fingerprint: &Fingerprint,
        _request: &NormalisedRequest,
    ) -> Result<Vec<Offer>, StoreError> {
        let offers: Option<Vec<Offer>> = self.get_json(&fingerprint.storage_key(INDEX_NAMESPACE)).await?;
        Ok(offers.unwrap_or_default())
    }

    async fn commit(&self, fingerprint: &Fingerprint, offers: &[Offer]) -> Result<(), StoreError> {
        let key = fingerprint.storage_key(INDEX_NAMESPACE);
        self.set_json(&key, serde_json::to_string(offers)?, self.index_ttl).await
    }
}
