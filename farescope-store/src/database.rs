use async_trait::async_trait;
use chrono::{DateTime, Utc};
use farescope_core::repository::{HistoryRecord, HistoryStore, StoreError};
use sqlx::postgres::PgPoolOptions;
use sqlx::types::Json;
use sqlx::{Pool, Postgres, Row};
use std::time::Duration;
use tracing::info;
use uuid::Uuid;

fn backend(err: sqlx::Error) -> StoreError {
    StoreError::Backend(err.to_string())
}

#[derive(Clone)]
pub struct DbClient {
    pub pool: Pool<Postgres>,
}

impl DbClient {
    pub async fn new(connection_string: &str) -> Result<Self, sqlx::Error> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .acquire_timeout(Duration::from_secs(3))
            .connect(connection_string)
            .await?;

        Ok(Self { pool })
    }

    pub async fn migrate(&self) -> Result<(), sqlx::migrate::MigrateError> {
        info!("Running database migrations...");
        sqlx::migrate!("../migrations").run(&self.pool).await?;
        info!("Migrations completed successfully.");
        Ok(())
    }
}

/// Search history in Postgres, one JSONB row per search id.
#[derive(Clone)]
pub struct PostgresHistoryStore {
    db: DbClient,
}

impl PostgresHistoryStore {
    pub fn new(db: DbClient) -> Self {
        Self { db }
    }
}

#[async_trait]
impl HistoryStore for PostgresHistoryStore {
    async fn save(&self, record: &HistoryRecord) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO search_history (search_id, session_id, user_id, origin, destination, record, recorded_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (search_id) DO UPDATE
            SET record = EXCLUDED.record, recorded_at = EXCLUDED.recorded_at
            "#,
        )
        .bind(record.search_id)
        .bind(record.request.session_id.expose())
        .bind(record.request.user_id.as_ref().map(|u| u.expose().clone()))
        .bind(record.request.origin.as_str())
        .bind(record.request.destination.as_str())
        .bind(Json(record))
        .bind(record.recorded_at)
        .execute(&self.db.pool)
        .await
        .map_err(backend)?;
        Ok(())
    }

    async fn find(&self, search_id: Uuid) -> Result<Option<HistoryRecord>, StoreError> {
        let row = sqlx::query("SELECT record FROM search_history WHERE search_id = $1")
            .bind(search_id)
            .fetch_optional(&self.db.pool)
            .await
            .map_err(backend)?;

        match row {
            Some(row) => {
                let Json(record): Json<HistoryRecord> =
                    row.try_get("record").map_err(|e| StoreError::Codec(e.to_string()))?;
                Ok(Some(record))
            }
            None => Ok(None),
        }
    }

    async fn purge_before(&self, cutoff: DateTime<Utc>) -> Result<usize, StoreError> {
        let result = sqlx::query("DELETE FROM search_history WHERE recorded_at < $1")
            .bind(cutoff)
            .execute(&self.db.pool)
            .await
            .map_err(backend)?;
        Ok(result.rows_affected() as usize)
    }
}
