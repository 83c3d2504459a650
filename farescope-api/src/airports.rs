use crate::error::AppError;
use crate::state::AppState;
use axum::{
    extract::{Query, State},
    routing::get,
    Json, Router,
};
use farescope_core::{Airport, AirportDirectory};
use moka::future::Cache;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

const MAX_LIMIT: usize = 50;

/// Airport autocomplete with a TTL cache in front of the directory.
pub struct AirportSuggester {
    directory: AirportDirectory,
    cache: Cache<(String, usize), Arc<Vec<Airport>>>,
    default_limit: usize,
}

impl AirportSuggester {
    pub fn new(directory: AirportDirectory, ttl: Duration, default_limit: usize) -> Self {
        Self {
            directory,
            cache: Cache::builder().max_capacity(10_000).time_to_live(ttl).build(),
            default_limit: default_limit.clamp(1, MAX_LIMIT),
        }
    }

    pub async fn suggest(&self, query: &str, limit: Option<usize>) -> Arc<Vec<Airport>> {
        let query = query.trim().to_lowercase();
        let limit = limit.unwrap_or(self.default_limit).clamp(1, MAX_LIMIT);
        self.cache
            .get_with((query.clone(), limit), async {
                Arc::new(self.directory.suggest(&query, limit))
            })
            .await
    }
}

#[derive(Debug, Deserialize)]
pub struct SuggestParams {
    pub q: Option<String>,
    pub limit: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct SuggestResponse {
    pub query: String,
    pub airports: Vec<Airport>,
}

pub fn routes() -> Router<AppState> {
    Router::new().route("/airports/suggest", get(suggest_airports))
}

/// GET /airports/suggest?q=&limit=
async fn suggest_airports(
    State(state): State<AppState>,
    Query(params): Query<SuggestParams>,
) -> Result<Json<SuggestResponse>, AppError> {
    let query = params.q.unwrap_or_default();
    if query.trim().is_empty() {
        return Err(AppError::BadRequest("query parameter 'q' is required".to_string()));
    }
    let airports = state.airports.suggest(&query, params.limit).await;
    Ok(Json(SuggestResponse {
        query,
        airports: airports.as_ref().clone(),
    }))
}
