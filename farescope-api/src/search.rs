use crate::error::AppError;
use crate::state::AppState;
use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::HeaderMap,
    routing::{get, post},
    Json, Router,
};
use farescope_core::repository::HistoryRecord;
use farescope_core::{ComposedResponse, SearchRequest};
use tracing::info;
use uuid::Uuid;

pub const SESSION_HEADER: &str = "x-session-id";
pub const USER_HEADER: &str = "x-user-id";

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/search/flights", post(search_flights))
        .route("/search/flights/{search_id}", get(get_search))
}

fn header(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// POST /search/flights
async fn search_flights(
    State(state): State<AppState>,
    headers: HeaderMap,
    payload: Result<Json<SearchRequest>, JsonRejection>,
) -> Result<Json<ComposedResponse>, AppError> {
    let Json(mut request) = payload.map_err(|e| AppError::BadRequest(e.body_text()))?;
    if request.session_id.is_none() {
        request.session_id = header(&headers, SESSION_HEADER);
    }
    if request.user_id.is_none() {
        request.user_id = header(&headers, USER_HEADER);
    }

    info!(origin = %request.origin, destination = %request.destination, "Flight search requested");
    let response = state
        .orchestrator
        .search_until(request, tokio::time::sleep(state.request_timeout))
        .await?;
    Ok(Json(response))
}

/// GET /search/flights/{search_id}
async fn get_search(
    State(state): State<AppState>,
    Path(search_id): Path<String>,
) -> Result<Json<HistoryRecord>, AppError> {
    let search_id = Uuid::parse_str(&search_id)
        .map_err(|_| AppError::BadRequest(format!("'{}' is not a valid search id", search_id)))?;

    match state.orchestrator.find_search(search_id).await {
        Ok(Some(record)) => Ok(Json(record)),
        Ok(None) => Err(AppError::NotFound(format!("Search {} not found", search_id))),
        Err(e) => Err(AppError::Internal(e.to_string())),
    }
}
