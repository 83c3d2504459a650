use crate::state::AppState;
use axum::{extract::State, routing::get, Json, Router};
use farescope_core::ProviderHealth;
use serde::Serialize;
use std::collections::BTreeMap;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub providers: BTreeMap<String, ProviderHealth>,
}

pub fn routes() -> Router<AppState> {
    Router::new().route("/health", get(health))
}

/// GET /health
async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        providers: state.orchestrator.provider_health(),
    })
}
