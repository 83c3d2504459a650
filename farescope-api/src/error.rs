use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use farescope_core::SearchMetadata;
use farescope_search::SearchError;
use serde_json::json;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    NotFound(String),
    #[error("All providers failed")]
    ProvidersUnavailable(Box<SearchMetadata>),
    #[error("Search cancelled")]
    Cancelled,
    #[error("{0}")]
    Internal(String),
}

impl From<SearchError> for AppError {
    fn from(err: SearchError) -> Self {
        match err {
            SearchError::InvalidRequest(msg) => AppError::BadRequest(msg),
            SearchError::AllProvidersFailed { metadata } => AppError::ProvidersUnavailable(metadata),
            SearchError::Cancelled => AppError::Cancelled,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, json!({ "error": msg })),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, json!({ "error": msg })),
            AppError::ProvidersUnavailable(metadata) => (
                StatusCode::SERVICE_UNAVAILABLE,
                json!({
                    "error": "All providers failed",
                    "metadata": metadata,
                }),
            ),
            AppError::Cancelled => (StatusCode::REQUEST_TIMEOUT, json!({ "error": "Search cancelled" })),
            AppError::Internal(msg) => {
                tracing::error!("Internal Server Error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    json!({ "error": "Internal Server Error" }),
                )
            }
        };

        (status, Json(body)).into_response()
    }
}
