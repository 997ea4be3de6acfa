//! HTTP error responses

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use vidshelf_db::CatalogError;

/// API error types
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("range not satisfiable")]
    RangeNotSatisfiable,

    #[error("internal server error: {0}")]
    Internal(#[from] anyhow::Error),

    #[error("catalog error: {0}")]
    Catalog(#[from] CatalogError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_name, message) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "NotFound", msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BadRequest", msg),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, "Conflict", msg),
            ApiError::RangeNotSatisfiable => (
                StatusCode::RANGE_NOT_SATISFIABLE,
                "RangeNotSatisfiable",
                "requested range not satisfiable".to_string(),
            ),
            ApiError::Internal(err) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "InternalServerError",
                err.to_string(),
            ),
            ApiError::Catalog(err) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "CatalogError",
                err.to_string(),
            ),
            ApiError::Io(err) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "IoError",
                err.to_string(),
            ),
        };

        if status.is_server_error() {
            tracing::error!("{}: {}", error_name, message);
        }

        let body = Json(json!({
            "error": error_name,
            "message": message,
        }));

        (status, body).into_response()
    }
}

/// Convert a failed blocking task into an API error
impl From<tokio::task::JoinError> for ApiError {
    fn from(err: tokio::task::JoinError) -> Self {
        ApiError::Internal(anyhow::anyhow!("task join error: {}", err))
    }
}
