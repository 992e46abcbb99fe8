//! Error taxonomy for the `weatherflow` backend service.
//!
//! Every fallible library operation returns [`WeatherError`]. The variants
//! map directly onto how a failure is handled:
//! - `Input`: a malformed row, date, or file — recorded and skipped, never
//!   fatal to an ingestion run.
//! - `StorageUnavailable`: the database could not serve the current
//!   operation — surfaced to the caller, never retried internally.
//! - `ConstraintViolation`: a uniqueness failure outside the expected upsert
//!   path — reported, the run continues with the next unit.
//! - `Configuration`: bad source directory, page size, or filter
//!   combination — rejected before any work begins.
//!
//! The `IntoResponse` impl is the single place where library errors become
//! HTTP status codes for the routes gateway.

use axum::{http::StatusCode, response::IntoResponse, response::Response, Json};
use thiserror::Error;

// ---

#[derive(Debug, Error)]
pub enum WeatherError {
    /// Malformed row, date, or source file content.
    #[error("invalid input: {0}")]
    Input(String),

    /// The database could not be reached or a transaction failed.
    #[error("storage unavailable: {0}")]
    StorageUnavailable(sqlx::Error),

    /// Uniqueness failure outside the replace-on-conflict upsert path.
    #[error("constraint violation: {0}")]
    ConstraintViolation(String),

    /// Invalid caller-supplied configuration (directory, page size, filters).
    #[error("configuration error: {0}")]
    Configuration(String),
}

/// Classify a raw sqlx failure.
///
/// The bulk upsert declares `ON CONFLICT .. DO UPDATE`, so any unique
/// violation that still reaches us came from an unexpected path and is
/// reported as [`WeatherError::ConstraintViolation`]. Everything else is
/// treated as the storage layer being unavailable for this operation.
impl From<sqlx::Error> for WeatherError {
    fn from(e: sqlx::Error) -> Self {
        // ---
        if let sqlx::Error::Database(ref db) = e {
            if db.is_unique_violation() {
                return WeatherError::ConstraintViolation(db.to_string());
            }
        }
        WeatherError::StorageUnavailable(e)
    }
}

impl IntoResponse for WeatherError {
    fn into_response(self) -> Response {
        // ---
        let status = match &self {
            WeatherError::Configuration(_) | WeatherError::Input(_) => StatusCode::BAD_REQUEST,
            WeatherError::StorageUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            WeatherError::ConstraintViolation(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        if status.is_server_error() {
            tracing::error!("request failed: {}", self);
        }

        // Raw storage errors stay out of the response body
        let message = match &self {
            WeatherError::StorageUnavailable(_) => "storage unavailable".to_string(),
            other => other.to_string(),
        };

        (status, Json(serde_json::json!({ "error": message }))).into_response()
    }
}
