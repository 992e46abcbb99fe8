// src/routes/ingest.rs
//! Administrative ingestion trigger (`POST /api/ingest`).
//!
//! Kicks off one batch ingestion run over the configured (or
//! request-supplied) source directory and returns the run report. The
//! pipeline assumes a single writer per storage target, so callers must
//! not trigger overlapping runs. A missing directory or zero batch size is
//! rejected with 400 before any work starts; partial failures inside the
//! run are reported in the body, not as an error status.

use std::path::PathBuf;

use axum::{
    extract::State,
    routing::post,
    Json, Router,
};
use serde::Deserialize;
use sqlx::SqlitePool;
use tracing::info;

use crate::ingest::{self, IngestOptions};
use crate::models::RunReport;
use crate::{Config, WeatherError};

// ---

pub fn router() -> Router<(SqlitePool, Config)> {
    // ---
    Router::new().route("/api/ingest", post(handler))
}

/// Optional request body; omitted fields fall back to the service config.
#[derive(Debug, Default, Deserialize)]
struct IngestRequest {
    // ---
    data_dir: Option<String>,
    batch_size: Option<u32>,
}

async fn handler(
    State((pool, config)): State<(SqlitePool, Config)>,
    body: Option<Json<IngestRequest>>,
) -> Result<Json<RunReport>, WeatherError> {
    // ---
    let req = body.map(|Json(b)| b).unwrap_or_default();

    let opts = IngestOptions {
        data_dir: PathBuf::from(req.data_dir.unwrap_or_else(|| config.data_dir.clone())),
        batch_size: req.batch_size.unwrap_or(config.batch_size) as usize,
    };

    info!("POST /api/ingest - starting run over {}", opts.data_dir.display());

    let report = ingest::run(&pool, &opts).await?;
    Ok(Json(report))
}
