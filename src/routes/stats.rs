// src/routes/stats.rs
//! Yearly statistics listing endpoint (`/api/stats`).
//!
//! Same shape as the raw-record endpoint, but over the derived
//! `yearly_weather_stats` table: exact `year` or inclusive
//! `start_year`/`end_year` range, stable station/year ordering, pagination
//! metadata. Stats rows are already stored in human units, so no
//! conversion happens here.

use axum::{
    extract::{Query, State},
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use sqlx::SqlitePool;
use tracing::debug;

use crate::models::{PageResponse, Pagination, YearlyStats};
use crate::store::{self, PageParams, StatsFilter};
use crate::{Config, WeatherError};

// ---

pub fn router() -> Router<(SqlitePool, Config)> {
    // ---
    Router::new().route("/api/stats", get(handler))
}

/// Query parameters for `/api/stats`. `year` is exclusive with the
/// `start_year`/`end_year` range.
#[derive(Debug, Deserialize)]
struct StatsQuery {
    // ---
    station_id: Option<String>,
    year: Option<i64>,
    start_year: Option<i64>,
    end_year: Option<i64>,
    page: Option<u32>,
    page_size: Option<u32>,
}

async fn handler(
    Query(params): Query<StatsQuery>,
    State((pool, _config)): State<(SqlitePool, Config)>,
) -> Result<Json<PageResponse<YearlyStats>>, WeatherError> {
    // ---
    debug!("GET /api/stats {:?}", params);

    let filter = StatsFilter {
        station_id: params.station_id,
        year: params.year,
        start_year: params.start_year,
        end_year: params.end_year,
    };
    let page = PageParams {
        page: params.page.unwrap_or(1),
        page_size: params.page_size.unwrap_or(100),
    };

    let (rows, total) = store::query_stats(&pool, &filter, &page).await?;

    Ok(Json(PageResponse {
        data: rows,
        pagination: Pagination::new(page.page, page.page_size, total),
    }))
}
