// src/routes/weather.rs
//! Raw weather record listing endpoint.
//!
//! Sibling module in the `routes` directory following the Explicit Module
//! Boundary Pattern (EMBP): this file owns the `/api/weather` handler and
//! its query type, and exports only a subrouter to the gateway (`mod.rs`).
//!
//! The handler is a thin wrapper over the storage gateway: it shapes the
//! query parameters into a filter, lets the store run the parameterized
//! query, converts stored tenths to °C/cm, and attaches pagination
//! metadata. Filter and page validation errors surface as HTTP 400,
//! storage failures as 503 (see `error.rs`).

use axum::{
    extract::{Query, State},
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use sqlx::SqlitePool;
use tracing::debug;

use crate::models::{PageResponse, Pagination, WeatherResponse};
use crate::store::{self, PageParams, WeatherFilter};
use crate::{Config, WeatherError};

// ---

pub fn router() -> Router<(SqlitePool, Config)> {
    // ---
    Router::new().route("/api/weather", get(handler))
}

/// Query parameters for `/api/weather`. `date` is exclusive with the
/// `start_date`/`end_date` range; all dates are `YYYYMMDD`.
#[derive(Debug, Deserialize)]
struct WeatherQuery {
    // ---
    station_id: Option<String>,
    date: Option<String>,
    start_date: Option<String>,
    end_date: Option<String>,
    page: Option<u32>,
    page_size: Option<u32>,
}

async fn handler(
    Query(params): Query<WeatherQuery>,
    State((pool, _config)): State<(SqlitePool, Config)>,
) -> Result<Json<PageResponse<WeatherResponse>>, WeatherError> {
    // ---
    debug!("GET /api/weather {:?}", params);

    let filter = WeatherFilter {
        station_id: params.station_id,
        date: params.date,
        start_date: params.start_date,
        end_date: params.end_date,
    };
    let page = PageParams {
        page: params.page.unwrap_or(1),
        page_size: params.page_size.unwrap_or(100),
    };

    let (rows, total) = store::query_weather(&pool, &filter, &page).await?;

    Ok(Json(PageResponse {
        data: rows.iter().map(|r| r.to_response()).collect(),
        pagination: Pagination::new(page.page, page.page_size, total),
    }))
}
