use axum::Router;
use sqlx::SqlitePool;

use crate::Config;

mod health;
mod ingest;
mod stats;
mod weather;

// ---

pub fn router(pool: SqlitePool, config: Config) -> Router {
    // ---
    Router::new()
        .merge(weather::router())
        .merge(stats::router())
        .merge(ingest::router())
        .merge(health::router())
        .with_state((pool, config))
}
