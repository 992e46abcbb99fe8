//! Database schema management for `weatherflow`.
//!
//! Ensures required tables and indexes exist before serving requests.
//! Applied once on startup from `main.rs` (EMBP: single gateway call).

use anyhow::Result;
use sqlx::SqlitePool;

// ---

/// Create or update the database schema (idempotent).
///
/// Creates the `weather_data` table for raw station records and the
/// `yearly_weather_stats` table for derived aggregates. Safe to call on
/// every startup; no-op if objects already exist.
///
/// Errors are propagated if any SQL execution fails.
pub async fn create_schema(pool: &SqlitePool) -> Result<()> {
    // ---
    let mut tx = pool.begin().await?;

    // Raw records in source units (tenths); sentinel is normalized to NULL
    // before rows reach this table.
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS weather_data (
            id            INTEGER PRIMARY KEY AUTOINCREMENT,
            station_id    TEXT    NOT NULL,
            date          TEXT    NOT NULL,
            max_temp      INTEGER,
            min_temp      INTEGER,
            precipitation INTEGER,
            UNIQUE (station_id, date)
        );
        "#,
    )
    .execute(&mut *tx)
    .await?;

    // Derived per-station-year aggregates in human units (°C / cm)
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS yearly_weather_stats (
            id                  INTEGER PRIMARY KEY AUTOINCREMENT,
            station_id          TEXT    NOT NULL,
            year                INTEGER NOT NULL,
            avg_max_temp        REAL,
            avg_min_temp        REAL,
            total_precipitation REAL,
            UNIQUE (station_id, year)
        );
        "#,
    )
    .execute(&mut *tx)
    .await?;

    // Basic indexes for common queries
    sqlx::query(
        r#"
        CREATE INDEX IF NOT EXISTS idx_weather_data_station_id
            ON weather_data (station_id);
        "#,
    )
    .execute(&mut *tx)
    .await?;

    sqlx::query(
        r#"
        CREATE INDEX IF NOT EXISTS idx_weather_data_date
            ON weather_data (date);
        "#,
    )
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(())
}
