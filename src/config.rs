//! Configuration loader for the `weatherflow` backend service.
//!
//! This module centralizes all runtime configuration values and their
//! defaults, loading from environment variables (with optional `.env` file
//! support provided by the caller). By consolidating configuration logic
//! here, we avoid scattering `env::var` calls throughout the codebase.

use std::env;

use anyhow::{anyhow, Result};

/// Parse an optional integer environment variable with a default value.
macro_rules! parse_env_u32 {
    ($var_name:expr, $default:expr) => {
        env::var($var_name)
            .ok()
            .map(|v| v.parse::<u32>())
            .transpose()
            .map_err(|e| anyhow!("Invalid {}: {}", $var_name, e))?
            .unwrap_or($default)
    };
}

/// Strongly typed application configuration.
///
/// All fields are immutable after loading, ensuring a consistent
/// configuration snapshot for the lifetime of the application.
#[derive(Debug, Clone)]
pub struct Config {
    // ---
    /// SQLite connection string.
    pub db_url: String,

    /// Maximum number of database connections in the pool.
    pub db_pool_max: u32,

    /// Default directory holding station data files.
    pub data_dir: String,

    /// Default number of rows per ingestion batch.
    pub batch_size: u32,
}

/// Load configuration from environment variables with defaults.
///
/// Optional:
/// - `DATABASE_URL` – SQLite connection string (default: `sqlite://weather.db`)
/// - `DB_POOL_MAX` – max DB connections (default: 5)
/// - `WX_DATA_DIR` – station file directory (default: `wx_data`)
/// - `INGEST_BATCH_SIZE` – rows per batch (default: 10000)
///
/// Returns an error if any variable is present but invalid.
pub fn load_from_env() -> Result<Config> {
    // ---
    let db_url = env::var("DATABASE_URL").unwrap_or_else(|_| "sqlite://weather.db".to_string());
    let data_dir = env::var("WX_DATA_DIR").unwrap_or_else(|_| "wx_data".to_string());
    let db_pool_max = parse_env_u32!("DB_POOL_MAX", 5);
    let batch_size = parse_env_u32!("INGEST_BATCH_SIZE", 10_000);

    if batch_size == 0 {
        return Err(anyhow!("INGEST_BATCH_SIZE must be at least 1"));
    }

    Ok(Config {
        db_url,
        db_pool_max,
        data_dir,
        batch_size,
    })
}

impl Config {
    /// Log the loaded configuration for debugging purposes.
    pub fn log_config(&self) {
        // ---
        tracing::info!("Configuration loaded:");
        tracing::info!("  DATABASE_URL      : {}", self.db_url);
        tracing::info!("  DB_POOL_MAX       : {}", self.db_pool_max);
        tracing::info!("  WX_DATA_DIR       : {}", self.data_dir);
        tracing::info!("  INGEST_BATCH_SIZE : {}", self.batch_size);
    }
}
