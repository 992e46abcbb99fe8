//! `weatherflow` — batch ingestion and query service for fixed-width
//! weather-station files.
//!
//! The pipeline: station text files → chunked streaming reads
//! ([`ingest`]) → pure validation ([`validate`]) → idempotent bulk upsert
//! and a full yearly-stats recompute ([`store`]) → filtered, paginated
//! read API ([`routes`]).
//!
//! This library target exists so integration tests can build the router
//! and drive the pipeline in-process; `main.rs` only wires startup.

pub mod config;
pub mod error;
pub mod ingest;
pub mod models;
pub mod routes;
pub mod schema;
pub mod store;
pub mod validate;

pub use config::Config;
pub use error::WeatherError;
pub use models::{RunReport, WeatherRecord, YearlyStats};
