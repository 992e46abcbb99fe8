//! Data models for the weather pipeline.
//!
//! Raw records keep source units (tenths of °C / tenths of mm, sentinel
//! already normalized to `None`); API responses carry human units (°C / cm).

use serde::{Deserialize, Serialize};

// ---

/// Source-file sentinel meaning "measurement missing".
pub const MISSING_SENTINEL: i64 = -9999;

/// One line parsed from a station file, before validation.
///
/// Measurements may still hold [`MISSING_SENTINEL`]; the validator maps
/// those to `None` and rejects rows with invalid dates.
#[derive(Debug, Clone)]
pub struct ParsedRow {
    // ---
    pub station_id: String,
    pub date: String,
    pub max_temp: i64,
    pub min_temp: i64,
    pub precipitation: i64,
}

/// Persisted raw record, keyed by `(station_id, date)`.
///
/// Values are stored in source tenths; the sentinel never appears here.
#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct WeatherRecord {
    // ---
    pub station_id: String,
    pub date: String,
    pub max_temp: Option<i64>,
    pub min_temp: Option<i64>,
    pub precipitation: Option<i64>,
}

/// API-facing raw record with units converted to °C and cm.
#[derive(Debug, Serialize, Deserialize)]
pub struct WeatherResponse {
    // ---
    pub station_id: String,
    pub date: String,
    pub max_temp: Option<f64>,
    pub min_temp: Option<f64>,
    pub precipitation: Option<f64>,
}

/// Derived per-station-year statistics, already in human units.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct YearlyStats {
    // ---
    pub station_id: String,
    pub year: i64,
    pub avg_max_temp: Option<f64>,
    pub avg_min_temp: Option<f64>,
    pub total_precipitation: Option<f64>,
}

impl ParsedRow {
    /// Map sentinel measurements to `None`, each field independently.
    pub fn normalize(&self) -> WeatherRecord {
        // ---
        let clean = |v: i64| if v == MISSING_SENTINEL { None } else { Some(v) };

        WeatherRecord {
            station_id: self.station_id.clone(),
            date: self.date.clone(),
            max_temp: clean(self.max_temp),
            min_temp: clean(self.min_temp),
            precipitation: clean(self.precipitation),
        }
    }
}

impl WeatherRecord {
    /// Convert stored tenths to response units: °C for temperatures,
    /// cm for precipitation (source is tenths of mm).
    pub fn to_response(&self) -> WeatherResponse {
        // ---
        WeatherResponse {
            station_id: self.station_id.clone(),
            date: self.date.clone(),
            max_temp: self.max_temp.map(|t| t as f64 / 10.0),
            min_temp: self.min_temp.map(|t| t as f64 / 10.0),
            precipitation: self.precipitation.map(|p| p as f64 / 100.0),
        }
    }
}

// ---

/// Pagination metadata attached to every list response.
#[derive(Debug, Serialize, Deserialize)]
pub struct Pagination {
    // ---
    pub page: u32,
    pub page_size: u32,
    pub total_items: i64,
    pub total_pages: i64,
    pub has_next: bool,
    pub has_previous: bool,
}

impl Pagination {
    pub fn new(page: u32, page_size: u32, total_items: i64) -> Self {
        // ---
        let total_pages = if total_items > 0 {
            (total_items + page_size as i64 - 1) / page_size as i64
        } else {
            0
        };

        Pagination {
            page,
            page_size,
            total_items,
            total_pages,
            has_next: (page as i64) < total_pages,
            has_previous: page > 1,
        }
    }
}

/// Paginated list envelope.
#[derive(Debug, Serialize, Deserialize)]
pub struct PageResponse<T> {
    // ---
    pub data: Vec<T>,
    pub pagination: Pagination,
}

/// Outcome of one ingestion run.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct RunReport {
    // ---
    pub files_processed: u64,
    pub files_failed: u64,
    pub records_ingested: u64,
    pub records_rejected: u64,
    pub records_duplicated: u64,
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;

    fn parsed(max_temp: i64, min_temp: i64, precipitation: i64) -> ParsedRow {
        // ---
        ParsedRow {
            station_id: "USC00110072".to_string(),
            date: "19850101".to_string(),
            max_temp,
            min_temp,
            precipitation,
        }
    }

    #[test]
    fn test_sentinel_normalization() {
        // ---
        let rec = parsed(-9999, -20, -9999).normalize();

        assert_eq!(rec.max_temp, None);
        assert_eq!(rec.min_temp, Some(-20));
        assert_eq!(rec.precipitation, None);
    }

    #[test]
    fn test_sentinel_fields_are_independent() {
        // ---
        let rec = parsed(100, -9999, 25).normalize();

        assert_eq!(rec.max_temp, Some(100));
        assert_eq!(rec.min_temp, None);
        assert_eq!(rec.precipitation, Some(25));
    }

    #[test]
    fn test_unit_conversion() {
        // ---
        // 50 tenths-°C -> 5.0°C, -11 -> -1.1°C, 25 tenths-mm -> 0.25 cm
        let rec = parsed(50, -11, 25).normalize();
        let resp = rec.to_response();

        assert_eq!(resp.max_temp, Some(5.0));
        assert_eq!(resp.min_temp, Some(-1.1));
        assert_eq!(resp.precipitation, Some(0.25));
    }

    #[test]
    fn test_missing_values_stay_missing_in_response() {
        // ---
        let resp = parsed(-9999, -9999, -9999).normalize().to_response();

        assert_eq!(resp.max_temp, None);
        assert_eq!(resp.min_temp, None);
        assert_eq!(resp.precipitation, None);
    }

    #[test]
    fn test_pagination_math() {
        // ---
        let p = Pagination::new(2, 10, 25);
        assert_eq!(p.total_pages, 3);
        assert!(p.has_next);
        assert!(p.has_previous);

        let last = Pagination::new(3, 10, 25);
        assert!(!last.has_next);
        assert!(last.has_previous);

        let exact = Pagination::new(1, 10, 20);
        assert_eq!(exact.total_pages, 2);
        assert!(exact.has_next);
        assert!(!exact.has_previous);
    }

    #[test]
    fn test_pagination_empty_result() {
        // ---
        let p = Pagination::new(1, 100, 0);
        assert_eq!(p.total_pages, 0);
        assert!(!p.has_next);
        assert!(!p.has_previous);
    }
}
