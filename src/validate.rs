//! Record validation for one ingestion batch.
//!
//! Pure, no I/O: the ingestion controller parses lines into [`ParsedRow`]s
//! and hands each batch here before anything touches storage. A bad row is
//! excluded and tallied, never fatal.

use std::collections::HashMap;

use chrono::NaiveDate;

use crate::models::{ParsedRow, WeatherRecord};

// ---

/// Max rejection reasons retained per batch, for log output.
const MAX_REASONS: usize = 10;

/// Result of validating one batch.
#[derive(Debug, Default)]
pub struct ValidatedBatch {
    // ---
    /// Rows that passed validation, sentinel values normalized to `None`.
    pub records: Vec<WeatherRecord>,
    /// Rows dropped for an invalid date.
    pub rejected: u64,
    /// Rows dropped because an earlier-keyed row was superseded in-batch.
    pub duplicates: u64,
    /// Sample of rejection reasons (bounded).
    pub reasons: Vec<String>,
}

/// Validate and clean one batch of parsed rows.
///
/// - Sentinel measurements become `None` (per field, independently).
/// - Rows whose date is not a calendar-valid `YYYYMMDD` string are rejected
///   and counted.
/// - Duplicate `(station_id, date)` keys within the batch keep exactly one
///   row, the last occurrence winning; the rest count as duplicates.
pub fn validate(rows: Vec<ParsedRow>) -> ValidatedBatch {
    // ---
    let mut out = ValidatedBatch::default();
    let mut index: HashMap<(String, String), usize> = HashMap::new();

    for row in rows {
        if !is_valid_date(&row.date) {
            out.rejected += 1;
            if out.reasons.len() < MAX_REASONS {
                out.reasons
                    .push(format!("invalid date '{}' for station {}", row.date, row.station_id));
            }
            continue;
        }

        let record = row.normalize();
        let key = (record.station_id.clone(), record.date.clone());

        match index.get(&key) {
            Some(&pos) => {
                // Last occurrence wins; the superseded row counts as a duplicate
                out.records[pos] = record;
                out.duplicates += 1;
            }
            None => {
                index.insert(key, out.records.len());
                out.records.push(record);
            }
        }
    }

    out
}

/// True when `date` is an 8-digit `YYYYMMDD` string naming a real
/// calendar date.
pub fn is_valid_date(date: &str) -> bool {
    // ---
    date.len() == 8
        && date.bytes().all(|b| b.is_ascii_digit())
        && NaiveDate::parse_from_str(date, "%Y%m%d").is_ok()
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;

    fn row(station_id: &str, date: &str, max_temp: i64) -> ParsedRow {
        // ---
        ParsedRow {
            station_id: station_id.to_string(),
            date: date.to_string(),
            max_temp,
            min_temp: 0,
            precipitation: 0,
        }
    }

    #[test]
    fn test_valid_rows_pass_through() {
        // ---
        let batch = validate(vec![row("USC1", "20200101", 100), row("USC1", "20200102", 110)]);

        assert_eq!(batch.records.len(), 2);
        assert_eq!(batch.rejected, 0);
        assert_eq!(batch.duplicates, 0);
    }

    #[test]
    fn test_sentinel_values_normalized() {
        // ---
        let batch = validate(vec![ParsedRow {
            station_id: "USC1".to_string(),
            date: "20200101".to_string(),
            max_temp: -9999,
            min_temp: -50,
            precipitation: -9999,
        }]);

        let rec = &batch.records[0];
        assert_eq!(rec.max_temp, None);
        assert_eq!(rec.min_temp, Some(-50));
        assert_eq!(rec.precipitation, None);
    }

    #[test]
    fn test_malformed_dates_rejected() {
        // ---
        let batch = validate(vec![
            row("USC1", "2020010", 1),   // 7 digits
            row("USC1", "202001011", 1), // 9 digits
            row("USC1", "2020ab01", 1),  // non-numeric
            row("USC1", "20200101", 1),  // valid
        ]);

        assert_eq!(batch.records.len(), 1);
        assert_eq!(batch.rejected, 3);
        assert_eq!(batch.reasons.len(), 3);
    }

    #[test]
    fn test_calendar_invalid_dates_rejected() {
        // ---
        // Feb 30 and month 13 are 8-digit but not real dates
        let batch = validate(vec![
            row("USC1", "20210230", 1),
            row("USC1", "20211301", 1),
            row("USC1", "20200229", 1), // leap day, valid
        ]);

        assert_eq!(batch.records.len(), 1);
        assert_eq!(batch.records[0].date, "20200229");
        assert_eq!(batch.rejected, 2);
    }

    #[test]
    fn test_intra_batch_duplicates_last_wins() {
        // ---
        let batch = validate(vec![
            row("USC1", "20200101", 100),
            row("USC1", "20200102", 110),
            row("USC1", "20200101", 300),
        ]);

        assert_eq!(batch.records.len(), 2);
        assert_eq!(batch.duplicates, 1);

        let kept = batch
            .records
            .iter()
            .find(|r| r.date == "20200101")
            .unwrap();
        assert_eq!(kept.max_temp, Some(300));
    }

    #[test]
    fn test_same_date_different_station_not_duplicate() {
        // ---
        let batch = validate(vec![row("USC1", "20200101", 100), row("USC2", "20200101", 200)]);

        assert_eq!(batch.records.len(), 2);
        assert_eq!(batch.duplicates, 0);
    }

    #[test]
    fn test_rejection_reasons_are_bounded() {
        // ---
        let rows: Vec<ParsedRow> = (0..50).map(|i| row("USC1", "bad", i)).collect();
        let batch = validate(rows);

        assert_eq!(batch.rejected, 50);
        assert_eq!(batch.reasons.len(), MAX_REASONS);
    }
}
