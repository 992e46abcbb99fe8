//! Storage gateway for `weatherflow`.
//!
//! Owns every SQL statement in the crate: idempotent bulk upsert of raw
//! records, the full yearly-stats recompute, and the filtered paginated
//! read queries. All caller-supplied values are bound as parameters via
//! [`QueryBuilder::push_bind`], never concatenated into SQL text.

use sqlx::{QueryBuilder, Sqlite, SqlitePool};
use tracing::debug;

use crate::error::WeatherError;
use crate::models::{WeatherRecord, YearlyStats};
use crate::validate::is_valid_date;

// ---

/// Rows per INSERT statement. SQLite caps bound parameters per statement;
/// 5 columns x 400 rows stays well under the limit.
const UPSERT_CHUNK_ROWS: usize = 400;

/// Largest page a single read may request.
pub const MAX_PAGE_SIZE: u32 = 1000;

/// 1-based page selection for the read queries.
#[derive(Debug, Clone)]
pub struct PageParams {
    // ---
    pub page: u32,
    pub page_size: u32,
}

impl Default for PageParams {
    fn default() -> Self {
        PageParams {
            page: 1,
            page_size: 100,
        }
    }
}

impl PageParams {
    pub fn validate(&self) -> Result<(), WeatherError> {
        // ---
        if self.page < 1 {
            return Err(WeatherError::Configuration("page must be >= 1".to_string()));
        }
        if self.page_size < 1 || self.page_size > MAX_PAGE_SIZE {
            return Err(WeatherError::Configuration(format!(
                "page_size must be between 1 and {MAX_PAGE_SIZE}"
            )));
        }
        Ok(())
    }

    fn offset(&self) -> i64 {
        (self.page as i64 - 1) * self.page_size as i64
    }
}

/// Filters for the raw-record query. `date` is mutually exclusive with the
/// range bounds.
#[derive(Debug, Clone, Default)]
pub struct WeatherFilter {
    // ---
    pub station_id: Option<String>,
    pub date: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
}

impl WeatherFilter {
    pub fn validate(&self) -> Result<(), WeatherError> {
        // ---
        if self.date.is_some() && (self.start_date.is_some() || self.end_date.is_some()) {
            return Err(WeatherError::Configuration(
                "date cannot be combined with start_date/end_date".to_string(),
            ));
        }
        for d in [&self.date, &self.start_date, &self.end_date].into_iter().flatten() {
            if !is_valid_date(d) {
                return Err(WeatherError::Configuration(format!(
                    "'{d}' is not a valid YYYYMMDD date"
                )));
            }
        }
        if let (Some(start), Some(end)) = (&self.start_date, &self.end_date) {
            if start > end {
                return Err(WeatherError::Configuration(
                    "start_date must not be after end_date".to_string(),
                ));
            }
        }
        Ok(())
    }
}

/// Filters for the yearly-stats query. `year` is mutually exclusive with
/// the range bounds.
#[derive(Debug, Clone, Default)]
pub struct StatsFilter {
    // ---
    pub station_id: Option<String>,
    pub year: Option<i64>,
    pub start_year: Option<i64>,
    pub end_year: Option<i64>,
}

impl StatsFilter {
    pub fn validate(&self) -> Result<(), WeatherError> {
        // ---
        if self.year.is_some() && (self.start_year.is_some() || self.end_year.is_some()) {
            return Err(WeatherError::Configuration(
                "year cannot be combined with start_year/end_year".to_string(),
            ));
        }
        if let (Some(start), Some(end)) = (self.start_year, self.end_year) {
            if start > end {
                return Err(WeatherError::Configuration(
                    "start_year must not be after end_year".to_string(),
                ));
            }
        }
        Ok(())
    }
}

// ---

/// Bulk upsert of validated raw records, atomic per call.
///
/// Replace-on-conflict keyed by `(station_id, date)`: re-calling with the
/// same records converges to the same table contents, never duplicate rows.
/// Returns the number of rows inserted or replaced.
pub async fn upsert_raw(pool: &SqlitePool, records: &[WeatherRecord]) -> Result<u64, WeatherError> {
    // ---
    if records.is_empty() {
        return Ok(0);
    }

    let mut tx = pool.begin().await?;
    let mut written = 0u64;

    for chunk in records.chunks(UPSERT_CHUNK_ROWS) {
        let mut qb = QueryBuilder::<Sqlite>::new(
            "INSERT INTO weather_data (station_id, date, max_temp, min_temp, precipitation) ",
        );
        qb.push_values(chunk, |mut b, rec| {
            b.push_bind(&rec.station_id)
                .push_bind(&rec.date)
                .push_bind(rec.max_temp)
                .push_bind(rec.min_temp)
                .push_bind(rec.precipitation);
        });
        qb.push(
            " ON CONFLICT (station_id, date) DO UPDATE SET \
             max_temp = excluded.max_temp, \
             min_temp = excluded.min_temp, \
             precipitation = excluded.precipitation",
        );

        let result = qb.build().execute(&mut *tx).await?;
        written += result.rows_affected();
    }

    tx.commit().await?;
    debug!("upserted {} raw records", written);
    Ok(written)
}

/// Rebuild the `yearly_weather_stats` table from scratch.
///
/// One transaction: drop all existing stats rows, then re-derive every
/// `(station_id, year)` group in a single pass over `weather_data`.
/// Sentinel values were normalized to NULL before storage, so plain SQL
/// NULL semantics give the required behavior: `AVG` skips missing values
/// and is NULL when all are missing; `SUM` adds only present values and is
/// NULL when all are missing. Temperatures land as °C, precipitation as cm,
/// both rounded to 2 decimals. Returns the number of station-year rows.
pub async fn recompute_yearly_stats(pool: &SqlitePool) -> Result<u64, WeatherError> {
    // ---
    let mut tx = pool.begin().await?;

    sqlx::query("DELETE FROM yearly_weather_stats")
        .execute(&mut *tx)
        .await?;

    let result = sqlx::query(
        r#"
        INSERT INTO yearly_weather_stats
            (station_id, year, avg_max_temp, avg_min_temp, total_precipitation)
        SELECT
            station_id,
            CAST(substr(date, 1, 4) AS INTEGER) AS year,
            ROUND(AVG(max_temp / 10.0), 2),
            ROUND(AVG(min_temp / 10.0), 2),
            ROUND(SUM(precipitation) / 100.0, 2)
        FROM weather_data
        GROUP BY station_id, substr(date, 1, 4)
        "#,
    )
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;

    let rows = result.rows_affected();
    debug!("recomputed yearly stats for {} station-year groups", rows);
    Ok(rows)
}

// ---

fn push_weather_filters<'a>(qb: &mut QueryBuilder<'a, Sqlite>, filter: &'a WeatherFilter) {
    // ---
    let mut sep = " WHERE ";
    if let Some(ref station_id) = filter.station_id {
        qb.push(sep).push("station_id = ").push_bind(station_id);
        sep = " AND ";
    }
    if let Some(ref date) = filter.date {
        qb.push(sep).push("date = ").push_bind(date);
        sep = " AND ";
    }
    if let Some(ref start) = filter.start_date {
        qb.push(sep).push("date >= ").push_bind(start);
        sep = " AND ";
    }
    if let Some(ref end) = filter.end_date {
        qb.push(sep).push("date <= ").push_bind(end);
    }
}

fn push_stats_filters<'a>(qb: &mut QueryBuilder<'a, Sqlite>, filter: &'a StatsFilter) {
    // ---
    let mut sep = " WHERE ";
    if let Some(ref station_id) = filter.station_id {
        qb.push(sep).push("station_id = ").push_bind(station_id);
        sep = " AND ";
    }
    if let Some(year) = filter.year {
        qb.push(sep).push("year = ").push_bind(year);
        sep = " AND ";
    }
    if let Some(start) = filter.start_year {
        qb.push(sep).push("year >= ").push_bind(start);
        sep = " AND ";
    }
    if let Some(end) = filter.end_year {
        qb.push(sep).push("year <= ").push_bind(end);
    }
}

/// Filtered, paginated read over raw records.
///
/// Ordering is `station_id, date` ascending so pagination is reproducible.
/// Returns the page of rows plus the pre-pagination match count.
pub async fn query_weather(
    pool: &SqlitePool,
    filter: &WeatherFilter,
    page: &PageParams,
) -> Result<(Vec<WeatherRecord>, i64), WeatherError> {
    // ---
    filter.validate()?;
    page.validate()?;

    let mut count_qb = QueryBuilder::<Sqlite>::new("SELECT COUNT(*) FROM weather_data");
    push_weather_filters(&mut count_qb, filter);
    let total: i64 = count_qb.build_query_scalar().fetch_one(pool).await?;

    let mut qb = QueryBuilder::<Sqlite>::new(
        "SELECT station_id, date, max_temp, min_temp, precipitation FROM weather_data",
    );
    push_weather_filters(&mut qb, filter);
    qb.push(" ORDER BY station_id, date LIMIT ")
        .push_bind(page.page_size as i64)
        .push(" OFFSET ")
        .push_bind(page.offset());

    let rows = qb
        .build_query_as::<WeatherRecord>()
        .fetch_all(pool)
        .await?;

    Ok((rows, total))
}

/// Filtered, paginated read over yearly statistics.
///
/// Ordering is `station_id, year` ascending. Returns the page of rows plus
/// the pre-pagination match count.
pub async fn query_stats(
    pool: &SqlitePool,
    filter: &StatsFilter,
    page: &PageParams,
) -> Result<(Vec<YearlyStats>, i64), WeatherError> {
    // ---
    filter.validate()?;
    page.validate()?;

    let mut count_qb = QueryBuilder::<Sqlite>::new("SELECT COUNT(*) FROM yearly_weather_stats");
    push_stats_filters(&mut count_qb, filter);
    let total: i64 = count_qb.build_query_scalar().fetch_one(pool).await?;

    let mut qb = QueryBuilder::<Sqlite>::new(
        "SELECT station_id, year, avg_max_temp, avg_min_temp, total_precipitation \
         FROM yearly_weather_stats",
    );
    push_stats_filters(&mut qb, filter);
    qb.push(" ORDER BY station_id, year LIMIT ")
        .push_bind(page.page_size as i64)
        .push(" OFFSET ")
        .push_bind(page.offset());

    let rows = qb.build_query_as::<YearlyStats>().fetch_all(pool).await?;

    Ok((rows, total))
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use crate::schema::create_schema;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn test_pool() -> SqlitePool {
        // ---
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        create_schema(&pool).await.unwrap();
        pool
    }

    fn rec(
        station_id: &str,
        date: &str,
        max_temp: Option<i64>,
        min_temp: Option<i64>,
        precipitation: Option<i64>,
    ) -> WeatherRecord {
        // ---
        WeatherRecord {
            station_id: station_id.to_string(),
            date: date.to_string(),
            max_temp,
            min_temp,
            precipitation,
        }
    }

    #[tokio::test]
    async fn test_upsert_is_idempotent() {
        // ---
        let pool = test_pool().await;
        let records = vec![
            rec("USC1", "20200101", Some(100), Some(-20), Some(5)),
            rec("USC1", "20200102", Some(110), Some(-10), Some(0)),
        ];

        upsert_raw(&pool, &records).await.unwrap();
        upsert_raw(&pool, &records).await.unwrap();

        let (rows, total) = query_weather(&pool, &WeatherFilter::default(), &PageParams::default())
            .await
            .unwrap();
        assert_eq!(total, 2);
        assert_eq!(rows.len(), 2);
    }

    #[tokio::test]
    async fn test_upsert_replaces_on_conflict() {
        // ---
        let pool = test_pool().await;

        upsert_raw(&pool, &[rec("USC1", "20200101", Some(100), Some(-20), Some(5))])
            .await
            .unwrap();
        upsert_raw(&pool, &[rec("USC1", "20200101", None, None, None)])
            .await
            .unwrap();

        let (rows, total) = query_weather(&pool, &WeatherFilter::default(), &PageParams::default())
            .await
            .unwrap();
        assert_eq!(total, 1);
        assert_eq!(rows[0].max_temp, None);
        assert_eq!(rows[0].min_temp, None);
        assert_eq!(rows[0].precipitation, None);
    }

    #[tokio::test]
    async fn test_upsert_spanning_multiple_chunks() {
        // ---
        let pool = test_pool().await;
        let records: Vec<WeatherRecord> = (0..UPSERT_CHUNK_ROWS + 50)
            .map(|i| {
                rec(
                    "USC1",
                    &format!("2020{:02}{:02}", i / 28 % 12 + 1, i % 28 + 1),
                    Some(i as i64),
                    None,
                    None,
                )
            })
            .collect();

        // Dates repeat across chunk boundaries, so the final row count is
        // the number of distinct keys, not the input length.
        let distinct: std::collections::HashSet<&String> =
            records.iter().map(|r| &r.date).collect();

        upsert_raw(&pool, &records).await.unwrap();

        let (_, total) = query_weather(&pool, &WeatherFilter::default(), &PageParams::default())
            .await
            .unwrap();
        assert_eq!(total as usize, distinct.len());
    }

    #[tokio::test]
    async fn test_yearly_avg_max_temp() {
        // ---
        let pool = test_pool().await;

        // Station ABC, two days in 2021 with max_temp 100 and 200 tenths
        upsert_raw(
            &pool,
            &[
                rec("ABC", "20210101", Some(100), Some(50), Some(10)),
                rec("ABC", "20210102", Some(200), Some(150), Some(40)),
            ],
        )
        .await
        .unwrap();

        let written = recompute_yearly_stats(&pool).await.unwrap();
        assert_eq!(written, 1);

        let (stats, _) = query_stats(&pool, &StatsFilter::default(), &PageParams::default())
            .await
            .unwrap();
        assert_eq!(stats.len(), 1);
        assert_eq!(stats[0].station_id, "ABC");
        assert_eq!(stats[0].year, 2021);
        assert_eq!(stats[0].avg_max_temp, Some(15.0));
        assert_eq!(stats[0].avg_min_temp, Some(10.0));
        assert_eq!(stats[0].total_precipitation, Some(0.5));
    }

    #[tokio::test]
    async fn test_all_missing_group_yields_null_stats() {
        // ---
        let pool = test_pool().await;

        upsert_raw(
            &pool,
            &[
                rec("XYZ", "20190101", None, None, None),
                rec("XYZ", "20190601", None, None, None),
            ],
        )
        .await
        .unwrap();

        recompute_yearly_stats(&pool).await.unwrap();

        let (stats, _) = query_stats(&pool, &StatsFilter::default(), &PageParams::default())
            .await
            .unwrap();
        assert_eq!(stats.len(), 1);
        assert_eq!(stats[0].avg_max_temp, None);
        assert_eq!(stats[0].avg_min_temp, None);
        assert_eq!(stats[0].total_precipitation, None);
    }

    #[tokio::test]
    async fn test_precipitation_sum_skips_missing() {
        // ---
        let pool = test_pool().await;

        // One missing, two present: sum counts only present values
        upsert_raw(
            &pool,
            &[
                rec("PQR", "20220101", None, None, Some(25)),
                rec("PQR", "20220102", None, None, None),
                rec("PQR", "20220103", None, None, Some(50)),
            ],
        )
        .await
        .unwrap();

        recompute_yearly_stats(&pool).await.unwrap();

        let (stats, _) = query_stats(&pool, &StatsFilter::default(), &PageParams::default())
            .await
            .unwrap();
        assert_eq!(stats[0].total_precipitation, Some(0.75));
    }

    #[tokio::test]
    async fn test_recompute_discards_stale_groups() {
        // ---
        let pool = test_pool().await;

        upsert_raw(&pool, &[rec("OLD", "20100101", Some(10), None, None)])
            .await
            .unwrap();
        recompute_yearly_stats(&pool).await.unwrap();

        // Replace the only 2010 record with a 2011 one via the raw table,
        // then recompute: the 2010 group must disappear.
        sqlx::query("DELETE FROM weather_data")
            .execute(&pool)
            .await
            .unwrap();
        upsert_raw(&pool, &[rec("OLD", "20110101", Some(20), None, None)])
            .await
            .unwrap();
        recompute_yearly_stats(&pool).await.unwrap();

        let (stats, total) = query_stats(&pool, &StatsFilter::default(), &PageParams::default())
            .await
            .unwrap();
        assert_eq!(total, 1);
        assert_eq!(stats[0].year, 2011);
    }

    #[tokio::test]
    async fn test_stats_split_by_station_and_year() {
        // ---
        let pool = test_pool().await;

        upsert_raw(
            &pool,
            &[
                rec("A", "20200101", Some(100), None, None),
                rec("A", "20210101", Some(200), None, None),
                rec("B", "20200101", Some(300), None, None),
            ],
        )
        .await
        .unwrap();

        let written = recompute_yearly_stats(&pool).await.unwrap();
        assert_eq!(written, 3);
    }

    #[tokio::test]
    async fn test_weather_filters_and_ordering() {
        // ---
        let pool = test_pool().await;

        upsert_raw(
            &pool,
            &[
                rec("B", "20200103", Some(1), None, None),
                rec("A", "20200102", Some(2), None, None),
                rec("A", "20200101", Some(3), None, None),
                rec("A", "20200110", Some(4), None, None),
            ],
        )
        .await
        .unwrap();

        let filter = WeatherFilter {
            station_id: Some("A".to_string()),
            start_date: Some("20200101".to_string()),
            end_date: Some("20200102".to_string()),
            ..Default::default()
        };
        let (rows, total) = query_weather(&pool, &filter, &PageParams::default())
            .await
            .unwrap();

        // Range bounds are inclusive, ordering is station then date
        assert_eq!(total, 2);
        assert_eq!(rows[0].date, "20200101");
        assert_eq!(rows[1].date, "20200102");
    }

    #[tokio::test]
    async fn test_pagination_returns_total_before_paging() {
        // ---
        let pool = test_pool().await;

        let records: Vec<WeatherRecord> = (1..=25)
            .map(|d| rec("A", &format!("202001{:02}", d), Some(d as i64), None, None))
            .collect();
        upsert_raw(&pool, &records).await.unwrap();

        let page = PageParams {
            page: 3,
            page_size: 10,
        };
        let (rows, total) = query_weather(&pool, &WeatherFilter::default(), &page)
            .await
            .unwrap();

        assert_eq!(total, 25);
        assert_eq!(rows.len(), 5);
        assert_eq!(rows[0].date, "20200121");
    }

    #[tokio::test]
    async fn test_invalid_page_params_rejected() {
        // ---
        let pool = test_pool().await;

        let too_big = PageParams {
            page: 1,
            page_size: MAX_PAGE_SIZE + 1,
        };
        let err = query_weather(&pool, &WeatherFilter::default(), &too_big)
            .await
            .unwrap_err();
        assert!(matches!(err, WeatherError::Configuration(_)));

        let zero_page = PageParams {
            page: 0,
            page_size: 10,
        };
        let err = query_weather(&pool, &WeatherFilter::default(), &zero_page)
            .await
            .unwrap_err();
        assert!(matches!(err, WeatherError::Configuration(_)));
    }

    #[tokio::test]
    async fn test_conflicting_date_filters_rejected() {
        // ---
        let pool = test_pool().await;

        let filter = WeatherFilter {
            date: Some("20200101".to_string()),
            start_date: Some("20200101".to_string()),
            ..Default::default()
        };
        let err = query_weather(&pool, &filter, &PageParams::default())
            .await
            .unwrap_err();
        assert!(matches!(err, WeatherError::Configuration(_)));
    }

    #[tokio::test]
    async fn test_stats_year_range_filter() {
        // ---
        let pool = test_pool().await;

        upsert_raw(
            &pool,
            &[
                rec("A", "20190101", Some(1), None, None),
                rec("A", "20200101", Some(2), None, None),
                rec("A", "20210101", Some(3), None, None),
            ],
        )
        .await
        .unwrap();
        recompute_yearly_stats(&pool).await.unwrap();

        let filter = StatsFilter {
            start_year: Some(2020),
            end_year: Some(2021),
            ..Default::default()
        };
        let (rows, total) = query_stats(&pool, &filter, &PageParams::default())
            .await
            .unwrap();

        assert_eq!(total, 2);
        assert_eq!(rows[0].year, 2020);
        assert_eq!(rows[1].year, 2021);
    }
}
