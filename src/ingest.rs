//! Batch ingestion controller.
//!
//! Discovers station files, streams each one through the validator into the
//! storage gateway in fixed-size chunks, and triggers the yearly-stats
//! recompute once every file has been attempted. A bad row, batch, or file
//! is recorded in the [`RunReport`] and never aborts the run; only inputs
//! that make the run itself impossible (missing source directory) error out.

use std::path::{Path, PathBuf};

use sqlx::SqlitePool;
use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{error, info, warn};

use crate::error::WeatherError;
use crate::models::{ParsedRow, RunReport};
use crate::{store, validate};

// ---

/// Caller-supplied settings for one ingestion run.
#[derive(Debug, Clone)]
pub struct IngestOptions {
    // ---
    /// Directory holding one `<station_id>.txt` file per station.
    pub data_dir: PathBuf,
    /// Rows per validate-and-upsert chunk.
    pub batch_size: usize,
}

/// Run one full ingestion pass over `data_dir`.
///
/// Files are processed in lexicographic file-name order and each file in
/// line order, so the last-write-wins outcome for a key that appears more
/// than once in a run is deterministic. At most one run may be active per
/// storage target; callers serialize runs.
///
/// Errors only when the run is impossible: bad options, or the storage
/// layer failing the final stats recompute.
pub async fn run(pool: &SqlitePool, opts: &IngestOptions) -> Result<RunReport, WeatherError> {
    // ---
    if opts.batch_size == 0 {
        return Err(WeatherError::Configuration(
            "batch_size must be at least 1".to_string(),
        ));
    }
    if !opts.data_dir.is_dir() {
        return Err(WeatherError::Configuration(format!(
            "source directory '{}' does not exist",
            opts.data_dir.display()
        )));
    }

    let files = discover_files(&opts.data_dir)?;
    info!(
        "starting ingestion: {} files in {}, batch size {}",
        files.len(),
        opts.data_dir.display(),
        opts.batch_size
    );

    let mut report = RunReport::default();

    for path in &files {
        match ingest_file(pool, path, opts.batch_size, &mut report).await {
            Ok(()) => report.files_processed += 1,
            Err(e) => {
                warn!("skipping file {}: {}", path.display(), e);
                report.files_failed += 1;
            }
        }
    }

    // Full recompute, exactly once per run, after every file was attempted
    let groups = store::recompute_yearly_stats(pool).await?;

    info!(
        "ingestion complete: {} files ok, {} failed, {} records ingested, \
         {} rejected, {} duplicates, {} station-year stats",
        report.files_processed,
        report.files_failed,
        report.records_ingested,
        report.records_rejected,
        report.records_duplicated,
        groups
    );

    Ok(report)
}

/// Enumerate `*.txt` station files, sorted by file name.
fn discover_files(dir: &Path) -> Result<Vec<PathBuf>, WeatherError> {
    // ---
    let pattern = dir.join("*.txt");
    let pattern = pattern.to_string_lossy();

    let mut files: Vec<PathBuf> = glob::glob(&pattern)
        .map_err(|e| WeatherError::Configuration(format!("bad source pattern: {e}")))?
        .filter_map(|entry| match entry {
            Ok(path) => Some(path),
            Err(e) => {
                warn!("unreadable directory entry: {}", e);
                None
            }
        })
        .collect();

    files.sort();
    Ok(files)
}

/// Stream one station file through validation and upsert in chunks.
///
/// The station id is the file name without extension. Errors returned here
/// are file-level (open or read failure); row and batch problems are
/// tallied into the report instead.
async fn ingest_file(
    pool: &SqlitePool,
    path: &Path,
    batch_size: usize,
    report: &mut RunReport,
) -> Result<(), WeatherError> {
    // ---
    let station_id = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .ok_or_else(|| WeatherError::Input(format!("no station id in '{}'", path.display())))?;

    let file = File::open(path)
        .await
        .map_err(|e| WeatherError::Input(format!("cannot open {}: {e}", path.display())))?;
    let mut lines = BufReader::new(file).lines();

    let mut buf: Vec<ParsedRow> = Vec::with_capacity(batch_size);

    while let Some(line) = lines
        .next_line()
        .await
        .map_err(|e| WeatherError::Input(format!("read error in {}: {e}", path.display())))?
    {
        if line.trim().is_empty() {
            continue;
        }

        match parse_line(&station_id, &line) {
            Some(row) => buf.push(row),
            None => {
                report.records_rejected += 1;
            }
        }

        if buf.len() >= batch_size {
            flush_batch(pool, std::mem::take(&mut buf), report).await;
        }
    }

    flush_batch(pool, std::mem::take(&mut buf), report).await;

    info!("processed {}: station {}", path.display(), station_id);
    Ok(())
}

/// Validate one chunk and upsert the clean rows.
///
/// A storage failure here is confined to this chunk: the rows are counted
/// as rejected and the caller moves on to the next chunk.
async fn flush_batch(pool: &SqlitePool, rows: Vec<ParsedRow>, report: &mut RunReport) {
    // ---
    if rows.is_empty() {
        return;
    }

    let batch = validate::validate(rows);
    report.records_rejected += batch.rejected;
    report.records_duplicated += batch.duplicates;
    for reason in &batch.reasons {
        warn!("rejected row: {}", reason);
    }

    match store::upsert_raw(pool, &batch.records).await {
        Ok(written) => report.records_ingested += written,
        Err(e) => {
            error!("batch of {} records failed: {}", batch.records.len(), e);
            report.records_rejected += batch.records.len() as u64;
        }
    }
}

/// Parse one source line: `date max_temp min_temp precipitation`,
/// tab- or space-separated. Returns `None` for a malformed line.
fn parse_line(station_id: &str, line: &str) -> Option<ParsedRow> {
    // ---
    let mut fields = line.split_whitespace();
    let date = fields.next()?;
    let max_temp: i64 = fields.next()?.parse().ok()?;
    let min_temp: i64 = fields.next()?.parse().ok()?;
    let precipitation: i64 = fields.next()?.parse().ok()?;
    if fields.next().is_some() {
        return None;
    }

    Some(ParsedRow {
        station_id: station_id.to_string(),
        date: date.to_string(),
        max_temp,
        min_temp,
        precipitation,
    })
}
