use std::path::Path;

use chrono::{DateTime, NaiveDate, NaiveDateTime};

use super::csv_store::CsvChunks;
use crate::helpers::error_chain_fmt;
use crate::warehouse::Warehouse;

#[derive(Debug, Clone)]
pub struct LoadOptions {
    pub table: String,
    pub batch_size: usize,
    pub incremental: bool,
    pub timestamp_column: Option<String>,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct LoadReport {
    pub inserted: u64,
    pub skipped: u64,
    pub batches: usize,
}

#[derive(thiserror::Error)]
pub enum LoadError {
    #[error("A timestamp column must be specified for incremental loads.")]
    MissingTimestampColumn,
    #[error("Failed to read the CSV file.")]
    Csv(#[from] csv::Error),
    #[error("Failed to insert batch {batch} into the warehouse.")]
    Insert {
        batch: usize,
        #[source]
        source: sqlx::Error,
    },
}

impl std::fmt::Debug for LoadError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        error_chain_fmt(self, f)
    }
}

const TIMESTAMP_FORMATS: [&str; 5] = [
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%m/%d/%Y %H:%M:%S",
    "%d/%m/%Y %H:%M:%S",
    "%Y/%m/%d %H:%M:%S",
];

const DATE_FORMATS: [&str; 2] = ["%Y-%m-%d", "%m/%d/%Y"];

/// Reads sheet and warehouse timestamps alike. Offsets are normalised to UTC.
pub fn parse_timestamp(value: &str) -> Option<NaiveDateTime> {
    let value = value.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(value) {
        return Some(ts.naive_utc());
    }
    if let Ok(ts) = DateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S%.f%#z") {
        return Some(ts.naive_utc());
    }
    TIMESTAMP_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(value, fmt).ok())
        .or_else(|| {
            DATE_FORMATS
                .iter()
                .find_map(|fmt| NaiveDate::parse_from_str(value, fmt).ok())
                .and_then(|date| date.and_hms_opt(0, 0, 0))
        })
}

async fn lookup_max_value<W: Warehouse>(
    warehouse: &mut W,
    table: &str,
    column: &str,
) -> Result<Option<String>, sqlx::Error> {
    if !warehouse.table_exists(table).await? {
        tracing::info!("Table {table} doesn't exist yet, will load all data");
        return Ok(None);
    }
    warehouse.max_value(table, column).await
}

/// The newest already-loaded timestamp, or `None` to load everything.
async fn watermark<W: Warehouse>(
    warehouse: &mut W,
    table: &str,
    column: &str,
) -> Option<NaiveDateTime> {
    match lookup_max_value(warehouse, table, column).await {
        Ok(Some(value)) => match parse_timestamp(&value) {
            Some(ts) => {
                tracing::info!("Last timestamp in database: {ts}");
                Some(ts)
            }
            None => {
                tracing::warn!("Could not parse max timestamp {value:?}. Will load all data.");
                None
            }
        },
        Ok(None) => {
            tracing::info!("Table is empty, will load all data");
            None
        }
        Err(e) => {
            tracing::warn!(error.cause_chain = ?e, "Could not get max timestamp. Will load all data.");
            None
        }
    }
}

#[tracing::instrument(name = "Loading CSV into the warehouse", skip(warehouse))]
pub async fn load_csv<W: Warehouse>(
    csv_path: &Path,
    warehouse: &mut W,
    options: &LoadOptions,
) -> Result<LoadReport, LoadError> {
    let timestamp_column = match (&options.timestamp_column, options.incremental) {
        (Some(column), true) => Some(column.as_str()),
        (None, true) => return Err(LoadError::MissingTimestampColumn),
        (_, false) => None,
    };

    let max_timestamp = match timestamp_column {
        Some(column) => watermark(warehouse, &options.table, column).await,
        None => None,
    };

    tracing::info!("Reading csv file: {}", csv_path.display());
    let chunks = CsvChunks::open(csv_path, options.batch_size)?;
    let columns = chunks.columns().to_vec();

    let filter = match (max_timestamp, timestamp_column) {
        (Some(max_ts), Some(column)) => match columns.iter().position(|c| c == column) {
            Some(idx) => Some((idx, max_ts)),
            None => {
                tracing::warn!("Timestamp column {column:?} is not in the CSV, will load all data");
                None
            }
        },
        _ => None,
    };

    let mut report = LoadReport::default();
    for (chunk_idx, chunk) in chunks.enumerate() {
        let batch = chunk_idx + 1;
        let mut rows = chunk?;

        if let Some((idx, max_ts)) = filter {
            let original_len = rows.len();
            rows.retain(|row| {
                row[idx]
                    .as_deref()
                    .and_then(parse_timestamp)
                    .is_some_and(|ts| ts > max_ts)
            });
            report.skipped += (original_len - rows.len()) as u64;

            if rows.is_empty() {
                tracing::info!("Batch {batch}: No new records to insert");
                continue;
            }
        }

        if rows.is_empty() {
            continue;
        }

        let inserted = warehouse
            .insert_rows(&options.table, &columns, &rows)
            .await
            .map_err(|source| LoadError::Insert { batch, source })?;
        report.inserted += inserted;
        report.batches += 1;
        tracing::info!(
            "Batch {batch}: Inserted {inserted} rows (Total: {})",
            report.inserted
        );
    }

    if options.incremental {
        tracing::info!(
            "Incremental load complete: {} new rows inserted, {} existing rows skipped",
            report.inserted,
            report.skipped
        );
    } else {
        tracing::info!("Successfully loaded {} rows to the warehouse", report.inserted);
    }
    Ok(report)
}
