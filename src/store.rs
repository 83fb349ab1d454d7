//! Append-only history of readings, backed by a local SQLite file.
//!
//! Each fetch becomes one row. Rows are never updated; records sharing a
//! device and timestamp are kept side by side rather than deduplicated.
//! Several `ag` processes may append to the same file at once: WAL journaling
//! plus a busy timeout serialize writers, and readers never wait on a writer
//! beyond its commit.

use std::path::Path;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::{Stream, StreamExt};
use serde::Serialize;
use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous,
};
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use crate::error::StorageError;
use crate::models::{HistoricalRecord, Metric, Reading};
use crate::schema;

/// How long a writer waits for another process's write lock.
const BUSY_TIMEOUT: Duration = Duration::from_secs(10);

macro_rules! select_readings {
    ($tail:literal) => {
        concat!(
            "SELECT id, device_label, ts, pm25, pm10, co2_ppm, temp_c, humidity_pct, \
             tvoc_index, nox_index, wifi_dbm, model, firmware, serial \
             FROM readings WHERE device_label = ? ",
            $tail
        )
    };
}

const RANGE_SQL: &str = select_readings!("AND ts >= ? AND ts <= ? ORDER BY ts ASC, rowid ASC");
const LATEST_SQL: &str = select_readings!("ORDER BY ts DESC, rowid DESC LIMIT 1");

// ---

#[derive(Debug, sqlx::FromRow)]
struct ReadingRow {
    id: Uuid,
    device_label: String,
    ts: i64,
    pm25: Option<f64>,
    pm10: Option<f64>,
    co2_ppm: Option<f64>,
    temp_c: Option<f64>,
    humidity_pct: Option<f64>,
    tvoc_index: Option<f64>,
    nox_index: Option<f64>,
    wifi_dbm: Option<f64>,
    model: Option<String>,
    firmware: Option<String>,
    serial: Option<String>,
}

impl From<ReadingRow> for HistoricalRecord {
    fn from(row: ReadingRow) -> Self {
        HistoricalRecord {
            id: row.id,
            reading: Reading {
                timestamp: DateTime::from_timestamp_nanos(row.ts),
                device_label: row.device_label,
                pm25: row.pm25,
                pm10: row.pm10,
                co2_ppm: row.co2_ppm,
                temp_c: row.temp_c,
                humidity_pct: row.humidity_pct,
                tvoc_index: row.tvoc_index,
                nox_index: row.nox_index,
                wifi_dbm: row.wifi_dbm,
                model: row.model,
                firmware: row.firmware,
                serial: row.serial,
            },
        }
    }
}

/// Aggregate of one metric over a time window. `None` when the metric was
/// never observed in the window.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricSummary {
    pub metric: Metric,
    pub count: i64,
    pub min: Option<f64>,
    pub mean: Option<f64>,
    pub max: Option<f64>,
}

/// Trend summary for one device over `[since, until]`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Summary {
    pub device_label: String,
    pub since: DateTime<Utc>,
    pub until: DateTime<Utc>,
    pub records: i64,
    pub metrics: Vec<MetricSummary>,
}

impl Summary {
    pub fn metric(&self, metric: Metric) -> Option<&MetricSummary> {
        self.metrics.iter().find(|m| m.metric == metric)
    }
}

// ---

pub struct HistoryStore {
    pool: SqlitePool,
}

impl HistoryStore {
    /// Open (creating if needed) the database at `path`.
    pub async fn open(path: &Path) -> Result<Self, StorageError> {
        // ---
        if let Some(dir) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir).map_err(|source| StorageError::Io {
                path: dir.to_path_buf(),
                source,
            })?;
        }
        Self::connect(path, true).await
    }

    /// Open a database that must already exist.
    pub async fn open_existing(path: &Path) -> Result<Self, StorageError> {
        if !path.exists() {
            return Err(StorageError::NotFound(path.to_path_buf()));
        }
        Self::connect(path, false).await
    }

    async fn connect(path: &Path, create: bool) -> Result<Self, StorageError> {
        // ---
        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(create)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Full)
            .busy_timeout(BUSY_TIMEOUT);

        // One invocation never needs more than a single connection.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await?;

        schema::create_schema(&pool).await?;
        tracing::debug!(path = %path.display(), "history store opened");

        Ok(HistoryStore { pool })
    }

    /// Durably insert one record. A single INSERT statement: after a crash
    /// the row is either fully present or absent.
    pub async fn append(&self, record: &HistoricalRecord) -> Result<(), StorageError> {
        // ---
        let r = &record.reading;
        let ts = r
            .timestamp
            .timestamp_nanos_opt()
            .ok_or(StorageError::TimestampOutOfRange(r.timestamp))?;

        sqlx::query(
            r#"
            INSERT INTO readings (
                id, device_label, ts,
                pm25, pm10, co2_ppm, temp_c, humidity_pct,
                tvoc_index, nox_index, wifi_dbm,
                model, firmware, serial
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(record.id)
        .bind(&r.device_label)
        .bind(ts)
        .bind(r.pm25)
        .bind(r.pm10)
        .bind(r.co2_ppm)
        .bind(r.temp_c)
        .bind(r.humidity_pct)
        .bind(r.tvoc_index)
        .bind(r.nox_index)
        .bind(r.wifi_dbm)
        .bind(&r.model)
        .bind(&r.firmware)
        .bind(&r.serial)
        .execute(&self.pool)
        .await?;

        tracing::debug!(device = %r.device_label, id = %record.id, "reading appended");
        Ok(())
    }

    /// Records for `device_label` with `since <= timestamp <= until`, oldest
    /// first. Rows are pulled from SQLite as the stream is polled; polling the
    /// query again yields the same records unless another process appended in
    /// between.
    pub fn query_range<'a>(
        &'a self,
        device_label: &str,
        since: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> impl Stream<Item = Result<HistoricalRecord, StorageError>> + 'a {
        // ---
        sqlx::query_as::<_, ReadingRow>(RANGE_SQL)
            .bind(device_label.to_string())
            .bind(clamped_nanos(since))
            .bind(clamped_nanos(until))
            .fetch(&self.pool)
            .map(|row| row.map(HistoricalRecord::from).map_err(StorageError::from))
    }

    /// Most recent record for `device_label`, if any.
    pub async fn latest(&self, device_label: &str) -> Result<Option<HistoricalRecord>, StorageError> {
        // ---
        let row = sqlx::query_as::<_, ReadingRow>(LATEST_SQL)
            .bind(device_label)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(HistoricalRecord::from))
    }

    /// Count, min, mean and max of every metric over `[since, until]`.
    pub async fn summarize(
        &self,
        device_label: &str,
        since: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> Result<Summary, StorageError> {
        // ---
        let aggregates: Vec<String> = Metric::ALL
            .iter()
            .map(|m| {
                let c = m.column();
                format!("COUNT({c}), MIN({c}), AVG({c}), MAX({c})")
            })
            .collect();
        let sql = format!(
            "SELECT COUNT(*), {} FROM readings \
             WHERE device_label = ? AND ts >= ? AND ts <= ?",
            aggregates.join(", ")
        );

        let row = sqlx::query(&sql)
            .bind(device_label)
            .bind(clamped_nanos(since))
            .bind(clamped_nanos(until))
            .fetch_one(&self.pool)
            .await?;

        let records: i64 = row.try_get(0)?;
        let mut metrics = Vec::with_capacity(Metric::ALL.len());
        for (i, metric) in Metric::ALL.into_iter().enumerate() {
            let base = 1 + i * 4;
            metrics.push(MetricSummary {
                metric,
                count: row.try_get(base)?,
                min: row.try_get(base + 1)?,
                mean: row.try_get(base + 2)?,
                max: row.try_get(base + 3)?,
            });
        }

        Ok(Summary {
            device_label: device_label.to_string(),
            since,
            until,
            records,
            metrics,
        })
    }

    /// Flush and close the pool. Dropping the store does the same lazily.
    pub async fn close(self) {
        self.pool.close().await;
    }
}

/// Nanosecond bound for a query window; instants outside the representable
/// range clamp to the extremes so open-ended windows still work.
fn clamped_nanos(ts: DateTime<Utc>) -> i64 {
    ts.timestamp_nanos_opt()
        .unwrap_or(if ts.timestamp() < 0 { i64::MIN } else { i64::MAX })
}
