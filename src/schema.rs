//! Database schema management for the reading history.
//!
//! Ensures the `readings` table and its range-scan index exist before the
//! store is used. Applied every time a [`crate::HistoryStore`] is opened.

use sqlx::SqlitePool;

use crate::error::StorageError;

/// Bumped whenever the `readings` layout changes.
pub const SCHEMA_VERSION: i64 = 1;

// ---

/// Create the schema if needed and verify the stored version (idempotent).
///
/// Runs in one write transaction, so processes opening a fresh database at
/// the same time serialize on it instead of racing. A database written by a
/// different schema version is rejected with
/// [`StorageError::SchemaMismatch`] and left untouched.
pub async fn create_schema(pool: &SqlitePool) -> Result<(), StorageError> {
    // ---
    let mut tx = pool.begin().await?;

    // One row per fetch. `ts` is Unix nanoseconds so timestamps round-trip
    // exactly; the implicit rowid keeps insertion order for equal timestamps.
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS readings (
            id            BLOB    PRIMARY KEY NOT NULL,
            device_label  TEXT    NOT NULL,
            ts            INTEGER NOT NULL,
            pm25          REAL,
            pm10          REAL,
            co2_ppm       REAL,
            temp_c        REAL,
            humidity_pct  REAL,
            tvoc_index    REAL,
            nox_index     REAL,
            wifi_dbm      REAL,
            model         TEXT,
            firmware      TEXT,
            serial        TEXT
        );
        "#,
    )
    .execute(&mut *tx)
    .await?;

    sqlx::query(
        r#"
        CREATE INDEX IF NOT EXISTS idx_readings_device_ts
            ON readings (device_label, ts);
        "#,
    )
    .execute(&mut *tx)
    .await?;

    let found: i64 = sqlx::query_scalar("PRAGMA user_version")
        .fetch_one(&mut *tx)
        .await?;

    match found {
        0 => {
            // PRAGMA does not take bound parameters.
            sqlx::query(&format!("PRAGMA user_version = {SCHEMA_VERSION}"))
                .execute(&mut *tx)
                .await?;
        }
        SCHEMA_VERSION => {}
        other => {
            tx.rollback().await?;
            return Err(StorageError::SchemaMismatch {
                found: other,
                expected: SCHEMA_VERSION,
            });
        }
    }

    tx.commit().await?;
    Ok(())
}
