//! Stop-and-search record storage and the fetch ledger.
//!
//! The database file contains two tables:
//!
//! - `stop_search`: one row per provider item, normalized into columns,
//!   with the original item kept in `raw_data`.
//! - `fetch_metadata`: the ledger, one row per `(force, period)` holding
//!   the most recent fetch attempt.
//!
//! Records are append-only. Ledger rows are replaced wholesale on every
//! attempt.

use std::path::Path;

use duckdb::Connection;
use police_data_source::RawRecord;
use police_data_source::normalize::normalize_record;
use police_data_stop_search_models::{AttemptOutcome, FetchAttempt, Period};

use crate::DbError;

const INSERT_RECORD_SQL: &str = "INSERT INTO stop_search (
        occurred_at, stop_type, age_range, gender, self_defined_ethnicity,
        officer_defined_ethnicity, legislation, object_of_search, outcome,
        outcome_linked_to_object_of_search, removal_of_more_than_outer_clothing,
        latitude, longitude, street_id, street_name, involved_person,
        operation, operation_name, force, source_period, created_at, raw_data
    ) VALUES (
        ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?,
        CAST(? AS TIMESTAMP), ?
    )";

/// Opens (or creates) the stop-and-search database and ensures the schema
/// exists.
///
/// # Errors
///
/// Returns [`DbError`] if the directory, connection, or schema creation
/// fails.
pub fn open(path: &Path) -> Result<Connection, DbError> {
    if let Some(parent) = path.parent() {
        crate::paths::ensure_dir(parent)?;
    }

    let conn = Connection::open(path)?;

    create_schema(&conn)?;

    Ok(conn)
}

fn create_schema(conn: &Connection) -> Result<(), DbError> {
    conn.execute_batch(
        "CREATE SEQUENCE IF NOT EXISTS stop_search_id_seq START 1;

        CREATE TABLE IF NOT EXISTS stop_search (
            id BIGINT PRIMARY KEY DEFAULT nextval('stop_search_id_seq'),
            occurred_at TEXT,
            stop_type TEXT,
            age_range TEXT,
            gender TEXT,
            self_defined_ethnicity TEXT,
            officer_defined_ethnicity TEXT,
            legislation TEXT,
            object_of_search TEXT,
            outcome TEXT,
            outcome_linked_to_object_of_search BOOLEAN,
            removal_of_more_than_outer_clothing BOOLEAN,
            latitude DOUBLE,
            longitude DOUBLE,
            street_id BIGINT,
            street_name TEXT,
            involved_person BOOLEAN,
            operation BOOLEAN,
            operation_name TEXT,
            force TEXT NOT NULL,
            source_period TEXT NOT NULL,
            created_at TIMESTAMP NOT NULL,
            raw_data TEXT
        );

        CREATE INDEX IF NOT EXISTS idx_stop_search_occurred_at ON stop_search (occurred_at);
        CREATE INDEX IF NOT EXISTS idx_stop_search_force ON stop_search (force);
        CREATE INDEX IF NOT EXISTS idx_stop_search_location ON stop_search (latitude, longitude);
        CREATE INDEX IF NOT EXISTS idx_stop_search_outcome ON stop_search (outcome);
        CREATE INDEX IF NOT EXISTS idx_stop_search_source_period ON stop_search (source_period);

        CREATE TABLE IF NOT EXISTS fetch_metadata (
            force TEXT NOT NULL,
            period TEXT NOT NULL,
            record_count BIGINT NOT NULL,
            inserted_count BIGINT NOT NULL,
            success BOOLEAN NOT NULL,
            error_message TEXT,
            fetched_at TIMESTAMP NOT NULL,
            PRIMARY KEY (force, period)
        );",
    )?;

    Ok(())
}

/// Normalizes and inserts a batch of raw provider items fetched for
/// `force` in `period`.
///
/// Items that fail normalization are skipped with a warning; the rest are
/// inserted in a single transaction. Returns the number of rows inserted,
/// which is exactly how much the table grew.
///
/// # Errors
///
/// Returns [`DbError`] if the transaction or any insert fails.
pub fn insert_records(
    conn: &mut Connection,
    records: &[RawRecord],
    force: &str,
    period: Period,
) -> Result<u64, DbError> {
    if records.is_empty() {
        return Ok(0);
    }

    let created_at = now_timestamp();
    let source_period = period.to_string();
    let tx = conn.transaction()?;
    let mut inserted = 0u64;

    {
        let mut stmt = tx.prepare(INSERT_RECORD_SQL)?;

        for (index, raw) in records.iter().enumerate() {
            let record = match normalize_record(raw, force, period) {
                Ok(record) => record,
                Err(e) => {
                    log::warn!("[{force} {period}] skipping record {index}: {e}\n  record: {raw}");
                    continue;
                }
            };

            let rows = stmt.execute(duckdb::params![
                record.occurred_at.as_deref(),
                record.stop_type.as_deref(),
                record.age_range.as_deref(),
                record.gender.as_deref(),
                record.self_defined_ethnicity.as_deref(),
                record.officer_defined_ethnicity.as_deref(),
                record.legislation.as_deref(),
                record.object_of_search.as_deref(),
                record.outcome.as_deref(),
                record.outcome_linked_to_object_of_search,
                record.removal_of_more_than_outer_clothing,
                record.latitude,
                record.longitude,
                record.street_id,
                record.street_name.as_deref(),
                record.involved_person,
                record.operation,
                record.operation_name.as_deref(),
                record.force,
                source_period,
                created_at,
                record.raw_data,
            ])?;
            inserted += u64::try_from(rows).unwrap_or(0);
        }
    }

    tx.commit()?;

    Ok(inserted)
}

/// Records the outcome of fetching `force` in `period`, replacing any
/// earlier ledger entry for the same pair.
///
/// # Errors
///
/// Returns [`DbError`] if the upsert fails.
pub fn record_fetch_attempt(
    conn: &Connection,
    force: &str,
    period: Period,
    outcome: &AttemptOutcome,
) -> Result<(), DbError> {
    let (record_count, inserted_count, error_message) = match outcome {
        AttemptOutcome::Succeeded { returned, inserted } => (*returned, *inserted, None),
        AttemptOutcome::Failed { error } => (0, 0, Some(error.as_str())),
    };

    conn.execute(
        "INSERT INTO fetch_metadata (
            force, period, record_count, inserted_count, success, error_message, fetched_at
        ) VALUES (?, ?, ?, ?, ?, ?, CAST(? AS TIMESTAMP))
        ON CONFLICT (force, period) DO UPDATE SET
            record_count = EXCLUDED.record_count,
            inserted_count = EXCLUDED.inserted_count,
            success = EXCLUDED.success,
            error_message = EXCLUDED.error_message,
            fetched_at = EXCLUDED.fetched_at",
        duckdb::params![
            force,
            period.to_string(),
            to_i64(record_count)?,
            to_i64(inserted_count)?,
            outcome.is_success(),
            error_message,
            now_timestamp(),
        ],
    )?;

    Ok(())
}

/// Returns every ledger entry, most recent period first.
///
/// # Errors
///
/// Returns [`DbError`] if the query fails or a stored value cannot be
/// converted back.
pub fn get_fetch_status(conn: &Connection) -> Result<Vec<FetchAttempt>, DbError> {
    let mut stmt = conn.prepare(
        "SELECT force, period, record_count, inserted_count, success, error_message,
                CAST(fetched_at AS TEXT)
         FROM fetch_metadata
         ORDER BY period DESC, force ASC",
    )?;

    let rows = stmt.query_map([], |row| {
        Ok((
            row.get::<_, String>(0)?,
            row.get::<_, String>(1)?,
            row.get::<_, i64>(2)?,
            row.get::<_, i64>(3)?,
            row.get::<_, bool>(4)?,
            row.get::<_, Option<String>>(5)?,
            row.get::<_, Option<String>>(6)?,
        ))
    })?;

    let mut attempts = Vec::new();

    for row in rows {
        let (force, period, record_count, inserted_count, success, error_message, fetched_at) =
            row?;

        let period = period.parse::<Period>().map_err(|e| DbError::Conversion {
            message: format!("ledger entry for {force}: {e}"),
        })?;

        attempts.push(FetchAttempt {
            force,
            period,
            record_count: to_u64(record_count)?,
            inserted_count: to_u64(inserted_count)?,
            success,
            error_message,
            fetched_at: fetched_at.as_deref().and_then(parse_timestamp),
        });
    }

    Ok(attempts)
}

/// Returns the number of stored stop-and-search records.
///
/// # Errors
///
/// Returns [`DbError`] if the query fails.
pub fn get_total_record_count(conn: &Connection) -> Result<u64, DbError> {
    let mut stmt = conn.prepare("SELECT COUNT(*) FROM stop_search")?;
    let count: i64 = stmt.query_row([], |row| row.get(0))?;
    to_u64(count)
}

fn now_timestamp() -> String {
    chrono::Utc::now()
        .format("%Y-%m-%d %H:%M:%S%.6f")
        .to_string()
}

fn to_i64(value: u64) -> Result<i64, DbError> {
    i64::try_from(value).map_err(|_| DbError::Conversion {
        message: format!("count {value} does not fit in BIGINT"),
    })
}

fn to_u64(value: i64) -> Result<u64, DbError> {
    u64::try_from(value).map_err(|_| DbError::Conversion {
        message: format!("negative count {value}"),
    })
}

/// Parses a `DuckDB` timestamp text representation into a UTC `DateTime`.
///
/// `DuckDB`'s text cast drops trailing zero fractions, so both
/// `2024-01-15 10:30:00` and `2024-01-15 10:30:00.123` occur. Stored
/// timestamps are UTC.
fn parse_timestamp(s: &str) -> Option<chrono::DateTime<chrono::Utc>> {
    use chrono::NaiveDateTime;

    if let Ok(naive) = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f") {
        return Some(naive.and_utc());
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
        return Some(naive.and_utc());
    }

    log::warn!("Failed to parse timestamp: {s:?}");
    None
}
