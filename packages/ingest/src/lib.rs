#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Library for importing police stop-and-search records into `DuckDB`.
//!
//! [`run_import`] walks every month from the configured start period
//! through the current month, one request at a time, and records the
//! outcome of each month in the `fetch_metadata` ledger.

pub mod config;

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use chrono::NaiveDate;
use police_data_database::DbError;
use police_data_database::stop_search_db;
use police_data_ingest_models::{ImportStatus, ImportSummary};
use police_data_source::client::StopSearchClient;
use police_data_source::period::periods_through;
use police_data_source::progress::ProgressCallback;
use police_data_source::{PeriodFetcher, SourceError};
use police_data_stop_search_models::{AttemptOutcome, FetchAttempt};

pub use config::ImportConfig;

/// Number of ledger entries the final report looks through for failures.
pub const RECENT_LEDGER_ENTRIES: usize = 10;

/// Errors that end an import run early.
#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    /// The store could not be opened or written.
    #[error(transparent)]
    Db(#[from] DbError),

    /// The HTTP client could not be built.
    #[error(transparent)]
    Source(#[from] SourceError),
}

/// Cooperative cancellation shared between the signal handler and the
/// import loop.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests that the import stop at the next period boundary.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Builds a [`StopSearchClient`] from `config` and runs [`run_import`]
/// with it.
///
/// # Errors
///
/// Returns [`IngestError`] if the HTTP client cannot be built or the
/// store fails.
pub async fn run_configured_import(
    config: &ImportConfig,
    today: NaiveDate,
    progress: Arc<dyn ProgressCallback>,
    cancel: &CancelFlag,
) -> Result<ImportSummary, IngestError> {
    let client = StopSearchClient::new(&config.client)?;
    run_import(config, &client, today, progress, cancel).await
}

/// Imports every period from `config.start_period` through the month
/// containing `today`, oldest first.
///
/// Each period waits `config.request_delay` before its request. A period
/// that fails permanently is written to the ledger as a failure and the
/// run moves on. Cancellation is checked before and after each delay;
/// a fetch already in flight is allowed to finish.
///
/// # Errors
///
/// Returns [`IngestError::Db`] if the store cannot be opened or written.
/// Fetch failures never end the run.
#[allow(clippy::too_many_lines)]
pub async fn run_import(
    config: &ImportConfig,
    fetcher: &dyn PeriodFetcher,
    today: NaiveDate,
    progress: Arc<dyn ProgressCallback>,
    cancel: &CancelFlag,
) -> Result<ImportSummary, IngestError> {
    let start = Instant::now();
    let force = config.force.as_str();

    // Creates the file and schema before any network traffic.
    drop(stop_search_db::open(&config.db_path)?);

    let periods = periods_through(config.start_period, today);

    if periods.is_empty() {
        log::info!(
            "{force}: start period {} is after the current month, nothing to do",
            config.start_period
        );
        progress.finish("Nothing to do".to_string());
        return Ok(ImportSummary::empty(force, ImportStatus::NothingToDo));
    }

    log::info!(
        "{force}: importing {} periods ({} to {})",
        periods.len(),
        periods[0],
        periods[periods.len() - 1]
    );

    let mut summary = ImportSummary::empty(force, ImportStatus::Completed);
    summary.periods_planned = periods.len() as u64;

    if let Some(probe) = config.probe_period {
        log::info!("{force}: checking the API with period {probe}");
        match fetcher.fetch_period(force, probe).await {
            Ok(records) => {
                log::info!("{force}: API is answering ({} records for {probe})", records.len());
            }
            Err(e) => {
                log::error!("{force}: API check for {probe} failed: {e}");
                progress.finish("API check failed".to_string());
                summary.status = ImportStatus::ProbeFailed;
                summary.duration = start.elapsed();
                return Ok(summary);
            }
        }
    }

    progress.set_total(summary.periods_planned);

    for period in periods {
        if cancel.is_cancelled() {
            summary.status = ImportStatus::Interrupted;
            break;
        }

        progress.set_message(format!("{force} {period}"));

        if !config.request_delay.is_zero() {
            tokio::time::sleep(config.request_delay).await;
        }

        if cancel.is_cancelled() {
            summary.status = ImportStatus::Interrupted;
            break;
        }

        match fetcher.fetch_period(force, period).await {
            Ok(records) => {
                let returned = records.len() as u64;
                let inserted = {
                    let mut conn = stop_search_db::open(&config.db_path)?;
                    stop_search_db::insert_records(&mut conn, &records, force, period)?
                };

                if inserted != returned {
                    log::warn!(
                        "[{force} {period}] provider returned {returned} records but only {inserted} were stored"
                    );
                }

                let conn = stop_search_db::open(&config.db_path)?;
                stop_search_db::record_fetch_attempt(
                    &conn,
                    force,
                    period,
                    &AttemptOutcome::Succeeded { returned, inserted },
                )?;

                log::info!("[{force} {period}] stored {inserted} of {returned} records");

                summary.successful_periods += 1;
                summary.records_returned += returned;
                summary.records_inserted += inserted;
            }
            Err(e) => {
                log::error!("[{force} {period}] failed: {e}");

                let conn = stop_search_db::open(&config.db_path)?;
                stop_search_db::record_fetch_attempt(
                    &conn,
                    force,
                    period,
                    &AttemptOutcome::Failed {
                        error: e.to_string(),
                    },
                )?;

                summary.failed_periods += 1;
            }
        }

        progress.inc(1);
    }

    summary.duration = start.elapsed();

    if summary.status == ImportStatus::Interrupted {
        log::warn!(
            "{force}: interrupted after {} of {} periods",
            summary.periods_attempted(),
            summary.periods_planned
        );
        progress.finish(format!(
            "Interrupted after {}/{} periods",
            summary.periods_attempted(),
            summary.periods_planned
        ));
    } else {
        progress.finish(format!(
            "{} periods ok, {} failed",
            summary.successful_periods, summary.failed_periods
        ));
    }

    Ok(summary)
}

/// Returns the failed entries among the [`RECENT_LEDGER_ENTRIES`] most
/// recent ledger entries.
///
/// # Errors
///
/// Returns [`DbError`] if the store cannot be read.
pub fn recent_failures(db_path: &Path) -> Result<Vec<FetchAttempt>, DbError> {
    let conn = stop_search_db::open(db_path)?;
    Ok(stop_search_db::get_fetch_status(&conn)?
        .into_iter()
        .take(RECENT_LEDGER_ENTRIES)
        .filter(|attempt| !attempt.success)
        .collect())
}

/// Returns the total number of stored records.
///
/// # Errors
///
/// Returns [`DbError`] if the store cannot be read.
pub fn total_records(db_path: &Path) -> Result<u64, DbError> {
    let conn = stop_search_db::open(db_path)?;
    stop_search_db::get_total_record_count(&conn)
}

/// Returns every ledger entry, most recent period first.
///
/// # Errors
///
/// Returns [`DbError`] if the store cannot be read.
pub fn fetch_status(db_path: &Path) -> Result<Vec<FetchAttempt>, DbError> {
    let conn = stop_search_db::open(db_path)?;
    stop_search_db::get_fetch_status(&conn)
}
