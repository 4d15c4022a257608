#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Result types for a stop-and-search import run.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

/// How an import run ended.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum ImportStatus {
    /// Every enumerated period was attempted.
    Completed,
    /// The user interrupted the run between periods.
    Interrupted,
    /// The period range was empty.
    NothingToDo,
    /// The probe request failed, so no period was attempted.
    ProbeFailed,
}

/// Totals for one import run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportSummary {
    /// Force that was imported.
    pub force: String,
    pub status: ImportStatus,
    /// Number of periods enumerated for the run.
    pub periods_planned: u64,
    /// Periods the provider answered for (including 404s).
    pub successful_periods: u64,
    /// Periods that failed permanently.
    pub failed_periods: u64,
    /// Records the provider returned across all periods.
    pub records_returned: u64,
    /// Records actually stored across all periods.
    pub records_inserted: u64,
    /// How long the run took.
    pub duration: Duration,
}

impl ImportSummary {
    /// An empty summary for `force` that ended with `status`.
    #[must_use]
    pub fn empty(force: &str, status: ImportStatus) -> Self {
        Self {
            force: force.to_string(),
            status,
            periods_planned: 0,
            successful_periods: 0,
            failed_periods: 0,
            records_returned: 0,
            records_inserted: 0,
            duration: Duration::ZERO,
        }
    }

    /// Periods that were attempted, successfully or not.
    #[must_use]
    pub const fn periods_attempted(&self) -> u64 {
        self.successful_periods + self.failed_periods
    }
}
