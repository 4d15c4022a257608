#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Stop-and-search record types and the fetch ledger model.
//!
//! Every month of data pulled from the police API produces zero or more
//! [`StopSearchRecord`]s plus exactly one [`FetchAttempt`] describing how
//! the fetch for that `(force, period)` pair went.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Error returned when a string or date cannot be turned into a [`Period`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PeriodError {
    /// The string is not of the form `YYYY-MM`.
    #[error("invalid period {value:?}: expected YYYY-MM")]
    Format {
        /// The rejected input.
        value: String,
    },

    /// The month component is outside 1-12.
    #[error("invalid month {month} in period: expected 1-12")]
    Month {
        /// The rejected month.
        month: u32,
    },
}

/// A calendar year-month, the query granularity of the police API.
///
/// Renders and parses as `YYYY-MM`. Ordering is chronological.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Period {
    year: i32,
    month: u32,
}

impl Period {
    /// Creates a period from a year and a 1-based month.
    ///
    /// # Errors
    ///
    /// Returns [`PeriodError::Month`] if `month` is not in 1-12.
    pub fn new(year: i32, month: u32) -> Result<Self, PeriodError> {
        if month == 0 || month > 12 {
            return Err(PeriodError::Month { month });
        }
        Ok(Self { year, month })
    }

    /// Returns the period containing `date`.
    #[must_use]
    pub fn containing(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
        }
    }

    #[must_use]
    pub const fn year(self) -> i32 {
        self.year
    }

    #[must_use]
    pub const fn month(self) -> u32 {
        self.month
    }

    /// Returns the period one calendar month later.
    #[must_use]
    pub const fn next(self) -> Self {
        if self.month == 12 {
            Self {
                year: self.year + 1,
                month: 1,
            }
        } else {
            Self {
                year: self.year,
                month: self.month + 1,
            }
        }
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

impl FromStr for Period {
    type Err = PeriodError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let format_error = || PeriodError::Format {
            value: s.to_string(),
        };

        let (year, month) = s.split_once('-').ok_or_else(format_error)?;
        if year.len() != 4 || month.len() != 2 {
            return Err(format_error());
        }

        let year = year.parse::<i32>().map_err(|_| format_error())?;
        let month = month.parse::<u32>().map_err(|_| format_error())?;

        Self::new(year, month)
    }
}

impl TryFrom<String> for Period {
    type Error = PeriodError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Period> for String {
    fn from(period: Period) -> Self {
        period.to_string()
    }
}

/// A single stop-and-search event, normalized for storage.
///
/// Only `force` and `source_period` are guaranteed to be present; every
/// other attribute is whatever the provider sent, possibly nothing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StopSearchRecord {
    /// Force the record was fetched for.
    pub force: String,
    /// Period the record was fetched for.
    pub source_period: Period,
    /// When the stop happened, verbatim from the provider.
    pub occurred_at: Option<String>,
    /// e.g. "Person search", "Vehicle search".
    pub stop_type: Option<String>,
    pub age_range: Option<String>,
    pub gender: Option<String>,
    pub self_defined_ethnicity: Option<String>,
    pub officer_defined_ethnicity: Option<String>,
    /// Legislation the search was carried out under.
    pub legislation: Option<String>,
    /// What the officer was searching for.
    pub object_of_search: Option<String>,
    pub outcome: Option<String>,
    pub outcome_linked_to_object_of_search: Option<bool>,
    pub removal_of_more_than_outer_clothing: Option<bool>,
    /// Latitude (WGS84). `None` when the provider withheld the location.
    pub latitude: Option<f64>,
    /// Longitude (WGS84). `None` when the provider withheld the location.
    pub longitude: Option<f64>,
    pub street_id: Option<i64>,
    pub street_name: Option<String>,
    pub involved_person: Option<bool>,
    pub operation: Option<bool>,
    pub operation_name: Option<String>,
    /// The complete provider item serialized as JSON.
    pub raw_data: String,
}

/// How a single `(force, period)` fetch ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AttemptOutcome {
    /// The provider answered (possibly with nothing).
    Succeeded {
        /// Records the provider returned.
        returned: u64,
        /// Records that made it into the store.
        inserted: u64,
    },
    /// The period could not be fetched.
    Failed {
        /// Human-readable failure description.
        error: String,
    },
}

impl AttemptOutcome {
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Succeeded { .. })
    }
}

/// A row of the fetch ledger: the most recent attempt for one
/// `(force, period)` pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FetchAttempt {
    pub force: String,
    pub period: Period,
    /// Records the provider returned for the period.
    pub record_count: u64,
    /// Records actually stored for the period.
    pub inserted_count: u64,
    pub success: bool,
    pub error_message: Option<String>,
    /// When the attempt was recorded. `None` if the stored timestamp could
    /// not be parsed.
    pub fetched_at: Option<DateTime<Utc>>,
}
