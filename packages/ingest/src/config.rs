//! Import configuration.
//!
//! Everything has a built-in default; a handful of values can be
//! overridden through environment variables:
//!
//! | Variable                        | Overrides                      |
//! |---------------------------------|--------------------------------|
//! | `POLICE_DATA_FORCE`             | force identifier               |
//! | `POLICE_DATA_START`             | first period (`YYYY-MM`)       |
//! | `POLICE_DATA_API_URL`           | API root                       |
//! | `POLICE_DATA_DB_PATH`           | `DuckDB` file                  |
//! | `POLICE_DATA_REQUEST_DELAY_MS`  | delay before each period       |
//! | `POLICE_DATA_MAX_RETRIES`       | retry ceiling                  |

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use police_data_source::client::ClientConfig;
use police_data_stop_search_models::Period;

/// Force imported when none is configured.
pub const DEFAULT_FORCE: &str = "metropolitan";

/// Delay before every period request, to stay under the provider's rate
/// limit.
pub const DEFAULT_REQUEST_DELAY: Duration = Duration::from_secs(2);

/// Settings for one import run.
#[derive(Debug, Clone)]
pub struct ImportConfig {
    /// Police force to import.
    pub force: String,
    /// First period to request.
    pub start_period: Period,
    /// Period requested once before the run to check the API is answering.
    /// `None` skips the check.
    pub probe_period: Option<Period>,
    /// Delay before each period request.
    pub request_delay: Duration,
    /// `DuckDB` file to write to. The default lives in the source checkout's
    /// `data/` directory; installed binaries should set
    /// `POLICE_DATA_DB_PATH`.
    pub db_path: PathBuf,
    pub client: ClientConfig,
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            force: DEFAULT_FORCE.to_string(),
            start_period: period(2023, 1),
            probe_period: Some(period(2024, 1)),
            request_delay: DEFAULT_REQUEST_DELAY,
            db_path: police_data_database::paths::default_db_path(),
            client: ClientConfig::default(),
        }
    }
}

impl ImportConfig {
    /// Builds the default configuration with environment overrides
    /// applied. Invalid values are logged and ignored.
    #[must_use]
    pub fn from_env() -> Self {
        Self::default().with_overrides(|name| std::env::var(name).ok())
    }

    /// Applies overrides looked up by variable name through `lookup`.
    #[must_use]
    pub fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(force) = lookup("POLICE_DATA_FORCE").filter(|f| !f.trim().is_empty()) {
            self.force = force.trim().to_string();
        }
        if let Some(start) = parse_var(&lookup, "POLICE_DATA_START") {
            self.start_period = start;
        }
        if let Some(url) = lookup("POLICE_DATA_API_URL").filter(|u| !u.trim().is_empty()) {
            self.client.base_url = url.trim().to_string();
        }
        if let Some(path) = lookup("POLICE_DATA_DB_PATH").filter(|p| !p.trim().is_empty()) {
            self.db_path = PathBuf::from(path);
        }
        if let Some(ms) = parse_var::<u64>(&lookup, "POLICE_DATA_REQUEST_DELAY_MS") {
            self.request_delay = Duration::from_millis(ms);
        }
        if let Some(retries) = parse_var(&lookup, "POLICE_DATA_MAX_RETRIES") {
            self.client.retry.max_retries = retries;
        }
        self
    }
}

fn parse_var<T>(lookup: &impl Fn(&str) -> Option<String>, name: &str) -> Option<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    let value = lookup(name)?;
    match value.trim().parse() {
        Ok(parsed) => Some(parsed),
        Err(e) => {
            log::warn!("Ignoring {name}={value:?}: {e}");
            None
        }
    }
}

fn period(year: i32, month: u32) -> Period {
    // Both call sites pass a valid month.
    Period::new(year, month).unwrap_or_else(|_| unreachable!("invalid built-in period"))
}
