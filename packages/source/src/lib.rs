#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Police API access and stop-and-search normalization.
//!
//! The [`PeriodFetcher`] trait is the seam between the import loop and the
//! network: [`client::StopSearchClient`] implements it against the real
//! API, tests implement it with canned responses.

pub mod client;
pub mod normalize;
pub mod parsing;
pub mod period;
pub mod progress;
pub mod retry;

use async_trait::async_trait;
use police_data_stop_search_models::Period;

pub use retry::{FetchFailure, RetryPolicy};

/// A raw item as returned by the provider, before normalization.
pub type RawRecord = serde_json::Value;

/// Errors that can occur while building the client or normalizing data.
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    /// HTTP client construction failed.
    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A record could not be normalized.
    #[error("Normalization error: {message}")]
    Normalization {
        /// Description of what went wrong.
        message: String,
    },
}

/// Fetches one month of stop-and-search records for a force.
#[async_trait]
pub trait PeriodFetcher: Send + Sync {
    /// Returns every record the provider has for `force` in `period`.
    ///
    /// An empty list means the provider has no data for the period.
    ///
    /// # Errors
    ///
    /// Returns [`FetchFailure`] once the period is deemed unfetchable.
    async fn fetch_period(
        &self,
        force: &str,
        period: Period,
    ) -> Result<Vec<RawRecord>, FetchFailure>;
}
