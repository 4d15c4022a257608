//! Progress reporting for the period-by-period import.
//!
//! [`ProgressCallback`] keeps the import loop independent of how progress
//! is rendered: the CLI draws an `indicatif` bar, tests and library
//! callers pass [`NullProgress`].

use std::sync::Arc;

/// Receives progress updates, one unit per period.
pub trait ProgressCallback: Send + Sync {
    /// Set the number of periods that will be attempted.
    fn set_total(&self, total: u64);

    /// Advance by `delta` periods.
    fn inc(&self, delta: u64);

    /// Describe the period currently being worked on.
    fn set_message(&self, msg: String);

    /// Mark the run as finished with a closing message.
    fn finish(&self, msg: String);
}

/// Discards all progress updates.
pub struct NullProgress;

impl ProgressCallback for NullProgress {
    fn set_total(&self, _total: u64) {}
    fn inc(&self, _delta: u64) {}
    fn set_message(&self, _msg: String) {}
    fn finish(&self, _msg: String) {}
}

/// Returns a shared [`NullProgress`] instance for convenient use.
#[must_use]
pub fn null_progress() -> Arc<dyn ProgressCallback> {
    Arc::new(NullProgress)
}
