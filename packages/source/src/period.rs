//! Enumeration of the months to request.

use chrono::NaiveDate;
use police_data_stop_search_models::Period;

/// Returns every period from `start` through the month containing `today`,
/// oldest first.
///
/// Empty when `start` lies after the current month.
#[must_use]
pub fn periods_through(start: Period, today: NaiveDate) -> Vec<Period> {
    let end = Period::containing(today);
    let mut periods = Vec::new();
    let mut current = start;

    while current <= end {
        periods.push(current);
        current = current.next();
    }

    periods
}
