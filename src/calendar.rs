//! Day buckets for time series.
//!
//! A window of `N` days ending on the reference day, oldest first. Days are
//! taken in the time zone of the reference instant, so a record timestamp
//! lands in the bucket of the calendar day it falls on in that zone.

use chrono::{DateTime, Days, NaiveDate, TimeZone};
use serde::Serialize;

use crate::error::{DashboardError, Result};

/// One calendar day of a time series
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DayBucket {
    /// Normalized day identity (`YYYY-MM-DD`)
    pub key: String,
    /// The calendar day
    pub date: NaiveDate,
    /// Records counted on this day
    pub count: u32,
}

impl DayBucket {
    fn empty(date: NaiveDate) -> Self {
        Self {
            key: day_key(date),
            date,
            count: 0,
        }
    }

    /// Short display label (`MM/DD`)
    #[must_use]
    pub fn label(&self) -> String {
        self.date.format("%m/%d").to_string()
    }
}

/// Normalized identity of a calendar day
#[must_use]
pub fn day_key(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

/// The calendar day an instant falls on in `tz`
pub fn local_day<Tz: TimeZone, Utz: TimeZone>(instant: &DateTime<Utz>, tz: &Tz) -> NaiveDate {
    instant.with_timezone(tz).date_naive()
}

/// Build `window_days` empty buckets ending on (and including) the day of
/// `reference`, oldest first.
pub fn build_daily_buckets<Tz: TimeZone>(
    window_days: u32,
    reference: &DateTime<Tz>,
) -> Result<Vec<DayBucket>> {
    if window_days == 0 {
        return Err(DashboardError::InvalidWindow(
            "window must cover at least one day".to_string(),
        ));
    }

    let today = reference.date_naive();
    (0..window_days)
        .rev()
        .map(|offset| {
            today
                .checked_sub_days(Days::new(u64::from(offset)))
                .map(DayBucket::empty)
                .ok_or_else(|| {
                    DashboardError::InvalidWindow(format!(
                        "{window_days} days before {today} is out of range"
                    ))
                })
        })
        .collect()
}

/// Position of `day` inside a window that starts on `first`, if it falls
/// within `len` days.
#[must_use]
pub fn bucket_index(first: NaiveDate, len: usize, day: NaiveDate) -> Option<usize> {
    let offset = usize::try_from((day - first).num_days()).ok()?;
    (offset < len).then_some(offset)
}
