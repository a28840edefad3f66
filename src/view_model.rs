//! Presentation-ready dashboard view
//!
//! A pure transformation of an [`AggregateResult`]: sparkline points,
//! ring percentages, the category breakdown and the recent list. The view
//! never carries raw store documents.

use chrono::NaiveDate;
use serde::Serialize;

use crate::aggregator::AggregateResult;
use crate::classifier::{Classify, RecentEntry};

/// One sparkline point
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SeriesPoint {
    /// Short day label (`MM/DD`)
    pub label: String,
    /// The day the point covers
    pub date: NaiveDate,
    /// Records created that day
    pub value: u32,
}

/// Count and share of one category
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CategoryShare {
    /// Category label
    pub category: String,
    /// Records in the category
    pub count: usize,
    /// Share of all categorized records, 0-100
    pub percent: u8,
}

/// Everything the dashboard renders for one collection
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DashboardView {
    /// Daily counts, oldest first
    pub series: Vec<SeriesPoint>,
    /// Sum of the series
    pub window_total: u64,
    /// All records in the snapshot
    pub total: usize,
    /// Unread messages or active clients
    pub unread_or_active_count: usize,
    /// Share of records that are not unread; 100 when there are none
    pub read_rate_percent: u8,
    /// Share of records that are unread; 0 when there are none
    pub unread_rate_percent: u8,
    /// Category histogram with percentages
    pub category_breakdown: Vec<CategoryShare>,
    /// Newest records, most recent first
    pub recent: Vec<RecentEntry>,
}

/// Percentage of `part` in `whole`, rounded half up. A zero `whole` is
/// treated as one.
#[must_use]
pub fn rounded_percent(part: usize, whole: usize) -> u8 {
    let part = part as u128;
    let whole = whole.max(1) as u128;
    let percent = (200 * part + whole) / (2 * whole);
    u8::try_from(percent.min(100)).unwrap_or(100)
}

/// Build the view for an aggregation result
#[must_use]
pub fn present<R: Classify>(result: &AggregateResult<R>) -> DashboardView {
    let series = result
        .buckets
        .iter()
        .map(|bucket| SeriesPoint {
            label: bucket.label(),
            date: bucket.date,
            value: bucket.count,
        })
        .collect();

    let (read_rate_percent, unread_rate_percent) = if result.total == 0 {
        (100, 0)
    } else {
        let unread = result.actionable.min(result.total);
        (
            rounded_percent(result.total - unread, result.total),
            rounded_percent(unread, result.total),
        )
    };

    // An empty histogram divides by one so every share reads 0%
    let histogram_total = result.histogram_total().max(1);
    let category_breakdown = result
        .histogram
        .iter()
        .map(|entry| CategoryShare {
            category: entry.category.clone(),
            count: entry.count,
            percent: rounded_percent(entry.count, histogram_total),
        })
        .collect();

    DashboardView {
        series,
        window_total: result.series_total(),
        total: result.total,
        unread_or_active_count: result.actionable,
        read_rate_percent,
        unread_rate_percent,
        category_breakdown,
        recent: result.recent.iter().map(Classify::recent_entry).collect(),
    }
}
