//! Snapshot aggregation
//!
//! Folds one complete snapshot of records into day-bucketed counts,
//! scalar totals, a category histogram and a bounded list of the most
//! recent records. Every pass starts from scratch: nothing carries over
//! from a previous snapshot.

use chrono::{DateTime, TimeZone};
use serde::Serialize;
use tracing::debug;

use crate::calendar::{bucket_index, build_daily_buckets, local_day, DayBucket};
use crate::classifier::Classify;
use crate::error::Result;
use crate::logging::OperationTimer;

/// Days covered by the dashboard time series
pub const DEFAULT_WINDOW_DAYS: u32 = 14;
/// Length of the "most recent" list
pub const DEFAULT_RECENT_CAP: usize = 6;

/// Number of records in one histogram category
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CategoryCount {
    /// Category label
    pub category: String,
    /// Records classified into it
    pub count: usize,
}

/// Output of one aggregation pass
#[derive(Debug, Clone, PartialEq)]
pub struct AggregateResult<R> {
    /// Per-day counts, oldest first
    pub buckets: Vec<DayBucket>,
    /// Every record in the snapshot
    pub total: usize,
    /// Unread messages or active clients
    pub actionable: usize,
    /// Counts for the tracked categories, in the configured order
    pub histogram: Vec<CategoryCount>,
    /// Records without a usable timestamp
    pub undated: usize,
    /// Dated records that fall outside the window
    pub outside_window: usize,
    /// Up to the cap of the newest dated records, in input order
    pub recent: Vec<R>,
}

impl<R> AggregateResult<R> {
    /// Sum of all bucket counts
    #[must_use]
    pub fn series_total(&self) -> u64 {
        self.buckets.iter().map(|b| u64::from(b.count)).sum()
    }

    /// Sum of all histogram counts
    #[must_use]
    pub fn histogram_total(&self) -> usize {
        self.histogram.iter().map(|c| c.count).sum()
    }

    /// Count for a single category, zero when it is not tracked
    #[must_use]
    pub fn count_for(&self, category: &str) -> usize {
        self.histogram
            .iter()
            .find(|c| c.category == category)
            .map_or(0, |c| c.count)
    }
}

/// Aggregation settings: window length, recent-list cap and tracked
/// categories
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Aggregator {
    window_days: u32,
    recent_cap: usize,
    categories: Vec<String>,
}

impl Aggregator {
    /// Create an aggregator. Duplicate categories are tracked once.
    #[must_use]
    pub fn new(window_days: u32, recent_cap: usize, categories: Vec<String>) -> Self {
        let mut unique: Vec<String> = Vec::with_capacity(categories.len());
        for category in categories {
            if !unique.contains(&category) {
                unique.push(category);
            }
        }

        Self {
            window_days,
            recent_cap,
            categories: unique,
        }
    }

    /// Default settings for a record kind
    #[must_use]
    pub fn for_records<R: Classify>() -> Self {
        Self::new(DEFAULT_WINDOW_DAYS, DEFAULT_RECENT_CAP, R::default_categories())
    }

    /// Override the window length
    #[must_use]
    pub fn with_window_days(mut self, window_days: u32) -> Self {
        self.window_days = window_days;
        self
    }

    /// Override the recent-list cap
    #[must_use]
    pub fn with_recent_cap(mut self, recent_cap: usize) -> Self {
        self.recent_cap = recent_cap;
        self
    }

    /// Window length in days
    #[must_use]
    pub const fn window_days(&self) -> u32 {
        self.window_days
    }

    /// Recent-list cap
    #[must_use]
    pub const fn recent_cap(&self) -> usize {
        self.recent_cap
    }

    /// Tracked categories in display order
    #[must_use]
    pub fn categories(&self) -> &[String] {
        &self.categories
    }

    /// Aggregate a snapshot.
    ///
    /// `records` must already be ordered newest first, which is what the
    /// record store delivers; the recent list is simply the first
    /// `recent_cap` records that carry a timestamp. Days are counted in the
    /// time zone of `reference`.
    pub fn aggregate<'a, R, I, Tz>(
        &self,
        records: I,
        reference: &DateTime<Tz>,
    ) -> Result<AggregateResult<R>>
    where
        R: Classify + Clone + 'a,
        I: IntoIterator<Item = &'a R>,
        Tz: TimeZone,
    {
        let timer = OperationTimer::new("aggregate_snapshot");
        let zone = reference.timezone();
        let mut buckets = build_daily_buckets(self.window_days, reference)?;
        let first_day = buckets.first().map(|b| b.date);

        let mut histogram: Vec<CategoryCount> = self
            .categories
            .iter()
            .map(|category| CategoryCount {
                category: category.clone(),
                count: 0,
            })
            .collect();

        let mut total = 0;
        let mut actionable = 0;
        let mut undated = 0;
        let mut outside_window = 0;
        let mut recent = Vec::with_capacity(self.recent_cap);

        for record in records {
            let classification = record.classify();
            total += 1;

            if classification.actionable {
                actionable += 1;
            }

            if let Some(slot) = histogram
                .iter_mut()
                .find(|slot| slot.category == classification.category)
            {
                slot.count += 1;
            }

            let Some(created) = classification.effective_date else {
                undated += 1;
                continue;
            };

            let day = local_day(&created, &zone);
            match first_day.and_then(|first| bucket_index(first, buckets.len(), day)) {
                Some(index) => buckets[index].count = buckets[index].count.saturating_add(1),
                None => outside_window += 1,
            }

            if recent.len() < self.recent_cap {
                recent.push(record.clone());
            }
        }

        debug!(
            total,
            actionable,
            undated,
            outside_window,
            window_days = self.window_days,
            "Aggregated snapshot"
        );
        timer.finish();

        Ok(AggregateResult {
            buckets,
            total,
            actionable,
            histogram,
            undated,
            outside_window,
            recent,
        })
    }
}
