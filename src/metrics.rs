use anyhow::Result;
use metrics::{counter, gauge, histogram};
use std::time::{Duration, Instant};

/// Metric names emitted through the `metrics` facade
pub mod names {
    /// Snapshots aggregated, labelled by collection
    pub const SNAPSHOTS_TOTAL: &str = "backoffice_snapshots_total";
    /// Records folded into aggregates, labelled by collection
    pub const RECORDS_PROCESSED_TOTAL: &str = "backoffice_records_processed_total";
    /// Duration of one aggregation pass
    pub const AGGREGATION_DURATION: &str = "backoffice_aggregation_duration_seconds";
    /// Size of the latest snapshot, labelled by collection
    pub const SNAPSHOT_SIZE: &str = "backoffice_snapshot_size";
    /// Feed errors reported by the record store
    pub const FEED_ERRORS_TOTAL: &str = "backoffice_feed_errors_total";
    /// Writes issued against the record store
    pub const WRITES_TOTAL: &str = "backoffice_writes_total";
    /// Inputs rejected by validation
    pub const VALIDATION_FAILURES_TOTAL: &str = "backoffice_validation_failures_total";
}

/// Metrics collection and management.
///
/// Every event is forwarded to the global `metrics` recorder and also
/// tallied locally so a summary can be printed without an exporter.
#[derive(Debug, Default, Clone)]
pub struct MetricsCollector {
    /// Snapshots aggregated
    pub snapshots_total: u64,
    /// Records folded into aggregates
    pub records_processed_total: u64,
    /// Feed errors observed
    pub feed_errors_total: u64,
    /// Writes issued against the store
    pub writes_total: u64,
    /// Inputs rejected by validation
    pub validation_failures_total: u64,
}

impl MetricsCollector {
    /// Install a no-op global recorder. Fails if one is already installed.
    pub fn init() -> Result<()> {
        metrics::set_global_recorder(metrics::NoopRecorder)
            .map_err(|e| anyhow::anyhow!("Failed to initialize metrics recorder: {}", e))?;

        Ok(())
    }

    /// Record one aggregation pass over a snapshot
    pub fn record_snapshot(&mut self, collection: &str, records: usize, duration: Duration) {
        self.snapshots_total += 1;
        self.records_processed_total += records as u64;

        counter!(names::SNAPSHOTS_TOTAL, "collection" => collection.to_string()).increment(1);
        counter!(names::RECORDS_PROCESSED_TOTAL, "collection" => collection.to_string())
            .increment(records as u64);
        histogram!(names::AGGREGATION_DURATION, "collection" => collection.to_string())
            .record(duration.as_secs_f64());
        gauge!(names::SNAPSHOT_SIZE, "collection" => collection.to_string()).set(records as f64);
    }

    /// Record a failure reported by the record feed
    pub fn record_feed_error(&mut self, collection: &str, code: &str) {
        self.feed_errors_total += 1;

        counter!(
            names::FEED_ERRORS_TOTAL,
            "collection" => collection.to_string(),
            "code" => code.to_string()
        )
        .increment(1);
    }

    /// Record a write against the store
    pub fn record_write(&mut self, collection: &str, operation: &str) {
        self.writes_total += 1;

        counter!(
            names::WRITES_TOTAL,
            "collection" => collection.to_string(),
            "operation" => operation.to_string()
        )
        .increment(1);
    }

    /// Record an input rejected by validation
    pub fn record_validation_failure(&mut self, form: &str) {
        self.validation_failures_total += 1;

        counter!(names::VALIDATION_FAILURES_TOTAL, "form" => form.to_string()).increment(1);
    }

    /// Human-readable totals
    #[must_use]
    pub fn get_summary(&self) -> String {
        format!(
            "Metrics Summary:\n\
             - Snapshots aggregated: {}\n\
             - Records processed: {}\n\
             - Feed errors: {}\n\
             - Store writes: {}\n\
             - Validation failures: {}",
            self.snapshots_total,
            self.records_processed_total,
            self.feed_errors_total,
            self.writes_total,
            self.validation_failures_total,
        )
    }
}

/// Times an aggregation pass and reports it to a collector
pub struct MetricsTimer {
    collection: String,
    start: Instant,
}

impl MetricsTimer {
    /// Start timing a pass over `collection`
    #[must_use]
    pub fn new(collection: &str) -> Self {
        Self {
            collection: collection.to_string(),
            start: Instant::now(),
        }
    }

    /// Stop the timer and record the pass
    pub fn finish(self, collector: &mut MetricsCollector, records: usize) {
        collector.record_snapshot(&self.collection, records, self.start.elapsed());
    }
}
