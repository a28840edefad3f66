//! Live dashboard feed
//!
//! A [`RecordStore`] pushes complete snapshots of a collection to a
//! [`SnapshotSink`]. [`DashboardFeed`] is the sink the dashboard uses: each
//! snapshot is parsed, aggregated against the current reference clock and
//! published as a [`DashboardState`] on a `tokio::sync::watch` channel.
//! Snapshots are processed one at a time and always replace the previous
//! view wholesale.

use std::marker::PhantomData;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, FixedOffset, Local, Utc};
use serde::Serialize;
use thiserror::Error;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::aggregator::{AggregateResult, Aggregator};
use crate::classifier::Classify;
use crate::config::DashboardConfig;
use crate::error::{DashboardError, Result};
use crate::metrics::{MetricsCollector, MetricsTimer};
use crate::models::{ClientRecord, Document, FromDocument, MessageRecord};
use crate::view_model::{present, DashboardView};

/// Failure reported by the record store for a live query
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Error)]
#[error("{code}: {message}")]
pub struct FeedError {
    /// Machine-readable error code, e.g. `permission-denied`
    pub code: String,
    /// Human-readable detail
    pub message: String,
}

impl FeedError {
    /// Create a feed error
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }
}

/// Sort direction on the creation timestamp
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    /// Newest first
    #[default]
    Descending,
    /// Oldest first
    Ascending,
}

/// A live query: one collection ordered by creation time
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryDescriptor {
    /// Collection to watch
    pub collection: String,
    /// Order of documents within each snapshot
    pub order: SortOrder,
}

impl QueryDescriptor {
    /// The dashboard's query: everything in `collection`, newest first
    pub fn newest_first(collection: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            order: SortOrder::Descending,
        }
    }
}

/// Receives the results of a live query.
///
/// Every snapshot is the complete, ordered content of the collection at
/// that moment, never a delta.
pub trait SnapshotSink: Send + Sync {
    /// A new complete snapshot
    fn on_snapshot(&self, documents: Vec<Document>);

    /// The query failed
    fn on_error(&self, error: FeedError);
}

/// A source of live snapshots
pub trait RecordStore: Send + Sync {
    /// Start a live query. The sink receives snapshots until the returned
    /// subscription is released.
    fn subscribe(&self, query: QueryDescriptor, sink: Arc<dyn SnapshotSink>) -> Result<Subscription>;
}

/// Handle to a live query, released exactly once on unsubscribe or drop
pub struct Subscription {
    release: Option<Box<dyn FnOnce() + Send>>,
}

impl Subscription {
    /// Wrap the action that stops the live query
    pub fn new(release: impl FnOnce() + Send + 'static) -> Self {
        Self {
            release: Some(Box::new(release)),
        }
    }

    /// Whether the live query is still running
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.release.is_some()
    }

    /// Stop the live query now
    pub fn unsubscribe(mut self) {
        self.release_now();
    }

    fn release_now(&mut self) {
        if let Some(release) = self.release.take() {
            release();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.release_now();
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.is_active())
            .finish()
    }
}

/// Source of "now" for day bucketing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReferenceClock {
    /// Wall clock in the host's local time zone
    #[default]
    Local,
    /// Wall clock in a fixed UTC offset
    Fixed(FixedOffset),
    /// A fixed instant; used for reports and tests
    Frozen(DateTime<FixedOffset>),
}

impl ReferenceClock {
    /// Clock for an optional configured UTC offset
    pub fn from_offset_minutes(minutes: Option<i32>) -> Result<Self> {
        let Some(minutes) = minutes else {
            return Ok(Self::Local);
        };

        minutes
            .checked_mul(60)
            .and_then(FixedOffset::east_opt)
            .map(Self::Fixed)
            .ok_or_else(|| {
                DashboardError::InvalidConfig(format!("UTC offset out of range: {minutes} minutes"))
            })
    }

    /// Aggregate `records` as of this clock's current time
    pub fn aggregate<R>(&self, aggregator: &Aggregator, records: &[R]) -> Result<AggregateResult<R>>
    where
        R: Classify + Clone,
    {
        match self {
            Self::Local => aggregator.aggregate(records, &Local::now()),
            Self::Fixed(offset) => aggregator.aggregate(records, &Utc::now().with_timezone(offset)),
            Self::Frozen(at) => aggregator.aggregate(records, at),
        }
    }
}

/// What the dashboard currently shows for one collection
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum DashboardState {
    /// No snapshot has arrived yet
    Loading,
    /// The latest snapshot
    Ready {
        /// Aggregated view
        view: DashboardView,
    },
    /// The feed failed; the last good view, if any, is kept
    FeedError {
        /// View from the last successful snapshot
        last_good: Option<DashboardView>,
        /// The failure
        error: FeedError,
    },
}

impl DashboardState {
    /// The view to render, including a stale one kept across an error
    #[must_use]
    pub fn view(&self) -> Option<&DashboardView> {
        match self {
            Self::Loading => None,
            Self::Ready { view } => Some(view),
            Self::FeedError { last_good, .. } => last_good.as_ref(),
        }
    }

    /// Whether the first snapshot is still pending
    #[must_use]
    pub const fn is_loading(&self) -> bool {
        matches!(self, Self::Loading)
    }

    /// The current feed failure, if any
    #[must_use]
    pub const fn error(&self) -> Option<&FeedError> {
        match self {
            Self::FeedError { error, .. } => Some(error),
            _ => None,
        }
    }
}

/// Aggregates one collection's live snapshots into dashboard state
pub struct DashboardFeed<R> {
    collection: String,
    aggregator: Aggregator,
    clock: ReferenceClock,
    state: watch::Sender<DashboardState>,
    metrics: Mutex<MetricsCollector>,
    _records: PhantomData<fn() -> R>,
}

impl<R> DashboardFeed<R>
where
    R: FromDocument + Classify + Clone + 'static,
{
    /// Create a feed in the loading state
    pub fn new(collection: impl Into<String>, aggregator: Aggregator, clock: ReferenceClock) -> Self {
        let (state, _) = watch::channel(DashboardState::Loading);
        Self {
            collection: collection.into(),
            aggregator,
            clock,
            state,
            metrics: Mutex::new(MetricsCollector::default()),
            _records: PhantomData,
        }
    }

    /// Subscribe this feed to its collection in `store`
    pub fn attach(self: &Arc<Self>, store: &dyn RecordStore) -> Result<Subscription> {
        let sink: Arc<dyn SnapshotSink> = Arc::clone(self) as Arc<dyn SnapshotSink>;
        let subscription = store.subscribe(QueryDescriptor::newest_first(&self.collection), sink)?;
        info!(collection = %self.collection, "Subscribed to live snapshots");
        Ok(subscription)
    }

    /// Collection this feed watches
    #[must_use]
    pub fn collection(&self) -> &str {
        &self.collection
    }

    /// A receiver that observes every state change
    #[must_use]
    pub fn watch(&self) -> watch::Receiver<DashboardState> {
        self.state.subscribe()
    }

    /// The current state
    #[must_use]
    pub fn current(&self) -> DashboardState {
        self.state.borrow().clone()
    }

    /// Snapshot and error counters for this feed
    #[must_use]
    pub fn metrics(&self) -> MetricsCollector {
        self.metrics
            .lock()
            .map(|metrics| metrics.clone())
            .unwrap_or_default()
    }

    /// Parse and aggregate one snapshot into a view
    pub fn build_view(&self, documents: &[Document]) -> Result<DashboardView> {
        let timer = MetricsTimer::new(&self.collection);
        let records: Vec<R> = documents.iter().map(R::from_document).collect();
        let result = self.clock.aggregate(&self.aggregator, &records)?;
        let view = present(&result);

        if let Ok(mut metrics) = self.metrics.lock() {
            timer.finish(&mut metrics, records.len());
        }
        Ok(view)
    }

    fn publish_error(&self, error: FeedError) {
        if let Ok(mut metrics) = self.metrics.lock() {
            metrics.record_feed_error(&self.collection, &error.code);
        }

        self.state.send_modify(|state| {
            let last_good = state.view().cloned();
            *state = DashboardState::FeedError { last_good, error };
        });
    }
}

impl<R> SnapshotSink for DashboardFeed<R>
where
    R: FromDocument + Classify + Clone + 'static,
{
    fn on_snapshot(&self, documents: Vec<Document>) {
        debug!(collection = %self.collection, documents = documents.len(), "Snapshot received");

        match self.build_view(&documents) {
            Ok(view) => {
                self.state.send_replace(DashboardState::Ready { view });
            }
            Err(e) => {
                warn!(collection = %self.collection, error = %e, "Failed to aggregate snapshot");
                self.publish_error(FeedError::new("aggregation-failed", e.to_string()));
            }
        }
    }

    fn on_error(&self, error: FeedError) {
        warn!(collection = %self.collection, code = %error.code, "Live query failed: {}", error.message);
        self.publish_error(error);
    }
}

/// The admin dashboard: one live feed for messages and one for clients
pub struct AdminDashboard {
    messages: Arc<DashboardFeed<MessageRecord>>,
    clients: Arc<DashboardFeed<ClientRecord>>,
    subscriptions: Vec<Subscription>,
}

impl AdminDashboard {
    /// Open both feeds against `store` using the configured clock
    pub fn open(store: &dyn RecordStore, config: &DashboardConfig) -> Result<Self> {
        let clock = ReferenceClock::from_offset_minutes(config.utc_offset_minutes)?;
        Self::open_with_clock(store, config, clock)
    }

    /// Open both feeds with an explicit reference clock
    pub fn open_with_clock(
        store: &dyn RecordStore,
        config: &DashboardConfig,
        clock: ReferenceClock,
    ) -> Result<Self> {
        let recent_cap = usize::try_from(config.recent_cap)
            .map_err(|e| DashboardError::InvalidConfig(format!("recent_cap: {e}")))?;

        let messages: Arc<DashboardFeed<MessageRecord>> = Arc::new(DashboardFeed::new(
            config.messages_collection.clone(),
            Aggregator::for_records::<MessageRecord>()
                .with_window_days(config.window_days)
                .with_recent_cap(recent_cap),
            clock,
        ));
        let clients: Arc<DashboardFeed<ClientRecord>> = Arc::new(DashboardFeed::new(
            config.clients_collection.clone(),
            Aggregator::for_records::<ClientRecord>()
                .with_window_days(config.window_days)
                .with_recent_cap(recent_cap),
            clock,
        ));

        // A failure on the second subscribe drops and releases the first
        let message_subscription = messages.attach(store)?;
        let client_subscription = clients.attach(store)?;

        Ok(Self {
            messages,
            clients,
            subscriptions: vec![message_subscription, client_subscription],
        })
    }

    /// Feed for contact messages
    #[must_use]
    pub fn messages(&self) -> &DashboardFeed<MessageRecord> {
        &self.messages
    }

    /// Feed for clients
    #[must_use]
    pub fn clients(&self) -> &DashboardFeed<ClientRecord> {
        &self.clients
    }

    /// Release both live queries
    pub fn close(mut self) {
        for subscription in self.subscriptions.drain(..) {
            subscription.unsubscribe();
        }
        info!("Dashboard closed");
    }
}
