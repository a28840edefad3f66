//! In-memory record store
//!
//! Holds documents per collection and serves live queries. Every write
//! pushes a fresh, complete, ordered snapshot to each subscriber of the
//! affected collection; a new subscriber receives the current snapshot
//! immediately. Sinks are always invoked after the store lock is released,
//! so a sink may call back into the store.
//!
//! Deliveries are queued in write order and drained by one thread at a
//! time, so a sink never sees an older snapshot after a newer one and never
//! runs twice concurrently. A writer that finds the queue already being
//! drained returns without waiting; its snapshot is delivered by the
//! draining thread.

use std::cmp::Ordering;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, Weak};

use chrono::{DateTime, Utc};
use rand::distributions::Alphanumeric;
use rand::Rng;
use serde_json::{Map, Value};
use tracing::{debug, info};

use crate::error::{DashboardError, Result};
use crate::feed::{FeedError, QueryDescriptor, RecordStore, SnapshotSink, SortOrder, Subscription};
use crate::models::{fields, Document, Timestamp};

/// Length of generated document ids
pub const DOCUMENT_ID_LEN: usize = 20;

/// Write access to a record store
pub trait RecordWriter: Send + Sync {
    /// Add a document and return its generated id. A missing `createdAt`
    /// is stamped with the store's current time.
    fn insert(&self, collection: &str, values: Map<String, Value>) -> Result<String>;

    /// Merge `patch` into an existing document
    fn update(&self, collection: &str, id: &str, patch: Map<String, Value>) -> Result<()>;

    /// Remove a document
    fn delete(&self, collection: &str, id: &str) -> Result<()>;

    /// Current content of a collection, newest first
    fn documents(&self, collection: &str) -> Result<Vec<Document>>;
}

struct Listener {
    id: u64,
    collection: String,
    order: SortOrder,
    sink: Arc<dyn SnapshotSink>,
}

enum Delivery {
    Snapshot(Vec<Document>),
    Error(FeedError),
}

struct Outgoing {
    listener: u64,
    sink: Arc<dyn SnapshotSink>,
    delivery: Delivery,
}

#[derive(Default)]
struct StoreInner {
    collections: HashMap<String, Vec<Document>>,
    listeners: Vec<Listener>,
    next_listener: u64,
    outbox: VecDeque<Outgoing>,
    draining: bool,
}

impl StoreInner {
    fn snapshot(&self, collection: &str, order: SortOrder) -> Vec<Document> {
        let mut documents = self.collections.get(collection).cloned().unwrap_or_default();
        documents.sort_by(|a, b| compare_created(a, b, order));
        documents
    }

    fn queue_snapshots(&mut self, collection: &str) {
        let outgoing: Vec<Outgoing> = self
            .listeners
            .iter()
            .filter(|listener| listener.collection == collection)
            .map(|listener| Outgoing {
                listener: listener.id,
                sink: Arc::clone(&listener.sink),
                delivery: Delivery::Snapshot(self.snapshot(collection, listener.order)),
            })
            .collect();
        self.outbox.extend(outgoing);
    }

    fn queue_error(&mut self, collection: &str, error: &FeedError) {
        let outgoing: Vec<Outgoing> = self
            .listeners
            .iter()
            .filter(|listener| listener.collection == collection)
            .map(|listener| Outgoing {
                listener: listener.id,
                sink: Arc::clone(&listener.sink),
                delivery: Delivery::Error(error.clone()),
            })
            .collect();
        self.outbox.extend(outgoing);
    }

    /// Claim the outbox; false when another thread is already draining it
    fn claim_drain(&mut self) -> bool {
        if self.draining {
            return false;
        }
        self.draining = true;
        true
    }

    /// Next delivery for a still-registered listener, releasing the claim
    /// once the outbox is empty
    fn next_outgoing(&mut self) -> Option<Outgoing> {
        while let Some(outgoing) = self.outbox.pop_front() {
            if self.listeners.iter().any(|listener| listener.id == outgoing.listener) {
                return Some(outgoing);
            }
        }
        self.draining = false;
        None
    }
}

/// Releases the drain claim if a sink panics mid-delivery
struct DrainClaim<'a> {
    inner: &'a Mutex<StoreInner>,
    held: bool,
}

impl Drop for DrainClaim<'_> {
    fn drop(&mut self) {
        if self.held {
            if let Ok(mut inner) = self.inner.lock() {
                inner.draining = false;
            }
        }
    }
}

/// Dated documents in the requested order, undated ones last in insertion
/// order
fn compare_created(a: &Document, b: &Document, order: SortOrder) -> Ordering {
    match (a.created_at().instant(), b.created_at().instant()) {
        (Some(x), Some(y)) => match order {
            SortOrder::Descending => y.cmp(&x),
            SortOrder::Ascending => x.cmp(&y),
        },
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

fn generate_id() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(DOCUMENT_ID_LEN)
        .map(char::from)
        .collect()
}

type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

/// Thread-safe in-memory implementation of [`RecordStore`] and
/// [`RecordWriter`]
#[derive(Clone)]
pub struct InMemoryRecordStore {
    inner: Arc<Mutex<StoreInner>>,
    clock: Clock,
}

impl Default for InMemoryRecordStore {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for InMemoryRecordStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryRecordStore").finish_non_exhaustive()
    }
}

impl InMemoryRecordStore {
    /// Create an empty store stamping documents with the wall clock
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(StoreInner::default())),
            clock: Arc::new(Utc::now),
        }
    }

    /// Use `clock` for server-side timestamps
    #[must_use]
    pub fn with_clock(mut self, clock: impl Fn() -> DateTime<Utc> + Send + Sync + 'static) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    fn lock(&self) -> Result<MutexGuard<'_, StoreInner>> {
        self.inner
            .lock()
            .map_err(|_| DashboardError::LockPoisoned)
    }

    /// Replace the whole content of a collection
    pub fn seed(&self, collection: &str, documents: Vec<Document>) -> Result<()> {
        let drain = {
            let mut inner = self.lock()?;
            inner.collections.insert(collection.to_string(), documents);
            inner.queue_snapshots(collection);
            inner.claim_drain()
        };
        info!(collection, "Collection seeded");
        if drain {
            self.drain();
        }
        Ok(())
    }

    /// Report `error` to every live query on `collection`
    pub fn fail(&self, collection: &str, error: &FeedError) -> Result<()> {
        let drain = {
            let mut inner = self.lock()?;
            inner.queue_error(collection, error);
            inner.claim_drain()
        };
        if drain {
            self.drain();
        }
        Ok(())
    }

    /// Number of live queries
    #[must_use]
    pub fn listener_count(&self) -> usize {
        self.inner.lock().map_or(0, |inner| inner.listeners.len())
    }

    fn write<T>(
        &self,
        collection: &str,
        apply: impl FnOnce(&mut Vec<Document>) -> Result<T>,
    ) -> Result<T> {
        let (value, drain) = {
            let mut inner = self.lock()?;
            let documents = inner.collections.entry(collection.to_string()).or_default();
            let value = apply(documents)?;
            inner.queue_snapshots(collection);
            (value, inner.claim_drain())
        };
        if drain {
            self.drain();
        }
        Ok(value)
    }

    /// Deliver queued snapshots in order until the outbox is empty. The
    /// caller must hold the drain claim.
    fn drain(&self) {
        let mut claim = DrainClaim {
            inner: &self.inner,
            held: true,
        };
        loop {
            let next = match self.inner.lock() {
                Ok(mut inner) => inner.next_outgoing(),
                Err(_) => return,
            };
            let Some(outgoing) = next else {
                claim.held = false;
                return;
            };
            match outgoing.delivery {
                Delivery::Snapshot(documents) => outgoing.sink.on_snapshot(documents),
                Delivery::Error(error) => outgoing.sink.on_error(error),
            }
        }
    }
}

fn not_found(collection: &str, id: &str) -> DashboardError {
    DashboardError::DocumentNotFound {
        collection: collection.to_string(),
        id: id.to_string(),
    }
}

impl RecordStore for InMemoryRecordStore {
    fn subscribe(&self, query: QueryDescriptor, sink: Arc<dyn SnapshotSink>) -> Result<Subscription> {
        let (id, drain) = {
            let mut inner = self.lock()?;
            let id = inner.next_listener;
            inner.next_listener += 1;
            let initial = inner.snapshot(&query.collection, query.order);
            inner.listeners.push(Listener {
                id,
                collection: query.collection.clone(),
                order: query.order,
                sink: Arc::clone(&sink),
            });
            inner.outbox.push_back(Outgoing {
                listener: id,
                sink,
                delivery: Delivery::Snapshot(initial),
            });
            (id, inner.claim_drain())
        };
        debug!(collection = %query.collection, listener = id, "Live query started");
        if drain {
            self.drain();
        }

        let store: Weak<Mutex<StoreInner>> = Arc::downgrade(&self.inner);
        Ok(Subscription::new(move || {
            if let Some(store) = store.upgrade() {
                if let Ok(mut inner) = store.lock() {
                    inner.listeners.retain(|listener| listener.id != id);
                    debug!(listener = id, "Live query released");
                }
            }
        }))
    }
}

impl RecordWriter for InMemoryRecordStore {
    fn insert(&self, collection: &str, mut values: Map<String, Value>) -> Result<String> {
        let id = generate_id();
        values.remove("id");
        if values.get(fields::CREATED_AT).map_or(true, Value::is_null) {
            values.insert(fields::CREATED_AT.to_string(), Timestamp::store_value((self.clock)()));
        }

        let document = Document::new(id.clone(), values);
        self.write(collection, move |documents| {
            documents.push(document);
            Ok(())
        })?;
        debug!(collection, id = %id, "Document inserted");
        Ok(id)
    }

    fn update(&self, collection: &str, id: &str, patch: Map<String, Value>) -> Result<()> {
        self.write(collection, |documents| {
            let document = documents
                .iter_mut()
                .find(|document| document.id == id)
                .ok_or_else(|| not_found(collection, id))?;
            for (key, value) in patch {
                if key != "id" {
                    document.fields.insert(key, value);
                }
            }
            Ok(())
        })?;
        debug!(collection, id, "Document updated");
        Ok(())
    }

    fn delete(&self, collection: &str, id: &str) -> Result<()> {
        self.write(collection, |documents| {
            let before = documents.len();
            documents.retain(|document| document.id != id);
            if documents.len() == before {
                return Err(not_found(collection, id));
            }
            Ok(())
        })?;
        debug!(collection, id, "Document deleted");
        Ok(())
    }

    fn documents(&self, collection: &str) -> Result<Vec<Document>> {
        Ok(self.lock()?.snapshot(collection, SortOrder::Descending))
    }
}
