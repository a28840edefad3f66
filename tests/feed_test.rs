//! Integration tests for feed.rs and store.rs

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use backoffice_dashboard::config::{AppConfig, DashboardConfig};
use backoffice_dashboard::error::{DashboardError, Result};
use backoffice_dashboard::feed::{
    AdminDashboard, DashboardState, FeedError, QueryDescriptor, RecordStore, ReferenceClock,
    SnapshotSink, SortOrder, Subscription,
};
use backoffice_dashboard::models::Document;
use backoffice_dashboard::store::{InMemoryRecordStore, RecordWriter};
use chrono::{DateTime, FixedOffset, TimeZone};
use mockall::mock;
use serde_json::{json, Map, Value};

mock! {
    pub Store {}

    impl RecordStore for Store {
        fn subscribe(&self, query: QueryDescriptor, sink: Arc<dyn SnapshotSink>) -> Result<Subscription>;
    }
}

fn config() -> DashboardConfig {
    AppConfig::default().dashboard
}

fn frozen() -> ReferenceClock {
    ReferenceClock::Frozen(reference())
}

fn reference() -> DateTime<FixedOffset> {
    FixedOffset::east_opt(0)
        .expect("offset")
        .with_ymd_and_hms(2024, 3, 15, 12, 0, 0)
        .single()
        .expect("reference")
}

fn fields(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

fn seeded_store() -> InMemoryRecordStore {
    let store = InMemoryRecordStore::new();
    let messages: Vec<Document> = vec![
        serde_json::from_value(json!({
            "id": "m1", "name": "Ada", "urgency": "High", "read": true,
            "createdAt": "2024-03-15T08:00:00Z"
        }))
        .expect("doc"),
        serde_json::from_value(json!({
            "id": "m2", "name": "Linus", "createdAt": "2024-03-14T08:00:00Z"
        }))
        .expect("doc"),
    ];
    let clients: Vec<Document> = vec![serde_json::from_value(json!({
        "id": "c1", "name": "Acme", "status": "Active", "createdAt": "2024-03-10T08:00:00Z"
    }))
    .expect("doc")];

    store.seed("contactMessages", messages).expect("seed messages");
    store.seed("clients", clients).expect("seed clients");
    store
}

#[test]
fn test_open_delivers_initial_snapshot() {
    let store = seeded_store();
    let dashboard = AdminDashboard::open_with_clock(&store, &config(), frozen()).expect("open");

    let messages = dashboard.messages().current();
    let view = messages.view().expect("ready");
    assert_eq!(view.total, 2);
    assert_eq!(view.unread_or_active_count, 1);
    assert_eq!(view.read_rate_percent, 50);
    assert_eq!(view.window_total, 2);
    assert_eq!(view.recent[0].id, "m1");

    let clients = dashboard.clients().current();
    assert_eq!(clients.view().map(|v| v.unread_or_active_count), Some(1));
    assert_eq!(store.listener_count(), 2);
}

#[test]
fn test_writes_republish_the_view() {
    let store = seeded_store();
    let dashboard = AdminDashboard::open_with_clock(&store, &config(), frozen()).expect("open");

    let id = store
        .insert(
            "contactMessages",
            fields(json!({"name": "Grace", "createdAt": "2024-03-15T09:00:00Z"})),
        )
        .expect("insert");

    let view = dashboard.messages().current().view().cloned().expect("ready");
    assert_eq!(view.total, 3);
    assert_eq!(view.unread_or_active_count, 2);
    assert_eq!(view.recent[0].id, id);

    store
        .update("contactMessages", &id, fields(json!({"read": true})))
        .expect("update");
    let view = dashboard.messages().current().view().cloned().expect("ready");
    assert_eq!(view.unread_or_active_count, 1);

    store.delete("contactMessages", "m2").expect("delete");
    let view = dashboard.messages().current().view().cloned().expect("ready");
    assert_eq!(view.total, 2);
    assert_eq!(view.read_rate_percent, 100);
}

#[test]
fn test_feed_error_keeps_last_good_view() {
    let store = seeded_store();
    let dashboard = AdminDashboard::open_with_clock(&store, &config(), frozen()).expect("open");
    let before = dashboard.messages().current().view().cloned();

    store
        .fail("contactMessages", &FeedError::new("permission-denied", "rules rejected read"))
        .expect("fail");

    let state = dashboard.messages().current();
    assert_eq!(state.error().map(|e| e.code.as_str()), Some("permission-denied"));
    assert_eq!(state.view().cloned(), before);
    assert_eq!(dashboard.messages().metrics().feed_errors_total, 1);

    // Clients are unaffected
    assert!(dashboard.clients().current().error().is_none());

    // The next snapshot recovers
    store
        .insert("contactMessages", fields(json!({"name": "New"})))
        .expect("insert");
    assert!(matches!(dashboard.messages().current(), DashboardState::Ready { .. }));
}

#[test]
fn test_close_and_drop_release_subscriptions() {
    let store = seeded_store();

    let dashboard = AdminDashboard::open_with_clock(&store, &config(), frozen()).expect("open");
    assert_eq!(store.listener_count(), 2);
    dashboard.close();
    assert_eq!(store.listener_count(), 0);

    {
        let _dashboard = AdminDashboard::open_with_clock(&store, &config(), frozen()).expect("open");
        assert_eq!(store.listener_count(), 2);
    }
    assert_eq!(store.listener_count(), 0);
}

#[test]
fn test_state_is_loading_until_first_snapshot() {
    let sinks: Arc<Mutex<Vec<Arc<dyn SnapshotSink>>>> = Arc::new(Mutex::new(Vec::new()));
    let captured = Arc::clone(&sinks);

    let mut store = MockStore::new();
    store
        .expect_subscribe()
        .times(2)
        .returning(move |query, sink| {
            assert_eq!(query.order, SortOrder::Descending);
            captured.lock().expect("lock").push(sink);
            Ok(Subscription::new(|| {}))
        });

    let dashboard = AdminDashboard::open_with_clock(&store, &config(), frozen()).expect("open");
    assert!(dashboard.messages().current().is_loading());
    assert!(dashboard.clients().current().is_loading());

    let message_sink = Arc::clone(&sinks.lock().expect("lock")[0]);
    message_sink.on_error(FeedError::new("unavailable", "offline"));
    let state = dashboard.messages().current();
    assert!(matches!(
        state,
        DashboardState::FeedError { last_good: None, .. }
    ));

    message_sink.on_snapshot(Vec::new());
    let state = dashboard.messages().current();
    let view = state.view().expect("ready");
    assert_eq!(view.total, 0);
    assert_eq!(view.read_rate_percent, 100);
    assert_eq!(view.series.len(), 14);
}

#[test]
fn test_failed_open_releases_first_subscription() {
    let released = Arc::new(AtomicBool::new(false));
    let calls = Arc::new(AtomicUsize::new(0));

    let flag = Arc::clone(&released);
    let counter = Arc::clone(&calls);
    let mut store = MockStore::new();
    store.expect_subscribe().returning(move |_, _| {
        if counter.fetch_add(1, Ordering::SeqCst) == 0 {
            let flag = Arc::clone(&flag);
            Ok(Subscription::new(move || flag.store(true, Ordering::SeqCst)))
        } else {
            Err(DashboardError::Feed(FeedError::new("unauthenticated", "signed out")))
        }
    });

    let result = AdminDashboard::open_with_clock(&store, &config(), frozen());
    assert!(matches!(result, Err(DashboardError::Feed(_))));
    assert!(released.load(Ordering::SeqCst));
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_watch_receiver_sees_updates() {
    let store = seeded_store();
    let dashboard = AdminDashboard::open_with_clock(&store, &config(), frozen()).expect("open");
    let mut receiver = dashboard.messages().watch();

    store
        .insert(
            "contactMessages",
            fields(json!({"name": "Barbara", "createdAt": "2024-03-13T10:00:00Z"})),
        )
        .expect("insert");

    receiver.changed().await.expect("sender alive");
    let total = receiver.borrow_and_update().view().map(|v| v.total);
    assert_eq!(total, Some(3));
}

#[test]
fn test_store_sorts_snapshots_by_query_order() {
    let store = seeded_store();
    let received: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));

    struct Recorder(Arc<Mutex<Vec<String>>>);
    impl SnapshotSink for Recorder {
        fn on_snapshot(&self, documents: Vec<Document>) {
            let mut ids = self.0.lock().expect("lock");
            *ids = documents.into_iter().map(|d| d.id).collect();
        }
        fn on_error(&self, _error: FeedError) {}
    }

    let query = QueryDescriptor {
        collection: "contactMessages".to_string(),
        order: SortOrder::Ascending,
    };
    let subscription = store
        .subscribe(query, Arc::new(Recorder(Arc::clone(&received))))
        .expect("subscribe");

    assert_eq!(*received.lock().expect("lock"), vec!["m2", "m1"]);
    assert!(subscription.is_active());
    subscription.unsubscribe();
    assert_eq!(store.listener_count(), 0);
}

#[test]
fn test_store_reports_missing_documents() {
    let store = InMemoryRecordStore::new();
    let result = store.delete("clients", "missing");
    assert!(matches!(
        result,
        Err(DashboardError::DocumentNotFound { ref id, .. }) if id == "missing"
    ));
    assert!(store.update("clients", "missing", Map::new()).is_err());
}

/// Records snapshot sizes, stalling on the first one-document snapshot
struct SlowSizes {
    sizes: Arc<Mutex<Vec<usize>>>,
    in_flight: AtomicUsize,
    overlapped: AtomicBool,
}

impl SnapshotSink for SlowSizes {
    fn on_snapshot(&self, documents: Vec<Document>) {
        if self.in_flight.fetch_add(1, Ordering::SeqCst) > 0 {
            self.overlapped.store(true, Ordering::SeqCst);
        }
        if documents.len() == 1 {
            thread::sleep(Duration::from_millis(300));
        }
        self.sizes.lock().expect("lock").push(documents.len());
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
    fn on_error(&self, _error: FeedError) {}
}

#[test]
fn test_concurrent_writers_deliver_snapshots_in_write_order() {
    let store = InMemoryRecordStore::new();
    let sizes = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::new(SlowSizes {
        sizes: Arc::clone(&sizes),
        in_flight: AtomicUsize::new(0),
        overlapped: AtomicBool::new(false),
    });
    let _subscription = store
        .subscribe(QueryDescriptor::newest_first("contactMessages"), Arc::clone(&sink) as Arc<dyn SnapshotSink>)
        .expect("subscribe");

    let writer = store.clone();
    let first = thread::spawn(move || {
        writer
            .insert("contactMessages", fields(json!({"name": "Ada"})))
            .expect("first insert");
    });
    thread::sleep(Duration::from_millis(50));
    store
        .insert("contactMessages", fields(json!({"name": "Linus"})))
        .expect("second insert");
    first.join().expect("writer thread");

    assert_eq!(*sizes.lock().expect("lock"), vec![0, 1, 2]);
    assert!(!sink.overlapped.load(Ordering::SeqCst));
}

#[test]
fn test_concurrent_writers_leave_feed_on_latest_snapshot() {
    let store = InMemoryRecordStore::new();
    let dashboard = AdminDashboard::open_with_clock(&store, &config(), frozen()).expect("open");

    let writers: Vec<_> = (0..8)
        .map(|n| {
            let writer = store.clone();
            thread::spawn(move || {
                writer
                    .insert("contactMessages", fields(json!({"name": format!("sender {n}")})))
                    .expect("insert");
            })
        })
        .collect();
    for writer in writers {
        writer.join().expect("writer thread");
    }

    let total = dashboard.messages().current().view().map(|v| v.total);
    assert_eq!(total, Some(8));
}

/// Writes back into the store from inside its own callback
struct EchoWriter {
    store: InMemoryRecordStore,
    sizes: Mutex<Vec<usize>>,
}

impl SnapshotSink for EchoWriter {
    fn on_snapshot(&self, documents: Vec<Document>) {
        let len = documents.len();
        self.sizes.lock().expect("lock").push(len);
        if len == 1 {
            self.store
                .insert("contactMessages", fields(json!({"name": "echo"})))
                .expect("nested insert");
        }
    }
    fn on_error(&self, _error: FeedError) {}
}

#[test]
fn test_sink_may_write_back_into_store() {
    let store = InMemoryRecordStore::new();
    let sink = Arc::new(EchoWriter {
        store: store.clone(),
        sizes: Mutex::new(Vec::new()),
    });
    let _subscription = store
        .subscribe(QueryDescriptor::newest_first("contactMessages"), Arc::clone(&sink) as Arc<dyn SnapshotSink>)
        .expect("subscribe");

    store
        .insert("contactMessages", fields(json!({"name": "Ada"})))
        .expect("insert");

    assert_eq!(*sink.sizes.lock().expect("lock"), vec![0, 1, 2]);
}
