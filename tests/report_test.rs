//! Integration tests for view_model.rs, report.rs and snapshot_file.rs

use backoffice_dashboard::aggregator::Aggregator;
use backoffice_dashboard::feed::{DashboardState, FeedError};
use backoffice_dashboard::models::{ClientRecord, Document, FromDocument, MessageRecord};
use backoffice_dashboard::report::{render, DashboardReport, ReportFormat, ReportSection};
use backoffice_dashboard::snapshot_file::{load_documents, load_documents_or_empty, save_documents};
use backoffice_dashboard::view_model::{present, DashboardView};
use chrono::{DateTime, FixedOffset, TimeZone};
use serde_json::json;

fn reference() -> DateTime<FixedOffset> {
    FixedOffset::east_opt(0)
        .expect("offset")
        .with_ymd_and_hms(2024, 3, 15, 12, 0, 0)
        .single()
        .expect("reference")
}

fn documents() -> Vec<Document> {
    serde_json::from_value(json!([
        {"id": "1", "name": "Ada", "email": "ada@example.com", "urgency": "Critical",
         "read": true, "message": "Engine fault", "createdAt": "2024-03-15T10:00:00Z"},
        {"id": "2", "name": "Linus", "urgency": "High", "createdAt": "2024-03-15T08:00:00Z"},
        {"id": "3", "urgency": "High", "read": false, "createdAt": "2024-03-12T08:00:00Z"},
        {"id": "4", "createdAt": {"_seconds": 1_709_287_200, "_nanoseconds": 0}},
        {"id": "5", "urgency": "Someday"},
    ]))
    .expect("documents")
}

fn message_view() -> DashboardView {
    let records: Vec<MessageRecord> = documents().iter().map(MessageRecord::from_document).collect();
    let result = Aggregator::for_records::<MessageRecord>()
        .aggregate(&records, &reference())
        .expect("aggregate");
    present(&result)
}

#[test]
fn test_present_counts_and_rates() {
    let view = message_view();

    assert_eq!(view.total, 5);
    assert_eq!(view.unread_or_active_count, 4);
    assert_eq!(view.read_rate_percent, 20);
    assert_eq!(view.unread_rate_percent, 80);
    assert_eq!(view.window_total, 3);
    assert_eq!(view.series.len(), 14);
    assert_eq!(view.series.last().map(|p| (p.label.as_str(), p.value)), Some(("03/15", 2)));
}

#[test]
fn test_present_breakdown_uses_histogram_total() {
    let view = message_view();
    let shares: Vec<(&str, usize, u8)> = view
        .category_breakdown
        .iter()
        .map(|s| (s.category.as_str(), s.count, s.percent))
        .collect();

    // "Someday" is not a tracked urgency, so four records are categorized
    assert_eq!(
        shares,
        vec![("Critical", 1, 25), ("High", 2, 50), ("Normal", 1, 25), ("Low", 0, 0)]
    );
}

#[test]
fn test_present_recent_entries() {
    let view = message_view();
    let ids: Vec<&str> = view.recent.iter().map(|r| r.id.as_str()).collect();
    assert_eq!(ids, vec!["1", "2", "3", "4"]);
    assert_eq!(view.recent[0].title, "Ada");
    assert!(!view.recent[0].actionable);
    assert_eq!(view.recent[2].title, "Unknown");
}

#[test]
fn test_present_empty_snapshot() {
    let records: Vec<MessageRecord> = Vec::new();
    let result = Aggregator::for_records::<MessageRecord>()
        .aggregate(&records, &reference())
        .expect("aggregate");
    let view = present(&result);

    assert_eq!(view.total, 0);
    assert_eq!(view.read_rate_percent, 100);
    assert_eq!(view.unread_rate_percent, 0);
    assert!(view.category_breakdown.iter().all(|s| s.percent == 0));
    assert!(view.series.iter().all(|p| p.value == 0));
}

fn report() -> DashboardReport {
    let view = message_view();
    DashboardReport {
        generated_at: reference(),
        messages: ReportSection::from_state(
            "contactMessages",
            &DashboardState::Ready { view },
        ),
        clients: ReportSection::from_state(
            "clients",
            &DashboardState::FeedError {
                last_good: None,
                error: FeedError::new("permission-denied", "missing role"),
            },
        ),
    }
}

#[test]
fn test_render_text() {
    let text = render(&report(), ReportFormat::Text).expect("render");

    assert!(text.contains("Dashboard as of 2024-03-15 12:00 +00:00"));
    assert!(text.contains("Messages (contactMessages)"));
    assert!(text.contains("Last 14 days: 3"));
    assert!(text.contains("Unread: 4 of 5 (read rate 20%)"));
    assert!(text.contains("Critical 1 (25%)"));
    assert!(text.contains("- Ada <ada@example.com> [Critical] 2024-03-15 10:00"));
    assert!(text.contains("Clients (clients)"));
    assert!(text.contains("! Feed error: permission-denied: missing role"));
    assert!(text.contains("No data"));
}

#[test]
fn test_render_json() {
    let text = render(&report(), ReportFormat::Json).expect("render");
    let value: serde_json::Value = serde_json::from_str(&text).expect("json");

    assert_eq!(value["messages"]["view"]["total"], json!(5));
    assert_eq!(value["messages"]["view"]["read_rate_percent"], json!(20));
    assert_eq!(value["clients"]["error"]["code"], json!("permission-denied"));
    assert!(value["clients"]["view"].is_null());
}

#[test]
fn test_render_yaml() {
    let text = render(&report(), ReportFormat::Yaml).expect("render");
    assert!(text.contains("collection: contactMessages"));
    assert!(text.contains("window_total: 3"));
}

#[test]
fn test_snapshot_file_round_trip() {
    let dir = tempfile::tempdir().expect("temp dir");
    let path = dir.path().join("exports").join("messages.json");

    save_documents(&documents(), &path).expect("save");
    let loaded = load_documents(&path).expect("load");

    assert_eq!(loaded, documents());
}

#[test]
fn test_snapshot_file_missing_and_malformed() {
    let dir = tempfile::tempdir().expect("temp dir");
    let missing = dir.path().join("absent.json");

    assert!(load_documents(&missing).is_err());
    assert!(load_documents_or_empty(&missing).expect("empty").is_empty());

    let malformed = dir.path().join("bad.json");
    std::fs::write(&malformed, "{\"not\": \"an array\"}").expect("write");
    assert!(load_documents(&malformed).is_err());
}

#[test]
fn test_render_text_client_section_has_no_read_rate() {
    let documents: Vec<Document> = serde_json::from_value(json!([
        {"id": "c1", "name": "Acme", "status": "active", "createdAt": "2024-03-14T09:00:00Z"},
        {"id": "c2", "name": "Globex", "status": "inactive", "createdAt": "2024-03-13T09:00:00Z"},
    ]))
    .expect("documents");
    let records: Vec<ClientRecord> = documents.iter().map(ClientRecord::from_document).collect();
    let result = Aggregator::for_records::<ClientRecord>()
        .aggregate(&records, &reference())
        .expect("aggregate");
    let report = DashboardReport {
        generated_at: reference(),
        messages: ReportSection::from_state("contactMessages", &DashboardState::Ready { view: message_view() }),
        clients: ReportSection::from_state("clients", &DashboardState::Ready { view: present(&result) }),
    };

    let text = render(&report, ReportFormat::Text).expect("render");
    let client_section = text.split("Clients (clients)").nth(1).expect("client section");

    assert!(client_section.contains("Active: 1 of 2\n"));
    assert!(!client_section.contains("read rate"));
    assert!(text.contains("Unread: 4 of 5 (read rate 20%)"));
}
