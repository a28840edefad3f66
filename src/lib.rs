//! Back-office Dashboard - Live Activity Aggregation
//!
//! A Rust library for the admin side of a small business site: inbound
//! contact messages and client records are watched as live snapshots and
//! folded into dashboard views.
//!
//! # Features
//!
//! - Day-bucketed activity series over a configurable window
//! - Unread / active totals, read rate and category histograms
//! - Live snapshot feeds published over `tokio::sync::watch`
//! - Contact intake, message triage and client maintenance
//! - Text, JSON and YAML reports

/// Snapshot aggregation
pub mod aggregator;
/// Back-office write operations
pub mod backoffice;
/// Calendar-day windows
pub mod calendar;
/// Record classification
pub mod classifier;
/// Configuration management
pub mod config;
/// Error types
pub mod error;
/// Live dashboard feeds
pub mod feed;
/// Contact form intake
pub mod intake;
/// Logging setup and utilities
pub mod logging;
/// Metrics collection
pub mod metrics;
/// Data models and structures
pub mod models;
/// Report rendering
pub mod report;
/// JSON snapshot files
pub mod snapshot_file;
/// In-memory record store
pub mod store;
/// Input validation and sanitization
pub mod validation;
/// Presentation view model
pub mod view_model;

// Re-export key components for easier access
pub use aggregator::{AggregateResult, Aggregator};
pub use error::{DashboardError, Result};
pub use feed::{AdminDashboard, DashboardFeed, DashboardState, FeedError, RecordStore, ReferenceClock};
pub use models::{ClientRecord, Document, MessageRecord};
pub use store::{InMemoryRecordStore, RecordWriter};
pub use view_model::DashboardView;
