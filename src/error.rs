//! Error types for the backoffice-dashboard library.
//!
//! This module provides custom error types using `thiserror`. Malformed
//! records are deliberately absent from the taxonomy: they are recovered
//! locally by the classifier and never surface as errors.

use thiserror::Error;

use crate::feed::FeedError;

/// Errors that can occur in the backoffice-dashboard application.
#[derive(Error, Debug)]
pub enum DashboardError {
    /// Aggregation window must cover at least one day
    #[error("Invalid window: {0}")]
    InvalidWindow(String),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Input rejected by validation
    #[error("Validation failed: {0}")]
    Validation(String),

    /// Document not found in a collection
    #[error("Document not found: {collection}/{id}")]
    DocumentNotFound {
        /// Collection that was searched
        collection: String,
        /// Id that was requested
        id: String,
    },

    /// The record feed reported a failure
    #[error("Record feed unavailable: {0}")]
    Feed(#[from] FeedError),

    /// File I/O errors
    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// YAML rendering errors
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// A thread panicked while holding the record store lock
    #[error("Record store lock poisoned")]
    LockPoisoned,
}

/// Convenience type alias for Result with `DashboardError`
pub type Result<T> = std::result::Result<T, DashboardError>;
