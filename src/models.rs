//! Data models for back-office records
//!
//! The record store hands out loosely-typed [`Document`]s. This module turns
//! them into typed records whose optional and unknown-typed fields are
//! represented explicitly: a missing `read` flag is distinct from `false`,
//! and a timestamp that cannot be understood is distinct from one that was
//! never written.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::str::FromStr;
use thiserror::Error;

/// Collection holding inbound contact messages
pub const MESSAGES_COLLECTION: &str = "contactMessages";
/// Collection holding client records
pub const CLIENTS_COLLECTION: &str = "clients";

/// Field names used by stored documents
pub mod fields {
    /// Creation timestamp, written by the store on insert
    pub const CREATED_AT: &str = "createdAt";
    /// Display name of the sender or client
    pub const NAME: &str = "name";
    /// Email address
    pub const EMAIL: &str = "email";
    /// Company name
    pub const COMPANY: &str = "company";
    /// Message body
    pub const MESSAGE: &str = "message";
    /// Urgency level of a message
    pub const URGENCY: &str = "urgency";
    /// Workflow status
    pub const STATUS: &str = "status";
    /// Read flag of a message
    pub const READ: &str = "read";
}

/// A raw record as delivered by the record store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    /// Externally assigned unique id
    pub id: String,
    /// Every other stored field
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl Document {
    /// Create a document from an id and its fields
    pub fn new(id: impl Into<String>, fields: Map<String, Value>) -> Self {
        Self {
            id: id.into(),
            fields,
        }
    }

    /// Look up a field, treating an explicit `null` as absent
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields.get(name).filter(|value| !value.is_null())
    }

    /// Read a string field; values of any other type read as absent
    #[must_use]
    pub fn text(&self, name: &str) -> Option<String> {
        self.field(name).and_then(Value::as_str).map(str::to_string)
    }

    /// The creation timestamp of this document
    #[must_use]
    pub fn created_at(&self) -> Timestamp {
        Timestamp::from_field(self.field(fields::CREATED_AT))
    }
}

/// Creation timestamp of a record, tagged by what the store actually held
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Timestamp {
    /// The field is absent or null
    Missing,
    /// A recognized point in time
    Instant(DateTime<Utc>),
    /// The field holds something that is not a timestamp
    Unrecognized,
}

impl Timestamp {
    /// Interpret a stored field value.
    ///
    /// Recognized forms are the store's `{ "seconds", "nanoseconds" }` object
    /// (also with underscore-prefixed keys, as produced by JSON exports) and
    /// RFC 3339 strings.
    #[must_use]
    pub fn from_field(value: Option<&Value>) -> Self {
        match value {
            None | Some(Value::Null) => Self::Missing,
            Some(Value::String(text)) => DateTime::parse_from_rfc3339(text)
                .map_or(Self::Unrecognized, |ts| Self::Instant(ts.with_timezone(&Utc))),
            Some(Value::Object(map)) => Self::from_store_object(map),
            Some(_) => Self::Unrecognized,
        }
    }

    fn from_store_object(map: &Map<String, Value>) -> Self {
        let seconds = map
            .get("seconds")
            .or_else(|| map.get("_seconds"))
            .and_then(Value::as_i64);
        let nanos = match map.get("nanoseconds").or_else(|| map.get("_nanoseconds")) {
            None => Some(0),
            Some(value) => value.as_u64().and_then(|n| u32::try_from(n).ok()),
        };

        seconds
            .zip(nanos)
            .and_then(|(secs, nanos)| DateTime::from_timestamp(secs, nanos))
            .map_or(Self::Unrecognized, Self::Instant)
    }

    /// The instant, when one was recognized
    #[must_use]
    pub fn instant(&self) -> Option<DateTime<Utc>> {
        match self {
            Self::Instant(ts) => Some(*ts),
            Self::Missing | Self::Unrecognized => None,
        }
    }

    /// Encode an instant the way the store writes server timestamps
    #[must_use]
    pub fn store_value(at: DateTime<Utc>) -> Value {
        json!({
            "seconds": at.timestamp(),
            "nanoseconds": at.timestamp_subsec_nanos(),
        })
    }
}

/// Tri-state read flag of a message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReadFlag {
    /// No flag was ever written
    #[default]
    Unset,
    /// Explicitly marked unread (`read: false`)
    Unread,
    /// Explicitly marked read (`read: true`)
    Read,
}

impl ReadFlag {
    /// Interpret a stored `read` field; non-boolean values read as unset
    #[must_use]
    pub const fn from_field(value: Option<&Value>) -> Self {
        match value {
            Some(Value::Bool(true)) => Self::Read,
            Some(Value::Bool(false)) => Self::Unread,
            _ => Self::Unset,
        }
    }

    /// Only an explicit `true` counts as read
    #[must_use]
    pub const fn is_unread(self) -> bool {
        !matches!(self, Self::Read)
    }
}

/// A stored value that did not match any known variant
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unrecognized value: {0}")]
pub struct UnrecognizedValue(pub String);

/// A categorical field: either a recognized variant or the raw stored text
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Categorical<T> {
    /// Parsed into a known variant
    Known(T),
    /// Text that matched no variant
    Other(String),
}

impl<T: FromStr> Categorical<T> {
    /// Parse stored text, keeping it verbatim when it is not recognized
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        raw.parse().map_or_else(|_| Self::Other(raw.to_string()), Self::Known)
    }

    fn from_document(document: &Document, field: &str) -> Option<Self> {
        document.text(field).map(|raw| Self::parse(&raw))
    }
}

impl<T: AsRef<str>> Categorical<T> {
    /// The category label
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Known(value) => value.as_ref(),
            Self::Other(raw) => raw,
        }
    }
}

/// Urgency a sender attaches to a contact message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Urgency {
    /// Can wait
    Low,
    /// Default urgency
    #[default]
    Normal,
    /// Should be handled soon
    High,
    /// Needs attention now
    Critical,
}

impl Urgency {
    /// All levels, most urgent first (dashboard display order)
    pub const ALL: [Self; 4] = [Self::Critical, Self::High, Self::Normal, Self::Low];

    /// Stored label of this variant
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Low => "Low",
            Self::Normal => "Normal",
            Self::High => "High",
            Self::Critical => "Critical",
        }
    }
}

impl AsRef<str> for Urgency {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl FromStr for Urgency {
    type Err = UnrecognizedValue;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Low" => Ok(Self::Low),
            "Normal" => Ok(Self::Normal),
            "High" => Ok(Self::High),
            "Critical" => Ok(Self::Critical),
            other => Err(UnrecognizedValue(other.to_string())),
        }
    }
}

/// Workflow status of a contact message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageStatus {
    /// Just arrived
    #[default]
    New,
    /// Acknowledged
    Open,
    /// Being worked on
    InProgress,
    /// Handled
    Done,
    /// Closed without further action
    Closed,
}

impl MessageStatus {
    /// Stored label of this variant
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::New => "new",
            Self::Open => "open",
            Self::InProgress => "in_progress",
            Self::Done => "done",
            Self::Closed => "closed",
        }
    }
}

impl AsRef<str> for MessageStatus {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl FromStr for MessageStatus {
    type Err = UnrecognizedValue;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "new" => Ok(Self::New),
            "open" => Ok(Self::Open),
            "in_progress" => Ok(Self::InProgress),
            "done" => Ok(Self::Done),
            "closed" => Ok(Self::Closed),
            other => Err(UnrecognizedValue(other.to_string())),
        }
    }
}

/// Relationship status of a client
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClientStatus {
    /// Created from an inbound message, not yet engaged
    New,
    /// Currently engaged
    #[default]
    Active,
    /// Engagement on hold
    Paused,
    /// No longer engaged
    Inactive,
}

impl ClientStatus {
    /// All statuses in dashboard display order
    pub const ALL: [Self; 4] = [Self::New, Self::Active, Self::Paused, Self::Inactive];

    /// Stored label of this variant
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::New => "new",
            Self::Active => "active",
            Self::Paused => "paused",
            Self::Inactive => "inactive",
        }
    }
}

impl AsRef<str> for ClientStatus {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl FromStr for ClientStatus {
    type Err = UnrecognizedValue;

    /// Case-insensitive, so `"Active"` and `"ACTIVE"` are both active
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "new" => Ok(Self::New),
            "active" => Ok(Self::Active),
            "paused" => Ok(Self::Paused),
            "inactive" => Ok(Self::Inactive),
            _ => Err(UnrecognizedValue(s.to_string())),
        }
    }
}

/// Build a typed record from a store document without ever failing
pub trait FromDocument: Sized {
    /// Malformed or missing fields fall back to their absent representation
    fn from_document(document: &Document) -> Self;
}

/// An inbound contact message
#[derive(Debug, Clone, PartialEq)]
pub struct MessageRecord {
    /// Store-assigned id
    pub id: String,
    /// Sender name
    pub name: Option<String>,
    /// Sender email
    pub email: Option<String>,
    /// Sender company
    pub company: Option<String>,
    /// Message body
    pub message: String,
    /// Urgency as stored; absent means the sender never chose one
    pub urgency: Option<Categorical<Urgency>>,
    /// Workflow status as stored
    pub status: Option<Categorical<MessageStatus>>,
    /// Tri-state read flag
    pub read: ReadFlag,
    /// Creation timestamp
    pub created_at: Timestamp,
}

impl MessageRecord {
    /// Unread unless explicitly marked read
    #[must_use]
    pub const fn is_unread(&self) -> bool {
        self.read.is_unread()
    }
}

impl FromDocument for MessageRecord {
    fn from_document(document: &Document) -> Self {
        Self {
            id: document.id.clone(),
            name: document.text(fields::NAME),
            email: document.text(fields::EMAIL),
            company: document.text(fields::COMPANY),
            message: document.text(fields::MESSAGE).unwrap_or_default(),
            urgency: Categorical::from_document(document, fields::URGENCY),
            status: Categorical::from_document(document, fields::STATUS),
            read: ReadFlag::from_field(document.field(fields::READ)),
            created_at: document.created_at(),
        }
    }
}

/// A client of the business
#[derive(Debug, Clone, PartialEq)]
pub struct ClientRecord {
    /// Store-assigned id
    pub id: String,
    /// Client name
    pub name: Option<String>,
    /// Email, the natural key when a client is derived from a message
    pub email: Option<String>,
    /// Company name
    pub company: Option<String>,
    /// Relationship status as stored
    pub status: Option<Categorical<ClientStatus>>,
    /// Creation timestamp
    pub created_at: Timestamp,
}

impl ClientRecord {
    /// Absent status defaults to active
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.status
            .as_ref()
            .map_or(true, |status| status.as_str().eq_ignore_ascii_case("active"))
    }
}

impl FromDocument for ClientRecord {
    fn from_document(document: &Document) -> Self {
        Self {
            id: document.id.clone(),
            name: document.text(fields::NAME),
            email: document.text(fields::EMAIL),
            company: document.text(fields::COMPANY),
            status: Categorical::from_document(document, fields::STATUS),
            created_at: document.created_at(),
        }
    }
}
