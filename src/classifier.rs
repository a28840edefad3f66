//! Record classification
//!
//! Derives, for each record kind, the three facts the aggregator folds over:
//! when the record happened, whether it is actionable (an unread message or
//! an active client) and which category it belongs to.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::models::{ClientRecord, ClientStatus, MessageRecord, Urgency};

/// Longest message excerpt carried into a recent-items summary
pub const EXCERPT_CHARS: usize = 160;

/// What the aggregator needs to know about one record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    /// Creation instant, `None` when absent or unrecognized
    pub effective_date: Option<DateTime<Utc>>,
    /// Unread for messages, active for clients
    pub actionable: bool,
    /// Urgency level for messages, status for clients
    pub category: String,
}

/// Presentation summary of a record for a "recent" list
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecentEntry {
    /// Store id
    pub id: String,
    /// Display name, `Unknown` when the record has none
    pub title: String,
    /// Email address if known
    pub email: Option<String>,
    /// Company if known
    pub company: Option<String>,
    /// Short body text
    pub excerpt: Option<String>,
    /// Category label
    pub category: String,
    /// Creation instant
    pub created_at: Option<DateTime<Utc>>,
    /// Unread / active marker
    pub actionable: bool,
}

/// Classification seam shared by every record kind the dashboard shows
pub trait Classify {
    /// Classify this record. Never fails; missing data falls back to
    /// defaults.
    fn classify(&self) -> Classification;

    /// Summary for the recent-items list
    fn recent_entry(&self) -> RecentEntry;

    /// Category labels the histogram tracks, in display order
    fn default_categories() -> Vec<String>;
}

impl Classify for MessageRecord {
    fn classify(&self) -> Classification {
        Classification {
            effective_date: self.created_at.instant(),
            actionable: self.is_unread(),
            category: self.urgency.as_ref().map_or_else(
                || Urgency::default().as_str().to_string(),
                |urgency| urgency.as_str().to_string(),
            ),
        }
    }

    fn recent_entry(&self) -> RecentEntry {
        let classification = self.classify();
        RecentEntry {
            id: self.id.clone(),
            title: display_name(self.name.as_deref()),
            email: self.email.clone(),
            company: self.company.clone(),
            excerpt: excerpt(&self.message),
            category: classification.category,
            created_at: classification.effective_date,
            actionable: classification.actionable,
        }
    }

    fn default_categories() -> Vec<String> {
        Urgency::ALL.iter().map(|u| u.as_str().to_string()).collect()
    }
}

impl Classify for ClientRecord {
    fn classify(&self) -> Classification {
        Classification {
            effective_date: self.created_at.instant(),
            actionable: self.is_active(),
            category: self.status.as_ref().map_or_else(
                || ClientStatus::default().as_str().to_string(),
                |status| status.as_str().to_string(),
            ),
        }
    }

    fn recent_entry(&self) -> RecentEntry {
        let classification = self.classify();
        RecentEntry {
            id: self.id.clone(),
            title: display_name(self.name.as_deref()),
            email: self.email.clone(),
            company: self.company.clone(),
            excerpt: None,
            category: classification.category,
            created_at: classification.effective_date,
            actionable: classification.actionable,
        }
    }

    fn default_categories() -> Vec<String> {
        ClientStatus::ALL
            .iter()
            .map(|s| s.as_str().to_string())
            .collect()
    }
}

fn display_name(name: Option<&str>) -> String {
    match name.map(str::trim) {
        Some(name) if !name.is_empty() => name.to_string(),
        _ => "Unknown".to_string(),
    }
}

fn excerpt(body: &str) -> Option<String> {
    let body = body.trim();
    if body.is_empty() {
        return None;
    }
    if body.chars().count() <= EXCERPT_CHARS {
        return Some(body.to_string());
    }
    let cut: String = body.chars().take(EXCERPT_CHARS).collect();
    Some(format!("{}…", cut.trim_end()))
}
