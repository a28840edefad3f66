//! Dashboard report rendering
//!
//! Renders the two dashboard views as a plain-text summary, JSON or YAML.

use std::fmt::Write as _;
use std::str::FromStr;

use chrono::{DateTime, FixedOffset};
use serde::Serialize;

use crate::error::{DashboardError, Result};
use crate::feed::{DashboardState, FeedError};
use crate::view_model::DashboardView;

/// Output format for reports
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum ReportFormat {
    /// Human-readable summary
    #[default]
    Text,
    /// Pretty-printed JSON
    Json,
    /// YAML
    Yaml,
}

impl FromStr for ReportFormat {
    type Err = DashboardError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "text" | "txt" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            "yaml" | "yml" => Ok(Self::Yaml),
            other => Err(DashboardError::InvalidConfig(format!(
                "Unknown report format: {other}"
            ))),
        }
    }
}

/// One collection's section of a report
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportSection {
    /// Collection the section covers
    pub collection: String,
    /// Latest view, possibly stale if `error` is set
    pub view: Option<DashboardView>,
    /// Feed failure, if the feed is not healthy
    pub error: Option<FeedError>,
}

impl ReportSection {
    /// Section for a feed's current state
    #[must_use]
    pub fn from_state(collection: &str, state: &DashboardState) -> Self {
        Self {
            collection: collection.to_string(),
            view: state.view().cloned(),
            error: state.error().cloned(),
        }
    }
}

/// Both dashboard sections as of a reference time
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DashboardReport {
    /// Reference instant the day windows were computed against
    pub generated_at: DateTime<FixedOffset>,
    /// Contact messages section
    pub messages: ReportSection,
    /// Clients section
    pub clients: ReportSection,
}

/// Render `report` in `format`
pub fn render(report: &DashboardReport, format: ReportFormat) -> Result<String> {
    match format {
        ReportFormat::Text => Ok(render_text(report)),
        ReportFormat::Json => Ok(serde_json::to_string_pretty(report)?),
        ReportFormat::Yaml => Ok(serde_yaml::to_string(report)?),
    }
}

struct Labels {
    title: &'static str,
    actionable: &'static str,
    category: &'static str,
    show_read_rate: bool,
}

const MESSAGE_LABELS: Labels = Labels {
    title: "Messages",
    actionable: "Unread",
    category: "Urgency",
    show_read_rate: true,
};

const CLIENT_LABELS: Labels = Labels {
    title: "Clients",
    actionable: "Active",
    category: "Status",
    show_read_rate: false,
};

fn render_text(report: &DashboardReport) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Dashboard as of {}", report.generated_at.format("%Y-%m-%d %H:%M %:z"));
    render_section(&mut out, &report.messages, &MESSAGE_LABELS);
    render_section(&mut out, &report.clients, &CLIENT_LABELS);
    out
}

fn render_section(out: &mut String, section: &ReportSection, labels: &Labels) {
    let _ = writeln!(out);
    let _ = writeln!(out, "{} ({})", labels.title, section.collection);

    if let Some(error) = &section.error {
        let _ = writeln!(out, "  ! Feed error: {error}");
    }

    let Some(view) = &section.view else {
        let _ = writeln!(out, "  No data");
        return;
    };

    let _ = writeln!(out, "  Last {} days: {}", view.series.len(), view.window_total);
    if labels.show_read_rate {
        let _ = writeln!(
            out,
            "  {}: {} of {} (read rate {}%)",
            labels.actionable, view.unread_or_active_count, view.total, view.read_rate_percent
        );
    } else {
        let _ = writeln!(out, "  {}: {} of {}", labels.actionable, view.unread_or_active_count, view.total);
    }

    let series: Vec<String> = view
        .series
        .iter()
        .map(|point| format!("{} {}", point.label, point.value))
        .collect();
    let _ = writeln!(out, "  Daily: {}", series.join(", "));

    let breakdown: Vec<String> = view
        .category_breakdown
        .iter()
        .map(|share| format!("{} {} ({}%)", share.category, share.count, share.percent))
        .collect();
    let _ = writeln!(out, "  {}: {}", labels.category, breakdown.join(", "));

    if view.recent.is_empty() {
        return;
    }
    let _ = writeln!(out, "  Recent:");
    for entry in &view.recent {
        let when = entry
            .created_at
            .map(|at| at.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_default();
        let email = entry
            .email
            .as_deref()
            .map(|email| format!(" <{email}>"))
            .unwrap_or_default();
        let marker = if entry.actionable {
            format!(" *{}*", labels.actionable.to_lowercase())
        } else {
            String::new()
        };
        let _ = writeln!(
            out,
            "    - {}{} [{}] {}{}",
            entry.title, email, entry.category, when, marker
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_parsing() {
        assert_eq!("JSON".parse::<ReportFormat>().ok(), Some(ReportFormat::Json));
        assert_eq!("yml".parse::<ReportFormat>().ok(), Some(ReportFormat::Yaml));
        assert!("csv".parse::<ReportFormat>().is_err());
    }
}
