//! Issue-tracker tickets and the timeline items derived from them.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};

use super::event::Metadata;
use super::source::SourceItem;
use super::time::{flexible, flexible_option, format_timestamp};

pub const DEFAULT_TICKET_COLOR: &str = "#3B82F6";
pub const DEFAULT_PROJECT_TAG: &str = "#Projet";

fn default_priority() -> String {
    "normal".to_string()
}

fn default_state() -> String {
    "unknown".to_string()
}

/// A ticket as exported by the issue tracker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TicketRecord {
    pub id: u64,
    pub title: String,
    #[serde(default = "default_state")]
    pub state: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(with = "flexible")]
    pub created_at: NaiveDateTime,
    #[serde(with = "flexible")]
    pub updated_at: NaiveDateTime,
    #[serde(with = "flexible_option", default)]
    pub close_at: Option<NaiveDateTime>,
    #[serde(default = "default_priority")]
    pub priority: String,
}

impl TicketRecord {
    #[must_use]
    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t == tag)
    }

    #[must_use]
    pub const fn is_closed(&self) -> bool {
        self.close_at.is_some()
    }

    /// Derive the timeline bar for this ticket.
    ///
    /// Open tickets run until `today`.
    #[must_use]
    pub fn timeline_item(&self, today: NaiveDate, color: &str) -> SourceItem {
        let end = self
            .close_at
            .unwrap_or_else(|| today.and_time(NaiveTime::MIN));

        SourceItem::new(
            format!("ticket-{}", self.id),
            self.title.clone(),
            format_timestamp(&self.created_at),
        )
        .with_end(format_timestamp(&end))
        .with_kind("ticket")
        .with_color(color)
        .with_metadata(
            Metadata::new()
                .with("ticket_id", self.id)
                .with("state", self.state.clone())
                .with("priority", self.priority.clone())
                .with("tags", self.tags.clone()),
        )
    }
}

/// Options controlling which tickets reach the timeline and how they look.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TicketTimelineOptions {
    /// Only tickets carrying this tag are kept; `None` keeps every ticket.
    pub project_tag: Option<String>,
    pub color: String,
}

impl Default for TicketTimelineOptions {
    fn default() -> Self {
        Self {
            project_tag: Some(DEFAULT_PROJECT_TAG.to_string()),
            color: DEFAULT_TICKET_COLOR.to_string(),
        }
    }
}

/// Derive timeline items for the project tickets of a batch, in input order.
#[must_use]
pub fn ticket_timeline(
    tickets: &[TicketRecord],
    today: NaiveDate,
    options: &TicketTimelineOptions,
) -> Vec<SourceItem> {
    tickets
        .iter()
        .filter(|ticket| {
            options
                .project_tag
                .as_deref()
                .is_none_or(|tag| ticket.has_tag(tag))
        })
        .map(|ticket| ticket.timeline_item(today, &options.color))
        .collect()
}
