//! Event normalizer: merges the contract and ticket feeds into one event list.
//!
//! Output order is contract events then ticket events, each in source order.
//! That order only matters as the tie-break for events sharing a start; the
//! stacking engine owns the authoritative ordering.
//!
//! A malformed record is dropped and reported; it never aborts the batch.

use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::ErrorCode;
use crate::model::event::{Event, EventId, EventKind};
use crate::model::source::{Source, SourceItem};
use crate::model::time::parse_timestamp;
use crate::model::{contract, ticket};

/// Metadata key carrying a link to the source document.
pub const DEFAULT_REFERENCE_URL_KEY: &str = "sharepoint_url";

/// Why a single source record was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, thiserror::Error)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum MalformedRecord {
    #[error("record has no id")]
    MissingId,
    #[error("record has no start")]
    MissingStart,
    #[error("invalid start '{raw}'")]
    InvalidStart { raw: String },
    #[error("invalid end '{raw}'")]
    InvalidEnd { raw: String },
}

impl MalformedRecord {
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::MissingId | Self::MissingStart => ErrorCode::MalformedRecord,
            Self::InvalidStart { .. } | Self::InvalidEnd { .. } => ErrorCode::InvalidTimestamp,
        }
    }
}

/// A record the normalizer dropped, with enough context to find it upstream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DroppedRecord {
    pub source: Source,
    /// Zero-based position within its feed.
    pub position: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(flatten)]
    pub reason: MalformedRecord,
}

/// Result of one normalization pass.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Normalized {
    pub events: Vec<Event>,
    pub dropped: Vec<DroppedRecord>,
}

/// Converts source items into [`Event`]s.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Normalizer {
    reference_url_key: String,
}

impl Default for Normalizer {
    fn default() -> Self {
        Self::new(DEFAULT_REFERENCE_URL_KEY)
    }
}

impl Normalizer {
    #[must_use]
    pub fn new(reference_url_key: impl Into<String>) -> Self {
        Self {
            reference_url_key: reference_url_key.into(),
        }
    }

    #[must_use]
    pub fn reference_url_key(&self) -> &str {
        &self.reference_url_key
    }

    /// Merge both feeds, contracts first.
    #[must_use]
    pub fn normalize(&self, contracts: &[SourceItem], tickets: &[SourceItem]) -> Normalized {
        let mut out = Normalized {
            events: Vec::with_capacity(contracts.len() + tickets.len()),
            dropped: Vec::new(),
        };

        for (source, items) in [(Source::Contracts, contracts), (Source::Tickets, tickets)] {
            for (position, item) in items.iter().enumerate() {
                match self.normalize_item(source, item) {
                    Ok(event) => out.events.push(event),
                    Err(reason) => {
                        warn!(
                            %source,
                            position,
                            id = item.id.as_deref().unwrap_or("<none>"),
                            code = %reason.code(),
                            "dropping malformed record: {reason}"
                        );
                        out.dropped.push(DroppedRecord {
                            source,
                            position,
                            id: item.id.clone(),
                            reason,
                        });
                    }
                }
            }
        }

        debug!(
            contracts = contracts.len(),
            tickets = tickets.len(),
            events = out.events.len(),
            dropped = out.dropped.len(),
            "normalized source feeds"
        );
        out
    }

    /// Convert one source item.
    ///
    /// # Errors
    ///
    /// Returns [`MalformedRecord`] when the id or start is missing, or when
    /// the start or end cannot be parsed.
    pub fn normalize_item(
        &self,
        source: Source,
        item: &SourceItem,
    ) -> Result<Event, MalformedRecord> {
        let id = item
            .id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .ok_or(MalformedRecord::MissingId)?;

        let raw_start = item
            .start
            .as_deref()
            .filter(|raw| !raw.trim().is_empty())
            .ok_or(MalformedRecord::MissingStart)?;
        let start = parse_timestamp(raw_start)
            .map_err(|e| MalformedRecord::InvalidStart { raw: e.raw })?;

        let end = match item.end.as_deref().filter(|raw| !raw.trim().is_empty()) {
            Some(raw) => Some(
                parse_timestamp(raw).map_err(|e| MalformedRecord::InvalidEnd { raw: e.raw })?,
            ),
            None => None,
        };

        let kind = item
            .kind
            .as_deref()
            .map_or_else(|| default_kind(source, end.is_some()), EventKind::from);

        let reference_url = item
            .metadata
            .get(&self.reference_url_key)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|url| !url.is_empty())
            .map(str::to_string);

        let color = item
            .color
            .clone()
            .unwrap_or_else(|| default_color(&kind).to_string());

        Ok(Event {
            id: EventId::new(id),
            title: item.title.clone(),
            start,
            end,
            kind,
            color,
            metadata: item.metadata.clone(),
            reference_url,
        })
    }
}

/// Normalize with the default reference-URL key.
#[must_use]
pub fn normalize(contracts: &[SourceItem], tickets: &[SourceItem]) -> Normalized {
    Normalizer::default().normalize(contracts, tickets)
}

fn default_kind(source: Source, has_end: bool) -> EventKind {
    match (source, has_end) {
        (Source::Tickets, _) => EventKind::Ticket,
        (Source::Contracts, true) => EventKind::ContractNotice,
        (Source::Contracts, false) => EventKind::ContractMilestone,
    }
}

const fn default_color(kind: &EventKind) -> &'static str {
    match kind {
        EventKind::ContractNotice => contract::COLOR_NOTICE,
        EventKind::ContractMilestone => contract::COLOR_ACTIVE,
        EventKind::Ticket | EventKind::Other(_) => ticket::DEFAULT_TICKET_COLOR,
    }
}
