//! The normalized timeline event and its value types.

use chrono::NaiveDateTime;
use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::fmt;

use super::time::{flexible, flexible_option};

// ---------------------------------------------------------------------------
// EventId
// ---------------------------------------------------------------------------

/// Opaque event identifier, stable across recomputations.
///
/// Ids are namespaced by their source upstream (`contract-notice-…`,
/// `ticket-…`), so the timeline never deduplicates them.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventId(String);

impl EventId {
    #[must_use]
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for EventId {
    fn from(raw: &str) -> Self {
        Self::new(raw)
    }
}

impl From<String> for EventId {
    fn from(raw: String) -> Self {
        Self(raw)
    }
}

// ---------------------------------------------------------------------------
// EventKind
// ---------------------------------------------------------------------------

/// Originating domain of an event. Display only; never used for layout.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum EventKind {
    /// Notice period bar leading up to a contract's end.
    ContractNotice,
    /// Point milestone at a contract's end date.
    ContractMilestone,
    /// Issue-tracker ticket spanning creation to close.
    Ticket,
    /// Any tag the normalizer does not recognize, kept verbatim.
    Other(String),
}

impl EventKind {
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::ContractNotice => "contract-notice",
            Self::ContractMilestone => "contract-milestone",
            Self::Ticket => "ticket",
            Self::Other(raw) => raw,
        }
    }

    /// Returns true for kinds derived from contracts.
    #[must_use]
    pub const fn is_contract(&self) -> bool {
        matches!(self, Self::ContractNotice | Self::ContractMilestone)
    }

    /// Label for the detail view.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::ContractNotice | Self::ContractMilestone => "Contract",
            Self::Ticket => "Ticket",
            Self::Other(_) => "Other",
        }
    }
}

impl From<String> for EventKind {
    fn from(raw: String) -> Self {
        match raw.as_str() {
            "contract-notice" => Self::ContractNotice,
            "contract-milestone" => Self::ContractMilestone,
            "ticket" => Self::Ticket,
            _ => Self::Other(raw),
        }
    }
}

impl From<&str> for EventKind {
    fn from(raw: &str) -> Self {
        Self::from(raw.to_string())
    }
}

impl From<EventKind> for String {
    fn from(kind: EventKind) -> Self {
        match kind {
            EventKind::Other(raw) => raw,
            known => known.as_str().to_string(),
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Metadata
// ---------------------------------------------------------------------------

/// Ordered string-keyed display values attached to an event.
///
/// Keys keep the order the source wrote them in. The core never interprets
/// keys; the normalizer only reads the reference-URL key to fill
/// [`Event::reference_url`], leaving the entry in place.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Metadata(IndexMap<String, Value>);

impl Metadata {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an entry, replacing the value of an existing key in place.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(key.into(), value.into());
    }

    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(key, value);
        self
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Remove and return the value stored under `key`, keeping the order of the rest.
    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.0.shift_remove(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Render a metadata value for display: strings unquoted, lists comma-joined.
#[must_use]
pub fn display_value(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(text) => text.clone(),
        Value::Array(items) => items.iter().map(display_value).collect::<Vec<_>>().join(", "),
        other => other.to_string(),
    }
}

impl<'de> Deserialize<'de> for Metadata {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        // Upstream writes `"metadata": null` for items without details
        let entries = Option::<IndexMap<String, Value>>::deserialize(deserializer)?;
        Ok(Self(entries.unwrap_or_default()))
    }
}

impl FromIterator<(String, Value)> for Metadata {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(entries: I) -> Self {
        Self(entries.into_iter().collect())
    }
}

// ---------------------------------------------------------------------------
// Interval
// ---------------------------------------------------------------------------

/// Closed time interval `[start, end]` used for overlap testing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Interval {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
}

impl Interval {
    /// Build the interval for an event. A missing end is a zero-width point;
    /// an end before the start is clamped to the start.
    #[must_use]
    pub fn new(start: NaiveDateTime, end: Option<NaiveDateTime>) -> Self {
        let end = end.filter(|end| *end >= start).unwrap_or(start);
        Self { start, end }
    }

    /// Closed-interval overlap: shared endpoints count as a collision.
    #[must_use]
    pub fn overlaps(&self, other: &Self) -> bool {
        self.start <= other.end && other.start <= self.end
    }
}

// ---------------------------------------------------------------------------
// Event
// ---------------------------------------------------------------------------

/// A normalized, time-bounded record placed on the timeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub id: EventId,
    pub title: String,
    #[serde(with = "flexible")]
    pub start: NaiveDateTime,
    #[serde(with = "flexible_option", default, skip_serializing_if = "Option::is_none")]
    pub end: Option<NaiveDateTime>,
    pub kind: EventKind,
    pub color: String,
    #[serde(default, skip_serializing_if = "Metadata::is_empty")]
    pub metadata: Metadata,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference_url: Option<String>,
}

impl Event {
    /// The closed interval this event occupies for overlap purposes.
    #[must_use]
    pub fn interval(&self) -> Interval {
        Interval::new(self.start, self.end)
    }

    /// Returns true when the event has no end and renders as a point.
    #[must_use]
    pub const fn is_point(&self) -> bool {
        self.end.is_none()
    }

    /// Returns true when `end` precedes `start`.
    #[must_use]
    pub fn is_inverted(&self) -> bool {
        self.end.is_some_and(|end| end < self.start)
    }
}
