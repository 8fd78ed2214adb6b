//! Wire shape of a single entry delivered by a source feed.

use indexmap::IndexMap;
use serde::de::IgnoredAny;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

use super::event::Metadata;

/// Which upstream feed a record came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Source {
    Contracts,
    Tickets,
}

impl Source {
    pub const ALL: [Self; 2] = [Self::Contracts, Self::Tickets];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Contracts => "contracts",
            Self::Tickets => "tickets",
        }
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Source {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "contracts" | "contract" => Ok(Self::Contracts),
            "tickets" | "ticket" => Ok(Self::Tickets),
            other => Err(format!("unknown source '{other}': expected contracts or tickets")),
        }
    }
}

/// One timeline entry as produced upstream, before normalization.
///
/// Every field is lenient: a missing, null or oddly typed value never fails
/// the batch. Numbers in text fields are read as their decimal form, other
/// unusable values read as absent, and a record missing its `id` or `start`
/// is rejected later by the normalizer on its own.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SourceItem {
    #[serde(
        default,
        deserialize_with = "lenient_text",
        skip_serializing_if = "Option::is_none"
    )]
    pub id: Option<String>,
    #[serde(
        default,
        rename = "type",
        alias = "kind",
        deserialize_with = "lenient_text",
        skip_serializing_if = "Option::is_none"
    )]
    pub kind: Option<String>,
    #[serde(default, deserialize_with = "lenient_title")]
    pub title: String,
    #[serde(
        default,
        deserialize_with = "lenient_text",
        skip_serializing_if = "Option::is_none"
    )]
    pub start: Option<String>,
    #[serde(
        default,
        deserialize_with = "lenient_text",
        skip_serializing_if = "Option::is_none"
    )]
    pub end: Option<String>,
    #[serde(
        default,
        deserialize_with = "lenient_text",
        skip_serializing_if = "Option::is_none"
    )]
    pub color: Option<String>,
    /// Layout hint computed upstream; ignored, rows are always recomputed.
    #[serde(default, deserialize_with = "lenient_group", skip_serializing)]
    pub group: Option<u32>,
    #[serde(default, deserialize_with = "lenient_metadata")]
    pub metadata: Metadata,
}

fn lenient_text<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    Ok(match Value::deserialize(deserializer)? {
        Value::String(text) => Some(text),
        Value::Number(number) => Some(number.to_string()),
        _ => None,
    })
}

fn lenient_title<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    lenient_text(deserializer).map(Option::unwrap_or_default)
}

fn lenient_group<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<u32>, D::Error> {
    let value = Value::deserialize(deserializer)?;
    Ok(value.as_u64().and_then(|group| u32::try_from(group).ok()))
}

/// Either a JSON object, kept in source order, or anything else.
#[derive(Deserialize)]
#[serde(untagged)]
enum MaybeMap {
    Map(IndexMap<String, Value>),
    #[allow(dead_code)]
    Other(IgnoredAny),
}

fn lenient_metadata<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Metadata, D::Error> {
    Ok(match MaybeMap::deserialize(deserializer)? {
        MaybeMap::Map(entries) => entries.into_iter().collect(),
        MaybeMap::Other(_) => Metadata::new(),
    })
}

/// A batch slot: an item, or an entry that is not even a JSON object.
#[derive(Deserialize)]
#[serde(untagged)]
enum BatchEntry {
    Item(Box<SourceItem>),
    #[allow(dead_code)]
    Junk(IgnoredAny),
}

impl SourceItem {
    #[must_use]
    pub fn new(id: impl Into<String>, title: impl Into<String>, start: impl Into<String>) -> Self {
        Self {
            id: Some(id.into()),
            title: title.into(),
            start: Some(start.into()),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_end(mut self, end: impl Into<String>) -> Self {
        self.end = Some(end.into());
        self
    }

    #[must_use]
    pub fn with_kind(mut self, kind: impl Into<String>) -> Self {
        self.kind = Some(kind.into());
        self
    }

    #[must_use]
    pub fn with_color(mut self, color: impl Into<String>) -> Self {
        self.color = Some(color.into());
        self
    }

    #[must_use]
    pub fn with_metadata(mut self, metadata: Metadata) -> Self {
        self.metadata = metadata;
        self
    }

    /// Parse a JSON array of items.
    ///
    /// Entries that are not objects become empty items so the normalizer
    /// drops them as malformed while the rest of the batch survives.
    ///
    /// # Errors
    ///
    /// Returns an error when `text` is not a JSON array.
    pub fn parse_batch(text: &str) -> serde_json::Result<Vec<Self>> {
        let entries: Vec<BatchEntry> = serde_json::from_str(text)?;
        Ok(entries
            .into_iter()
            .map(|entry| match entry {
                BatchEntry::Item(item) => *item,
                BatchEntry::Junk(_) => Self::default(),
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upstream_item_shape_parses() {
        let raw = r##"{
            "id": "contract-notice-42",
            "type": "contract-notice",
            "title": "Hosting - Notice",
            "start": "2025-01-01",
            "end": "2025-03-01",
            "color": "#F59E0B",
            "group": 0,
            "metadata": {"supplier": "Acme", "notice_days": 60}
        }"##;
        let item: SourceItem = serde_json::from_str(raw).expect("parses");
        assert_eq!(item.id.as_deref(), Some("contract-notice-42"));
        assert_eq!(item.kind.as_deref(), Some("contract-notice"));
        assert_eq!(item.group, Some(0));
        assert_eq!(item.metadata.len(), 2);
    }

    #[test]
    fn kind_alias_is_accepted() {
        let item: SourceItem =
            serde_json::from_str(r#"{"id": "x", "kind": "ticket", "start": "2025-01-01"}"#)
                .expect("parses");
        assert_eq!(item.kind.as_deref(), Some("ticket"));
    }

    #[test]
    fn batch_with_incomplete_records_still_parses() {
        let raw = r#"[{"id": "a", "start": "2025-01-01"}, {"title": "no id, no start"}, {}]"#;
        let items: Vec<SourceItem> = serde_json::from_str(raw).expect("lenient batch");
        assert_eq!(items.len(), 3);
        assert!(items[1].start.is_none());
        assert!(items[2].id.is_none());
    }

    #[test]
    fn null_end_reads_as_absent() {
        let item: SourceItem =
            serde_json::from_str(r#"{"id": "m", "start": "2025-01-01", "end": null}"#)
                .expect("parses");
        assert!(item.end.is_none());
    }

    #[test]
    fn odd_field_types_do_not_reject_the_record() {
        let raw = r#"{"id": 42, "title": null, "start": "2025-01-01", "group": -1,
                      "color": false, "metadata": "none"}"#;
        let item: SourceItem = serde_json::from_str(raw).expect("lenient fields");
        assert_eq!(item.id.as_deref(), Some("42"));
        assert_eq!(item.title, "");
        assert_eq!(item.group, None);
        assert_eq!(item.color, None);
        assert!(item.metadata.is_empty());
    }

    #[test]
    fn lenient_metadata_keeps_source_order() {
        let item: SourceItem =
            serde_json::from_str(r#"{"id": "m", "metadata": {"zeta": 1, "alpha": 2}}"#)
                .expect("parses");
        let keys: Vec<_> = item.metadata.iter().map(|(key, _)| key).collect();
        assert_eq!(keys, ["zeta", "alpha"]);
    }

    #[test]
    fn batch_turns_non_object_entries_into_empty_items() {
        let items = SourceItem::parse_batch(r#"[{"id": "a", "start": "2025-01-01"}, 7, null]"#)
            .expect("lenient batch");
        assert_eq!(items.len(), 3);
        assert_eq!(items[0].id.as_deref(), Some("a"));
        assert_eq!(items[1], SourceItem::default());
        assert_eq!(items[2], SourceItem::default());
    }

    #[test]
    fn batch_must_be_an_array() {
        assert!(SourceItem::parse_batch(r#"{"id": "a"}"#).is_err());
    }

    #[test]
    fn source_parses_singular_and_plural() {
        assert_eq!("tickets".parse::<Source>(), Ok(Source::Tickets));
        assert_eq!("Contract".parse::<Source>(), Ok(Source::Contracts));
        assert!("projects".parse::<Source>().is_err());
    }
}
