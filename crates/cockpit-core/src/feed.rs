//! Source feeds: asynchronous producers of [`SourceItem`] batches.
//!
//! A feed failure never blocks the timeline; the session records it and the
//! failing source contributes no events to that snapshot.

use chrono::NaiveDate;
use serde::Serialize;
use std::future::Future;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::error::ErrorCode;
use crate::model::contract::{ContractRecord, contract_timeline};
use crate::model::source::{Source, SourceItem};
use crate::model::ticket::{TicketRecord, TicketTimelineOptions, ticket_timeline};

/// Errors a feed can report for one fetch.
#[derive(Debug, thiserror::Error)]
pub enum FeedError {
    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("source unavailable: {reason}")]
    Unavailable { reason: String },
}

impl FeedError {
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::Read { .. } => ErrorCode::FeedReadFailed,
            Self::Parse { .. } => ErrorCode::FeedParseFailed,
            Self::Unavailable { .. } => ErrorCode::FeedUnavailable,
        }
    }
}

/// An asynchronous producer of timeline items for one source.
pub trait SourceFeed: Send + Sync + 'static {
    /// Fetch the current batch.
    fn fetch(&self) -> impl Future<Output = Result<Vec<SourceItem>, FeedError>> + Send;
}

// ---------------------------------------------------------------------------
// StaticFeed
// ---------------------------------------------------------------------------

/// A feed serving a fixed in-memory batch.
#[derive(Debug, Clone, Default)]
pub struct StaticFeed {
    items: Vec<SourceItem>,
}

impl StaticFeed {
    #[must_use]
    pub const fn new(items: Vec<SourceItem>) -> Self {
        Self { items }
    }
}

impl SourceFeed for StaticFeed {
    async fn fetch(&self) -> Result<Vec<SourceItem>, FeedError> {
        Ok(self.items.clone())
    }
}

// ---------------------------------------------------------------------------
// FileFeed
// ---------------------------------------------------------------------------

/// What a feed file contains.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeedFormat {
    /// Already-shaped timeline items.
    #[default]
    Items,
    /// Raw upstream records (contracts or tickets) derived on read.
    Records,
}

impl FeedFormat {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Items => "items",
            Self::Records => "records",
        }
    }
}

/// Settings applied when deriving items from raw records.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeriveOptions {
    /// Reference day for contract status and open-ticket ends.
    pub today: NaiveDate,
    pub tickets: TicketTimelineOptions,
}

impl DeriveOptions {
    #[must_use]
    pub fn new(today: NaiveDate) -> Self {
        Self {
            today,
            tickets: TicketTimelineOptions::default(),
        }
    }
}

/// A feed reading a JSON array from disk on every fetch.
#[derive(Debug, Clone)]
pub struct FileFeed {
    source: Source,
    path: PathBuf,
    format: FeedFormat,
    derive: DeriveOptions,
}

impl FileFeed {
    #[must_use]
    pub fn new(
        source: Source,
        path: impl Into<PathBuf>,
        format: FeedFormat,
        derive: DeriveOptions,
    ) -> Self {
        Self {
            source,
            path: path.into(),
            format,
            derive,
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Parse file contents according to the feed's source and format.
    ///
    /// # Errors
    ///
    /// Returns [`FeedError::Parse`] when the text is not a JSON array of the
    /// expected shape.
    pub fn parse(&self, text: &str) -> Result<Vec<SourceItem>, FeedError> {
        let parse_err = |source| FeedError::Parse {
            path: self.path.clone(),
            source,
        };

        match (self.format, self.source) {
            (FeedFormat::Items, _) => SourceItem::parse_batch(text).map_err(parse_err),
            (FeedFormat::Records, Source::Contracts) => {
                let records: Vec<ContractRecord> = serde_json::from_str(text).map_err(parse_err)?;
                Ok(contract_timeline(&records, self.derive.today))
            }
            (FeedFormat::Records, Source::Tickets) => {
                let records: Vec<TicketRecord> = serde_json::from_str(text).map_err(parse_err)?;
                Ok(ticket_timeline(&records, self.derive.today, &self.derive.tickets))
            }
        }
    }
}

impl SourceFeed for FileFeed {
    async fn fetch(&self) -> Result<Vec<SourceItem>, FeedError> {
        let text = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|source| FeedError::Read {
                path: self.path.clone(),
                source,
            })?;
        let items = self.parse(&text)?;
        debug!(
            source = %self.source,
            path = %self.path.display(),
            format = self.format.as_str(),
            items = items.len(),
            "feed fetched"
        );
        Ok(items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options() -> DeriveOptions {
        DeriveOptions::new(NaiveDate::from_ymd_opt(2025, 3, 1).expect("valid date"))
    }

    #[test]
    fn items_format_parses_lenient_batch() {
        let feed = FileFeed::new(Source::Tickets, "t.json", FeedFormat::Items, options());
        let items = feed
            .parse(r#"[{"id": "a", "start": "2025-01-01"}, {"title": "broken"}]"#)
            .expect("parses");
        assert_eq!(items.len(), 2);
    }

    #[test]
    fn odd_typed_fields_keep_the_rest_of_the_batch() {
        let feed = FileFeed::new(Source::Contracts, "c.json", FeedFormat::Items, options());
        let items = feed
            .parse(
                r#"[{"id": 7, "title": null, "start": "2025-01-01", "group": -3},
                    {"id": "b", "title": "Fine", "start": "2025-02-01"},
                    "stray"]"#,
            )
            .expect("parses");
        assert_eq!(items.len(), 3);
        assert_eq!(items[0].id.as_deref(), Some("7"));
        assert_eq!(items[0].title, "");
        assert_eq!(items[1].title, "Fine");
        assert!(items[2].id.is_none());
    }

    #[test]
    fn contract_records_are_derived() {
        let feed = FileFeed::new(Source::Contracts, "c.json", FeedFormat::Records, options());
        let items = feed
            .parse(
                r#"[{"id": "c1", "name": "Hosting", "supplier": "Acme", "amount": 10,
                    "start_date": "2024-01-01", "end_date": "2025-12-31",
                    "notice_period_days": 60}]"#,
            )
            .expect("parses");
        let ids: Vec<_> = items.iter().filter_map(|i| i.id.as_deref()).collect();
        assert_eq!(ids, ["contract-milestone-c1", "contract-notice-c1"]);
    }

    #[test]
    fn ticket_records_are_filtered_by_project_tag() {
        let feed = FileFeed::new(Source::Tickets, "t.json", FeedFormat::Records, options());
        let items = feed
            .parse(
                r##"[
                    {"id": 1, "title": "a", "tags": ["#Projet"],
                     "created_at": "2025-01-01T00:00:00Z", "updated_at": "2025-01-01T00:00:00Z"},
                    {"id": 2, "title": "b", "tags": [],
                     "created_at": "2025-01-01T00:00:00Z", "updated_at": "2025-01-01T00:00:00Z"}
                ]"##,
            )
            .expect("parses");
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].id.as_deref(), Some("ticket-1"));
    }

    #[test]
    fn parse_error_names_the_file() {
        let feed = FileFeed::new(Source::Tickets, "broken.json", FeedFormat::Items, options());
        let err = feed.parse("{not json").expect_err("must fail");
        assert_eq!(err.code(), ErrorCode::FeedParseFailed);
        assert!(err.to_string().contains("broken.json"));
    }

    #[tokio::test]
    async fn missing_file_is_a_read_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let feed = FileFeed::new(
            Source::Contracts,
            dir.path().join("absent.json"),
            FeedFormat::Items,
            options(),
        );
        let err = feed.fetch().await.expect_err("must fail");
        assert_eq!(err.code(), ErrorCode::FeedReadFailed);
    }

    #[tokio::test]
    async fn file_feed_reads_from_disk() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("items.json");
        std::fs::write(&path, r#"[{"id": "x", "start": "2025-01-01"}]"#).expect("write");
        let feed = FileFeed::new(Source::Tickets, &path, FeedFormat::Items, options());
        let items = feed.fetch().await.expect("reads");
        assert_eq!(items.len(), 1);
        assert_eq!(feed.path(), path.as_path());
    }

    #[tokio::test]
    async fn static_feed_serves_its_batch() {
        let feed = StaticFeed::new(vec![SourceItem::new("a", "A", "2025-01-01")]);
        assert_eq!(feed.fetch().await.expect("static").len(), 1);
    }
}
