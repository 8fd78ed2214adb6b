//! cockpit-core library.
//!
//! Turns a contracts feed and a tickets feed into a stacked timeline:
//! [`normalize`] merges both feeds into [`model::Event`]s, [`stack::layout`]
//! packs them into non-overlapping rows, and [`session`] keeps the latest
//! published layout plus the current selection while feeds refresh.
//!
//! # Conventions
//!
//! - **Errors**: `thiserror` enums per module, each mapping to an
//!   [`error::ErrorCode`]; `anyhow::Result` only for config loading.
//! - **Logging**: Use `tracing` macros (`info!`, `warn!`, `debug!`).

#![forbid(unsafe_code)]

pub mod config;
pub mod error;
pub mod feed;
pub mod model;
pub mod normalize;
pub mod session;
pub mod stack;

pub use error::ErrorCode;
pub use feed::{DeriveOptions, FeedError, FeedFormat, FileFeed, SourceFeed, StaticFeed};
pub use model::{Event, EventId, EventKind, Metadata, Source, SourceItem};
pub use normalize::{DroppedRecord, MalformedRecord, Normalized, Normalizer};
pub use session::{
    SessionError, SessionState, Snapshot, TimelineHandle, TimelineSession, TimelineView,
    spawn_timeline,
};
pub use stack::{Layout, Placed, Row, layout};
