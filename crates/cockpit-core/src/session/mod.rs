//! Timeline session: owns the published snapshot and the selection.
//!
//! # States
//!
//! ```text
//!            begin_fetch            both feeds delivered
//!   Empty ───────────────▶ Loading ─────────────────────▶ Ready
//!                            ▲                              │
//!                            └────────── begin_fetch ───────┘
//!   any ── close ──▶ Closed (terminal; every operation is a no-op)
//! ```
//!
//! Each fetch is identified by a [`FetchTicket`]. Starting a new fetch for a
//! source supersedes the previous one: a late delivery carrying an older
//! ticket is ignored, so only the most recent complete input pair is ever
//! published. Layout runs only when no fetch is outstanding and both sources
//! have delivered at least once.
//!
//! While loading, the previous snapshot stays published and the selection is
//! left alone. Publishing a snapshot that no longer contains the selected id
//! resets the selection.

pub mod actor;

use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::error::ErrorCode;
use crate::feed::FeedError;
use crate::model::event::{Event, EventId};
use crate::model::source::{Source, SourceItem};
use crate::normalize::{DroppedRecord, Normalizer};
use crate::stack::{Layout, layout};

pub use actor::{TimelineHandle, spawn_timeline};

/// Lifecycle state of a [`TimelineSession`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionState {
    Empty,
    Loading,
    Ready,
    Closed,
}

/// Errors surfaced to callers of the session. None of them are fatal.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    #[error("event '{id}' is not in the current timeline")]
    InvalidSelection { id: EventId },
    #[error("timeline session is closed")]
    Closed,
}

impl SessionError {
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::InvalidSelection { .. } => ErrorCode::InvalidSelection,
            Self::Closed => ErrorCode::SessionClosed,
        }
    }
}

/// A feed whose contribution to a snapshot degraded to empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FeedFailure {
    pub source: Source,
    pub code: String,
    pub message: String,
}

impl FeedFailure {
    fn new(source: Source, err: &FeedError) -> Self {
        Self {
            source,
            code: err.code().code().to_string(),
            message: err.to_string(),
        }
    }
}

/// Immutable result of one layout pass.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Snapshot {
    /// Increments with every publication within a session.
    pub revision: u64,
    pub layout: Layout,
    pub dropped: Vec<DroppedRecord>,
    pub feed_failures: Vec<FeedFailure>,
}

impl Snapshot {
    #[must_use]
    pub fn is_degraded(&self) -> bool {
        !self.dropped.is_empty() || !self.feed_failures.is_empty()
    }

    #[must_use]
    pub fn event(&self, id: &EventId) -> Option<&Event> {
        self.layout.find(id).map(|placed| &placed.event)
    }
}

/// Read-only view handed to renderers.
#[derive(Debug, Clone, PartialEq)]
pub struct TimelineView {
    pub state: SessionState,
    pub snapshot: Option<Arc<Snapshot>>,
    pub selection: Option<EventId>,
}

impl TimelineView {
    #[must_use]
    pub const fn empty() -> Self {
        Self {
            state: SessionState::Empty,
            snapshot: None,
            selection: None,
        }
    }

    #[must_use]
    pub fn revision(&self) -> u64 {
        self.snapshot.as_ref().map_or(0, |s| s.revision)
    }

    /// The selected event, resolved against the published snapshot.
    #[must_use]
    pub fn selected_event(&self) -> Option<&Event> {
        let id = self.selection.as_ref()?;
        self.snapshot.as_ref()?.event(id)
    }
}

/// Identifies one in-flight fetch of one source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FetchTicket {
    source: Source,
    serial: u64,
}

impl FetchTicket {
    #[must_use]
    pub const fn source(&self) -> Source {
        self.source
    }
}

/// What happened to a delivered fetch result.
#[derive(Debug, Clone, PartialEq)]
pub enum Delivery {
    /// Superseded by a newer fetch, or the session is closed.
    Stale,
    /// Recorded; the other source is still outstanding.
    Waiting,
    /// Both sources available; a new snapshot was published.
    Published(Arc<Snapshot>),
}

#[derive(Debug, Default)]
struct Slot {
    serial: u64,
    pending: bool,
    latest: Option<Batch>,
}

#[derive(Debug)]
struct Batch {
    items: Vec<SourceItem>,
    failure: Option<FeedFailure>,
}

/// The session state machine. Synchronous; see [`actor`] for the async driver.
#[derive(Debug)]
pub struct TimelineSession {
    state: SessionState,
    normalizer: Normalizer,
    contracts: Slot,
    tickets: Slot,
    snapshot: Option<Arc<Snapshot>>,
    selection: Option<EventId>,
    revision: u64,
}

impl Default for TimelineSession {
    fn default() -> Self {
        Self::new(Normalizer::default())
    }
}

impl TimelineSession {
    #[must_use]
    pub fn new(normalizer: Normalizer) -> Self {
        Self {
            state: SessionState::Empty,
            normalizer,
            contracts: Slot::default(),
            tickets: Slot::default(),
            snapshot: None,
            selection: None,
            revision: 0,
        }
    }

    #[must_use]
    pub const fn state(&self) -> SessionState {
        self.state
    }

    #[must_use]
    pub const fn is_closed(&self) -> bool {
        matches!(self.state, SessionState::Closed)
    }

    #[must_use]
    pub const fn snapshot(&self) -> Option<&Arc<Snapshot>> {
        self.snapshot.as_ref()
    }

    #[must_use]
    pub const fn selection(&self) -> Option<&EventId> {
        self.selection.as_ref()
    }

    #[must_use]
    pub fn selected_event(&self) -> Option<&Event> {
        let id = self.selection.as_ref()?;
        self.snapshot.as_ref()?.event(id)
    }

    #[must_use]
    pub fn view(&self) -> TimelineView {
        TimelineView {
            state: self.state,
            snapshot: self.snapshot.clone(),
            selection: self.selection.clone(),
        }
    }

    fn slot_mut(&mut self, source: Source) -> &mut Slot {
        match source {
            Source::Contracts => &mut self.contracts,
            Source::Tickets => &mut self.tickets,
        }
    }

    /// Start a fetch of `source`, superseding any fetch already in flight.
    ///
    /// Returns `None` once the session is closed.
    pub fn begin_fetch(&mut self, source: Source) -> Option<FetchTicket> {
        if self.is_closed() {
            return None;
        }
        let slot = self.slot_mut(source);
        slot.serial += 1;
        slot.pending = true;
        let ticket = FetchTicket {
            source,
            serial: slot.serial,
        };
        self.state = SessionState::Loading;
        debug!(%source, serial = ticket.serial, "fetch started");
        Some(ticket)
    }

    /// Start fetches of both sources; used on (re)initialization.
    pub fn begin_refresh(&mut self) -> Vec<FetchTicket> {
        Source::ALL
            .into_iter()
            .filter_map(|source| self.begin_fetch(source))
            .collect()
    }

    /// Record the outcome of a fetch and publish when both sources are in.
    ///
    /// A failed fetch contributes no events; the failure is carried on the
    /// snapshot so the UI can surface it.
    pub fn deliver(
        &mut self,
        ticket: FetchTicket,
        outcome: Result<Vec<SourceItem>, FeedError>,
    ) -> Delivery {
        if self.is_closed() {
            return Delivery::Stale;
        }

        let source = ticket.source;
        let slot = self.slot_mut(source);
        if !slot.pending || slot.serial != ticket.serial {
            debug!(%source, serial = ticket.serial, current = slot.serial, "ignoring superseded fetch");
            return Delivery::Stale;
        }

        let batch = match outcome {
            Ok(items) => Batch {
                items,
                failure: None,
            },
            Err(err) => {
                warn!(%source, code = %err.code(), "source feed failed, contributing nothing: {err}");
                Batch {
                    items: Vec::new(),
                    failure: Some(FeedFailure::new(source, &err)),
                }
            }
        };
        slot.pending = false;
        slot.latest = Some(batch);

        match self.publish() {
            Some(snapshot) => Delivery::Published(snapshot),
            None => Delivery::Waiting,
        }
    }

    fn publish(&mut self) -> Option<Arc<Snapshot>> {
        if self.contracts.pending || self.tickets.pending {
            return None;
        }
        let (Some(contracts), Some(tickets)) = (&self.contracts.latest, &self.tickets.latest) else {
            return None;
        };

        let normalized = self.normalizer.normalize(&contracts.items, &tickets.items);
        let feed_failures = [&contracts.failure, &tickets.failure]
            .into_iter()
            .flatten()
            .cloned()
            .collect();

        self.revision += 1;
        let snapshot = Arc::new(Snapshot {
            revision: self.revision,
            layout: layout(normalized.events),
            dropped: normalized.dropped,
            feed_failures,
        });

        let stale_selection = self
            .selection
            .as_ref()
            .filter(|id| !snapshot.layout.contains(id));
        if let Some(id) = stale_selection {
            debug!(%id, "selected event left the timeline, clearing selection");
            self.selection = None;
        }

        info!(
            revision = snapshot.revision,
            events = snapshot.layout.events.len(),
            rows = snapshot.layout.row_count(),
            "timeline snapshot published"
        );
        self.snapshot = Some(Arc::clone(&snapshot));
        self.state = SessionState::Ready;
        Some(snapshot)
    }

    /// Select the event `id` for detail display.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::InvalidSelection`] when `id` is not in the
    /// published snapshot (the selection is left unchanged), or
    /// [`SessionError::Closed`] after [`TimelineSession::close`].
    pub fn select(&mut self, id: &EventId) -> Result<(), SessionError> {
        if self.is_closed() {
            return Err(SessionError::Closed);
        }
        let present = self
            .snapshot
            .as_ref()
            .is_some_and(|snapshot| snapshot.layout.contains(id));
        if !present {
            warn!(%id, code = %ErrorCode::InvalidSelection, "ignoring selection of unknown event");
            return Err(SessionError::InvalidSelection { id: id.clone() });
        }
        self.selection = Some(id.clone());
        Ok(())
    }

    /// Clear the selection. Always succeeds.
    pub fn clear_selection(&mut self) {
        self.selection = None;
    }

    /// Tear the session down: drop all held data and ignore everything after.
    pub fn close(&mut self) {
        if self.is_closed() {
            return;
        }
        self.state = SessionState::Closed;
        self.snapshot = None;
        self.selection = None;
        self.contracts = Slot::default();
        self.tickets = Slot::default();
        info!("timeline session closed");
    }
}
