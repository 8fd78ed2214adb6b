//! Async driver for a [`TimelineSession`].
//!
//! The session lives inside a single task. Callers hold a cheap, cloneable
//! [`TimelineHandle`]; commands travel over an mpsc channel and the current
//! [`TimelineView`] is published on a watch channel for renderers.
//!
//! ```text
//!   TimelineHandle        mpsc       TimelineActor               fetch tasks
//!   ┌──────────────┐  ─────────▶  ┌───────────────────┐  spawn  ┌───────────┐
//!   │ .refresh()   │              │ TimelineSession   │ ──────▶ │ contracts │
//!   │ .select()    │  ◀─────────  │ in-flight fetches │ ◀────── │ tickets   │
//!   │ .view()      │    watch     └───────────────────┘ results └───────────┘
//!   └──────────────┘
//! ```
//!
//! Starting a fetch for a source aborts the one already in flight for it, and
//! any result that still slips through carries a superseded ticket and is
//! ignored by the session. A fetch that panics is reported as an unavailable
//! feed for its source. Shutting down aborts everything in flight, so no
//! snapshot is published after teardown.

use std::collections::HashMap;
use std::ops::ControlFlow;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::{AbortHandle, JoinHandle};
use tracing::{debug, info, warn};

use super::{
    Delivery, FetchTicket, SessionError, SessionState, Snapshot, TimelineSession, TimelineView,
};
use crate::feed::{FeedError, SourceFeed};
use crate::model::event::EventId;
use crate::model::source::{Source, SourceItem};
use crate::normalize::Normalizer;

type FetchResult = (FetchTicket, Result<Vec<SourceItem>, FeedError>);

enum Command {
    Refresh {
        source: Option<Source>,
    },
    Select {
        id: EventId,
        reply: oneshot::Sender<Result<(), SessionError>>,
    },
    ClearSelection,
    Shutdown {
        reply: oneshot::Sender<()>,
    },
}

// ============================================================================
// TimelineHandle
// ============================================================================

/// Handle to a running timeline session.
///
/// Dropping every handle tears the session down, same as [`Self::shutdown`].
#[derive(Clone)]
pub struct TimelineHandle {
    tx: mpsc::UnboundedSender<Command>,
    view: watch::Receiver<TimelineView>,
}

impl TimelineHandle {
    fn send(&self, command: Command) -> Result<(), SessionError> {
        self.tx.send(command).map_err(|_| SessionError::Closed)
    }

    /// Refetch both sources.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Closed`] after shutdown.
    pub fn refresh(&self) -> Result<(), SessionError> {
        self.send(Command::Refresh { source: None })
    }

    /// Refetch one source; the other keeps its last delivered batch.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Closed`] after shutdown.
    pub fn refresh_source(&self, source: Source) -> Result<(), SessionError> {
        self.send(Command::Refresh {
            source: Some(source),
        })
    }

    /// Select an event of the published snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::InvalidSelection`] when the id is not in the
    /// published snapshot, or [`SessionError::Closed`] after shutdown.
    pub async fn select(&self, id: impl Into<EventId>) -> Result<(), SessionError> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Select {
            id: id.into(),
            reply,
        })?;
        rx.await.map_err(|_| SessionError::Closed)?
    }

    /// Clear the selection.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Closed`] after shutdown.
    pub fn clear_selection(&self) -> Result<(), SessionError> {
        self.send(Command::ClearSelection)
    }

    /// The most recently published view.
    #[must_use]
    pub fn view(&self) -> TimelineView {
        self.view.borrow().clone()
    }

    /// A receiver notified on every published view.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<TimelineView> {
        self.view.clone()
    }

    /// Wait until a snapshot with at least `revision` is published.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Closed`] if the session shuts down first.
    pub async fn wait_ready(&self, revision: u64) -> Result<Arc<Snapshot>, SessionError> {
        let mut rx = self.view.clone();
        let view = rx
            .wait_for(|view| view.state == SessionState::Closed || view.revision() >= revision)
            .await
            .map_err(|_| SessionError::Closed)?;
        if view.state == SessionState::Closed {
            return Err(SessionError::Closed);
        }
        view.snapshot.clone().ok_or(SessionError::Closed)
    }

    /// Wait for the first snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Closed`] if the session shuts down first.
    pub async fn ready(&self) -> Result<Arc<Snapshot>, SessionError> {
        self.wait_ready(1).await
    }

    /// Tear the session down and wait until the actor has released everything.
    pub async fn shutdown(&self) {
        let (reply, rx) = oneshot::channel();
        if self.send(Command::Shutdown { reply }).is_ok() {
            let _ = rx.await;
        }
    }
}

// ============================================================================
// TimelineActor
// ============================================================================

/// A running fetch and the task waiting on it to report the result.
struct InFlight {
    fetch: AbortHandle,
    watcher: JoinHandle<()>,
}

impl InFlight {
    fn abort(&self) {
        self.fetch.abort();
        self.watcher.abort();
    }
}

fn spawn_fetch<F: SourceFeed>(
    feed: Arc<F>,
    source: Source,
    ticket: FetchTicket,
    results: mpsc::UnboundedSender<FetchResult>,
) -> InFlight {
    let fetch = tokio::spawn(async move { feed.fetch().await });
    let abort = fetch.abort_handle();
    let watcher = tokio::spawn(async move {
        let outcome = match fetch.await {
            Ok(outcome) => outcome,
            Err(err) if err.is_panic() => {
                warn!(%source, "feed fetch panicked");
                Err(FeedError::Unavailable {
                    reason: format!("{source} feed panicked while fetching"),
                })
            }
            // Cancelled: superseded or shut down, nothing to report
            Err(_) => return,
        };
        let _ = results.send((ticket, outcome));
    });
    InFlight {
        fetch: abort,
        watcher,
    }
}

struct TimelineActor<C, T> {
    session: TimelineSession,
    contracts: Arc<C>,
    tickets: Arc<T>,
    in_flight: HashMap<Source, InFlight>,
    results: mpsc::UnboundedSender<FetchResult>,
    view: watch::Sender<TimelineView>,
}

impl<C: SourceFeed, T: SourceFeed> TimelineActor<C, T> {
    fn publish_view(&self) {
        self.view.send_replace(self.session.view());
    }

    fn start_fetch(&mut self, source: Source) {
        let Some(ticket) = self.session.begin_fetch(source) else {
            return;
        };

        let results = self.results.clone();
        let task = match source {
            Source::Contracts => spawn_fetch(Arc::clone(&self.contracts), source, ticket, results),
            Source::Tickets => spawn_fetch(Arc::clone(&self.tickets), source, ticket, results),
        };

        if let Some(previous) = self.in_flight.insert(source, task) {
            debug!(%source, "aborting superseded fetch");
            previous.abort();
        }
    }

    fn refresh(&mut self, source: Option<Source>) {
        match source {
            Some(source) => self.start_fetch(source),
            None => {
                for source in Source::ALL {
                    self.start_fetch(source);
                }
            }
        }
        self.publish_view();
    }

    fn deliver(&mut self, (ticket, outcome): FetchResult) {
        if let Delivery::Published(_) = self.session.deliver(ticket, outcome) {
            self.publish_view();
        }
    }

    /// Apply one command. Breaks with the reply channel on shutdown.
    fn handle(&mut self, command: Command) -> ControlFlow<oneshot::Sender<()>> {
        match command {
            Command::Refresh { source } => self.refresh(source),
            Command::Select { id, reply } => {
                let result = self.session.select(&id);
                if result.is_ok() {
                    self.publish_view();
                }
                let _ = reply.send(result);
            }
            Command::ClearSelection => {
                self.session.clear_selection();
                self.publish_view();
            }
            Command::Shutdown { reply } => {
                self.shutdown();
                return ControlFlow::Break(reply);
            }
        }
        ControlFlow::Continue(())
    }

    fn shutdown(&mut self) {
        for (_, task) in self.in_flight.drain() {
            task.abort();
        }
        self.session.close();
        self.publish_view();
    }

    async fn run(
        mut self,
        mut commands: mpsc::UnboundedReceiver<Command>,
        mut results: mpsc::UnboundedReceiver<FetchResult>,
    ) {
        self.refresh(None);

        loop {
            tokio::select! {
                biased;

                command = commands.recv() => match command {
                    Some(command) => {
                        if let ControlFlow::Break(reply) = self.handle(command) {
                            commands.close();
                            let _ = reply.send(());
                            break;
                        }
                    }
                    None => {
                        debug!("all timeline handles dropped");
                        self.shutdown();
                        break;
                    }
                },
                Some(result) = results.recv() => self.deliver(result),
            }
        }
        info!("timeline actor stopped");
    }
}

/// Start a timeline session over two feeds and fetch both immediately.
///
/// Must be called from within a tokio runtime.
pub fn spawn_timeline<C, T>(contracts: C, tickets: T, normalizer: Normalizer) -> TimelineHandle
where
    C: SourceFeed,
    T: SourceFeed,
{
    let (tx, commands) = mpsc::unbounded_channel();
    let (results_tx, results) = mpsc::unbounded_channel();
    let (view_tx, view) = watch::channel(TimelineView::empty());

    let actor = TimelineActor {
        session: TimelineSession::new(normalizer),
        contracts: Arc::new(contracts),
        tickets: Arc::new(tickets),
        in_flight: HashMap::new(),
        results: results_tx,
        view: view_tx,
    };
    tokio::spawn(actor.run(commands, results));

    TimelineHandle { tx, view }
}
