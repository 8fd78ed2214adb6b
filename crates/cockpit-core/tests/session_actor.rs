//! End-to-end tests for the async timeline session.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use cockpit_core::feed::{FeedError, SourceFeed, StaticFeed};
use cockpit_core::model::{EventId, Source, SourceItem};
use cockpit_core::normalize::Normalizer;
use cockpit_core::session::{SessionError, SessionState, spawn_timeline};
use tokio::sync::{mpsc, oneshot};
use tokio::time::timeout;

type Batch = Result<Vec<SourceItem>, FeedError>;

// ---------------------------------------------------------------------------
// Test feeds
// ---------------------------------------------------------------------------

/// A feed whose fetches block until the test releases them.
///
/// Every fetch that actually starts hands the test a sender over `requests`,
/// in the order the fetches start.
struct GatedFeed {
    requests: mpsc::UnboundedSender<oneshot::Sender<Batch>>,
}

impl GatedFeed {
    fn new() -> (Self, mpsc::UnboundedReceiver<oneshot::Sender<Batch>>) {
        let (requests, rx) = mpsc::unbounded_channel();
        (Self { requests }, rx)
    }
}

impl SourceFeed for GatedFeed {
    async fn fetch(&self) -> Batch {
        let (tx, rx) = oneshot::channel();
        if self.requests.send(tx).is_err() {
            return Ok(Vec::new());
        }
        rx.await.unwrap_or_else(|_| {
            Err(FeedError::Unavailable {
                reason: "gate dropped".to_string(),
            })
        })
    }
}

/// A feed serving whatever batch the test last stored.
#[derive(Clone)]
struct SwitchFeed {
    items: Arc<Mutex<Vec<SourceItem>>>,
}

impl SwitchFeed {
    fn new(items: Vec<SourceItem>) -> Self {
        Self {
            items: Arc::new(Mutex::new(items)),
        }
    }

    fn set(&self, items: Vec<SourceItem>) {
        *self.items.lock().unwrap() = items;
    }
}

impl SourceFeed for SwitchFeed {
    async fn fetch(&self) -> Batch {
        let items = self.items.lock().unwrap().clone();
        Ok(items)
    }
}

/// A feed whose first fetch panics; later fetches serve `items`.
struct PanicOnceFeed {
    panicked: AtomicBool,
    items: Vec<SourceItem>,
}

impl PanicOnceFeed {
    const fn new(items: Vec<SourceItem>) -> Self {
        Self {
            panicked: AtomicBool::new(false),
            items,
        }
    }
}

impl SourceFeed for PanicOnceFeed {
    async fn fetch(&self) -> Batch {
        if !self.panicked.swap(true, Ordering::SeqCst) {
            panic!("upstream decoder blew up");
        }
        Ok(self.items.clone())
    }
}

fn item(id: &str, start: &str) -> SourceItem {
    SourceItem::new(id, id.to_uppercase(), start)
}

const WAIT: Duration = Duration::from_secs(5);

// ---------------------------------------------------------------------------
// Join and publication
// ---------------------------------------------------------------------------

#[tokio::test]
async fn publishes_once_both_sources_delivered() {
    let (contracts, mut requests) = GatedFeed::new();
    let tickets = StaticFeed::new(vec![item("t1", "2025-01-02")]);
    let handle = spawn_timeline(contracts, tickets, Normalizer::default());

    let gate = timeout(WAIT, requests.recv()).await.unwrap().unwrap();
    // tickets may already be in, but contracts are still outstanding
    tokio::task::yield_now().await;
    assert_eq!(handle.view().state, SessionState::Loading);
    assert!(handle.view().snapshot.is_none());

    gate.send(Ok(vec![item("c1", "2025-01-01")])).unwrap();
    let snapshot = timeout(WAIT, handle.ready()).await.unwrap().unwrap();

    assert_eq!(snapshot.revision, 1);
    let ids: Vec<_> = snapshot.layout.events.iter().map(|p| p.event.id.as_str()).collect();
    assert_eq!(ids, ["c1", "t1"]);
    assert_eq!(handle.view().state, SessionState::Ready);

    handle.shutdown().await;
}

#[tokio::test]
async fn failing_feed_degrades_to_empty() {
    let (contracts, mut requests) = GatedFeed::new();
    let tickets = StaticFeed::new(vec![item("t1", "2025-01-02")]);
    let handle = spawn_timeline(contracts, tickets, Normalizer::default());

    let gate = timeout(WAIT, requests.recv()).await.unwrap().unwrap();
    gate.send(Err(FeedError::Unavailable {
        reason: "offline".to_string(),
    }))
    .unwrap();

    let snapshot = timeout(WAIT, handle.ready()).await.unwrap().unwrap();
    assert_eq!(snapshot.layout.events.len(), 1);
    assert_eq!(snapshot.feed_failures.len(), 1);
    assert_eq!(snapshot.feed_failures[0].source, Source::Contracts);
    assert!(snapshot.is_degraded());

    handle.shutdown().await;
}

#[tokio::test]
async fn panicking_fetch_is_reported_as_unavailable() {
    let contracts = PanicOnceFeed::new(vec![item("c1", "2025-01-01")]);
    let tickets = StaticFeed::new(vec![item("t1", "2025-01-02")]);
    let handle = spawn_timeline(contracts, tickets, Normalizer::default());

    let snapshot = timeout(WAIT, handle.ready()).await.unwrap().unwrap();
    assert_eq!(handle.view().state, SessionState::Ready);
    assert_eq!(snapshot.layout.events.len(), 1);
    assert_eq!(snapshot.feed_failures.len(), 1);
    assert_eq!(snapshot.feed_failures[0].source, Source::Contracts);
    assert_eq!(snapshot.feed_failures[0].code, "E5003");

    // the session survives and recovers on the next fetch
    handle.refresh_source(Source::Contracts).unwrap();
    let snapshot = timeout(WAIT, handle.wait_ready(2)).await.unwrap().unwrap();
    let ids: Vec<_> = snapshot.layout.events.iter().map(|p| p.event.id.as_str()).collect();
    assert_eq!(ids, ["c1", "t1"]);
    assert!(snapshot.feed_failures.is_empty());

    handle.shutdown().await;
}

// ---------------------------------------------------------------------------
// Last-write-wins
// ---------------------------------------------------------------------------

#[tokio::test]
async fn superseded_fetch_is_never_published() {
    let contracts = StaticFeed::new(Vec::new());
    let (tickets, mut requests) = GatedFeed::new();
    let handle = spawn_timeline(contracts, tickets, Normalizer::default());

    let first = timeout(WAIT, requests.recv()).await.unwrap().unwrap();
    handle.refresh_source(Source::Tickets).unwrap();
    let second = timeout(WAIT, requests.recv()).await.unwrap().unwrap();

    // The first fetch was aborted, so its receiver may already be gone.
    let _ = first.send(Ok(vec![item("stale", "2025-01-01")]));
    second.send(Ok(vec![item("fresh", "2025-01-01")])).unwrap();

    let snapshot = timeout(WAIT, handle.ready()).await.unwrap().unwrap();
    let ids: Vec<_> = snapshot.layout.events.iter().map(|p| p.event.id.as_str()).collect();
    assert_eq!(ids, ["fresh"]);

    handle.shutdown().await;
}

// ---------------------------------------------------------------------------
// Selection
// ---------------------------------------------------------------------------

#[tokio::test]
async fn select_validates_against_published_snapshot() {
    let handle = spawn_timeline(
        StaticFeed::new(vec![item("c1", "2025-01-01")]),
        StaticFeed::new(Vec::new()),
        Normalizer::default(),
    );
    timeout(WAIT, handle.ready()).await.unwrap().unwrap();

    handle.select("c1").await.unwrap();
    let view = handle.view();
    assert_eq!(view.selection, Some(EventId::new("c1")));
    assert_eq!(view.selected_event().map(|e| e.title.as_str()), Some("C1"));

    let err = handle.select("nope").await.unwrap_err();
    assert_eq!(
        err,
        SessionError::InvalidSelection {
            id: EventId::new("nope")
        }
    );
    // a rejected selection leaves the previous one in place
    assert_eq!(handle.view().selection, Some(EventId::new("c1")));

    handle.clear_selection().unwrap();
    let mut rx = handle.subscribe();
    timeout(WAIT, rx.wait_for(|view| view.selection.is_none()))
        .await
        .unwrap()
        .unwrap();

    handle.shutdown().await;
}

#[tokio::test]
async fn refresh_resets_selection_of_vanished_event() {
    let contracts = SwitchFeed::new(vec![item("c1", "2025-01-01"), item("c2", "2025-02-01")]);
    let handle = spawn_timeline(
        contracts.clone(),
        StaticFeed::new(Vec::new()),
        Normalizer::default(),
    );
    timeout(WAIT, handle.ready()).await.unwrap().unwrap();
    handle.select("c2").await.unwrap();

    contracts.set(vec![item("c1", "2025-01-01")]);
    handle.refresh().unwrap();
    let snapshot = timeout(WAIT, handle.wait_ready(2)).await.unwrap().unwrap();

    assert_eq!(snapshot.layout.events.len(), 1);
    assert_eq!(handle.view().selection, None);

    handle.shutdown().await;
}

// ---------------------------------------------------------------------------
// Teardown
// ---------------------------------------------------------------------------

#[tokio::test]
async fn shutdown_discards_pending_fetch() {
    let contracts = StaticFeed::new(vec![item("c1", "2025-01-01")]);
    let (tickets, mut requests) = GatedFeed::new();
    let handle = spawn_timeline(contracts, tickets, Normalizer::default());

    let gate = timeout(WAIT, requests.recv()).await.unwrap().unwrap();
    handle.shutdown().await;

    // The fetch task was aborted; nothing is listening any more.
    let _ = gate.send(Ok(vec![item("late", "2025-01-01")]));
    tokio::task::yield_now().await;

    let view = handle.view();
    assert_eq!(view.state, SessionState::Closed);
    assert!(view.snapshot.is_none());
    assert_eq!(handle.select("c1").await, Err(SessionError::Closed));
    assert_eq!(handle.refresh(), Err(SessionError::Closed));
    assert_eq!(handle.ready().await.unwrap_err(), SessionError::Closed);
}

#[tokio::test]
async fn dropping_every_handle_closes_the_session() {
    let handle = spawn_timeline(
        StaticFeed::new(Vec::new()),
        StaticFeed::new(Vec::new()),
        Normalizer::default(),
    );
    let mut rx = handle.subscribe();
    drop(handle);

    let view = timeout(WAIT, rx.wait_for(|view| view.state == SessionState::Closed))
        .await
        .unwrap()
        .unwrap()
        .clone();
    assert!(view.snapshot.is_none());
}
