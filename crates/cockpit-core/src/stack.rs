//! Stacking engine: first-fit interval partitioning of events into rows.
//!
//! # Algorithm
//!
//! 1. Stable-sort events by start. Equal starts keep their input order, so
//!    the same input always yields the same rows.
//! 2. Offer each event to the existing rows in creation order and place it
//!    in the first row none of whose members it overlaps.
//! 3. If no row admits it, open a new row.
//!
//! Overlap uses closed intervals: two points at the same instant, or a bar
//! ending exactly when another begins, collide. A missing end is a point at
//! the start; an end before the start is clamped to the start.
//!
//! Processing in start order makes first-fit optimal for interval graph
//! colouring, so the row count equals the maximum number of events that
//! share a common instant.

use chrono::NaiveDateTime;
use serde::Serialize;
use tracing::{debug, instrument};

use crate::model::event::{Event, EventId, Interval};

/// An event together with the row it was assigned to.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Placed {
    #[serde(flatten)]
    pub event: Event,
    pub row: usize,
}

/// A horizontal lane of mutually non-overlapping events.
///
/// Members are positions into [`Layout::events`], in placement order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Row {
    index: usize,
    members: Vec<usize>,
    #[serde(skip)]
    reach: NaiveDateTime,
}

impl Row {
    fn open(index: usize, position: usize, interval: Interval) -> Self {
        Self {
            index,
            members: vec![position],
            reach: interval.end,
        }
    }

    /// Members arrive in start order and never overlap each other, so the
    /// furthest end seen so far is the only one a newcomer can collide with.
    fn admits(&self, interval: &Interval) -> bool {
        interval.start > self.reach
    }

    fn push(&mut self, position: usize, interval: Interval) {
        self.members.push(position);
        self.reach = self.reach.max(interval.end);
    }

    /// Zero-based row number, in creation order.
    #[must_use]
    pub const fn index(&self) -> usize {
        self.index
    }

    /// Display label, numbered from one.
    #[must_use]
    pub fn label(&self) -> String {
        format!("Row {}", self.index + 1)
    }

    #[must_use]
    pub fn members(&self) -> &[usize] {
        &self.members
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.members.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}

/// Output of one layout pass: sorted events with rows, and the rows.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Layout {
    pub events: Vec<Placed>,
    pub rows: Vec<Row>,
}

impl Layout {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    #[must_use]
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Events of one row, in placement order.
    pub fn row_events(&self, row: &Row) -> impl Iterator<Item = &Event> {
        row.members
            .iter()
            .filter_map(|&position| self.events.get(position))
            .map(|placed| &placed.event)
    }

    /// First placed event carrying `id`.
    #[must_use]
    pub fn find(&self, id: &EventId) -> Option<&Placed> {
        self.events.iter().find(|placed| placed.event.id == *id)
    }

    #[must_use]
    pub fn contains(&self, id: &EventId) -> bool {
        self.find(id).is_some()
    }
}

/// Lay out `events` into the minimum number of non-overlapping rows.
///
/// Never fails; an empty input yields no events and no rows.
#[must_use]
#[instrument(skip_all, fields(events = events.len()))]
pub fn layout(mut events: Vec<Event>) -> Layout {
    events.sort_by_key(|event| event.start);

    let mut rows: Vec<Row> = Vec::new();
    let mut placed = Vec::with_capacity(events.len());

    for (position, event) in events.into_iter().enumerate() {
        let interval = event.interval();
        let row = match rows.iter_mut().find(|row| row.admits(&interval)) {
            Some(row) => {
                row.push(position, interval);
                row.index
            }
            None => {
                let index = rows.len();
                rows.push(Row::open(index, position, interval));
                index
            }
        };
        placed.push(Placed { event, row });
    }

    debug!(rows = rows.len(), "layout pass complete");
    Layout {
        events: placed,
        rows,
    }
}
