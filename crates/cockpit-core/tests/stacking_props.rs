use cockpit_core::model::{Event, Interval};
use cockpit_core::stack::layout;
use proptest::prelude::*;

use generators::*;

/// First-fit that checks a candidate against every member of a row.
fn reference_rows(events: &[Event]) -> Vec<usize> {
    let mut sorted: Vec<&Event> = events.iter().collect();
    sorted.sort_by_key(|event| event.start);

    let mut rows: Vec<Vec<Interval>> = Vec::new();
    let mut assigned = Vec::with_capacity(sorted.len());
    for event in sorted {
        let interval = event.interval();
        let slot = rows
            .iter()
            .position(|members| members.iter().all(|m| !m.overlaps(&interval)));
        match slot {
            Some(index) => {
                rows[index].push(interval);
                assigned.push(index);
            }
            None => {
                rows.push(vec![interval]);
                assigned.push(rows.len() - 1);
            }
        }
    }
    assigned
}

/// Largest number of events sharing one instant.
fn max_clique(events: &[Event]) -> usize {
    let intervals: Vec<Interval> = events.iter().map(Event::interval).collect();
    intervals
        .iter()
        .map(|at| {
            intervals
                .iter()
                .filter(|i| i.start <= at.start && at.start <= i.end)
                .count()
        })
        .max()
        .unwrap_or(0)
}

proptest! {
    #![proptest_config(proptest::test_runner::Config::with_cases(512))]

    #[test]
    fn every_event_is_placed_exactly_once(events in arb_events()) {
        let out = layout(events.clone());
        prop_assert_eq!(out.events.len(), events.len());

        let mut seen: Vec<usize> = out.rows.iter().flat_map(|row| row.members().to_vec()).collect();
        seen.sort_unstable();
        prop_assert_eq!(seen, (0..events.len()).collect::<Vec<_>>());

        for row in &out.rows {
            for &position in row.members() {
                prop_assert_eq!(out.events[position].row, row.index());
            }
        }
    }

    #[test]
    fn rows_never_hold_overlapping_events(events in arb_events()) {
        let out = layout(events);
        for row in &out.rows {
            let members: Vec<_> = out.row_events(row).map(Event::interval).collect();
            for (i, a) in members.iter().enumerate() {
                for b in &members[i + 1..] {
                    prop_assert!(!a.overlaps(b), "{:?} overlaps {:?}", a, b);
                }
            }
        }
    }

    #[test]
    fn output_is_stably_sorted_by_start(events in arb_events()) {
        let out = layout(events.clone());
        let mut expected = events;
        expected.sort_by_key(|event| event.start);
        let got: Vec<_> = out.events.iter().map(|p| p.event.id.clone()).collect();
        let want: Vec<_> = expected.iter().map(|e| e.id.clone()).collect();
        prop_assert_eq!(got, want);
    }

    #[test]
    fn row_count_matches_peak_concurrency(events in arb_events()) {
        let out = layout(events.clone());
        prop_assert_eq!(out.row_count(), max_clique(&events));
    }

    #[test]
    fn matches_exhaustive_first_fit(events in arb_events()) {
        let out = layout(events.clone());
        let rows: Vec<_> = out.events.iter().map(|p| p.row).collect();
        prop_assert_eq!(rows, reference_rows(&events));
    }

    #[test]
    fn layout_is_deterministic(events in arb_events()) {
        prop_assert_eq!(layout(events.clone()), layout(events));
    }
}
