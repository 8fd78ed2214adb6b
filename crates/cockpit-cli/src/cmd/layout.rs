//! `cockpit layout`: stack both feeds into rows and print them.

use crate::cmd::timeline::{FeedArgs, resolve_feed, with_timeline};
use crate::output::{OutputMode, pretty_kv, pretty_rule, pretty_section, render_mode};
use anyhow::Result;
use clap::Args;
use cockpit_core::config::ProjectConfig;
use cockpit_core::model::{Event, Source, format_timestamp};
use cockpit_core::normalize::DroppedRecord;
use cockpit_core::session::{FeedFailure, Snapshot};
use serde::Serialize;
use std::io::{self, Write};
use std::path::Path;

#[derive(Args, Debug)]
pub struct LayoutArgs {
    #[command(flatten)]
    pub feeds: FeedArgs,
}

/// One row of the JSON output.
#[derive(Debug, Serialize)]
pub struct LayoutRow<'a> {
    pub index: usize,
    pub label: String,
    pub events: Vec<&'a Event>,
}

/// Full `layout` output.
#[derive(Debug, Serialize)]
pub struct LayoutOutput<'a> {
    pub revision: u64,
    pub event_count: usize,
    pub rows: Vec<LayoutRow<'a>>,
    pub feed_failures: &'a [FeedFailure],
    pub dropped: &'a [DroppedRecord],
}

impl<'a> LayoutOutput<'a> {
    pub fn from_snapshot(snapshot: &'a Snapshot) -> Self {
        let rows = snapshot
            .layout
            .rows
            .iter()
            .map(|row| LayoutRow {
                index: row.index(),
                label: row.label(),
                events: snapshot.layout.row_events(row).collect(),
            })
            .collect();
        Self {
            revision: snapshot.revision,
            event_count: snapshot.layout.events.len(),
            rows,
            feed_failures: &snapshot.feed_failures,
            dropped: &snapshot.dropped,
        }
    }
}

fn span(event: &Event) -> String {
    let start = format_timestamp(&event.start);
    match event.end {
        Some(end) => format!("{start} .. {}", format_timestamp(&end)),
        None => start,
    }
}

fn render_text(out: &LayoutOutput<'_>, w: &mut dyn Write) -> io::Result<()> {
    for row in &out.rows {
        for event in &row.events {
            let end = event.end.as_ref().map(format_timestamp).unwrap_or_default();
            writeln!(
                w,
                "{}\t{}\t{}\t{}\t{}\t{}",
                row.index + 1,
                event.id,
                event.kind.as_str(),
                format_timestamp(&event.start),
                end,
                event.title
            )?;
        }
    }
    for failure in out.feed_failures {
        writeln!(w, "failure\t{}\t{}\t{}", failure.source, failure.code, failure.message)?;
    }
    for dropped in out.dropped {
        writeln!(
            w,
            "dropped\t{}\t{}\t{}",
            dropped.source,
            dropped.position,
            dropped.reason
        )?;
    }
    Ok(())
}

fn render_pretty(out: &LayoutOutput<'_>, w: &mut dyn Write) -> io::Result<()> {
    if out.rows.is_empty() {
        writeln!(w, "No events on the timeline.")?;
    }

    for row in &out.rows {
        pretty_section(w, &format!("{} ({} events)", row.label, row.events.len()))?;
        for event in &row.events {
            writeln!(
                w,
                "  {:<44} [{}] {} ({})",
                span(event),
                event.kind.label(),
                event.title,
                event.id
            )?;
        }
        writeln!(w)?;
    }

    if !out.feed_failures.is_empty() || !out.dropped.is_empty() {
        pretty_section(w, "Degraded input")?;
        for failure in out.feed_failures {
            let detail = format!("[{}] {}", failure.code, failure.message);
            pretty_kv(w, failure.source.as_str(), detail)?;
        }
        for dropped in out.dropped {
            let id = dropped.id.as_deref().unwrap_or("<no id>");
            pretty_kv(
                w,
                dropped.source.as_str(),
                format!("record #{} ({id}) dropped: {}", dropped.position, dropped.reason),
            )?;
        }
        pretty_rule(w)?;
    }
    Ok(())
}

/// Lay out both feeds and render the resulting rows.
///
/// # Errors
///
/// Returns an error if no feed path is available for a source or the async
/// runtime cannot start. Unreadable feeds degrade to empty instead.
pub fn run_layout(
    args: &LayoutArgs,
    config: &ProjectConfig,
    output: OutputMode,
    project_root: &Path,
) -> Result<()> {
    let contracts = resolve_feed(Source::Contracts, &args.feeds, config, project_root, output)?;
    let tickets = resolve_feed(Source::Tickets, &args.feeds, config, project_root, output)?;

    let snapshot = with_timeline(contracts, tickets, config, |_, snapshot| async move {
        Ok(snapshot)
    })?;

    let out = LayoutOutput::from_snapshot(&snapshot);
    render_mode(output, &out, render_text, render_pretty)
}
