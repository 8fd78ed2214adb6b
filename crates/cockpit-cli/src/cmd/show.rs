//! `cockpit show`: select one event and print its detail view.

use crate::cmd::timeline::{FeedArgs, resolve_feed, with_timeline};
use crate::output::{
    CliError, OutputMode, pretty_kv, pretty_rule, pretty_section, render_error, render_mode,
};
use anyhow::Result;
use clap::Args;
use cockpit_core::config::ProjectConfig;
use cockpit_core::model::{Event, Metadata, Source, display_value, format_timestamp};
use cockpit_core::session::{SessionError, TimelineView};
use serde::Serialize;
use std::io::{self, Write};
use std::path::Path;

#[derive(Args, Debug)]
pub struct ShowArgs {
    /// Event id to display, as listed by `cockpit layout`.
    pub id: String,

    #[command(flatten)]
    pub feeds: FeedArgs,
}

/// Detail view of the selected event.
#[derive(Debug, Serialize)]
pub struct ShowEvent {
    pub id: String,
    pub title: String,
    pub kind: String,
    pub kind_label: &'static str,
    pub row: usize,
    pub row_label: String,
    pub start: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end: Option<String>,
    pub color: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reference_url: Option<String>,
    pub metadata: Metadata,
}

impl ShowEvent {
    fn new(event: &Event, row: usize) -> Self {
        Self {
            id: event.id.to_string(),
            title: event.title.clone(),
            kind: event.kind.as_str().to_string(),
            kind_label: event.kind.label(),
            row,
            row_label: format!("Row {}", row + 1),
            start: format_timestamp(&event.start),
            end: event.end.as_ref().map(format_timestamp),
            color: event.color.clone(),
            reference_url: event.reference_url.clone(),
            metadata: event.metadata.clone(),
        }
    }

    /// Resolve the selection of `view` into a detail record.
    fn from_view(view: &TimelineView) -> Option<Self> {
        let id = view.selection.as_ref()?;
        let placed = view.snapshot.as_ref()?.layout.find(id)?;
        Some(Self::new(&placed.event, placed.row))
    }
}

fn render_text(item: &ShowEvent, w: &mut dyn Write) -> io::Result<()> {
    writeln!(w, "id\t{}", item.id)?;
    writeln!(w, "title\t{}", item.title)?;
    writeln!(w, "kind\t{}", item.kind)?;
    writeln!(w, "row\t{}", item.row + 1)?;
    writeln!(w, "start\t{}", item.start)?;
    if let Some(end) = &item.end {
        writeln!(w, "end\t{end}")?;
    }
    if let Some(url) = &item.reference_url {
        writeln!(w, "reference_url\t{url}")?;
    }
    for (key, value) in item.metadata.iter() {
        writeln!(w, "meta.{key}\t{}", display_value(value))?;
    }
    Ok(())
}

fn render_pretty(item: &ShowEvent, w: &mut dyn Write) -> io::Result<()> {
    pretty_section(w, &item.title)?;
    pretty_kv(w, "ID", &item.id)?;
    pretty_kv(w, "Kind", format!("{} ({})", item.kind_label, item.kind))?;
    pretty_kv(w, "Row", &item.row_label)?;
    pretty_kv(w, "Start", &item.start)?;
    pretty_kv(w, "End", item.end.as_deref().unwrap_or("(point)"))?;
    pretty_kv(w, "Color", &item.color)?;
    if let Some(url) = &item.reference_url {
        pretty_kv(w, "Document", url)?;
    }

    if !item.metadata.is_empty() {
        writeln!(w)?;
        pretty_section(w, "Details")?;
        for (key, value) in item.metadata.iter() {
            pretty_kv(w, key, display_value(value))?;
        }
    }
    pretty_rule(w)
}

/// Show one event of the current timeline.
///
/// # Errors
///
/// Returns an error if the id is not on the timeline (rendered as an invalid
/// selection) or if the feeds cannot be resolved.
pub fn run_show(
    args: &ShowArgs,
    config: &ProjectConfig,
    output: OutputMode,
    project_root: &Path,
) -> Result<()> {
    let contracts = resolve_feed(Source::Contracts, &args.feeds, config, project_root, output)?;
    let tickets = resolve_feed(Source::Tickets, &args.feeds, config, project_root, output)?;

    let id = args.id.clone();
    let selected = with_timeline(contracts, tickets, config, |handle, _| async move {
        match handle.select(id.as_str()).await {
            Ok(()) => Ok(Ok(handle.view())),
            Err(err @ SessionError::InvalidSelection { .. }) => Ok(Err(err)),
            Err(err) => Err(err.into()),
        }
    })?;

    let view = match selected {
        Ok(view) => view,
        Err(err) => {
            render_error(output, &CliError::from_code(err.code(), err.to_string()))?;
            anyhow::bail!("{err}");
        }
    };

    let Some(item) = ShowEvent::from_view(&view) else {
        anyhow::bail!("event '{}' vanished from the timeline", args.id);
    };
    render_mode(output, &item, render_text, render_pretty)
}
