//! `cockpit derive`: turn raw contract or ticket records into timeline items.

use crate::cmd::timeline::resolve_today;
use crate::output::{CliError, OutputMode, pretty_section, render_error, render_mode};
use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{Args, ValueEnum};
use cockpit_core::config::ProjectConfig;
use cockpit_core::feed::{DeriveOptions, FeedFormat, FileFeed};
use cockpit_core::model::{Source, SourceItem};
use std::io::{self, Write};
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SourceArg {
    Contracts,
    Tickets,
}

impl From<SourceArg> for Source {
    fn from(arg: SourceArg) -> Self {
        match arg {
            SourceArg::Contracts => Self::Contracts,
            SourceArg::Tickets => Self::Tickets,
        }
    }
}

#[derive(Args, Debug)]
pub struct DeriveArgs {
    /// Kind of records in the file.
    #[arg(value_enum)]
    pub source: SourceArg,

    /// JSON array of raw records.
    pub file: PathBuf,

    /// Reference day (YYYY-MM-DD). Defaults to today.
    #[arg(long, value_name = "DATE")]
    pub today: Option<NaiveDate>,
}

fn field(value: Option<&String>) -> &str {
    value.map_or("", String::as_str)
}

#[allow(clippy::ptr_arg)] // render_mode hands renderers &T
fn render_text(items: &Vec<SourceItem>, w: &mut dyn Write) -> io::Result<()> {
    for item in items {
        writeln!(
            w,
            "{}\t{}\t{}\t{}\t{}",
            field(item.id.as_ref()),
            field(item.kind.as_ref()),
            field(item.start.as_ref()),
            field(item.end.as_ref()),
            item.title
        )?;
    }
    Ok(())
}

#[allow(clippy::ptr_arg)]
fn render_pretty(items: &Vec<SourceItem>, w: &mut dyn Write) -> io::Result<()> {
    pretty_section(w, &format!("{} timeline items", items.len()))?;
    for item in items {
        let span = match (&item.start, &item.end) {
            (Some(start), Some(end)) => format!("{start} .. {end}"),
            (Some(start), None) => start.clone(),
            (None, _) => String::new(),
        };
        writeln!(
            w,
            "  {:<24} {:<22} {} {}",
            field(item.id.as_ref()),
            span,
            field(item.color.as_ref()),
            item.title
        )?;
    }
    Ok(())
}

/// Derive timeline items from a raw record file.
///
/// # Errors
///
/// Returns an error if the file cannot be read or does not hold records of
/// the requested kind.
pub fn run_derive(args: &DeriveArgs, config: &ProjectConfig, output: OutputMode) -> Result<()> {
    let source = Source::from(args.source);
    let text = std::fs::read_to_string(&args.file)
        .with_context(|| format!("Failed to read {}", args.file.display()))?;

    let mut derive = DeriveOptions::new(resolve_today(args.today));
    derive.tickets = config.ticket_options();
    let feed = FileFeed::new(source, &args.file, FeedFormat::Records, derive);

    let items = match feed.parse(&text) {
        Ok(items) => items,
        Err(err) => {
            render_error(output, &CliError::from_code(err.code(), err.to_string()))?;
            anyhow::bail!("{err}");
        }
    };

    render_mode(output, &items, render_text, render_pretty)
}
