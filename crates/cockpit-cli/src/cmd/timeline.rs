//! Feed flags shared by `layout` and `show`, and the session driver they use.

use crate::output::{CliError, OutputMode, render_error};
use anyhow::{Context, Result};
use chrono::{Local, NaiveDate};
use clap::{Args, ValueEnum};
use cockpit_core::config::ProjectConfig;
use cockpit_core::feed::{DeriveOptions, FeedFormat, FileFeed};
use cockpit_core::model::Source;
use cockpit_core::session::{Snapshot, TimelineHandle, spawn_timeline};
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

/// Feed file contents, as accepted on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum FormatArg {
    /// Already-shaped timeline items.
    Items,
    /// Raw contract or ticket records.
    Records,
}

impl From<FormatArg> for FeedFormat {
    fn from(arg: FormatArg) -> Self {
        match arg {
            FormatArg::Items => Self::Items,
            FormatArg::Records => Self::Records,
        }
    }
}

#[derive(Args, Debug, Clone, Default)]
pub struct FeedArgs {
    /// Contracts feed file (JSON array). Defaults to `[feeds].contracts`.
    #[arg(long, value_name = "FILE")]
    pub contracts: Option<PathBuf>,

    /// Tickets feed file (JSON array). Defaults to `[feeds].tickets`.
    #[arg(long, value_name = "FILE")]
    pub tickets: Option<PathBuf>,

    /// Contents of the contracts file.
    #[arg(long, value_enum, value_name = "FORMAT")]
    pub contracts_format: Option<FormatArg>,

    /// Contents of the tickets file.
    #[arg(long, value_enum, value_name = "FORMAT")]
    pub tickets_format: Option<FormatArg>,

    /// Reference day for record derivation (YYYY-MM-DD). Defaults to today.
    #[arg(long, value_name = "DATE")]
    pub today: Option<NaiveDate>,
}

/// Reference day: the flag if given, otherwise the local date.
pub fn resolve_today(today: Option<NaiveDate>) -> NaiveDate {
    today.unwrap_or_else(|| Local::now().date_naive())
}

/// Build a file feed for `source` from flags, falling back to project config.
///
/// Relative config paths resolve against the project root; flag paths are
/// used as given.
pub fn resolve_feed(
    source: Source,
    args: &FeedArgs,
    config: &ProjectConfig,
    project_root: &Path,
    output: OutputMode,
) -> Result<FileFeed> {
    let (flag_path, flag_format, config_path, config_format) = match source {
        Source::Contracts => (
            args.contracts.as_ref(),
            args.contracts_format,
            config.feeds.contracts.as_ref(),
            config.feeds.contracts_format,
        ),
        Source::Tickets => (
            args.tickets.as_ref(),
            args.tickets_format,
            config.feeds.tickets.as_ref(),
            config.feeds.tickets_format,
        ),
    };

    let path = match (flag_path, config_path) {
        (Some(path), _) => path.clone(),
        (None, Some(path)) => project_root.join(path),
        (None, None) => {
            render_error(
                output,
                &CliError::with_details(
                    format!("no {source} feed given"),
                    format!(
                        "Pass --{source} <FILE> or set [feeds].{source} in .cockpit/config.toml"
                    ),
                    "missing_feed",
                ),
            )?;
            anyhow::bail!("no {source} feed given");
        }
    };

    let format = flag_format.map_or(config_format, FeedFormat::from);
    let mut derive = DeriveOptions::new(resolve_today(args.today));
    derive.tickets = config.ticket_options();

    debug!(%source, path = %path.display(), format = format.as_str(), "resolved feed");
    Ok(FileFeed::new(source, path, format, derive))
}

/// Spawn a session over both feeds, wait for its first snapshot, run `body`,
/// then shut the session down.
pub fn with_timeline<T, F, Fut>(
    contracts: FileFeed,
    tickets: FileFeed,
    config: &ProjectConfig,
    body: F,
) -> Result<T>
where
    F: FnOnce(TimelineHandle, Arc<Snapshot>) -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("Failed to start async runtime")?;

    let normalizer = config.normalizer();
    runtime.block_on(async move {
        let handle = spawn_timeline(contracts, tickets, normalizer);
        let snapshot = handle
            .ready()
            .await
            .context("timeline session closed before publishing")?;
        let result = body(handle.clone(), snapshot).await;
        handle.shutdown().await;
        result
    })
}
