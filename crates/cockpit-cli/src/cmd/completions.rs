//! `cockpit completions`: shell completion scripts.

use anyhow::{Context, Result};
use clap::Args;
use clap_complete::{Shell, generate};
use std::io::{self, Write};

#[derive(Args, Debug)]
pub struct CompletionsArgs {
    /// Shell to generate the script for.
    #[arg(value_enum)]
    pub shell: Shell,
}

/// Print the completion script for `shell`.
///
/// # Errors
///
/// Returns an error if stdout cannot be flushed.
pub fn run_completions(shell: Shell, command: &mut clap::Command) -> Result<()> {
    let mut out = io::stdout().lock();
    generate(shell, command, "cockpit", &mut out);
    out.flush().context("Failed to write completion script")
}
