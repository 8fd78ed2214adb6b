//! Output layer: every command prints pretty, text or JSON through here.
//!
//! Pretty output is framed with headings and rules for a terminal. Text
//! output is one tab-separated record per line. JSON is pretty-printed and
//! stable across releases.
//!
//! # Choosing a mode
//!
//! The first source that names a known mode wins:
//! 1. `--format`, or the hidden `--json` shorthand
//! 2. the `FORMAT` environment variable
//! 3. `output` in the user config
//! 4. pretty when stdout is a terminal, text otherwise
//!
//! Unknown names in `FORMAT` or the user config are skipped, not rejected.

use clap::ValueEnum;
use cockpit_core::ErrorCode;
use cockpit_core::config::normalize_output_mode;
use serde::Serialize;
use std::io::{self, IsTerminal, Write};

/// Width of the rule drawn under pretty headings.
pub const PRETTY_RULE_WIDTH: usize = 72;

pub fn pretty_rule(w: &mut dyn Write) -> io::Result<()> {
    writeln!(w, "{}", "-".repeat(PRETTY_RULE_WIDTH))
}

/// Heading line plus rule.
pub fn pretty_section(w: &mut dyn Write, heading: &str) -> io::Result<()> {
    writeln!(w, "{heading}")?;
    pretty_rule(w)
}

/// `Key:` padded to a fixed column, then the value.
pub fn pretty_kv(w: &mut dyn Write, key: &str, value: impl AsRef<str>) -> io::Result<()> {
    let label = format!("{key}:");
    writeln!(w, "{label:<12} {}", value.as_ref())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputMode {
    /// Headed sections for reading in a terminal.
    Pretty,
    /// Tab-separated records for scripts.
    Text,
    /// JSON documents.
    Json,
}

impl OutputMode {
    fn parse_name(name: &str) -> Option<Self> {
        normalize_output_mode(name).map(|canonical| match canonical {
            "json" => Self::Json,
            "text" => Self::Text,
            _ => Self::Pretty,
        })
    }
}

fn pick_output_mode(
    format_flag: Option<OutputMode>,
    json_flag: bool,
    format_env: Option<&str>,
    user_output: Option<&str>,
    is_tty: bool,
) -> OutputMode {
    let terminal_default = if is_tty {
        OutputMode::Pretty
    } else {
        OutputMode::Text
    };

    format_flag
        .or_else(|| json_flag.then_some(OutputMode::Json))
        .or_else(|| format_env.and_then(OutputMode::parse_name))
        .or_else(|| user_output.and_then(OutputMode::parse_name))
        .unwrap_or(terminal_default)
}

/// Pick the output mode for this invocation.
pub fn resolve_output_mode(
    format_flag: Option<OutputMode>,
    json_flag: bool,
    user_output: Option<&str>,
) -> OutputMode {
    let format_env = std::env::var("FORMAT").ok();
    pick_output_mode(
        format_flag,
        json_flag,
        format_env.as_deref(),
        user_output,
        io::stdout().is_terminal(),
    )
}

/// Print `value` to stdout: serialized in JSON mode, otherwise through the
/// renderer for the mode.
pub fn render_mode<T: Serialize>(
    mode: OutputMode,
    value: &T,
    text: impl FnOnce(&T, &mut dyn Write) -> io::Result<()>,
    pretty: impl FnOnce(&T, &mut dyn Write) -> io::Result<()>,
) -> anyhow::Result<()> {
    let mut out = io::stdout().lock();
    match mode {
        OutputMode::Pretty => pretty(value, &mut out)?,
        OutputMode::Text => text(value, &mut out)?,
        OutputMode::Json => {
            serde_json::to_writer_pretty(&mut out, value)?;
            writeln!(out)?;
        }
    }
    Ok(())
}

/// An error as shown to the user, in every output mode.
#[derive(Debug, Serialize)]
pub struct CliError {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
    /// `E####` for library errors, a short slug for usage errors.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,
}

impl CliError {
    /// A usage error with a fix-it suggestion.
    pub fn with_details(
        message: impl Into<String>,
        suggestion: impl Into<String>,
        slug: impl Into<String>,
    ) -> Self {
        Self {
            message: message.into(),
            suggestion: Some(suggestion.into()),
            error_code: Some(slug.into()),
        }
    }

    /// A library error, suggesting the hint registered for its code.
    pub fn from_code(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            suggestion: code.hint().map(str::to_string),
            error_code: Some(code.code().to_string()),
        }
    }

    fn write_text(&self, w: &mut dyn Write) -> io::Result<()> {
        match self.error_code.as_deref() {
            Some(code) => writeln!(w, "error[{code}]: {}", self.message)?,
            None => writeln!(w, "error: {}", self.message)?,
        }
        if let Some(suggestion) = self.suggestion.as_deref() {
            writeln!(w, "  suggestion: {suggestion}")?;
        }
        Ok(())
    }
}

/// Print `error` to stderr; JSON mode wraps it as `{"error": {...}}`.
pub fn render_error(mode: OutputMode, error: &CliError) -> anyhow::Result<()> {
    let mut err = io::stderr().lock();
    if mode == OutputMode::Json {
        serde_json::to_writer_pretty(&mut err, &serde_json::json!({ "error": error }))?;
        writeln!(err)?;
    } else {
        error.write_text(&mut err)?;
    }
    Ok(())
}
