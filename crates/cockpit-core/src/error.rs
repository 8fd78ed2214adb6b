//! Error codes shared by every recoverable failure in cockpit.
//!
//! Codes are grouped by hundreds: `E1xxx` config, `E2xxx` source records,
//! `E3xxx` session, `E5xxx` feeds.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    ConfigParseError,
    MalformedRecord,
    InvalidTimestamp,
    InvalidSelection,
    SessionClosed,
    FeedReadFailed,
    FeedParseFailed,
    FeedUnavailable,
}

impl ErrorCode {
    /// The `E####` identifier printed by the CLI and kept stable.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::ConfigParseError => "E1002",
            Self::MalformedRecord => "E2001",
            Self::InvalidTimestamp => "E2002",
            Self::InvalidSelection => "E3001",
            Self::SessionClosed => "E3002",
            Self::FeedReadFailed => "E5001",
            Self::FeedParseFailed => "E5002",
            Self::FeedUnavailable => "E5003",
        }
    }

    /// One-line summary.
    #[must_use]
    pub const fn message(self) -> &'static str {
        match self {
            Self::ConfigParseError => "Config file parse error",
            Self::MalformedRecord => "Malformed source record",
            Self::InvalidTimestamp => "Invalid timestamp",
            Self::InvalidSelection => "Event not in current timeline",
            Self::SessionClosed => "Timeline session closed",
            Self::FeedReadFailed => "Source feed read failed",
            Self::FeedParseFailed => "Source feed parse failed",
            Self::FeedUnavailable => "Source feed unavailable",
        }
    }

    /// What the user can do about it, when there is something.
    #[must_use]
    pub const fn hint(self) -> Option<&'static str> {
        match self {
            Self::ConfigParseError => Some("Fix syntax in .cockpit/config.toml and retry."),
            Self::MalformedRecord => {
                Some("Every record needs an `id` and a `start`; the rest of the batch is kept.")
            }
            Self::InvalidTimestamp => {
                Some("Use YYYY-MM-DD, YYYY-MM-DDTHH:MM:SS or an RFC 3339 timestamp.")
            }
            Self::InvalidSelection => Some("Run `cockpit layout` to list the current event ids."),
            Self::SessionClosed => None,
            Self::FeedReadFailed => Some("Check that the feed file exists and is readable."),
            Self::FeedParseFailed => {
                Some("Check the feed format (`items` or `records`) matches the file contents.")
            }
            Self::FeedUnavailable => Some("Retry once the upstream source is reachable."),
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}
