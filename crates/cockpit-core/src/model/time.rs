//! Timestamp parsing for source records.
//!
//! Timeline timestamps are calendar values without a timezone. Feeds hand us
//! a mix of plain dates (`2025-03-01`), naive date-times and RFC 3339 strings
//! with an offset; offset-carrying values are normalized to UTC before the
//! offset is dropped so that two feeds reporting the same instant compare
//! equal.

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Deserializer, Serializer};

/// Canonical text form used when timestamps are written back out.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

const NAIVE_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];

/// Error returned when a timestamp string matches none of the accepted forms.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid timestamp '{raw}'")]
pub struct TimestampError {
    pub raw: String,
}

/// Parse a timestamp in any of the accepted forms.
///
/// # Errors
///
/// Returns [`TimestampError`] when `text` is not a date, a naive ISO
/// date-time or an RFC 3339 timestamp.
pub fn parse_timestamp(text: &str) -> Result<NaiveDateTime, TimestampError> {
    let trimmed = text.trim();

    if let Ok(date) = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d") {
        return Ok(date.and_time(NaiveTime::MIN));
    }

    for format in NAIVE_FORMATS {
        if let Ok(value) = NaiveDateTime::parse_from_str(trimmed, format) {
            return Ok(value);
        }
    }

    DateTime::parse_from_rfc3339(trimmed)
        .map(|value| value.naive_utc())
        .map_err(|_| TimestampError {
            raw: text.to_string(),
        })
}

/// Render a timestamp in [`TIMESTAMP_FORMAT`].
#[must_use]
pub fn format_timestamp(value: &NaiveDateTime) -> String {
    value.format(TIMESTAMP_FORMAT).to_string()
}

/// Serde adapter for required timestamps in upstream records.
pub mod flexible {
    use super::{Deserialize, Deserializer, NaiveDateTime, Serializer, format_timestamp};

    pub fn serialize<S: Serializer>(value: &NaiveDateTime, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&format_timestamp(value))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<NaiveDateTime, D::Error> {
        let raw = String::deserialize(d)?;
        super::parse_timestamp(&raw).map_err(serde::de::Error::custom)
    }
}

/// Serde adapter for optional timestamps; blank strings read as absent.
pub mod flexible_option {
    use super::{Deserialize, Deserializer, NaiveDateTime, Serializer, format_timestamp};

    #[allow(clippy::ref_option)]
    pub fn serialize<S: Serializer>(value: &Option<NaiveDateTime>, s: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(value) => s.serialize_some(&format_timestamp(value)),
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<NaiveDateTime>, D::Error> {
        match Option::<String>::deserialize(d)? {
            Some(raw) if !raw.trim().is_empty() => super::parse_timestamp(&raw)
                .map(Some)
                .map_err(serde::de::Error::custom),
            _ => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(y: i32, m: u32, d: u32, h: u32, min: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .and_then(|date| date.and_hms_opt(h, min, s))
            .expect("valid test timestamp")
    }

    #[test]
    fn plain_date_is_midnight() {
        assert_eq!(
            parse_timestamp("2025-03-01").expect("date parses"),
            at(2025, 3, 1, 0, 0, 0)
        );
    }

    #[test]
    fn naive_datetime_with_t_or_space() {
        assert_eq!(
            parse_timestamp("2025-03-01T08:30:00").expect("T form parses"),
            at(2025, 3, 1, 8, 30, 0)
        );
        assert_eq!(
            parse_timestamp("2025-03-01 08:30:00.250").expect("space form parses"),
            at(2025, 3, 1, 8, 30, 0) + chrono::Duration::milliseconds(250)
        );
    }

    #[test]
    fn offset_timestamps_normalize_to_utc() {
        assert_eq!(
            parse_timestamp("2025-03-01T10:00:00Z").expect("zulu parses"),
            at(2025, 3, 1, 10, 0, 0)
        );
        assert_eq!(
            parse_timestamp("2025-03-01T10:00:00+02:00").expect("offset parses"),
            at(2025, 3, 1, 8, 0, 0)
        );
    }

    #[test]
    fn surrounding_whitespace_is_ignored() {
        assert!(parse_timestamp("  2025-03-01 ").is_ok());
    }

    #[test]
    fn garbage_is_rejected_with_raw_text() {
        let err = parse_timestamp("next tuesday").expect_err("must fail");
        assert_eq!(err.raw, "next tuesday");
        assert!(parse_timestamp("").is_err());
        assert!(parse_timestamp("2025-13-01").is_err());
    }

    #[test]
    fn format_is_canonical() {
        assert_eq!(
            format_timestamp(&at(2025, 3, 1, 8, 5, 9)),
            "2025-03-01T08:05:09"
        );
    }
}
