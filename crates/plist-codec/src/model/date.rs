//! Plist date values.

use std::fmt;

use crate::limits::APPLE_EPOCH_OFFSET_SECS;
use crate::util::datetime::{format_datetime, parse_datetime, DateTimeParseError};

/// An instant, stored as seconds since 2001-01-01T00:00:00Z.
///
/// This is the binary wire representation; XML uses ISO 8601 text with
/// microsecond precision.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default)]
pub struct Date {
    seconds: f64,
}

impl Date {
    /// Creates a date from seconds since 2001-01-01T00:00:00Z.
    pub fn from_apple_seconds(seconds: f64) -> Self {
        Date { seconds }
    }

    /// Creates a date from seconds since the Unix epoch.
    pub fn from_unix_seconds(seconds: f64) -> Self {
        Date {
            seconds: seconds - APPLE_EPOCH_OFFSET_SECS as f64,
        }
    }

    /// Seconds since 2001-01-01T00:00:00Z.
    pub fn apple_seconds(&self) -> f64 {
        self.seconds
    }

    /// Seconds since the Unix epoch.
    pub fn unix_seconds(&self) -> f64 {
        self.seconds + APPLE_EPOCH_OFFSET_SECS as f64
    }

    /// Parses ISO 8601 text such as `2011-06-27T19:18:22Z`.
    pub fn parse_iso8601(text: &str) -> Result<Self, DateTimeParseError> {
        let unix_micros = parse_datetime(text)?;
        let apple_micros = unix_micros
            .checked_sub(APPLE_EPOCH_OFFSET_SECS * 1_000_000)
            .ok_or_else(|| DateTimeParseError {
                message: format!("Date out of range: {}", text),
            })?;
        Ok(Date {
            seconds: apple_micros as f64 / 1_000_000.0,
        })
    }

    /// Formats as ISO 8601 UTC text, truncated to microseconds.
    pub fn to_iso8601(&self) -> String {
        let apple_micros = (self.seconds * 1_000_000.0).round() as i64;
        format_datetime(apple_micros.saturating_add(APPLE_EPOCH_OFFSET_SECS * 1_000_000))
    }
}

impl fmt::Display for Date {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_iso8601())
    }
}
