//! Utility modules for plist-codec.

pub mod datetime;

pub use datetime::{format_datetime, parse_datetime, DateTimeParseError};
