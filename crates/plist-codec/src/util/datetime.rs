//! ISO 8601 date parsing and formatting for plist `<date>` elements.
//!
//! Plist dates are instants; they are written in UTC with a `Z` suffix
//! (`2011-06-27T19:18:22Z`). Parsing also accepts fractional seconds and
//! numeric offsets, which are folded into the UTC instant.

const MICROSECONDS_PER_SECOND: i64 = 1_000_000;
const MICROSECONDS_PER_MINUTE: i64 = 60 * MICROSECONDS_PER_SECOND;
const MICROSECONDS_PER_HOUR: i64 = 60 * MICROSECONDS_PER_MINUTE;
const MICROSECONDS_PER_DAY: i64 = 24 * MICROSECONDS_PER_HOUR;

/// Error type for ISO 8601 parsing failures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DateTimeParseError {
    pub message: String,
}

impl std::fmt::Display for DateTimeParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for DateTimeParseError {}

fn invalid(what: &str, input: &str) -> DateTimeParseError {
    DateTimeParseError {
        message: format!("Invalid {} in date: {}", what, input),
    }
}

/// Parses a timezone offset string (Z, +HH:MM, -HH:MM) and returns offset in minutes.
fn parse_timezone_offset(offset: &str) -> Result<i16, DateTimeParseError> {
    if offset == "Z" || offset == "z" {
        return Ok(0);
    }

    if offset.len() != 6 || !offset.is_ascii() {
        return Err(invalid("timezone offset", offset));
    }

    let sign = match offset.as_bytes()[0] {
        b'+' => 1i16,
        b'-' => -1i16,
        _ => return Err(invalid("timezone offset", offset)),
    };

    if offset.as_bytes()[3] != b':' {
        return Err(invalid("timezone offset", offset));
    }

    let hours: i16 = offset[1..3]
        .parse()
        .map_err(|_| invalid("timezone offset", offset))?;
    let minutes: i16 = offset[4..6]
        .parse()
        .map_err(|_| invalid("timezone offset", offset))?;

    if hours > 24 || (hours == 24 && minutes != 0) || minutes > 59 {
        return Err(invalid("timezone offset", offset));
    }

    Ok(sign * (hours * 60 + minutes))
}

/// Parses fractional seconds string and returns microseconds.
fn parse_fractional_seconds(frac: &str) -> Result<i64, DateTimeParseError> {
    if frac.is_empty() || !frac.bytes().all(|b| b.is_ascii_digit()) {
        return Err(invalid("fractional seconds", frac));
    }
    // Pad or truncate to 6 digits (microseconds)
    let mut padded: String = frac.chars().take(6).collect();
    while padded.len() < 6 {
        padded.push('0');
    }
    padded
        .parse()
        .map_err(|_| invalid("fractional seconds", frac))
}

/// Formats microseconds as fractional seconds string, omitting if zero.
fn format_fractional_seconds(us: i64) -> String {
    if us == 0 {
        return String::new();
    }

    // Convert to 6-digit string and trim trailing zeros
    let str = format!("{:06}", us);
    let trimmed = str.trim_end_matches('0');
    format!(".{}", trimmed)
}

/// Returns true if the given year is a leap year.
fn is_leap_year(year: i32) -> bool {
    (year % 4 == 0 && year % 100 != 0) || (year % 400 == 0)
}

/// Returns the number of days in a given month (1-indexed).
fn days_in_month(year: i32, month: u32) -> u32 {
    match month {
        1 | 3 | 5 | 7 | 8 | 10 | 12 => 31,
        4 | 6 | 9 | 11 => 30,
        2 => {
            if is_leap_year(year) {
                29
            } else {
                28
            }
        }
        _ => 0,
    }
}

/// Calculates days since Unix epoch for a given date.
fn date_to_days(year: i32, month: u32, day: u32) -> i64 {
    // Howard Hinnant's days_from_civil
    let y = if month <= 2 { year - 1 } else { year } as i64;
    let m = if month <= 2 {
        month as i64 + 9
    } else {
        month as i64 - 3
    };

    let era = if y >= 0 { y } else { y - 399 } / 400;
    let yoe = y - era * 400; // year of era
    let doy = (153 * m + 2) / 5 + day as i64 - 1; // day of year
    let doe = yoe * 365 + yoe / 4 - yoe / 100 + doy; // day of era

    era * 146097 + doe - 719468
}

/// Converts days since Unix epoch to (year, month, day).
fn days_to_date(days: i64) -> (i64, u32, u32) {
    // Howard Hinnant's algorithm in reverse
    let z = days + 719468;
    let era = if z >= 0 { z } else { z - 146096 } / 146097;
    let doe = z - era * 146097; // day of era
    let yoe = (doe - doe / 1460 + doe / 36524 - doe / 146096) / 365; // year of era
    let y = yoe + era * 400;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100); // day of year
    let mp = (5 * doy + 2) / 153; // month index
    let d = (doy - (153 * mp + 2) / 5 + 1) as u32; // day
    let m = if mp < 10 { mp + 3 } else { mp - 9 } as u32; // month

    let year = if m <= 2 { y + 1 } else { y };
    (year, m, d)
}

fn parse_field<T: std::str::FromStr>(
    s: &str,
    range: std::ops::Range<usize>,
    what: &str,
) -> Result<T, DateTimeParseError> {
    let field = s.get(range).ok_or_else(|| invalid(what, s))?;
    if !field.bytes().all(|b| b.is_ascii_digit()) {
        return Err(invalid(what, s));
    }
    field.parse().map_err(|_| invalid(what, s))
}

/// Parses an ISO 8601 datetime (`YYYY-MM-DDTHH:MM:SS[.ffffff][Z|±HH:MM]`)
/// and returns microseconds since the Unix epoch, in UTC.
///
/// Years outside 0000-9999 use the expanded form: a sign followed by four or
/// more digits (`-0218`, `+14677`). A missing zone designator is read as UTC.
pub fn parse_datetime(datetime_str: &str) -> Result<i64, DateTimeParseError> {
    let s = datetime_str.trim();
    let malformed = || DateTimeParseError {
        message: format!("Invalid ISO 8601 datetime: {}", datetime_str),
    };
    if !s.is_ascii() {
        return Err(malformed());
    }

    let (negative, unsigned) = match s.as_bytes().first() {
        Some(b'-') => (true, &s[1..]),
        Some(b'+') => (false, &s[1..]),
        _ => (false, s),
    };
    let year_len = unsigned
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(unsigned.len());
    if !(4..=9).contains(&year_len) {
        return Err(invalid("year", s));
    }
    let year: i32 = parse_field(unsigned, 0..year_len, "year")?;
    let year = if negative { -year } else { year };

    // Remainder after the year: -MM-DDTHH:MM:SS
    let r = &unsigned[year_len..];
    if r.len() < 15 {
        return Err(malformed());
    }
    let b = r.as_bytes();
    if b[0] != b'-' || b[3] != b'-' || (b[6] != b'T' && b[6] != b' ') || b[9] != b':' || b[12] != b':' {
        return Err(malformed());
    }

    let month: u32 = parse_field(r, 1..3, "month")?;
    let day: u32 = parse_field(r, 4..6, "day")?;
    let hours: i64 = parse_field(r, 7..9, "hours")?;
    let minutes: i64 = parse_field(r, 10..12, "minutes")?;
    let seconds: i64 = parse_field(r, 13..15, "seconds")?;

    if !(1..=12).contains(&month) {
        return Err(invalid("month", s));
    }
    if day < 1 || day > days_in_month(year, month) {
        return Err(invalid("day", s));
    }
    if hours > 23 {
        return Err(invalid("hours", s));
    }
    if minutes > 59 {
        return Err(invalid("minutes", s));
    }
    if seconds > 59 {
        return Err(invalid("seconds", s));
    }

    // Parse optional fractional seconds and timezone
    let rest = &r[15..];
    let (microseconds, offset_str) = if let Some(frac_rest) = rest.strip_prefix('.') {
        let frac_end = frac_rest
            .find(|c: char| !c.is_ascii_digit())
            .unwrap_or(frac_rest.len());
        (
            parse_fractional_seconds(&frac_rest[..frac_end])?,
            &frac_rest[frac_end..],
        )
    } else {
        (0, rest)
    };

    let offset_min = if offset_str.is_empty() {
        0
    } else {
        parse_timezone_offset(offset_str)?
    };

    let days = date_to_days(year, month, day);
    let local_micros = i128::from(days) * i128::from(MICROSECONDS_PER_DAY)
        + i128::from(hours * MICROSECONDS_PER_HOUR)
        + i128::from(minutes * MICROSECONDS_PER_MINUTE)
        + i128::from(seconds * MICROSECONDS_PER_SECOND)
        + i128::from(microseconds);

    // local time = UTC + offset, so UTC = local - offset
    let utc_micros = local_micros - i128::from(offset_min) * i128::from(MICROSECONDS_PER_MINUTE);
    i64::try_from(utc_micros).map_err(|_| invalid("year", s))
}

fn format_year(year: i64) -> String {
    if (0..=9999).contains(&year) {
        format!("{:04}", year)
    } else if year < 0 {
        format!("-{:04}", -year)
    } else {
        format!("+{}", year)
    }
}

/// Formats microseconds since the Unix epoch as an ISO 8601 UTC datetime.
pub fn format_datetime(epoch_micros: i64) -> String {
    let days = epoch_micros.div_euclid(MICROSECONDS_PER_DAY);
    let time_micros = epoch_micros.rem_euclid(MICROSECONDS_PER_DAY);

    let (year, month, day) = days_to_date(days);

    let hours = time_micros / MICROSECONDS_PER_HOUR;
    let minutes = (time_micros % MICROSECONDS_PER_HOUR) / MICROSECONDS_PER_MINUTE;
    let seconds = (time_micros % MICROSECONDS_PER_MINUTE) / MICROSECONDS_PER_SECOND;
    let microseconds = time_micros % MICROSECONDS_PER_SECOND;

    format!(
        "{}-{:02}-{:02}T{:02}:{:02}:{:02}{}Z",
        format_year(year),
        month,
        day,
        hours,
        minutes,
        seconds,
        format_fractional_seconds(microseconds)
    )
}
