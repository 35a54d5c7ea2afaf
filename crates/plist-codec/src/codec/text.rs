//! Text forms of scalar values inside XML elements.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;

use crate::error::FormatError;
use crate::model::{Date, Kind, Value};

/// Parses the text content of a scalar element.
///
/// Booleans take their value from the element name (`true`/`false`); for
/// other names registered as booleans the text itself must say `true` or
/// `false`.
pub fn parse_text(kind: Kind, tag: &str, text: &str) -> Result<Value, FormatError> {
    match kind {
        Kind::Null => Ok(Value::Null),
        Kind::Boolean => match tag {
            "true" => Ok(Value::Boolean(true)),
            "false" => Ok(Value::Boolean(false)),
            _ => match text.trim() {
                "true" => Ok(Value::Boolean(true)),
                "false" => Ok(Value::Boolean(false)),
                _ => Err(invalid("boolean", text)),
            },
        },
        Kind::Integer => parse_integer(text.trim())
            .map(Value::Integer)
            .ok_or_else(|| invalid("integer", text)),
        Kind::Real => parse_real(text.trim())
            .map(Value::Real)
            .ok_or_else(|| invalid("real", text)),
        Kind::String => Ok(Value::String(text.to_string())),
        Kind::Date => Date::parse_iso8601(text.trim())
            .map(Value::Date)
            .map_err(|_| invalid("date", text)),
        Kind::Data => {
            let compact: String = text.chars().filter(|c| !c.is_ascii_whitespace()).collect();
            STANDARD
                .decode(compact.as_bytes())
                .map(Value::Data)
                .map_err(|_| invalid("data", text))
        }
        Kind::Uid => text
            .trim()
            .parse::<u64>()
            .map(Value::Uid)
            .map_err(|_| invalid("uid", text)),
        Kind::Fill | Kind::Array | Kind::Dictionary => Err(FormatError::Unsupported {
            kind,
            format: "XML text",
        }),
    }
}

/// Formats a scalar as element text. Booleans and null have no text.
pub fn format_text(value: &Value) -> Result<String, FormatError> {
    match value {
        Value::Null | Value::Boolean(_) => Ok(String::new()),
        Value::Integer(i) => Ok(i.to_string()),
        Value::Real(r) => Ok(format_real(*r)),
        Value::String(s) => Ok(s.clone()),
        Value::Date(d) => Ok(d.to_iso8601()),
        Value::Data(d) => Ok(STANDARD.encode(d)),
        Value::Uid(u) => Ok(u.to_string()),
        Value::Fill | Value::Array(_) | Value::Dictionary(_) => Err(FormatError::Unsupported {
            kind: value.kind(),
            format: "XML text",
        }),
    }
}

fn invalid(context: &'static str, text: &str) -> FormatError {
    FormatError::InvalidText {
        context,
        text: text.to_string(),
    }
}

fn parse_integer(text: &str) -> Option<i64> {
    let (negative, digits) = match text.as_bytes().first()? {
        b'-' => (true, &text[1..]),
        b'+' => (false, &text[1..]),
        _ => (false, text),
    };
    let magnitude = match digits.strip_prefix("0x").or_else(|| digits.strip_prefix("0X")) {
        Some(hex) => u64::from_str_radix(hex, 16).ok()?,
        None => digits.parse::<u64>().ok()?,
    };
    if negative {
        0i64.checked_sub_unsigned(magnitude)
    } else {
        i64::try_from(magnitude).ok()
    }
}

fn parse_real(text: &str) -> Option<f64> {
    match text.to_ascii_lowercase().as_str() {
        "nan" => Some(f64::NAN),
        "inf" | "+inf" | "infinity" | "+infinity" => Some(f64::INFINITY),
        "-inf" | "-infinity" => Some(f64::NEG_INFINITY),
        other => other.parse().ok(),
    }
}

fn format_real(value: f64) -> String {
    if value.is_nan() {
        "nan".to_string()
    } else if value == f64::INFINITY {
        "+infinity".to_string()
    } else if value == f64::NEG_INFINITY {
        "-infinity".to_string()
    } else {
        value.to_string()
    }
}
