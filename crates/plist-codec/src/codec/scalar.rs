//! Object markers and scalar payloads for the binary plist format.
//!
//! Every object starts with a marker byte: the high nibble is the object
//! class, the low nibble an inline length (0 to 14) or 15, in which case the
//! real length follows as an integer object. Fixed-size scalars use the low
//! nibble for their own purposes (integer width exponent, boolean value).

use crate::codec::primitives::{min_width, width_exponent, Reader, Writer};
use crate::error::FormatError;
use crate::limits::{EXTENDED_LENGTH, MAX_INLINE_LENGTH};
use crate::model::{Date, Kind, Node, Value};

/// Object class of UTF-16 strings. Always decoded as a string.
pub const UTF16_STRING_TAG: u8 = 0x6;

const INTEGER_CLASS: u8 = 0x1;
const FALSE_NIBBLE: u8 = 0x8;
const TRUE_NIBBLE: u8 = 0x9;
const F32_NIBBLE: u8 = 0x2;
const F64_NIBBLE: u8 = 0x3;

// =============================================================================
// ENCODING
// =============================================================================

/// Length recorded for a value: bytes for data, UTF-16 code units or ASCII
/// bytes for strings, elements for containers, payload width otherwise.
pub fn marker_length(value: &Value) -> usize {
    match value {
        Value::Null | Value::Fill | Value::Boolean(_) => 0,
        Value::Integer(i) => integer_width(*i),
        Value::Real(_) | Value::Date(_) => 8,
        Value::String(s) if s.is_ascii() => s.len(),
        Value::String(s) => s.encode_utf16().count(),
        Value::Data(d) => d.len(),
        Value::Uid(u) => min_width(*u),
        Value::Array(a) => a.len(),
        Value::Dictionary(d) => d.len(),
    }
}

fn integer_width(value: i64) -> usize {
    // Widths below 8 are unsigned; negative values need the full signed width.
    if value < 0 { 8 } else { min_width(value as u64) }
}

/// Writes a marker byte, followed by an integer object when the length does
/// not fit in the low nibble.
pub fn write_marker(writer: &mut Writer, class: u8, length: usize) -> Result<(), FormatError> {
    if class > 0x0F {
        return Err(FormatError::BinaryTagOutOfRange { tag: class });
    }
    if length <= MAX_INLINE_LENGTH {
        writer.write_byte((class << 4) | length as u8);
    } else {
        writer.write_byte((class << 4) | EXTENDED_LENGTH);
        write_integer(writer, INTEGER_CLASS, length as i64);
    }
    Ok(())
}

fn write_integer(writer: &mut Writer, class: u8, value: i64) {
    let width = integer_width(value);
    writer.write_byte((class << 4) | width_exponent(width));
    writer.write_uint(value as u64, width);
}

/// Writes the marker and payload of a scalar node.
pub fn write_scalar(writer: &mut Writer, node: &Node) -> Result<(), FormatError> {
    let class = node.binary_tag();
    if class > 0x0F {
        return Err(FormatError::BinaryTagOutOfRange { tag: class });
    }
    match node.value() {
        Value::Null => writer.write_byte(class << 4),
        Value::Fill => writer.write_byte((class << 4) | EXTENDED_LENGTH),
        Value::Boolean(b) => {
            let nibble = if *b { TRUE_NIBBLE } else { FALSE_NIBBLE };
            writer.write_byte((class << 4) | nibble);
        }
        Value::Integer(i) => write_integer(writer, class, *i),
        Value::Real(r) => {
            writer.write_byte((class << 4) | F64_NIBBLE);
            writer.write_f64(*r);
        }
        Value::Date(d) => {
            writer.write_byte((class << 4) | F64_NIBBLE);
            writer.write_f64(d.apple_seconds());
        }
        Value::Data(d) => {
            write_marker(writer, class, d.len())?;
            writer.write_bytes(d);
        }
        Value::String(s) if s.is_ascii() => {
            write_marker(writer, class, s.len())?;
            writer.write_bytes(s.as_bytes());
        }
        Value::String(s) => {
            let units: Vec<u16> = s.encode_utf16().collect();
            write_marker(writer, UTF16_STRING_TAG, units.len())?;
            for unit in units {
                writer.write_uint(u64::from(unit), 2);
            }
        }
        Value::Uid(u) => {
            let width = min_width(*u);
            writer.write_byte((class << 4) | (width as u8 - 1));
            writer.write_uint(*u, width);
        }
        Value::Array(_) | Value::Dictionary(_) => {
            return Err(FormatError::Unsupported {
                kind: node.kind(),
                format: "scalar binary",
            });
        }
    }
    Ok(())
}

// =============================================================================
// DECODING
// =============================================================================

/// Reads an extended length: an integer object following a marker whose low
/// nibble is 15.
pub fn read_extended_length(reader: &mut Reader<'_>) -> Result<usize, FormatError> {
    let marker = reader.read_byte("extended length")?;
    let nibble = marker & 0x0F;
    if marker >> 4 != INTEGER_CLASS || nibble > 3 {
        return Err(FormatError::InvalidLength {
            context: "extended length marker",
            length: u64::from(marker),
        });
    }
    let value = reader.read_uint(1 << nibble, "extended length")?;
    usize::try_from(value)
        .ok()
        .filter(|&len| len as u64 <= i64::MAX as u64)
        .ok_or(FormatError::InvalidLength {
            context: "extended length",
            length: value,
        })
}

/// Reads a scalar payload.
///
/// `length` is the resolved length for counted kinds (strings, data) and the
/// raw marker nibble for everything else.
pub fn read_scalar(reader: &mut Reader<'_>, kind: Kind, class: u8, length: usize) -> Result<Value, FormatError> {
    match kind {
        Kind::Null => Ok(Value::Null),
        Kind::Fill => Ok(Value::Fill),
        Kind::Boolean => match length as u8 {
            FALSE_NIBBLE => Ok(Value::Boolean(false)),
            TRUE_NIBBLE => Ok(Value::Boolean(true)),
            _ => Err(FormatError::InvalidLength {
                context: "boolean",
                length: length as u64,
            }),
        },
        Kind::Integer => read_integer(reader, length),
        Kind::Real => match length as u8 {
            F32_NIBBLE => Ok(Value::Real(f64::from(reader.read_f32("real")?))),
            F64_NIBBLE => Ok(Value::Real(reader.read_f64("real")?)),
            _ => Err(FormatError::InvalidLength {
                context: "real width",
                length: length as u64,
            }),
        },
        Kind::Date => {
            if length as u8 != F64_NIBBLE {
                return Err(FormatError::InvalidLength {
                    context: "date width",
                    length: length as u64,
                });
            }
            Ok(Value::Date(Date::from_apple_seconds(reader.read_f64("date")?)))
        }
        Kind::Data => Ok(Value::Data(reader.read_bytes(length, "data")?.to_vec())),
        Kind::String if class == UTF16_STRING_TAG => {
            let byte_len = length.checked_mul(2).ok_or(FormatError::InvalidLength {
                context: "utf-16 string",
                length: length as u64,
            })?;
            let bytes = reader.read_bytes(byte_len, "utf-16 string")?;
            let units: Vec<u16> = bytes
                .chunks_exact(2)
                .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
                .collect();
            String::from_utf16(&units)
                .map(Value::String)
                .map_err(|_| FormatError::InvalidString {
                    context: "utf-16 string",
                })
        }
        // Single-byte strings are ASCII in practice; decode as Latin-1 so
        // every byte maps to a character.
        Kind::String => {
            let bytes = reader.read_bytes(length, "ascii string")?;
            Ok(Value::String(bytes.iter().map(|&b| char::from(b)).collect()))
        }
        Kind::Uid => {
            if length > 7 {
                return Err(FormatError::InvalidLength {
                    context: "uid width",
                    length: length as u64 + 1,
                });
            }
            Ok(Value::Uid(reader.read_uint(length + 1, "uid")?))
        }
        Kind::Array | Kind::Dictionary => Err(FormatError::Unsupported {
            kind,
            format: "scalar binary",
        }),
    }
}

fn read_integer(reader: &mut Reader<'_>, nibble: usize) -> Result<Value, FormatError> {
    match nibble {
        0..=2 => Ok(Value::Integer(reader.read_uint(1 << nibble, "integer")? as i64)),
        3 => Ok(Value::Integer(reader.read_uint(8, "integer")? as i64)),
        // 128-bit integers are accepted when the value fits in 64 bits.
        4 => {
            let high = reader.read_uint(8, "integer")?;
            let low = reader.read_uint(8, "integer")?;
            let value = low as i64;
            let fits = (high == 0 && value >= 0) || (high == u64::MAX && value < 0);
            if !fits {
                return Err(FormatError::InvalidLength {
                    context: "128-bit integer out of range",
                    length: 16,
                });
            }
            Ok(Value::Integer(value))
        }
        _ => Err(FormatError::InvalidLength {
            context: "integer width",
            length: nibble as u64,
        }),
    }
}
