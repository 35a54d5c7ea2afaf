//! Primitive encoding/decoding for the binary plist format.
//!
//! All multi-byte values in a binary plist are big-endian. Integers in the
//! offset table, object references and extended lengths use a fixed width of
//! 1 to 8 bytes chosen per document.

use crate::error::FormatError;

// =============================================================================
// DECODING
// =============================================================================

/// Reader for decoding binary data.
///
/// Wraps a byte slice and provides methods for reading primitives
/// with bounds checking and error handling.
#[derive(Debug, Clone)]
pub struct Reader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    /// Creates a new reader from a byte slice.
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    /// Moves to an absolute position.
    pub fn seek(&mut self, pos: usize, context: &'static str) -> Result<(), FormatError> {
        if pos > self.data.len() {
            return Err(FormatError::UnexpectedEof { context });
        }
        self.pos = pos;
        Ok(())
    }

    /// Returns the number of remaining bytes.
    pub fn remaining_len(&self) -> usize {
        self.data.len() - self.pos
    }

    /// Returns true if all data has been consumed.
    pub fn is_empty(&self) -> bool {
        self.pos >= self.data.len()
    }

    /// Reads a single byte.
    #[inline]
    pub fn read_byte(&mut self, context: &'static str) -> Result<u8, FormatError> {
        if self.pos >= self.data.len() {
            return Err(FormatError::UnexpectedEof { context });
        }
        let byte = self.data[self.pos];
        self.pos += 1;
        Ok(byte)
    }

    /// Reads exactly n bytes.
    #[inline]
    pub fn read_bytes(&mut self, n: usize, context: &'static str) -> Result<&'a [u8], FormatError> {
        if n > self.remaining_len() {
            return Err(FormatError::UnexpectedEof { context });
        }
        let bytes = &self.data[self.pos..self.pos + n];
        self.pos += n;
        Ok(bytes)
    }

    /// Reads a big-endian unsigned integer of `width` bytes (1 to 8).
    #[inline]
    pub fn read_uint(&mut self, width: usize, context: &'static str) -> Result<u64, FormatError> {
        if width == 0 || width > 8 {
            return Err(FormatError::InvalidLength {
                context,
                length: width as u64,
            });
        }
        let bytes = self.read_bytes(width, context)?;
        Ok(bytes.iter().fold(0u64, |acc, b| (acc << 8) | u64::from(*b)))
    }

    /// Reads a big-endian f32.
    pub fn read_f32(&mut self, context: &'static str) -> Result<f32, FormatError> {
        let bytes = self.read_bytes(4, context)?;
        let mut buf = [0u8; 4];
        buf.copy_from_slice(bytes);
        Ok(f32::from_be_bytes(buf))
    }

    /// Reads a big-endian f64.
    pub fn read_f64(&mut self, context: &'static str) -> Result<f64, FormatError> {
        let bytes = self.read_bytes(8, context)?;
        let mut buf = [0u8; 8];
        buf.copy_from_slice(bytes);
        Ok(f64::from_be_bytes(buf))
    }
}

// =============================================================================
// ENCODING
// =============================================================================

/// Writer for encoding binary data.
#[derive(Debug, Clone, Default)]
pub struct Writer {
    buf: Vec<u8>,
}

impl Writer {
    /// Creates a new writer.
    pub fn new() -> Self {
        Self { buf: Vec::new() }
    }

    /// Returns the written bytes.
    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }

    /// Returns a reference to the written bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    /// Returns the number of bytes written.
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    /// Returns true if no bytes have been written.
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Writes a single byte.
    #[inline]
    pub fn write_byte(&mut self, byte: u8) {
        self.buf.push(byte);
    }

    /// Writes raw bytes.
    #[inline]
    pub fn write_bytes(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    /// Writes the low `width` bytes of `value` big-endian.
    ///
    /// Callers choose `width` with [`min_width`]; higher bytes are dropped.
    #[inline]
    pub fn write_uint(&mut self, value: u64, width: usize) {
        let bytes = value.to_be_bytes();
        self.buf.extend_from_slice(&bytes[8 - width..]);
    }

    /// Writes a big-endian f64.
    pub fn write_f64(&mut self, value: f64) {
        self.buf.extend_from_slice(&value.to_be_bytes());
    }
}

// =============================================================================
// WIDTHS
// =============================================================================

/// Returns the smallest of 1, 2, 4 or 8 bytes that can hold `value`.
#[inline]
pub fn min_width(value: u64) -> usize {
    if value <= u64::from(u8::MAX) {
        1
    } else if value <= u64::from(u16::MAX) {
        2
    } else if value <= u64::from(u32::MAX) {
        4
    } else {
        8
    }
}

/// Returns log2 of a width produced by [`min_width`].
#[inline]
pub fn width_exponent(width: usize) -> u8 {
    match width {
        1 => 0,
        2 => 1,
        4 => 2,
        _ => 3,
    }
}
