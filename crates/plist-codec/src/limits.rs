//! Wire constants and security limits for decoding.
//!
//! The decoder treats every count, offset and length in a document as
//! untrusted. These limits bound the work and memory a single document can
//! demand beyond what its byte length already implies.

/// Binary plist magic and version.
pub const MAGIC: &[u8; 8] = b"bplist00";

/// Length of the magic/version header.
pub const HEADER_LEN: usize = 8;

/// Length of the fixed trailer at the end of a binary document.
pub const TRAILER_LEN: usize = 32;

/// Largest length that fits in the low nibble of an object marker.
pub const MAX_INLINE_LENGTH: usize = 14;

/// Low-nibble sentinel meaning "length follows as an integer object".
pub const EXTENDED_LENGTH: u8 = 0x0F;

/// Maximum container nesting depth, for both codecs.
pub const MAX_DEPTH: usize = 512;

/// Maximum number of nodes a decoded tree may contain.
///
/// Objects referenced from several places are materialized once per
/// reference, so a small document can otherwise describe an exponentially
/// large tree.
pub const MAX_DECODED_NODES: usize = 1 << 20;

/// Maximum total payload bytes (strings, data) a decoded tree may contain.
pub const MAX_DECODED_BYTES: usize = 1 << 28;

/// Public identifier written in the XML DOCTYPE declaration.
pub const XML_DOCTYPE: &str = r#"plist PUBLIC "-//Apple Computer//DTD PLIST 1.0//EN" "http://www.apple.com/DTDs/PropertyList-1.0.dtd""#;

/// Seconds between the Unix epoch and 2001-01-01T00:00:00Z.
pub const APPLE_EPOCH_OFFSET_SECS: i64 = 978_307_200;
