//! Error types for property list encoding and decoding.

use thiserror::Error;

use crate::model::Kind;

/// Error raised while reading or writing a property list document.
///
/// Every variant aborts the whole operation; no partial tree is returned.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FormatError {
    // === Binary container ===
    #[error("input too short for a binary plist: {len} bytes (need at least {min})")]
    Truncated { len: usize, min: usize },

    #[error("invalid magic bytes: expected \"bplist00\", found {found:?}")]
    BadMagic { found: [u8; 8] },

    #[error("invalid trailer: {context}")]
    InvalidTrailer { context: &'static str },

    #[error("object {index} has offset {offset} outside the object table")]
    InvalidOffset { index: usize, offset: u64 },

    #[error("object reference {reference} out of bounds (object count: {count})")]
    InvalidReference { reference: u64, count: usize },

    #[error("object {index} references itself")]
    CyclicReference { index: usize },

    #[error("nesting depth exceeds maximum {max}")]
    NestingTooDeep { max: usize },

    #[error("document expands beyond {max} {unit}")]
    TooManyNodes { max: usize, unit: &'static str },

    // === Tags ===
    #[error("unknown node: binary tag {tag:#x} with length {length}")]
    UnknownBinaryTag { tag: u8, length: usize },

    #[error("unknown node: XML tag <{tag}>")]
    UnknownXmlTag { tag: String },

    #[error("binary tag {tag} does not fit in an object class nibble")]
    BinaryTagOutOfRange { tag: u8 },

    #[error("node type <{xml_tag}> holds {expected:?} values, got {found:?}")]
    KindMismatch {
        xml_tag: String,
        expected: Kind,
        found: Kind,
    },

    // === Payloads ===
    #[error("unexpected end of input while reading {context}")]
    UnexpectedEof { context: &'static str },

    #[error("invalid length {length} for {context}")]
    InvalidLength { context: &'static str, length: u64 },

    #[error("invalid string data in {context}")]
    InvalidString { context: &'static str },

    #[error("invalid {context} text: {text:?}")]
    InvalidText { context: &'static str, text: String },

    #[error("dictionary key must be a string, found {found:?}")]
    InvalidKey { found: Kind },

    #[error("duplicate dictionary key {key:?}")]
    DuplicateKey { key: String },

    // === XML ===
    #[error("malformed XML: {0}")]
    Xml(String),

    #[error("unexpected XML content <{found}> while reading {context}")]
    UnexpectedElement { found: String, context: &'static str },

    // === Encoding ===
    #[error("{kind:?} nodes have no {format} representation")]
    Unsupported { kind: Kind, format: &'static str },
}

/// Error returned by the stream-based load/save entry points.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Format(#[from] FormatError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
