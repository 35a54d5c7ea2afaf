//! Apple property lists: binary and XML codecs over an extensible node tree.
//!
//! This crate reads and writes property list documents in the binary
//! (`bplist00`) and XML encodings, materializing them as a tree of [`Node`]s.
//!
//! # Overview
//!
//! - **One tree, two formats**: the same [`Node`] tree round-trips through
//!   both encodings
//! - **Extensible tags**: a [`Registry`] maps element names and binary object
//!   classes to [`NodeType`]s, so callers can read and write built-in value
//!   layouts under their own tags
//! - **Safe on untrusted input**: every count, offset and length is checked
//!   before it sizes an allocation
//!
//! # Quick Start
//!
//! ```rust
//! use plist_codec::{Dictionary, Format, Node, SaveOptions};
//!
//! let mut dict = Dictionary::new();
//! dict.insert("CFBundleName", "Example");
//! dict.insert("Retina", true);
//! dict.insert("Sizes", Node::from_iter([Node::from(16), Node::from(32)]));
//! let root = Node::from(dict);
//!
//! // Encode to binary
//! let bytes = plist_codec::to_bytes(&root, Format::Binary, SaveOptions::default()).unwrap();
//! assert!(bytes.starts_with(b"bplist00"));
//!
//! // Decode back; the format is detected from the content
//! let decoded = plist_codec::from_bytes(&bytes).unwrap();
//! assert_eq!(decoded, root);
//! assert_eq!(decoded["Sizes"][1].as_i64(), Some(32));
//! ```
//!
//! # Custom Tags
//!
//! ```rust
//! use plist_codec::{Kind, Node, NodeType, Registry};
//!
//! let registry = Registry::new();
//! let short_int = NodeType::custom(Kind::Integer, "i", 0xC);
//! registry.register(short_int.clone()).unwrap();
//!
//! let node = Node::with_type(short_int, 42).unwrap();
//! let xml = plist_codec::codec::encode_xml(&node, false).unwrap();
//! assert!(String::from_utf8_lossy(&xml).contains("<i>42</i>"));
//!
//! let decoded = plist_codec::from_bytes_with(&xml, &registry).unwrap();
//! assert_eq!(decoded, node);
//! ```
//!
//! # Modules
//!
//! - [`model`]: Node tree types (Node, Value, NodeType, Dictionary, Date)
//! - [`registry`]: Tag-to-type registry
//! - [`codec`]: Binary and XML encoding/decoding
//! - [`document`]: Format detection and load/save entry points
//! - [`error`]: Error types
//! - [`limits`]: Wire constants and security limits for decoding
//!
//! # Security
//!
//! The decoders are designed to safely handle untrusted input:
//! - Trailer fields are validated against the input length before the
//!   offset table is read
//! - Element counts are checked against the remaining bytes before
//!   allocation
//! - Reference cycles, excessive nesting and runaway expansion of shared
//!   objects are rejected with descriptive errors
//!
//! # Wire Format
//!
//! Binary documents are `bplist00` + object table + offset table + a
//! 32-byte trailer. XML documents use the Apple plist vocabulary (`dict`,
//! `array`, `string`, `ustring`, `integer`, `real`, `true`, `false`,
//! `date`, `data`, `uid`, `null`) plus any registered tags.

pub mod codec;
pub mod document;
pub mod error;
pub mod limits;
pub mod model;
pub mod registry;
pub mod util;

#[cfg(test)]
mod testing;

// Re-export commonly used types at crate root
pub use document::{
    from_bytes, from_bytes_with, load, load_with, save, to_bytes, Document, Format, SaveOptions,
};
pub use error::{Error, FormatError};
pub use model::{Date, Dictionary, Kind, Node, NodeType, Value, DEFAULT_KEY_TAG};
pub use registry::{register, register_as, reset_registry, Registry};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_global_registry_functions() {
        let ty = NodeType::custom(Kind::Integer, "global-int", 0xE);
        register(ty.clone()).unwrap();
        let node = from_bytes(b"<plist><global-int>9</global-int></plist>").unwrap();
        assert_eq!(node, Node::with_type(ty, 9).unwrap());

        register_as("global-alias", 0xE, NodeType::INTEGER).unwrap();
        let node = from_bytes(b"<plist><global-alias>9</global-alias></plist>").unwrap();
        assert_eq!(node, Node::from(9));

        reset_registry();
        assert!(from_bytes(b"<plist><global-int>9</global-int></plist>").is_err());
    }
}
