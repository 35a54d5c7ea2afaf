//! Data model types for property lists.
//!
//! This module contains the in-memory tree both codecs read and write:
//! - Nodes (a value plus the type it is written under)
//! - Node types (tag descriptors binding a kind to XML and binary tags)
//! - Dictionaries (insertion-ordered string maps)
//! - Dates

pub mod date;
pub mod dictionary;
pub mod node;
pub mod node_type;

pub use date::Date;
pub use dictionary::Dictionary;
pub use node::{Node, Value};
pub use node_type::{Kind, NodeType, DEFAULT_KEY_TAG};
