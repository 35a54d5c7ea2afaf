//! Tag-to-type registry used by both decoders.
//!
//! A [`Registry`] maps XML element names and binary object classes to the
//! [`NodeType`] a decoder should instantiate. The default bindings cover the
//! standard plist vocabulary; callers can register additional types or
//! rebind existing tags.
//!
//! Codec entry points take a registry explicitly (`*_with` functions). The
//! registry-less entry points use [`Registry::global`], a process-wide
//! instance guarded by the same lock discipline.
//!
//! A few bindings are fixed ahead of any lookup and cannot be overridden:
//! binary class 0 with length 0 is null, class 0 with length 15 is fill,
//! class 6 is a UTF-16 string, and the XML `null` element is null.

use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard};

use lazy_static::lazy_static;
use rustc_hash::FxHashMap;
use tracing::trace;

use crate::codec::scalar::UTF16_STRING_TAG;
use crate::error::FormatError;
use crate::limits::EXTENDED_LENGTH;
use crate::model::{Node, NodeType, Value};

lazy_static! {
    static ref GLOBAL: Registry = Registry::new();
}

#[derive(Debug, Clone, Default)]
struct Tables {
    xml: FxHashMap<String, Arc<NodeType>>,
    binary: FxHashMap<u8, Arc<NodeType>>,
}

impl Tables {
    fn defaults() -> Self {
        let mut tables = Tables::default();
        for ty in [
            NodeType::DICTIONARY,
            NodeType::INTEGER,
            NodeType::REAL,
            NodeType::STRING,
            NodeType::ARRAY,
            NodeType::DATA,
            NodeType::DATE,
            NodeType::UID,
        ] {
            let ty = Arc::new(ty);
            tables.bind(ty.xml_tag().to_string(), ty.binary_tag(), ty);
        }
        let string = Arc::new(NodeType::STRING);
        tables.bind("string".to_string(), 0x5, Arc::clone(&string));
        tables.bind("ustring".to_string(), UTF16_STRING_TAG, string);
        let boolean = Arc::new(NodeType::BOOLEAN);
        tables.bind("true".to_string(), 0x0, Arc::clone(&boolean));
        tables.bind("false".to_string(), 0x0, boolean);
        tables
    }

    fn bind(&mut self, xml_tag: String, binary_tag: u8, ty: Arc<NodeType>) {
        self.binary.insert(binary_tag, Arc::clone(&ty));
        self.xml.insert(xml_tag, ty);
    }
}

/// Registry of node types keyed by XML and binary tag.
///
/// All state sits behind one `RwLock`: mutations replace bindings
/// atomically, and a decode holds a read guard for its whole duration (see
/// [`Registry::read`]) so it never observes a half-applied change.
#[derive(Debug)]
pub struct Registry {
    tables: RwLock<Tables>,
}

impl Default for Registry {
    fn default() -> Self {
        Registry::new()
    }
}

impl Registry {
    /// Creates a registry with the default bindings.
    pub fn new() -> Self {
        Registry {
            tables: RwLock::new(Tables::defaults()),
        }
    }

    /// Creates a registry with no bindings beyond the fixed ones.
    pub fn empty() -> Self {
        Registry {
            tables: RwLock::new(Tables::default()),
        }
    }

    /// The process-wide registry used by the registry-less entry points.
    pub fn global() -> &'static Registry {
        &GLOBAL
    }

    /// Binds a type under its own XML and binary tags, replacing any previous
    /// binding for either tag.
    pub fn register(&self, ty: impl Into<Arc<NodeType>>) -> Result<(), FormatError> {
        let ty = ty.into();
        self.register_as(ty.xml_tag().to_string(), ty.binary_tag(), ty)
    }

    /// Binds a type under an arbitrary tag pair.
    ///
    /// Used to give several XML spellings the same binary constructor, or to
    /// read a built-in value layout from a different tag.
    pub fn register_as(
        &self,
        xml_tag: impl Into<String>,
        binary_tag: u8,
        ty: impl Into<Arc<NodeType>>,
    ) -> Result<(), FormatError> {
        if binary_tag > 0x0F {
            return Err(FormatError::BinaryTagOutOfRange { tag: binary_tag });
        }
        let xml_tag = xml_tag.into();
        let ty = ty.into();
        trace!(xml_tag = %xml_tag, binary_tag, kind = ?ty.kind(), "registering node type");
        self.write().bind(xml_tag, binary_tag, ty);
        Ok(())
    }

    /// Restores exactly the default bindings.
    pub fn reset(&self) {
        *self.write() = Tables::defaults();
    }

    /// Locks the registry for reading and returns a view for lookups.
    ///
    /// Registrations on other threads block until the view is dropped.
    pub fn read(&self) -> RegistryView<'_> {
        RegistryView {
            tables: self.tables.read().unwrap_or_else(PoisonError::into_inner),
        }
    }

    /// Creates an empty node for a binary object class and marker length.
    pub fn create_from_binary_tag(&self, tag: u8, length: u8) -> Result<Node, FormatError> {
        self.read().create_from_binary_tag(tag, length)
    }

    /// Creates an empty node for an XML element name.
    pub fn create_from_xml_tag(&self, tag: &str) -> Result<Node, FormatError> {
        self.read().create_from_xml_tag(tag)
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, Tables> {
        self.tables.write().unwrap_or_else(PoisonError::into_inner)
    }
}

/// A locked, read-only view of a [`Registry`].
pub struct RegistryView<'a> {
    tables: RwLockReadGuard<'a, Tables>,
}

impl RegistryView<'_> {
    /// Creates an empty node for a binary object class and the marker's low
    /// nibble.
    pub fn create_from_binary_tag(&self, tag: u8, length: u8) -> Result<Node, FormatError> {
        match (tag, length) {
            (0x0, 0x0) => return Ok(Node::null()),
            (0x0, EXTENDED_LENGTH) => return Ok(Node::new(Value::Fill)),
            (UTF16_STRING_TAG, _) => return Ok(Node::new(Value::String(String::new()))),
            _ => {}
        }
        match self.tables.binary.get(&tag) {
            Some(ty) => Ok(Node::empty(ty)),
            None => Err(FormatError::UnknownBinaryTag {
                tag,
                length: length as usize,
            }),
        }
    }

    /// Creates an empty node for an XML element name.
    pub fn create_from_xml_tag(&self, tag: &str) -> Result<Node, FormatError> {
        if tag == NodeType::NULL.xml_tag() {
            return Ok(Node::null());
        }
        match self.tables.xml.get(tag) {
            Some(ty) => Ok(Node::empty(ty)),
            None => Err(FormatError::UnknownXmlTag {
                tag: tag.to_string(),
            }),
        }
    }
}

/// Registers a type in the global registry.
pub fn register(ty: impl Into<Arc<NodeType>>) -> Result<(), FormatError> {
    Registry::global().register(ty)
}

/// Registers a type under an arbitrary tag pair in the global registry.
pub fn register_as(
    xml_tag: impl Into<String>,
    binary_tag: u8,
    ty: impl Into<Arc<NodeType>>,
) -> Result<(), FormatError> {
    Registry::global().register_as(xml_tag, binary_tag, ty)
}

/// Restores the global registry's default bindings.
pub fn reset_registry() {
    Registry::global().reset();
}
