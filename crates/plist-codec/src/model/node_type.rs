//! Node kinds and the tag descriptors that identify node variants on the wire.

use std::borrow::Cow;

/// Value layout of a node.
///
/// The kind decides how a payload is read and written; the [`NodeType`]
/// decides which tags it is written under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Kind {
    Null,
    Fill,
    Boolean,
    Integer,
    Real,
    String,
    Date,
    Data,
    Uid,
    Array,
    Dictionary,
}

impl Kind {
    /// Returns true for kinds whose marker nibble is an element or byte count,
    /// and which therefore may use an extended length.
    pub fn has_counted_length(self) -> bool {
        matches!(
            self,
            Kind::String | Kind::Data | Kind::Array | Kind::Dictionary
        )
    }
}

/// Tag descriptor for one node variant.
///
/// Binds a [`Kind`] to the XML element name and binary object class it is
/// written under. Dictionary types also carry the element name used for
/// their keys. Custom descriptors let callers serialize built-in value
/// layouts under their own tags:
///
/// ```rust
/// use plist_codec::{Kind, NodeType};
///
/// let short_int = NodeType::custom(Kind::Integer, "i", 0x0C);
/// assert_eq!(short_int.xml_tag(), "i");
/// assert!(short_int.is_unique_in_binary());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NodeType {
    kind: Kind,
    xml_tag: Cow<'static, str>,
    binary_tag: u8,
    key_tag: Cow<'static, str>,
}

/// Default element name for dictionary keys.
pub const DEFAULT_KEY_TAG: &str = "key";

impl NodeType {
    pub const NULL: NodeType = NodeType::builtin(Kind::Null, "null", 0x0);
    pub const FILL: NodeType = NodeType::builtin(Kind::Fill, "fill", 0x0);
    pub const BOOLEAN: NodeType = NodeType::builtin(Kind::Boolean, "true", 0x0);
    pub const INTEGER: NodeType = NodeType::builtin(Kind::Integer, "integer", 0x1);
    pub const REAL: NodeType = NodeType::builtin(Kind::Real, "real", 0x2);
    pub const DATE: NodeType = NodeType::builtin(Kind::Date, "date", 0x3);
    pub const DATA: NodeType = NodeType::builtin(Kind::Data, "data", 0x4);
    pub const STRING: NodeType = NodeType::builtin(Kind::String, "string", 0x5);
    pub const UID: NodeType = NodeType::builtin(Kind::Uid, "uid", 0x8);
    pub const ARRAY: NodeType = NodeType::builtin(Kind::Array, "array", 0xA);
    pub const DICTIONARY: NodeType = NodeType::builtin(Kind::Dictionary, "dict", 0xD);

    const fn builtin(kind: Kind, xml_tag: &'static str, binary_tag: u8) -> Self {
        NodeType {
            kind,
            xml_tag: Cow::Borrowed(xml_tag),
            binary_tag,
            key_tag: Cow::Borrowed(DEFAULT_KEY_TAG),
        }
    }

    /// Creates a descriptor for `kind` written under custom tags.
    pub fn custom(kind: Kind, xml_tag: impl Into<Cow<'static, str>>, binary_tag: u8) -> Self {
        NodeType {
            kind,
            xml_tag: xml_tag.into(),
            binary_tag,
            key_tag: Cow::Borrowed(DEFAULT_KEY_TAG),
        }
    }

    /// Sets the element name used for dictionary keys.
    pub fn with_key_tag(mut self, key_tag: impl Into<Cow<'static, str>>) -> Self {
        self.key_tag = key_tag.into();
        self
    }

    /// Returns the built-in descriptor for a kind.
    pub fn builtin_for(kind: Kind) -> &'static NodeType {
        match kind {
            Kind::Null => &BUILTIN_NULL,
            Kind::Fill => &BUILTIN_FILL,
            Kind::Boolean => &BUILTIN_BOOLEAN,
            Kind::Integer => &BUILTIN_INTEGER,
            Kind::Real => &BUILTIN_REAL,
            Kind::String => &BUILTIN_STRING,
            Kind::Date => &BUILTIN_DATE,
            Kind::Data => &BUILTIN_DATA,
            Kind::Uid => &BUILTIN_UID,
            Kind::Array => &BUILTIN_ARRAY,
            Kind::Dictionary => &BUILTIN_DICTIONARY,
        }
    }

    pub fn kind(&self) -> Kind {
        self.kind
    }

    pub fn xml_tag(&self) -> &str {
        &self.xml_tag
    }

    pub fn binary_tag(&self) -> u8 {
        self.binary_tag
    }

    pub fn key_tag(&self) -> &str {
        &self.key_tag
    }

    /// Returns true if this is the built-in descriptor for its kind.
    pub fn is_builtin(&self) -> bool {
        self == NodeType::builtin_for(self.kind)
    }

    /// Returns true if equal values of this type share one object in the
    /// binary object table.
    pub fn is_unique_in_binary(&self) -> bool {
        !matches!(
            self.kind,
            Kind::Null | Kind::Fill | Kind::Array | Kind::Dictionary
        )
    }
}

static BUILTIN_NULL: NodeType = NodeType::NULL;
static BUILTIN_FILL: NodeType = NodeType::FILL;
static BUILTIN_BOOLEAN: NodeType = NodeType::BOOLEAN;
static BUILTIN_INTEGER: NodeType = NodeType::INTEGER;
static BUILTIN_REAL: NodeType = NodeType::REAL;
static BUILTIN_DATE: NodeType = NodeType::DATE;
static BUILTIN_DATA: NodeType = NodeType::DATA;
static BUILTIN_STRING: NodeType = NodeType::STRING;
static BUILTIN_UID: NodeType = NodeType::UID;
static BUILTIN_ARRAY: NodeType = NodeType::ARRAY;
static BUILTIN_DICTIONARY: NodeType = NodeType::DICTIONARY;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_lookup() {
        for kind in [
            Kind::Null,
            Kind::Fill,
            Kind::Boolean,
            Kind::Integer,
            Kind::Real,
            Kind::String,
            Kind::Date,
            Kind::Data,
            Kind::Uid,
            Kind::Array,
            Kind::Dictionary,
        ] {
            let ty = NodeType::builtin_for(kind);
            assert_eq!(ty.kind(), kind);
            assert!(ty.is_builtin());
        }
    }

    #[test]
    fn test_unique_flag() {
        assert!(NodeType::INTEGER.is_unique_in_binary());
        assert!(NodeType::STRING.is_unique_in_binary());
        assert!(NodeType::BOOLEAN.is_unique_in_binary());
        assert!(!NodeType::NULL.is_unique_in_binary());
        assert!(!NodeType::FILL.is_unique_in_binary());
        assert!(!NodeType::ARRAY.is_unique_in_binary());
        assert!(!NodeType::DICTIONARY.is_unique_in_binary());
    }

    #[test]
    fn test_custom_descriptor() {
        let root = NodeType::custom(Kind::Dictionary, "Custom", 0xC).with_key_tag("k");
        assert_eq!(root.xml_tag(), "Custom");
        assert_eq!(root.key_tag(), "k");
        assert_eq!(root.binary_tag(), 0xC);
        assert!(!root.is_builtin());
        assert_eq!(NodeType::DICTIONARY.key_tag(), DEFAULT_KEY_TAG);
    }
}
