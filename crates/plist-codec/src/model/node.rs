//! The property list node tree.

use std::fmt;
use std::ops::{Index, IndexMut};
use std::sync::Arc;

use crate::codec::primitives::{Reader, Writer};
use crate::codec::{scalar, text};
use crate::error::FormatError;
use crate::model::{Date, Dictionary, Kind, NodeType};

/// The value held by a node.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    /// Binary-only padding object.
    Fill,
    Boolean(bool),
    Integer(i64),
    Real(f64),
    String(String),
    Date(Date),
    Data(Vec<u8>),
    Uid(u64),
    Array(Vec<Node>),
    Dictionary(Dictionary),
}

impl Value {
    pub fn kind(&self) -> Kind {
        match self {
            Value::Null => Kind::Null,
            Value::Fill => Kind::Fill,
            Value::Boolean(_) => Kind::Boolean,
            Value::Integer(_) => Kind::Integer,
            Value::Real(_) => Kind::Real,
            Value::String(_) => Kind::String,
            Value::Date(_) => Kind::Date,
            Value::Data(_) => Kind::Data,
            Value::Uid(_) => Kind::Uid,
            Value::Array(_) => Kind::Array,
            Value::Dictionary(_) => Kind::Dictionary,
        }
    }

    /// The zero value for a kind; decoders fill it in afterwards.
    pub fn empty(kind: Kind) -> Self {
        match kind {
            Kind::Null => Value::Null,
            Kind::Fill => Value::Fill,
            Kind::Boolean => Value::Boolean(false),
            Kind::Integer => Value::Integer(0),
            Kind::Real => Value::Real(0.0),
            Kind::String => Value::String(String::new()),
            Kind::Date => Value::Date(Date::default()),
            Kind::Data => Value::Data(Vec::new()),
            Kind::Uid => Value::Uid(0),
            Kind::Array => Value::Array(Vec::new()),
            Kind::Dictionary => Value::Dictionary(Dictionary::new()),
        }
    }
}

/// A node in a property list tree.
///
/// A node pairs a [`Value`] with the [`NodeType`] it is written under.
/// Nodes built from plain values use the built-in type for their kind;
/// [`Node::with_type`] attaches a custom descriptor, typically one that has
/// also been registered so the decoders can reproduce it.
///
/// Two nodes are equal when their values are equal and they are written
/// under the same tags. Arrays compare element-wise in order; dictionaries
/// compare by key set regardless of insertion order.
///
/// ```rust
/// use plist_codec::{Dictionary, Node};
///
/// let mut dict = Dictionary::new();
/// dict.insert("name", "Alice");
/// dict.insert("age", 30);
/// let root = Node::from(dict);
///
/// assert_eq!(root["name"].as_str(), Some("Alice"));
/// assert_eq!(root["age"].as_i64(), Some(30));
/// assert_eq!(root.xml_tag(), "dict");
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    value: Value,
    // None for the built-in type of the value's kind.
    ty: Option<Arc<NodeType>>,
}

impl Node {
    /// Creates a node of the built-in type for the value's kind.
    pub fn new(value: impl Into<Value>) -> Self {
        Node {
            value: value.into(),
            ty: None,
        }
    }

    /// Creates a node written under a specific type.
    ///
    /// Fails with [`FormatError::KindMismatch`] if the value's kind differs
    /// from the type's kind.
    pub fn with_type(ty: impl Into<Arc<NodeType>>, value: impl Into<Value>) -> Result<Self, FormatError> {
        let ty = ty.into();
        let value = value.into();
        if ty.kind() != value.kind() {
            return Err(FormatError::KindMismatch {
                xml_tag: ty.xml_tag().to_string(),
                expected: ty.kind(),
                found: value.kind(),
            });
        }
        Ok(Node {
            value,
            ty: normalize(ty),
        })
    }

    /// Creates an empty node of a type, ready to be filled by a decoder.
    pub fn empty(ty: &Arc<NodeType>) -> Self {
        Node {
            value: Value::empty(ty.kind()),
            ty: normalize(Arc::clone(ty)),
        }
    }

    pub fn null() -> Self {
        Node::new(Value::Null)
    }

    pub fn value(&self) -> &Value {
        &self.value
    }

    pub fn value_mut(&mut self) -> &mut Value {
        &mut self.value
    }

    pub fn into_value(self) -> Value {
        self.value
    }

    pub fn kind(&self) -> Kind {
        self.value.kind()
    }

    /// The type descriptor this node is written under.
    pub fn node_type(&self) -> &NodeType {
        match &self.ty {
            Some(ty) => ty,
            None => NodeType::builtin_for(self.kind()),
        }
    }

    /// XML element name for this node.
    ///
    /// Booleans are always written as `true`/`false`; built-in strings
    /// containing non-ASCII characters are written as `ustring`.
    pub fn xml_tag(&self) -> &str {
        match &self.value {
            Value::Boolean(true) => "true",
            Value::Boolean(false) => "false",
            Value::String(s) if self.ty.is_none() && !s.is_ascii() => "ustring",
            _ => self.node_type().xml_tag(),
        }
    }

    /// Binary object class for this node.
    ///
    /// Strings containing non-ASCII characters always use the UTF-16 class.
    pub fn binary_tag(&self) -> u8 {
        match &self.value {
            Value::String(s) if !s.is_ascii() => scalar::UTF16_STRING_TAG,
            _ => self.node_type().binary_tag(),
        }
    }

    /// Element name used for keys when this node is a dictionary.
    pub fn key_tag(&self) -> &str {
        self.node_type().key_tag()
    }

    pub fn is_unique_in_binary(&self) -> bool {
        self.node_type().is_unique_in_binary()
    }

    /// The length recorded in this node's binary object marker: byte count
    /// for data, code unit count for strings, element count for containers,
    /// and the payload width for fixed-size scalars.
    pub fn binary_length(&self) -> usize {
        scalar::marker_length(&self.value)
    }

    /// Writes the object marker and payload of a scalar node.
    ///
    /// Containers are written by the binary encoder, which owns the object
    /// references; passing one here fails with [`FormatError::Unsupported`].
    pub fn write_binary(&self, writer: &mut Writer) -> Result<(), FormatError> {
        scalar::write_scalar(writer, self)
    }

    /// Reads a scalar payload for this node's kind from the reader, given the
    /// marker's class and resolved length.
    pub fn read_binary(&mut self, reader: &mut Reader<'_>, class: u8, length: usize) -> Result<(), FormatError> {
        self.value = scalar::read_scalar(reader, self.kind(), class, length)?;
        Ok(())
    }

    /// Replaces this node's value with one parsed from XML element text.
    ///
    /// `tag` is the element name, which carries the value of booleans.
    pub fn parse_xml_text(&mut self, tag: &str, text: &str) -> Result<(), FormatError> {
        self.value = text::parse_text(self.kind(), tag, text)?;
        Ok(())
    }

    /// Text content of this node's XML element. Empty for booleans and null.
    pub fn to_xml_text(&self) -> Result<String, FormatError> {
        text::format_text(&self.value)
    }

    // === Accessors ===

    pub fn is_null(&self) -> bool {
        matches!(self.value, Value::Null)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self.value {
            Value::Boolean(b) => Some(b),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self.value {
            Value::Integer(i) => Some(i),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self.value {
            Value::Real(r) => Some(r),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match &self.value {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_date(&self) -> Option<Date> {
        match self.value {
            Value::Date(d) => Some(d),
            _ => None,
        }
    }

    pub fn as_data(&self) -> Option<&[u8]> {
        match &self.value {
            Value::Data(d) => Some(d),
            _ => None,
        }
    }

    pub fn as_uid(&self) -> Option<u64> {
        match self.value {
            Value::Uid(u) => Some(u),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[Node]> {
        match &self.value {
            Value::Array(a) => Some(a),
            _ => None,
        }
    }

    pub fn as_array_mut(&mut self) -> Option<&mut Vec<Node>> {
        match &mut self.value {
            Value::Array(a) => Some(a),
            _ => None,
        }
    }

    pub fn as_dictionary(&self) -> Option<&Dictionary> {
        match &self.value {
            Value::Dictionary(d) => Some(d),
            _ => None,
        }
    }

    pub fn as_dictionary_mut(&mut self) -> Option<&mut Dictionary> {
        match &mut self.value {
            Value::Dictionary(d) => Some(d),
            _ => None,
        }
    }

    /// Looks up a dictionary entry. Returns `None` for non-dictionaries.
    pub fn get(&self, key: &str) -> Option<&Node> {
        self.as_dictionary().and_then(|d| d.get(key))
    }
}

fn normalize(ty: Arc<NodeType>) -> Option<Arc<NodeType>> {
    if ty.is_builtin() { None } else { Some(ty) }
}

impl Default for Node {
    fn default() -> Self {
        Node::null()
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("null"),
            Value::Fill => f.write_str("fill"),
            Value::Boolean(b) => write!(f, "{}", b),
            Value::Integer(i) => write!(f, "{}", i),
            Value::Real(r) => write!(f, "{}", r),
            Value::String(s) => f.write_str(s),
            Value::Date(d) => write!(f, "{}", d),
            Value::Data(d) => write!(f, "<{} bytes>", d.len()),
            Value::Uid(u) => write!(f, "{}", u),
            Value::Array(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                f.write_str("]")
            }
            Value::Dictionary(dict) => {
                f.write_str("{")?;
                for (i, (key, value)) in dict.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}: {}", key, value)?;
                }
                f.write_str("}")
            }
        }
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.xml_tag(), self.value)
    }
}

impl Index<&str> for Node {
    type Output = Node;

    /// Panics if this is not a dictionary or the key is missing.
    fn index(&self, key: &str) -> &Node {
        match &self.value {
            Value::Dictionary(d) => &d[key],
            _ => panic!("cannot index {:?} node by key {:?}", self.kind(), key),
        }
    }
}

impl IndexMut<&str> for Node {
    fn index_mut(&mut self, key: &str) -> &mut Node {
        match &mut self.value {
            Value::Dictionary(d) => &mut d[key],
            other => panic!("cannot index {:?} node by key {:?}", other.kind(), key),
        }
    }
}

impl Index<usize> for Node {
    type Output = Node;

    /// Panics if this is not an array or the position is out of bounds.
    fn index(&self, index: usize) -> &Node {
        match &self.value {
            Value::Array(a) => &a[index],
            _ => panic!("cannot index {:?} node by position {}", self.kind(), index),
        }
    }
}

impl IndexMut<usize> for Node {
    fn index_mut(&mut self, index: usize) -> &mut Node {
        match &mut self.value {
            Value::Array(a) => &mut a[index],
            other => panic!("cannot index {:?} node by position {}", other.kind(), index),
        }
    }
}

// =============================================================================
// CONVERSIONS
// =============================================================================

macro_rules! impl_from {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$ty> for Value {
                fn from(v: $ty) -> Self {
                    Value::$variant(v.into())
                }
            }

            impl From<$ty> for Node {
                fn from(v: $ty) -> Self {
                    Node::new(Value::from(v))
                }
            }
        )*
    };
}

impl_from! {
    bool => Boolean,
    i8 => Integer,
    i16 => Integer,
    i32 => Integer,
    i64 => Integer,
    u8 => Integer,
    u16 => Integer,
    u32 => Integer,
    f32 => Real,
    f64 => Real,
    String => String,
    &str => String,
    Date => Date,
    Vec<u8> => Data,
    Vec<Node> => Array,
    Dictionary => Dictionary,
}

impl From<Value> for Node {
    fn from(value: Value) -> Self {
        Node::new(value)
    }
}

impl FromIterator<Node> for Node {
    fn from_iter<I: IntoIterator<Item = Node>>(iter: I) -> Self {
        Node::new(Value::Array(iter.into_iter().collect()))
    }
}
