//! Binary property list encoding/decoding.
//!
//! A binary plist is laid out as:
//!
//! ```text
//! "bplist00" | object table | offset table | trailer (32 bytes)
//! ```
//!
//! Objects reference each other by index into the offset table, using a
//! fixed reference width per document. The trailer records that width, the
//! width of offset table entries, the object count, the index of the root
//! object and where the offset table starts.

use rustc_hash::FxHashMap;
use tracing::debug;

use crate::codec::primitives::{min_width, Reader, Writer};
use crate::codec::scalar::{read_extended_length, write_marker};
use crate::error::FormatError;
use crate::limits::{
    EXTENDED_LENGTH, HEADER_LEN, MAGIC, MAX_DECODED_BYTES, MAX_DECODED_NODES, MAX_DEPTH,
    TRAILER_LEN,
};
use crate::model::{Dictionary, Kind, Node, Value};
use crate::registry::{Registry, RegistryView};

/// Returns true if the input starts with the binary plist magic.
pub fn is_binary(input: &[u8]) -> bool {
    input.len() >= HEADER_LEN && &input[..HEADER_LEN] == MAGIC
}

// =============================================================================
// TRAILER
// =============================================================================

/// The fixed-size record at the end of a binary plist.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Trailer {
    pub sort_version: u8,
    /// Width in bytes of each offset table entry.
    pub offset_size: usize,
    /// Width in bytes of each object reference.
    pub ref_size: usize,
    pub object_count: u64,
    pub top_object: u64,
    pub offset_table_start: u64,
}

impl Trailer {
    /// Reads and validates the trailer of a complete document.
    ///
    /// Every field is checked against the input length before anything is
    /// sized from it.
    pub fn read(input: &[u8]) -> Result<Self, FormatError> {
        let min = HEADER_LEN + TRAILER_LEN;
        if input.len() < min {
            return Err(FormatError::Truncated {
                len: input.len(),
                min,
            });
        }
        if !is_binary(input) {
            let mut found = [0u8; 8];
            found.copy_from_slice(&input[..HEADER_LEN]);
            return Err(FormatError::BadMagic { found });
        }

        let trailer_start = input.len() - TRAILER_LEN;
        let mut reader = Reader::new(&input[trailer_start..]);
        reader.read_bytes(5, "trailer")?;
        let trailer = Trailer {
            sort_version: reader.read_byte("trailer")?,
            offset_size: reader.read_byte("trailer")? as usize,
            ref_size: reader.read_byte("trailer")? as usize,
            object_count: reader.read_uint(8, "trailer")?,
            top_object: reader.read_uint(8, "trailer")?,
            offset_table_start: reader.read_uint(8, "trailer")?,
        };

        if !(1..=8).contains(&trailer.offset_size) {
            return Err(FormatError::InvalidTrailer {
                context: "offset size must be 1 to 8 bytes",
            });
        }
        if !(1..=8).contains(&trailer.ref_size) {
            return Err(FormatError::InvalidTrailer {
                context: "object reference size must be 1 to 8 bytes",
            });
        }
        if trailer.object_count == 0 {
            return Err(FormatError::InvalidTrailer {
                context: "document has no objects",
            });
        }
        if trailer.top_object >= trailer.object_count {
            return Err(FormatError::InvalidTrailer {
                context: "top object index out of range",
            });
        }
        if trailer.offset_table_start < HEADER_LEN as u64 {
            return Err(FormatError::InvalidTrailer {
                context: "offset table overlaps header",
            });
        }
        let table_end = trailer
            .object_count
            .checked_mul(trailer.offset_size as u64)
            .and_then(|len| len.checked_add(trailer.offset_table_start))
            .ok_or(FormatError::InvalidTrailer {
                context: "offset table size overflows",
            })?;
        if table_end > trailer_start as u64 {
            return Err(FormatError::InvalidTrailer {
                context: "offset table extends past trailer",
            });
        }
        Ok(trailer)
    }

    fn write(&self, writer: &mut Writer) {
        writer.write_bytes(&[0; 5]);
        writer.write_byte(self.sort_version);
        writer.write_byte(self.offset_size as u8);
        writer.write_byte(self.ref_size as u8);
        writer.write_uint(self.object_count, 8);
        writer.write_uint(self.top_object, 8);
        writer.write_uint(self.offset_table_start, 8);
    }
}

// =============================================================================
// DECODING
// =============================================================================

/// Decodes a binary plist using the global registry.
pub fn decode_binary(input: &[u8]) -> Result<Node, FormatError> {
    decode_binary_with(input, Registry::global())
}

/// Decodes a binary plist, resolving object classes through `registry`.
///
/// The registry stays read-locked for the duration of the decode.
pub fn decode_binary_with(input: &[u8], registry: &Registry) -> Result<Node, FormatError> {
    let trailer = Trailer::read(input)?;
    // Bounded by the input length: Trailer::read checked the table fits.
    let count = trailer.object_count as usize;
    let start = trailer.offset_table_start as usize;

    let mut reader = Reader::new(input);
    reader.seek(start, "offset table")?;
    let mut offsets = Vec::with_capacity(count);
    for index in 0..count {
        let offset = reader.read_uint(trailer.offset_size, "offset table")?;
        if offset < HEADER_LEN as u64 || offset >= trailer.offset_table_start {
            return Err(FormatError::InvalidOffset { index, offset });
        }
        offsets.push(offset as usize);
    }

    debug!(
        objects = count,
        offset_size = trailer.offset_size,
        ref_size = trailer.ref_size,
        top = trailer.top_object,
        "decoding binary plist"
    );

    let mut decoder = Decoder {
        objects: &input[..start],
        registry: registry.read(),
        offsets,
        ref_size: trailer.ref_size,
        states: vec![State::Pending; count],
        resolved: FxHashMap::default(),
        nodes: 0,
        bytes: 0,
    };
    decoder.decode(trailer.top_object as usize)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Pending,
    InProgress,
}

/// Resolves objects on demand from the offset table.
///
/// Scalars are decoded once and cloned at each further reference.
/// Containers are decoded afresh per reference, so the tree is owned; the
/// node and byte budgets bound the expansion of heavily shared objects.
///
/// Nesting is walked with an explicit stack of open containers, so depth
/// costs heap rather than call stack.
struct Decoder<'a, 'r> {
    /// Header and object table; objects may not read into the offset table.
    objects: &'a [u8],
    registry: RegistryView<'r>,
    offsets: Vec<usize>,
    ref_size: usize,
    states: Vec<State>,
    resolved: FxHashMap<usize, Node>,
    nodes: usize,
    bytes: usize,
}

/// Result of reading one object's marker and payload.
enum Opened {
    /// A scalar or an empty container.
    Node(Node),
    /// A container with at least one child, and the index of that child.
    Container(OpenContainer, usize),
}

/// A container whose children are still being decoded.
struct OpenContainer {
    index: usize,
    /// Empty node carrying the container's type.
    node: Node,
    /// Child references in decode order. Dictionaries alternate key, value.
    refs: Vec<usize>,
    next: usize,
    partial: Partial,
}

enum Partial {
    Array(Vec<Node>),
    Dictionary {
        entries: Dictionary,
        key: Option<String>,
    },
}

impl OpenContainer {
    fn next_child(&mut self) -> Option<usize> {
        let child = self.refs.get(self.next).copied()?;
        self.next += 1;
        Some(child)
    }

    fn accept(&mut self, child: Node) -> Result<(), FormatError> {
        match &mut self.partial {
            Partial::Array(items) => items.push(child),
            Partial::Dictionary { entries, key } => match key.take() {
                None => match child.into_value() {
                    Value::String(name) => *key = Some(name),
                    other => return Err(FormatError::InvalidKey { found: other.kind() }),
                },
                Some(name) => {
                    if entries.contains_key(&name) {
                        return Err(FormatError::DuplicateKey { key: name });
                    }
                    entries.insert(name, child);
                }
            },
        }
        Ok(())
    }

    fn finish(self) -> Node {
        let mut node = self.node;
        *node.value_mut() = match self.partial {
            Partial::Array(items) => Value::Array(items),
            Partial::Dictionary { entries, .. } => Value::Dictionary(entries),
        };
        node
    }
}

impl Decoder<'_, '_> {
    fn decode(&mut self, top: usize) -> Result<Node, FormatError> {
        let mut stack: Vec<OpenContainer> = Vec::new();
        let mut next = top;
        loop {
            let mut node = match self.open(next, stack.len())? {
                Opened::Node(node) => node,
                Opened::Container(container, child) => {
                    stack.push(container);
                    next = child;
                    continue;
                }
            };
            // Hand the node to its parent, closing every container it completes.
            loop {
                let Some(mut parent) = stack.pop() else {
                    return Ok(node);
                };
                parent.accept(node)?;
                if let Some(child) = parent.next_child() {
                    stack.push(parent);
                    next = child;
                    break;
                }
                self.states[parent.index] = State::Pending;
                node = parent.finish();
            }
        }
    }

    /// Reads the object at `index`, found at nesting `depth`.
    fn open(&mut self, index: usize, depth: usize) -> Result<Opened, FormatError> {
        if depth > MAX_DEPTH {
            return Err(FormatError::NestingTooDeep { max: MAX_DEPTH });
        }
        if let Some(node) = self.resolved.get(&index) {
            let node = node.clone();
            self.charge(&node)?;
            return Ok(Opened::Node(node));
        }
        if self.states[index] == State::InProgress {
            return Err(FormatError::CyclicReference { index });
        }

        let mut reader = Reader::new(self.objects);
        reader.seek(self.offsets[index], "object")?;
        let marker = reader.read_byte("object marker")?;
        let class = marker >> 4;
        let nibble = marker & 0x0F;
        let mut node = self.registry.create_from_binary_tag(class, nibble)?;
        let kind = node.kind();
        let length = if kind.has_counted_length() && nibble == EXTENDED_LENGTH {
            read_extended_length(&mut reader)?
        } else {
            nibble as usize
        };

        let (refs, partial) = match kind {
            Kind::Array => {
                let refs = self.read_refs(&mut reader, length)?;
                (refs, Partial::Array(Vec::with_capacity(length)))
            }
            Kind::Dictionary => {
                let pairs = length.checked_mul(2).ok_or(FormatError::InvalidLength {
                    context: "dictionary entries",
                    length: length as u64,
                })?;
                let refs = self.read_refs(&mut reader, pairs)?;
                let (keys, values) = refs.split_at(length);
                let interleaved = keys
                    .iter()
                    .zip(values)
                    .flat_map(|(&key, &value)| [key, value])
                    .collect();
                let partial = Partial::Dictionary {
                    entries: Dictionary::with_capacity(length),
                    key: None,
                };
                (interleaved, partial)
            }
            _ => {
                node.read_binary(&mut reader, class, length)?;
                self.charge(&node)?;
                self.resolved.insert(index, node.clone());
                return Ok(Opened::Node(node));
            }
        };

        self.charge(&node)?;
        let mut container = OpenContainer {
            index,
            node,
            refs,
            next: 0,
            partial,
        };
        match container.next_child() {
            Some(child) => {
                self.states[index] = State::InProgress;
                Ok(Opened::Container(container, child))
            }
            None => Ok(Opened::Node(container.finish())),
        }
    }

    /// Reads `count` object references after checking they fit in the input.
    fn read_refs(&self, reader: &mut Reader<'_>, count: usize) -> Result<Vec<usize>, FormatError> {
        let needed = count.checked_mul(self.ref_size);
        if needed.is_none_or(|n| n > reader.remaining_len()) {
            return Err(FormatError::UnexpectedEof {
                context: "object references",
            });
        }
        let mut refs = Vec::with_capacity(count);
        for _ in 0..count {
            let reference = reader.read_uint(self.ref_size, "object reference")?;
            if reference >= self.offsets.len() as u64 {
                return Err(FormatError::InvalidReference {
                    reference,
                    count: self.offsets.len(),
                });
            }
            refs.push(reference as usize);
        }
        Ok(refs)
    }

    fn charge(&mut self, node: &Node) -> Result<(), FormatError> {
        self.nodes += 1;
        if self.nodes > MAX_DECODED_NODES {
            return Err(FormatError::TooManyNodes {
                max: MAX_DECODED_NODES,
                unit: "nodes",
            });
        }
        self.bytes += match node.value() {
            Value::String(s) => s.len(),
            Value::Data(d) => d.len(),
            _ => 0,
        };
        if self.bytes > MAX_DECODED_BYTES {
            return Err(FormatError::TooManyNodes {
                max: MAX_DECODED_BYTES,
                unit: "bytes",
            });
        }
        Ok(())
    }
}

// =============================================================================
// ENCODING
// =============================================================================

/// Encodes a node tree as a binary plist.
///
/// Equal scalars of unique-in-binary types are written once and shared by
/// reference. The root is always object 0.
pub fn encode_binary(root: &Node) -> Result<Vec<u8>, FormatError> {
    let mut flattener = Flattener::default();
    let top = flattener.flatten(root)?;
    let objects = flattener.objects;
    let count = objects.len();

    // Reference width is fixed before layout: it depends only on the count.
    let ref_size = min_width(count as u64 - 1);

    let mut writer = Writer::new();
    writer.write_bytes(MAGIC);
    let mut offsets = Vec::with_capacity(count);
    for object in &objects {
        offsets.push(writer.len() as u64);
        match object {
            Object::Scalar(bytes) => writer.write_bytes(bytes),
            Object::Array { class, refs } => {
                write_marker(&mut writer, *class, refs.len())?;
                for &r in refs {
                    writer.write_uint(r as u64, ref_size);
                }
            }
            Object::Dictionary { class, keys, values } => {
                write_marker(&mut writer, *class, keys.len())?;
                for &r in keys.iter().chain(values) {
                    writer.write_uint(r as u64, ref_size);
                }
            }
        }
    }

    // Offset width is chosen once the object table is laid out. The table
    // follows every object, so its start bounds every offset in it.
    let offset_table_start = writer.len() as u64;
    let offset_size = min_width(offset_table_start);
    debug_assert!(offsets.iter().all(|&o| min_width(o) <= offset_size));
    for offset in offsets {
        writer.write_uint(offset, offset_size);
    }

    Trailer {
        sort_version: 0,
        offset_size,
        ref_size,
        object_count: count as u64,
        top_object: top as u64,
        offset_table_start,
    }
    .write(&mut writer);

    debug!(
        objects = count,
        offset_size,
        ref_size,
        bytes = writer.len(),
        "encoded binary plist"
    );
    Ok(writer.into_bytes())
}

/// An entry in the object table before references are sized.
#[derive(Debug)]
enum Object {
    /// Marker and payload, already encoded.
    Scalar(Vec<u8>),
    Array { class: u8, refs: Vec<usize> },
    Dictionary { class: u8, keys: Vec<usize>, values: Vec<usize> },
}

/// Assigns object indices in first-encounter order.
#[derive(Debug, Default)]
struct Flattener {
    objects: Vec<Object>,
    /// Uniquing table: encoded scalar bytes to object index.
    unique: FxHashMap<Vec<u8>, usize>,
}

/// A container whose children are still being assigned indices.
struct PendingContainer<'a> {
    index: usize,
    class: u8,
    /// Key indices, for dictionaries.
    keys: Option<Vec<usize>>,
    children: Vec<&'a Node>,
    refs: Vec<usize>,
}

impl<'a> PendingContainer<'a> {
    fn next_child(&self) -> Option<&'a Node> {
        self.children.get(self.refs.len()).copied()
    }
}

enum Entered<'a> {
    Done(usize),
    Open(PendingContainer<'a>, &'a Node),
}

impl Flattener {
    fn flatten(&mut self, root: &Node) -> Result<usize, FormatError> {
        let mut stack: Vec<PendingContainer<'_>> = Vec::new();
        let mut next = root;
        loop {
            let mut index = match self.enter(next, stack.len())? {
                Entered::Done(index) => index,
                Entered::Open(pending, child) => {
                    stack.push(pending);
                    next = child;
                    continue;
                }
            };
            loop {
                let Some(mut parent) = stack.pop() else {
                    return Ok(index);
                };
                parent.refs.push(index);
                if let Some(child) = parent.next_child() {
                    stack.push(parent);
                    next = child;
                    break;
                }
                index = self.close(parent);
            }
        }
    }

    fn enter<'a>(&mut self, node: &'a Node, depth: usize) -> Result<Entered<'a>, FormatError> {
        if depth > MAX_DEPTH {
            return Err(FormatError::NestingTooDeep { max: MAX_DEPTH });
        }
        let class = node.binary_tag();
        if class > 0x0F {
            return Err(FormatError::BinaryTagOutOfRange { tag: class });
        }
        let pending = match node.value() {
            Value::Array(items) => PendingContainer {
                index: self.reserve(),
                class,
                keys: None,
                children: items.iter().collect(),
                refs: Vec::with_capacity(items.len()),
            },
            Value::Dictionary(dict) => {
                let index = self.reserve();
                let keys = dict
                    .keys()
                    .map(|key| self.flatten_scalar(&Node::from(key)))
                    .collect::<Result<Vec<_>, _>>()?;
                PendingContainer {
                    index,
                    class,
                    keys: Some(keys),
                    children: dict.values().collect(),
                    refs: Vec::with_capacity(dict.len()),
                }
            }
            _ => return Ok(Entered::Done(self.flatten_scalar(node)?)),
        };
        match pending.next_child() {
            Some(child) => Ok(Entered::Open(pending, child)),
            None => Ok(Entered::Done(self.close(pending))),
        }
    }

    fn close(&mut self, pending: PendingContainer<'_>) -> usize {
        let class = pending.class;
        self.objects[pending.index] = match pending.keys {
            Some(keys) => Object::Dictionary {
                class,
                keys,
                values: pending.refs,
            },
            None => Object::Array {
                class,
                refs: pending.refs,
            },
        };
        pending.index
    }

    fn flatten_scalar(&mut self, node: &Node) -> Result<usize, FormatError> {
        let mut writer = Writer::new();
        node.write_binary(&mut writer)?;
        let bytes = writer.into_bytes();
        if !node.is_unique_in_binary() {
            self.objects.push(Object::Scalar(bytes));
            return Ok(self.objects.len() - 1);
        }
        if let Some(&index) = self.unique.get(&bytes) {
            return Ok(index);
        }
        let index = self.objects.len();
        self.unique.insert(bytes.clone(), index);
        self.objects.push(Object::Scalar(bytes));
        Ok(index)
    }

    fn reserve(&mut self) -> usize {
        self.objects.push(Object::Scalar(Vec::new()));
        self.objects.len() - 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Date, NodeType};
    use crate::testing::arb_node;
    use proptest::prelude::*;

    fn dict(entries: Vec<(&str, Node)>) -> Node {
        Node::from(entries.into_iter().collect::<Dictionary>())
    }

    fn trailer_of(bytes: &[u8]) -> Trailer {
        Trailer::read(bytes).unwrap()
    }

    /// Assembles a document from pre-encoded objects. References inside the
    /// objects must already use `ref_size` bytes.
    fn assemble(objects: &[Vec<u8>], ref_size: u8, top: u64) -> Vec<u8> {
        let mut out = MAGIC.to_vec();
        let mut offsets = Vec::new();
        for object in objects {
            offsets.push(out.len() as u64);
            out.extend_from_slice(object);
        }
        let start = out.len() as u64;
        let offset_size = min_width(start);
        for offset in offsets {
            out.extend_from_slice(&offset.to_be_bytes()[8 - offset_size..]);
        }
        out.extend_from_slice(&[0; 6]);
        out.push(offset_size as u8);
        out.push(ref_size);
        out.extend_from_slice(&(objects.len() as u64).to_be_bytes());
        out.extend_from_slice(&top.to_be_bytes());
        out.extend_from_slice(&start.to_be_bytes());
        out
    }

    /// Overwrites one of the trailer's u64 fields: 0 = count, 1 = top,
    /// 2 = offset table start.
    fn patch_trailer(bytes: &mut [u8], field: usize, value: u64) {
        let at = bytes.len() - 24 + field * 8;
        bytes[at..at + 8].copy_from_slice(&value.to_be_bytes());
    }

    #[test]
    fn test_roundtrip_all_kinds() {
        let root = dict(vec![
            ("bool", Node::from(true)),
            ("false", Node::from(false)),
            ("int", Node::from(-42)),
            ("big", Node::from(i64::MAX)),
            ("real", Node::from(2.5)),
            ("string", Node::from("hello")),
            ("unicode", Node::from("😂test")),
            ("date", Node::from(Date::from_apple_seconds(330_000_000.0))),
            ("data", Node::from(vec![0u8, 1, 2, 255])),
            ("uid", Node::new(Value::Uid(0x1234))),
            ("null", Node::null()),
            ("array", Node::from_iter([Node::from(1), Node::from("two")])),
            ("empty_array", Node::from(Vec::<Node>::new())),
            ("empty_dict", Node::from(Dictionary::new())),
            ("nested", dict(vec![("inner", dict(vec![("deep", Node::from(1))]))])),
        ]);
        let bytes = encode_binary(&root).unwrap();
        assert_eq!(&bytes[..8], b"bplist00");
        let decoded = decode_binary_with(&bytes, &Registry::new()).unwrap();
        assert_eq!(decoded, root);
        let keys: Vec<_> = decoded.as_dictionary().unwrap().keys().collect();
        assert_eq!(keys[0], "bool");
        assert_eq!(keys[14], "nested");
    }

    #[test]
    fn test_scalar_root() {
        for root in [Node::from(7), Node::from("solo"), Node::null(), Node::from(false)] {
            let bytes = encode_binary(&root).unwrap();
            assert_eq!(trailer_of(&bytes).object_count, 1);
            assert_eq!(decode_binary_with(&bytes, &Registry::new()).unwrap(), root);
        }
    }

    #[test]
    fn test_fill_roundtrip() {
        let root = Node::from_iter([Node::new(Value::Fill), Node::from(1)]);
        let bytes = encode_binary(&root).unwrap();
        assert_eq!(decode_binary_with(&bytes, &Registry::new()).unwrap(), root);
    }

    #[test]
    fn test_exact_layout() {
        let root = dict(vec![("a", Node::from(1))]);
        let bytes = encode_binary(&root).unwrap();
        let mut expected = b"bplist00".to_vec();
        expected.extend_from_slice(&[0xD1, 0x01, 0x02]); // dict, key ref 1, value ref 2
        expected.extend_from_slice(&[0x51, b'a']);
        expected.extend_from_slice(&[0x10, 0x01]);
        expected.extend_from_slice(&[0x08, 0x0B, 0x0D]); // offsets
        expected.extend_from_slice(&[0, 0, 0, 0, 0, 0, 1, 1]);
        expected.extend_from_slice(&3u64.to_be_bytes());
        expected.extend_from_slice(&0u64.to_be_bytes());
        expected.extend_from_slice(&15u64.to_be_bytes());
        assert_eq!(bytes, expected);
    }

    #[test]
    fn test_dedup_equal_scalars() {
        let root = dict(vec![("a", Node::from("x")), ("b", Node::from("x"))]);
        let bytes = encode_binary(&root).unwrap();
        assert_eq!(trailer_of(&bytes).object_count, 4);

        let decoded = decode_binary_with(&bytes, &Registry::new()).unwrap();
        assert_eq!(decoded["a"].as_str(), Some("x"));
        assert_eq!(decoded["b"].as_str(), Some("x"));
    }

    #[test]
    fn test_keys_share_objects_with_values() {
        let root = dict(vec![("same", Node::from("same"))]);
        let bytes = encode_binary(&root).unwrap();
        assert_eq!(trailer_of(&bytes).object_count, 2);
    }

    #[test]
    fn test_containers_not_deduplicated() {
        let empty = Node::from(Vec::<Node>::new());
        let root = Node::from_iter([empty.clone(), empty.clone(), Node::null(), Node::null()]);
        let bytes = encode_binary(&root).unwrap();
        assert_eq!(trailer_of(&bytes).object_count, 5);
        assert_eq!(decode_binary_with(&bytes, &Registry::new()).unwrap(), root);
    }

    #[test]
    fn test_ref_size_boundaries() {
        // 255 distinct integers plus the array: highest index 255.
        let root: Node = (0..255).map(Node::from).collect();
        let bytes = encode_binary(&root).unwrap();
        let trailer = trailer_of(&bytes);
        assert_eq!(trailer.object_count, 256);
        assert_eq!(trailer.ref_size, 1);

        // One more object: highest index 256 needs two bytes.
        let root: Node = (0..256).map(Node::from).collect();
        let bytes = encode_binary(&root).unwrap();
        let trailer = trailer_of(&bytes);
        assert_eq!(trailer.object_count, 257);
        assert_eq!(trailer.ref_size, 2);
        assert_eq!(decode_binary_with(&bytes, &Registry::new()).unwrap(), root);
    }

    #[test]
    fn test_ref_size_four_bytes() {
        let root: Node = (0..65_535).map(Node::from).collect();
        let trailer = trailer_of(&encode_binary(&root).unwrap());
        assert_eq!(trailer.object_count, 65_536);
        assert_eq!(trailer.ref_size, 2);

        let root: Node = (0..65_536).map(Node::from).collect();
        let bytes = encode_binary(&root).unwrap();
        let trailer = trailer_of(&bytes);
        assert_eq!(trailer.object_count, 65_537);
        assert_eq!(trailer.ref_size, 4);
        assert_eq!(trailer.offset_size, 4);
        assert_eq!(decode_binary_with(&bytes, &Registry::new()).unwrap(), root);
    }

    #[test]
    fn test_offset_size_boundaries() {
        // Data objects of n >= 15 bytes take n + 3 bytes below 256 and
        // n + 4 bytes up to 65535, after the 8-byte header.
        for (payload, start, width) in [
            (244, 255, 1),
            (245, 256, 2),
            (65_523, 65_535, 2),
            (65_524, 65_536, 4),
        ] {
            let root = Node::from(vec![0u8; payload]);
            let bytes = encode_binary(&root).unwrap();
            let trailer = trailer_of(&bytes);
            assert_eq!(trailer.offset_table_start, start);
            assert_eq!(trailer.offset_size, width);
            assert_eq!(decode_binary_with(&bytes, &Registry::new()).unwrap(), root);
        }
    }

    #[test]
    fn test_large_dictionary() {
        let root = Node::from(
            (0..300)
                .map(|i| (format!("key{i}"), Node::from(i)))
                .collect::<Dictionary>(),
        );
        let bytes = encode_binary(&root).unwrap();
        assert_eq!(decode_binary_with(&bytes, &Registry::new()).unwrap(), root);
    }

    #[test]
    fn test_custom_types_roundtrip() {
        let registry = Registry::new();
        let short_int = NodeType::custom(Kind::Integer, "i", 0xC);
        let custom_dict = NodeType::custom(Kind::Dictionary, "Custom", 0x7).with_key_tag("k");
        let tag = NodeType::custom(Kind::String, "s", 0x9);
        registry.register(short_int.clone()).unwrap();
        registry.register(custom_dict.clone()).unwrap();
        registry.register(tag.clone()).unwrap();

        let mut entries = Dictionary::new();
        entries.insert("int-value", Node::with_type(short_int, 42).unwrap());
        entries.insert("plain", Node::from(42));
        entries.insert("tag", Node::with_type(tag, "Hello, World!").unwrap());
        let root = Node::with_type(custom_dict, entries).unwrap();

        let bytes = encode_binary(&root).unwrap();
        assert_eq!(bytes[8] >> 4, 0x7);
        let decoded = decode_binary_with(&bytes, &registry).unwrap();
        assert_eq!(decoded, root);
        assert_eq!(decoded["int-value"].xml_tag(), "i");
        assert_eq!(decoded["plain"].xml_tag(), "integer");
    }

    #[test]
    fn test_custom_type_unknown_to_registry() {
        let root = Node::with_type(NodeType::custom(Kind::Integer, "i", 0xC), 1).unwrap();
        let bytes = encode_binary(&root).unwrap();
        assert_eq!(
            decode_binary_with(&bytes, &Registry::new()),
            Err(FormatError::UnknownBinaryTag { tag: 0xC, length: 0 })
        );
    }

    #[test]
    fn test_encode_rejects_wide_tag() {
        let root = Node::with_type(NodeType::custom(Kind::Integer, "wide", 0x10), 1).unwrap();
        assert_eq!(
            encode_binary(&root),
            Err(FormatError::BinaryTagOutOfRange { tag: 0x10 })
        );
    }

    #[test]
    fn test_encode_rejects_deep_nesting() {
        on_small_stack(|| {
            let mut node = Node::from(1);
            for _ in 0..MAX_DEPTH + 1 {
                node = Node::from(vec![node]);
            }
            assert_eq!(
                encode_binary(&node),
                Err(FormatError::NestingTooDeep { max: MAX_DEPTH })
            );
        });
    }

    #[test]
    fn test_shared_container_decodes_twice() {
        let bytes = assemble(&[vec![0xA2, 1, 1], vec![0xA1, 2], vec![0x10, 5]], 1, 0);
        let decoded = decode_binary_with(&bytes, &Registry::new()).unwrap();
        let inner = Node::from(vec![Node::from(5)]);
        assert_eq!(decoded, Node::from(vec![inner.clone(), inner]));
    }

    #[test]
    fn test_bad_magic() {
        let mut bytes = encode_binary(&Node::from(1)).unwrap();
        bytes[7] = b'1';
        assert_eq!(
            decode_binary(&bytes),
            Err(FormatError::BadMagic { found: *b"bplist01" })
        );
    }

    #[test]
    fn test_truncated_input() {
        assert_eq!(
            decode_binary(b"bplist00"),
            Err(FormatError::Truncated { len: 8, min: 40 })
        );
        let bytes = encode_binary(&Node::from(1)).unwrap();
        assert!(matches!(
            decode_binary(&bytes[..bytes.len() - 1]),
            Err(FormatError::InvalidTrailer { .. })
        ));
    }

    #[test]
    fn test_hostile_object_count() {
        let mut bytes = encode_binary(&Node::from(1)).unwrap();
        patch_trailer(&mut bytes, 0, 1 << 40);
        assert!(matches!(
            decode_binary(&bytes),
            Err(FormatError::InvalidTrailer { .. })
        ));

        patch_trailer(&mut bytes, 0, u64::MAX);
        assert_eq!(
            decode_binary(&bytes),
            Err(FormatError::InvalidTrailer {
                context: "offset table size overflows"
            })
        );

        patch_trailer(&mut bytes, 0, 0);
        assert!(matches!(
            decode_binary(&bytes),
            Err(FormatError::InvalidTrailer { .. })
        ));
    }

    #[test]
    fn test_hostile_offset_table_start() {
        let mut bytes = encode_binary(&Node::from(1)).unwrap();
        let len = bytes.len() as u64;
        patch_trailer(&mut bytes, 2, len);
        assert!(matches!(
            decode_binary(&bytes),
            Err(FormatError::InvalidTrailer { .. })
        ));

        patch_trailer(&mut bytes, 2, u64::MAX);
        assert!(matches!(
            decode_binary(&bytes),
            Err(FormatError::InvalidTrailer { .. })
        ));

        patch_trailer(&mut bytes, 2, 2);
        assert!(matches!(
            decode_binary(&bytes),
            Err(FormatError::InvalidTrailer { .. })
        ));
    }

    #[test]
    fn test_hostile_top_object() {
        let mut bytes = encode_binary(&Node::from(1)).unwrap();
        patch_trailer(&mut bytes, 1, 1);
        assert_eq!(
            decode_binary(&bytes),
            Err(FormatError::InvalidTrailer {
                context: "top object index out of range"
            })
        );
    }

    #[test]
    fn test_invalid_widths() {
        let mut bytes = encode_binary(&Node::from(1)).unwrap();
        let at = bytes.len() - 26;
        bytes[at] = 0;
        assert!(matches!(
            decode_binary(&bytes),
            Err(FormatError::InvalidTrailer { .. })
        ));
        bytes[at] = 1;
        bytes[at + 1] = 9;
        assert!(matches!(
            decode_binary(&bytes),
            Err(FormatError::InvalidTrailer { .. })
        ));
    }

    #[test]
    fn test_offset_outside_object_table() {
        let mut bytes = assemble(&[vec![0x10, 1]], 1, 0);
        let start = bytes.len() - TRAILER_LEN - 1;
        bytes[start] = start as u8;
        assert_eq!(
            decode_binary(&bytes),
            Err(FormatError::InvalidOffset {
                index: 0,
                offset: start as u64
            })
        );
    }

    #[test]
    fn test_reference_out_of_range() {
        let bytes = assemble(&[vec![0xA1, 5]], 1, 0);
        assert_eq!(
            decode_binary(&bytes),
            Err(FormatError::InvalidReference {
                reference: 5,
                count: 1
            })
        );
    }

    #[test]
    fn test_self_reference_is_cycle() {
        let bytes = assemble(&[vec![0xA1, 0]], 1, 0);
        assert_eq!(
            decode_binary(&bytes),
            Err(FormatError::CyclicReference { index: 0 })
        );
    }

    #[test]
    fn test_transitive_cycle() {
        let bytes = assemble(&[vec![0xA1, 1], vec![0xD1, 2, 0], vec![0x51, b'k']], 1, 0);
        assert_eq!(
            decode_binary(&bytes),
            Err(FormatError::CyclicReference { index: 0 })
        );
    }

    /// `depth` one-element arrays wrapped around an empty array, which sits
    /// at nesting level `depth`.
    fn nested_arrays(depth: usize) -> Vec<u8> {
        let mut objects: Vec<Vec<u8>> = (0..depth)
            .map(|i| {
                let mut object = vec![0xA1];
                object.extend_from_slice(&((i + 1) as u16).to_be_bytes());
                object
            })
            .collect();
        objects.push(vec![0xA0]);
        assemble(&objects, 2, 0)
    }

    /// Runs `f` on a thread with a 2 MiB stack, the default for spawned threads.
    fn on_small_stack(f: impl FnOnce() + Send + 'static) {
        std::thread::Builder::new()
            .stack_size(2 << 20)
            .spawn(f)
            .unwrap()
            .join()
            .unwrap();
    }

    #[test]
    fn test_deep_nesting_rejected() {
        on_small_stack(|| {
            let bytes = nested_arrays(MAX_DEPTH + 1);
            assert_eq!(
                decode_binary_with(&bytes, &Registry::new()),
                Err(FormatError::NestingTooDeep { max: MAX_DEPTH })
            );
        });
    }

    #[test]
    fn test_max_depth_on_small_stack() {
        on_small_stack(|| {
            let bytes = nested_arrays(MAX_DEPTH);
            let root = decode_binary_with(&bytes, &Registry::new()).unwrap();

            let mut depth = 0;
            let mut node = &root;
            while let Some([inner]) = node.as_array() {
                node = inner;
                depth += 1;
            }
            assert_eq!(depth, MAX_DEPTH);
            assert_eq!(node.as_array().map(<[Node]>::len), Some(0));

            let reencoded = encode_binary(&root).unwrap();
            assert_eq!(reencoded, bytes);
        });
    }

    #[test]
    fn test_exponential_sharing_rejected() {
        // Each array holds 14 references to the next: 14^6 leaves.
        let mut objects: Vec<Vec<u8>> = (0..6u8)
            .map(|i| {
                let mut object = vec![0xAE];
                object.extend(std::iter::repeat_n(i + 1, 14));
                object
            })
            .collect();
        objects.push(vec![0x10, 1]);
        let bytes = assemble(&objects, 1, 0);
        assert_eq!(
            decode_binary(&bytes),
            Err(FormatError::TooManyNodes {
                max: MAX_DECODED_NODES,
                unit: "nodes"
            })
        );
    }

    #[test]
    fn test_hostile_extended_lengths() {
        // Array claiming 2^40 elements.
        let mut array = vec![0xAF, 0x13];
        array.extend_from_slice(&(1u64 << 40).to_be_bytes());
        let bytes = assemble(&[array], 1, 0);
        assert_eq!(
            decode_binary(&bytes),
            Err(FormatError::UnexpectedEof {
                context: "object references"
            })
        );

        // String claiming 2^40 bytes.
        let mut string = vec![0x5F, 0x13];
        string.extend_from_slice(&(1u64 << 40).to_be_bytes());
        let bytes = assemble(&[string], 1, 0);
        assert_eq!(
            decode_binary(&bytes),
            Err(FormatError::UnexpectedEof {
                context: "ascii string"
            })
        );

        // Negative extended length.
        let mut data = vec![0x4F, 0x13];
        data.extend_from_slice(&u64::MAX.to_be_bytes());
        let bytes = assemble(&[data], 1, 0);
        assert!(matches!(
            decode_binary(&bytes),
            Err(FormatError::InvalidLength { .. })
        ));
    }

    #[test]
    fn test_duplicate_key_rejected() {
        let bytes = assemble(
            &[vec![0xD2, 1, 1, 2, 2], vec![0x51, b'k'], vec![0x09]],
            1,
            0,
        );
        assert_eq!(
            decode_binary(&bytes),
            Err(FormatError::DuplicateKey { key: "k".into() })
        );
    }

    #[test]
    fn test_non_string_key_rejected() {
        let bytes = assemble(&[vec![0xD1, 1, 1], vec![0x10, 3]], 1, 0);
        assert_eq!(
            decode_binary(&bytes),
            Err(FormatError::InvalidKey {
                found: Kind::Integer
            })
        );
    }

    #[test]
    fn test_unknown_class() {
        let bytes = assemble(&[vec![0x70]], 1, 0);
        assert_eq!(
            decode_binary_with(&bytes, &Registry::new()),
            Err(FormatError::UnknownBinaryTag { tag: 0x7, length: 0 })
        );
    }

    #[test]
    fn test_object_reads_stop_at_offset_table() {
        // The marker claims three bytes but only one precedes the table.
        let bytes = assemble(&[vec![0x53, b'a']], 1, 0);
        assert_eq!(
            decode_binary(&bytes),
            Err(FormatError::UnexpectedEof {
                context: "ascii string"
            })
        );
    }

    proptest! {
        #[test]
        fn prop_binary_roundtrip(root in arb_node()) {
            let bytes = encode_binary(&root).unwrap();
            let decoded = decode_binary_with(&bytes, &Registry::new()).unwrap();
            prop_assert_eq!(decoded, root);
        }
    }
}
