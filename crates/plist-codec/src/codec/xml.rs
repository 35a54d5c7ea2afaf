//! XML property list encoding/decoding.
//!
//! Element names map to node types through the registry. Dictionaries
//! alternate key elements (named by the dictionary's key tag) with value
//! elements. Scalars carry their value as element text, except booleans and
//! null, which are empty elements.

use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use tracing::debug;

use crate::error::FormatError;
use crate::limits::{MAX_DEPTH, XML_DOCTYPE};
use crate::model::{Dictionary, Kind, Node, Value};
use crate::registry::{Registry, RegistryView};

const PLIST_TAG: &str = "plist";
const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

// =============================================================================
// DECODING
// =============================================================================

/// Decodes an XML plist using the global registry.
pub fn decode_xml(input: &[u8]) -> Result<Node, FormatError> {
    decode_xml_with(input, Registry::global())
}

/// Decodes an XML plist, resolving element names through `registry`.
///
/// The root may be a `plist` element wrapping one value, or a bare value
/// element.
pub fn decode_xml_with(input: &[u8], registry: &Registry) -> Result<Node, FormatError> {
    let input = input.strip_prefix(UTF8_BOM).unwrap_or(input);
    let text = std::str::from_utf8(input).map_err(|_| FormatError::InvalidString {
        context: "XML document",
    })?;

    let mut decoder = XmlDecoder {
        reader: quick_xml::Reader::from_str(text),
        registry: registry.read(),
    };
    let root = match decoder.next_token("document")? {
        Token::Start(name) if name == PLIST_TAG => {
            let root = match decoder.next_token("plist")? {
                Token::Start(name) => decoder.decode_value(name, false)?,
                Token::Empty(name) => decoder.decode_value(name, true)?,
                Token::End(_) | Token::Eof => {
                    return Err(FormatError::UnexpectedEof { context: "plist" });
                }
            };
            match decoder.next_token("plist")? {
                Token::End(_) => {}
                Token::Start(found) | Token::Empty(found) => {
                    return Err(FormatError::UnexpectedElement {
                        found,
                        context: "plist",
                    });
                }
                Token::Eof => return Err(FormatError::UnexpectedEof { context: "plist" }),
            }
            root
        }
        Token::Start(name) => decoder.decode_value(name, false)?,
        Token::Empty(name) => decoder.decode_value(name, true)?,
        Token::End(_) | Token::Eof => {
            return Err(FormatError::UnexpectedEof { context: "document" });
        }
    };
    match decoder.next_token("document")? {
        Token::Eof => {}
        Token::Start(found) | Token::Empty(found) | Token::End(found) => {
            return Err(FormatError::UnexpectedElement {
                found,
                context: "document",
            });
        }
    }
    debug!(root = root.xml_tag(), "decoded XML plist");
    Ok(root)
}

/// Structural events, with prolog, comments and indentation skipped.
enum Token {
    Start(String),
    Empty(String),
    End(String),
    Eof,
}

struct XmlDecoder<'a, 'r> {
    reader: quick_xml::Reader<&'a [u8]>,
    registry: RegistryView<'r>,
}

impl XmlDecoder<'_, '_> {
    fn next_token(&mut self, context: &'static str) -> Result<Token, FormatError> {
        loop {
            match self.reader.read_event().map_err(xml_error)? {
                Event::Start(e) => return Ok(Token::Start(element_name(e.name().as_ref())?)),
                Event::Empty(e) => return Ok(Token::Empty(element_name(e.name().as_ref())?)),
                Event::End(e) => return Ok(Token::End(element_name(e.name().as_ref())?)),
                Event::Eof => return Ok(Token::Eof),
                Event::Text(e) => {
                    let text = e.unescape().map_err(xml_error)?;
                    if !text.trim().is_empty() {
                        return Err(FormatError::UnexpectedElement {
                            found: text.trim().to_string(),
                            context,
                        });
                    }
                }
                Event::CData(_) => {
                    return Err(FormatError::UnexpectedElement {
                        found: "CDATA".to_string(),
                        context,
                    });
                }
                Event::Decl(_) | Event::DocType(_) | Event::Comment(_) | Event::PI(_) => {}
            }
        }
    }

    /// Reads the text content of the element just opened, through its end tag.
    fn read_text(&mut self, context: &'static str) -> Result<String, FormatError> {
        let mut text = String::new();
        loop {
            match self.reader.read_event().map_err(xml_error)? {
                Event::Text(e) => text.push_str(&e.unescape().map_err(xml_error)?),
                Event::CData(e) => {
                    let raw = e.into_inner();
                    let chunk = std::str::from_utf8(&raw)
                        .map_err(|_| FormatError::InvalidString { context })?;
                    text.push_str(chunk);
                }
                Event::End(_) => return Ok(text),
                Event::Start(e) | Event::Empty(e) => {
                    return Err(FormatError::UnexpectedElement {
                        found: element_name(e.name().as_ref())?,
                        context,
                    });
                }
                Event::Eof => return Err(FormatError::UnexpectedEof { context }),
                Event::Decl(_) | Event::DocType(_) | Event::Comment(_) | Event::PI(_) => {}
            }
        }
    }

    /// Decodes the value element just opened as `name`, through its end tag.
    ///
    /// Containers are tracked on an explicit stack rather than by recursion.
    fn decode_value(&mut self, name: String, empty: bool) -> Result<Node, FormatError> {
        let mut stack: Vec<OpenElement> = Vec::new();
        let mut next = (name, empty);
        loop {
            let mut node = match self.open_element(&next.0, next.1, stack.len())? {
                Opened::Node(node) => node,
                Opened::Container(mut open) => match self.next_child(&mut open)? {
                    Some(child) => {
                        stack.push(open);
                        next = child;
                        continue;
                    }
                    None => open.finish(),
                },
            };
            // Hand the node to its parent, closing every container it completes.
            loop {
                let Some(mut parent) = stack.pop() else {
                    return Ok(node);
                };
                parent.accept(node)?;
                match self.next_child(&mut parent)? {
                    Some(child) => {
                        stack.push(parent);
                        next = child;
                        break;
                    }
                    None => node = parent.finish(),
                }
            }
        }
    }

    fn open_element(&mut self, name: &str, empty: bool, depth: usize) -> Result<Opened, FormatError> {
        if depth > MAX_DEPTH {
            return Err(FormatError::NestingTooDeep { max: MAX_DEPTH });
        }
        let mut node = self.registry.create_from_xml_tag(name)?;
        let partial = match node.kind() {
            Kind::Array => Partial::Array(Vec::new()),
            Kind::Dictionary => Partial::Dictionary {
                key_tag: node.key_tag().to_string(),
                entries: Dictionary::new(),
                key: None,
            },
            _ => {
                let text = if empty { String::new() } else { self.read_text("value")? };
                node.parse_xml_text(name, &text)?;
                return Ok(Opened::Node(node));
            }
        };
        let open = OpenElement { node, partial };
        if empty {
            Ok(Opened::Node(open.finish()))
        } else {
            Ok(Opened::Container(open))
        }
    }

    /// Reads up to the next child value element of `open`, returning its
    /// name and whether it is empty, or `None` at the container's end tag.
    /// Dictionary keys in between are stored on `open`.
    fn next_child(&mut self, open: &mut OpenElement) -> Result<Option<(String, bool)>, FormatError> {
        let context = match &mut open.partial {
            Partial::Array(_) => "array",
            Partial::Dictionary { key_tag, key, .. } => {
                let name = match self.next_token("dictionary key")? {
                    Token::Start(name) if name == *key_tag => self.read_text("dictionary key")?,
                    Token::Empty(name) if name == *key_tag => String::new(),
                    Token::End(_) => return Ok(None),
                    Token::Start(found) | Token::Empty(found) => {
                        return Err(FormatError::UnexpectedElement {
                            found,
                            context: "dictionary key",
                        });
                    }
                    Token::Eof => {
                        return Err(FormatError::UnexpectedEof {
                            context: "dictionary",
                        });
                    }
                };
                *key = Some(name);
                "dictionary value"
            }
        };
        match self.next_token(context)? {
            Token::Start(child) => Ok(Some((child, false))),
            Token::Empty(child) => Ok(Some((child, true))),
            Token::End(_) if context == "array" => Ok(None),
            Token::End(found) => Err(FormatError::UnexpectedElement {
                found: format!("/{found}"),
                context,
            }),
            Token::Eof => Err(FormatError::UnexpectedEof { context }),
        }
    }
}

enum Opened {
    /// A scalar or an empty container.
    Node(Node),
    Container(OpenElement),
}

/// A container element whose children are still being read.
struct OpenElement {
    /// Empty node carrying the container's type.
    node: Node,
    partial: Partial,
}

enum Partial {
    Array(Vec<Node>),
    Dictionary {
        key_tag: String,
        entries: Dictionary,
        /// Key read ahead of the value being decoded.
        key: Option<String>,
    },
}

impl OpenElement {
    fn accept(&mut self, child: Node) -> Result<(), FormatError> {
        match &mut self.partial {
            Partial::Array(items) => items.push(child),
            Partial::Dictionary { entries, key, .. } => {
                let key = key.take().unwrap_or_default();
                if entries.contains_key(&key) {
                    return Err(FormatError::DuplicateKey { key });
                }
                entries.insert(key, child);
            }
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

fn element_name(raw: &[u8]) -> Result<String, FormatError> {
    std::str::from_utf8(raw)
        .map(str::to_string)
        .map_err(|_| FormatError::InvalidString {
            context: "element name",
        })
}

fn xml_error(e: impl std::fmt::Display) -> FormatError {
    FormatError::Xml(e.to_string())
}

// =============================================================================
// ENCODING
// =============================================================================

/// Encodes a node tree as an XML plist, tab-indented.
///
/// With `write_doctype` the standard Apple DOCTYPE follows the XML
/// declaration.
pub fn encode_xml(root: &Node, write_doctype: bool) -> Result<Vec<u8>, FormatError> {
    let mut writer = quick_xml::Writer::new_with_indent(Vec::new(), b'\t', 1);
    writer
        .write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))
        .map_err(xml_error)?;
    if write_doctype {
        writer
            .write_event(Event::DocType(BytesText::from_escaped(XML_DOCTYPE)))
            .map_err(xml_error)?;
    }
    writer
        .write_event(Event::Start(
            BytesStart::new(PLIST_TAG).with_attributes([("version", "1.0")]),
        ))
        .map_err(xml_error)?;
    write_tree(&mut writer, root)?;
    writer
        .write_event(Event::End(BytesEnd::new(PLIST_TAG)))
        .map_err(xml_error)?;

    let mut bytes = writer.into_inner();
    bytes.push(b'\n');
    debug!(bytes = bytes.len(), write_doctype, "encoded XML plist");
    Ok(bytes)
}

/// A container whose start tag is written and whose children are not yet.
struct OpenTag<'a> {
    tag: &'a str,
    key_tag: &'a str,
    /// Children with their dictionary keys, in reverse order.
    children: Vec<(Option<&'a str>, &'a Node)>,
}

fn write_tree(writer: &mut quick_xml::Writer<Vec<u8>>, root: &Node) -> Result<(), FormatError> {
    let mut stack: Vec<OpenTag<'_>> = Vec::new();
    let mut next = root;
    loop {
        if let Some(open) = write_node(writer, next, stack.len())? {
            stack.push(open);
        }
        // Close finished containers until one has a child left to write.
        loop {
            let Some(open) = stack.last_mut() else {
                return Ok(());
            };
            match open.children.pop() {
                Some((key, child)) => {
                    if let Some(key) = key {
                        write_text_element(writer, open.key_tag, key)?;
                    }
                    next = child;
                    break;
                }
                None => {
                    write_end(writer, open.tag)?;
                    stack.pop();
                }
            }
        }
    }
}

/// Writes a scalar or empty container in full, or the start tag of a
/// non-empty container, which is returned for its children to follow.
fn write_node<'a>(
    writer: &mut quick_xml::Writer<Vec<u8>>,
    node: &'a Node,
    depth: usize,
) -> Result<Option<OpenTag<'a>>, FormatError> {
    if depth > MAX_DEPTH {
        return Err(FormatError::NestingTooDeep { max: MAX_DEPTH });
    }
    let tag = node.xml_tag();
    let children: Vec<(Option<&str>, &Node)> = match node.value() {
        Value::Fill => {
            return Err(FormatError::Unsupported {
                kind: Kind::Fill,
                format: "XML",
            });
        }
        Value::Array(items) if !items.is_empty() => items.iter().rev().map(|item| (None, item)).collect(),
        Value::Dictionary(dict) if !dict.is_empty() => dict
            .iter()
            .map(|(key, value)| (Some(key), value))
            .collect::<Vec<_>>()
            .into_iter()
            .rev()
            .collect(),
        Value::Null | Value::Boolean(_) | Value::Array(_) | Value::Dictionary(_) => {
            write_empty(writer, tag)?;
            return Ok(None);
        }
        _ => {
            write_text_element(writer, tag, &node.to_xml_text()?)?;
            return Ok(None);
        }
    };
    write_start(writer, tag)?;
    Ok(Some(OpenTag {
        tag,
        key_tag: node.key_tag(),
        children,
    }))
}

fn write_empty(writer: &mut quick_xml::Writer<Vec<u8>>, tag: &str) -> Result<(), FormatError> {
    writer
        .write_event(Event::Empty(BytesStart::new(tag)))
        .map_err(xml_error)
}

fn write_start(writer: &mut quick_xml::Writer<Vec<u8>>, tag: &str) -> Result<(), FormatError> {
    writer
        .write_event(Event::Start(BytesStart::new(tag)))
        .map_err(xml_error)
}

fn write_end(writer: &mut quick_xml::Writer<Vec<u8>>, tag: &str) -> Result<(), FormatError> {
    writer
        .write_event(Event::End(BytesEnd::new(tag)))
        .map_err(xml_error)
}

/// Writes `<tag>text</tag>` on one line. The text event is written even when
/// empty so the end tag is not moved to its own line.
fn write_text_element(writer: &mut quick_xml::Writer<Vec<u8>>, tag: &str, text: &str) -> Result<(), FormatError> {
    write_start(writer, tag)?;
    writer
        .write_event(Event::Text(BytesText::new(text)))
        .map_err(xml_error)?;
    write_end(writer, tag)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Date, NodeType};
    use crate::testing::arb_node;
    use proptest::prelude::*;

    fn to_string(root: &Node, write_doctype: bool) -> String {
        String::from_utf8(encode_xml(root, write_doctype).unwrap()).unwrap()
    }

    fn decode(text: &str) -> Result<Node, FormatError> {
        decode_xml_with(text.as_bytes(), &Registry::new())
    }

    fn dict(entries: Vec<(&str, Node)>) -> Node {
        Node::from(entries.into_iter().collect::<Dictionary>())
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
    fn test_boolean_is_empty_element() {
        let xml = to_string(&dict(vec![("Test", Node::from(true))]), true);
        assert!(xml.contains("<true/>"), "{xml}");
        assert!(xml.contains("<key>Test</key>"), "{xml}");
    }

    #[test]
    fn test_unicode_string_uses_ustring() {
        let xml = to_string(&dict(vec![("Test", Node::from("😂test"))]), true);
        assert!(xml.contains("<ustring>😂test</ustring>"), "{xml}");

        let xml = to_string(&Node::from("plain"), true);
        assert!(xml.contains("<string>plain</string>"), "{xml}");
    }

    #[test]
    fn test_document_layout() {
        let xml = to_string(&dict(vec![("Test", Node::from(1))]), true);
        let expected = concat!(
            "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n",
            "<!DOCTYPE plist PUBLIC \"-//Apple Computer//DTD PLIST 1.0//EN\" ",
            "\"http://www.apple.com/DTDs/PropertyList-1.0.dtd\">\n",
            "<plist version=\"1.0\">\n",
            "\t<dict>\n",
            "\t\t<key>Test</key>\n",
            "\t\t<integer>1</integer>\n",
            "\t</dict>\n",
            "</plist>\n",
        );
        assert_eq!(xml, expected);
    }

    #[test]
    fn test_doctype_optional() {
        let with = to_string(&Node::from(1), true);
        assert!(with.contains("<!DOCTYPE plist PUBLIC"));
        let without = to_string(&Node::from(1), false);
        assert!(!without.contains("DOCTYPE"));
        assert!(without.starts_with("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<plist"));
    }

    #[test]
    fn test_empty_values() {
        let root = dict(vec![
            ("array", Node::from(Vec::<Node>::new())),
            ("dict", Node::from(Dictionary::new())),
            ("string", Node::from("")),
            ("data", Node::from(Vec::<u8>::new())),
            ("null", Node::null()),
        ]);
        let xml = to_string(&root, false);
        assert!(xml.contains("<array/>"), "{xml}");
        assert!(xml.contains("<dict/>"), "{xml}");
        assert!(xml.contains("<string></string>"), "{xml}");
        assert!(xml.contains("<null/>"), "{xml}");
        assert_eq!(decode(&xml).unwrap(), root);
    }

    #[test]
    fn test_escaping_roundtrip() {
        let root = dict(vec![("a<b", Node::from("x & y <z> \"q\" 'r'"))]);
        let xml = to_string(&root, true);
        assert!(xml.contains("&amp;"), "{xml}");
        assert!(xml.contains("&lt;"), "{xml}");
        assert_eq!(decode(&xml).unwrap(), root);
    }

    #[test]
    fn test_roundtrip_all_kinds() {
        let root = dict(vec![
            ("bool", Node::from(false)),
            ("int", Node::from(-42)),
            ("real", Node::from(0.1)),
            ("inf", Node::from(f64::INFINITY)),
            ("string", Node::from("  spaced  ")),
            ("unicode", Node::from("héllo 😂")),
            ("date", Node::from(Date::parse_iso8601("2011-06-27T19:18:22Z").unwrap())),
            ("data", Node::from(b"binary\x00data".to_vec())),
            ("uid", Node::new(Value::Uid(99))),
            (
                "nested",
                Node::from_iter([Node::from(1), dict(vec![("k", Node::from("v"))])]),
            ),
        ]);
        let xml = to_string(&root, true);
        assert_eq!(decode(&xml).unwrap(), root);
    }

    #[test]
    fn test_parse_apple_document() {
        let xml = r#"<?xml version="1.0" encoding="UTF-8"?>
<!DOCTYPE plist PUBLIC "-//Apple//DTD PLIST 1.0//EN" "http://www.apple.com/DTDs/PropertyList-1.0.dtd">
<plist version="1.0">
<dict>
	<!-- bundle identity -->
	<key>CFBundleIdentifier</key>
	<string>com.example.asdf</string>
	<key>CFBundleVersion</key>
	<integer>12</integer>
	<key>LSRequiresIPhoneOS</key>
	<true/>
	<key>UISupportedInterfaceOrientations</key>
	<array>
		<string>UIInterfaceOrientationPortrait</string>
		<string>UIInterfaceOrientationLandscapeLeft</string>
	</array>
	<key>Icon</key>
	<data>
	iVBORw0KGgo=
	</data>
	<key>Built</key>
	<date>2011-06-27T19:18:22Z</date>
	<key>Scale</key>
	<real>2</real>
</dict>
</plist>
"#;
        let root = decode(xml).unwrap();
        assert_eq!(root["CFBundleIdentifier"].as_str(), Some("com.example.asdf"));
        assert_eq!(root["CFBundleVersion"].as_i64(), Some(12));
        assert_eq!(root["LSRequiresIPhoneOS"].as_bool(), Some(true));
        assert_eq!(root["UISupportedInterfaceOrientations"].as_array().unwrap().len(), 2);
        assert_eq!(
            root["Icon"].as_data(),
            Some(&[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A][..])
        );
        assert_eq!(root["Built"].as_date().unwrap().to_iso8601(), "2011-06-27T19:18:22Z");
        assert_eq!(root["Scale"].as_f64(), Some(2.0));
        let keys: Vec<_> = root.as_dictionary().unwrap().keys().collect();
        assert_eq!(keys[0], "CFBundleIdentifier");
        assert_eq!(keys[6], "Scale");
    }

    #[test]
    fn test_bare_root_and_bom() {
        assert_eq!(decode("<integer>5</integer>").unwrap(), Node::from(5));
        let mut bytes = UTF8_BOM.to_vec();
        bytes.extend_from_slice(b"<plist><string>x</string></plist>");
        assert_eq!(decode_xml_with(&bytes, &Registry::new()).unwrap(), Node::from("x"));
    }

    #[test]
    fn test_cdata_text() {
        let root = decode("<plist><string><![CDATA[a<b]]></string></plist>").unwrap();
        assert_eq!(root, Node::from("a<b"));
    }

    #[test]
    fn test_unknown_tag() {
        assert_eq!(
            decode("<plist><bogus>1</bogus></plist>"),
            Err(FormatError::UnknownXmlTag {
                tag: "bogus".to_string()
            })
        );
    }

    #[test]
    fn test_structural_errors() {
        assert!(matches!(
            decode("<plist><dict><string>no key</string></dict></plist>"),
            Err(FormatError::UnexpectedElement { .. })
        ));
        assert!(matches!(
            decode("<plist><dict><key>k</key></dict></plist>"),
            Err(FormatError::UnexpectedElement { .. })
        ));
        assert!(matches!(
            decode("<plist><integer>1</integer><integer>2</integer></plist>"),
            Err(FormatError::UnexpectedElement { .. })
        ));
        assert!(matches!(
            decode("<plist><array>stray<integer>1</integer></array></plist>"),
            Err(FormatError::UnexpectedElement { .. })
        ));
        assert!(matches!(
            decode("<plist><integer>1</plist>"),
            Err(FormatError::Xml(_))
        ));
        assert!(matches!(
            decode("<plist><array>"),
            Err(FormatError::UnexpectedEof { .. }) | Err(FormatError::Xml(_))
        ));
        assert!(matches!(decode(""), Err(FormatError::UnexpectedEof { .. })));
        assert!(matches!(
            decode("<plist><integer>abc</integer></plist>"),
            Err(FormatError::InvalidText { context: "integer", .. })
        ));
        assert_eq!(
            decode("<plist><dict><key>a</key><true/><key>a</key><false/></dict></plist>"),
            Err(FormatError::DuplicateKey { key: "a".into() })
        );
    }

    #[test]
    fn test_deep_nesting_rejected() {
        on_small_stack(|| {
            let depth = MAX_DEPTH + 2;
            let xml = format!("{}{}", "<array>".repeat(depth), "</array>".repeat(depth));
            assert_eq!(decode(&xml), Err(FormatError::NestingTooDeep { max: MAX_DEPTH }));

            let mut node = Node::from(1);
            for _ in 0..MAX_DEPTH + 1 {
                node = Node::from(vec![node]);
            }
            assert_eq!(
                encode_xml(&node, false),
                Err(FormatError::NestingTooDeep { max: MAX_DEPTH })
            );
        });
    }

    #[test]
    fn test_max_depth_on_small_stack() {
        on_small_stack(|| {
            let depth = MAX_DEPTH + 1;
            let xml = format!(
                "<plist>{}{}</plist>",
                "<array>".repeat(depth),
                "</array>".repeat(depth)
            );
            let root = decode(&xml).unwrap();
            let encoded = encode_xml(&root, false).unwrap();
            assert_eq!(decode_xml_with(&encoded, &Registry::new()).unwrap(), root);

            // Alternating arrays and dictionaries, leaf at the deepest level.
            let mut node = Node::from("leaf");
            for level in 0..MAX_DEPTH {
                node = if level % 2 == 0 {
                    Node::from(vec![node])
                } else {
                    dict(vec![("k", node)])
                };
            }
            let encoded = encode_xml(&node, true).unwrap();
            assert_eq!(decode_xml_with(&encoded, &Registry::new()).unwrap(), node);
        });
    }

    #[test]
    fn test_dates_outside_four_digit_years() {
        for seconds in [-70_000_000_000.0, 400_000_000_000.0] {
            let root = Node::from(Date::from_apple_seconds(seconds));
            let xml = encode_xml(&root, false).unwrap();
            assert_eq!(decode_xml_with(&xml, &Registry::new()).unwrap(), root);
        }
        let xml = to_string(&Node::from(Date::from_apple_seconds(-70_000_000_000.0)), false);
        assert!(xml.contains("<date>-0218-10-15T19:33:20Z</date>"), "{xml}");
    }

    #[test]
    fn test_fill_has_no_xml_form() {
        let root = Node::from_iter([Node::new(Value::Fill)]);
        assert!(matches!(
            encode_xml(&root, true),
            Err(FormatError::Unsupported { kind: Kind::Fill, .. })
        ));
    }

    #[test]
    fn test_custom_tags() {
        let registry = Registry::new();
        let short_int = NodeType::custom(Kind::Integer, "i", 0xC);
        let short_real = NodeType::custom(Kind::Real, "r", 0xB);
        let short_string = NodeType::custom(Kind::String, "s", 0x9);
        for ty in [&short_int, &short_real, &short_string] {
            registry.register(ty.clone()).unwrap();
        }

        let mut entries = Dictionary::new();
        entries.insert("int-value", Node::with_type(short_int, 42).unwrap());
        entries.insert("real-value", Node::with_type(short_real, 3.25).unwrap());
        entries.insert("string-value", Node::with_type(short_string, "Hello, World!").unwrap());
        let root = Node::from(entries);

        let xml = to_string(&root, true);
        assert!(xml.contains("<key>int-value</key>\n\t\t<i>42</i>"), "{xml}");
        assert!(xml.contains("<r>3.25</r>"), "{xml}");
        assert!(xml.contains("<s>Hello, World!</s>"), "{xml}");

        let decoded = decode_xml_with(xml.as_bytes(), &registry).unwrap();
        assert_eq!(decoded, root);
        assert!(matches!(
            decode(&xml),
            Err(FormatError::UnknownXmlTag { .. })
        ));
    }

    #[test]
    fn test_custom_root_and_key_tag() {
        let registry = Registry::new();
        let custom = NodeType::custom(Kind::Dictionary, "Custom", 0x7).with_key_tag("k");
        registry.register(custom.clone()).unwrap();

        let mut entries = Dictionary::new();
        entries.insert("name", "value");
        entries.insert("count", 3);
        let root = Node::with_type(custom, entries).unwrap();

        let xml = to_string(&root, false);
        assert!(xml.contains("<Custom>\n\t\t<k>name</k>\n\t\t<string>value</string>"), "{xml}");
        assert!(xml.contains("</Custom>"), "{xml}");
        assert!(!xml.contains("<key>"), "{xml}");
        assert_eq!(decode_xml_with(xml.as_bytes(), &registry).unwrap(), root);
    }

    #[test]
    fn test_alternate_spelling() {
        let registry = Registry::new();
        registry.register_as("int", 0x1, NodeType::INTEGER).unwrap();
        let root = decode_xml_with(b"<plist><int>7</int></plist>", &registry).unwrap();
        assert_eq!(root, Node::from(7));
        assert!(to_string(&root, false).contains("<integer>7</integer>"));
    }

    proptest! {
        #[test]
        fn prop_xml_roundtrip(root in arb_node()) {
            let xml = encode_xml(&root, true).unwrap();
            let decoded = decode_xml_with(&xml, &Registry::new()).unwrap();
            prop_assert_eq!(decoded, root);
        }
    }
}
