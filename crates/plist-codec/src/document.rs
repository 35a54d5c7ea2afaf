//! Format detection and the load/save entry points.

use std::io::{Read, Write};

use tracing::debug;

use crate::codec::{decode_binary_with, decode_xml_with, encode_binary, encode_xml, is_binary};
use crate::error::{Error, FormatError};
use crate::model::Node;
use crate::registry::Registry;

/// Wire format of a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Format {
    #[default]
    Xml,
    Binary,
}

impl Format {
    /// Binary if the input starts with `bplist00`, XML otherwise.
    pub fn detect(input: &[u8]) -> Format {
        if is_binary(input) {
            Format::Binary
        } else {
            Format::Xml
        }
    }
}

/// Options for writing a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SaveOptions {
    /// Emit the Apple DOCTYPE declaration in XML output.
    pub write_doctype: bool,
}

impl Default for SaveOptions {
    fn default() -> Self {
        Self {
            write_doctype: true,
        }
    }
}

/// A root node together with the format it was read from or will be written in.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub root: Node,
    pub format: Format,
    pub options: SaveOptions,
}

impl Document {
    pub fn new(root: Node, format: Format) -> Self {
        Self {
            root,
            format,
            options: SaveOptions::default(),
        }
    }

    /// Reads a document from a stream using the global registry.
    pub fn load<R: Read>(reader: R) -> Result<Self, Error> {
        Self::load_with(reader, Registry::global())
    }

    pub fn load_with<R: Read>(mut reader: R, registry: &Registry) -> Result<Self, Error> {
        let mut input = Vec::new();
        reader.read_to_end(&mut input)?;
        Ok(Self::from_bytes_with(&input, registry)?)
    }

    /// Decodes a document from bytes using the global registry.
    pub fn from_bytes(input: &[u8]) -> Result<Self, FormatError> {
        Self::from_bytes_with(input, Registry::global())
    }

    pub fn from_bytes_with(input: &[u8], registry: &Registry) -> Result<Self, FormatError> {
        let format = Format::detect(input);
        debug!(?format, bytes = input.len(), "loading plist");
        let root = match format {
            Format::Binary => decode_binary_with(input, registry)?,
            Format::Xml => decode_xml_with(input, registry)?,
        };
        Ok(Self::new(root, format))
    }

    /// Writes the document in its format.
    pub fn save<W: Write>(&self, writer: W) -> Result<(), Error> {
        save(&self.root, writer, self.format, self.options)
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, FormatError> {
        to_bytes(&self.root, self.format, self.options)
    }
}

/// Reads a plist from a stream, detecting its format.
pub fn load<R: Read>(reader: R) -> Result<Node, Error> {
    Ok(Document::load(reader)?.root)
}

/// Reads a plist from a stream, resolving tags through `registry`.
pub fn load_with<R: Read>(reader: R, registry: &Registry) -> Result<Node, Error> {
    Ok(Document::load_with(reader, registry)?.root)
}

/// Decodes a plist from bytes, detecting its format.
pub fn from_bytes(input: &[u8]) -> Result<Node, FormatError> {
    Ok(Document::from_bytes(input)?.root)
}

pub fn from_bytes_with(input: &[u8], registry: &Registry) -> Result<Node, FormatError> {
    Ok(Document::from_bytes_with(input, registry)?.root)
}

/// Writes a plist to a stream in the given format.
pub fn save<W: Write>(root: &Node, mut writer: W, format: Format, options: SaveOptions) -> Result<(), Error> {
    let bytes = to_bytes(root, format, options)?;
    writer.write_all(&bytes)?;
    writer.flush()?;
    Ok(())
}

/// Encodes a plist in the given format.
pub fn to_bytes(root: &Node, format: Format, options: SaveOptions) -> Result<Vec<u8>, FormatError> {
    match format {
        Format::Binary => encode_binary(root),
        Format::Xml => encode_xml(root, options.write_doctype),
    }
}
