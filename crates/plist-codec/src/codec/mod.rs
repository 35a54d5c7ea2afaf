//! Binary and XML encoding/decoding for property lists.
//!
//! Both codecs resolve tags through a [`Registry`](crate::registry::Registry).
//! The plain `decode_*` functions use the global registry; the `*_with`
//! variants take one explicitly.

pub mod binary;
pub mod primitives;
pub mod scalar;
pub mod text;
pub mod xml;

pub use binary::{decode_binary, decode_binary_with, encode_binary, is_binary, Trailer};
pub use primitives::{Reader, Writer};
pub use xml::{decode_xml, decode_xml_with, encode_xml};
