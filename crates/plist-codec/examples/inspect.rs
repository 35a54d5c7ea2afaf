//! Simple inspector for property list files.
//!
//! Usage: `cargo run --example inspect -- <file.plist> [--convert binary|xml]`

use std::fs;

use plist_codec::{Document, Format, Node, Value};

fn format_value(node: &Node) -> String {
    match node.value() {
        Value::String(s) => {
            let preview: String = s.chars().take(80).collect();
            if s.chars().count() > 80 {
                format!("\"{}...\"", preview)
            } else {
                format!("\"{}\"", preview)
            }
        }
        Value::Data(d) => format!("DATA[{}]", d.len()),
        Value::Date(d) => format!("DATE({})", d),
        Value::Uid(u) => format!("UID({})", u),
        Value::Array(a) => format!("ARRAY[{}]", a.len()),
        Value::Dictionary(d) => format!("DICT[{}]", d.len()),
        other => other.to_string(),
    }
}

fn print_tree(node: &Node, label: &str, depth: usize) {
    let indent = "  ".repeat(depth);
    println!("{}{}<{}> {}", indent, label, node.xml_tag(), format_value(node));
    match node.value() {
        Value::Array(items) => {
            for (i, item) in items.iter().enumerate().take(20) {
                print_tree(item, &format!("[{}] ", i), depth + 1);
            }
            if items.len() > 20 {
                println!("{}  ... and {} more elements", indent, items.len() - 20);
            }
        }
        Value::Dictionary(dict) => {
            for (key, value) in dict.iter() {
                print_tree(value, &format!("{}: ", key), depth + 1);
            }
        }
        _ => {}
    }
}

fn count_nodes(node: &Node) -> usize {
    match node.value() {
        Value::Array(items) => 1 + items.iter().map(count_nodes).sum::<usize>(),
        Value::Dictionary(dict) => 1 + dict.values().map(count_nodes).sum::<usize>(),
        _ => 1,
    }
}

fn main() {
    let mut args = std::env::args().skip(1);
    let path = args.next().unwrap_or_else(|| "Info.plist".to_string());
    let convert = match (args.next().as_deref(), args.next().as_deref()) {
        (Some("--convert"), Some("binary")) => Some(Format::Binary),
        (Some("--convert"), Some("xml")) => Some(Format::Xml),
        _ => None,
    };

    println!("Reading: {}", path);

    let data = fs::read(&path).expect("Failed to read file");
    println!("File size: {} bytes", data.len());

    let mut doc = Document::from_bytes(&data).expect("Failed to decode");

    println!("\n=== Document Info ===");
    println!("Format: {:?}", doc.format);
    println!("Root: <{}>", doc.root.xml_tag());
    println!("Nodes: {}", count_nodes(&doc.root));

    println!("\n=== Tree ===");
    print_tree(&doc.root, "", 0);

    if let Some(format) = convert {
        doc.format = format;
        let out = doc.to_bytes().expect("Failed to encode");
        let out_path = format!("{}.{}", path, if format == Format::Binary { "bin" } else { "xml" });
        fs::write(&out_path, &out).expect("Failed to write file");
        println!("\nWrote {:?} to {} ({} bytes)", format, out_path, out.len());
    }
}
