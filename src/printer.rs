//! Flattened configuration output and console banners

use serde_yaml::{Mapping, Value};
use std::fs;
use std::path::Path;
use tracing::debug;

use crate::error::Result;

/// Flatten a nested mapping into `dotted.key.path: value` lines.
///
/// Keys are visited in insertion order at every level. Nested mappings
/// contribute no line of their own, so an empty section disappears.
pub fn flatten(mapping: &Mapping) -> Vec<String> {
    let mut lines = Vec::new();
    flatten_into(mapping, "", &mut lines);
    lines
}

fn flatten_into(mapping: &Mapping, prefix: &str, lines: &mut Vec<String>) {
    for (key, value) in mapping {
        let path = if prefix.is_empty() {
            render(key)
        } else {
            format!("{}.{}", prefix, render(key))
        };

        match value {
            Value::Mapping(nested) => flatten_into(nested, &path, lines),
            leaf => lines.push(format!("{}: {}", path, render(leaf))),
        }
    }
}

/// Plain string form of a leaf value
pub fn render(value: &Value) -> String {
    match value {
        Value::Null => "null".to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::String(s) => s.clone(),
        Value::Sequence(items) => {
            let items: Vec<String> = items.iter().map(render).collect();
            format!("[{}]", items.join(", "))
        }
        Value::Mapping(entries) => {
            let entries: Vec<String> = entries
                .iter()
                .map(|(k, v)| format!("{}: {}", render(k), render(v)))
                .collect();
            format!("{{{}}}", entries.join(", "))
        }
        Value::Tagged(tagged) => render(&tagged.value),
    }
}

/// Three-line `#` banner with `text` centred on the middle line
pub fn separator(text: &str, total_len: usize) -> String {
    let text_len = text.chars().count();
    let left = total_len.saturating_sub(text_len) / 2;
    let right = total_len.saturating_sub(text_len + left);
    let rule = "#".repeat(total_len);

    format!("{rule}\n{}{text}{}\n{rule}", "#".repeat(left), "#".repeat(right))
}

/// Print a [`separator`] banner to stdout
pub fn print_separator(text: &str, total_len: usize) {
    println!("{}", separator(text, total_len));
}

/// Write lines to `path`, one per line, replacing any previous content
pub fn write_lines(path: impl AsRef<Path>, lines: &[String]) -> Result<()> {
    let path = path.as_ref();
    let mut content = lines.join("\n");
    if !content.is_empty() {
        content.push('\n');
    }
    fs::write(path, content)?;
    debug!("Wrote {} lines to {}", lines.len(), path.display());
    Ok(())
}
