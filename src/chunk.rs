//! Syntax-aware chunk extraction.
//!
//! Walks a tree-sitter syntax tree in pre-order and emits one [`Chunk`] per
//! declaration-like node. A node qualifies when its kind contains one of
//! [`DECLARATION_MARKERS`], which works across grammars without a
//! per-language boundary table at the cost of some over- and under-matching.
//!
//! Traversal always descends into children, so a method inside a class
//! yields its own chunk in addition to the class chunk.
//!
//! # Guarantees
//!
//! - Output is deterministic for a given source text.
//! - Every chunk's trimmed text has more than `min_chars` characters.
//! - `start_line` is 1-based.

use tree_sitter::{Node, Tree};

use crate::models::Chunk;

/// Substrings of node kinds that mark a chunk boundary.
pub const DECLARATION_MARKERS: [&str; 10] = [
    "function",
    "method",
    "class",
    "struct",
    "enum",
    "trait",
    "impl",
    "interface",
    "record",
    "namespace",
];

pub fn is_declaration_kind(kind: &str) -> bool {
    DECLARATION_MARKERS.iter().any(|m| kind.contains(m))
}

/// Extract declaration chunks from a parsed file.
///
/// An empty result means the caller should fall back to line windows.
pub fn extract(
    tree: &Tree,
    source: &str,
    file: &str,
    language: Option<&str>,
    min_chars: usize,
) -> Vec<Chunk> {
    let mut chunks = Vec::new();
    let mut cursor = tree.walk();

    loop {
        let node = cursor.node();
        if is_declaration_kind(node.kind()) {
            if let Some(chunk) = node_chunk(node, source, file, language, min_chars) {
                chunks.push(chunk);
            }
        }

        if cursor.goto_first_child() {
            continue;
        }
        loop {
            if cursor.goto_next_sibling() {
                break;
            }
            if !cursor.goto_parent() {
                return chunks;
            }
        }
    }
}

fn node_chunk(
    node: Node<'_>,
    source: &str,
    file: &str,
    language: Option<&str>,
    min_chars: usize,
) -> Option<Chunk> {
    let text = source.get(node.byte_range())?.trim();
    if text.chars().count() <= min_chars {
        return None;
    }

    Some(Chunk {
        text: text.to_string(),
        symbol: symbol_name(node, source),
        kind: node.kind().to_string(),
        start_line: node.start_position().row + 1,
        file: file.to_string(),
        language: language.map(str::to_string),
    })
}

fn symbol_name(node: Node<'_>, source: &str) -> Option<String> {
    let name = node
        .child_by_field_name("name")
        .or_else(|| node.child_by_field_name("identifier"))?;
    name.utf8_text(source.as_bytes())
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}
