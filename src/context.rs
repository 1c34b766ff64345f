//! Context markers from a Docling document tree.
//!
//! Docling exports its document as JSON where `body.children` lists
//! `{"$ref": "#/tables/N"}` / `{"$ref": "#/texts/K"}` pointers in reading
//! order. The text item that follows a table is the best anchor for where the
//! table sat in the exported Markdown.

use serde::Deserialize;
use std::collections::BTreeMap;
use tracing::{debug, warn};

#[derive(Debug, Clone, Deserialize)]
pub struct DoclingDocument {
    #[serde(default)]
    pub body: Group,
    #[serde(default)]
    pub texts: Vec<TextItem>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Group {
    #[serde(default)]
    pub children: Vec<RefItem>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RefItem {
    #[serde(rename = "$ref")]
    pub cref: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TextItem {
    #[serde(default)]
    pub text: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemRef {
    Table(usize),
    Text(usize),
    Other,
}

impl RefItem {
    pub fn target(&self) -> ItemRef {
        let parse = |rest: &str| rest.parse::<usize>().ok();
        if let Some(n) = self.cref.strip_prefix("#/tables/").and_then(parse) {
            ItemRef::Table(n)
        } else if let Some(n) = self.cref.strip_prefix("#/texts/").and_then(parse) {
            ItemRef::Text(n)
        } else {
            ItemRef::Other
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct MarkerOptions {
    /// Characters taken from the start of the following text item.
    pub max_chars: usize,
    /// How many body children after a table are searched for text.
    pub lookahead: usize,
}

impl Default for MarkerOptions {
    fn default() -> Self {
        Self {
            max_chars: 30,
            lookahead: 4,
        }
    }
}

impl From<&crate::config::Placement> for MarkerOptions {
    fn from(cfg: &crate::config::Placement) -> Self {
        Self {
            max_chars: cfg.context_marker_chars,
            lookahead: cfg.context_lookahead,
        }
    }
}

/// Maps table index to the snippet of text that follows it in the body.
pub fn context_markers(doc: &DoclingDocument, opts: MarkerOptions) -> BTreeMap<usize, String> {
    let children = &doc.body.children;
    let mut markers = BTreeMap::new();

    for (pos, child) in children.iter().enumerate() {
        let ItemRef::Table(table) = child.target() else {
            continue;
        };
        let window = children.iter().skip(pos + 1).take(opts.lookahead);
        for next in window {
            let ItemRef::Text(k) = next.target() else {
                continue;
            };
            let Some(item) = doc.texts.get(k) else {
                debug!(table, text = k, "dangling text reference");
                continue;
            };
            let marker = snippet(&item.text, opts.max_chars);
            if !marker.is_empty() {
                markers.insert(table, marker);
                break;
            }
        }
    }
    markers
}

/// Parses a Docling JSON export; a document that does not match the expected
/// shape yields no markers.
pub fn markers_from_json(value: &serde_json::Value, opts: MarkerOptions) -> BTreeMap<usize, String> {
    match DoclingDocument::deserialize(value) {
        Ok(doc) => context_markers(&doc, opts),
        Err(err) => {
            warn!("docling document not understood, no context markers: {err}");
            BTreeMap::new()
        }
    }
}

fn snippet(text: &str, max_chars: usize) -> String {
    let head: String = text.chars().take(max_chars).collect();
    head.trim().to_string()
}
