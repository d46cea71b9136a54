//! Document tree seam
//!
//! The CFI engine walks any DOM-like tree through the [`DomNode`] trait. The
//! crate ships an implementation for [`roxmltree::Node`], which is what XHTML
//! content documents are loaded into.

use std::cmp::Ordering;
use std::fmt;

use crate::error::Result;

/// Node discrimination the engine cares about
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    Element,
    Text,
    Comment,
    /// Document root, processing instructions
    Other,
}

/// A handle to a node in a document tree
///
/// Handles are cheap to copy and compare equal when they refer to the same
/// node of the same document.
pub trait DomNode: Copy + PartialEq + fmt::Debug {
    fn node_kind(&self) -> NodeKind;

    fn parent_node(&self) -> Option<Self>;

    /// All children in document order, comments included
    fn child_nodes(&self) -> Vec<Self>;

    /// Character data of a text node, `None` for everything else
    fn node_text(&self) -> Option<&str>;

    /// The `id` attribute of an element
    fn id_attribute(&self) -> Option<&str>;

    fn is_element(&self) -> bool {
        self.node_kind() == NodeKind::Element
    }

    fn is_text(&self) -> bool {
        self.node_kind() == NodeKind::Text
    }

    /// Whether a CFI step can address this node directly
    fn is_addressable(&self) -> bool {
        matches!(self.node_kind(), NodeKind::Element | NodeKind::Text)
    }

    /// DOM node length: UTF-16 code units for text, child count otherwise
    fn node_length(&self) -> usize {
        match self.node_text() {
            Some(text) if self.is_text() => utf16_len(text),
            _ => self.child_nodes().len(),
        }
    }

    /// Position among all of the parent's children
    fn index_in_parent(&self) -> Option<usize> {
        let parent = self.parent_node()?;
        parent.child_nodes().iter().position(|child| child == self)
    }

    fn parent_element(&self) -> Option<Self> {
        self.parent_node().filter(|parent| parent.is_element())
    }

    fn is_blank_text(&self) -> bool {
        self.is_text()
            && self
                .node_text()
                .map(|text| text.trim().is_empty())
                .unwrap_or(true)
    }
}

impl<'a, 'input: 'a> DomNode for roxmltree::Node<'a, 'input> {
    fn node_kind(&self) -> NodeKind {
        match self.node_type() {
            roxmltree::NodeType::Element => NodeKind::Element,
            roxmltree::NodeType::Text => NodeKind::Text,
            roxmltree::NodeType::Comment => NodeKind::Comment,
            roxmltree::NodeType::Root | roxmltree::NodeType::PI => NodeKind::Other,
        }
    }

    fn parent_node(&self) -> Option<Self> {
        self.parent()
    }

    fn child_nodes(&self) -> Vec<Self> {
        self.children().collect()
    }

    fn node_text(&self) -> Option<&str> {
        if self.is_text() {
            self.text()
        } else {
            None
        }
    }

    fn id_attribute(&self) -> Option<&str> {
        self.attribute("id")
    }
}

/// Length of `text` in UTF-16 code units, the unit of DOM text offsets
pub fn utf16_len(text: &str) -> usize {
    text.chars().map(char::len_utf16).sum()
}

/// The character covering UTF-16 offset `unit`, as `(start, width)` in units
///
/// `None` when `unit` is at or past the end of `text`.
pub fn char_at_utf16(text: &str, unit: usize) -> Option<(usize, usize)> {
    let mut start = 0;
    for ch in text.chars() {
        let width = ch.len_utf16();
        if unit < start + width {
            return Some((start, width));
        }
        start += width;
    }
    None
}

/// Slice `text` between two UTF-16 offsets
///
/// Offsets inside a surrogate pair snap outward to the whole character.
pub fn slice_utf16(text: &str, start: usize, end: usize) -> &str {
    let mut unit = 0;
    let mut from = text.len();
    let mut to = text.len();
    for (byte, ch) in text.char_indices() {
        let width = ch.len_utf16();
        if from == text.len() && start < unit + width {
            from = byte;
        }
        if end <= unit {
            to = byte;
            break;
        }
        unit += width;
    }
    if from > to {
        return "";
    }
    &text[from..to]
}

/// Load an XHTML content document
///
/// DTDs are allowed since most EPUB content documents carry a doctype.
pub fn parse_xhtml(source: &str) -> Result<roxmltree::Document<'_>> {
    let options = roxmltree::ParsingOptions {
        allow_dtd: true,
        ..roxmltree::ParsingOptions::default()
    };
    Ok(roxmltree::Document::parse_with_options(source, options)?)
}

/// The node followed by its ancestors, innermost first
pub fn ancestors<N: DomNode>(node: N) -> Vec<N> {
    let mut chain = vec![node];
    let mut current = node;
    while let Some(parent) = current.parent_node() {
        chain.push(parent);
        current = parent;
    }
    chain
}

/// Deepest node that contains both `a` and `b` (inclusive)
pub fn common_ancestor<N: DomNode>(a: N, b: N) -> Option<N> {
    let b_chain = ancestors(b);
    ancestors(a).into_iter().find(|node| b_chain.contains(node))
}

/// Child-index path from the root to `node`
pub fn tree_path<N: DomNode>(node: N) -> Vec<usize> {
    let mut path: Vec<usize> = ancestors(node)
        .into_iter()
        .filter_map(|n| n.index_in_parent())
        .collect();
    path.reverse();
    path
}

/// Document order of two nodes; an ancestor sorts before its descendants
pub fn compare_nodes<N: DomNode>(a: N, b: N) -> Ordering {
    tree_path(a).cmp(&tree_path(b))
}

/// Concatenated text of every text node under `node`
pub fn text_content<N: DomNode>(node: N) -> String {
    let mut out = String::new();
    collect_text(node, &mut out);
    out
}

fn collect_text<N: DomNode>(node: N, out: &mut String) {
    if let Some(text) = node.node_text() {
        out.push_str(text);
        return;
    }
    for child in node.child_nodes() {
        collect_text(child, out);
    }
}
