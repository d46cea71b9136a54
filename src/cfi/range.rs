//! Boundary points and spans over a document tree
//!
//! Offsets follow DOM range semantics: UTF-16 code units within a text node,
//! child indices (all node kinds) within an element.

use crate::dom::{self, DomNode};

/// A node plus an optional offset inside it
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Position<N> {
    pub node: N,
    pub offset: Option<usize>,
}

/// A start/end pair of positions
///
/// Safe ranges produced by the decomposer use the same type.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Span<N> {
    pub start: Position<N>,
    pub end: Position<N>,
}

/// A span confined to a single node's subtree
pub type SafeRange<N> = Span<N>;

impl<N: DomNode> Position<N> {
    pub fn new(node: N, offset: usize) -> Self {
        Self {
            node,
            offset: Some(offset),
        }
    }

    /// A position on the node itself, no offset
    pub fn node(node: N) -> Self {
        Self { node, offset: None }
    }
}

impl<N: DomNode> Span<N> {
    pub fn new(start: Position<N>, end: Position<N>) -> Self {
        Self { start, end }
    }

    /// The whole contents of `node`
    pub fn contents_of(node: N) -> Self {
        Self {
            start: Position::new(node, 0),
            end: Position::new(node, node.node_length()),
        }
    }

    /// Start offset, defaulting to the beginning of the node
    pub fn start_offset(&self) -> usize {
        self.start.offset.unwrap_or(0)
    }

    /// End offset, defaulting to the end of the node
    pub fn end_offset(&self) -> usize {
        self.end
            .offset
            .unwrap_or_else(|| self.end.node.node_length())
    }

    pub fn is_collapsed(&self) -> bool {
        self.start.node == self.end.node && self.start_offset() >= self.end_offset()
    }

    /// Document-order text covered by the span
    pub fn text(&self) -> String {
        let root = dom::ancestors(self.start.node)
            .last()
            .copied()
            .unwrap_or(self.start.node);
        let start = linear_offset(root, self.start.node, self.start_offset());
        let end = linear_offset(root, self.end.node, self.end_offset());
        if end <= start {
            return String::new();
        }
        dom::slice_utf16(&dom::text_content(root), start, end).to_string()
    }
}

/// Number of text code units in document order before the boundary `(node, offset)`
fn linear_offset<N: DomNode>(root: N, node: N, offset: usize) -> usize {
    let before = chars_before(root, node);
    if node.is_text() {
        return before + offset.min(node.node_length());
    }
    match node.child_nodes().get(offset) {
        Some(child) => chars_before(root, *child),
        None => before + dom::utf16_len(&dom::text_content(node)),
    }
}

/// Text code units preceding `target` in a pre-order walk from `root`
fn chars_before<N: DomNode>(root: N, target: N) -> usize {
    fn visit<N: DomNode>(node: N, target: N, acc: &mut usize) -> bool {
        if node == target {
            return true;
        }
        if node.is_text() {
            *acc += node.node_length();
            return false;
        }
        node.child_nodes()
            .into_iter()
            .any(|child| visit(child, target, acc))
    }

    let mut acc = 0;
    visit(root, target, &mut acc);
    acc
}
