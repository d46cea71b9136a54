//! Safe-range decomposition
//!
//! Per-element rendering (fills, clears, wrapping spans) cannot work on a
//! span that straddles element boundaries. [`decompose`] splits such a span
//! around the common ancestor of its endpoints:
//!
//! ```text
//!              common ancestor
//!        ┌───────────┼────────────┐
//!   start chain   middle      end chain
//!   (inner→outer) siblings    (outer→inner)
//! ```
//!
//! The pieces are in document order and cover the span, minus whitespace-only
//! siblings between the two chains.

use super::range::{Position, SafeRange, Span};
use crate::dom::{self, DomNode};

/// Split `span` into pieces each confined to one node's subtree
///
/// Returns `[span]` unchanged when either endpoint sits directly in the
/// common ancestor.
pub fn decompose<N: DomNode>(span: &Span<N>) -> Vec<SafeRange<N>> {
    let Some(ancestor) = dom::common_ancestor(span.start.node, span.end.node) else {
        return vec![*span];
    };

    let starts = chain_below(span.start.node, ancestor);
    let ends = chain_below(span.end.node, ancestor);
    let (Some(outer_start), Some(outer_end)) = (starts.last(), ends.last()) else {
        return vec![*span];
    };

    let mut ranges = Vec::new();

    // Starts: from the start boundary to the end of each enclosing node
    for (i, node) in starts.iter().enumerate() {
        let from = if i == 0 {
            span.start_offset()
        } else {
            after(starts[i - 1])
        };
        push_non_empty(
            &mut ranges,
            Span::new(
                Position::new(*node, from),
                Position::new(*node, node.node_length()),
            ),
        );
    }

    // Middle: whole siblings between the two chains
    let siblings = ancestor.child_nodes();
    let first = siblings.iter().position(|n| n == outer_start);
    let last = siblings.iter().position(|n| n == outer_end);
    if let (Some(first), Some(last)) = (first, last) {
        for sibling in siblings
            .iter()
            .skip(first + 1)
            .take(last.saturating_sub(first + 1))
            .filter(|n| !n.is_blank_text())
        {
            ranges.push(Span::contents_of(*sibling));
        }
    }

    // Ends: from the start of each enclosing node to the end boundary
    let mut end_ranges = Vec::with_capacity(ends.len());
    for (i, node) in ends.iter().enumerate() {
        let to = if i == 0 {
            span.end_offset()
        } else {
            before(ends[i - 1])
        };
        push_non_empty(
            &mut end_ranges,
            Span::new(Position::new(*node, 0), Position::new(*node, to)),
        );
    }
    end_ranges.reverse();
    ranges.extend(end_ranges);

    ranges
}

/// `node` and its ancestors up to, not including, `ancestor`
fn chain_below<N: DomNode>(node: N, ancestor: N) -> Vec<N> {
    dom::ancestors(node)
        .into_iter()
        .take_while(|n| *n != ancestor)
        .collect()
}

/// Offset in the parent just after `node`
fn after<N: DomNode>(node: N) -> usize {
    node.index_in_parent().map(|i| i + 1).unwrap_or(0)
}

/// Offset in the parent just before `node`
fn before<N: DomNode>(node: N) -> usize {
    node.index_in_parent().unwrap_or(0)
}

fn push_non_empty<N: DomNode>(ranges: &mut Vec<SafeRange<N>>, range: SafeRange<N>) {
    if !range.is_collapsed() {
        ranges.push(range);
    }
}
