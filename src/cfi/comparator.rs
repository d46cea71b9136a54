//! CFI Comparison and Ordering
//!
//! Implements comparison logic for CFIs to enable sorting annotations
//! and determining reading progress order. Parsed addresses are ordered by
//! their steps alone; resolved positions are ordered by the document tree.

use std::cmp::Ordering;

use super::range::{Position, Span};
use super::resolver::ResolvedSpan;
use super::types::*;
use crate::dom::{self, DomNode};

impl Ord for ParsedAddress {
    fn cmp(&self, other: &Self) -> Ordering {
        start_path(self)
            .cmp(start_path(other))
            .then_with(|| end_path(self).cmp(end_path(other)))
            // Same steps, split differently between parent and start/end
            .then_with(|| self.parent.len().cmp(&other.parent.len()))
    }
}

fn start_path(address: &ParsedAddress) -> impl Iterator<Item = &Step> + '_ {
    address.parent.iter().chain(&address.start)
}

fn end_path(address: &ParsedAddress) -> impl Iterator<Item = &Step> + '_ {
    address.parent.iter().chain(&address.end)
}

impl PartialOrd for ParsedAddress {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Step {
    fn cmp(&self, other: &Self) -> Ordering {
        // A step without an offset sits before any offset into it
        self.index
            .cmp(&other.index)
            .then_with(|| self.offset.cmp(&other.offset))
            .then_with(|| self.assertion.cmp(&other.assertion))
            .then_with(|| self.redirection.cmp(&other.redirection))
    }
}

impl PartialOrd for Step {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Compare two sequences of CFI steps
///
/// If all compared steps are equal, the longer path is "greater".
pub fn compare_steps(a: &[Step], b: &[Step]) -> Ordering {
    a.cmp(b)
}

/// Determine if CFI `a` comes before CFI `b` in reading order
pub fn is_before(a: &ParsedAddress, b: &ParsedAddress) -> bool {
    a < b
}

/// Determine if CFI `a` comes after CFI `b` in reading order
pub fn is_after(a: &ParsedAddress, b: &ParsedAddress) -> bool {
    a > b
}

/// Check if a CFI falls within a range
pub fn is_in_range(cfi: &ParsedAddress, start: &ParsedAddress, end: &ParsedAddress) -> bool {
    cfi >= start && cfi <= end
}

/// Compare two CFI strings, returning their ordering
/// Returns None if either CFI is invalid
pub fn compare_cfi_strings(a: &str, b: &str) -> Option<Ordering> {
    let cfi_a = super::parser::parse(a).ok()?;
    let cfi_b = super::parser::parse(b).ok()?;
    Some(cfi_a.cmp(&cfi_b))
}

/// Document order of two boundary points
///
/// A position without an offset is taken as offset 0 in its node.
pub fn compare_positions<N: DomNode>(a: &Position<N>, b: &Position<N>) -> Ordering {
    let offset_a = a.offset.unwrap_or(0);
    let offset_b = b.offset.unwrap_or(0);

    if a.node == b.node {
        return offset_a.cmp(&offset_b);
    }
    if let Some(index) = child_index_toward(a.node, b.node) {
        return if index < offset_a {
            Ordering::Greater
        } else {
            Ordering::Less
        };
    }
    if let Some(index) = child_index_toward(b.node, a.node) {
        return if index < offset_b {
            Ordering::Less
        } else {
            Ordering::Greater
        };
    }
    dom::compare_nodes(a.node, b.node)
}

/// Index of the child of `ancestor` that contains `node`, if `ancestor` is
/// a proper ancestor of it
fn child_index_toward<N: DomNode>(ancestor: N, node: N) -> Option<usize> {
    let chain = dom::ancestors(node);
    let at = chain.iter().position(|n| *n == ancestor)?;
    let child = chain.get(at.checked_sub(1)?)?;
    child.index_in_parent()
}

impl<N: DomNode> Span<N> {
    /// Whether the spans overlap; spans that only touch count as overlapping
    pub fn intersects(&self, other: &Span<N>) -> bool {
        compare_positions(&self.end, &other.start) != Ordering::Less
            && compare_positions(&self.start, &other.end) != Ordering::Greater
    }

    /// Whether `position` lies in `[start, end)`
    pub fn contains(&self, position: &Position<N>) -> bool {
        compare_positions(&self.start, position) != Ordering::Greater
            && compare_positions(position, &self.end) == Ordering::Less
    }
}

impl<N: DomNode> ResolvedSpan<N> {
    pub fn intersects(&self, other: &ResolvedSpan<N>) -> bool {
        self.span.intersects(&other.span)
    }

    pub fn contains(&self, position: &Position<N>) -> bool {
        self.span.contains(position)
    }
}
