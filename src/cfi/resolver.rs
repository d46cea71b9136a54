//! CFI Resolver
//!
//! Walks a content document with parsed steps. The package part of the
//! address (`/6/N!`) is checked and dropped; the remaining steps are applied
//! from the document element.
//!
//! Child indexing follows the EPUB CFI rule, with comments and processing
//! instructions ignored:
//!
//! ```text
//! <p>  text  <i/>  text  <b/>  text  </p>
//!       /1    /2   /3    /4   /5
//! ```
//!
//! An odd index names the run of text between two elements. When there is
//! no text before the first element, `/1` addresses nothing.

use std::sync::Arc;

use super::range::{Position, SafeRange, Span};
use super::safe_range;
use super::types::{ParsedAddress, Step, SPINE_STEP_INDEX};
use crate::dom::{self, DomNode, NodeKind};
use crate::error::{CfiError, Result};

/// How a resolved span was obtained
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SpanKind {
    /// Synthesized 1-character span at a point address
    Point,
    /// Start/end of a ranged address
    Range,
}

/// A parsed address located in a document
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResolvedSpan<N> {
    /// Node reached by the parent steps
    pub target: N,
    pub span: Span<N>,
    pub kind: SpanKind,
}

/// Resolve `address` against the document element `root`
pub fn resolve<N: DomNode>(address: &ParsedAddress, root: N) -> Result<ResolvedSpan<N>> {
    let content = content_steps(address)?;
    let target = walk(root, content, 0, Boundary::Leading)?;

    if !address.is_range() {
        return Ok(ResolvedSpan {
            target: target.node,
            span: point_span(target)?,
            kind: SpanKind::Point,
        });
    }

    if address.start.is_empty() || address.end.is_empty() {
        return Err(CfiError::malformed("ranged CFI needs both start and end steps"));
    }

    let start = walk(target.node, &address.start, content.len(), Boundary::Leading)?;
    let end = walk(target.node, &address.end, content.len(), Boundary::Trailing)?;

    Ok(ResolvedSpan {
        target: target.node,
        span: Span::new(clamp(start), clamp(end)),
        kind: SpanKind::Range,
    })
}

/// Resolve a single step list from `from`, returning the final position
pub fn resolve_steps<N: DomNode>(from: N, steps: &[Step]) -> Result<Position<N>> {
    walk(from, steps, 0, Boundary::Leading)
}

/// Which node owns an offset on the boundary between two nodes of a text run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Boundary {
    /// The later node, at offset 0: points and range starts
    Leading,
    /// The earlier node, at its end: range ends
    Trailing,
}

/// Strip the package prefix (`/6/N!`) off the parent steps
fn content_steps(address: &ParsedAddress) -> Result<&[Step]> {
    match address.parent.as_slice() {
        [spine, item, rest @ ..] if spine.index == SPINE_STEP_INDEX => {
            if !item.redirection {
                tracing::warn!(
                    cfi = %address,
                    "spine item step has no redirection, assuming content document"
                );
            }
            Ok(rest)
        }
        [spine, ..] if spine.index != SPINE_STEP_INDEX => Err(CfiError::malformed(format!(
            "spine should be step /{} of the package, found /{}",
            SPINE_STEP_INDEX, spine.index
        ))),
        _ => Err(CfiError::malformed("CFI does not reference a spine item")),
    }
}

fn walk<N: DomNode>(
    from: N,
    steps: &[Step],
    depth: usize,
    boundary: Boundary,
) -> Result<Position<N>> {
    let mut position = Position::node(from);
    for (i, step) in steps.iter().enumerate() {
        position = select_child(position.node, step, depth + i, boundary)?;
    }
    Ok(position)
}

fn select_child<N: DomNode>(
    parent: N,
    step: &Step,
    depth: usize,
    boundary: Boundary,
) -> Result<Position<N>> {
    let unresolvable = || CfiError::UnresolvableStep {
        index: step.index,
        depth,
    };

    if step.is_element() {
        let position = ((step.index / 2) as usize)
            .checked_sub(1)
            .ok_or_else(unresolvable)?;
        let node = parent
            .child_nodes()
            .into_iter()
            .filter(|child| child.is_element())
            .nth(position)
            .ok_or_else(unresolvable)?;

        if let Some(ref expected) = step.assertion {
            if node.id_attribute() != Some(expected.as_str()) {
                tracing::debug!(
                    expected = %expected,
                    found = ?node.id_attribute(),
                    "CFI id assertion does not match, resolving by index"
                );
            }
        }

        return Ok(Position {
            node,
            offset: step.offset,
        });
    }

    let run = text_run(parent, step.index);
    if run.is_empty() {
        return Err(unresolvable());
    }
    Ok(match step.offset {
        Some(offset) => locate_in_run(&run, offset, boundary),
        None => Position::node(run[0]),
    })
}

/// Text nodes sharing the odd index `index` under `parent`
pub(crate) fn text_run<N: DomNode>(parent: N, index: u32) -> Vec<N> {
    let preceding_elements = (index / 2) as usize;
    let mut seen = 0;
    let mut run = Vec::new();

    for child in parent.child_nodes() {
        match child.node_kind() {
            NodeKind::Element => {
                seen += 1;
                if seen > preceding_elements {
                    break;
                }
            }
            NodeKind::Text if seen == preceding_elements => run.push(child),
            _ => {}
        }
    }
    run
}

/// Map a run-relative offset to the text node holding it
fn locate_in_run<N: DomNode>(run: &[N], offset: usize, boundary: Boundary) -> Position<N> {
    let mut remaining = offset;
    for (i, node) in run.iter().enumerate() {
        let len = node.node_length();
        let inside = match boundary {
            Boundary::Leading => remaining < len,
            Boundary::Trailing => remaining <= len,
        };
        if inside || i == run.len() - 1 {
            return Position::new(*node, remaining);
        }
        remaining -= len;
    }
    Position::new(run[0], offset)
}

/// 1-character span at a point target
///
/// A character outside the BMP spans both of its UTF-16 code units.
fn point_span<N: DomNode>(target: Position<N>) -> Result<Span<N>> {
    let len = target.node.node_length();
    if len == 0 {
        return Err(CfiError::EmptyTarget);
    }
    // Back up one character at end-of-text so the span stays inside the node
    let offset = target.offset.unwrap_or(0).min(len - 1);
    let (start, width) = target
        .node
        .node_text()
        .and_then(|text| dom::char_at_utf16(text, offset))
        .unwrap_or((offset, 1));
    Ok(Span::new(
        Position::new(target.node, start),
        Position::new(target.node, start + width),
    ))
}

fn clamp<N: DomNode>(position: Position<N>) -> Position<N> {
    match position.offset {
        Some(offset) if offset > position.node.node_length() => {
            tracing::debug!(offset, "range offset beyond node length, clamping");
            Position::new(position.node, position.node.node_length())
        }
        _ => position,
    }
}

/// A CFI resolved in one document, with its safe ranges
///
/// The canonical string is the parsed address re-serialized, so equivalent
/// spellings of the same CFI share one key.
#[derive(Debug, Clone)]
pub struct ResolvedCfi<N> {
    cfi: String,
    address: Arc<ParsedAddress>,
    resolved: ResolvedSpan<N>,
    ranges: Vec<SafeRange<N>>,
}

impl<N: DomNode> ResolvedCfi<N> {
    /// Resolve a parsed address and decompose it into safe ranges
    pub fn new(address: Arc<ParsedAddress>, root: N) -> Result<Self> {
        let resolved = resolve(&address, root)?;
        let ranges = safe_range::decompose(&resolved.span);
        Ok(Self {
            cfi: address.to_string(),
            address,
            resolved,
            ranges,
        })
    }

    /// Canonical CFI string
    pub fn as_str(&self) -> &str {
        &self.cfi
    }

    pub fn address(&self) -> &Arc<ParsedAddress> {
        &self.address
    }

    pub fn resolved(&self) -> &ResolvedSpan<N> {
        &self.resolved
    }

    /// The full, possibly cross-element span
    pub fn span(&self) -> &Span<N> {
        &self.resolved.span
    }

    /// Element-confined pieces of the span, in document order
    pub fn safe_ranges(&self) -> &[SafeRange<N>] {
        &self.ranges
    }

    pub fn is_range(&self) -> bool {
        self.resolved.kind == SpanKind::Range
    }

    /// Text covered by the span
    pub fn text(&self) -> String {
        self.resolved.span.text()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cfi::parser::parse;
    use crate::dom::parse_xhtml;
    use crate::dom::test_support::{by_id, text_node};

    const CHAPTER: &str = r#"<html xmlns="http://www.w3.org/1999/xhtml">
<head><title>Ch</title></head>
<body id="body">
<p id="p1">First paragraph</p>
<p id="p2"><i id="lead">Lead</i> tail <!-- note -->more<b id="b">bold</b></p>
<div id="empty"></div>
</body>
</html>"#;

    fn resolve_str<'a, 'input>(
        doc: &'a roxmltree::Document<'input>,
        cfi: &str,
    ) -> Result<ResolvedSpan<roxmltree::Node<'a, 'input>>> {
        resolve(&parse(cfi).unwrap(), doc.root_element())
    }

    #[test]
    fn test_element_steps() {
        let doc = parse_xhtml(CHAPTER).unwrap();
        let resolved = resolve_str(&doc, "epubcfi(/6/4!/4/4)").unwrap();
        assert_eq!(resolved.target, by_id(&doc, "p2"));
        assert_eq!(resolved.kind, SpanKind::Point);
    }

    #[test]
    fn test_element_first_parity() {
        let doc = parse_xhtml(CHAPTER).unwrap();
        // p2 children: [<i>, " tail ", comment, "more", <b>]
        let lead = resolve_str(&doc, "epubcfi(/6/4!/4/4/2)").unwrap();
        assert_eq!(lead.target, by_id(&doc, "lead"));

        let tail = resolve_str(&doc, "epubcfi(/6/4!/4/4/3:1)").unwrap();
        assert_eq!(tail.target, text_node(&doc, " tail "));

        let b = resolve_str(&doc, "epubcfi(/6/4!/4/4/4)").unwrap();
        assert_eq!(b.target, by_id(&doc, "b"));

        // No text before <i>
        assert!(matches!(
            resolve_str(&doc, "epubcfi(/6/4!/4/4/1)"),
            Err(CfiError::UnresolvableStep { index: 1, depth: 2 })
        ));
    }

    #[test]
    fn test_text_first_parity() {
        let doc = parse_xhtml(CHAPTER).unwrap();
        // body children: ["\n", <p1>, "\n", <p2>, "\n", <div>, "\n"]
        let leading = resolve_str(&doc, "epubcfi(/6/4!/4/1)").unwrap();
        assert!(leading.target.is_text());
        let p1 = resolve_str(&doc, "epubcfi(/6/4!/4/2)").unwrap();
        assert_eq!(p1.target, by_id(&doc, "p1"));
    }

    #[test]
    fn test_offset_across_comment_split_run() {
        let doc = parse_xhtml(CHAPTER).unwrap();
        // Run /3 of p2 is " tail " (6 chars) + "more"
        let resolved = resolve_str(&doc, "epubcfi(/6/4!/4/4/3:8)").unwrap();
        assert_eq!(resolved.target, text_node(&doc, "more"));
        assert_eq!(resolved.span.start, Position::new(text_node(&doc, "more"), 2));
    }

    #[test]
    fn test_run_boundary_point_starts_next_node() {
        let doc = parse_xhtml("<html><head/><body><p>ab<!-- c -->cd</p></body></html>").unwrap();
        let cd = text_node(&doc, "cd");

        let resolved = resolve_str(&doc, "epubcfi(/6/4!/4/2/1:2)").unwrap();
        assert_eq!(resolved.span.start, Position::new(cd, 0));
        assert_eq!(resolved.span.text(), "c");
    }

    #[test]
    fn test_run_boundary_in_range() {
        let doc = parse_xhtml("<html><head/><body><p>ab<!-- c -->cd</p></body></html>").unwrap();
        let ab = text_node(&doc, "ab");
        let cd = text_node(&doc, "cd");

        // Start moves forward into "cd", end stays at the end of "ab"
        let resolved = resolve_str(&doc, "epubcfi(/6/4!/4/2,/1:2,/1:4)").unwrap();
        assert_eq!(resolved.span.start, Position::new(cd, 0));
        assert_eq!(resolved.span.text(), "cd");

        let resolved = resolve_str(&doc, "epubcfi(/6/4!/4/2,/1:0,/1:2)").unwrap();
        assert_eq!(resolved.span.end, Position::new(ab, 2));
        assert_eq!(resolved.span.text(), "ab");
    }

    #[test]
    fn test_offsets_count_utf16_units() {
        let doc = parse_xhtml("<html><head/><body><p>\u{1F600}abc</p></body></html>").unwrap();
        let text = text_node(&doc, "\u{1F600}abc");

        let a = resolve_str(&doc, "epubcfi(/6/4!/4/2/1:2)").unwrap();
        assert_eq!(a.span.text(), "a");

        // Both halves of the surrogate pair address the whole character
        for offset in [0, 1] {
            let cfi = format!("epubcfi(/6/4!/4/2/1:{})", offset);
            let emoji = resolve_str(&doc, &cfi).unwrap();
            assert_eq!(emoji.span.start, Position::new(text, 0));
            assert_eq!(emoji.span.end, Position::new(text, 2));
            assert_eq!(emoji.span.text(), "\u{1F600}");
        }
    }

    #[test]
    fn test_point_span_is_one_character() {
        let doc = parse_xhtml(CHAPTER).unwrap();
        let resolved = resolve_str(&doc, "epubcfi(/6/4!/4/2/1:6)").unwrap();
        let text = text_node(&doc, "First paragraph");
        assert_eq!(resolved.span.start, Position::new(text, 6));
        assert_eq!(resolved.span.end, Position::new(text, 7));
        assert_eq!(resolved.span.text(), "p");
    }

    #[test]
    fn test_point_offset_clamped_at_end_of_text() {
        let doc = parse_xhtml(CHAPTER).unwrap();
        let text = text_node(&doc, "First paragraph");
        let len = "First paragraph".len();

        let at_end = resolve_str(&doc, &format!("epubcfi(/6/4!/4/2/1:{})", len)).unwrap();
        assert_eq!(at_end.span.start, Position::new(text, len - 1));
        assert_eq!(at_end.span.end, Position::new(text, len));

        let beyond = resolve_str(&doc, "epubcfi(/6/4!/4/2/1:500)").unwrap();
        assert_eq!(beyond.span.end, Position::new(text, len));
    }

    #[test]
    fn test_point_on_empty_element() {
        let doc = parse_xhtml(CHAPTER).unwrap();
        assert_eq!(
            resolve_str(&doc, "epubcfi(/6/4!/4/6)"),
            Err(CfiError::EmptyTarget)
        );
    }

    #[test]
    fn test_range_resolution() {
        let doc = parse_xhtml(CHAPTER).unwrap();
        let resolved = resolve_str(&doc, "epubcfi(/6/4!/4,/2/1:6,/4/2/1:2)").unwrap();
        assert_eq!(resolved.kind, SpanKind::Range);
        assert_eq!(resolved.target, by_id(&doc, "body"));
        assert_eq!(
            resolved.span.start,
            Position::new(text_node(&doc, "First paragraph"), 6)
        );
        assert_eq!(resolved.span.end, Position::new(text_node(&doc, "Lead"), 2));
    }

    #[test]
    fn test_out_of_bounds_step() {
        let doc = parse_xhtml(CHAPTER).unwrap();
        assert!(matches!(
            resolve_str(&doc, "epubcfi(/6/4!/4/40)"),
            Err(CfiError::UnresolvableStep { index: 40, depth: 1 })
        ));
        // Text nodes have no children
        assert!(matches!(
            resolve_str(&doc, "epubcfi(/6/4!/4/2/1/2)"),
            Err(CfiError::UnresolvableStep { .. })
        ));
    }

    #[test]
    fn test_wrong_spine_index() {
        let doc = parse_xhtml(CHAPTER).unwrap();
        assert!(matches!(
            resolve_str(&doc, "epubcfi(/4/4!/4/2)"),
            Err(CfiError::Malformed(_))
        ));
        assert!(matches!(
            resolve_str(&doc, "epubcfi(/6)"),
            Err(CfiError::Malformed(_))
        ));
    }

    #[test]
    fn test_assertion_mismatch_is_tolerated() {
        let doc = parse_xhtml(CHAPTER).unwrap();
        let resolved = resolve_str(&doc, "epubcfi(/6/4!/4/2[wrong])").unwrap();
        assert_eq!(resolved.target, by_id(&doc, "p1"));
    }

    #[test]
    fn test_resolved_cfi_canonical_key() {
        let doc = parse_xhtml(CHAPTER).unwrap();
        let address = Arc::new(parse("  epubcfi(/6/4!/4/2/1:0)").unwrap());
        let cfi = ResolvedCfi::new(address, doc.root_element()).unwrap();
        assert_eq!(cfi.as_str(), "epubcfi(/6/4!/4/2/1:0)");
        assert!(!cfi.is_range());
        assert_eq!(cfi.safe_ranges().len(), 1);
        assert_eq!(cfi.text(), "F");
    }
}
