//! CFI Generator
//!
//! Generates CFIs from document positions and selections. Step indices are
//! computed with the same child-indexing rule the resolver walks with, so a
//! generated CFI resolves back to the position it was generated from.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::parser;
use super::range::{Position, Span};
use super::resolver::text_run;
use super::types::*;
use crate::dom::{DomNode, NodeKind};
use crate::error::{CfiError, Result};

/// Builder for constructing CFIs programmatically
#[derive(Debug, Clone, Default)]
pub struct CfiBuilder {
    steps: Vec<Step>,
}

impl CfiBuilder {
    /// Create a new CFI builder
    pub fn new() -> Self {
        Self::default()
    }

    /// Add the spine step of the package document (`/6`)
    pub fn package_step(self) -> Self {
        self.step(Step::new(SPINE_STEP_INDEX))
    }

    /// Add a spine item step (converts 0-based index to CFI format)
    /// CFI uses 1-based even numbering: index 0 -> /2, index 1 -> /4, etc.
    pub fn spine_item(self, index: usize) -> Self {
        self.step(Step::new(element_index(index)))
    }

    /// Add a spine item step with ID assertion
    pub fn spine_item_with_id(self, index: usize, id: impl Into<String>) -> Self {
        self.step(Step::with_id(element_index(index), id))
    }

    /// Mark the last step as an indirection into the referenced document
    pub fn indirection(mut self) -> Self {
        if let Some(last) = self.steps.last_mut() {
            last.redirection = true;
        }
        self
    }

    /// Add an element step (0-based element position among its siblings)
    pub fn element(self, index: usize) -> Self {
        self.step(Step::new(element_index(index)))
    }

    /// Add an element step with ID assertion
    pub fn element_with_id(self, index: usize, id: impl Into<String>) -> Self {
        self.step(Step::with_id(element_index(index), id))
    }

    /// Add a text step; `index` counts the elements preceding the text
    /// First text -> /1, text after the first element -> /3, etc.
    pub fn text_node(self, index: usize) -> Self {
        self.step(Step::new((index * 2 + 1) as u32))
    }

    /// Set the character offset of the last step
    pub fn character_offset(mut self, offset: usize) -> Self {
        if let Some(last) = self.steps.last_mut() {
            last.offset = Some(offset);
        }
        self
    }

    /// Append a raw step
    pub fn step(mut self, step: Step) -> Self {
        self.steps.push(step);
        self
    }

    /// Build a point address
    pub fn build(self) -> ParsedAddress {
        ParsedAddress::point(self.steps)
    }

    /// Build a range address using `self` as the parent path
    pub fn build_range(self, start: CfiBuilder, end: CfiBuilder) -> ParsedAddress {
        ParsedAddress::range(self.steps, start.steps, end.steps)
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }
}

fn element_index(position: usize) -> u32 {
    ((position + 1) * 2) as u32
}

/// Package part of a generated CFI, e.g. `/6/12[chap05]!`
///
/// Selects the spine item whose content document the positions belong to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentStep {
    steps: Vec<Step>,
}

impl DocumentStep {
    /// Document step for the 0-based spine item `index`
    pub fn for_spine_item(index: usize, idref: Option<&str>) -> Self {
        let builder = CfiBuilder::new().package_step();
        let builder = match idref {
            Some(id) => builder.spine_item_with_id(index, id),
            None => builder.spine_item(index),
        };
        Self {
            steps: builder.indirection().steps,
        }
    }

    /// Parse `/6/N[idref]!`; a missing `!` is added
    pub fn parse(input: &str) -> Result<Self> {
        let mut steps = parser::parse_path(input.trim())?;
        match steps.as_mut_slice() {
            [spine, item] if spine.index == SPINE_STEP_INDEX && item.is_element() => {
                item.redirection = true;
                item.offset = None;
                Ok(Self { steps })
            }
            _ => Err(CfiError::malformed(format!(
                "document step '{}' must look like /{}/N!",
                input, SPINE_STEP_INDEX
            ))),
        }
    }

    /// The document step a parsed address starts with
    pub fn of(address: &ParsedAddress) -> Option<Self> {
        match address.parent.as_slice() {
            [spine, item, ..] if spine.index == SPINE_STEP_INDEX => Some(Self {
                steps: vec![spine.clone(), item.clone().redirected()],
            }),
            _ => None,
        }
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    /// 0-based spine index
    pub fn spine_index(&self) -> usize {
        self.steps
            .get(1)
            .map(|step| (step.index / 2).saturating_sub(1) as usize)
            .unwrap_or(0)
    }
}

impl fmt::Display for DocumentStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", Path(&self.steps))
    }
}

impl FromStr for DocumentStep {
    type Err = CfiError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

/// Steps from the document element down to `node`
///
/// The document element itself contributes no step. A node outside any
/// element yields no steps; comments and processing instructions are
/// skipped since they cannot be addressed.
pub fn steps_for_node<N: DomNode>(node: N) -> Vec<Step> {
    let mut steps = Vec::new();
    let mut current = node;
    while let Some(parent) = current.parent_element() {
        if let Some(index) = step_index(current, parent) {
            steps.push(Step::new(index));
        }
        current = parent;
    }
    steps.reverse();
    steps
}

/// Steps for a boundary position, with its offset on the last step
///
/// Text offsets are rewritten relative to the text run the step addresses.
/// A position on the document element moves to the same boundary in one of
/// its addressable children, since the element itself has no step.
pub fn steps_for_position<N: DomNode>(position: &Position<N>) -> Vec<Step> {
    let position = &below_document_element(position);
    let mut steps = steps_for_node(position.node);
    if let (Some(offset), Some(last)) = (position.offset, steps.last_mut()) {
        last.offset = Some(if position.node.is_text() {
            run_offset(position.node, last.index, offset)
        } else {
            offset
        });
    }
    steps
}

/// Content-document part of the CFI for `span`
///
/// The parent path is the longest common prefix of both step lists that
/// leaves each side at least its final step. Identical start and end
/// collapse to a point address.
pub fn content_cfi_for_range<N: DomNode>(span: &Span<N>) -> ParsedAddress {
    let start = steps_for_position(&span.start);
    let end = steps_for_position(&span.end);

    let limit = start.len().min(end.len()).saturating_sub(1);
    let common = start
        .iter()
        .zip(&end)
        .take(limit)
        .take_while(|(a, b)| a.index == b.index)
        .count();

    let parent = start[..common].to_vec();
    let start_rel = start[common..].to_vec();
    let end_rel = end[common..].to_vec();

    if start_rel == end_rel {
        let mut steps = parent;
        steps.extend(start_rel);
        ParsedAddress::point(steps)
    } else {
        ParsedAddress::range(parent, start_rel, end_rel)
    }
}

/// Full CFI for `span` inside the content document selected by `document_step`
pub fn cfi_for_range<N: DomNode>(document_step: &DocumentStep, span: &Span<N>) -> ParsedAddress {
    let mut address = content_cfi_for_range(span);
    let mut parent = document_step.steps.clone();
    parent.append(&mut address.parent);
    address.parent = parent;

    tracing::trace!(cfi = %address, "generated CFI");
    address
}

/// Point CFI for a single position
pub fn cfi_for_position<N: DomNode>(
    document_step: &DocumentStep,
    position: &Position<N>,
) -> ParsedAddress {
    let mut parent = document_step.steps.clone();
    parent.extend(steps_for_position(position));
    ParsedAddress::point(parent)
}

/// `(element, k)` on the document element becomes the start of child `k`, or
/// the end of the last addressable child before it
fn below_document_element<N: DomNode>(position: &Position<N>) -> Position<N> {
    let node = position.node;
    let Some(offset) = position.offset else {
        return *position;
    };
    if !node.is_element() || node.parent_element().is_some() {
        return *position;
    }

    let children = node.child_nodes();
    if let Some(next) = children.iter().skip(offset).find(|c| c.is_addressable()) {
        return Position::new(*next, 0);
    }
    match children.iter().take(offset).rev().find(|c| c.is_addressable()) {
        Some(prev) => Position::new(*prev, prev.node_length()),
        None => *position,
    }
}

fn step_index<N: DomNode>(node: N, parent: N) -> Option<u32> {
    let elements_before = parent
        .child_nodes()
        .into_iter()
        .take_while(|child| *child != node)
        .filter(|child| child.is_element())
        .count() as u32;

    match node.node_kind() {
        NodeKind::Element => Some(2 * (elements_before + 1)),
        NodeKind::Text => Some(2 * elements_before + 1),
        NodeKind::Comment | NodeKind::Other => None,
    }
}

/// Offset within the text run at `index` for `offset` units into `node`
fn run_offset<N: DomNode>(node: N, index: u32, offset: usize) -> usize {
    let Some(parent) = node.parent_node() else {
        return offset;
    };
    let preceding: usize = text_run(parent, index)
        .into_iter()
        .take_while(|text| *text != node)
        .map(|text| text.node_length())
        .sum();
    preceding + offset
}
