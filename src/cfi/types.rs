//! CFI (Canonical Fragment Identifier) types for EPUB
//!
//! EPUB CFI is a standardized way to reference specific locations within EPUB publications.
//! Format: epubcfi(/6/4[chap01ref]!/4/2/22/3:268)
//!
//! Reference: <https://idpf.org/epub/linking/cfi/epub-cfi.html>

use serde::{Deserialize, Serialize};
use std::fmt;

/// Step index of the spine element inside the package document.
///
/// Every content-document CFI starts with `/6/N!`: the spine is the third
/// element child of `<package>` and `N` picks the spine item.
pub const SPINE_STEP_INDEX: u32 = 6;

/// A single step in a CFI path
///
/// Markers are independent: one step may carry an assertion, an offset and
/// a redirection at the same time (`/4[chap01]!`, `/3:12`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Step {
    /// 1-based child index; even for elements, odd for text
    pub index: u32,
    /// ID assertion `[id]`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assertion: Option<String>,
    /// Character offset `:n` within the addressed text
    #[serde(skip_serializing_if = "Option::is_none")]
    pub offset: Option<usize>,
    /// Indirection `!` into the referenced document
    pub redirection: bool,
}

/// A parsed CFI: parent steps plus optional range start/end steps
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ParsedAddress {
    /// Path to the common ancestor (or the target itself for a point)
    pub parent: Vec<Step>,
    /// Range start, relative to the parent; empty for a point
    pub start: Vec<Step>,
    /// Range end, relative to the parent; empty for a point
    pub end: Vec<Step>,
}

impl Step {
    /// Create a plain step
    pub fn new(index: u32) -> Self {
        Self {
            index,
            assertion: None,
            offset: None,
            redirection: false,
        }
    }

    /// Create a step with ID assertion
    pub fn with_id(index: u32, id: impl Into<String>) -> Self {
        Self {
            assertion: Some(id.into()),
            ..Self::new(index)
        }
    }

    /// Create a text step with a character offset
    pub fn with_offset(index: u32, offset: usize) -> Self {
        Self {
            offset: Some(offset),
            ..Self::new(index)
        }
    }

    /// Mark this step as an indirection into the referenced document
    pub fn redirected(mut self) -> Self {
        self.redirection = true;
        self
    }

    /// Even indices address elements
    pub fn is_element(&self) -> bool {
        self.index % 2 == 0
    }

    /// Odd indices address text
    pub fn is_text(&self) -> bool {
        !self.is_element()
    }
}

impl ParsedAddress {
    /// A point address
    pub fn point(parent: Vec<Step>) -> Self {
        Self {
            parent,
            start: Vec::new(),
            end: Vec::new(),
        }
    }

    /// A ranged address
    pub fn range(parent: Vec<Step>, start: Vec<Step>, end: Vec<Step>) -> Self {
        Self { parent, start, end }
    }

    /// Check if this address represents a range (text selection)
    pub fn is_range(&self) -> bool {
        !self.start.is_empty() || !self.end.is_empty()
    }

    /// Get the spine index if this CFI references a spine item
    ///
    /// `/6/N` maps to the 0-based spine index `N/2 - 1`.
    pub fn spine_index(&self) -> Option<usize> {
        match self.parent.as_slice() {
            [first, second, ..] if first.index == SPINE_STEP_INDEX && second.index >= 2 => {
                Some((second.index / 2 - 1) as usize)
            }
            _ => None,
        }
    }

    /// The ID assertion of the spine item step, usually the itemref idref
    pub fn spine_item_id(&self) -> Option<&str> {
        self.parent.get(1).and_then(|s| s.assertion.as_deref())
    }
}

/// Escape CFI special characters inside an assertion
pub(crate) fn escape_assertion(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for ch in value.chars() {
        if matches!(ch, '^' | '[' | ']' | '(' | ')' | ',' | ';') {
            out.push('^');
        }
        out.push(ch);
    }
    out
}

// Display implementations for serialization

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "/{}", self.index)?;
        if let Some(ref id) = self.assertion {
            write!(f, "[{}]", escape_assertion(id))?;
        }
        if let Some(offset) = self.offset {
            write!(f, ":{}", offset)?;
        }
        if self.redirection {
            write!(f, "!")?;
        }
        Ok(())
    }
}

/// Render a step list as a path (`/4/2/1:3`)
pub struct Path<'a>(pub &'a [Step]);

impl fmt::Display for Path<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for step in self.0 {
            write!(f, "{}", step)?;
        }
        Ok(())
    }
}

impl fmt::Display for ParsedAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "epubcfi({}", Path(&self.parent))?;
        if self.is_range() {
            write!(f, ",{},{}", Path(&self.start), Path(&self.end))?;
        }
        write!(f, ")")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simple_cfi_display() {
        let cfi = ParsedAddress::point(vec![
            Step::new(6),
            Step::new(4).redirected(),
            Step::new(4),
            Step::new(2),
        ]);

        assert_eq!(cfi.to_string(), "epubcfi(/6/4!/4/2)");
    }

    #[test]
    fn test_cfi_with_id_assertion() {
        let cfi = ParsedAddress::point(vec![
            Step::new(6),
            Step::with_id(4, "chapter1").redirected(),
            Step::new(4),
        ]);

        assert_eq!(cfi.to_string(), "epubcfi(/6/4[chapter1]!/4)");
    }

    #[test]
    fn test_range_display() {
        let cfi = ParsedAddress::range(
            vec![Step::new(6), Step::new(4).redirected(), Step::new(4), Step::new(2)],
            vec![Step::with_offset(1, 0)],
            vec![Step::with_offset(1, 10)],
        );

        assert!(cfi.is_range());
        assert_eq!(cfi.to_string(), "epubcfi(/6/4!/4/2,/1:0,/1:10)");
    }

    #[test]
    fn test_assertion_escaping() {
        let step = Step::with_id(2, "a,b[c]");
        assert_eq!(step.to_string(), "/2[a^,b^[c^]]");
    }

    #[test]
    fn test_spine_index_extraction() {
        let cfi = ParsedAddress::point(vec![
            Step::new(6),
            Step::with_id(4, "ch2").redirected(),
            Step::new(4),
        ]);
        assert_eq!(cfi.spine_index(), Some(1));
        assert_eq!(cfi.spine_item_id(), Some("ch2"));

        let cfi2 = ParsedAddress::point(vec![Step::new(6), Step::new(2)]);
        assert_eq!(cfi2.spine_index(), Some(0));

        let not_spine = ParsedAddress::point(vec![Step::new(4), Step::new(2)]);
        assert_eq!(not_spine.spine_index(), None);
    }

    #[test]
    fn test_parity() {
        assert!(Step::new(2).is_element());
        assert!(Step::new(3).is_text());
    }
}
