//! CFI (Canonical Fragment Identifier) module for EPUB
//!
//! This module provides parsing, resolution, generation, and comparison of
//! EPUB CFI strings, plus decomposition of resolved spans into ranges that
//! never cross an element boundary.
//!
//! # Example CFI
//!
//! ```text
//! epubcfi(/6/4[chapter1]!/4/2/1:42)
//!         │  │          │ │ │ │ └── character offset 42
//!         │  │          │ │ │ └──── text node (odd = text)
//!         │  │          │ │ └────── element index
//!         │  │          │ └──────── element index (body)
//!         │  │          └────────── indirection (into content doc)
//!         │  └───────────────────── spine item with ID
//!         └──────────────────────── spine element
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use los_libros_cfi::cfi::{parse, resolve, cfi_for_range, DocumentStep};
//!
//! let doc = los_libros_cfi::dom::parse_xhtml(xhtml)?;
//! let address = parse("epubcfi(/6/4!/4/2/1:42)")?;
//! let resolved = resolve(&address, doc.root_element())?;
//!
//! // Generate it back from the resolved span
//! let again = cfi_for_range(&DocumentStep::for_spine_item(1, None), &resolved.span);
//! ```

mod cache;
mod comparator;
mod generator;
mod parser;
mod range;
mod resolver;
mod safe_range;
mod types;

// Re-export main types
pub use types::{ParsedAddress, Path, Step, SPINE_STEP_INDEX};

// Re-export parser functions
pub use parser::{parse, try_parse};

pub use cache::{CacheStats, ParseCache, DEFAULT_CACHE_CAPACITY};

pub use range::{Position, SafeRange, Span};

pub use resolver::{resolve, resolve_steps, ResolvedCfi, ResolvedSpan, SpanKind};

pub use safe_range::decompose;

// Re-export generator
pub use generator::{
    cfi_for_position, cfi_for_range, content_cfi_for_range, steps_for_node, steps_for_position,
    CfiBuilder, DocumentStep,
};

// Re-export comparator functions
pub use comparator::{
    compare_cfi_strings, compare_positions, compare_steps, is_after, is_before, is_in_range,
};
