//! Annotation module
//!
//! Associates resolved CFIs with annotation metadata for one content
//! document.
//!
//! # Features
//!
//! - Annotation types:
//!   - Highlights
//!   - Notes
//!   - Bookmarks
//!
//! - One annotation per canonical CFI string; adding at an existing CFI
//!   replaces the previous annotation
//! - Listener callbacks on every addition and removal
//! - Re-anchoring when the document is reloaded

mod registry;
mod types;

pub use registry::{AnnotationListener, AnnotationRegistry, CfiInput, RemoveTarget};
pub use types::{
    Annotation, AnnotationColor, AnnotationProps, AnnotationSnapshot, AnnotationStyle,
    AnnotationType,
};
