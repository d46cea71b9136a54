//! Los Libros CFI engine
//!
//! Addresses locations and ranges inside EPUB content documents with EPUB
//! Canonical Fragment Identifiers.
//!
//! # Modules
//!
//! - `cfi`: parsing, resolution, generation, comparison and safe ranges
//! - `annotations`: in-memory annotation registry keyed by CFI
//! - `dom`: the document tree seam, implemented for `roxmltree`
//! - `export`: CSS-safe identifiers derived from CFIs
//! - `config`: engine settings from the environment

pub mod annotations;
pub mod cfi;
pub mod config;
pub mod dom;
pub mod error;
pub mod export;

pub use error::{CfiError, Result};
