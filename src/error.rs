//! Error types for the CFI engine

use thiserror::Error;

/// Engine-wide result type
pub type Result<T> = std::result::Result<T, CfiError>;

/// Errors raised while parsing, resolving or loading content for a CFI
///
/// Every failure is local to one operation: a failed parse is never cached
/// and a failed resolution never reaches the annotation registry.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CfiError {
    /// The string is not an `epubcfi(...)` address, or a step is unreadable
    #[error("Malformed CFI: {0}")]
    Malformed(String),

    /// A step points at a child the document does not have
    #[error("Unresolvable step /{index} at depth {depth}")]
    UnresolvableStep { index: u32, depth: usize },

    /// A point address landed on a node with nothing to span
    #[error("CFI target has no content to span")]
    EmptyTarget,

    /// The content document could not be loaded
    #[error("XML parsing error: {0}")]
    Xml(String),
}

impl CfiError {
    pub(crate) fn malformed(msg: impl Into<String>) -> Self {
        CfiError::Malformed(msg.into())
    }

    /// Whether the address is well formed but the document no longer matches it
    ///
    /// These mark an annotation as stale after the document changed, as opposed
    /// to a corrupt address.
    pub fn is_not_found(&self) -> bool {
        matches!(self, CfiError::UnresolvableStep { .. } | CfiError::EmptyTarget)
    }
}

impl From<roxmltree::Error> for CfiError {
    fn from(err: roxmltree::Error) -> Self {
        CfiError::Xml(err.to_string())
    }
}
