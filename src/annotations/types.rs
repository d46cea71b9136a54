//! Annotation types
//!
//! An annotation is a resolved CFI plus the metadata a renderer needs to
//! draw it. Style and color are symbolic; mapping them to pixels is the
//! renderer's business.

use serde::{Deserialize, Serialize};

use crate::cfi::{ResolvedCfi, SpanKind};
use crate::dom::DomNode;
use crate::export;

/// Types of annotations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnnotationType {
    /// Text highlight
    Highlight,
    /// Bookmark (position marker)
    Bookmark,
    /// Text note with content
    Note,
}

/// How an annotation is drawn
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnnotationStyle {
    #[default]
    None,
    Icon,
    Highlight,
    Underline,
    #[serde(rename = "margin-left")]
    MarginLeft,
    #[serde(rename = "margin-right")]
    MarginRight,
}

/// Symbolic annotation color
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnnotationColor {
    #[default]
    None,
    Yellow,
    Pink,
    Red,
    Purple,
    Blue,
    Green,
    Black,
}

/// Metadata attached to a CFI
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnnotationProps {
    /// Type of annotation
    #[serde(rename = "type")]
    pub annotation_type: AnnotationType,
    pub style: AnnotationStyle,
    pub color: AnnotationColor,
    /// Note body
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

impl AnnotationProps {
    /// A yellow highlight
    pub fn highlight() -> Self {
        Self {
            annotation_type: AnnotationType::Highlight,
            style: AnnotationStyle::Highlight,
            color: AnnotationColor::Yellow,
            text: None,
        }
    }

    /// A bookmark drawn as an icon
    pub fn bookmark() -> Self {
        Self {
            annotation_type: AnnotationType::Bookmark,
            style: AnnotationStyle::Icon,
            color: AnnotationColor::None,
            text: None,
        }
    }

    /// A note with its body text
    pub fn note(text: impl Into<String>) -> Self {
        Self {
            annotation_type: AnnotationType::Note,
            style: AnnotationStyle::Icon,
            color: AnnotationColor::Yellow,
            text: Some(text.into()),
        }
    }

    /// Set the color
    pub fn with_color(mut self, color: AnnotationColor) -> Self {
        self.color = color;
        self
    }

    /// Set the style
    pub fn with_style(mut self, style: AnnotationStyle) -> Self {
        self.style = style;
        self
    }

    /// Set the note text
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }
}

/// An annotation anchored in the current document
#[derive(Debug, Clone)]
pub struct Annotation<N> {
    pub cfi: ResolvedCfi<N>,
    pub props: AnnotationProps,
}

impl<N: DomNode> Annotation<N> {
    pub fn new(cfi: ResolvedCfi<N>, props: AnnotationProps) -> Self {
        Self { cfi, props }
    }

    /// Registry key: the canonical CFI string
    pub fn key(&self) -> &str {
        self.cfi.as_str()
    }

    pub fn annotation_type(&self) -> AnnotationType {
        self.props.annotation_type
    }

    /// Identifier for the elements a renderer creates for this annotation
    pub fn css_id(&self) -> String {
        export::css_safe_id(self.key())
    }

    /// Serializable view, detached from the document
    pub fn snapshot(&self) -> AnnotationSnapshot {
        AnnotationSnapshot {
            cfi: self.key().to_string(),
            kind: if self.cfi.is_range() {
                SpanKind::Range
            } else {
                SpanKind::Point
            },
            props: self.props.clone(),
            quote: self.cfi.text(),
        }
    }
}

/// JSON-friendly view of an annotation
///
/// For inspection and debugging; it is not read back.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnnotationSnapshot {
    pub cfi: String,
    pub kind: SpanKind,
    #[serde(flatten)]
    pub props: AnnotationProps,
    /// Text covered by the annotation
    pub quote: String,
}
