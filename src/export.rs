//! CSS-safe identifiers derived from CFI strings
//!
//! Renderers tag the elements they create for an annotation (highlight
//! wrappers, note icons) with an identifier derived from its CFI, so they
//! can find and clear them later.

use std::fmt::Write;

/// Encode `cfi` as a valid CSS identifier / class name
///
/// The mapping is injective: lowercase ASCII letters and digits pass
/// through, a space becomes `-`, an uppercase letter becomes `_` followed by
/// its lowercase form, and anything else becomes `__` plus four hex digits
/// per UTF-16 code unit.
pub fn css_safe_id(cfi: &str) -> String {
    let mut out = String::with_capacity(cfi.len() * 2);
    for ch in cfi.chars() {
        match ch {
            'a'..='z' | '0'..='9' => out.push(ch),
            ' ' => out.push('-'),
            'A'..='Z' => {
                out.push('_');
                out.push(ch.to_ascii_lowercase());
            }
            _ => {
                let mut units = [0u16; 2];
                for unit in ch.encode_utf16(&mut units) {
                    // Writing to a String cannot fail
                    let _ = write!(out, "__{:04x}", unit);
                }
            }
        }
    }
    out
}

/// Compact, lossy attribute value for a CFI
///
/// `:`, `/` and `,` become `_`; `!`, parentheses and brackets are dropped.
/// Distinct CFIs may collide, use [`css_safe_id`] where that matters.
pub fn safe_attr(cfi: &str) -> String {
    cfi.chars()
        .filter(|ch| !matches!(ch, '!' | '(' | ')' | '[' | ']'))
        .map(|ch| match ch {
            ':' | '/' | ',' => '_',
            other => other,
        })
        .collect()
}
