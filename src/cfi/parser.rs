//! CFI Parser
//!
//! Parses EPUB CFI strings into parent/start/end step lists.
//!
//! Grammar (as accepted here):
//! ```text
//! cfi       = "epubcfi(" path ["," path "," path] ")"
//! path      = step+
//! step      = "/" number [assertion] [":" number] ["!"]
//! assertion = "[" text "]"          ; "^" escapes the next character
//! ```
//!
//! Splitting on `,` and `/` is bracket-aware: separators inside an assertion
//! never split the address.

use super::types::*;
use crate::error::{CfiError, Result};

const PREFIX: &str = "epubcfi(";

/// Parse a CFI string into a [`ParsedAddress`]
pub fn parse(input: &str) -> Result<ParsedAddress> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CfiError::malformed("empty CFI string"));
    }

    let body = input
        .strip_prefix(PREFIX)
        .ok_or_else(|| CfiError::malformed("CFI must start with 'epubcfi('"))?
        .strip_suffix(')')
        .ok_or_else(|| CfiError::malformed("CFI must end with ')'"))?;

    if body.is_empty() {
        return Err(CfiError::malformed("CFI has an empty path"));
    }

    let components = split_unbracketed(body, ',')?;
    match components.as_slice() {
        [path] => Ok(ParsedAddress::point(parse_path(path)?)),
        [parent, start, end] => {
            let parent = parse_path(parent)?;
            let start = parse_path(start)?;
            let end = parse_path(end)?;
            Ok(ParsedAddress::range(parent, start, end))
        }
        other => Err(CfiError::malformed(format!(
            "expected 1 or 3 range components, found {}",
            other.len()
        ))),
    }
}

/// Parse a CFI string, returning `None` on failure
pub fn try_parse(input: &str) -> Option<ParsedAddress> {
    parse(input).ok()
}

/// Split `input` on `sep`, ignoring separators inside `[...]` and escaped ones
fn split_unbracketed(input: &str, sep: char) -> Result<Vec<&str>> {
    let mut parts = Vec::new();
    let mut in_assertion = false;
    let mut escaped = false;
    let mut start = 0;

    for (pos, ch) in input.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match ch {
            '^' => escaped = true,
            '[' if !in_assertion => in_assertion = true,
            ']' if in_assertion => in_assertion = false,
            c if c == sep && !in_assertion => {
                parts.push(&input[start..pos]);
                start = pos + c.len_utf8();
            }
            _ => {}
        }
    }

    if in_assertion {
        return Err(CfiError::malformed(format!("unclosed assertion in '{}'", input)));
    }

    parts.push(&input[start..]);
    Ok(parts)
}

/// Parse one range component (`/4/2[id]/1:10`) into steps
pub(crate) fn parse_path(path: &str) -> Result<Vec<Step>> {
    if !path.starts_with('/') {
        return Err(CfiError::malformed(format!(
            "path component '{}' must start with '/'",
            path
        )));
    }

    split_unbracketed(path, '/')?
        .into_iter()
        .filter(|raw| !raw.is_empty())
        .map(parse_step)
        .collect()
}

/// Parse a single step string without its leading `/`
fn parse_step(raw: &str) -> Result<Step> {
    let digits_end = raw
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(raw.len());
    let index: u32 = raw[..digits_end]
        .parse()
        .map_err(|_| CfiError::malformed(format!("step '{}' has no index", raw)))?;
    if index == 0 {
        return Err(CfiError::malformed(format!("step '{}' has index 0", raw)));
    }

    let mut step = Step::new(index);
    let mut chars = raw[digits_end..].chars().peekable();

    while let Some(ch) = chars.next() {
        match ch {
            '[' => {
                let mut content = String::new();
                let mut closed = false;
                while let Some(c) = chars.next() {
                    match c {
                        '^' => {
                            if let Some(escaped) = chars.next() {
                                content.push(escaped);
                            }
                        }
                        ']' => {
                            closed = true;
                            break;
                        }
                        _ => content.push(c),
                    }
                }
                if !closed {
                    return Err(CfiError::malformed(format!(
                        "unclosed assertion in step '{}'",
                        raw
                    )));
                }
                // Only the first bracket is the ID assertion; later ones are
                // text-location assertions which this engine does not use.
                if step.assertion.is_none() {
                    step.assertion = Some(content);
                }
            }
            ':' => {
                let mut digits = String::new();
                while let Some(c) = chars.peek().copied().filter(char::is_ascii_digit) {
                    digits.push(c);
                    chars.next();
                }
                let offset = digits.parse().map_err(|_| {
                    CfiError::malformed(format!("step '{}' has an invalid offset", raw))
                })?;
                step.offset = Some(offset);
            }
            '!' => step.redirection = true,
            other => {
                return Err(CfiError::malformed(format!(
                    "unexpected character '{}' in step '{}'",
                    other, raw
                )))
            }
        }
    }

    Ok(step)
}
