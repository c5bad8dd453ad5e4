//! Turns free-form oracle text into a typed [`Strategy`].
//!
//! This is the only place where untyped model output is interpreted. The
//! response may wrap the JSON in a fenced block, surround it with prose, or
//! follow it with unrelated braces; anything that does not yield a strategy
//! document is a [`DecodeError`].

use crate::error::DecodeError;
use crate::strategy::Strategy;
use regex::Regex;
use std::sync::LazyLock;

static FENCED_BLOCK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)```(?:json)?\s*\n?(.*?)\n?```").expect("fenced block pattern is valid")
});

/// Decodes a strategy from raw oracle text
pub fn decode_strategy(text: &str) -> Result<Strategy, DecodeError> {
    let candidate = extract_json(text).ok_or_else(|| DecodeError::NoJson {
        excerpt: crate::utils::truncate_chars(text, 200),
    })?;
    let strategy = serde_json::from_str(candidate)?;
    Ok(strategy)
}

/// Finds the first syntactically valid JSON document in `text`.
///
/// A fenced block wins when its interior parses. Otherwise the first `{` or
/// `[` is matched to its closing bracket by depth counting, ignoring brackets
/// inside string literals.
pub fn extract_json(text: &str) -> Option<&str> {
    if let Some(captures) = FENCED_BLOCK.captures(text) {
        if let Some(inner) = captures.get(1) {
            let candidate = inner.as_str().trim();
            if is_valid_json(candidate) {
                return Some(candidate);
            }
        }
    }

    let candidate = balanced_span(text)?;
    is_valid_json(candidate).then_some(candidate)
}

/// Returns the bracket-balanced span starting at the first `{` or `[`
fn balanced_span(text: &str) -> Option<&str> {
    let (start, open, close) = match (text.find('{'), text.find('[')) {
        (None, None) => return None,
        (Some(brace), Some(bracket)) if bracket < brace => (bracket, b'[', b']'),
        (Some(brace), _) => (brace, b'{', b'}'),
        (None, Some(bracket)) => (bracket, b'[', b']'),
    };

    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    // Only ASCII bytes are inspected, so slicing at their positions is always
    // on a char boundary.
    for (offset, &byte) in text.as_bytes()[start..].iter().enumerate() {
        if escaped {
            escaped = false;
            continue;
        }
        if in_string {
            match byte {
                b'\\' => escaped = true,
                b'"' => in_string = false,
                _ => {}
            }
            continue;
        }
        if byte == b'"' {
            in_string = true;
        } else if byte == open {
            depth += 1;
        } else if byte == close {
            depth -= 1;
            if depth == 0 {
                return Some(&text[start..=start + offset]);
            }
        }
    }
    None
}

fn is_valid_json(candidate: &str) -> bool {
    serde_json::from_str::<serde_json::Value>(candidate).is_ok()
}
