//! Embedding input sanitization

use crate::error::{Error, Result};

/// Default cap on sanitized embedding input, in characters
pub const DEFAULT_MAX_INPUT_LEN: usize = 500;

/// Clean a text for use as embedding input.
///
/// Trims the input, strips control characters (U+0000..U+001F and U+007F),
/// collapses whitespace runs into single spaces, and caps the result at
/// `max_len` characters. An input with nothing left after cleaning is
/// rejected with [`Error::Sanitize`].
pub fn sanitize_embedding_input(input: &str, max_len: usize) -> Result<String> {
    let trimmed = input.trim();

    let mut clean = String::with_capacity(trimmed.len());
    let mut in_whitespace = false;

    for c in trimmed.chars() {
        if matches!(c, '\u{00}'..='\u{1F}' | '\u{7F}') {
            continue;
        }
        if c.is_whitespace() {
            if !in_whitespace {
                clean.push(' ');
                in_whitespace = true;
            }
        } else {
            clean.push(c);
            in_whitespace = false;
        }
    }

    let capped: String = clean.chars().take(max_len).collect();

    if capped.is_empty() {
        return Err(Error::Sanitize(
            "input is empty after sanitization".to_string(),
        ));
    }

    Ok(capped)
}
