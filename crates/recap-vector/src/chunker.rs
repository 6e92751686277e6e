//! Deterministic overlapping chunker for transcript text.
//!
//! Splits a transcript into chunks of at most `size` characters where
//! each chunk after the first starts `size - overlap` characters past
//! the previous chunk's start, so consecutive chunks share `overlap`
//! characters of context across the boundary.

use recap_core::error::{RecapError, Result};

/// Split `text` into overlapping chunks.
///
/// Character-based (not byte-based) so multi-byte UTF-8 input never
/// splits inside a code point. Empty input yields zero chunks; any
/// non-empty input yields at least one. The same input and parameters
/// always yield the same sequence.
///
/// Fails with a config error when `size == 0` or `overlap >= size`,
/// since the step between chunk starts must be positive.
pub fn split(text: &str, size: usize, overlap: usize) -> Result<Vec<String>> {
    if size == 0 {
        return Err(RecapError::Config(
            "chunk size must be greater than zero".to_string(),
        ));
    }
    if overlap >= size {
        return Err(RecapError::Config(format!(
            "overlap {} must be smaller than chunk size {}",
            overlap, size
        )));
    }

    let chars: Vec<char> = text.chars().collect();
    if chars.is_empty() {
        return Ok(Vec::new());
    }

    let step = size - overlap;
    let mut chunks = Vec::with_capacity(chars.len() / step + 1);
    let mut start = 0;

    loop {
        let end = (start + size).min(chars.len());
        chunks.push(chars[start..end].iter().collect());
        if end == chars.len() {
            break;
        }
        start += step;
    }

    Ok(chunks)
}
