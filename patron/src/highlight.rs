//! Highlight rendering
//!
//! Lays a flat list of occurrence offsets over the document text and produces
//! the ordered plain/highlighted fragments the view draws. Offsets come from the
//! remote service, so they are checked before any slicing happens.
//!
//! Positions are character (Unicode scalar) indices, the same unit the service
//! reports. Slicing converts them to byte boundaries in a single forward pass.

use crate::interface::{Fragment, RenderInconsistency};

/// Check that `offsets` describe ascending, non-overlapping matches of
/// `pattern_len` characters that all fit inside a text of `text_len` characters.
pub fn validate_offsets(text_len: usize, offsets: &[usize], pattern_len: usize) -> Result<(), RenderInconsistency> {
    if offsets.is_empty() {
        return Ok(());
    }
    if pattern_len == 0 {
        return Err(RenderInconsistency::EmptyPattern);
    }

    let mut previous: Option<usize> = None;
    for &offset in offsets {
        if offset.checked_add(pattern_len).map_or(true, |end| end > text_len) {
            return Err(RenderInconsistency::OutOfBounds { offset, pattern_len, text_len });
        }
        if let Some(prev) = previous {
            if offset <= prev {
                return Err(RenderInconsistency::Unordered { previous: prev, offset });
            }
            let previous_end = prev + pattern_len;
            if offset < previous_end {
                return Err(RenderInconsistency::Overlapping { previous_end, offset });
            }
        }
        previous = Some(offset);
    }
    Ok(())
}

/// Split `text` into fragments, highlighting `pattern_len` characters at each offset.
///
/// Empty plain runs (adjacent matches, a match at either end) are elided. With no
/// offsets the whole text comes back as a single plain fragment.
pub fn render(text: &str, offsets: &[usize], pattern_len: usize) -> Result<Vec<Fragment>, RenderInconsistency> {
    if offsets.is_empty() {
        return Ok(vec![Fragment::plain(text)]);
    }

    let text_len = text.chars().count();
    validate_offsets(text_len, offsets, pattern_len)?;

    let mut fragments = Vec::with_capacity(offsets.len() * 2 + 1);
    let mut boundaries = CharBoundaries::new(text);
    let mut cursor = 0usize;

    for &offset in offsets {
        let start = boundaries.byte_at(offset);
        let end = boundaries.byte_at(offset + pattern_len);
        if start > cursor {
            fragments.push(Fragment::plain(&text[cursor..start]));
        }
        fragments.push(Fragment::highlighted(&text[start..end]));
        cursor = end;
    }

    if cursor < text.len() {
        fragments.push(Fragment::plain(&text[cursor..]));
    }

    Ok(fragments)
}

/// Forward-only char index → byte index conversion.
/// Callers must ask for non-decreasing positions.
struct CharBoundaries<'a> {
    text: &'a str,
    chars: std::str::CharIndices<'a>,
    char_pos: usize,
    byte_pos: usize,
}

impl<'a> CharBoundaries<'a> {
    fn new(text: &'a str) -> Self {
        Self { text, chars: text.char_indices(), char_pos: 0, byte_pos: 0 }
    }

    fn byte_at(&mut self, char_pos: usize) -> usize {
        while self.char_pos < char_pos {
            match self.chars.next() {
                Some((idx, ch)) => {
                    self.byte_pos = idx + ch.len_utf8();
                    self.char_pos += 1;
                }
                None => return self.text.len(),
            }
        }
        self.byte_pos
    }
}
