//! Text position utilities for character offsets.
//!
//! Range map spans count Unicode scalar values (chars), while parsers and
//! string slicing work in UTF-8 bytes. [`CharIndex`] converts between the two
//! for one buffer.
//!
//! ## Coordinate Conventions
//!
//! - Lines and columns are **1-indexed** (matching editor conventions)
//! - Byte and char offsets are **0-indexed**

/// Byte/char offset conversion table for one text buffer.
#[derive(Debug, Clone)]
pub struct CharIndex {
    /// Byte offset of every char boundary, plus the buffer length at the end.
    boundaries: Vec<usize>,
}

impl CharIndex {
    pub fn new(text: &str) -> Self {
        let mut boundaries: Vec<usize> = text.char_indices().map(|(i, _)| i).collect();
        boundaries.push(text.len());
        CharIndex { boundaries }
    }

    /// Number of chars in the buffer.
    pub fn char_len(&self) -> usize {
        self.boundaries.len() - 1
    }

    /// Byte offset of the given char offset, `None` past the end.
    pub fn byte_of(&self, char_offset: usize) -> Option<usize> {
        self.boundaries.get(char_offset).copied()
    }

    /// Char offset of a byte offset.
    ///
    /// Offsets inside a multi-byte char map to that char.
    pub fn char_of(&self, byte_offset: usize) -> usize {
        match self.boundaries.binary_search(&byte_offset) {
            Ok(pos) => pos,
            Err(pos) => pos.saturating_sub(1),
        }
    }
}

/// Convert a char offset to 1-indexed line and column.
///
/// Columns count chars. Offsets past the end clamp to the end of content.
pub fn char_offset_to_position(content: &str, offset: usize) -> (u32, u32) {
    let mut line = 1u32;
    let mut col = 1u32;

    for ch in content.chars().take(offset) {
        if ch == '\n' {
            line += 1;
            col = 1;
        } else {
            col += 1;
        }
    }

    (line, col)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ascii_offsets_are_identity() {
        let idx = CharIndex::new("class A {}");
        assert_eq!(idx.char_len(), 10);
        assert_eq!(idx.byte_of(6), Some(6));
        assert_eq!(idx.char_of(6), 6);
        assert_eq!(idx.byte_of(10), Some(10));
        assert_eq!(idx.byte_of(11), None);
    }

    #[test]
    fn multibyte_offsets() {
        // 'é' is two bytes, '€' is three.
        let text = "é€x";
        let idx = CharIndex::new(text);
        assert_eq!(idx.char_len(), 3);
        assert_eq!(idx.byte_of(1), Some(2));
        assert_eq!(idx.byte_of(2), Some(5));
        assert_eq!(idx.char_of(5), 2);
        assert_eq!(idx.char_of(3), 1);
    }

    #[test]
    fn positions() {
        let text = "a\nbc\nd";
        assert_eq!(char_offset_to_position(text, 0), (1, 1));
        assert_eq!(char_offset_to_position(text, 3), (2, 2));
        assert_eq!(char_offset_to_position(text, 5), (3, 1));
        assert_eq!(char_offset_to_position(text, 99), (3, 2));
    }
}
