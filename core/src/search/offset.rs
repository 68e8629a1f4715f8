//! Byte offset to character offset conversion
//!
//! ripgrep reports submatch boundaries as byte offsets into the UTF-8 encoded
//! line. Results are addressed in characters, so every submatch goes through
//! these helpers before it reaches a client.

use crate::config::ColumnUnit;
use crate::error::EncodingError;

/// Character position of a submatch within its line, 0-based
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CharSpan {
    pub start: usize,
    pub length: usize,
}

/// Convert the length of a range in `text` expressed in bytes to a number of
/// code points. The range starts at code point `char_start`.
///
/// Code points are consumed until the accumulated UTF-8 width reaches or
/// exceeds `byte_length`, so a byte length that ends inside a multi-byte
/// sequence counts the whole code point.
pub fn byte_range_length_to_character_length(
    text: &str,
    char_start: usize,
    byte_length: usize,
) -> Result<usize, EncodingError> {
    let mut chars = text.chars().skip(char_start);
    let mut consumed_bytes = 0usize;
    let mut consumed_chars = 0usize;

    while consumed_bytes < byte_length {
        let c = chars.next().ok_or(EncodingError::OffsetOutOfRange {
            byte_offset: byte_length,
            line_bytes: text.len(),
        })?;
        consumed_bytes += c.len_utf8();
        consumed_chars += 1;
    }

    Ok(consumed_chars)
}

/// Map a `[start_byte, end_byte)` submatch onto columns in `unit`
pub fn byte_span_to_columns(
    text: &str,
    start_byte: usize,
    end_byte: usize,
    unit: ColumnUnit,
) -> Result<CharSpan, EncodingError> {
    if end_byte < start_byte {
        return Err(EncodingError::OffsetOutOfRange {
            byte_offset: end_byte,
            line_bytes: text.len(),
        });
    }

    let start = byte_range_length_to_character_length(text, 0, start_byte)?;
    let length = byte_range_length_to_character_length(text, start, end_byte - start_byte)?;

    Ok(match unit {
        ColumnUnit::CodePoint => CharSpan { start, length },
        ColumnUnit::Utf16 => CharSpan {
            start: columns_in(text, 0, start, unit),
            length: columns_in(text, start, length, unit),
        },
    })
}

/// Byte offset of the 0-based `column` in `text`, clamped to the text length
pub fn column_to_byte_offset(text: &str, column: usize, unit: ColumnUnit) -> usize {
    let mut seen = 0usize;
    for (idx, c) in text.char_indices() {
        if seen >= column {
            return idx;
        }
        seen += unit.width(c);
    }
    text.len()
}

fn columns_in(text: &str, char_start: usize, char_count: usize, unit: ColumnUnit) -> usize {
    text.chars()
        .skip(char_start)
        .take(char_count)
        .map(|c| unit.width(c))
        .sum()
}
