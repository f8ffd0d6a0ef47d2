//! Text position utilities for byte offset and line:column conversions.
//!
//! ## Coordinate Conventions
//!
//! - Lines and columns are **1-indexed** (matching editor conventions)
//! - Byte offsets are **0-indexed**
//! - Columns count bytes, which is what the parser reports and what runtime
//!   fact locations are keyed by

use crate::patch::Span;

/// Convert a byte offset to 1-indexed line and column.
///
/// If `offset` exceeds content length, returns position at end of content.
pub fn byte_offset_to_position(content: &[u8], offset: usize) -> (u32, u32) {
    let offset = offset.min(content.len());
    let mut line = 1u32;
    let mut col = 1u32;

    for &byte in &content[..offset] {
        if byte == b'\n' {
            line += 1;
            col = 1;
        } else {
            col += 1;
        }
    }

    (line, col)
}

/// Convert 1-indexed line and column to byte offset.
///
/// If the position is beyond the content, returns the content length.
/// Columns past the end of a line clamp to the line end.
pub fn position_to_byte_offset(content: &[u8], line: u32, col: u32) -> usize {
    let line = line.max(1);
    let col = col.max(1);

    let Some(start) = line_start(content, line) else {
        return content.len();
    };
    let line_end = content[start..]
        .iter()
        .position(|&b| b == b'\n')
        .map(|p| start + p)
        .unwrap_or(content.len());
    start + ((col as usize) - 1).min(line_end - start)
}

/// Byte offset of the first byte of a 1-indexed line.
fn line_start(content: &[u8], line: u32) -> Option<usize> {
    if line == 1 {
        return Some(0);
    }
    let mut current = 1u32;
    for (i, &byte) in content.iter().enumerate() {
        if byte == b'\n' {
            current += 1;
            if current == line {
                return Some(i + 1);
            }
        }
    }
    None
}

/// Offset of the start of the line containing `offset`.
pub fn line_start_of(content: &str, offset: usize) -> usize {
    let offset = offset.min(content.len());
    content[..offset].rfind('\n').map(|i| i + 1).unwrap_or(0)
}

/// Leading whitespace of the line containing `offset`.
pub fn indentation_at(content: &str, offset: usize) -> &str {
    let start = line_start_of(content, offset);
    let rest = &content[start..];
    let width = rest
        .bytes()
        .take_while(|b| *b == b' ' || *b == b'\t')
        .count();
    &rest[..width]
}

/// Whether only whitespace precedes `offset` on its line.
pub fn starts_line(content: &str, offset: usize) -> bool {
    let start = line_start_of(content, offset);
    content[start..offset.min(content.len())]
        .bytes()
        .all(|b| b == b' ' || b == b'\t')
}

/// Get the line range spanned by a byte span.
///
/// Returns `(start_line, end_line)` both 1-indexed.
pub fn span_to_line_range(content: &[u8], span: &Span) -> (u32, u32) {
    let (start_line, _) = byte_offset_to_position(content, span.start);
    let (end_line, _) =
        byte_offset_to_position(content, span.end.saturating_sub(1).max(span.start));
    (start_line, end_line)
}

/// Extract the text content of a span as a string.
///
/// Returns `None` if the span extends beyond content bounds or splits a character.
pub fn extract_span_str<'a>(content: &'a str, span: &Span) -> Option<&'a str> {
    content.get(span.start..span.end)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn offset_to_position_simple() {
        let content = b"line1\nline2\nline3\n";
        assert_eq!(byte_offset_to_position(content, 0), (1, 1));
        assert_eq!(byte_offset_to_position(content, 4), (1, 5));
        assert_eq!(byte_offset_to_position(content, 5), (1, 6));
        assert_eq!(byte_offset_to_position(content, 6), (2, 1));
        assert_eq!(byte_offset_to_position(content, 12), (3, 1));
    }

    #[test]
    fn position_to_offset_simple() {
        let content = b"line1\nline2\nline3\n";
        assert_eq!(position_to_byte_offset(content, 1, 1), 0);
        assert_eq!(position_to_byte_offset(content, 1, 5), 4);
        assert_eq!(position_to_byte_offset(content, 2, 1), 6);
        assert_eq!(position_to_byte_offset(content, 3, 1), 12);
        assert_eq!(position_to_byte_offset(content, 9, 1), content.len());
    }

    #[test]
    fn roundtrip() {
        let content = b"describe Foo do\n  it { should be_true }\nend\n";
        for offset in 0..content.len() {
            let (line, col) = byte_offset_to_position(content, offset);
            assert_eq!(
                position_to_byte_offset(content, line, col),
                offset,
                "roundtrip failed for offset {}",
                offset
            );
        }
    }

    #[test]
    fn column_past_line_end_clamps() {
        let content = b"ab\ncd\n";
        assert_eq!(position_to_byte_offset(content, 1, 40), 2);
    }

    #[test]
    fn indentation_and_line_start() {
        let content = "describe do\n    foo.stub(:a => 1)\nend\n";
        let offset = content.find("foo").unwrap();
        assert_eq!(indentation_at(content, offset), "    ");
        assert!(starts_line(content, offset));
        let stub = content.find("stub").unwrap();
        assert!(!starts_line(content, stub));
        assert_eq!(line_start_of(content, stub), 12);
    }

    #[test]
    fn line_range_of_multiline_span() {
        let content = b"a\nbb\nccc\n";
        assert_eq!(span_to_line_range(content, &Span::new(2, 7)), (2, 3));
        assert_eq!(span_to_line_range(content, &Span::new(2, 2)), (2, 2));
    }
}
