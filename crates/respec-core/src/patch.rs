//! Patch IR: spans, replacements, and the source rewriter.
//!
//! This module implements the rewrite infrastructure for respec:
//! - Byte spans with overlap detection
//! - Replacements (replace / delete / insert-only) collected per file
//! - Deterministic, byte-exact application of a replacement set
//! - Materialization of applied replacements for output (line/col + old text)
//!
//! ## Ordering
//!
//! Replacements are applied in ascending start offset. Replacements that start
//! at the same offset keep the order in which they were produced, so the text
//! of the replacement decided first comes first in the output.
//!
//! ## Invariant
//!
//! Within one file, replacements must be pairwise non-overlapping. Touching
//! spans (one ends where the next starts) and insert-only spans at the border
//! of another span are allowed. An overlap is a defect in whoever produced the
//! replacements, so [`apply_rewrites`] refuses it instead of guessing.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use thiserror::Error;

use crate::text::byte_offset_to_position;

/// Hash type for content verification (SHA-256, stored as hex string for JSON compatibility).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContentHash(pub String);

impl ContentHash {
    /// Compute SHA-256 hash of the given bytes, returning hex-encoded string.
    pub fn compute(data: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(data);
        ContentHash(hex::encode(hasher.finalize()))
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// Span
// ============================================================================

/// Byte offsets into file content.
///
/// Spans are half-open intervals: `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Span {
    /// Start byte offset (inclusive).
    pub start: usize,
    /// End byte offset (exclusive).
    pub end: usize,
}

impl Span {
    /// Create a new span.
    ///
    /// # Panics
    /// Panics if `start > end`.
    pub fn new(start: usize, end: usize) -> Self {
        assert!(
            start <= end,
            "Span start ({}) must be <= end ({})",
            start,
            end
        );
        Span { start, end }
    }

    /// An empty span at `offset`, used for insertions.
    pub fn empty(offset: usize) -> Self {
        Span {
            start: offset,
            end: offset,
        }
    }

    /// Length of the span in bytes.
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    /// Check if span is empty.
    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// Check if this span overlaps with another.
    ///
    /// Two spans overlap if they share any byte positions, or if one is an
    /// empty span strictly inside the other. Adjacent spans do NOT overlap.
    pub fn overlaps(&self, other: &Span) -> bool {
        self.start < other.end && other.start < self.end
    }

    /// Check if this span contains another span entirely.
    pub fn contains(&self, other: &Span) -> bool {
        self.start <= other.start && other.end <= self.end
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {})", self.start, self.end)
    }
}

// ============================================================================
// Replacements
// ============================================================================

/// A single text change: replace the bytes in `span` with `text`.
///
/// An empty span is an insertion, an empty text is a deletion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Replacement {
    pub span: Span,
    pub text: String,
}

impl Replacement {
    /// Replace `span` with `text`.
    pub fn replace(span: Span, text: impl Into<String>) -> Self {
        Replacement {
            span,
            text: text.into(),
        }
    }

    /// Insert `text` before the byte at `offset`.
    pub fn insert(offset: usize, text: impl Into<String>) -> Self {
        Replacement {
            span: Span::empty(offset),
            text: text.into(),
        }
    }

    /// Delete the bytes in `span`.
    pub fn delete(span: Span) -> Self {
        Replacement {
            span,
            text: String::new(),
        }
    }

    /// Whether this replacement only inserts text.
    pub fn is_insertion(&self) -> bool {
        self.span.is_empty()
    }
}

/// Errors from applying a replacement set.
///
/// All variants describe a defect in the producer of the replacements, never a
/// user-facing condition.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RewriteError {
    /// Two replacements claim overlapping bytes.
    #[error("overlapping replacements {first} and {second}")]
    OverlappingSpans { first: Span, second: Span },

    /// A span reaches past the end of the text.
    #[error("replacement span {span} is out of bounds (text length {len})")]
    OutOfBounds { span: Span, len: usize },

    /// A span boundary splits a UTF-8 character.
    #[error("replacement span {span} is not on a character boundary")]
    NotCharBoundary { span: Span },
}

/// Find the first overlapping pair in a replacement set.
///
/// Returns `None` when the set satisfies the non-overlap invariant.
#[must_use]
pub fn find_overlap(replacements: &[Replacement]) -> Option<(Span, Span)> {
    let mut order: Vec<&Replacement> = replacements.iter().collect();
    order.sort_by_key(|r| r.span.start);

    // The span reaching furthest so far is the only one a later span can hit.
    let mut widest: Option<Span> = None;
    for r in order {
        if let Some(prev) = widest {
            if prev.overlaps(&r.span) || r.span.overlaps(&prev) {
                return Some((prev, r.span));
            }
        }
        let reaches_further = match widest {
            Some(w) => r.span.end > w.end,
            None => true,
        };
        if reaches_further && !r.span.is_empty() {
            widest = Some(r.span);
        }
    }
    None
}

/// Apply `replacements` to `original`, producing the new text.
///
/// Untouched bytes are copied verbatim. Replacements are stably sorted by start
/// offset, so ties keep their insertion order.
pub fn apply_rewrites(original: &str, replacements: &[Replacement]) -> Result<String, RewriteError> {
    for r in replacements {
        if r.span.end > original.len() {
            return Err(RewriteError::OutOfBounds {
                span: r.span,
                len: original.len(),
            });
        }
        if !original.is_char_boundary(r.span.start) || !original.is_char_boundary(r.span.end) {
            return Err(RewriteError::NotCharBoundary { span: r.span });
        }
    }
    if let Some((first, second)) = find_overlap(replacements) {
        return Err(RewriteError::OverlappingSpans { first, second });
    }

    let mut ordered: Vec<&Replacement> = replacements.iter().collect();
    ordered.sort_by_key(|r| r.span.start);

    let grown: usize = replacements.iter().map(|r| r.text.len()).sum();
    let mut out = String::with_capacity(original.len() + grown);
    let mut cursor = 0usize;
    for r in ordered {
        if r.span.start > cursor {
            out.push_str(&original[cursor..r.span.start]);
        }
        out.push_str(&r.text);
        cursor = cursor.max(r.span.end);
    }
    out.push_str(&original[cursor..]);
    Ok(out)
}

// ============================================================================
// Materialization
// ============================================================================

/// A single applied replacement as it appears in output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputEdit {
    /// Project-relative file path.
    pub file: String,
    /// Byte range being replaced.
    pub span: Span,
    /// Original text.
    pub old_text: String,
    /// Replacement text.
    pub new_text: String,
    /// 1-indexed line number (for display).
    pub line: u32,
    /// 1-indexed column (for display).
    pub col: u32,
}

/// Materialize replacements against the original text, in application order.
pub fn materialize(file: &str, original: &str, replacements: &[Replacement]) -> Vec<OutputEdit> {
    let mut ordered: Vec<&Replacement> = replacements.iter().collect();
    ordered.sort_by_key(|r| r.span.start);

    ordered
        .into_iter()
        .map(|r| {
            let (line, col) = byte_offset_to_position(original.as_bytes(), r.span.start);
            OutputEdit {
                file: file.to_string(),
                span: r.span,
                old_text: original.get(r.span.start..r.span.end).unwrap_or_default().to_string(),
                new_text: r.text.clone(),
                line,
                col,
            }
        })
        .collect()
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    mod span_tests {
        use super::*;

        #[test]
        fn overlap_excludes_adjacent() {
            let a = Span::new(0, 5);
            let b = Span::new(5, 9);
            assert!(!a.overlaps(&b));
            assert!(!b.overlaps(&a));
        }

        #[test]
        fn overlap_detects_shared_bytes() {
            assert!(Span::new(0, 5).overlaps(&Span::new(4, 9)));
            assert!(Span::new(2, 3).overlaps(&Span::new(0, 9)));
        }

        #[test]
        fn empty_span_inside_range_overlaps() {
            assert!(Span::new(0, 5).overlaps(&Span::empty(3)));
            assert!(!Span::new(0, 5).overlaps(&Span::empty(0)));
            assert!(!Span::new(0, 5).overlaps(&Span::empty(5)));
        }

        #[test]
        #[should_panic(expected = "must be <= end")]
        fn inverted_span_panics() {
            let _ = Span::new(4, 2);
        }
    }

    mod apply_tests {
        use super::*;

        #[test]
        fn untouched_text_is_preserved() {
            let original = "# keep me\nfoo.should be_true # and me\n";
            let start = original.find("be_true").unwrap();
            let replacements = vec![Replacement::replace(
                Span::new(start, start + "be_true".len()),
                "be_truthy",
            )];
            let out = apply_rewrites(original, &replacements).unwrap();
            assert_eq!(out, "# keep me\nfoo.should be_truthy # and me\n");
        }

        #[test]
        fn unsorted_input_is_applied_in_offset_order() {
            let original = "abcdef";
            let replacements = vec![
                Replacement::replace(Span::new(4, 5), "E"),
                Replacement::replace(Span::new(0, 1), "A"),
            ];
            assert_eq!(apply_rewrites(original, &replacements).unwrap(), "AbcdEf");
        }

        #[test]
        fn ties_keep_insertion_order() {
            let original = "x.y";
            let replacements = vec![
                Replacement::insert(0, "first("),
                Replacement::insert(0, "second("),
                Replacement::replace(Span::new(1, 3), "))"),
            ];
            assert_eq!(
                apply_rewrites(original, &replacements).unwrap(),
                "first(second(x))"
            );
        }

        #[test]
        fn insertion_after_replacement_at_same_start() {
            let original = "abc";
            let replacements = vec![
                Replacement::replace(Span::new(1, 2), "B"),
                Replacement::insert(1, "+"),
            ];
            assert_eq!(apply_rewrites(original, &replacements).unwrap(), "aB+c");
        }

        #[test]
        fn adjacent_replacements_are_allowed() {
            let original = "obj.should == 1";
            let replacements = vec![
                Replacement::insert(0, "expect("),
                Replacement::replace(Span::new(3, 10), ").to"),
                Replacement::replace(Span::new(10, 14), " eq("),
                Replacement::insert(15, ")"),
            ];
            assert_eq!(
                apply_rewrites(original, &replacements).unwrap(),
                "expect(obj).to eq(1)"
            );
        }

        #[test]
        fn overlapping_replacements_are_rejected() {
            let original = "abcdef";
            let replacements = vec![
                Replacement::replace(Span::new(0, 4), "X"),
                Replacement::replace(Span::new(2, 6), "Y"),
            ];
            let err = apply_rewrites(original, &replacements).unwrap_err();
            assert!(matches!(err, RewriteError::OverlappingSpans { .. }));
        }

        #[test]
        fn insertion_inside_replacement_is_rejected() {
            let original = "abcdef";
            let replacements = vec![
                Replacement::replace(Span::new(0, 4), "X"),
                Replacement::insert(2, "Y"),
            ];
            assert!(apply_rewrites(original, &replacements).is_err());
        }

        #[test]
        fn out_of_bounds_is_rejected() {
            let replacements = vec![Replacement::delete(Span::new(2, 10))];
            assert_eq!(
                apply_rewrites("abc", &replacements),
                Err(RewriteError::OutOfBounds {
                    span: Span::new(2, 10),
                    len: 3
                })
            );
        }

        #[test]
        fn split_character_is_rejected() {
            let original = "é";
            let replacements = vec![Replacement::delete(Span::new(0, 1))];
            assert!(matches!(
                apply_rewrites(original, &replacements),
                Err(RewriteError::NotCharBoundary { .. })
            ));
        }

        #[test]
        fn empty_set_is_identity() {
            let original = "  weird\t\r\nspacing  ";
            assert_eq!(apply_rewrites(original, &[]).unwrap(), original);
        }
    }

    mod materialize_tests {
        use super::*;

        #[test]
        fn edits_carry_positions_and_old_text() {
            let original = "a\nfoo.stub(:x)\n";
            let start = original.find("stub").unwrap();
            let replacements = vec![Replacement::replace(
                Span::new(start, start + 4),
                "allow",
            )];
            let edits = materialize("spec/a_spec.rb", original, &replacements);
            assert_eq!(edits.len(), 1);
            assert_eq!(edits[0].old_text, "stub");
            assert_eq!(edits[0].new_text, "allow");
            assert_eq!((edits[0].line, edits[0].col), (2, 5));
        }
    }
}
