//! Edit primitive: byte spans, content hashes and anchored text edits.
//!
//! Every transformation in symdex reduces to a list of [`Edit`]s. A dry run
//! collects them and renders previews; an apply run collects the same edits
//! and commits them. Each edit carries a hash of the bytes it expects to
//! replace so a stale plan is rejected instead of corrupting the file.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::ops::Range;

/// Hex SHA-256 of the text an edit expects to replace.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContentHash(pub String);

impl ContentHash {
    /// Hex SHA-256 of `data`.
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
// Spans
// ============================================================================

/// Byte offsets into file content.
///
/// Spans are half-open intervals: `[start, end)`.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct Span {
    /// Start byte offset (inclusive).
    pub start: u64,
    /// End byte offset (exclusive).
    pub end: u64,
}

impl Span {
    /// Create a new span.
    ///
    /// # Panics
    /// Panics if `start > end`.
    pub fn new(start: u64, end: u64) -> Self {
        assert!(
            start <= end,
            "Span start ({}) must be <= end ({})",
            start,
            end
        );
        Span { start, end }
    }

    /// An empty span at `offset`, used for insertions.
    pub fn at(offset: u64) -> Self {
        Span {
            start: offset,
            end: offset,
        }
    }

        pub fn len(&self) -> u64 {
        self.end.saturating_sub(self.start)
    }

    /// Check if span is empty.
    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// Whether the two spans share a byte.
    ///
    /// Touching spans do not overlap.
    pub fn overlaps(&self, other: &Span) -> bool {
        self.start < other.end && other.start < self.end
    }

    /// Whether `other` lies inside this span.
    pub fn contains(&self, other: &Span) -> bool {
        self.start <= other.start && other.end <= self.end
    }

    /// The span as a `usize` range for slicing.
    pub fn range(&self) -> Range<usize> {
        self.start as usize..self.end as usize
    }

    /// Slice `content` with this span, if it is in bounds and on char boundaries.
    pub fn slice<'a>(&self, content: &'a str) -> Option<&'a str> {
        if self.start > self.end {
            return None;
        }
        content.get(self.range())
    }

    /// Move the span by a signed byte delta.
    pub fn shifted(&self, delta: i64) -> Span {
        let shift = |v: u64| (v as i64 + delta).max(0) as u64;
        Span {
            start: shift(self.start),
            end: shift(self.end),
        }
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {})", self.start, self.end)
    }
}

// ============================================================================
// Edits
// ============================================================================

/// A single text change anchored in one file.
///
/// `expected` is the hash of the bytes the edit replaces, captured when the
/// edit was planned. Insertions use an empty span and the hash of "".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Edit {
    /// File path the edit applies to.
    pub file: String,
    /// Byte span being replaced.
    pub span: Span,
    /// Replacement text.
    pub replacement: String,
    /// Text currently at `span`.
    pub original: String,
    /// Hash of `original`.
    pub expected: ContentHash,
}

impl Edit {
    /// Plan a replacement of `span` in `content`.
    ///
    /// Returns `None` when the span does not address valid text.
    pub fn replace(
        file: impl Into<String>,
        content: &str,
        span: Span,
        replacement: impl Into<String>,
    ) -> Option<Self> {
        let original = span.slice(content)?.to_string();
        Some(Edit {
            file: file.into(),
            span,
            replacement: replacement.into(),
            expected: ContentHash::compute(original.as_bytes()),
            original,
        })
    }

    /// Plan an insertion at `offset`.
    pub fn insert(file: impl Into<String>, offset: u64, text: impl Into<String>) -> Self {
        Edit {
            file: file.into(),
            span: Span::at(offset),
            replacement: text.into(),
            original: String::new(),
            expected: ContentHash::compute(b""),
        }
    }

    /// Signed change in length this edit causes.
    pub fn delta(&self) -> i64 {
        self.replacement.len() as i64 - self.span.len() as i64
    }

    /// Verify that the edit still applies to `content`.
    pub fn check(&self, content: &str) -> Result<(), Conflict> {
        let len = content.len() as u64;
        if self.span.end > len || self.span.start > self.span.end {
            return Err(Conflict::SpanOutOfBounds {
                file: self.file.clone(),
                span: self.span,
                file_len: len,
            });
        }
        let Some(current) = self.span.slice(content) else {
            return Err(Conflict::NotCharBoundary {
                file: self.file.clone(),
                span: self.span,
            });
        };
        let actual = ContentHash::compute(current.as_bytes());
        if actual != self.expected {
            return Err(Conflict::HashMismatch {
                file: self.file.clone(),
                span: self.span,
                expected: self.expected.clone(),
                actual,
            });
        }
        Ok(())
    }
}

/// Why a set of edits cannot be applied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Conflict {
    /// Two edits have overlapping spans in the same file.
    OverlappingSpans {
        file: String,
        first: Span,
        second: Span,
    },
    /// Span is out of bounds for the file.
    SpanOutOfBounds {
        file: String,
        span: Span,
        file_len: u64,
    },
    /// Span splits a multi-byte character.
    NotCharBoundary { file: String, span: Span },
    /// The bytes at the span changed since the edit was planned.
    HashMismatch {
        file: String,
        span: Span,
        expected: ContentHash,
        actual: ContentHash,
    },
    /// The file named by an edit does not exist in the module.
    FileMissing { file: String },
}

impl fmt::Display for Conflict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Conflict::OverlappingSpans {
                file,
                first,
                second,
            } => write!(f, "overlapping edits in {}: {} and {}", file, first, second),
            Conflict::SpanOutOfBounds {
                file,
                span,
                file_len,
            } => write!(
                f,
                "edit span {} out of bounds for {} ({} bytes)",
                span, file, file_len
            ),
            Conflict::NotCharBoundary { file, span } => {
                write!(f, "edit span {} in {} splits a character", span, file)
            }
            Conflict::HashMismatch { file, span, .. } => {
                write!(f, "content at {} in {} changed since planning", span, file)
            }
            Conflict::FileMissing { file } => write!(f, "file {} is not in the module", file),
        }
    }
}

/// Find overlapping edits within each file.
///
/// Edits must already be sorted by (file, span).
pub fn detect_overlaps(edits: &[Edit]) -> Vec<Conflict> {
    edits
        .windows(2)
        .filter(|w| w[0].file == w[1].file && w[0].span.overlaps(&w[1].span))
        .map(|w| Conflict::OverlappingSpans {
            file: w[0].file.clone(),
            first: w[0].span,
            second: w[1].span,
        })
        .collect()
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    mod content_hash_tests {
        use super::*;

        #[test]
        fn content_hashes_are_hex_sha256() {
            let hash = ContentHash::compute(b"hello");
            assert_eq!(hash.0.len(), 64);
            assert!(hash.0.chars().all(|c| c.is_ascii_hexdigit()));
        }

        #[test]
        fn content_hash_is_stable() {
            assert_eq!(ContentHash::compute(b"x"), ContentHash::compute(b"x"));
            assert_ne!(ContentHash::compute(b"x"), ContentHash::compute(b"y"));
        }
    }

    mod span_tests {
        use super::*;

        #[test]
        fn span_creation() {
            let span = Span::new(10, 20);
            assert_eq!(span.len(), 10);
            assert!(!span.is_empty());
            assert!(Span::at(4).is_empty());
        }

        #[test]
        #[should_panic(expected = "must be <= end")]
        fn span_rejects_inverted_bounds() {
            let _ = Span::new(5, 2);
        }

        #[test]
        fn adjacent_spans_do_not_overlap() {
            let a = Span::new(0, 5);
            let b = Span::new(5, 9);
            assert!(!a.overlaps(&b));
            assert!(a.overlaps(&Span::new(4, 6)));
        }

        #[test]
        fn contains_and_slice() {
            let span = Span::new(4, 7);
            assert!(Span::new(0, 10).contains(&span));
            assert_eq!(span.slice("var foo = 1"), Some("foo"));
            assert_eq!(Span::new(4, 70).slice("var foo = 1"), None);
        }

        #[test]
        fn shifted_moves_both_ends() {
            assert_eq!(Span::new(10, 12).shifted(3), Span::new(13, 15));
            assert_eq!(Span::new(10, 12).shifted(-4), Span::new(6, 8));
        }
    }

    mod edit_tests {
        use super::*;

        const SRC: &str = "var DefaultTimeout = 5\n";

        #[test]
        fn replace_captures_original_text() {
            let edit = Edit::replace("a.go", SRC, Span::new(4, 18), "GlobalTimeout").unwrap();
            assert_eq!(edit.original, "DefaultTimeout");
            assert_eq!(edit.delta(), -1);
            assert!(edit.check(SRC).is_ok());
        }

        #[test]
        fn check_detects_changed_content() {
            let edit = Edit::replace("a.go", SRC, Span::new(4, 18), "X").unwrap();
            let changed = "var DefaultTimeouT = 5\n";
            assert!(matches!(
                edit.check(changed),
                Err(Conflict::HashMismatch { .. })
            ));
        }

        #[test]
        fn check_detects_out_of_bounds() {
            let edit = Edit::replace("a.go", SRC, Span::new(4, 18), "X").unwrap();
            assert!(matches!(
                edit.check("var"),
                Err(Conflict::SpanOutOfBounds { .. })
            ));
        }

        #[test]
        fn insert_always_matches_empty_span() {
            let edit = Edit::insert("a.go", SRC.len() as u64, "\n// tail\n");
            assert!(edit.check(SRC).is_ok());
            assert_eq!(edit.delta(), 9);
        }

        #[test]
        fn overlaps_are_reported_per_file() {
            let a = Edit::replace("a.go", SRC, Span::new(4, 18), "X").unwrap();
            let b = Edit::replace("a.go", SRC, Span::new(10, 20), "Y").unwrap();
            let c = Edit::replace("b.go", SRC, Span::new(10, 20), "Y").unwrap();
            assert_eq!(detect_overlaps(&[a.clone(), b]).len(), 1);
            assert!(detect_overlaps(&[a, c]).is_empty());
        }
    }
}
