//! Splice-based rewriting.
//!
//! Transformations accumulate insertions, replacements, and deletions
//! against the original byte offsets, then apply them in one pass. Code the
//! transformer does not touch is carried through byte-for-byte, which is
//! what keeps the stdlib mode's "prepend only" contract honest.

use super::token::Span;
use super::ParseError;

#[derive(Debug, Clone)]
struct Edit {
    start: usize,
    end: usize,
    text: String,
}

/// An ordered, non-overlapping set of splices.
#[derive(Debug, Default)]
pub struct EditSet {
    edits: Vec<Edit>,
}

impl EditSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.edits.is_empty()
    }

    pub fn insert(&mut self, offset: usize, text: impl Into<String>) {
        self.edits.push(Edit {
            start: offset,
            end: offset,
            text: text.into(),
        });
    }

    pub fn replace(&mut self, span: Span, text: impl Into<String>) {
        self.edits.push(Edit {
            start: span.start,
            end: span.end,
            text: text.into(),
        });
    }

    pub fn delete(&mut self, span: Span) {
        self.edits.push(Edit {
            start: span.start,
            end: span.end,
            text: String::new(),
        });
    }

    /// Apply all splices to `src`. Overlapping replacements are a logic
    /// error in the transformation and are reported, not silently merged.
    pub fn apply(mut self, src: &str) -> Result<String, ParseError> {
        self.edits.sort_by_key(|e| (e.start, e.end));

        let mut out = String::with_capacity(src.len() + 256);
        let mut cursor = 0usize;
        for edit in &self.edits {
            if edit.start < cursor {
                return Err(ParseError::OverlappingEdits { offset: edit.start });
            }
            out.push_str(&src[cursor..edit.start]);
            out.push_str(&edit.text);
            cursor = edit.end;
        }
        out.push_str(&src[cursor..]);
        Ok(out)
    }
}
