//! Stylesheet lexer.

use super::{find, skip_quoted};
use std::ops::Range;

/// What a run of stylesheet text is.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum SegmentKind {
    /// Selectors, properties, values and punctuation.
    Code,
    /// A quoted string, quotes included.
    String,
    /// A `url(…)` token, including `url(` and `)`.
    Url,
    /// A `/* … */` comment.
    Comment,
    /// A `// …` line comment (preprocessor syntax), excluding the newline.
    LineComment,
}

/// A byte range of the source with its kind.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct Segment {
    /// Kind of the run.
    pub kind: SegmentKind,
    /// First byte.
    pub start: usize,
    /// One past the last byte.
    pub end: usize,
    /// The meaningful value: string contents without quotes, or the trimmed
    /// and unquoted URL. Equal to `start..end` for other kinds.
    pub value: Range<usize>,
}

impl Segment {
    fn plain(kind: SegmentKind, start: usize, end: usize) -> Self {
        Self {
            kind,
            start,
            end,
            value: start..end,
        }
    }

    /// The text covered by this segment.
    pub fn text<'a>(&self, src: &'a str) -> &'a str {
        &src[self.start..self.end]
    }

    /// The value text, see [`Segment::value`].
    pub fn value_text<'a>(&self, src: &'a str) -> &'a str {
        &src[self.value.clone()]
    }

    /// Returns `true` for `/*! … */` comments.
    pub fn is_license(&self, src: &str) -> bool {
        self.kind == SegmentKind::Comment && self.text(src).starts_with("/*!")
    }
}

/// Splits `src` into segments covering every byte exactly once.
pub fn segments(src: &str) -> Vec<Segment> {
    let b = src.as_bytes();
    let mut out = Vec::new();
    let mut code_start = 0;
    let mut i = 0;

    while i < b.len() {
        let seg = match b[i] {
            q @ (b'\'' | b'"') => {
                let end = skip_quoted(b, i, q);
                let inner_end = if end > i + 1 && b[end - 1] == q { end - 1 } else { end };
                Segment {
                    kind: SegmentKind::String,
                    start: i,
                    end,
                    value: i + 1..inner_end,
                }
            }
            b'/' if b.get(i + 1) == Some(&b'*') => Segment::plain(
                SegmentKind::Comment,
                i,
                find(b, i + 2, b"*/").map_or(b.len(), |p| p + 2),
            ),
            b'/' if b.get(i + 1) == Some(&b'/') => Segment::plain(
                SegmentKind::LineComment,
                i,
                find(b, i, b"\n").unwrap_or(b.len()),
            ),
            b'u' | b'U' if starts_url(b, i) => lex_url(b, i),
            _ => {
                i += 1;
                continue;
            }
        };
        if code_start < i {
            out.push(Segment::plain(SegmentKind::Code, code_start, i));
        }
        i = seg.end;
        code_start = seg.end;
        out.push(seg);
    }
    if code_start < b.len() {
        out.push(Segment::plain(SegmentKind::Code, code_start, b.len()));
    }
    out
}

fn starts_url(b: &[u8], i: usize) -> bool {
    let word_start = i == 0 || !(b[i - 1].is_ascii_alphanumeric() || b[i - 1] == b'-' || b[i - 1] == b'_');
    word_start && b.len() >= i + 4 && b[i..i + 4].eq_ignore_ascii_case(b"url(")
}

fn lex_url(b: &[u8], start: usize) -> Segment {
    let mut j = start + 4;
    while j < b.len() && b[j].is_ascii_whitespace() {
        j += 1;
    }
    let value = if j < b.len() && (b[j] == b'"' || b[j] == b'\'') {
        let q = b[j];
        let end = skip_quoted(b, j, q);
        let inner_end = if end > j + 1 && b[end - 1] == q { end - 1 } else { end };
        let value = j + 1..inner_end;
        j = end;
        value
    } else {
        let value_start = j;
        while j < b.len() && b[j] != b')' {
            j += 1;
        }
        let mut value_end = j;
        while value_end > value_start && b[value_end - 1].is_ascii_whitespace() {
            value_end -= 1;
        }
        value_start..value_end
    };
    while j < b.len() && b[j] != b')' {
        j += 1;
    }
    Segment {
        kind: SegmentKind::Url,
        start,
        end: (j + 1).min(b.len()),
        value,
    }
}
