//! Script lexer.

use super::{find, is_ident_byte, skip_quoted};

/// What a run of script text is.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum SegmentKind {
    /// Ordinary code.
    Code,
    /// A `'…'` or `"…"` literal, quotes included.
    String,
    /// A `` `…` `` template literal, backticks included.
    Template,
    /// A `/…/flags` regular expression literal.
    Regex,
    /// A `// …` comment, excluding the newline.
    LineComment,
    /// A `/* … */` comment.
    BlockComment,
}

/// A byte range of the source with its kind.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct Segment {
    /// Kind of the run.
    pub kind: SegmentKind,
    /// First byte.
    pub start: usize,
    /// One past the last byte.
    pub end: usize,
}

impl Segment {
    /// The text covered by this segment.
    pub fn text<'a>(&self, src: &'a str) -> &'a str {
        &src[self.start..self.end]
    }

    /// Returns `true` for either comment kind.
    pub fn is_comment(&self) -> bool {
        matches!(self.kind, SegmentKind::LineComment | SegmentKind::BlockComment)
    }

    /// Returns `true` for `/*! … */` comments, which minifiers keep.
    pub fn is_license(&self, src: &str) -> bool {
        self.kind == SegmentKind::BlockComment && self.text(src).starts_with("/*!")
    }
}

const REGEX_KEYWORDS: &[&str] = &[
    "return", "typeof", "case", "do", "else", "in", "of", "new", "delete", "void", "throw",
    "instanceof", "yield", "await",
];

/// Splits `src` into segments covering every byte exactly once.
pub fn segments(src: &str) -> Vec<Segment> {
    let b = src.as_bytes();
    let mut out = Vec::new();
    let mut code_start = 0;
    let mut i = 0;
    // Whether a `/` at this point starts a regex rather than a division.
    let mut regex_ok = true;

    while i < b.len() {
        let c = b[i];
        let next = b.get(i + 1).copied();
        let (kind, end) = match c {
            b'\'' | b'"' => (SegmentKind::String, skip_quoted(b, i, c)),
            b'`' => (SegmentKind::Template, skip_quoted(b, i, b'`')),
            b'/' if next == Some(b'/') => (
                SegmentKind::LineComment,
                find(b, i, b"\n").unwrap_or(b.len()),
            ),
            b'/' if next == Some(b'*') => (
                SegmentKind::BlockComment,
                find(b, i + 2, b"*/").map_or(b.len(), |p| p + 2),
            ),
            b'/' if regex_ok => (SegmentKind::Regex, skip_regex(b, i)),
            c if is_ident_byte(c) => {
                let start = i;
                while i < b.len() && is_ident_byte(b[i]) {
                    i += 1;
                }
                regex_ok = REGEX_KEYWORDS.contains(&&src[start..i]);
                continue;
            }
            c => {
                if !c.is_ascii_whitespace() {
                    regex_ok = !matches!(c, b')' | b']' | b'}');
                }
                i += 1;
                continue;
            }
        };
        if code_start < i {
            out.push(Segment {
                kind: SegmentKind::Code,
                start: code_start,
                end: i,
            });
        }
        out.push(Segment { kind, start: i, end });
        if !matches!(kind, SegmentKind::LineComment | SegmentKind::BlockComment) {
            regex_ok = false;
        }
        i = end;
        code_start = end;
    }
    if code_start < b.len() {
        out.push(Segment {
            kind: SegmentKind::Code,
            start: code_start,
            end: b.len(),
        });
    }
    out
}

fn skip_regex(b: &[u8], start: usize) -> usize {
    let mut j = start + 1;
    let mut in_class = false;
    while j < b.len() {
        match b[j] {
            b'\\' => j += 2,
            b'[' => {
                in_class = true;
                j += 1;
            }
            b']' => {
                in_class = false;
                j += 1;
            }
            b'/' if !in_class => {
                j += 1;
                while j < b.len() && b[j].is_ascii_alphabetic() {
                    j += 1;
                }
                return j;
            }
            b'\n' => return j,
            _ => j += 1,
        }
    }
    b.len().min(j)
}

/// A significant token, for pattern matching over import syntax.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Token<'a> {
    /// An identifier, keyword or number, with its start offset.
    Ident(&'a str, usize),
    /// A single punctuation byte, with its offset.
    Punct(u8, usize),
    /// A string literal with no interpolation. `start..end` covers the
    /// contents without quotes.
    Str {
        /// Literal contents.
        value: &'a str,
        /// Offset of the first content byte.
        start: usize,
        /// Offset one past the last content byte.
        end: usize,
    },
    /// Any other literal (regex, interpolated template).
    Other,
}

/// Tokenizes `src`, dropping comments and whitespace.
pub fn tokens(src: &str) -> Vec<Token<'_>> {
    let b = src.as_bytes();
    let mut out = Vec::new();
    for seg in segments(src) {
        match seg.kind {
            SegmentKind::Code => {
                let mut i = seg.start;
                while i < seg.end {
                    let c = b[i];
                    if is_ident_byte(c) {
                        let start = i;
                        while i < seg.end && is_ident_byte(b[i]) {
                            i += 1;
                        }
                        out.push(Token::Ident(&src[start..i], start));
                    } else {
                        if !c.is_ascii_whitespace() && c.is_ascii() {
                            out.push(Token::Punct(c, i));
                        }
                        i += 1;
                    }
                }
            }
            SegmentKind::String | SegmentKind::Template => {
                let closed = seg.end - seg.start >= 2 && b[seg.end - 1] == b[seg.start];
                let inner_end = if closed { seg.end - 1 } else { seg.end };
                let value = &src[seg.start + 1..inner_end];
                if seg.kind == SegmentKind::Template && value.contains("${") {
                    out.push(Token::Other);
                } else {
                    out.push(Token::Str {
                        value,
                        start: seg.start + 1,
                        end: inner_end,
                    });
                }
            }
            SegmentKind::Regex => out.push(Token::Other),
            SegmentKind::LineComment | SegmentKind::BlockComment => {}
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(src: &str) -> Vec<(SegmentKind, &str)> {
        segments(src).iter().map(|s| (s.kind, s.text(src))).collect()
    }

    #[test]
    fn strings_and_comments() {
        let src = "let a = 'x'; // hi\n/* b */ f(\"y\")";
        assert_eq!(
            kinds(src),
            vec![
                (SegmentKind::Code, "let a = "),
                (SegmentKind::String, "'x'"),
                (SegmentKind::Code, "; "),
                (SegmentKind::LineComment, "// hi"),
                (SegmentKind::Code, "\n"),
                (SegmentKind::BlockComment, "/* b */"),
                (SegmentKind::Code, " f("),
                (SegmentKind::String, "\"y\""),
                (SegmentKind::Code, ")"),
            ]
        );
    }

    #[test]
    fn regex_versus_division() {
        let src = "x = a / b; y = /'[/]/g.test(s);";
        let segs = segments(src);
        assert!(!segs.iter().any(|s| s.kind == SegmentKind::String));
        let re = segs.iter().find(|s| s.kind == SegmentKind::Regex).unwrap();
        assert_eq!(re.text(src), "/'[/]/g");
    }

    #[test]
    fn escaped_quotes_and_templates() {
        let src = r#"s = "a\"b"; t = `x ${y} z`;"#;
        let k = kinds(src);
        assert_eq!(k[1], (SegmentKind::String, r#""a\"b""#));
        assert_eq!(k[3], (SegmentKind::Template, "`x ${y} z`"));
    }

    #[test]
    fn unterminated_comment_runs_to_end() {
        let src = "a /* never closed";
        let segs = segments(src);
        assert_eq!(segs.last().unwrap().kind, SegmentKind::BlockComment);
        assert_eq!(segs.last().unwrap().end, src.len());
    }

    #[test]
    fn tokens_expose_string_contents() {
        let src = "import x from './a.js'; // import 'nope'";
        let toks = tokens(src);
        assert_eq!(toks[0], Token::Ident("import", 0));
        assert_eq!(
            toks[3],
            Token::Str {
                value: "./a.js",
                start: 15,
                end: 21
            }
        );
        assert_eq!(toks.len(), 5);
    }

    #[test]
    fn license_comment() {
        let src = "/*! keep */ /* drop */";
        let segs = segments(src);
        assert!(segs[0].is_license(src));
        assert!(!segs[2].is_license(src));
    }
}
