//! Reference scanners for scripts, stylesheets and markup.

use kiln_common::AssetKind;
use kiln_transform::lex::script::{tokens, Token};
use kiln_transform::lex::style::{segments, SegmentKind};

/// A specifier found in a module's text, before resolution.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct RawReference {
    /// The specifier as written.
    pub specifier: String,
    /// Byte offset of the first specifier byte.
    pub start: usize,
    /// Byte offset one past the last specifier byte.
    pub end: usize,
}

impl RawReference {
    fn new(src: &str, start: usize, end: usize) -> Self {
        Self {
            specifier: src[start..end].to_string(),
            start,
            end,
        }
    }
}

/// Finds the references in `text`, a module of the given kind. Images,
/// fonts and data files never reference anything.
pub fn scan(kind: AssetKind, text: &str) -> Vec<RawReference> {
    match kind {
        AssetKind::Script => scan_script(text),
        AssetKind::Style => scan_style(text),
        AssetKind::Markup => scan_markup(text),
        AssetKind::Image | AssetKind::Font | AssetKind::Data => Vec::new(),
    }
}

/// `import … from "x"`, `import "x"`, `export … from "x"`, `import("x")`
/// and `require("x")`.
fn scan_script(text: &str) -> Vec<RawReference> {
    let toks = tokens(text);
    let mut out = Vec::new();
    let mut expect_from = false;

    let string_at = |i: usize| match toks.get(i) {
        Some(Token::Str { start, end, .. }) => Some((*start, *end)),
        _ => None,
    };
    let call_arg = |i: usize| match (toks.get(i), string_at(i + 1), toks.get(i + 2)) {
        (Some(Token::Punct(b'(', _)), Some(range), Some(Token::Punct(b')', _))) => Some(range),
        _ => None,
    };

    for (i, tok) in toks.iter().enumerate() {
        let after_dot = i > 0 && matches!(toks[i - 1], Token::Punct(b'.', _));
        match *tok {
            Token::Ident("import", _) if !after_dot => {
                if let Some((s, e)) = string_at(i + 1).or_else(|| call_arg(i + 1)) {
                    out.push(RawReference::new(text, s, e));
                } else {
                    expect_from = true;
                }
            }
            Token::Ident("export", _) if !after_dot => expect_from = true,
            Token::Ident("from", _) if expect_from && !after_dot => {
                if let Some((s, e)) = string_at(i + 1) {
                    out.push(RawReference::new(text, s, e));
                }
                expect_from = false;
            }
            Token::Ident("require", _) if !after_dot => {
                if let Some((s, e)) = call_arg(i + 1) {
                    out.push(RawReference::new(text, s, e));
                }
            }
            Token::Punct(b';', _) => expect_from = false,
            _ => {}
        }
    }
    out
}

/// `@import "x"`, `@import url(x)` and `url(x)`.
fn scan_style(text: &str) -> Vec<RawReference> {
    let segs = segments(text);
    let mut out = Vec::new();
    for (i, seg) in segs.iter().enumerate() {
        match seg.kind {
            SegmentKind::Url => out.push(RawReference::new(text, seg.value.start, seg.value.end)),
            SegmentKind::String => {
                let imported = i > 0
                    && segs[i - 1].kind == SegmentKind::Code
                    && segs[i - 1].text(text).trim_end().ends_with("@import");
                if imported {
                    out.push(RawReference::new(text, seg.value.start, seg.value.end));
                }
            }
            _ => {}
        }
    }
    out
}

/// Elements whose bodies are not markup.
const RAW_TEXT: [&str; 2] = ["script", "style"];

/// `rel` tokens whose `<link href>` the page loads.
const LOADED_RELS: [&str; 4] = ["stylesheet", "icon", "apple-touch-icon", "mask-icon"];

/// `src` attributes on any element and `href` on `<link>` elements whose
/// `rel` names a loaded resource.
fn scan_markup(text: &str) -> Vec<RawReference> {
    let b = text.as_bytes();
    let mut out = Vec::new();
    let mut i = 0;
    while i < b.len() {
        if b[i..].starts_with(b"<!--") {
            i = find(b, i + 4, b"-->").map_or(b.len(), |p| p + 3);
            continue;
        }
        if b[i] != b'<' || !b.get(i + 1).is_some_and(u8::is_ascii_alphabetic) {
            i += 1;
            continue;
        }

        let name_start = i + 1;
        let mut j = name_start;
        while j < b.len() && (b[j].is_ascii_alphanumeric() || b[j] == b'-') {
            j += 1;
        }
        let tag = text[name_start..j].to_ascii_lowercase();
        let mut link_href = None;
        let mut loaded = false;

        // Attributes up to the closing `>`.
        loop {
            while j < b.len() && b[j].is_ascii_whitespace() {
                j += 1;
            }
            if j >= b.len() || b[j] == b'>' {
                break;
            }
            if b[j] == b'/' {
                j += 1;
                continue;
            }
            let attr_start = j;
            while j < b.len() && !b[j].is_ascii_whitespace() && !matches!(b[j], b'=' | b'>' | b'/') {
                j += 1;
            }
            let attr = text[attr_start..j].to_ascii_lowercase();
            while j < b.len() && b[j].is_ascii_whitespace() {
                j += 1;
            }
            if b.get(j) != Some(&b'=') {
                continue;
            }
            j += 1;
            while j < b.len() && b[j].is_ascii_whitespace() {
                j += 1;
            }
            let (value_start, value_end) = match b.get(j) {
                Some(&q @ (b'"' | b'\'')) => {
                    let end = find(b, j + 1, &[q]).unwrap_or(b.len());
                    let range = (j + 1, end);
                    j = (end + 1).min(b.len());
                    range
                }
                _ => {
                    let start = j;
                    while j < b.len() && !b[j].is_ascii_whitespace() && b[j] != b'>' {
                        j += 1;
                    }
                    (start, j)
                }
            };
            match attr.as_str() {
                "src" => out.push(RawReference::new(text, value_start, value_end)),
                "href" if tag == "link" => link_href = Some((value_start, value_end)),
                "rel" if tag == "link" => {
                    loaded = text[value_start..value_end]
                        .split_ascii_whitespace()
                        .any(|t| LOADED_RELS.iter().any(|r| t.eq_ignore_ascii_case(r)));
                }
                _ => {}
            }
        }
        if let Some((start, end)) = link_href.filter(|_| loaded) {
            out.push(RawReference::new(text, start, end));
        }
        i = (j + 1).min(b.len());

        if RAW_TEXT.contains(&tag.as_str()) {
            let close = format!("</{tag}");
            i = find_ignore_case(b, i, close.as_bytes()).unwrap_or(b.len());
        }
    }
    out
}

fn find(b: &[u8], from: usize, needle: &[u8]) -> Option<usize> {
    if from >= b.len() {
        return None;
    }
    b[from..]
        .windows(needle.len())
        .position(|w| w == needle)
        .map(|p| p + from)
}

fn find_ignore_case(b: &[u8], from: usize, needle: &[u8]) -> Option<usize> {
    if from >= b.len() {
        return None;
    }
    b[from..]
        .windows(needle.len())
        .position(|w| w.eq_ignore_ascii_case(needle))
        .map(|p| p + from)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn specs(kind: AssetKind, text: &str) -> Vec<String> {
        scan(kind, text).into_iter().map(|r| r.specifier).collect()
    }

    #[test]
    fn script_forms() {
        let src = r#"
import "./polyfill";
import helper, { a } from './helper.js';
import {
  b,
} from "../lib";
export { c } from './c';
export * from "./d";
const lazy = import('./lazy');
const legacy = require("./legacy");
// import './commented';
const s = "import './in-string'";
obj.require('./member');
"#;
        assert_eq!(
            specs(AssetKind::Script, src),
            vec!["./polyfill", "./helper.js", "../lib", "./c", "./d", "./lazy", "./legacy"]
        );
    }

    #[test]
    fn script_spans_cover_specifier() {
        let src = "import x from './x';";
        let r = &scan(AssetKind::Script, src)[0];
        assert_eq!(&src[r.start..r.end], "./x");
    }

    #[test]
    fn dynamic_import_with_expression_is_skipped() {
        assert!(specs(AssetKind::Script, "import(name); require(`./${x}`);").is_empty());
    }

    #[test]
    fn style_forms() {
        let src = "@import \"base\";\n@import url(theme.css);\n/* url(old.png) */\n.a { background: url('images/bg.png') no-repeat; }\n.b { content: \"url(x)\"; }";
        assert_eq!(
            specs(AssetKind::Style, src),
            vec!["base", "theme.css", "images/bg.png"]
        );
    }

    #[test]
    fn markup_forms() {
        let src = r#"<!DOCTYPE html>
<html>
<head>
  <link rel="stylesheet" href="css/main.css">
  <!-- <img src="old.png"> -->
</head>
<body>
  <a href="about.html">About</a>
  <img src=images/logo.png alt="">
  <script>var s = '<img src="inline.png">';</script>
  <script src='js/index.js'></script>
</body>
</html>"#;
        assert_eq!(
            specs(AssetKind::Markup, src),
            vec!["css/main.css", "images/logo.png", "js/index.js"]
        );
    }

    #[test]
    fn link_href_follows_only_loaded_rels() {
        let src = r#"<head>
  <link href="favicon.ico" rel="icon">
  <link rel="manifest" href="site.webmanifest">
  <link rel="canonical" href="https://example.com/">
  <link rel="preconnect" href="https://fonts.example.com">
  <link rel="Alternate Stylesheet" href="dark.css">
  <link href="orphan.css">
</head>"#;
        assert_eq!(specs(AssetKind::Markup, src), vec!["favicon.ico", "dark.css"]);
    }

    #[test]
    fn binary_kinds_have_no_references() {
        assert!(scan(AssetKind::Image, "url(x.png)").is_empty());
        assert!(scan(AssetKind::Font, "import 'x'").is_empty());
        assert!(scan(AssetKind::Data, "{\"src\": \"x.png\"}").is_empty());
    }
}
