//! Markup transforms.

use crate::error::{as_text, StepError};
use crate::lex::find;
use crate::step::{normalize, Transform};
use kiln_common::TransformKind;
use serde::{Deserialize, Serialize};

/// Options for [`MinifyMarkup`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MinifyMarkupOptions {
    /// Drop `<!-- … -->` comments, except conditional comments.
    pub remove_comments: bool,
    /// Collapse whitespace runs and remove whitespace between tags.
    pub collapse_whitespace: bool,
}

impl Default for MinifyMarkupOptions {
    fn default() -> Self {
        Self {
            remove_comments: true,
            collapse_whitespace: true,
        }
    }
}

/// Strips comments and inter-tag whitespace from HTML.
pub struct MinifyMarkup {
    remove_comments: bool,
    collapse_whitespace: bool,
    options: String,
}

impl MinifyMarkup {
    /// Creates the step.
    pub fn new(options: MinifyMarkupOptions) -> Self {
        Self {
            remove_comments: options.remove_comments,
            collapse_whitespace: options.collapse_whitespace,
            options: normalize(&options),
        }
    }
}

impl Transform for MinifyMarkup {
    fn kind(&self) -> TransformKind {
        TransformKind::MinifyMarkup
    }

    fn version(&self) -> u32 {
        1
    }

    fn options(&self) -> &str {
        &self.options
    }

    fn apply(&self, input: &[u8]) -> Result<Vec<u8>, StepError> {
        let text = as_text(input)?;
        Ok(minify_markup(text, self.remove_comments, self.collapse_whitespace).into_bytes())
    }
}

/// Elements whose contents are copied verbatim.
const RAW_TEXT: &[&str] = &["pre", "textarea", "script", "style"];

fn raw_text_element(b: &[u8], i: usize) -> Option<&'static str> {
    if b[i] != b'<' {
        return None;
    }
    RAW_TEXT.iter().copied().find(|tag| {
        let end = i + 1 + tag.len();
        end < b.len()
            && b[i + 1..end].eq_ignore_ascii_case(tag.as_bytes())
            && !b[end].is_ascii_alphanumeric()
    })
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

/// Minifies HTML or SVG text.
pub(crate) fn minify_markup(text: &str, remove_comments: bool, collapse: bool) -> String {
    let b = text.as_bytes();
    let mut out = String::with_capacity(text.len());
    let mut copied = 0;
    let mut i = 0;

    while i < b.len() {
        if b[i..].starts_with(b"<!--") {
            let end = find(b, i + 4, b"-->").map_or(b.len(), |p| p + 3);
            if remove_comments && !b[i..].starts_with(b"<!--[if") {
                out.push_str(&text[copied..i]);
                copied = end;
            }
            i = end;
        } else if let Some(tag) = raw_text_element(b, i) {
            let close = format!("</{tag}");
            i = find_ignore_case(b, i + 1, close.as_bytes())
                .and_then(|p| find(b, p, b">"))
                .map_or(b.len(), |p| p + 1);
        } else if collapse && b[i].is_ascii_whitespace() {
            let mut j = i;
            while j < b.len() && b[j].is_ascii_whitespace() {
                j += 1;
            }
            out.push_str(&text[copied..i]);
            let between_tags = out.ends_with('>') && b.get(j) == Some(&b'<');
            if !between_tags && !out.is_empty() && j < b.len() {
                out.push(' ');
            }
            copied = j;
            i = j;
        } else {
            i += 1;
        }
    }
    out.push_str(&text[copied..]);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(src: &str) -> String {
        let step = MinifyMarkup::new(MinifyMarkupOptions::default());
        String::from_utf8(step.apply(src.as_bytes()).unwrap()).unwrap()
    }

    #[test]
    fn strips_comments_and_inter_tag_whitespace() {
        let src = "<!DOCTYPE html>\n<html>\n  <!-- nav -->\n  <body>\n    <p>Hello   world</p>\n  </body>\n</html>\n";
        assert_eq!(
            run(src),
            "<!DOCTYPE html><html><body><p>Hello world</p></body></html>"
        );
    }

    #[test]
    fn keeps_raw_text_and_conditional_comments() {
        let src = "<pre>  a\n   b </pre>\n<!--[if IE]><p>x</p><![endif]-->\n<script>\n  if (a < b) {}\n</script>";
        assert_eq!(
            run(src),
            "<pre>  a\n   b </pre><!--[if IE]><p>x</p><![endif]--><script>\n  if (a < b) {}\n</script>"
        );
    }

    #[test]
    fn options_disable_passes() {
        let step = MinifyMarkup::new(MinifyMarkupOptions {
            remove_comments: false,
            collapse_whitespace: false,
        });
        let src = "<p> <!-- c --> </p>";
        assert_eq!(step.apply(src.as_bytes()).unwrap(), src.as_bytes());
    }
}
