//! Specifier rewriting ahead of transformation.
//!
//! Asset references are replaced by the prerequisite's emitted URL. In
//! markup, script and style references become chunk placeholders that the
//! emitter replaces with chunk filenames once chunks are named.

use std::borrow::Cow;
use std::ops::Range;

use kiln_common::AssetKind;
use kiln_graph::{Module, ModuleId, ReferenceKind};

const PLACEHOLDER_PREFIX: &str = "__KILN_CHUNK_";
const PLACEHOLDER_SUFFIX: &str = "__";

/// The placeholder standing in for the URL of the chunk rooted at `target`.
pub fn chunk_placeholder(target: ModuleId) -> String {
    format!("{PLACEHOLDER_PREFIX}{}{PLACEHOLDER_SUFFIX}", target.as_raw())
}

/// A chunk placeholder found in transformed markup.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PlaceholderMatch {
    /// Byte range of the whole placeholder.
    pub range: Range<usize>,
    /// The chunk root it refers to.
    pub target: ModuleId,
}

/// Finds every chunk placeholder in `text`, in order.
pub fn find_placeholders(text: &str) -> Vec<PlaceholderMatch> {
    let mut found = Vec::new();
    let mut from = 0;
    while let Some(pos) = text[from..].find(PLACEHOLDER_PREFIX) {
        let start = from + pos;
        let digits_start = start + PLACEHOLDER_PREFIX.len();
        let digits_len = text[digits_start..]
            .bytes()
            .take_while(u8::is_ascii_digit)
            .count();
        let digits_end = digits_start + digits_len;
        if digits_len > 0 && text[digits_end..].starts_with(PLACEHOLDER_SUFFIX) {
            if let Ok(raw) = text[digits_start..digits_end].parse::<u32>() {
                let end = digits_end + PLACEHOLDER_SUFFIX.len();
                found.push(PlaceholderMatch {
                    range: start..end,
                    target: ModuleId::from_raw(raw),
                });
                from = end;
                continue;
            }
        }
        from = digits_start;
    }
    found
}

/// Produces the bytes `module`'s chain runs on.
///
/// `urls` holds the emitted path of every module whose identity is already
/// known, indexed by module id. Query strings and fragments on the original
/// specifier are kept.
pub fn rewrite_input<'m>(module: &'m Module, urls: &[Option<String>]) -> Cow<'m, [u8]> {
    let markup = module.kind == Some(AssetKind::Markup);
    let mut edits: Vec<(Range<usize>, String)> = module
        .references
        .iter()
        .filter_map(|r| {
            let base = match r.kind {
                ReferenceKind::Asset => urls.get(r.target.index())?.clone()?,
                ReferenceKind::Import if markup => chunk_placeholder(r.target),
                ReferenceKind::Import => return None,
            };
            Some((r.span.range(), format!("{base}{}", suffix(&r.specifier))))
        })
        .collect();

    if edits.is_empty() {
        return Cow::Borrowed(&module.bytes);
    }
    edits.sort_by_key(|(range, _)| range.start);

    let bytes = &module.bytes;
    let mut out = Vec::with_capacity(bytes.len());
    let mut pos = 0;
    for (range, replacement) in edits {
        if range.start < pos || range.end > bytes.len() {
            continue;
        }
        out.extend_from_slice(&bytes[pos..range.start]);
        out.extend_from_slice(replacement.as_bytes());
        pos = range.end;
    }
    out.extend_from_slice(&bytes[pos..]);
    Cow::Owned(out)
}

/// The `?query` or `#fragment` tail of a specifier.
fn suffix(specifier: &str) -> &str {
    specifier
        .find(['?', '#'])
        .map_or("", |i| &specifier[i..])
}
