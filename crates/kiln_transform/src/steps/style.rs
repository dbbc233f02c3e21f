//! Stylesheet transforms.

use crate::error::{as_text, StepError};
use crate::lex::style::{segments, SegmentKind};
use crate::step::{normalize, Transform};
use crate::steps::Collapser;
use kiln_common::TransformKind;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// Options for [`Preprocess`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PreprocessOptions {
    /// Variables visible to every stylesheet, without the `$`.
    pub variables: BTreeMap<String, String>,
}

/// Expands `$name: value;` variables and drops `//` line comments.
pub struct Preprocess {
    variables: BTreeMap<String, String>,
    options: String,
}

impl Preprocess {
    /// Creates the step.
    pub fn new(options: PreprocessOptions) -> Self {
        Self {
            options: normalize(&options),
            variables: options.variables,
        }
    }
}

fn is_var_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_' || b == b'-'
}

/// Expands `$name` references in a code fragment.
fn expand(code: &str, vars: &HashMap<String, String>, out: &mut String) -> Result<(), StepError> {
    let b = code.as_bytes();
    let mut copied = 0;
    let mut i = 0;
    while i < b.len() {
        if b[i] == b'$' && b.get(i + 1).is_some_and(|c| c.is_ascii_alphabetic() || *c == b'_') {
            let start = i + 1;
            let mut end = start;
            while end < b.len() && is_var_byte(b[end]) {
                end += 1;
            }
            let name = &code[start..end];
            let value = vars.get(name).ok_or_else(|| StepError::UndefinedVariable {
                name: name.to_string(),
            })?;
            out.push_str(&code[copied..i]);
            out.push_str(value);
            copied = end;
            i = end;
        } else {
            i += 1;
        }
    }
    out.push_str(&code[copied..]);
    Ok(())
}

/// Expands references in a definition's raw value, leaving strings alone.
fn expand_value(raw: &str, vars: &HashMap<String, String>) -> Result<String, StepError> {
    let mut out = String::with_capacity(raw.len());
    for seg in segments(raw) {
        match seg.kind {
            SegmentKind::Code => expand(seg.text(raw), vars, &mut out)?,
            _ => out.push_str(seg.text(raw)),
        }
    }
    Ok(out.trim().to_string())
}

fn at_statement_start(out: &str) -> bool {
    matches!(out.trim_end().chars().last(), None | Some('{' | '}' | ';'))
}

impl Transform for Preprocess {
    fn kind(&self) -> TransformKind {
        TransformKind::Preprocess
    }

    fn version(&self) -> u32 {
        1
    }

    fn options(&self) -> &str {
        &self.options
    }

    fn apply(&self, input: &[u8]) -> Result<Vec<u8>, StepError> {
        let text = as_text(input)?;
        let mut vars: HashMap<String, String> = self
            .variables
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        let mut out = String::with_capacity(text.len());
        // Name and raw value of the definition being read.
        let mut def: Option<(String, String)> = None;
        // Set after a definition ends, to drop the rest of its line.
        let mut skip_line_end = false;

        for seg in segments(text) {
            let seg_text = seg.text(text);
            if seg.kind == SegmentKind::LineComment {
                continue;
            }
            if seg.kind != SegmentKind::Code {
                skip_line_end = false;
                match def.as_mut() {
                    Some((_, raw)) => raw.push_str(seg_text),
                    None => out.push_str(seg_text),
                }
                continue;
            }

            let b = seg_text.as_bytes();
            let mut i = 0;
            let mut copied = 0;
            while i < b.len() {
                if skip_line_end {
                    match b[i] {
                        b' ' | b'\t' | b'\r' => {
                            i += 1;
                            copied = i;
                            continue;
                        }
                        b'\n' => {
                            i += 1;
                            copied = i;
                            skip_line_end = false;
                            continue;
                        }
                        _ => skip_line_end = false,
                    }
                }
                if let Some((name, raw)) = def.as_mut() {
                    if b[i] == b';' {
                        raw.push_str(&seg_text[copied..i]);
                        let value = expand_value(raw, &vars)?;
                        vars.insert(std::mem::take(name), value);
                        def = None;
                        skip_line_end = true;
                        i += 1;
                        copied = i;
                    } else {
                        i += 1;
                    }
                    continue;
                }
                if b[i] == b'$' && b.get(i + 1).is_some_and(|c| c.is_ascii_alphabetic() || *c == b'_') {
                    let start = i + 1;
                    let mut end = start;
                    while end < b.len() && is_var_byte(b[end]) {
                        end += 1;
                    }
                    let mut colon = end;
                    while colon < b.len() && b[colon].is_ascii_whitespace() {
                        colon += 1;
                    }
                    let pending = &seg_text[copied..i];
                    let statement_start = if pending.trim().is_empty() {
                        at_statement_start(&out)
                    } else {
                        at_statement_start(pending)
                    };
                    if b.get(colon) == Some(&b':') && statement_start {
                        out.push_str(seg_text[copied..i].trim_end_matches([' ', '\t']));
                        def = Some((seg_text[start..end].to_string(), String::new()));
                        i = colon + 1;
                        copied = i;
                        continue;
                    }
                    out.push_str(&seg_text[copied..i]);
                    expand(&seg_text[i..end], &vars, &mut out)?;
                    i = end;
                    copied = end;
                    continue;
                }
                i += 1;
            }
            match def.as_mut() {
                Some((_, raw)) => raw.push_str(&seg_text[copied..]),
                None => out.push_str(&seg_text[copied..]),
            }
        }

        if let Some((name, raw)) = def {
            let value = expand_value(&raw, &vars)?;
            vars.insert(name, value);
        }
        Ok(out.into_bytes())
    }
}

/// Options for [`VendorPrefix`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct VendorPrefixOptions {
    /// Prefixes to add, in output order.
    pub prefixes: Vec<String>,
    /// Properties that receive prefixed copies.
    pub properties: Vec<String>,
}

impl Default for VendorPrefixOptions {
    fn default() -> Self {
        Self {
            prefixes: vec!["-webkit-".into(), "-moz-".into(), "-ms-".into()],
            properties: vec![
                "appearance".into(),
                "backdrop-filter".into(),
                "transform".into(),
                "transition".into(),
                "user-select".into(),
            ],
        }
    }
}

/// Inserts vendor-prefixed copies before selected declarations.
pub struct VendorPrefix {
    prefixes: Vec<String>,
    properties: Vec<String>,
    options: String,
}

impl VendorPrefix {
    /// Creates the step.
    pub fn new(options: VendorPrefixOptions) -> Self {
        Self {
            options: normalize(&options),
            prefixes: options.prefixes,
            properties: options.properties,
        }
    }
}

impl Transform for VendorPrefix {
    fn kind(&self) -> TransformKind {
        TransformKind::VendorPrefix
    }

    fn version(&self) -> u32 {
        1
    }

    fn options(&self) -> &str {
        &self.options
    }

    fn apply(&self, input: &[u8]) -> Result<Vec<u8>, StepError> {
        let text = as_text(input)?;
        let b = text.as_bytes();
        let mut is_code = vec![false; b.len()];
        for seg in segments(text) {
            if seg.kind == SegmentKind::Code {
                is_code[seg.start..seg.end].fill(true);
            }
        }

        let mut out = String::with_capacity(text.len());
        let mut copied = 0;
        let mut prev_sig = 0u8;
        let mut ws_start = 0;
        let mut i = 0;
        while i < b.len() {
            if !is_code[i] {
                prev_sig = 0;
                i += 1;
                ws_start = i;
                continue;
            }
            let c = b[i];
            if c.is_ascii_whitespace() {
                i += 1;
                continue;
            }
            if c.is_ascii_lowercase() && matches!(prev_sig, b'{' | b';') {
                let start = i;
                let mut end = i;
                while end < b.len() && is_code[end] && (b[end].is_ascii_lowercase() || b[end] == b'-') {
                    end += 1;
                }
                let mut colon = end;
                while colon < b.len() && is_code[colon] && b[colon].is_ascii_whitespace() {
                    colon += 1;
                }
                let property = &text[start..end];
                if b.get(colon) == Some(&b':') && self.properties.iter().any(|p| p == property) {
                    let mut decl_end = colon;
                    while decl_end < b.len() && !(is_code[decl_end] && matches!(b[decl_end], b';' | b'}')) {
                        decl_end += 1;
                    }
                    let decl = text[start..decl_end].trim_end();
                    let indent = &text[ws_start..start];
                    out.push_str(&text[copied..start]);
                    for prefix in &self.prefixes {
                        out.push_str(prefix);
                        out.push_str(decl);
                        out.push(';');
                        out.push_str(indent);
                    }
                    copied = start;
                }
                prev_sig = b'a';
                i = end.max(start + 1);
                ws_start = i;
                continue;
            }
            prev_sig = c;
            i += 1;
            ws_start = i;
        }
        out.push_str(&text[copied..]);
        Ok(out.into_bytes())
    }
}

/// Options for [`MinifyStyle`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MinifyStyleOptions {
    /// Drop `/* … */` comments.
    pub remove_comments: bool,
    /// Keep `/*! … */` comments even when removing others.
    pub keep_license: bool,
}

impl Default for MinifyStyleOptions {
    fn default() -> Self {
        Self {
            remove_comments: true,
            keep_license: true,
        }
    }
}

/// Removes comments and insignificant whitespace from stylesheets.
pub struct MinifyStyle {
    remove_comments: bool,
    keep_license: bool,
    options: String,
}

impl MinifyStyle {
    /// Creates the step.
    pub fn new(options: MinifyStyleOptions) -> Self {
        Self {
            remove_comments: options.remove_comments,
            keep_license: options.keep_license,
            options: normalize(&options),
        }
    }
}

/// Punctuation that needs no surrounding space.
const TIGHT_BEFORE: &[char] = &['{', '}', ';', ',', '>'];
const TIGHT_AFTER: &[char] = &['{', '}', ';', ',', '>', ':'];

fn push_spaced(out: &mut String, ws: &mut Collapser, next: char) {
    if ws.is_pending()
        && !TIGHT_BEFORE.contains(&next)
        && out.chars().last().is_some_and(|c| !TIGHT_AFTER.contains(&c))
    {
        out.push(' ');
    }
    ws.clear();
}

impl Transform for MinifyStyle {
    fn kind(&self) -> TransformKind {
        TransformKind::MinifyStyle
    }

    fn version(&self) -> u32 {
        1
    }

    fn options(&self) -> &str {
        &self.options
    }

    fn apply(&self, input: &[u8]) -> Result<Vec<u8>, StepError> {
        let text = as_text(input)?;
        let mut out = String::with_capacity(text.len());
        let mut ws = Collapser::default();
        for seg in segments(text) {
            let seg_text = seg.text(text);
            match seg.kind {
                SegmentKind::LineComment => ws.space(' '),
                SegmentKind::Comment
                    if self.remove_comments && !(self.keep_license && seg.is_license(text)) =>
                {
                    ws.space(' ')
                }
                SegmentKind::Code => {
                    for ch in seg_text.chars() {
                        if ch.is_whitespace() {
                            ws.space(' ');
                            continue;
                        }
                        push_spaced(&mut out, &mut ws, ch);
                        if ch == '}' && out.ends_with(';') {
                            out.pop();
                        }
                        out.push(ch);
                    }
                }
                _ => {
                    let first = seg_text.chars().next().unwrap_or(' ');
                    push_spaced(&mut out, &mut ws, first);
                    out.push_str(seg_text);
                }
            }
        }
        Ok(out.into_bytes())
    }
}
