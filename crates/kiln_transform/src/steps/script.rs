//! Script transforms.

use crate::error::{as_text, StepError};
use crate::lex::is_ident_byte;
use crate::lex::script::{segments, SegmentKind};
use crate::step::{normalize, Transform};
use crate::steps::Collapser;
use kiln_common::TransformKind;
use serde::{Deserialize, Serialize};

/// Options for [`Downlevel`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DownlevelOptions {}

/// Rewrites `const` and `let` declarations to `var` for older runtimes.
pub struct Downlevel {
    options: String,
}

impl Downlevel {
    /// Creates the step.
    pub fn new(options: DownlevelOptions) -> Self {
        Self {
            options: normalize(&options),
        }
    }
}

impl Transform for Downlevel {
    fn kind(&self) -> TransformKind {
        TransformKind::Downlevel
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
        let mut out = String::with_capacity(text.len());
        for seg in segments(text) {
            if seg.kind != SegmentKind::Code {
                out.push_str(seg.text(text));
                continue;
            }
            let mut copied = seg.start;
            let mut i = seg.start;
            while i < seg.end {
                if !is_ident_byte(b[i]) {
                    i += 1;
                    continue;
                }
                let start = i;
                while i < seg.end && is_ident_byte(b[i]) {
                    i += 1;
                }
                let word = &text[start..i];
                let member = start > 0 && b[start - 1] == b'.';
                let declares = b
                    .get(i)
                    .is_some_and(|c| c.is_ascii_whitespace() || *c == b'{' || *c == b'[');
                if (word == "const" || word == "let") && !member && declares {
                    out.push_str(&text[copied..start]);
                    out.push_str("var");
                    copied = i;
                }
            }
            out.push_str(&text[copied..seg.end]);
        }
        Ok(out.into_bytes())
    }
}

/// Options for [`MinifyScript`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MinifyScriptOptions {
    /// Keep `/*! … */` comments.
    pub keep_license: bool,
}

impl Default for MinifyScriptOptions {
    fn default() -> Self {
        Self { keep_license: true }
    }
}

/// Strips comments, indentation and blank lines from scripts. Line breaks
/// between statements are kept so automatic semicolon insertion still holds.
pub struct MinifyScript {
    keep_license: bool,
    options: String,
}

impl MinifyScript {
    /// Creates the step.
    pub fn new(options: MinifyScriptOptions) -> Self {
        Self {
            keep_license: options.keep_license,
            options: normalize(&options),
        }
    }
}

impl Transform for MinifyScript {
    fn kind(&self) -> TransformKind {
        TransformKind::MinifyScript
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
                SegmentKind::Code => {
                    for ch in seg_text.chars() {
                        if ch.is_whitespace() {
                            ws.space(ch);
                        } else {
                            ws.flush(&mut out);
                            out.push(ch);
                        }
                    }
                }
                SegmentKind::LineComment | SegmentKind::BlockComment
                    if !(self.keep_license && seg.is_license(text)) =>
                {
                    ws.space(if seg_text.contains('\n') { '\n' } else { ' ' });
                }
                _ => {
                    ws.flush(&mut out);
                    out.push_str(seg_text);
                }
            }
        }
        Ok(out.into_bytes())
    }
}
