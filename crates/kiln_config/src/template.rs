//! Filename templates such as `[name].[hash].js`.

use crate::error::ConfigError;
use std::fmt;

/// A substitution point in a filename template.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Placeholder {
    /// File stem of the module, or the chunk name.
    Name,
    /// Source extension without the dot.
    Ext,
    /// Output directory for the asset kind (`images`, `fonts`).
    Dir,
    /// Directory of the module relative to its alias root, with a trailing `/`.
    Path,
    /// First eight hex digits of the output fingerprint.
    Hash,
    /// Development build token, `dev<N>`.
    Token,
}

impl Placeholder {
    const ALL: [Placeholder; 6] = [
        Placeholder::Name,
        Placeholder::Ext,
        Placeholder::Dir,
        Placeholder::Path,
        Placeholder::Hash,
        Placeholder::Token,
    ];

    /// The bracketed keyword, without brackets.
    pub fn keyword(self) -> &'static str {
        match self {
            Placeholder::Name => "name",
            Placeholder::Ext => "ext",
            Placeholder::Dir => "dir",
            Placeholder::Path => "path",
            Placeholder::Hash => "hash",
            Placeholder::Token => "token",
        }
    }
}

impl fmt::Display for Placeholder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}]", self.keyword())
    }
}

/// One piece of a parsed template.
#[derive(Clone, PartialEq, Eq, Debug)]
pub enum Segment {
    /// Text copied verbatim.
    Literal(String),
    /// Text produced by substitution.
    Placeholder(Placeholder),
}

/// A parsed filename template.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct Template {
    source: String,
    segments: Vec<Segment>,
}

impl Template {
    /// Parses `source`, rejecting unknown or unterminated placeholders.
    pub fn parse(source: &str) -> Result<Self, ConfigError> {
        let mut segments = Vec::new();
        let mut literal = String::new();
        let mut rest = source;

        while let Some(open) = rest.find('[') {
            literal.push_str(&rest[..open]);
            let after = &rest[open + 1..];
            let close = after.find(']').ok_or_else(|| {
                ConfigError::ValidationError(format!(
                    "unterminated placeholder in template '{source}'"
                ))
            })?;
            let keyword = &after[..close];
            let placeholder = Placeholder::ALL
                .into_iter()
                .find(|p| p.keyword() == keyword)
                .ok_or_else(|| {
                    ConfigError::ValidationError(format!(
                        "unknown placeholder '[{keyword}]' in template '{source}'"
                    ))
                })?;
            if !literal.is_empty() {
                segments.push(Segment::Literal(std::mem::take(&mut literal)));
            }
            segments.push(Segment::Placeholder(placeholder));
            rest = &after[close + 1..];
        }
        literal.push_str(rest);
        if !literal.is_empty() {
            segments.push(Segment::Literal(literal));
        }
        if segments.is_empty() {
            return Err(ConfigError::ValidationError(
                "filename template must not be empty".to_string(),
            ));
        }

        Ok(Self {
            source: source.to_string(),
            segments,
        })
    }

    /// Returns `true` if the template uses `placeholder`.
    pub fn uses(&self, placeholder: Placeholder) -> bool {
        self.segments
            .iter()
            .any(|s| *s == Segment::Placeholder(placeholder))
    }

    /// The parsed segments in order.
    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Expands the template, asking `value` for each placeholder.
    pub fn render(&self, mut value: impl FnMut(Placeholder) -> String) -> String {
        let mut out = String::with_capacity(self.source.len() + 16);
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => out.push_str(text),
                Segment::Placeholder(p) => out.push_str(&value(*p)),
            }
        }
        out
    }

    /// The template text as written.
    pub fn as_str(&self) -> &str {
        &self.source
    }
}

impl fmt::Display for Template {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}
