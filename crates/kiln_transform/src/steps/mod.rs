//! Transform step implementations, grouped by input kind.

pub mod image;
pub mod markup;
pub mod script;
pub mod style;

/// Collapses whitespace runs in minified output. A run containing a newline
/// becomes one newline, any other run one space; leading runs are dropped.
#[derive(Default)]
pub(crate) struct Collapser {
    pending: Option<char>,
}

impl Collapser {
    /// Records a whitespace character.
    pub(crate) fn space(&mut self, ch: char) {
        self.pending = Some(match (self.pending, ch) {
            (Some('\n'), _) | (_, '\n') => '\n',
            _ => ' ',
        });
    }

    /// Emits the pending whitespace, if any, before non-space output.
    pub(crate) fn flush(&mut self, out: &mut String) {
        if let Some(p) = self.pending.take() {
            if !out.is_empty() {
                out.push(p);
            }
        }
    }

    /// Discards the pending whitespace.
    pub(crate) fn clear(&mut self) {
        self.pending = None;
    }

    /// Returns `true` if whitespace is pending.
    pub(crate) fn is_pending(&self) -> bool {
        self.pending.is_some()
    }
}
