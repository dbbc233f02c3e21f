//! Lightweight lexers that split script and stylesheet text into code,
//! string and comment segments.
//!
//! They are shared by the transform steps and by the reference scanners in
//! the graph builder. Both are lenient: an unterminated string or comment
//! simply runs to the end of the input.

pub mod script;
pub mod style;

/// Returns `true` for bytes that may continue an identifier.
pub(crate) fn is_ident_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_' || b == b'$'
}

/// Skips a quoted literal starting at `start` (which holds the quote byte)
/// and returns the index one past the closing quote. Single and double quoted
/// literals stop at an unescaped newline.
pub(crate) fn skip_quoted(b: &[u8], start: usize, quote: u8) -> usize {
    let mut j = start + 1;
    while j < b.len() {
        match b[j] {
            b'\\' => j += 2,
            c if c == quote => return j + 1,
            b'\n' if quote != b'`' => return j,
            _ => j += 1,
        }
    }
    b.len()
}

/// Finds `needle` at or after `from`.
pub(crate) fn find(b: &[u8], from: usize, needle: &[u8]) -> Option<usize> {
    if from >= b.len() {
        return None;
    }
    b[from..]
        .windows(needle.len())
        .position(|w| w == needle)
        .map(|p| p + from)
}
