//! A registered text source with a line index.

use crate::span::FileId;
use kiln_common::ContentHash;
use std::path::PathBuf;

/// A text module's content plus precomputed line starts.
pub struct SourceFile {
    /// Identifier within the owning [`SourceDb`](crate::SourceDb).
    pub id: FileId,
    /// Path shown in diagnostics (relative to the project root when possible).
    pub path: PathBuf,
    /// Full text.
    pub content: String,
    /// Fingerprint of `content`.
    pub content_hash: ContentHash,
    line_starts: Vec<u32>,
}

impl SourceFile {
    /// Creates a source, computing its line index and fingerprint.
    pub fn new(id: FileId, path: PathBuf, content: String) -> Self {
        let line_starts = std::iter::once(0)
            .chain(
                content
                    .bytes()
                    .enumerate()
                    .filter(|(_, b)| *b == b'\n')
                    .map(|(i, _)| (i + 1) as u32),
            )
            .collect();
        let content_hash = ContentHash::from_bytes(content.as_bytes());
        Self {
            id,
            path,
            content,
            content_hash,
            line_starts,
        }
    }

    /// Converts a byte offset into 1-indexed `(line, column)`.
    pub fn line_col(&self, byte_offset: u32) -> (u32, u32) {
        let line_idx = match self.line_starts.binary_search(&byte_offset) {
            Ok(idx) => idx,
            Err(idx) => idx - 1,
        };
        let col = byte_offset - self.line_starts[line_idx] + 1;
        (line_idx as u32 + 1, col)
    }

    /// Returns the full text of the line containing `byte_offset`, without
    /// its terminator.
    pub fn line_text(&self, byte_offset: u32) -> &str {
        let (line, _) = self.line_col(byte_offset);
        let start = self.line_starts[line as usize - 1] as usize;
        let end = self
            .line_starts
            .get(line as usize)
            .map_or(self.content.len(), |next| *next as usize);
        self.content[start..end].trim_end_matches(['\n', '\r'])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make(content: &str) -> SourceFile {
        SourceFile::new(FileId::from_raw(0), PathBuf::from("src/app.js"), content.to_string())
    }

    #[test]
    fn line_col_resolution() {
        let f = make("import a from './a';\nimport b from './b';\n");
        assert_eq!(f.line_col(0), (1, 1));
        assert_eq!(f.line_col(21), (2, 1));
        assert_eq!(f.line_col(35), (2, 15));
    }

    #[test]
    fn line_text_strips_terminator() {
        let f = make("a {}\r\nb { color: red }\n");
        assert_eq!(f.line_text(0), "a {}");
        assert_eq!(f.line_text(8), "b { color: red }");
    }

    #[test]
    fn empty_source() {
        let f = make("");
        assert_eq!(f.line_col(0), (1, 1));
        assert_eq!(f.line_text(0), "");
    }

    #[test]
    fn fingerprint_matches_content() {
        let f = make("body {}");
        assert_eq!(f.content_hash, ContentHash::from_bytes(b"body {}"));
    }
}
