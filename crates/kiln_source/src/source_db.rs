//! Registry of the text sources loaded during one build.

use crate::location::Location;
use crate::source_file::SourceFile;
use crate::span::{FileId, Span};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Owns every text source read by the graph builder and resolves spans to
/// locations for diagnostics.
///
/// Sources are keyed by their absolute path; the stored display path is made
/// relative to the project root when the source lives below it.
pub struct SourceDb {
    root: Option<PathBuf>,
    files: Vec<SourceFile>,
    by_path: HashMap<PathBuf, FileId>,
}

impl SourceDb {
    /// Creates an empty database with absolute display paths.
    pub fn new() -> Self {
        Self {
            root: None,
            files: Vec::new(),
            by_path: HashMap::new(),
        }
    }

    /// Creates an empty database that displays paths relative to `root`.
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self {
            root: Some(root.into()),
            ..Self::new()
        }
    }

    /// Registers `content` under `path`, returning the existing id if the path
    /// was registered before.
    pub fn add_source(&mut self, path: impl Into<PathBuf>, content: String) -> FileId {
        let path = path.into();
        if let Some(id) = self.by_path.get(&path) {
            return *id;
        }
        let id = FileId::from_raw(self.files.len() as u32);
        let display = self.display_path(&path);
        self.files.push(SourceFile::new(id, display, content));
        self.by_path.insert(path, id);
        id
    }

    /// Looks up the id of a previously registered absolute path.
    pub fn find(&self, path: &Path) -> Option<FileId> {
        self.by_path.get(path).copied()
    }

    /// Returns the source for `id`.
    ///
    /// # Panics
    ///
    /// Panics if `id` was not issued by this database.
    pub fn get_file(&self, id: FileId) -> &SourceFile {
        &self.files[id.as_raw() as usize]
    }

    /// Resolves the start of `span` to a location, or `None` for
    /// [`Span::NONE`].
    pub fn locate(&self, span: Span) -> Option<Location> {
        if span.is_none() {
            return None;
        }
        let file = self.get_file(span.file);
        let (line, column) = file.line_col(span.start);
        Some(Location {
            path: file.path.clone(),
            line,
            column,
        })
    }

    /// Returns the text covered by `span`.
    pub fn snippet(&self, span: Span) -> &str {
        &self.get_file(span.file).content[span.range()]
    }

    /// Number of registered sources.
    pub fn len(&self) -> usize {
        self.files.len()
    }

    /// Returns `true` if nothing has been registered.
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Formats `path` relative to the root, if it lies below it.
    pub fn display_path(&self, path: &Path) -> PathBuf {
        self.root
            .as_deref()
            .and_then(|root| path.strip_prefix(root).ok())
            .map(Path::to_path_buf)
            .unwrap_or_else(|| path.to_path_buf())
    }
}

impl Default for SourceDb {
    fn default() -> Self {
        Self::new()
    }
}
