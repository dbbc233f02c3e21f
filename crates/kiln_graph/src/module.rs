//! Module nodes and their outgoing references.

use kiln_common::{AssetKind, ContentHash};
use kiln_source::{FileId, Span};
use std::path::{Path, PathBuf};

/// Index of a module in discovery order.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct ModuleId(u32);

impl ModuleId {
    /// Creates an id from a raw index.
    pub fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    /// The raw index.
    pub fn as_raw(self) -> u32 {
        self.0
    }

    /// The raw index as `usize`.
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// How a referrer uses its target.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum ReferenceKind {
    /// Code or stylesheet inclusion. The target joins the referrer's chunk,
    /// or for markup, is linked through a chunk placeholder at emit time.
    Import,
    /// The referrer embeds the target's emitted URL, so the target must be
    /// transformed and named first.
    Asset,
}

impl ReferenceKind {
    /// Classifies an edge by its target's kind. Scripts and styles are
    /// imported; everything else, including unclassified files, is an asset.
    pub fn for_target(target: Option<AssetKind>) -> Self {
        match target {
            Some(AssetKind::Script | AssetKind::Style) => ReferenceKind::Import,
            _ => ReferenceKind::Asset,
        }
    }
}

/// One resolved specifier in a module's source.
#[derive(Clone, Debug)]
pub struct Reference {
    /// The specifier as written.
    pub specifier: String,
    /// Where the specifier text sits in the referrer.
    pub span: Span,
    /// Import or asset edge.
    pub kind: ReferenceKind,
    /// The resolved module.
    pub target: ModuleId,
}

/// A source file discovered from the entries.
#[derive(Clone, Debug)]
pub struct Module {
    /// Discovery index.
    pub id: ModuleId,
    /// Canonical absolute path; the module's identity.
    pub path: PathBuf,
    /// Path relative to the project root with `/` separators, used as the
    /// manifest key.
    pub rel_path: String,
    /// Detected kind, or `None` when unclassified.
    pub kind: Option<AssetKind>,
    /// Fingerprint of the raw bytes.
    pub fingerprint: ContentHash,
    /// Raw file contents.
    pub bytes: Vec<u8>,
    /// Source id for text modules registered in the source database.
    pub source: Option<FileId>,
    /// Outgoing references in source order.
    pub references: Vec<Reference>,
}

impl Module {
    /// File name without its final extension.
    pub fn stem(&self) -> &str {
        self.path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("module")
    }

    /// Extension without the dot, or an empty string.
    pub fn extension(&self) -> &str {
        self.path
            .extension()
            .and_then(|s| s.to_str())
            .unwrap_or("")
    }

    /// The module's path.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reference_kind_by_target() {
        assert_eq!(
            ReferenceKind::for_target(Some(AssetKind::Style)),
            ReferenceKind::Import
        );
        assert_eq!(
            ReferenceKind::for_target(Some(AssetKind::Image)),
            ReferenceKind::Asset
        );
        assert_eq!(
            ReferenceKind::for_target(Some(AssetKind::Markup)),
            ReferenceKind::Asset
        );
        assert_eq!(ReferenceKind::for_target(None), ReferenceKind::Asset);
    }

    #[test]
    fn stem_and_extension() {
        let m = Module {
            id: ModuleId::from_raw(0),
            path: PathBuf::from("/p/src/css/main.scss"),
            rel_path: "src/css/main.scss".to_string(),
            kind: Some(AssetKind::Style),
            fingerprint: ContentHash::from_bytes(b""),
            bytes: Vec::new(),
            source: None,
            references: Vec::new(),
        };
        assert_eq!(m.stem(), "main");
        assert_eq!(m.extension(), "scss");
    }
}
