//! Source file hashing and change detection.
//!
//! Hashes are computed in parallel with rayon and compared against the
//! fingerprints recorded by the previous build.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use kiln_common::ContentHash;
use rayon::prelude::*;

use crate::error::CacheError;

/// Result of comparing current source fingerprints against a previous build.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeSet {
    /// Files not present in the previous build.
    pub new_files: Vec<PathBuf>,

    /// Files whose fingerprint changed.
    pub modified_files: Vec<PathBuf>,

    /// Files from the previous build that no longer exist or were not hashed.
    pub deleted_files: Vec<PathBuf>,

    /// Files whose fingerprint matches.
    pub unchanged_files: Vec<PathBuf>,
}

impl ChangeSet {
    /// Returns `true` if nothing was added, modified or deleted.
    pub fn is_empty(&self) -> bool {
        self.new_files.is_empty() && self.modified_files.is_empty() && self.deleted_files.is_empty()
    }

    /// Number of files that need reprocessing (new + modified).
    pub fn dirty_count(&self) -> usize {
        self.new_files.len() + self.modified_files.len()
    }

    /// All added, modified and deleted files, sorted.
    pub fn changed(&self) -> Vec<PathBuf> {
        let mut all: Vec<PathBuf> = self
            .new_files
            .iter()
            .chain(&self.modified_files)
            .chain(&self.deleted_files)
            .cloned()
            .collect();
        all.sort();
        all
    }
}

/// Computes source fingerprints and detects changes.
pub struct SourceHasher;

impl SourceHasher {
    /// Computes the fingerprint of a single file.
    pub fn hash_file(path: &Path) -> Result<ContentHash, CacheError> {
        let content = std::fs::read(path).map_err(|e| CacheError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        Ok(ContentHash::from_bytes(&content))
    }

    /// Computes fingerprints for many files in parallel.
    ///
    /// Files that cannot be read are skipped; they show up as deleted in a
    /// subsequent change set.
    pub fn hash_files(paths: &[PathBuf]) -> HashMap<PathBuf, ContentHash> {
        paths
            .par_iter()
            .filter_map(|path| Self::hash_file(path).ok().map(|h| (path.clone(), h)))
            .collect()
    }

    /// Compares current fingerprints against the previous build's.
    pub fn detect_changes(
        current: &HashMap<PathBuf, ContentHash>,
        previous: &BTreeMap<PathBuf, ContentHash>,
    ) -> ChangeSet {
        let mut changes = ChangeSet::default();

        for (path, hash) in current {
            match previous.get(path) {
                Some(prev) if prev == hash => changes.unchanged_files.push(path.clone()),
                Some(_) => changes.modified_files.push(path.clone()),
                None => changes.new_files.push(path.clone()),
            }
        }
        changes.deleted_files = previous
            .keys()
            .filter(|p| !current.contains_key(*p))
            .cloned()
            .collect();

        changes.new_files.sort();
        changes.modified_files.sort();
        changes.unchanged_files.sort();
        changes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_file_matches_content() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("main.js");
        std::fs::write(&path, "let a = 1;").unwrap();
        assert_eq!(
            SourceHasher::hash_file(&path).unwrap(),
            ContentHash::from_bytes(b"let a = 1;")
        );
    }

    #[test]
    fn hash_files_skips_missing() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.css");
        std::fs::write(&a, "a{}").unwrap();
        let missing = dir.path().join("gone.css");
        let hashes = SourceHasher::hash_files(&[a.clone(), missing]);
        assert_eq!(hashes.len(), 1);
        assert!(hashes.contains_key(&a));
    }

    #[test]
    fn detect_all_categories() {
        let h = |s: &str| ContentHash::from_bytes(s.as_bytes());
        let mut previous = BTreeMap::new();
        previous.insert(PathBuf::from("same.js"), h("same"));
        previous.insert(PathBuf::from("edit.js"), h("old"));
        previous.insert(PathBuf::from("gone.js"), h("gone"));

        let mut current = HashMap::new();
        current.insert(PathBuf::from("same.js"), h("same"));
        current.insert(PathBuf::from("edit.js"), h("new"));
        current.insert(PathBuf::from("added.js"), h("added"));

        let changes = SourceHasher::detect_changes(&current, &previous);
        assert_eq!(changes.new_files, vec![PathBuf::from("added.js")]);
        assert_eq!(changes.modified_files, vec![PathBuf::from("edit.js")]);
        assert_eq!(changes.deleted_files, vec![PathBuf::from("gone.js")]);
        assert_eq!(changes.unchanged_files, vec![PathBuf::from("same.js")]);
        assert_eq!(changes.dirty_count(), 2);
        assert_eq!(
            changes.changed(),
            vec![
                PathBuf::from("added.js"),
                PathBuf::from("edit.js"),
                PathBuf::from("gone.js")
            ]
        );
    }

    #[test]
    fn no_changes_is_empty() {
        let mut previous = BTreeMap::new();
        previous.insert(PathBuf::from("a.js"), ContentHash::from_bytes(b"a"));
        let current: HashMap<_, _> = previous.clone().into_iter().collect();
        assert!(SourceHasher::detect_changes(&current, &previous).is_empty());
    }
}
