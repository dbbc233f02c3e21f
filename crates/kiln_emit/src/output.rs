//! The output root on disk.
//!
//! Full builds start from an empty root. Incremental builds leave
//! byte-identical files alone and delete whatever the current build no
//! longer produces. Every file is written to a temporary sibling first and
//! renamed into place, so a reader never sees a partial file.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use crate::error::EmitError;

static TEMP_SEQ: AtomicU64 = AtomicU64::new(0);

/// Result of writing one output file.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WriteOutcome {
    /// The file was created or replaced.
    Written,
    /// The file already had these exact bytes.
    Unchanged,
}

/// The directory build output is written to.
#[derive(Clone, Debug)]
pub struct OutputRoot {
    dir: PathBuf,
}

impl OutputRoot {
    /// Opens `dir` as the output root for the project at `project_root`.
    ///
    /// Fails with [`EmitError::UnsafeOutputRoot`] if `dir` is the project
    /// root or one of its ancestors.
    pub fn new(dir: &Path, project_root: &Path) -> Result<Self, EmitError> {
        let resolved = std::fs::canonicalize(dir).unwrap_or_else(|_| dir.to_path_buf());
        let project =
            std::fs::canonicalize(project_root).unwrap_or_else(|_| project_root.to_path_buf());
        if project.starts_with(&resolved) {
            return Err(EmitError::UnsafeOutputRoot {
                path: dir.to_path_buf(),
            });
        }
        Ok(Self {
            dir: dir.to_path_buf(),
        })
    }

    /// The root directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Removes everything under the root and recreates it empty.
    pub fn clear(&self) -> Result<(), EmitError> {
        match std::fs::remove_dir_all(&self.dir) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(source) => {
                return Err(EmitError::Io {
                    path: self.dir.clone(),
                    source,
                })
            }
        }
        std::fs::create_dir_all(&self.dir).map_err(|source| EmitError::Io {
            path: self.dir.clone(),
            source,
        })
    }

    /// Writes `bytes` to `rel`, a `/`-separated path below the root.
    pub fn write(&self, rel: &str, bytes: &[u8]) -> Result<WriteOutcome, EmitError> {
        let path = self.dir.join(rel);
        if let Ok(existing) = std::fs::read(&path) {
            if existing == bytes {
                return Ok(WriteOutcome::Unchanged);
            }
        }
        let io = |source| EmitError::Io {
            path: path.clone(),
            source,
        };
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(io)?;
        }
        write_atomic(&path, bytes).map_err(io)?;
        Ok(WriteOutcome::Written)
    }

    /// All files below the root as sorted `/`-separated relative paths.
    pub fn files(&self) -> Result<Vec<String>, EmitError> {
        let mut files = Vec::new();
        if self.dir.is_dir() {
            collect_files(&self.dir, "", &mut files)?;
        }
        files.sort();
        Ok(files)
    }

    /// Deletes every file not in `keep`, then any directory left empty.
    /// Returns the deleted files.
    pub fn remove_stale(&self, keep: &BTreeSet<String>) -> Result<Vec<String>, EmitError> {
        let mut removed = Vec::new();
        for rel in self.files()? {
            if keep.contains(&rel) {
                continue;
            }
            let path = self.dir.join(&rel);
            std::fs::remove_file(&path).map_err(|source| EmitError::Io { path, source })?;
            tracing::debug!(file = %rel, "removed stale output");
            removed.push(rel);
        }
        if self.dir.is_dir() {
            prune_empty_dirs(&self.dir)?;
        }
        Ok(removed)
    }
}

fn write_atomic(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let seq = TEMP_SEQ.fetch_add(1, Ordering::Relaxed);
    let tmp = path.with_file_name(format!(".{name}.{}.{seq}.tmp", std::process::id()));
    let result = std::fs::write(&tmp, bytes).and_then(|()| std::fs::rename(&tmp, path));
    if result.is_err() {
        let _ = std::fs::remove_file(&tmp);
    }
    result
}

fn collect_files(dir: &Path, prefix: &str, out: &mut Vec<String>) -> Result<(), EmitError> {
    let io = |source| EmitError::Io {
        path: dir.to_path_buf(),
        source,
    };
    for entry in std::fs::read_dir(dir).map_err(io)? {
        let entry = entry.map_err(io)?;
        let name = entry.file_name().to_string_lossy().into_owned();
        let rel = if prefix.is_empty() {
            name
        } else {
            format!("{prefix}/{name}")
        };
        if entry.file_type().map_err(io)?.is_dir() {
            collect_files(&entry.path(), &rel, out)?;
        } else {
            out.push(rel);
        }
    }
    Ok(())
}

/// Removes empty directories below `dir`, deepest first. `dir` itself stays.
fn prune_empty_dirs(dir: &Path) -> Result<bool, EmitError> {
    let io = |source| EmitError::Io {
        path: dir.to_path_buf(),
        source,
    };
    let mut empty = true;
    for entry in std::fs::read_dir(dir).map_err(io)? {
        let entry = entry.map_err(io)?;
        let path = entry.path();
        if entry.file_type().map_err(io)?.is_dir() && prune_empty_dirs(&path)? {
            std::fs::remove_dir(&path).map_err(|source| EmitError::Io {
                path: path.clone(),
                source,
            })?;
        } else {
            empty = false;
        }
    }
    Ok(empty)
}
