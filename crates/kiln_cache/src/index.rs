//! Persistent cache index.
//!
//! The index is stored as `index.json` in the cache directory. It records the
//! build generation counter, the generation in which each entry was last
//! used, and the source fingerprints of the previous build for change
//! detection.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use kiln_common::ContentHash;
use serde::{Deserialize, Serialize};

use crate::error::CacheError;
use crate::store::write_atomic;

/// Name of the index file within the cache directory.
const INDEX_FILE: &str = "index.json";

/// Bookkeeping that survives between builds.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CacheIndex {
    /// Kiln version that wrote the index.
    pub kiln_version: String,

    /// Number of builds recorded against this cache.
    pub generation: u64,

    /// Entry file stem to the generation in which it was last used.
    pub entries: BTreeMap<String, u64>,

    /// Source fingerprints observed by the previous build.
    #[serde(default)]
    pub sources: BTreeMap<PathBuf, ContentHash>,
}

impl CacheIndex {
    /// Creates an empty index for the given Kiln version.
    pub fn new(kiln_version: &str) -> Self {
        Self {
            kiln_version: kiln_version.to_string(),
            ..Self::default()
        }
    }

    /// Path of the index file inside `cache_dir`.
    pub fn path(cache_dir: &Path) -> PathBuf {
        cache_dir.join(INDEX_FILE)
    }

    /// Loads the index from the cache directory.
    ///
    /// A missing file is `Ok(None)`; an unreadable or malformed one is an
    /// error, which callers treat as an empty cache.
    pub fn load(cache_dir: &Path) -> Result<Option<Self>, CacheError> {
        let path = Self::path(cache_dir);
        let content = match std::fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(CacheError::Io { path, source: e }),
        };
        serde_json::from_str(&content)
            .map(Some)
            .map_err(|e| CacheError::IndexParse {
                reason: e.to_string(),
            })
    }

    /// Saves the index to the cache directory, creating it if needed.
    pub fn save(&self, cache_dir: &Path) -> Result<(), CacheError> {
        std::fs::create_dir_all(cache_dir).map_err(|e| CacheError::Io {
            path: cache_dir.to_path_buf(),
            source: e,
        })?;
        let json = serde_json::to_string_pretty(self).map_err(|e| CacheError::Serialization {
            reason: e.to_string(),
        })?;
        write_atomic(&Self::path(cache_dir), json.as_bytes())
    }

    /// Returns `true` if this index was written by `current_version`.
    pub fn is_compatible(&self, current_version: &str) -> bool {
        self.kiln_version == current_version
    }
}
