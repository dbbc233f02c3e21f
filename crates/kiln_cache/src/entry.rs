//! Memoised transform results.

use kiln_common::{AssetKind, ContentHash};
use serde::{Deserialize, Serialize};

/// The output of one successful chain run.
///
/// Entries are immutable once created; a store for an existing key replaces
/// the shared `Arc` wholesale.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheEntry {
    /// Transformed output bytes.
    pub output: Vec<u8>,
    /// Fingerprint of `output`.
    pub fingerprint: ContentHash,
    /// Asset kind of the module that produced the output.
    pub kind: AssetKind,
    /// Source file extension without the dot, used by `[ext]` in templates.
    pub extension: String,
}

impl CacheEntry {
    /// Creates an entry, fingerprinting `output`.
    pub fn new(output: Vec<u8>, kind: AssetKind, extension: impl Into<String>) -> Self {
        Self {
            fingerprint: ContentHash::from_bytes(&output),
            output,
            kind,
            extension: extension.into(),
        }
    }

    /// Returns `true` if `other` carries the same value.
    pub fn same_value(&self, other: &CacheEntry) -> bool {
        self.fingerprint == other.fingerprint
            && self.kind == other.kind
            && self.extension == other.extension
            && self.output == other.output
    }
}
