//! Content fingerprints for module identity, cache keys, and hashed filenames.

use serde::{Deserialize, Serialize};
use std::fmt;
use xxhash_rust::xxh3::Xxh3;

/// A 128-bit content fingerprint computed with XXH3.
///
/// Two byte strings with the same `ContentHash` are assumed identical. The
/// fingerprint keys the incremental cache and names content-hashed output files.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ContentHash([u8; 16]);

impl ContentHash {
    /// Computes the fingerprint of a byte slice using XXH3-128.
    pub fn from_bytes(data: &[u8]) -> Self {
        let hash = xxhash_rust::xxh3::xxh3_128(data);
        Self(hash.to_le_bytes())
    }

    /// Returns the first `len` hex digits of the fingerprint.
    ///
    /// Used for `[hash]` placeholders in emitted filenames. `len` is clamped
    /// to the full 32-digit width.
    pub fn short(&self, len: usize) -> String {
        let mut full = self.to_string();
        full.truncate(len.min(32));
        full
    }

    /// Returns the raw fingerprint bytes.
    pub fn as_bytes(&self) -> &[u8; 16] {
        &self.0
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in &self.0 {
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

impl fmt::Debug for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ContentHash({:02x}{:02x}..)", self.0[0], self.0[1])
    }
}

/// Incremental fingerprint builder for values assembled from several parts.
///
/// Each part is length-prefixed so that `["ab", "c"]` and `["a", "bc"]`
/// produce different fingerprints.
pub struct ContentHasher {
    state: Xxh3,
}

impl ContentHasher {
    /// Creates an empty hasher.
    pub fn new() -> Self {
        Self { state: Xxh3::new() }
    }

    /// Feeds one length-prefixed part into the hasher.
    pub fn update(&mut self, part: &[u8]) -> &mut Self {
        self.state.update(&(part.len() as u64).to_le_bytes());
        self.state.update(part);
        self
    }

    /// Feeds a string part into the hasher.
    pub fn update_str(&mut self, part: &str) -> &mut Self {
        self.update(part.as_bytes())
    }

    /// Feeds an existing fingerprint into the hasher.
    pub fn update_hash(&mut self, hash: &ContentHash) -> &mut Self {
        self.update(&hash.0)
    }

    /// Produces the combined fingerprint.
    pub fn finish(&self) -> ContentHash {
        ContentHash(self.state.digest128().to_le_bytes())
    }
}

impl Default for ContentHasher {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deterministic() {
        let a = ContentHash::from_bytes(b"body { color: red }");
        let b = ContentHash::from_bytes(b"body { color: red }");
        assert_eq!(a, b);
    }

    #[test]
    fn different_inputs_differ() {
        let a = ContentHash::from_bytes(b"a.js");
        let b = ContentHash::from_bytes(b"b.js");
        assert_ne!(a, b);
    }

    #[test]
    fn display_is_32_hex_digits() {
        let s = ContentHash::from_bytes(b"logo.png").to_string();
        assert_eq!(s.len(), 32);
        assert!(s.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn short_is_prefix_of_display() {
        let h = ContentHash::from_bytes(b"bundle");
        assert_eq!(h.short(8).len(), 8);
        assert!(h.to_string().starts_with(&h.short(8)));
        assert_eq!(h.short(100).len(), 32);
    }

    #[test]
    fn debug_abbreviated() {
        let s = format!("{:?}", ContentHash::from_bytes(b"x"));
        assert!(s.starts_with("ContentHash("));
        assert!(s.ends_with("..)"));
    }

    #[test]
    fn hasher_parts_are_length_prefixed() {
        let a = ContentHasher::new().update_str("ab").update_str("c").finish();
        let b = ContentHasher::new().update_str("a").update_str("bc").finish();
        assert_ne!(a, b);
    }

    #[test]
    fn hasher_deterministic() {
        let h = ContentHash::from_bytes(b"input");
        let a = ContentHasher::new().update_hash(&h).update_str("minify-style").finish();
        let b = ContentHasher::new().update_hash(&h).update_str("minify-style").finish();
        assert_eq!(a, b);
    }

    #[test]
    fn serde_roundtrip() {
        let h = ContentHash::from_bytes(b"serde test");
        let json = serde_json::to_string(&h).unwrap();
        let back: ContentHash = serde_json::from_str(&json).unwrap();
        assert_eq!(h, back);
    }
}
