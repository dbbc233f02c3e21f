//! Cache keys.

use kiln_common::{ContentHash, ContentHasher};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifies one memoised transform result.
///
/// Two keys are equal only when the rewritten input bytes, the chain (steps
/// plus normalised options) and the tool version all match, so a hit is
/// guaranteed to produce the same output the chain would.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub struct CacheKey {
    /// Fingerprint of the module input after specifier rewriting.
    pub input: ContentHash,
    /// Identity of the transform chain.
    pub chain: ContentHash,
    /// Combined implementation version of the chain's steps.
    pub tool_version: ContentHash,
}

impl CacheKey {
    /// Creates a key from its three components.
    pub fn new(input: ContentHash, chain: ContentHash, tool_version: ContentHash) -> Self {
        Self {
            input,
            chain,
            tool_version,
        }
    }

    /// Single fingerprint combining all three components.
    pub fn digest(&self) -> ContentHash {
        ContentHasher::new()
            .update_hash(&self.input)
            .update_hash(&self.chain)
            .update_hash(&self.tool_version)
            .finish()
    }

    /// The file stem used for this key in the entry store.
    pub fn file_stem(&self) -> String {
        self.digest().to_string()
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.digest().short(16))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn h(s: &str) -> ContentHash {
        ContentHash::from_bytes(s.as_bytes())
    }

    #[test]
    fn every_component_matters() {
        let base = CacheKey::new(h("in"), h("chain"), h("v1"));
        assert_ne!(base.digest(), CacheKey::new(h("in2"), h("chain"), h("v1")).digest());
        assert_ne!(base.digest(), CacheKey::new(h("in"), h("chain2"), h("v1")).digest());
        assert_ne!(base.digest(), CacheKey::new(h("in"), h("chain"), h("v2")).digest());
    }

    #[test]
    fn components_are_not_interchangeable() {
        let a = CacheKey::new(h("x"), h("y"), h("z"));
        let b = CacheKey::new(h("y"), h("x"), h("z"));
        assert_ne!(a.file_stem(), b.file_stem());
    }

    #[test]
    fn file_stem_is_full_hex() {
        let key = CacheKey::new(h("a"), h("b"), h("c"));
        assert_eq!(key.file_stem().len(), 32);
        assert_eq!(key.to_string().len(), 16);
    }
}
