//! The source-to-output manifest.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::EmitError;

/// Maps each successfully built source module (project-relative path) to
/// the output file that carries it.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Manifest {
    entries: BTreeMap<String, String>,
}

impl Manifest {
    /// Creates an empty manifest.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records that `source` was emitted into `output`.
    pub fn insert(&mut self, source: impl Into<String>, output: impl Into<String>) {
        self.entries.insert(source.into(), output.into());
    }

    /// The output carrying `source`.
    pub fn get(&self, source: &str) -> Option<&str> {
        self.entries.get(source).map(String::as_str)
    }

    /// Number of recorded sources.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if nothing was recorded.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in source order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Pretty-printed JSON with sorted keys and a trailing newline.
    pub fn to_json(&self) -> Result<String, EmitError> {
        let mut json = serde_json::to_string_pretty(self).map_err(|e| EmitError::Serialization {
            reason: e.to_string(),
        })?;
        json.push('\n');
        Ok(json)
    }

    /// Parses a manifest written by [`Manifest::to_json`].
    pub fn from_json(json: &str) -> Result<Self, EmitError> {
        serde_json::from_str(json).map_err(|e| EmitError::Serialization {
            reason: e.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_is_sorted_by_source() {
        let mut m = Manifest::new();
        m.insert("src/js/index.js", "index.3f2a91c0.js");
        m.insert("src/assets/images/logo.png", "images/logo.5e1b2c3d.png");
        let json = m.to_json().unwrap();
        let logo = json.find("src/assets").unwrap();
        let index = json.find("src/js").unwrap();
        assert!(logo < index);
        assert!(json.ends_with("}\n"));
        assert_eq!(Manifest::from_json(&json).unwrap(), m);
    }

    #[test]
    fn lookup() {
        let mut m = Manifest::new();
        assert!(m.is_empty());
        m.insert("a.css", "main.css");
        assert_eq!(m.get("a.css"), Some("main.css"));
        assert_eq!(m.get("b.css"), None);
        assert_eq!(m.iter().count(), 1);
    }
}
