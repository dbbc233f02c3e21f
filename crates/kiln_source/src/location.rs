//! Human-readable source locations.

use std::fmt;
use std::path::PathBuf;

/// A span resolved to 1-indexed line/column coordinates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Location {
    /// Display path of the source.
    pub path: PathBuf,
    /// Line of the first byte.
    pub line: u32,
    /// Column of the first byte.
    pub column: u32,
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.path.display(), self.line, self.column)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_format() {
        let loc = Location {
            path: PathBuf::from("src/css/main.scss"),
            line: 4,
            column: 17,
        };
        assert_eq!(loc.to_string(), "src/css/main.scss:4:17");
    }
}
