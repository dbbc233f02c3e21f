//! The build mode threaded through naming and chunking policy.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::kind::ParseKindError;

/// Selects between reproducible and iterative builds.
///
/// Production builds name chunks by content hash; development builds use
/// stable human-readable names plus a per-build token. A build is always
/// exactly one of the two.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BuildMode {
    /// Iterative builds with stable names and a build token.
    Development,
    /// Reproducible, content-hashed builds.
    #[default]
    Production,
}

impl BuildMode {
    /// Returns the lowercase mode name.
    pub fn name(self) -> &'static str {
        match self {
            BuildMode::Development => "development",
            BuildMode::Production => "production",
        }
    }
}

impl fmt::Display for BuildMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for BuildMode {
    type Err = ParseKindError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "development" | "dev" => Ok(BuildMode::Development),
            "production" | "prod" => Ok(BuildMode::Production),
            _ => Err(ParseKindError {
                what: "build mode",
                name: s.to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_production() {
        assert_eq!(BuildMode::default(), BuildMode::Production);
    }

    #[test]
    fn parse_aliases() {
        assert_eq!("dev".parse::<BuildMode>(), Ok(BuildMode::Development));
        assert_eq!("production".parse::<BuildMode>(), Ok(BuildMode::Production));
        assert!("staging".parse::<BuildMode>().is_err());
    }

    #[test]
    fn display() {
        assert_eq!(BuildMode::Development.to_string(), "development");
    }
}
