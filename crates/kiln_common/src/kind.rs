//! Closed sets of asset kinds and transform kinds.
//!
//! Both are plain enums resolved when the configuration is loaded, so an
//! unknown transform name fails at load time rather than mid-build.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The detected type of a source module.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssetKind {
    /// JavaScript source (`.js`, `.mjs`).
    Script,
    /// Stylesheet source (`.css`, `.scss`).
    Style,
    /// HTML markup (`.html`, `.htm`).
    Markup,
    /// Raster or vector image.
    Image,
    /// Web font.
    Font,
    /// JSON data (`.json`), emitted as-is and referenced by URL.
    Data,
}

impl AssetKind {
    /// All asset kinds, in declaration order.
    pub const ALL: [AssetKind; 6] = [
        AssetKind::Script,
        AssetKind::Style,
        AssetKind::Markup,
        AssetKind::Image,
        AssetKind::Font,
        AssetKind::Data,
    ];

    /// Maps a file extension (without the dot, any case) to an asset kind.
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "js" | "mjs" => Some(AssetKind::Script),
            "css" | "scss" => Some(AssetKind::Style),
            "html" | "htm" => Some(AssetKind::Markup),
            "png" | "jpg" | "jpeg" | "gif" | "svg" | "webp" | "ico" => Some(AssetKind::Image),
            "woff" | "woff2" | "eot" | "ttf" | "otf" => Some(AssetKind::Font),
            "json" => Some(AssetKind::Data),
            _ => None,
        }
    }

    /// Returns `true` for kinds whose text content may hold references.
    pub fn is_text(self) -> bool {
        matches!(
            self,
            AssetKind::Script | AssetKind::Style | AssetKind::Markup
        )
    }

    /// Returns `true` for kinds emitted as individual files rather than merged
    /// into chunks.
    pub fn is_standalone(self) -> bool {
        matches!(
            self,
            AssetKind::Markup | AssetKind::Image | AssetKind::Font | AssetKind::Data
        )
    }

    /// The lowercase name used in configuration and diagnostics.
    pub fn name(self) -> &'static str {
        match self {
            AssetKind::Script => "script",
            AssetKind::Style => "style",
            AssetKind::Markup => "markup",
            AssetKind::Image => "image",
            AssetKind::Font => "font",
            AssetKind::Data => "data",
        }
    }
}

impl fmt::Display for AssetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Error returned when a kind name does not match any known kind.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {what} '{name}'")]
pub struct ParseKindError {
    /// Which enumeration was being parsed.
    pub what: &'static str,
    /// The rejected name.
    pub name: String,
}

impl FromStr for AssetKind {
    type Err = ParseKindError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        AssetKind::ALL
            .into_iter()
            .find(|k| k.name() == s)
            .ok_or_else(|| ParseKindError {
                what: "asset kind",
                name: s.to_string(),
            })
    }
}

/// A known transform step. Each variant maps to one pure function in
/// `kiln_transform`.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TransformKind {
    /// Rewrites block-scoped declarations to function-scoped ones.
    Downlevel,
    /// Strips comments and redundant whitespace from scripts.
    MinifyScript,
    /// Expands stylesheet variables and strips line comments.
    Preprocess,
    /// Adds vendor-prefixed copies of selected declarations.
    VendorPrefix,
    /// Strips comments and whitespace from stylesheets.
    MinifyStyle,
    /// Strips comments and inter-tag whitespace from markup.
    MinifyMarkup,
    /// Removes metadata from images.
    OptimizeImage,
}

impl TransformKind {
    /// All transform kinds, in declaration order.
    pub const ALL: [TransformKind; 7] = [
        TransformKind::Downlevel,
        TransformKind::MinifyScript,
        TransformKind::Preprocess,
        TransformKind::VendorPrefix,
        TransformKind::MinifyStyle,
        TransformKind::MinifyMarkup,
        TransformKind::OptimizeImage,
    ];

    /// The kebab-case name used in configuration.
    pub fn name(self) -> &'static str {
        match self {
            TransformKind::Downlevel => "downlevel",
            TransformKind::MinifyScript => "minify-script",
            TransformKind::Preprocess => "preprocess",
            TransformKind::VendorPrefix => "vendor-prefix",
            TransformKind::MinifyStyle => "minify-style",
            TransformKind::MinifyMarkup => "minify-markup",
            TransformKind::OptimizeImage => "optimize-image",
        }
    }

    /// The asset kind this transform accepts as input.
    pub fn input_kind(self) -> AssetKind {
        match self {
            TransformKind::Downlevel | TransformKind::MinifyScript => AssetKind::Script,
            TransformKind::Preprocess | TransformKind::VendorPrefix | TransformKind::MinifyStyle => {
                AssetKind::Style
            }
            TransformKind::MinifyMarkup => AssetKind::Markup,
            TransformKind::OptimizeImage => AssetKind::Image,
        }
    }
}

impl fmt::Display for TransformKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for TransformKind {
    type Err = ParseKindError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TransformKind::ALL
            .into_iter()
            .find(|k| k.name() == s)
            .ok_or_else(|| ParseKindError {
                what: "transform",
                name: s.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extension_mapping() {
        assert_eq!(AssetKind::from_extension("js"), Some(AssetKind::Script));
        assert_eq!(AssetKind::from_extension("SCSS"), Some(AssetKind::Style));
        assert_eq!(AssetKind::from_extension("html"), Some(AssetKind::Markup));
        assert_eq!(AssetKind::from_extension("jpeg"), Some(AssetKind::Image));
        assert_eq!(AssetKind::from_extension("woff2"), Some(AssetKind::Font));
        assert_eq!(AssetKind::from_extension("ico"), Some(AssetKind::Image));
        assert_eq!(AssetKind::from_extension("json"), Some(AssetKind::Data));
        assert_eq!(AssetKind::from_extension("txt"), None);
    }

    #[test]
    fn standalone_kinds() {
        assert!(AssetKind::Image.is_standalone());
        assert!(AssetKind::Font.is_standalone());
        assert!(AssetKind::Markup.is_standalone());
        assert!(AssetKind::Data.is_standalone());
        assert!(!AssetKind::Data.is_text());
        assert!(!AssetKind::Script.is_standalone());
        assert!(!AssetKind::Style.is_standalone());
    }

    #[test]
    fn asset_kind_from_str() {
        assert_eq!("style".parse::<AssetKind>(), Ok(AssetKind::Style));
        let err = "video".parse::<AssetKind>().unwrap_err();
        assert_eq!(err.to_string(), "unknown asset kind 'video'");
    }

    #[test]
    fn transform_names_roundtrip() {
        for kind in TransformKind::ALL {
            assert_eq!(kind.name().parse::<TransformKind>(), Ok(kind));
        }
    }

    #[test]
    fn unknown_transform_rejected() {
        let err = "uglify".parse::<TransformKind>().unwrap_err();
        assert_eq!(err.to_string(), "unknown transform 'uglify'");
    }

    #[test]
    fn serde_uses_config_names() {
        let json = serde_json::to_string(&TransformKind::VendorPrefix).unwrap();
        assert_eq!(json, "\"vendor-prefix\"");
        let kind: AssetKind = serde_json::from_str("\"font\"").unwrap();
        assert_eq!(kind, AssetKind::Font);
    }

    #[test]
    fn input_kinds() {
        assert_eq!(TransformKind::MinifyStyle.input_kind(), AssetKind::Style);
        assert_eq!(TransformKind::Downlevel.input_kind(), AssetKind::Script);
        assert_eq!(TransformKind::OptimizeImage.input_kind(), AssetKind::Image);
    }
}
