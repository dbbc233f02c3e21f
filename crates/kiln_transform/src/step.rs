//! The transform step abstraction and its factory.

use crate::error::{StepError, TransformError};
use crate::steps::{image, markup, script, style};
use kiln_common::TransformKind;
use serde::de::DeserializeOwned;
use serde::Serialize;

/// A pure content transform: the same input bytes and options always give
/// the same output.
pub trait Transform: Send + Sync {
    /// Which transform this is.
    fn kind(&self) -> TransformKind;

    /// Implementation version. Bumping it invalidates cached results.
    fn version(&self) -> u32;

    /// Normalised options, with defaults filled in, as stable text.
    fn options(&self) -> &str;

    /// Runs the transform.
    fn apply(&self, input: &[u8]) -> Result<Vec<u8>, StepError>;
}

/// Instantiates `kind` with its option table.
pub fn create(
    kind: TransformKind,
    options: toml::Table,
) -> Result<Box<dyn Transform>, TransformError> {
    Ok(match kind {
        TransformKind::Downlevel => Box::new(script::Downlevel::new(parse(kind, options)?)),
        TransformKind::MinifyScript => Box::new(script::MinifyScript::new(parse(kind, options)?)),
        TransformKind::Preprocess => Box::new(style::Preprocess::new(parse(kind, options)?)),
        TransformKind::VendorPrefix => Box::new(style::VendorPrefix::new(parse(kind, options)?)),
        TransformKind::MinifyStyle => Box::new(style::MinifyStyle::new(parse(kind, options)?)),
        TransformKind::MinifyMarkup => Box::new(markup::MinifyMarkup::new(parse(kind, options)?)),
        TransformKind::OptimizeImage => Box::new(image::OptimizeImage::new(parse(kind, options)?)),
    })
}

fn parse<T: DeserializeOwned>(kind: TransformKind, options: toml::Table) -> Result<T, TransformError> {
    toml::Value::Table(options)
        .try_into()
        .map_err(|e: toml::de::Error| TransformError::InvalidOptions {
            transform: kind,
            message: e.message().to_string(),
        })
}

/// Renders parsed options in a stable textual form for chain identity.
pub(crate) fn normalize<T: Serialize>(options: &T) -> String {
    toml::to_string(options).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_every_kind_with_defaults() {
        for kind in TransformKind::ALL {
            let step = create(kind, toml::Table::new()).unwrap();
            assert_eq!(step.kind(), kind);
            assert!(step.version() >= 1);
        }
    }

    #[test]
    fn unknown_option_rejected() {
        let mut table = toml::Table::new();
        table.insert("quality".into(), toml::Value::Integer(65));
        let err = create(TransformKind::OptimizeImage, table).err().unwrap();
        assert!(matches!(
            err,
            TransformError::InvalidOptions {
                transform: TransformKind::OptimizeImage,
                ..
            }
        ));
    }

    #[test]
    fn options_are_normalised() {
        let mut table = toml::Table::new();
        table.insert("strip_metadata".into(), toml::Value::Boolean(true));
        let explicit = create(TransformKind::OptimizeImage, table).unwrap();
        let default = create(TransformKind::OptimizeImage, toml::Table::new()).unwrap();
        assert_eq!(explicit.options(), default.options());
    }
}
