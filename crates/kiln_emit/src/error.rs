//! Errors raised while writing build output.

use std::path::PathBuf;

/// Errors that can occur while emitting output.
#[derive(Debug, thiserror::Error)]
pub enum EmitError {
    /// Reading or writing under the output root failed.
    #[error("cannot write output {path}: {source}")]
    Io {
        /// The path involved.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// A filename template could not be parsed.
    #[error("invalid filename template '{template}': {reason}")]
    Template {
        /// The template text.
        template: String,
        /// Why it was rejected.
        reason: String,
    },

    /// Two different outputs were given the same file name.
    #[error("'{path}' would be written by both {first} and {second}")]
    Collision {
        /// The emitted path.
        path: String,
        /// What claimed it first.
        first: String,
        /// What claimed it second.
        second: String,
    },

    /// The output root would contain the project sources.
    #[error("refusing to clear output root {path}: it contains the project")]
    UnsafeOutputRoot {
        /// The configured output root.
        path: PathBuf,
    },

    /// The manifest could not be serialized.
    #[error("serialization error: {reason}")]
    Serialization {
        /// Description of the failure.
        reason: String,
    },
}
