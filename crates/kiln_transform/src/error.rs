//! Error types for transform steps and chain construction.

use kiln_common::TransformKind;

/// A failure inside one transform step. Steps are pure, so the same input
/// always fails the same way.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StepError {
    /// A text transform received bytes that are not UTF-8.
    #[error("input is not valid UTF-8 (first invalid byte at offset {offset})")]
    InvalidUtf8 {
        /// Offset of the first invalid byte.
        offset: usize,
    },

    /// A stylesheet used a variable before defining it.
    #[error("undefined variable '${name}'")]
    UndefinedVariable {
        /// Variable name without the `$`.
        name: String,
    },

    /// Binary image data did not have the expected structure.
    #[error("malformed {format} data: {reason}")]
    MalformedImage {
        /// Image format name.
        format: &'static str,
        /// What was wrong.
        reason: String,
    },
}

/// Errors raised while building transform chains from configuration.
#[derive(Debug, thiserror::Error)]
pub enum TransformError {
    /// An option table did not match the transform's options.
    #[error("invalid options for transform '{transform}': {message}")]
    InvalidOptions {
        /// The transform whose options were rejected.
        transform: TransformKind,
        /// The deserializer's message.
        message: String,
    },
}

/// A step failure tagged with the step that raised it.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("transform '{step}' failed: {error}")]
pub struct StepFailure {
    /// The failing step.
    pub step: TransformKind,
    /// What went wrong.
    #[source]
    pub error: StepError,
}

/// Borrows `input` as UTF-8 text.
pub(crate) fn as_text(input: &[u8]) -> Result<&str, StepError> {
    std::str::from_utf8(input).map_err(|e| StepError::InvalidUtf8 {
        offset: e.valid_up_to(),
    })
}
