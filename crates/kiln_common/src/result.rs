//! Common result and error types for the Kiln pipeline.

/// The standard result type for fallible internal operations.
///
/// `Err` indicates a broken invariant inside Kiln, not a problem with the
/// user's project. Project problems are reported through diagnostics.
pub type KilnResult<T> = Result<T, InternalError>;

/// An internal error indicating a bug in Kiln, not a user input problem.
#[derive(Debug, thiserror::Error)]
#[error("internal error: {message}")]
pub struct InternalError {
    /// Description of the internal error.
    pub message: String,
}

impl InternalError {
    /// Creates a new internal error with the given message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl From<String> for InternalError {
    fn from(message: String) -> Self {
        Self { message }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_format() {
        let err = InternalError::new("scheduler lost a module");
        assert_eq!(format!("{err}"), "internal error: scheduler lost a module");
    }

    #[test]
    fn from_string() {
        let err: InternalError = "worker channel closed".to_string().into();
        assert_eq!(err.message, "worker channel closed");
    }
}
