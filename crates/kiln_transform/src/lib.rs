//! Asset classification and the pure content transforms Kiln applies.
//!
//! Each [`TransformKind`](kiln_common::TransformKind) maps to one
//! [`Transform`] implementation. Chains are built once per build from the
//! project configuration and shared read-only by the scheduler's workers.

#![warn(missing_docs)]

pub mod chain;
pub mod classify;
pub mod error;
pub mod lex;
pub mod step;
pub mod steps;

pub use chain::{Chain, ChainSet};
pub use classify::{classify, sniff, ImageFormat};
pub use error::{StepError, StepFailure, TransformError};
pub use step::{create, Transform};
