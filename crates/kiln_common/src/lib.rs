//! Shared foundational types used across the Kiln asset pipeline.
//!
//! This crate provides content fingerprints, the closed sets of asset and
//! transform kinds, the build mode, and the internal error type.

#![warn(missing_docs)]

pub mod hash;
pub mod kind;
pub mod mode;
pub mod result;

pub use hash::{ContentHash, ContentHasher};
pub use kind::{AssetKind, ParseKindError, TransformKind};
pub use mode::BuildMode;
pub use result::{InternalError, KilnResult};

/// Version of the Kiln toolchain, folded into every cache key.
pub const KILN_VERSION: &str = env!("CARGO_PKG_VERSION");
