//! Text sources of a build: file ids, byte spans, and line/column lookup.
//!
//! The graph builder registers every text module (scripts, stylesheets,
//! markup) in a [`SourceDb`] so that diagnostics can point at the exact
//! specifier that failed to resolve.

#![warn(missing_docs)]

pub mod location;
pub mod source_db;
pub mod source_file;
pub mod span;

pub use location::Location;
pub use source_db::SourceDb;
pub use source_file::SourceFile;
pub use span::{FileId, Span};
