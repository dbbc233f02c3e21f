//! The module graph builder.
//!
//! Starting from the configured entry points, [`GraphBuilder`] reads each
//! module, scans it for references, resolves them to files and walks the
//! result depth-first into a [`ModuleGraph`]. Cycles and unresolvable
//! specifiers abort the build before any transform runs.

#![warn(missing_docs)]

pub mod builder;
pub mod error;
pub mod graph;
pub mod module;
pub mod resolve;
pub mod scan;

pub use builder::GraphBuilder;
pub use error::GraphError;
pub use graph::ModuleGraph;
pub use module::{Module, ModuleId, Reference, ReferenceKind};
pub use resolve::{is_external, Resolver};
pub use scan::{scan, RawReference};
