//! The transform scheduler.
//!
//! [`Scheduler::run`] walks a [`ModuleGraph`](kiln_graph::ModuleGraph) with
//! a topological readiness queue over asset edges and runs each module's
//! transform chain on a bounded pool of worker threads, consulting the
//! incremental cache first. Module failures are collected, never fatal.

#![warn(missing_docs)]

pub mod cancel;
pub mod error;
pub mod identity;
pub mod results;
pub mod rewrite;
pub mod scheduler;

pub use cancel::CancelToken;
pub use error::{CacheOp, CacheWarning, ModuleError};
pub use identity::IdentityAssigner;
pub use results::{ScheduleStats, TransformOutput, TransformResults};
pub use rewrite::{chunk_placeholder, find_placeholders, rewrite_input, PlaceholderMatch};
pub use scheduler::Scheduler;
