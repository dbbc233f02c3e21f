//! The output emitter.
//!
//! Names transformed modules, groups scripts and styles into chunks, writes
//! everything to the output root and records where each source module ended
//! up in a manifest.

#![warn(missing_docs)]

pub mod chunk;
pub mod emitter;
pub mod error;
pub mod manifest;
pub mod naming;
pub mod output;

pub use chunk::{plan_chunks, Chunk, ChunkKind, ChunkPlan};
pub use emitter::{EmitOptions, EmitReport, EmittedChunk, Emitter};
pub use error::EmitError;
pub use manifest::Manifest;
pub use naming::Namer;
pub use output::{OutputRoot, WriteOutcome};
