//! Incremental cache for transform results.
//!
//! Transformed outputs are keyed by the fingerprint of the rewritten module
//! input, the identity of the transform chain, and the tool version. Entries
//! live in memory for the duration of a build and persist on disk between
//! builds as content-addressed files with a validated header.

#![warn(missing_docs)]

pub mod cache;
pub mod entry;
pub mod error;
pub mod hasher;
pub mod index;
pub mod key;
pub mod store;

pub use cache::{Cache, StoreOutcome};
pub use entry::CacheEntry;
pub use error::CacheError;
pub use hasher::{ChangeSet, SourceHasher};
pub use index::CacheIndex;
pub use key::CacheKey;
pub use store::EntryStore;
