//! Build orchestration for Kiln.
//!
//! [`build`] runs one build end to end: graph, transforms, emission, cache
//! upkeep. Every failure along the way is turned into a
//! [`Diagnostic`](kiln_diagnostics::Diagnostic) on the returned
//! [`BuildOutcome`]. [`WatchSession`] repeats builds on file changes and
//! tells a [`ReloadNotifier`] what changed.

#![warn(missing_docs)]

pub mod build;
pub mod outcome;
pub mod reload;
pub mod report;
pub mod request;
pub mod watch;

pub use build::{build, build_with_cache};
pub use outcome::{BuildOutcome, BuildStats};
pub use reload::{LogNotifier, ReloadEvent, ReloadNotifier};
pub use request::BuildRequest;
pub use watch::{WatchError, WatchSession};
