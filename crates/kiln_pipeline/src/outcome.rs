//! What a build produced.

use std::time::Duration;

use kiln_cache::ChangeSet;
use kiln_common::BuildMode;
use kiln_diagnostics::{Diagnostic, Severity};
use kiln_emit::{EmitReport, Manifest};
use kiln_graph::ModuleGraph;
use kiln_source::SourceDb;

/// Counters for one build.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BuildStats {
    /// Modules in the graph.
    pub modules: usize,
    /// Chains actually run.
    pub executed: usize,
    /// Modules served from the cache.
    pub cache_hits: usize,
    /// Modules that failed.
    pub failed: usize,
    /// Modules never started.
    pub skipped: usize,
    /// Files created or replaced.
    pub written: usize,
    /// Files left untouched because their bytes matched.
    pub unchanged: usize,
    /// Stale files deleted.
    pub removed: usize,
    /// Wall-clock time of the build.
    pub elapsed: Duration,
}

/// The result of [`build`](crate::build).
///
/// A build with module errors still carries the manifest of what did build.
pub struct BuildOutcome {
    /// The mode the build ran in.
    pub mode: BuildMode,
    /// Source to output mapping; empty if nothing was emitted.
    pub manifest: Manifest,
    /// Every error and warning, in pipeline order.
    pub diagnostics: Vec<Diagnostic>,
    /// Counters.
    pub stats: BuildStats,
    /// The emit report, if emission ran.
    pub report: Option<EmitReport>,
    /// Sources changed since the previous build, when the cache tracks them.
    pub changes: Option<ChangeSet>,
    /// Whether the build was cancelled before emission.
    pub cancelled: bool,
    pub(crate) graph: Option<ModuleGraph>,
    pub(crate) failed_sources: SourceDb,
}

impl BuildOutcome {
    pub(crate) fn new(mode: BuildMode) -> Self {
        Self {
            mode,
            manifest: Manifest::new(),
            diagnostics: Vec::new(),
            stats: BuildStats::default(),
            report: None,
            changes: None,
            cancelled: false,
            graph: None,
            failed_sources: SourceDb::new(),
        }
    }

    /// `0` when the build succeeded without errors, `1` otherwise.
    pub fn exit_code(&self) -> i32 {
        if self.cancelled || self.error_count() > 0 {
            1
        } else {
            0
        }
    }

    /// Returns `true` if the build succeeded without errors.
    pub fn is_success(&self) -> bool {
        self.exit_code() == 0
    }

    /// Number of error diagnostics.
    pub fn error_count(&self) -> usize {
        self.count(Severity::Error)
    }

    /// Number of warning diagnostics.
    pub fn warning_count(&self) -> usize {
        self.count(Severity::Warning)
    }

    /// The module graph, if the build got past graph construction.
    pub fn graph(&self) -> Option<&ModuleGraph> {
        self.graph.as_ref()
    }

    /// Sources for rendering the diagnostics.
    pub fn sources(&self) -> &SourceDb {
        match &self.graph {
            Some(graph) => graph.sources(),
            None => &self.failed_sources,
        }
    }

    fn count(&self, severity: Severity) -> usize {
        self.diagnostics
            .iter()
            .filter(|d| d.severity == severity)
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kiln_diagnostics::codes;

    #[test]
    fn exit_code_follows_errors() {
        let mut outcome = BuildOutcome::new(BuildMode::Production);
        assert_eq!(outcome.exit_code(), 0);

        outcome
            .diagnostics
            .push(Diagnostic::warning(codes::CACHE_CORRUPTION, "corrupt"));
        assert_eq!(outcome.exit_code(), 0);
        assert_eq!(outcome.warning_count(), 1);

        outcome
            .diagnostics
            .push(Diagnostic::error(codes::UNSUPPORTED_ASSET_TYPE, "unsupported"));
        assert_eq!(outcome.exit_code(), 1);
        assert!(!outcome.is_success());
    }

    #[test]
    fn cancelled_build_fails() {
        let mut outcome = BuildOutcome::new(BuildMode::Development);
        outcome.cancelled = true;
        assert_eq!(outcome.exit_code(), 1);
    }
}
