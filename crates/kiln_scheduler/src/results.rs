//! What a scheduler run produced.

use std::sync::Arc;

use kiln_cache::CacheEntry;
use kiln_graph::ModuleId;

use crate::error::{CacheWarning, ModuleError};

/// The transformed output of one module.
#[derive(Clone, Debug)]
pub struct TransformOutput {
    /// The module.
    pub module: ModuleId,
    /// Output bytes and metadata.
    pub entry: Arc<CacheEntry>,
    /// Emitted path of a standalone module; `None` for chunk members.
    pub emitted: Option<String>,
    /// Whether the output came from the cache.
    pub cached: bool,
}

/// Counters for one run.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ScheduleStats {
    /// Chains actually executed.
    pub executed: usize,
    /// Outputs served from the cache.
    pub cache_hits: usize,
    /// Modules that failed, including prerequisite failures.
    pub failed: usize,
    /// Modules never finished because the run was cancelled.
    pub skipped: usize,
}

/// Outputs, failures and warnings of one scheduler run.
#[derive(Debug, Default)]
pub struct TransformResults {
    pub(crate) outputs: Vec<Option<TransformOutput>>,
    /// Module-scoped failures in completion order.
    pub errors: Vec<ModuleError>,
    /// Cache problems that were recovered from.
    pub cache_warnings: Vec<CacheWarning>,
    /// Counters.
    pub stats: ScheduleStats,
    /// Whether the run was cancelled before every module finished.
    pub cancelled: bool,
}

impl TransformResults {
    pub(crate) fn with_capacity(modules: usize) -> Self {
        Self {
            outputs: vec![None; modules],
            ..Self::default()
        }
    }

    /// The output of `id`, if it was transformed.
    pub fn output(&self, id: ModuleId) -> Option<&TransformOutput> {
        self.outputs.get(id.index()).and_then(Option::as_ref)
    }

    /// All successful outputs in module id order.
    pub fn outputs(&self) -> impl Iterator<Item = &TransformOutput> {
        self.outputs.iter().flatten()
    }

    /// Number of successful outputs.
    pub fn success_count(&self) -> usize {
        self.outputs().count()
    }

    /// Returns `true` if every module was transformed.
    pub fn is_complete(&self) -> bool {
        !self.cancelled && self.errors.is_empty()
    }

    /// Sorts errors and cache warnings by module id, for stable reports.
    pub fn sort_errors(&mut self) {
        self.errors.sort_by_key(ModuleError::module);
        self.cache_warnings.sort_by_key(|w| w.module);
    }
}
