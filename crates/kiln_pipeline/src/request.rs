//! What to build.

use std::path::PathBuf;

use kiln_common::BuildMode;
use kiln_config::ProjectConfig;

/// Everything one build needs. Fields default from the configuration and
/// can be overridden by command-line flags.
#[derive(Debug, Clone)]
pub struct BuildRequest {
    /// Project root; relative paths in the configuration resolve against it.
    pub root: PathBuf,
    /// The loaded configuration.
    pub config: ProjectConfig,
    /// Entry points relative to the root.
    pub entries: Vec<String>,
    /// Build mode.
    pub mode: BuildMode,
    /// Output root override. `None` uses `[output].dir`.
    pub out_dir: Option<PathBuf>,
    /// Whether to read and write the incremental cache.
    pub use_cache: bool,
    /// Position of this build in its session, for `[token]`.
    pub build_number: u64,
    /// Reconcile the output root instead of clearing it.
    pub incremental: bool,
}

impl BuildRequest {
    /// A request for the project at `root` using `config` as written.
    pub fn new(root: impl Into<PathBuf>, config: ProjectConfig) -> Self {
        Self {
            root: root.into(),
            entries: config.project.entries.clone(),
            mode: config.project.mode,
            out_dir: None,
            use_cache: config.cache.enabled,
            build_number: 1,
            incremental: false,
            config,
        }
    }

    /// Overrides the build mode.
    pub fn with_mode(mut self, mode: BuildMode) -> Self {
        self.mode = mode;
        self
    }

    /// Replaces the entry points, unless `entries` is empty.
    pub fn with_entries(mut self, entries: Vec<String>) -> Self {
        if !entries.is_empty() {
            self.entries = entries;
        }
        self
    }

    /// Overrides the output root.
    pub fn with_out_dir(mut self, dir: Option<PathBuf>) -> Self {
        if dir.is_some() {
            self.out_dir = dir;
        }
        self
    }

    /// Disables the incremental cache.
    pub fn without_cache(mut self) -> Self {
        self.use_cache = false;
        self
    }

    /// The output root as an absolute path.
    pub fn output_dir(&self) -> PathBuf {
        let dir = self.out_dir.as_ref().unwrap_or(&self.config.output.dir);
        self.root.join(dir)
    }

    /// The cache directory as an absolute path.
    pub fn cache_dir(&self) -> PathBuf {
        self.root.join(&self.config.cache.dir)
    }
}
