//! Module-scoped failures and cache warnings.

use kiln_cache::CacheError;
use kiln_common::TransformKind;
use kiln_graph::ModuleId;
use kiln_transform::StepError;

/// Why a module produced no output.
#[derive(Debug, thiserror::Error)]
pub enum ModuleError {
    /// The module could not be classified into an asset kind.
    #[error("unsupported asset type: {path}")]
    UnsupportedAssetType {
        /// The failed module.
        module: ModuleId,
        /// Its project-relative path.
        path: String,
    },

    /// A step of the module's chain failed.
    #[error("transform '{step}' failed on {path}: {cause}")]
    TransformStep {
        /// The failed module.
        module: ModuleId,
        /// Its project-relative path.
        path: String,
        /// The failing step.
        step: TransformKind,
        /// What the step reported.
        #[source]
        cause: StepError,
    },

    /// A module whose output URL this module embeds failed.
    #[error("{path} was not transformed because {prerequisite_path} failed")]
    PrerequisiteFailed {
        /// The module that was not run.
        module: ModuleId,
        /// Its project-relative path.
        path: String,
        /// The first failed prerequisite.
        prerequisite: ModuleId,
        /// The prerequisite's project-relative path.
        prerequisite_path: String,
    },
}

impl ModuleError {
    /// The module this error is about.
    pub fn module(&self) -> ModuleId {
        match self {
            ModuleError::UnsupportedAssetType { module, .. }
            | ModuleError::TransformStep { module, .. }
            | ModuleError::PrerequisiteFailed { module, .. } => *module,
        }
    }

    /// The project-relative path of the module.
    pub fn path(&self) -> &str {
        match self {
            ModuleError::UnsupportedAssetType { path, .. }
            | ModuleError::TransformStep { path, .. }
            | ModuleError::PrerequisiteFailed { path, .. } => path,
        }
    }
}

/// Which cache operation failed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CacheOp {
    /// Reading an entry; the module was transformed anyway.
    Lookup,
    /// Writing an entry; the result was used but not persisted.
    Store,
}

/// A cache problem encountered while transforming a module.
#[derive(Debug)]
pub struct CacheWarning {
    /// The module being transformed.
    pub module: ModuleId,
    /// The failed operation.
    pub op: CacheOp,
    /// The underlying error.
    pub error: CacheError,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_and_accessors() {
        let err = ModuleError::TransformStep {
            module: ModuleId::from_raw(3),
            path: "src/css/main.scss".to_string(),
            step: TransformKind::Preprocess,
            cause: StepError::UndefinedVariable {
                name: "accent".to_string(),
            },
        };
        assert_eq!(err.module(), ModuleId::from_raw(3));
        assert_eq!(err.path(), "src/css/main.scss");
        let msg = err.to_string();
        assert!(msg.starts_with("transform 'preprocess' failed on src/css/main.scss"));
    }

    #[test]
    fn prerequisite_display() {
        let err = ModuleError::PrerequisiteFailed {
            module: ModuleId::from_raw(1),
            path: "src/css/main.scss".to_string(),
            prerequisite: ModuleId::from_raw(2),
            prerequisite_path: "src/assets/images/logo.png".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "src/css/main.scss was not transformed because src/assets/images/logo.png failed"
        );
    }
}
