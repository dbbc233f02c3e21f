//! Conversion of stage errors into diagnostics.

use kiln_cache::CacheError;
use kiln_common::InternalError;
use kiln_diagnostics::{codes, Diagnostic, Label};
use kiln_emit::EmitError;
use kiln_graph::GraphError;
use kiln_scheduler::{CacheOp, CacheWarning, ModuleError};
use kiln_source::SourceDb;
use kiln_transform::TransformError;

/// A graph-scoped failure. `sources` resolves paths and spans.
pub fn graph_error(error: &GraphError, sources: &SourceDb) -> Diagnostic {
    match error {
        GraphError::UnresolvedReference {
            specifier,
            from,
            span,
        } => {
            let diag = Diagnostic::error(
                codes::UNRESOLVED_REFERENCE,
                format!("cannot resolve '{specifier}'"),
            );
            if span.is_none() {
                diag.with_note("the entry point does not exist")
            } else {
                diag.with_module(sources.display_path(from).display().to_string())
                    .with_span(*span)
                    .with_label(Label::primary(*span, "not found"))
                    .with_note("searched relative, alias and package roots")
            }
        }
        GraphError::CyclicDependency { cycle } => {
            let path: Vec<String> = cycle
                .iter()
                .map(|p| sources.display_path(p).display().to_string())
                .collect();
            let mut diag = Diagnostic::error(
                codes::CYCLIC_DEPENDENCY,
                format!("cyclic dependency: {}", path.join(" -> ")),
            );
            if let Some(first) = path.first() {
                diag = diag.with_module(first.clone());
            }
            diag.with_help("break the cycle by moving shared code into a separate module")
        }
        GraphError::Io { path, source } => Diagnostic::error(
            codes::UNREADABLE_SOURCE,
            format!("cannot read {}: {source}", sources.display_path(path).display()),
        ),
    }
}

/// A module-scoped failure.
pub fn module_error(error: &ModuleError) -> Diagnostic {
    let diag = match error {
        ModuleError::UnsupportedAssetType { .. } => {
            Diagnostic::error(codes::UNSUPPORTED_ASSET_TYPE, "unsupported asset type")
                .with_help("give the file a known extension or stop referencing it")
        }
        ModuleError::TransformStep { .. } => {
            Diagnostic::error(codes::TRANSFORM_STEP_FAILED, error.to_string())
        }
        ModuleError::PrerequisiteFailed {
            prerequisite_path, ..
        } => Diagnostic::error(codes::PREREQUISITE_FAILED, error.to_string())
            .with_note(format!("{prerequisite_path} must build first")),
    };
    diag.with_module(error.path())
}

/// A cache problem met while transforming `path`.
pub fn cache_warning(warning: &CacheWarning, path: &str) -> Diagnostic {
    match warning.op {
        CacheOp::Lookup => Diagnostic::warning(
            codes::CACHE_CORRUPTION,
            format!("ignored cache entry: {}", warning.error),
        )
        .with_module(path)
        .with_note("the module was transformed again"),
        CacheOp::Store => Diagnostic::warning(
            codes::CACHE_PERSIST_FAILED,
            format!("could not cache result: {}", warning.error),
        )
        .with_module(path),
    }
}

/// A cache-wide problem found when opening or saving the cache.
pub fn cache_error(error: &CacheError) -> Diagnostic {
    let diag = if error.is_corruption() {
        Diagnostic::warning(
            codes::CACHE_CORRUPTION,
            format!("cache index ignored: {error}"),
        )
        .with_note("every module is transformed again")
    } else {
        Diagnostic::warning(
            codes::CACHE_PERSIST_FAILED,
            format!("cache not saved: {error}"),
        )
    };
    diag.with_help("run `kiln clean --cache` if this persists")
}

/// An output that could not be written.
pub fn emit_error(error: &EmitError) -> Diagnostic {
    let diag = Diagnostic::error(codes::EMIT_FAILED, error.to_string());
    match error {
        EmitError::Collision { .. } => {
            diag.with_help("add [hash] or [path] to the asset filename template")
        }
        EmitError::UnsafeOutputRoot { .. } => {
            diag.with_help("point [output].dir at a directory inside the project")
        }
        _ => diag,
    }
}

/// Chain options rejected when the chains were built.
pub fn transform_error(error: &TransformError) -> Diagnostic {
    Diagnostic::error(codes::INVALID_CONFIG, error.to_string())
}

/// A broken invariant inside Kiln.
pub fn internal_error(error: &InternalError) -> Diagnostic {
    Diagnostic::error(codes::INTERNAL_ERROR, error.to_string())
        .with_note("this is a bug in kiln")
}

#[cfg(test)]
mod tests {
    use super::*;
    use kiln_common::TransformKind;
    use kiln_diagnostics::Severity;
    use kiln_graph::ModuleId;
    use kiln_source::Span;
    use kiln_transform::StepError;
    use std::path::PathBuf;

    #[test]
    fn unresolved_reference_points_at_specifier() {
        let mut db = SourceDb::with_root("/p");
        let file = db.add_source("/p/src/index.js", "import x from './missing';\n".into());
        let span = Span::new(file, 15, 24);
        let diag = graph_error(
            &GraphError::UnresolvedReference {
                specifier: "./missing".into(),
                from: PathBuf::from("/p/src/index.js"),
                span,
            },
            &db,
        );
        assert_eq!(diag.code, codes::UNRESOLVED_REFERENCE);
        assert_eq!(diag.module.as_deref(), Some("src/index.js"));
        assert_eq!(diag.primary_span, span);
    }

    #[test]
    fn cycle_uses_display_paths() {
        let db = SourceDb::with_root("/p");
        let diag = graph_error(
            &GraphError::CyclicDependency {
                cycle: vec!["/p/a.js".into(), "/p/b.js".into(), "/p/a.js".into()],
            },
            &db,
        );
        assert_eq!(diag.message, "cyclic dependency: a.js -> b.js -> a.js");
        assert_eq!(diag.code.to_string(), "E102");
    }

    #[test]
    fn module_errors_carry_codes() {
        let step = ModuleError::TransformStep {
            module: ModuleId::from_raw(2),
            path: "src/bad.css".into(),
            step: TransformKind::MinifyStyle,
            cause: StepError::InvalidUtf8 { offset: 3 },
        };
        let diag = module_error(&step);
        assert_eq!(diag.code, codes::TRANSFORM_STEP_FAILED);
        assert_eq!(diag.module.as_deref(), Some("src/bad.css"));

        let unsupported = ModuleError::UnsupportedAssetType {
            module: ModuleId::from_raw(1),
            path: "notes.txt".into(),
        };
        assert_eq!(module_error(&unsupported).code.to_string(), "E201");
    }

    #[test]
    fn cache_problems_are_warnings() {
        let warning = CacheWarning {
            module: ModuleId::from_raw(0),
            op: CacheOp::Lookup,
            error: CacheError::Serialization {
                reason: "bad".into(),
            },
        };
        let diag = cache_warning(&warning, "a.js");
        assert_eq!(diag.severity, Severity::Warning);
        assert_eq!(diag.code, codes::CACHE_CORRUPTION);

        let io = CacheError::Io {
            path: PathBuf::from(".kiln-cache/index.json"),
            source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        };
        assert_eq!(cache_error(&io).code, codes::CACHE_PERSIST_FAILED);
    }

    #[test]
    fn emit_errors_are_e301() {
        let diag = emit_error(&EmitError::UnsafeOutputRoot {
            path: PathBuf::from("/p"),
        });
        assert_eq!(diag.code.to_string(), "E301");
        assert_eq!(diag.help.len(), 1);
    }
}
