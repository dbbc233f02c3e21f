//! Errors raised while building the module graph.

use kiln_source::Span;
use std::path::PathBuf;

/// Graph-scoped failures. Any of these aborts the build before scheduling.
#[derive(Debug, thiserror::Error)]
pub enum GraphError {
    /// A specifier matched no file under any resolution root.
    #[error("cannot resolve '{specifier}' from {}", from.display())]
    UnresolvedReference {
        /// The specifier as written.
        specifier: String,
        /// The referring module, or the project root for entries.
        from: PathBuf,
        /// Location of the specifier text, or [`Span::NONE`] for entries.
        span: Span,
    },

    /// The dependency relation contains a cycle.
    #[error("cyclic dependency: {}", format_cycle(cycle))]
    CyclicDependency {
        /// The cycle, starting and ending with the same module.
        cycle: Vec<PathBuf>,
    },

    /// A module could not be read.
    #[error("cannot read {}: {source}", path.display())]
    Io {
        /// The module path.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },
}

fn format_cycle(cycle: &[PathBuf]) -> String {
    cycle
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(" -> ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_cycle() {
        let err = GraphError::CyclicDependency {
            cycle: vec!["a.js".into(), "b.js".into(), "a.js".into()],
        };
        assert_eq!(err.to_string(), "cyclic dependency: a.js -> b.js -> a.js");
    }

    #[test]
    fn display_unresolved() {
        let err = GraphError::UnresolvedReference {
            specifier: "./missing".to_string(),
            from: "src/index.js".into(),
            span: Span::NONE,
        };
        assert_eq!(err.to_string(), "cannot resolve './missing' from src/index.js");
    }
}
