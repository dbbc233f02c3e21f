//! Depth-first graph construction from entry points.

use crate::error::GraphError;
use crate::graph::ModuleGraph;
use crate::module::{Module, ModuleId, Reference, ReferenceKind};
use crate::resolve::{is_external, Resolver};
use crate::scan::scan;
use kiln_common::{AssetKind, ContentHash};
use kiln_config::ResolveConfig;
use kiln_source::{FileId, SourceDb, Span};
use kiln_transform::classify;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

/// Builds a [`ModuleGraph`] by reading, scanning and resolving modules
/// depth-first from the entries.
///
/// The builder keeps the sources it read after a failed build, so the caller
/// can render the offending specifier.
pub struct GraphBuilder {
    root: PathBuf,
    resolver: Resolver,
    sources: SourceDb,
    modules: Vec<Module>,
    index: HashMap<PathBuf, ModuleId>,
    stack: Vec<ModuleId>,
    on_stack: HashSet<ModuleId>,
}

impl GraphBuilder {
    /// Creates a builder for the project at `root`.
    pub fn new(root: &Path, config: &ResolveConfig) -> Self {
        let root = std::fs::canonicalize(root).unwrap_or_else(|_| root.to_path_buf());
        Self {
            resolver: Resolver::new(&root, config),
            sources: SourceDb::with_root(&root),
            root,
            modules: Vec::new(),
            index: HashMap::new(),
            stack: Vec::new(),
            on_stack: HashSet::new(),
        }
    }

    /// Sources read by the last build, including a failed one.
    pub fn sources(&self) -> &SourceDb {
        &self.sources
    }

    /// Takes the sources read by the last build, leaving the builder's empty.
    /// Used to render diagnostics for a build that failed.
    pub fn take_sources(&mut self) -> SourceDb {
        std::mem::take(&mut self.sources)
    }

    /// Builds the graph for `entries`, given relative to the project root.
    #[tracing::instrument(skip_all, fields(entries = entries.len()))]
    pub fn build(&mut self, entries: &[String]) -> Result<ModuleGraph, GraphError> {
        self.sources = SourceDb::with_root(&self.root);
        self.modules.clear();
        self.index.clear();
        self.stack.clear();
        self.on_stack.clear();

        let mut entry_ids = Vec::with_capacity(entries.len());
        for entry in entries {
            let path = self.resolver.resolve_entry(entry).ok_or_else(|| {
                GraphError::UnresolvedReference {
                    specifier: entry.clone(),
                    from: self.root.clone(),
                    span: Span::NONE,
                }
            })?;
            let id = self.visit(path)?;
            if !entry_ids.contains(&id) {
                entry_ids.push(id);
            }
        }

        tracing::debug!(modules = self.modules.len(), "module graph built");
        Ok(ModuleGraph::new(
            self.root.clone(),
            std::mem::take(&mut self.modules),
            entry_ids,
            std::mem::take(&mut self.sources),
        ))
    }

    fn visit(&mut self, path: PathBuf) -> Result<ModuleId, GraphError> {
        if let Some(&id) = self.index.get(&path) {
            if self.on_stack.contains(&id) {
                return Err(self.cycle_through(id, &path));
            }
            return Ok(id);
        }

        let bytes = std::fs::read(&path).map_err(|source| GraphError::Io {
            path: path.clone(),
            source,
        })?;
        let kind = classify(&path, &bytes);
        let id = ModuleId::from_raw(self.modules.len() as u32);

        let text = kind
            .filter(|k| k.is_text())
            .and_then(|_| std::str::from_utf8(&bytes).ok())
            .map(str::to_owned);
        let raw_refs = match (kind, &text) {
            (Some(k), Some(t)) => scan(k, t),
            _ => Vec::new(),
        };
        let source = text.map(|t| self.sources.add_source(path.clone(), t));

        tracing::debug!(module = %path.display(), kind = ?kind, references = raw_refs.len(), "discovered module");
        self.modules.push(Module {
            id,
            rel_path: relative_path(&self.root, &path),
            path: path.clone(),
            kind,
            fingerprint: ContentHash::from_bytes(&bytes),
            bytes,
            source,
            references: Vec::new(),
        });
        self.index.insert(path.clone(), id);
        self.stack.push(id);
        self.on_stack.insert(id);

        let bare_is_relative = matches!(kind, Some(AssetKind::Style | AssetKind::Markup));
        let mut references = Vec::with_capacity(raw_refs.len());
        for raw in raw_refs {
            if is_external(&raw.specifier) {
                continue;
            }
            let span = Span::new(
                source.unwrap_or(FileId::NONE),
                raw.start as u32,
                raw.end as u32,
            );
            let target_path = self
                .resolver
                .resolve(&raw.specifier, &path, bare_is_relative)
                .ok_or_else(|| GraphError::UnresolvedReference {
                    specifier: raw.specifier.clone(),
                    from: path.clone(),
                    span,
                })?;
            let target = self.visit(target_path)?;
            references.push(Reference {
                specifier: raw.specifier,
                span,
                kind: ReferenceKind::for_target(self.modules[target.index()].kind),
                target,
            });
        }

        self.modules[id.index()].references = references;
        self.stack.pop();
        self.on_stack.remove(&id);
        Ok(id)
    }

    /// Builds the cycle from the first visit of `id` on the stack back to it.
    fn cycle_through(&self, id: ModuleId, path: &Path) -> GraphError {
        let start = self.stack.iter().position(|s| *s == id).unwrap_or(0);
        let mut cycle: Vec<PathBuf> = self.stack[start..]
            .iter()
            .map(|s| self.modules[s.index()].path.clone())
            .collect();
        cycle.push(path.to_path_buf());
        GraphError::CyclicDependency { cycle }
    }
}

/// Formats `path` relative to `root` with `/` separators.
fn relative_path(root: &Path, path: &Path) -> String {
    match path.strip_prefix(root) {
        Ok(rel) => rel
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/"),
        Err(_) => path.display().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn write(root: &Path, rel: &str, content: &[u8]) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    fn builder(root: &Path) -> GraphBuilder {
        GraphBuilder::new(root, &ResolveConfig::default())
    }

    fn rel_paths(graph: &ModuleGraph, ids: &[ModuleId]) -> Vec<String> {
        ids.iter().map(|id| graph.module(*id).rel_path.clone()).collect()
    }

    #[test]
    fn discovers_modules_depth_first() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        write(root, "src/js/index.js", b"import './a';\nimport '../css/main.css';\nimport './b';\n");
        write(root, "src/js/a.js", b"import './c';\n");
        write(root, "src/js/b.js", b"import './c';\n");
        write(root, "src/js/c.js", b"export const c = 1;\n");
        write(root, "src/css/main.css", b"body { background: url(images/bg.png); }\n");
        write(root, "src/assets/images/bg.png", b"\x89PNG\r\n\x1a\n");

        let graph = builder(root).build(&["src/js/index.js".to_string()]).unwrap();
        let all: Vec<_> = graph.modules().iter().map(|m| m.id).collect();
        assert_eq!(
            rel_paths(&graph, &all),
            vec![
                "src/js/index.js",
                "src/js/a.js",
                "src/js/c.js",
                "src/css/main.css",
                "src/assets/images/bg.png",
                "src/js/b.js",
            ]
        );
        assert_eq!(graph.entries(), &[ModuleId::from_raw(0)]);

        let css = graph.module(ModuleId::from_raw(3));
        assert_eq!(css.kind, Some(AssetKind::Style));
        assert_eq!(css.references[0].kind, ReferenceKind::Asset);
        assert_eq!(css.references[0].specifier, "images/bg.png");
        assert_eq!(graph.prerequisites(css.id), vec![ModuleId::from_raw(4)]);

        let c = ModuleId::from_raw(2);
        assert_eq!(
            rel_paths(&graph, &graph.dependents(c)),
            vec!["src/js/a.js", "src/js/b.js"]
        );
        assert_eq!(graph.module(ModuleId::from_raw(0)).references[0].kind, ReferenceKind::Import);
    }

    #[test]
    fn reachable_and_affected() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        write(root, "a.js", b"import './b'; import './c';");
        write(root, "b.js", b"import './d';");
        write(root, "c.js", b"");
        write(root, "d.js", b"");
        let graph = builder(root).build(&["a.js".to_string()]).unwrap();
        let a = graph.entries()[0];
        assert_eq!(rel_paths(&graph, &graph.reachable(a)), vec!["a.js", "b.js", "d.js", "c.js"]);
        let d = graph.find(&fs::canonicalize(root.join("d.js")).unwrap()).unwrap();
        assert_eq!(rel_paths(&graph, &graph.affected_by(&[d])), vec!["a.js", "b.js", "d.js"]);
        let order = graph.build_order().unwrap();
        let pos = |name: &str| order.iter().position(|id| graph.module(*id).rel_path == name).unwrap();
        assert!(pos("d.js") < pos("b.js"));
        assert!(pos("b.js") < pos("a.js"));
    }

    #[test]
    fn cycle_reported_with_full_path() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        write(root, "a.js", b"import './b.js';");
        write(root, "b.js", b"import './c.js';");
        write(root, "c.js", b"import './a.js';");
        let err = builder(root).build(&["a.js".to_string()]).err().unwrap();
        match err {
            GraphError::CyclicDependency { cycle } => {
                let names: Vec<_> = cycle
                    .iter()
                    .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
                    .collect();
                assert_eq!(names, vec!["a.js", "b.js", "c.js", "a.js"]);
            }
            other => panic!("expected cycle, got {other:?}"),
        }
    }

    #[test]
    fn unresolved_reference_names_specifier_and_referrer() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        write(root, "src/index.js", b"import helper from './missing';\n");
        let mut b = builder(root);
        let err = b.build(&["src/index.js".to_string()]).err().unwrap();
        match err {
            GraphError::UnresolvedReference { specifier, from, span } => {
                assert_eq!(specifier, "./missing");
                assert_eq!(from, fs::canonicalize(root.join("src/index.js")).unwrap());
                assert_eq!(b.sources().snippet(span), "./missing");
            }
            other => panic!("expected unresolved reference, got {other:?}"),
        }
    }

    #[test]
    fn missing_entry_is_unresolved() {
        let dir = tempfile::tempdir().unwrap();
        let err = builder(dir.path()).build(&["src/nope.js".to_string()]).err().unwrap();
        assert!(matches!(err, GraphError::UnresolvedReference { span, .. } if span.is_none()));
    }

    #[test]
    fn external_specifiers_skipped_and_unclassified_is_leaf() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        write(
            root,
            "index.html",
            b"<link rel=\"stylesheet\" href=\"https://cdn.example/x.css\"><img src=\"notes.txt\">",
        );
        write(root, "notes.txt", b"import './nothing';");
        let graph = builder(root).build(&["index.html".to_string()]).unwrap();
        assert_eq!(graph.len(), 2);
        let notes = graph.module(ModuleId::from_raw(1));
        assert_eq!(notes.kind, None);
        assert!(notes.references.is_empty());
        assert_eq!(graph.module(ModuleId::from_raw(0)).references[0].kind, ReferenceKind::Asset);
    }

    #[test]
    fn shared_entries_are_deduplicated() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        write(root, "a.js", b"");
        let graph = builder(root)
            .build(&["a.js".to_string(), "./a.js".to_string()])
            .unwrap();
        assert_eq!(graph.entries().len(), 1);
    }
}
