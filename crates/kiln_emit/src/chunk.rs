//! Grouping script and style modules into chunks.
//!
//! A chunk root is a script or style entry, or a script or style module
//! imported directly by a markup page. A root's members are everything it
//! reaches over import edges. Under the per-entry policy, modules reached
//! from two or more roots move to a shared chunk; under the single policy
//! every module lands in one bundle per kind.

use std::collections::{BTreeSet, HashMap, HashSet};

use kiln_common::AssetKind;
use kiln_config::ChunkingPolicy;
use kiln_graph::{ModuleGraph, ModuleId, ReferenceKind};

/// Whether a chunk holds scripts or styles.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ChunkKind {
    /// Concatenated script outputs.
    Script,
    /// Concatenated style outputs.
    Style,
}

impl ChunkKind {
    /// The chunk kind collecting modules of `kind`, if any.
    pub fn for_asset(kind: AssetKind) -> Option<Self> {
        match kind {
            AssetKind::Script => Some(ChunkKind::Script),
            AssetKind::Style => Some(ChunkKind::Style),
            _ => None,
        }
    }

    /// File extension of emitted chunks.
    pub fn extension(self) -> &'static str {
        match self {
            ChunkKind::Script => "js",
            ChunkKind::Style => "css",
        }
    }

    fn index(self) -> usize {
        match self {
            ChunkKind::Script => 0,
            ChunkKind::Style => 1,
        }
    }
}

impl std::fmt::Display for ChunkKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            ChunkKind::Script => "script",
            ChunkKind::Style => "style",
        })
    }
}

/// One planned chunk.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Chunk {
    /// Value of `[name]` for this chunk.
    pub name: String,
    /// Script or style.
    pub kind: ChunkKind,
    /// Members in id order.
    pub modules: Vec<ModuleId>,
    /// The root this chunk was planned for, or `None` for shared and
    /// bundle chunks.
    pub root: Option<ModuleId>,
}

/// The chunks of a build and how roots map onto them.
#[derive(Clone, Debug, Default)]
pub struct ChunkPlan {
    chunks: Vec<Chunk>,
    roots: Vec<ModuleId>,
    owner: HashMap<ModuleId, usize>,
    own: HashMap<ModuleId, [Option<usize>; 2]>,
    uses_shared: HashMap<ModuleId, [bool; 2]>,
    shared: [Option<usize>; 2],
}

impl ChunkPlan {
    /// All chunks: per-root chunks in root order, then shared or bundle
    /// chunks, scripts before styles.
    pub fn chunks(&self) -> &[Chunk] {
        &self.chunks
    }

    /// Chunk roots in planning order.
    pub fn roots(&self) -> &[ModuleId] {
        &self.roots
    }

    /// Index of the chunk holding `module`.
    pub fn chunk_of(&self, module: ModuleId) -> Option<usize> {
        self.owner.get(&module).copied()
    }

    /// Index of `root`'s own chunk of `kind`. `None` when every member of
    /// that kind moved to the shared chunk.
    pub fn root_chunk(&self, root: ModuleId, kind: ChunkKind) -> Option<usize> {
        self.own.get(&root).and_then(|c| c[kind.index()])
    }

    /// Whether `root` reaches modules of `kind` that live in the shared chunk.
    pub fn uses_shared(&self, root: ModuleId, kind: ChunkKind) -> bool {
        self.uses_shared
            .get(&root)
            .is_some_and(|u| u[kind.index()])
    }

    /// Index of the shared (or single bundle) chunk of `kind`.
    pub fn shared(&self, kind: ChunkKind) -> Option<usize> {
        self.shared[kind.index()]
    }

    fn push(&mut self, chunk: Chunk) -> usize {
        let index = self.chunks.len();
        for id in &chunk.modules {
            self.owner.insert(*id, index);
        }
        self.chunks.push(chunk);
        index
    }
}

/// Plans the chunks of `graph`.
pub fn plan_chunks(
    graph: &ModuleGraph,
    policy: ChunkingPolicy,
    bundle_name: &str,
    shared_name: &str,
) -> ChunkPlan {
    let roots = chunk_roots(graph);
    let members: Vec<(ModuleId, BTreeSet<ModuleId>)> = roots
        .iter()
        .map(|&root| (root, import_closure(graph, root)))
        .collect();

    let mut plan = ChunkPlan {
        roots,
        ..ChunkPlan::default()
    };

    let kind_of = |id: ModuleId| graph.module(id).kind.and_then(ChunkKind::for_asset);
    let split = |ids: &mut dyn Iterator<Item = ModuleId>| {
        let mut by_kind: [Vec<ModuleId>; 2] = [Vec::new(), Vec::new()];
        for id in ids {
            if let Some(kind) = kind_of(id) {
                by_kind[kind.index()].push(id);
            }
        }
        by_kind
    };

    match policy {
        ChunkingPolicy::Single => {
            let all: BTreeSet<ModuleId> = members.iter().flat_map(|(_, m)| m.iter().copied()).collect();
            let by_kind = split(&mut all.into_iter());
            for (kind, modules) in [ChunkKind::Script, ChunkKind::Style].into_iter().zip(by_kind) {
                if !modules.is_empty() {
                    let index = plan.push(Chunk {
                        name: bundle_name.to_string(),
                        kind,
                        modules,
                        root: None,
                    });
                    plan.shared[kind.index()] = Some(index);
                }
            }
        }
        ChunkingPolicy::PerEntry => {
            let mut reach: HashMap<ModuleId, usize> = HashMap::new();
            for (_, set) in &members {
                for id in set {
                    *reach.entry(*id).or_default() += 1;
                }
            }
            let shared_ids: BTreeSet<ModuleId> = reach
                .iter()
                .filter(|(_, count)| **count > 1)
                .map(|(id, _)| *id)
                .collect();

            let mut used: HashSet<String> = HashSet::from([shared_name.to_string()]);
            for (root, set) in &members {
                let name = unique_name(graph.module(*root).stem(), &mut used);
                let by_kind = split(&mut set.difference(&shared_ids).copied());
                let mut own = [None, None];
                for (kind, modules) in [ChunkKind::Script, ChunkKind::Style].into_iter().zip(by_kind) {
                    if !modules.is_empty() {
                        own[kind.index()] = Some(plan.push(Chunk {
                            name: name.clone(),
                            kind,
                            modules,
                            root: Some(*root),
                        }));
                    }
                }
                let mut uses = [false, false];
                for id in set.intersection(&shared_ids) {
                    if let Some(kind) = kind_of(*id) {
                        uses[kind.index()] = true;
                    }
                }
                plan.own.insert(*root, own);
                plan.uses_shared.insert(*root, uses);
            }

            let by_kind = split(&mut shared_ids.into_iter());
            for (kind, modules) in [ChunkKind::Script, ChunkKind::Style].into_iter().zip(by_kind) {
                if !modules.is_empty() {
                    let index = plan.push(Chunk {
                        name: shared_name.to_string(),
                        kind,
                        modules,
                        root: None,
                    });
                    plan.shared[kind.index()] = Some(index);
                }
            }
        }
    }

    tracing::debug!(
        roots = plan.roots.len(),
        chunks = plan.chunks.len(),
        "planned chunks"
    );
    plan
}

/// Script and style entries in entry order, then the script and style
/// imports of every markup module in id order.
fn chunk_roots(graph: &ModuleGraph) -> Vec<ModuleId> {
    let is_chunked = |id: ModuleId| {
        graph
            .module(id)
            .kind
            .is_some_and(|k| ChunkKind::for_asset(k).is_some())
    };

    let mut seen = HashSet::new();
    let mut roots = Vec::new();
    for &entry in graph.entries() {
        if is_chunked(entry) && seen.insert(entry) {
            roots.push(entry);
        }
    }
    for module in graph.modules() {
        if module.kind != Some(AssetKind::Markup) {
            continue;
        }
        for reference in &module.references {
            if reference.kind == ReferenceKind::Import
                && is_chunked(reference.target)
                && seen.insert(reference.target)
            {
                roots.push(reference.target);
            }
        }
    }
    roots
}

/// `root` plus every module reachable from it over import edges.
fn import_closure(graph: &ModuleGraph, root: ModuleId) -> BTreeSet<ModuleId> {
    let mut seen = BTreeSet::new();
    let mut stack = vec![root];
    while let Some(id) = stack.pop() {
        if !seen.insert(id) {
            continue;
        }
        for reference in graph.module(id).references.iter().rev() {
            if reference.kind == ReferenceKind::Import {
                stack.push(reference.target);
            }
        }
    }
    seen
}

fn unique_name(stem: &str, used: &mut HashSet<String>) -> String {
    let mut name = stem.to_string();
    let mut n = 2;
    while used.contains(&name) {
        name = format!("{stem}-{n}");
        n += 1;
    }
    used.insert(name.clone());
    name
}

#[cfg(test)]
mod tests {
    use super::*;
    use kiln_graph::GraphBuilder;

    fn graph(files: &[(&str, &str)], entries: &[&str]) -> (tempfile::TempDir, ModuleGraph) {
        let dir = tempfile::tempdir().unwrap();
        for (rel, content) in files {
            let path = dir.path().join(rel);
            std::fs::create_dir_all(path.parent().unwrap()).unwrap();
            std::fs::write(path, content).unwrap();
        }
        let config = kiln_config::load_config_from_str(
            "[project]\nname = \"site\"\nentries = [\"index.js\"]\n",
        )
        .unwrap();
        let entries: Vec<String> = entries.iter().map(|e| e.to_string()).collect();
        let graph = GraphBuilder::new(dir.path(), &config.resolve)
            .build(&entries)
            .unwrap();
        (dir, graph)
    }

    fn id(graph: &ModuleGraph, rel: &str) -> ModuleId {
        graph
            .modules()
            .iter()
            .find(|m| m.rel_path == rel)
            .map(|m| m.id)
            .unwrap()
    }

    fn two_entries() -> (tempfile::TempDir, ModuleGraph) {
        graph(
            &[
                ("a.js", "import './util.js';\nimport './a.css';\n"),
                ("b.js", "import './util.js';\n"),
                ("util.js", "export const x = 1;\n"),
                ("a.css", "body { margin: 0 }\n"),
            ],
            &["a.js", "b.js"],
        )
    }

    #[test]
    fn per_entry_moves_common_modules_to_shared() {
        let (_dir, g) = two_entries();
        let plan = plan_chunks(&g, ChunkingPolicy::PerEntry, "bundle", "shared");

        let names: Vec<_> = plan
            .chunks()
            .iter()
            .map(|c| format!("{}.{}", c.name, c.kind.extension()))
            .collect();
        assert_eq!(names, vec!["a.js", "a.css", "b.js", "shared.js"]);

        let util = id(&g, "util.js");
        let shared = plan.shared(ChunkKind::Script).unwrap();
        assert_eq!(plan.chunk_of(util), Some(shared));
        assert!(plan.uses_shared(id(&g, "a.js"), ChunkKind::Script));
        assert!(!plan.uses_shared(id(&g, "a.js"), ChunkKind::Style));
        assert_eq!(plan.chunks()[0].modules, vec![id(&g, "a.js")]);
    }

    #[test]
    fn single_policy_bundles_everything() {
        let (_dir, g) = two_entries();
        let plan = plan_chunks(&g, ChunkingPolicy::Single, "bundle", "shared");
        assert_eq!(plan.chunks().len(), 2);
        let script = &plan.chunks()[plan.shared(ChunkKind::Script).unwrap()];
        assert_eq!(script.name, "bundle");
        assert_eq!(script.modules.len(), 3);
        assert!(script.modules.windows(2).all(|w| w[0] < w[1]));
        assert!(!plan.uses_shared(id(&g, "a.js"), ChunkKind::Script));
    }

    #[test]
    fn markup_imports_become_roots() {
        let (_dir, g) = graph(
            &[
                (
                    "index.html",
                    "<link rel=\"stylesheet\" href=\"./main.css\"><script src=\"./app.js\"></script>",
                ),
                ("main.css", "a { color: red }"),
                ("app.js", "console.log(1);"),
            ],
            &["index.html"],
        );
        let plan = plan_chunks(&g, ChunkingPolicy::PerEntry, "bundle", "shared");
        assert_eq!(plan.roots(), &[id(&g, "main.css"), id(&g, "app.js")]);
        assert_eq!(
            plan.root_chunk(id(&g, "app.js"), ChunkKind::Script),
            plan.chunk_of(id(&g, "app.js"))
        );
        assert!(plan.shared(ChunkKind::Script).is_none());
    }

    #[test]
    fn duplicate_stems_get_suffixes() {
        let (_dir, g) = graph(
            &[
                ("a/main.js", "1;"),
                ("b/main.js", "2;"),
                ("shared.js", "3;"),
            ],
            &["a/main.js", "b/main.js", "shared.js"],
        );
        let plan = plan_chunks(&g, ChunkingPolicy::PerEntry, "bundle", "shared");
        let names: Vec<_> = plan.chunks().iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["main", "main-2", "shared-2"]);
    }

    #[test]
    fn planning_is_deterministic() {
        let (_dir, g) = two_entries();
        let first = plan_chunks(&g, ChunkingPolicy::PerEntry, "bundle", "shared");
        let second = plan_chunks(&g, ChunkingPolicy::PerEntry, "bundle", "shared");
        assert_eq!(first.chunks(), second.chunks());
    }
}
