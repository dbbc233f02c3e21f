//! The resolved, acyclic module graph.

use crate::error::GraphError;
use crate::module::{Module, ModuleId, ReferenceKind};
use kiln_source::SourceDb;
use petgraph::algo::toposort;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::Direction;
use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};
use std::path::{Path, PathBuf};

/// Modules in discovery order plus the reference edges between them.
///
/// Node `i` of the edge graph is the module with id `i`; an edge points from
/// referrer to target.
pub struct ModuleGraph {
    root: PathBuf,
    modules: Vec<Module>,
    entries: Vec<ModuleId>,
    edges: DiGraph<ModuleId, ReferenceKind>,
    by_path: HashMap<PathBuf, ModuleId>,
    sources: SourceDb,
}

fn node(id: ModuleId) -> NodeIndex {
    NodeIndex::new(id.index())
}

impl ModuleGraph {
    pub(crate) fn new(root: PathBuf, modules: Vec<Module>, entries: Vec<ModuleId>, sources: SourceDb) -> Self {
        let mut edges = DiGraph::with_capacity(modules.len(), modules.len());
        let mut by_path = HashMap::with_capacity(modules.len());
        for module in &modules {
            edges.add_node(module.id);
            by_path.insert(module.path.clone(), module.id);
        }
        for module in &modules {
            for reference in &module.references {
                edges.update_edge(node(module.id), node(reference.target), reference.kind);
            }
        }
        Self {
            root,
            modules,
            entries,
            edges,
            by_path,
            sources,
        }
    }

    /// The project root.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// All modules in discovery order.
    pub fn modules(&self) -> &[Module] {
        &self.modules
    }

    /// The module with `id`.
    ///
    /// # Panics
    ///
    /// Panics if `id` did not come from this graph.
    pub fn module(&self, id: ModuleId) -> &Module {
        &self.modules[id.index()]
    }

    /// Number of modules.
    pub fn len(&self) -> usize {
        self.modules.len()
    }

    /// Returns `true` if the graph has no modules.
    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }

    /// Entry modules in configuration order.
    pub fn entries(&self) -> &[ModuleId] {
        &self.entries
    }

    /// Looks up a module by canonical path.
    pub fn find(&self, path: &Path) -> Option<ModuleId> {
        self.by_path.get(path).copied()
    }

    /// Text sources read while building, for diagnostics.
    pub fn sources(&self) -> &SourceDb {
        &self.sources
    }

    /// Distinct targets of `id`, in first-reference order.
    pub fn dependencies(&self, id: ModuleId) -> Vec<ModuleId> {
        let mut seen = HashSet::new();
        self.module(id)
            .references
            .iter()
            .map(|r| r.target)
            .filter(|t| seen.insert(*t))
            .collect()
    }

    /// Distinct targets of `id` reached through asset edges. These must be
    /// transformed before `id`.
    pub fn prerequisites(&self, id: ModuleId) -> Vec<ModuleId> {
        let mut seen = HashSet::new();
        self.module(id)
            .references
            .iter()
            .filter(|r| r.kind == ReferenceKind::Asset)
            .map(|r| r.target)
            .filter(|t| seen.insert(*t))
            .collect()
    }

    /// Modules referencing `id`, in id order.
    pub fn dependents(&self, id: ModuleId) -> Vec<ModuleId> {
        let set: BTreeSet<ModuleId> = self
            .edges
            .neighbors_directed(node(id), Direction::Incoming)
            .map(|n| self.edges[n])
            .collect();
        set.into_iter().collect()
    }

    /// Modules reachable from `start` (itself included) in depth-first
    /// pre-order following references in source order.
    pub fn reachable(&self, start: ModuleId) -> Vec<ModuleId> {
        let mut order = Vec::new();
        let mut seen = HashSet::new();
        let mut stack = vec![start];
        while let Some(id) = stack.pop() {
            if !seen.insert(id) {
                continue;
            }
            order.push(id);
            for dep in self.dependencies(id).into_iter().rev() {
                if !seen.contains(&dep) {
                    stack.push(dep);
                }
            }
        }
        order
    }

    /// `changed` plus every module that transitively references one of
    /// them, in id order.
    pub fn affected_by(&self, changed: &[ModuleId]) -> Vec<ModuleId> {
        let mut affected: BTreeSet<ModuleId> = changed.iter().copied().collect();
        let mut queue: VecDeque<ModuleId> = changed.iter().copied().collect();
        while let Some(id) = queue.pop_front() {
            for dependent in self.dependents(id) {
                if affected.insert(dependent) {
                    queue.push_back(dependent);
                }
            }
        }
        affected.into_iter().collect()
    }

    /// Modules ordered so that every module follows its dependencies.
    pub fn build_order(&self) -> Result<Vec<ModuleId>, GraphError> {
        let sorted = toposort(&self.edges, None).map_err(|cycle| GraphError::CyclicDependency {
            cycle: vec![self.module(self.edges[cycle.node_id()]).path.clone()],
        })?;
        Ok(sorted.into_iter().rev().map(|n| self.edges[n]).collect())
    }
}
