//! Turning transform results into files under the output root.

use std::collections::{BTreeMap, BTreeSet, HashSet};

use kiln_common::{AssetKind, BuildMode, ContentHash};
use kiln_config::{ChunkingPolicy, OutputConfig, StyleDelivery};
use kiln_graph::{ModuleGraph, ModuleId, ReferenceKind};
use kiln_scheduler::{find_placeholders, TransformResults};

use crate::chunk::{plan_chunks, ChunkKind, ChunkPlan};
use crate::error::EmitError;
use crate::manifest::Manifest;
use crate::naming::Namer;
use crate::output::{OutputRoot, WriteOutcome};

/// Settings for one emit pass.
#[derive(Clone, Debug)]
pub struct EmitOptions {
    /// Build mode, for logging.
    pub mode: BuildMode,
    /// How scripts and styles are grouped.
    pub policy: ChunkingPolicy,
    /// Whether styles are extracted or inlined into scripts.
    pub styles: StyleDelivery,
    /// Chunk name under the single policy.
    pub bundle_name: String,
    /// Chunk name for modules shared between roots.
    pub shared_name: String,
    /// Manifest file name inside the output root.
    pub manifest_name: String,
    /// Keep unchanged files instead of clearing the root first.
    pub incremental: bool,
}

impl EmitOptions {
    /// Options from the `[output]` section.
    pub fn from_config(output: &OutputConfig, mode: BuildMode, incremental: bool) -> Self {
        Self {
            mode,
            policy: output.chunking,
            styles: output.styles,
            bundle_name: output.bundle_name.clone(),
            shared_name: output.shared_name.clone(),
            manifest_name: output.manifest.clone(),
            incremental,
        }
    }
}

/// A chunk file that was emitted.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EmittedChunk {
    /// Chunk name.
    pub name: String,
    /// Script or style.
    pub kind: ChunkKind,
    /// Path below the output root.
    pub path: String,
    /// Modules whose output the file carries, inlined styles included.
    pub modules: Vec<ModuleId>,
}

/// What an emit pass did.
#[derive(Clone, Debug, Default)]
pub struct EmitReport {
    /// Source to output mapping.
    pub manifest: Manifest,
    /// Files created or replaced.
    pub written: Vec<String>,
    /// Files that already had the right bytes.
    pub unchanged: Vec<String>,
    /// Stale files deleted by an incremental pass.
    pub removed: Vec<String>,
    /// Emitted chunks in plan order.
    pub chunks: Vec<EmittedChunk>,
}

impl EmitReport {
    /// Number of files the build produced.
    pub fn file_count(&self) -> usize {
        self.written.len() + self.unchanged.len()
    }
}

/// Writes a build's outputs.
pub struct Emitter<'a> {
    namer: &'a Namer,
    output: OutputRoot,
    options: EmitOptions,
}

/// A chunk's rendered bytes and the modules that made it in.
struct Rendered {
    content: Vec<u8>,
    modules: Vec<ModuleId>,
    inlined_into: Option<usize>,
}

/// Output files keyed by path, remembering who claimed each.
#[derive(Default)]
struct FileSet {
    files: BTreeMap<String, (Vec<u8>, String)>,
}

impl FileSet {
    fn claim(&mut self, path: &str, bytes: Vec<u8>, owner: &str) -> Result<(), EmitError> {
        if let Some((existing, first)) = self.files.get(path) {
            if *existing == bytes {
                return Ok(());
            }
            return Err(EmitError::Collision {
                path: path.to_string(),
                first: first.clone(),
                second: owner.to_string(),
            });
        }
        self.files
            .insert(path.to_string(), (bytes, owner.to_string()));
        Ok(())
    }
}

impl<'a> Emitter<'a> {
    /// Creates an emitter writing into `output`.
    pub fn new(namer: &'a Namer, output: OutputRoot, options: EmitOptions) -> Self {
        Self {
            namer,
            output,
            options,
        }
    }

    /// The output root.
    pub fn output(&self) -> &OutputRoot {
        &self.output
    }

    /// Plans chunks, names every output, writes the files and the manifest.
    ///
    /// Failed modules are left out: their chunks are emitted without them and
    /// they have no manifest entry.
    #[tracing::instrument(skip_all, fields(mode = %self.options.mode, incremental = self.options.incremental))]
    pub fn emit(
        &self,
        graph: &ModuleGraph,
        results: &TransformResults,
    ) -> Result<EmitReport, EmitError> {
        let plan = plan_chunks(
            graph,
            self.options.policy,
            &self.options.bundle_name,
            &self.options.shared_name,
        );
        let mut rendered = render_chunks(graph, results, &plan);
        self.inline_styles(graph, &plan, &mut rendered);

        let mut files = FileSet::default();
        let mut report = EmitReport::default();

        let mut urls: Vec<Option<String>> = vec![None; rendered.len()];
        for (index, chunk) in plan.chunks().iter().enumerate() {
            let r = &rendered[index];
            if r.content.is_empty() || r.inlined_into.is_some() {
                continue;
            }
            let fingerprint = ContentHash::from_bytes(&r.content);
            let path = self.namer.chunk_path(chunk.kind, &chunk.name, &fingerprint);
            let owner = format!("{} chunk '{}'", chunk.kind, chunk.name);
            files.claim(&path, r.content.clone(), &owner)?;
            urls[index] = Some(path);
        }
        for (index, r) in rendered.iter().enumerate() {
            if let Some(target) = r.inlined_into {
                urls[index] = urls[target].clone();
            }
        }
        for (index, chunk) in plan.chunks().iter().enumerate() {
            let Some(path) = &urls[index] else { continue };
            if rendered[index].inlined_into.is_some() {
                continue;
            }
            let mut modules = rendered[index].modules.clone();
            for other in &rendered {
                if other.inlined_into == Some(index) {
                    modules.extend(&other.modules);
                }
            }
            report.chunks.push(EmittedChunk {
                name: chunk.name.clone(),
                kind: chunk.kind,
                path: path.clone(),
                modules,
            });
        }

        for out in results.outputs() {
            let Some(path) = &out.emitted else { continue };
            let module = graph.module(out.module);
            let bytes = if out.entry.kind == AssetKind::Markup {
                let text = String::from_utf8_lossy(&out.entry.output);
                self.render_page(&text, &module.rel_path, &plan, &rendered, &urls)
                    .into_bytes()
            } else {
                out.entry.output.clone()
            };
            files.claim(path, bytes, &module.rel_path)?;
        }

        for out in results.outputs() {
            let module = graph.module(out.module);
            let path = match &out.emitted {
                Some(path) => Some(path.clone()),
                None => plan.chunk_of(out.module).and_then(|c| urls[c].clone()),
            };
            if let Some(path) = path {
                report.manifest.insert(module.rel_path.clone(), path);
            }
        }
        files.claim(
            &self.options.manifest_name,
            report.manifest.to_json()?.into_bytes(),
            "manifest",
        )?;

        if !self.options.incremental {
            self.output.clear()?;
        }
        let keep: BTreeSet<String> = files.files.keys().cloned().collect();
        for (path, (bytes, _)) in &files.files {
            match self.output.write(path, bytes)? {
                WriteOutcome::Written => report.written.push(path.clone()),
                WriteOutcome::Unchanged => report.unchanged.push(path.clone()),
            }
        }
        report.removed = self.output.remove_stale(&keep)?;

        tracing::info!(
            written = report.written.len(),
            unchanged = report.unchanged.len(),
            removed = report.removed.len(),
            chunks = report.chunks.len(),
            "emitted output"
        );
        Ok(report)
    }

    /// Appends style chunks to the script chunk of the same root when styles
    /// are inlined. Styles linked directly from a page stay extracted.
    fn inline_styles(&self, graph: &ModuleGraph, plan: &ChunkPlan, rendered: &mut [Rendered]) {
        if self.options.styles != StyleDelivery::Inline {
            return;
        }
        let linked = linked_styles(graph);
        for (index, chunk) in plan.chunks().iter().enumerate() {
            if chunk.kind != ChunkKind::Style || chunk.modules.iter().any(|m| linked.contains(m)) {
                continue;
            }
            let target = match chunk.root {
                Some(root) => plan.root_chunk(root, ChunkKind::Script),
                None => plan.shared(ChunkKind::Script),
            };
            let Some(target) = target else { continue };
            if rendered[index].content.is_empty() || rendered[target].content.is_empty() {
                continue;
            }
            let snippet = inject_snippet(&rendered[index].content);
            rendered[target].content.extend_from_slice(snippet.as_bytes());
            rendered[index].inlined_into = Some(target);
        }
    }

    /// Replaces chunk placeholders in a page with chunk URLs and adds tags
    /// for shared chunks the page's roots depend on.
    fn render_page(
        &self,
        text: &str,
        page: &str,
        plan: &ChunkPlan,
        rendered: &[Rendered],
        urls: &[Option<String>],
    ) -> String {
        let mut edits: Vec<(usize, usize, String)> = Vec::new();
        let mut loaded: HashSet<String> = HashSet::new();

        for found in find_placeholders(text) {
            let url = plan.chunk_of(found.target).and_then(|c| urls[c].clone());
            let url = match url {
                Some(url) => url,
                None => {
                    tracing::warn!(page, target = found.target.as_raw(), "no chunk for page reference");
                    String::new()
                }
            };

            if self.options.policy == ChunkingPolicy::PerEntry {
                let tag_start = text[..found.range.start]
                    .rfind('<')
                    .unwrap_or(found.range.start);
                for kind in [ChunkKind::Script, ChunkKind::Style] {
                    if !plan.uses_shared(found.target, kind) {
                        continue;
                    }
                    let Some(index) = plan.shared(kind) else { continue };
                    let Some(shared_url) = &urls[index] else { continue };
                    if *shared_url == url || !loaded.insert(shared_url.clone()) {
                        continue;
                    }
                    let tag = if kind == ChunkKind::Script || rendered[index].inlined_into.is_some() {
                        format!("<script src=\"{shared_url}\"></script>")
                    } else {
                        format!("<link rel=\"stylesheet\" href=\"{shared_url}\">")
                    };
                    edits.push((tag_start, tag_start, tag));
                }
            }
            loaded.insert(url.clone());
            edits.push((found.range.start, found.range.end, url));
        }

        if edits.is_empty() {
            return text.to_string();
        }
        edits.sort_by_key(|(start, end, _)| (*start, *end));
        let mut out = String::with_capacity(text.len());
        let mut cursor = 0;
        for (start, end, replacement) in edits {
            let start = start.max(cursor);
            out.push_str(&text[cursor..start]);
            out.push_str(&replacement);
            cursor = end.max(start);
        }
        out.push_str(&text[cursor..]);
        out
    }
}

/// Concatenates each chunk's successful members, each behind a comment
/// naming its source.
fn render_chunks(graph: &ModuleGraph, results: &TransformResults, plan: &ChunkPlan) -> Vec<Rendered> {
    plan.chunks()
        .iter()
        .map(|chunk| {
            let mut content = Vec::new();
            let mut modules = Vec::new();
            for &id in &chunk.modules {
                let Some(out) = results.output(id) else { continue };
                content.extend_from_slice(
                    format!("/* module: {} */\n", graph.module(id).rel_path).as_bytes(),
                );
                content.extend_from_slice(&out.entry.output);
                content.push(b'\n');
                modules.push(id);
            }
            Rendered {
                content,
                modules,
                inlined_into: None,
            }
        })
        .collect()
}

/// Style modules a markup page links directly.
fn linked_styles(graph: &ModuleGraph) -> HashSet<ModuleId> {
    graph
        .modules()
        .iter()
        .filter(|m| m.kind == Some(AssetKind::Markup))
        .flat_map(|m| m.references.iter())
        .filter(|r| {
            r.kind == ReferenceKind::Import
                && graph.module(r.target).kind == Some(AssetKind::Style)
        })
        .map(|r| r.target)
        .collect()
}

/// Script that adds `css` to the document head.
fn inject_snippet(css: &[u8]) -> String {
    let css = String::from_utf8_lossy(css);
    let literal = serde_json::Value::String(css.into_owned()).to_string();
    format!(
        "(function(){{var s=document.createElement(\"style\");s.textContent={literal};document.head.appendChild(s);}})();\n"
    )
}
