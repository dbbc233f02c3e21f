//! One build from entries to output files.

use std::path::PathBuf;
use std::time::Instant;

use kiln_cache::Cache;
use kiln_diagnostics::DiagnosticSink;
use kiln_emit::{EmitOptions, Emitter, Namer, OutputRoot};
use kiln_graph::GraphBuilder;
use kiln_scheduler::{CancelToken, Scheduler};
use kiln_transform::ChainSet;

use crate::outcome::BuildOutcome;
use crate::report;
use crate::request::BuildRequest;

/// Runs a build, opening the project's cache if the request uses one.
///
/// Never fails outright: problems are reported as diagnostics and reflected
/// in [`BuildOutcome::exit_code`].
pub fn build(request: &BuildRequest) -> BuildOutcome {
    let cache = request
        .use_cache
        .then(|| Cache::open(&request.cache_dir()));
    build_with_cache(request, cache.as_ref(), &CancelToken::new())
}

/// Runs a build against an already open cache.
///
/// Watch sessions keep one cache open across builds so that its in-memory
/// entries survive between rebuilds.
#[tracing::instrument(skip_all, fields(mode = %request.mode, build = request.build_number))]
pub fn build_with_cache(
    request: &BuildRequest,
    cache: Option<&Cache>,
    cancel: &CancelToken,
) -> BuildOutcome {
    let started = Instant::now();
    let sink = DiagnosticSink::new();
    let mut outcome = BuildOutcome::new(request.mode);

    if let Some(cache) = cache {
        if let Some(error) = cache.load_error() {
            sink.emit(report::cache_error(error));
        }
        cache.begin_build();
    }

    let chains = match ChainSet::from_config(&request.config) {
        Ok(chains) => chains,
        Err(error) => {
            sink.emit(report::transform_error(&error));
            return finish(outcome, sink, started);
        }
    };

    let mut builder = GraphBuilder::new(&request.root, &request.config.resolve);
    let graph = match builder.build(&request.entries) {
        Ok(graph) => graph,
        Err(error) => {
            sink.emit(report::graph_error(&error, builder.sources()));
            outcome.failed_sources = builder.take_sources();
            return finish(outcome, sink, started);
        }
    };
    outcome.stats.modules = graph.len();

    if let Some(cache) = cache {
        let paths: Vec<PathBuf> = graph.modules().iter().map(|m| m.path.clone()).collect();
        let changes = cache.refresh_sources(&paths);
        tracing::debug!(
            changed = changes.dirty_count(),
            "sources changed since last build"
        );
        outcome.changes = Some(changes);
    }

    let namer = match Namer::new(&request.config, graph.root(), request.mode, request.build_number)
    {
        Ok(namer) => namer,
        Err(error) => {
            sink.emit(report::emit_error(&error));
            outcome.graph = Some(graph);
            return finish(outcome, sink, started);
        }
    };

    let scheduler =
        Scheduler::new(&chains, &namer).with_workers(request.config.build.workers);
    let mut results = match scheduler.run(&graph, cache, cancel) {
        Ok(results) => results,
        Err(error) => {
            sink.emit(report::internal_error(&error));
            outcome.graph = Some(graph);
            return finish(outcome, sink, started);
        }
    };
    results.sort_errors();
    outcome.stats.executed = results.stats.executed;
    outcome.stats.cache_hits = results.stats.cache_hits;
    outcome.stats.failed = results.stats.failed;
    outcome.stats.skipped = results.stats.skipped;

    for error in &results.errors {
        sink.emit(report::module_error(error));
    }
    for warning in &results.cache_warnings {
        let path = &graph.module(warning.module).rel_path;
        sink.emit(report::cache_warning(warning, path));
    }

    if results.cancelled {
        tracing::info!("build cancelled before emission");
        outcome.cancelled = true;
        outcome.graph = Some(graph);
        return finish(outcome, sink, started);
    }

    let options = EmitOptions::from_config(&request.config.output, request.mode, request.incremental);
    let emitted = OutputRoot::new(&request.output_dir(), graph.root())
        .and_then(|root| Emitter::new(&namer, root, options).emit(&graph, &results));
    match emitted {
        Ok(emit) => {
            outcome.stats.written = emit.written.len();
            outcome.stats.unchanged = emit.unchanged.len();
            outcome.stats.removed = emit.removed.len();
            outcome.manifest = emit.manifest.clone();
            outcome.report = Some(emit);
        }
        Err(error) => sink.emit(report::emit_error(&error)),
    }

    if let Some(cache) = cache {
        let max_idle = u64::from(request.config.cache.gc_after_builds);
        match cache.gc(max_idle) {
            Ok(0) => {}
            Ok(removed) => tracing::debug!(removed, "collected idle cache entries"),
            Err(error) => sink.emit(report::cache_error(&error)),
        }
        if let Err(error) = cache.save() {
            sink.emit(report::cache_error(&error));
        }
    }

    outcome.graph = Some(graph);
    finish(outcome, sink, started)
}

fn finish(mut outcome: BuildOutcome, sink: DiagnosticSink, started: Instant) -> BuildOutcome {
    outcome.diagnostics = sink.take_all();
    outcome.stats.elapsed = started.elapsed();
    tracing::info!(
        errors = outcome.error_count(),
        warnings = outcome.warning_count(),
        elapsed_ms = outcome.stats.elapsed.as_millis() as u64,
        "build finished"
    );
    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use kiln_config::ProjectConfig;

    fn project(files: &[(&str, &str)], toml: &str) -> (tempfile::TempDir, ProjectConfig) {
        let dir = tempfile::tempdir().unwrap();
        for (rel, content) in files {
            let path = dir.path().join(rel);
            std::fs::create_dir_all(path.parent().unwrap()).unwrap();
            std::fs::write(path, content).unwrap();
        }
        let config = kiln_config::load_config_from_str(toml).unwrap();
        (dir, config)
    }

    #[test]
    fn missing_entry_is_reported() {
        let (dir, config) = project(
            &[],
            "[project]\nname = \"site\"\nentries = [\"src/index.js\"]\n",
        );
        let outcome = build(&BuildRequest::new(dir.path(), config));
        assert_eq!(outcome.exit_code(), 1);
        assert_eq!(outcome.diagnostics[0].code.to_string(), "E101");
        assert!(outcome.graph().is_none());
        assert!(outcome.manifest.is_empty());
    }

    #[test]
    fn bad_transform_options_are_reported() {
        let (dir, config) = project(
            &[("index.js", "1;")],
            "[project]\nname = \"site\"\nentries = [\"index.js\"]\n\n[transforms.downlevel]\nbogus = 1\n",
        );
        let outcome = build(&BuildRequest::new(dir.path(), config));
        assert_eq!(outcome.diagnostics[0].code.to_string(), "E002");
    }

    #[test]
    fn successful_build_records_stats() {
        let (dir, config) = project(
            &[("index.js", "console.log(1);\n")],
            "[project]\nname = \"site\"\nentries = [\"index.js\"]\n",
        );
        let outcome = build(&BuildRequest::new(dir.path(), config));
        assert_eq!(outcome.exit_code(), 0, "{:?}", outcome.diagnostics);
        assert_eq!(outcome.stats.modules, 1);
        assert_eq!(outcome.stats.executed, 1);
        assert!(outcome.stats.written >= 2);
        assert!(dir.path().join(".kiln-cache/index.json").exists());
        assert!(outcome.changes.as_ref().unwrap().new_files.len() == 1);
    }

    #[test]
    fn cancelled_build_emits_nothing() {
        let (dir, config) = project(
            &[("index.js", "console.log(1);\n")],
            "[project]\nname = \"site\"\nentries = [\"index.js\"]\n",
        );
        let request = BuildRequest::new(dir.path(), config).without_cache();
        let cancel = CancelToken::new();
        cancel.cancel();
        let outcome = build_with_cache(&request, None, &cancel);
        assert!(outcome.cancelled);
        assert_eq!(outcome.exit_code(), 1);
        assert!(!dir.path().join("dist").exists());
    }
}
