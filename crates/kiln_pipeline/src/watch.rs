//! Rebuilding on file changes.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::time::{Duration, Instant};

use kiln_cache::Cache;
use kiln_emit::Manifest;
use kiln_graph::ModuleId;
use kiln_scheduler::CancelToken;
use notify::{Event, EventKind, RecursiveMode, Watcher};

use crate::build::build_with_cache;
use crate::outcome::BuildOutcome;
use crate::reload::{ReloadEvent, ReloadNotifier};
use crate::request::BuildRequest;

/// How often the event loop checks for cancellation.
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Errors that stop a watch session.
#[derive(Debug, thiserror::Error)]
pub enum WatchError {
    /// The file watcher could not be set up.
    #[error("file watcher failed: {0}")]
    Notify(#[from] notify::Error),

    /// The file watcher stopped delivering events.
    #[error("file watcher disconnected")]
    Disconnected,

    /// A build thread panicked.
    #[error("build thread panicked")]
    BuildPanicked,
}

type EventReceiver = Receiver<notify::Result<Event>>;

/// A sequence of builds sharing one cache.
///
/// The first build clears the output root; later builds reconcile it. After
/// each successful rebuild the notifier hears about every module whose
/// output moved or whose sources changed.
pub struct WatchSession {
    request: BuildRequest,
    cache: Option<Cache>,
    notifier: Box<dyn ReloadNotifier>,
    builds: u64,
    ignored: Vec<PathBuf>,
    last: Option<BuildOutcome>,
    /// Manifest of the most recent build that was not cancelled.
    completed: Option<Manifest>,
}

impl WatchSession {
    /// Creates a session. No build runs until [`rebuild`](Self::rebuild) or
    /// [`run`](Self::run).
    pub fn new(request: BuildRequest, notifier: Box<dyn ReloadNotifier>) -> Self {
        let cache = request
            .use_cache
            .then(|| Cache::open(&request.cache_dir()));
        let mut ignored = Vec::new();
        for dir in [request.output_dir(), request.cache_dir()] {
            if let Ok(canonical) = std::fs::canonicalize(&request.root) {
                if let Ok(rel) = dir.strip_prefix(&request.root) {
                    ignored.push(canonical.join(rel));
                }
            }
            ignored.push(dir);
        }
        Self {
            request,
            cache,
            notifier,
            builds: 0,
            ignored,
            last: None,
            completed: None,
        }
    }

    /// Number of builds started so far, cancelled ones included.
    pub fn builds(&self) -> u64 {
        self.builds
    }

    /// The most recent outcome.
    pub fn last(&self) -> Option<&BuildOutcome> {
        self.last.as_ref()
    }

    /// Runs the next build of the session.
    pub fn rebuild(&mut self, cancel: &CancelToken) -> &BuildOutcome {
        let request = self.next_request();
        let outcome = build_with_cache(&request, self.cache.as_ref(), cancel);
        self.finish(outcome)
    }

    /// Builds once, then rebuilds whenever files under the project root
    /// change, until `cancel` fires. Events are debounced by
    /// `[watch].debounce_ms`; changes to the output and cache directories
    /// are ignored. A change that settles while a build is running cancels
    /// that build, and the rebuild starts as soon as it has stopped.
    /// `on_build` sees every build that was not cancelled.
    pub fn run(
        &mut self,
        cancel: &CancelToken,
        on_build: impl FnMut(&BuildOutcome),
    ) -> Result<(), WatchError> {
        if cancel.is_cancelled() {
            return Ok(());
        }
        let (tx, rx) = mpsc::channel();
        let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| {
            let _ = tx.send(res);
        })?;
        watcher.watch(&self.request.root, RecursiveMode::Recursive)?;
        self.watch_loop(&rx, cancel, on_build)
    }

    fn watch_loop(
        &mut self,
        rx: &EventReceiver,
        cancel: &CancelToken,
        mut on_build: impl FnMut(&BuildOutcome),
    ) -> Result<(), WatchError> {
        let debounce = Duration::from_millis(self.request.config.watch.debounce_ms);
        let mut pending: Option<Instant> = None;
        let mut due = true;
        loop {
            if cancel.is_cancelled() {
                return Ok(());
            }
            if !due {
                self.poll(rx, &mut pending)?;
                due = pending.is_some_and(|at| at.elapsed() >= debounce);
                continue;
            }
            pending = None;

            let request = self.next_request();
            let token = CancelToken::new();
            let outcome = self.build_in_flight(&request, &token, rx, cancel, &mut pending, debounce)?;
            let outcome = self.finish(outcome);
            if !outcome.cancelled {
                on_build(outcome);
            }
            due = pending.is_some_and(|at| at.elapsed() >= debounce);
        }
    }

    /// Runs `request` on a worker while the caller keeps reading file
    /// events. The build's `token` fires once a newer change has settled or
    /// the session is cancelled.
    fn build_in_flight(
        &self,
        request: &BuildRequest,
        token: &CancelToken,
        rx: &EventReceiver,
        cancel: &CancelToken,
        pending: &mut Option<Instant>,
        debounce: Duration,
    ) -> Result<BuildOutcome, WatchError> {
        let cache = self.cache.as_ref();
        std::thread::scope(|s| {
            let worker = s.spawn(|| build_with_cache(request, cache, token));
            while !worker.is_finished() {
                if let Err(e) = self.poll(rx, pending) {
                    token.cancel();
                    return Err(e);
                }
                let superseded = pending.is_some_and(|at| at.elapsed() >= debounce);
                if (superseded || cancel.is_cancelled()) && !token.is_cancelled() {
                    tracing::debug!(build = request.build_number, "cancelling in-flight build");
                    token.cancel();
                }
            }
            worker.join().map_err(|_| WatchError::BuildPanicked)
        })
    }

    fn poll(&self, rx: &EventReceiver, pending: &mut Option<Instant>) -> Result<(), WatchError> {
        match rx.recv_timeout(POLL_INTERVAL) {
            Ok(Ok(event)) => {
                if self.is_relevant(&event) {
                    tracing::trace!(paths = ?event.paths, "file event");
                    *pending = Some(Instant::now());
                }
            }
            Ok(Err(error)) => tracing::warn!("file watcher error: {error}"),
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => return Err(WatchError::Disconnected),
        }
        Ok(())
    }

    fn next_request(&mut self) -> BuildRequest {
        self.builds += 1;
        let mut request = self.request.clone();
        request.build_number = self.builds;
        request.incremental = self.completed.is_some();
        request
    }

    fn finish(&mut self, outcome: BuildOutcome) -> &BuildOutcome {
        if outcome.cancelled {
            tracing::info!(build = self.builds, "build superseded before emission");
        } else {
            if self.completed.is_some() && outcome.is_success() {
                let events = self.reload_events(&outcome);
                if !events.is_empty() {
                    self.notifier.notify(&events);
                }
            }
            self.completed = Some(outcome.manifest.clone());
        }
        self.last.insert(outcome)
    }

    fn is_relevant(&self, event: &Event) -> bool {
        if matches!(event.kind, EventKind::Access(_)) {
            return false;
        }
        event.paths.iter().any(|path| !self.is_ignored(path))
    }

    fn is_ignored(&self, path: &Path) -> bool {
        self.ignored.iter().any(|dir| path.starts_with(dir))
    }

    /// Modules whose emitted path differs from the previous build, plus the
    /// changed sources and everything that embeds them.
    fn reload_events(&self, outcome: &BuildOutcome) -> Vec<ReloadEvent> {
        let previous = self.completed.as_ref();
        let mut modules: BTreeSet<String> = outcome
            .manifest
            .iter()
            .filter(|(source, emitted)| previous.and_then(|p| p.get(source)) != Some(*emitted))
            .map(|(source, _)| source.to_string())
            .collect();

        if let (Some(graph), Some(changes)) = (outcome.graph(), &outcome.changes) {
            let changed: Vec<ModuleId> = changes
                .changed()
                .iter()
                .filter_map(|path| graph.find(path))
                .collect();
            for id in graph.affected_by(&changed) {
                modules.insert(graph.module(id).rel_path.clone());
            }
        }

        modules
            .into_iter()
            .filter_map(|module| {
                let emitted = outcome.manifest.get(&module)?.to_string();
                Some(ReloadEvent { module, emitted })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    struct Recorder(Arc<Mutex<Vec<Vec<ReloadEvent>>>>);

    impl ReloadNotifier for Recorder {
        fn notify(&self, events: &[ReloadEvent]) {
            self.0.lock().unwrap().push(events.to_vec());
        }
    }

    fn session(dir: &Path) -> (WatchSession, Recorder) {
        std::fs::write(dir.join("a.js"), "console.log('a');\n").unwrap();
        std::fs::write(dir.join("b.css"), "b { color: red }\n").unwrap();
        let config = kiln_config::load_config_from_str(
            "[project]\nname = \"site\"\nentries = [\"a.js\", \"b.css\"]\nmode = \"production\"\n",
        )
        .unwrap();
        let recorder = Recorder::default();
        let session = WatchSession::new(
            BuildRequest::new(dir, config),
            Box::new(recorder.clone()),
        );
        (session, recorder)
    }

    #[test]
    fn first_build_does_not_notify() {
        let dir = tempfile::tempdir().unwrap();
        let (mut session, recorder) = session(dir.path());
        assert_eq!(session.rebuild(&CancelToken::new()).exit_code(), 0);
        assert_eq!(session.builds(), 1);
        assert!(recorder.0.lock().unwrap().is_empty());
    }

    #[test]
    fn rebuild_reports_only_changed_modules() {
        let dir = tempfile::tempdir().unwrap();
        let (mut session, recorder) = session(dir.path());
        session.rebuild(&CancelToken::new());

        std::fs::write(dir.path().join("a.js"), "console.log('changed');\n").unwrap();
        let outcome = session.rebuild(&CancelToken::new());
        assert_eq!(outcome.exit_code(), 0);
        assert_eq!(outcome.stats.cache_hits, 1);

        let calls = recorder.0.lock().unwrap();
        assert_eq!(calls.len(), 1);
        let modules: Vec<_> = calls[0].iter().map(|e| e.module.as_str()).collect();
        assert_eq!(modules, vec!["a.js"]);
        assert!(calls[0][0].emitted.starts_with("a."));
    }

    #[test]
    fn unchanged_rebuild_is_silent() {
        let dir = tempfile::tempdir().unwrap();
        let (mut session, recorder) = session(dir.path());
        session.rebuild(&CancelToken::new());
        let outcome = session.rebuild(&CancelToken::new());
        assert_eq!(outcome.stats.written, 0);
        assert!(recorder.0.lock().unwrap().is_empty());
    }

    #[test]
    fn output_and_cache_events_are_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let (session, _) = session(dir.path());
        let event = |path: PathBuf| Event::new(EventKind::Any).add_path(path);
        assert!(!session.is_relevant(&event(dir.path().join("dist/a.js"))));
        assert!(!session.is_relevant(&event(dir.path().join(".kiln-cache/index.json"))));
        assert!(session.is_relevant(&event(dir.path().join("a.js"))));
    }

    #[test]
    fn cancelled_rebuild_keeps_previous_manifest() {
        let dir = tempfile::tempdir().unwrap();
        let (mut session, recorder) = session(dir.path());
        session.rebuild(&CancelToken::new());

        let stopped = CancelToken::new();
        stopped.cancel();
        assert!(session.rebuild(&stopped).cancelled);
        assert!(recorder.0.lock().unwrap().is_empty());

        std::fs::write(dir.path().join("a.js"), "console.log('changed');\n").unwrap();
        assert_eq!(session.rebuild(&CancelToken::new()).exit_code(), 0);
        let calls = recorder.0.lock().unwrap();
        assert_eq!(calls.len(), 1);
        let modules: Vec<_> = calls[0].iter().map(|e| e.module.as_str()).collect();
        assert_eq!(modules, vec!["a.js"]);
    }

    #[test]
    fn change_during_build_supersedes_it() {
        let dir = tempfile::tempdir().unwrap();
        let mut entries = Vec::new();
        for i in 0..40 {
            std::fs::write(dir.path().join(format!("m{i}.js")), format!("let m{i} = {i};\n"))
                .unwrap();
            entries.push(format!("\"m{i}.js\""));
        }
        let config = kiln_config::load_config_from_str(&format!(
            "[project]\nname = \"site\"\nentries = [{}]\n[watch]\ndebounce_ms = 0\n",
            entries.join(", ")
        ))
        .unwrap();
        let mut session = WatchSession::new(
            BuildRequest::new(dir.path(), config),
            Box::new(Recorder::default()),
        );

        // Already queued, so it settles while the first build is running.
        let (tx, rx) = mpsc::channel();
        tx.send(Ok(Event::new(EventKind::Any).add_path(dir.path().join("m0.js"))))
            .unwrap();
        let cancel = CancelToken::new();
        let mut seen = Vec::new();
        session
            .watch_loop(&rx, &cancel, |outcome| {
                seen.push((outcome.cancelled, outcome.exit_code()));
                cancel.cancel();
            })
            .unwrap();

        assert_eq!(session.builds(), 2);
        assert_eq!(seen, vec![(false, 0)]);
        assert_eq!(session.last().unwrap().manifest.len(), 40);
        drop(tx);
    }

    #[test]
    fn cancelled_session_does_not_build() {
        let dir = tempfile::tempdir().unwrap();
        let (mut session, _) = session(dir.path());
        let cancel = CancelToken::new();
        cancel.cancel();
        session.run(&cancel, |_| {}).unwrap();
        assert_eq!(session.builds(), 0);
    }
}
