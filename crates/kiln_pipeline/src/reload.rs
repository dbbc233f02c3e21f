//! Live-reload notification.

/// One module whose output changed in an incremental build.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReloadEvent {
    /// Project-relative source path.
    pub module: String,
    /// Output path below the output root.
    pub emitted: String,
}

/// Receives the changed modules after each successful incremental build.
///
/// The transport (websocket, browser extension, ...) lives outside Kiln.
pub trait ReloadNotifier {
    /// Called once per rebuild with the changed modules in source order.
    fn notify(&self, events: &[ReloadEvent]);
}

/// Logs reload events at `info` level.
#[derive(Clone, Copy, Debug, Default)]
pub struct LogNotifier;

impl ReloadNotifier for LogNotifier {
    fn notify(&self, events: &[ReloadEvent]) {
        for event in events {
            tracing::info!(module = %event.module, emitted = %event.emitted, "reload");
        }
    }
}
