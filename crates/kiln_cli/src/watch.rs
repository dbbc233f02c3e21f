//! `kiln watch`: development builds on every file change.

use std::error::Error;

use kiln_common::BuildMode;
use kiln_pipeline::{LogNotifier, ReloadEvent, ReloadNotifier, WatchSession};
use kiln_scheduler::CancelToken;

use crate::build::{print_building, report};
use crate::project::prepare_request;
use crate::{GlobalArgs, ReportFormat, WatchArgs};

/// Prints one status line per reloaded module.
struct StatusNotifier;

impl ReloadNotifier for StatusNotifier {
    fn notify(&self, events: &[ReloadEvent]) {
        for event in events {
            eprintln!("   Reloaded {} -> {}", event.module, event.emitted);
        }
    }
}

/// Runs the `kiln watch` command until the process is interrupted.
pub fn run(args: &WatchArgs, global: &GlobalArgs) -> Result<i32, Box<dyn Error>> {
    let request = prepare_request(global, &args.entries, args.out.as_deref(), args.no_cache)?
        .with_mode(BuildMode::Development);

    if !global.quiet {
        print_building(&request);
    }
    let notifier: Box<dyn ReloadNotifier> = if global.quiet {
        Box::new(LogNotifier)
    } else {
        Box::new(StatusNotifier)
    };
    let mut session = WatchSession::new(request, notifier);
    let cancel = CancelToken::new();
    session.run(&cancel, |outcome| {
        report(outcome, ReportFormat::Text, global);
        if !global.quiet {
            eprintln!(
                "    Watching for changes ({} module(s), {} rebuilt)",
                outcome.stats.modules, outcome.stats.executed
            );
        }
    })?;
    Ok(0)
}
