//! `kiln build`: one build from the configured entries.

use std::error::Error;

use kiln_diagnostics::{DiagnosticRenderer, JsonRenderer, TerminalRenderer};
use kiln_pipeline::{BuildOutcome, BuildRequest};

use crate::project::prepare_request;
use crate::{BuildArgs, GlobalArgs, ReportFormat};

/// Runs the `kiln build` command.
///
/// Returns exit code 0 on success, 1 if any error diagnostic was reported.
pub fn run(args: &BuildArgs, global: &GlobalArgs) -> Result<i32, Box<dyn Error>> {
    let mut request = prepare_request(global, &args.entries, args.out.as_deref(), args.no_cache)?;
    if let Some(mode) = args.mode {
        request = request.with_mode(mode.into());
    }

    if !global.quiet {
        print_building(&request);
    }

    let outcome = kiln_pipeline::build(&request);
    report(&outcome, args.format, global);
    if !global.quiet && outcome.is_success() {
        print_finished(&outcome);
    }
    Ok(outcome.exit_code())
}

/// Prints the cargo-style opening status line.
pub(crate) fn print_building(request: &BuildRequest) {
    eprintln!(
        "   Building {} v{}",
        request.config.project.name, request.config.project.version
    );
}

/// Renders the diagnostics of `outcome` and the result summary.
///
/// Text goes to stderr; JSON goes to stdout so it can be piped.
pub(crate) fn report(outcome: &BuildOutcome, format: ReportFormat, global: &GlobalArgs) {
    match format {
        ReportFormat::Text => {
            let renderer = TerminalRenderer::new(global.color);
            for diag in &outcome.diagnostics {
                eprint!("{}", renderer.render(diag, outcome.sources()));
                eprintln!();
            }
            if !global.quiet || outcome.error_count() > 0 {
                eprintln!(
                    "   Result: {} error(s), {} warning(s)",
                    outcome.error_count(),
                    outcome.warning_count()
                );
            }
        }
        ReportFormat::Json => {
            println!(
                "{}",
                JsonRenderer.render_all(&outcome.diagnostics, outcome.sources())
            );
        }
    }
}

fn print_finished(outcome: &BuildOutcome) {
    let stats = &outcome.stats;
    eprintln!(
        "    Finished {} build in {:.2}s ({} module(s), {} cached, {} file(s) written)",
        outcome.mode,
        stats.elapsed.as_secs_f64(),
        stats.modules,
        stats.cache_hits,
        stats.written
    );
}
