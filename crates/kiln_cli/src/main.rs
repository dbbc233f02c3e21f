//! Kiln CLI, the command-line front end of the asset pipeline.
//!
//! Provides `kiln build` for one-shot builds, `kiln watch` for rebuilding on
//! file changes, `kiln init` for project scaffolding and `kiln clean` for
//! removing build output and the incremental cache.

#![warn(missing_docs)]

mod build;
mod clean;
mod init;
mod project;
mod watch;

use std::process;

use clap::{Parser, Subcommand, ValueEnum};
use kiln_common::BuildMode;
use tracing_subscriber::EnvFilter;

/// Kiln, an incremental asset pipeline.
#[derive(Parser, Debug)]
#[command(name = "kiln", version, about = "Kiln asset pipeline")]
pub struct Cli {
    /// Suppress all output except errors.
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Enable verbose (debug-level) output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Control colored output.
    #[arg(long, global = true, value_enum, default_value_t = ColorChoice::Auto)]
    pub color: ColorChoice,

    /// Path to a custom `kiln.toml` configuration file.
    #[arg(long, global = true)]
    pub config: Option<String>,

    /// The subcommand to run.
    #[command(subcommand)]
    pub command: Command,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Build the project once.
    Build(BuildArgs),
    /// Build in development mode and rebuild on file changes.
    Watch(WatchArgs),
    /// Create a new Kiln project.
    Init {
        /// Project name (creates a subdirectory). If omitted, initializes in
        /// the current directory.
        name: Option<String>,
    },
    /// Remove build output.
    Clean(CleanArgs),
}

/// Arguments for the `kiln build` subcommand.
#[derive(Parser, Debug)]
pub struct BuildArgs {
    /// Build mode. Defaults to `[project].mode`.
    #[arg(short, long, value_enum)]
    pub mode: Option<ModeArg>,

    /// Entry point, relative to the project root. Repeatable; replaces
    /// `[project].entries` when given.
    #[arg(short, long = "entry")]
    pub entries: Vec<String>,

    /// Output directory. Defaults to `[output].dir`.
    #[arg(short, long)]
    pub out: Option<String>,

    /// Output format for diagnostics.
    #[arg(short, long, value_enum, default_value_t = ReportFormat::Text)]
    pub format: ReportFormat,

    /// Ignore and do not update the incremental cache.
    #[arg(long)]
    pub no_cache: bool,
}

/// Arguments for the `kiln watch` subcommand.
#[derive(Parser, Debug)]
pub struct WatchArgs {
    /// Entry point, relative to the project root. Repeatable.
    #[arg(short, long = "entry")]
    pub entries: Vec<String>,

    /// Output directory. Defaults to `[output].dir`.
    #[arg(short, long)]
    pub out: Option<String>,

    /// Ignore and do not update the incremental cache.
    #[arg(long)]
    pub no_cache: bool,
}

/// Arguments for the `kiln clean` subcommand.
#[derive(Parser, Debug)]
pub struct CleanArgs {
    /// Also drop the incremental cache.
    #[arg(long)]
    pub cache: bool,

    /// Output directory. Defaults to `[output].dir`.
    #[arg(short, long)]
    pub out: Option<String>,
}

/// Build mode selection on the command line.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum ModeArg {
    /// Readable output names, no hashing.
    Development,
    /// Content-hashed output names.
    Production,
}

impl From<ModeArg> for BuildMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Development => BuildMode::Development,
            ModeArg::Production => BuildMode::Production,
        }
    }
}

/// Controls whether colored output is produced.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum ColorChoice {
    /// Detect from terminal capabilities.
    Auto,
    /// Always produce colored output.
    Always,
    /// Never produce colored output.
    Never,
}

/// Diagnostic output format.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum ReportFormat {
    /// Human-readable terminal output.
    Text,
    /// Machine-readable JSON output.
    Json,
}

/// Global settings derived from CLI flags.
pub struct GlobalArgs {
    /// Whether to suppress non-error output.
    pub quiet: bool,
    /// Whether to print verbose/debug information.
    pub verbose: bool,
    /// Whether to use colored output.
    pub color: bool,
    /// Optional path to a custom config file.
    pub config: Option<String>,
}

fn main() {
    let cli = Cli::parse();

    init_tracing(cli.verbose);

    let color = match cli.color {
        ColorChoice::Auto => is_terminal(),
        ColorChoice::Always => true,
        ColorChoice::Never => false,
    };

    let global = GlobalArgs {
        quiet: cli.quiet,
        verbose: cli.verbose,
        color,
        config: cli.config,
    };

    let result = match cli.command {
        Command::Build(ref args) => build::run(args, &global),
        Command::Watch(ref args) => watch::run(args, &global),
        Command::Init { name } => init::run(name, &global),
        Command::Clean(ref args) => clean::run(args, &global),
    };

    match result {
        Ok(code) => process::exit(code),
        Err(e) => {
            eprintln!("error: {e}");
            process::exit(1);
        }
    }
}

/// Installs the stderr log subscriber. `RUST_LOG` wins over the flags.
fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

fn is_terminal() -> bool {
    std::env::var("TERM").is_ok_and(|term| term != "dumb")
}
