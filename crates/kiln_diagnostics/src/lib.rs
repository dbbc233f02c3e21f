//! Structured diagnostics for build errors and warnings.
//!
//! Every failure the pipeline reports to the user becomes a [`Diagnostic`]
//! with a stable [`DiagnosticCode`]. Diagnostics are collected in a
//! thread-safe [`DiagnosticSink`] while the build runs and rendered at the
//! end by a [`DiagnosticRenderer`] (terminal or JSON).

#![warn(missing_docs)]

pub mod code;
pub mod diagnostic;
pub mod label;
pub mod renderer;
pub mod severity;
pub mod sink;

pub use code::{codes, Category, DiagnosticCode};
pub use diagnostic::Diagnostic;
pub use label::{Label, LabelStyle};
pub use renderer::{DiagnosticRenderer, JsonRenderer, TerminalRenderer};
pub use severity::Severity;
pub use sink::DiagnosticSink;
