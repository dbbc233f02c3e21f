//! Diagnostic rendering for terminals and machine consumers.

use crate::diagnostic::Diagnostic;
use crate::label::LabelStyle;
use crate::severity::Severity;
use kiln_source::SourceDb;

/// Formats diagnostics for output.
pub trait DiagnosticRenderer {
    /// Renders a single diagnostic.
    fn render(&self, diag: &Diagnostic, sources: &SourceDb) -> String;

    /// Renders a whole report. The default joins single renderings.
    fn render_all(&self, diags: &[Diagnostic], sources: &SourceDb) -> String {
        diags
            .iter()
            .map(|d| self.render(d, sources))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// rustc-style rendering:
///
/// ```text
/// error[E101]: cannot resolve './missing'
///   --> src/js/index.js:3:20
///    |
///  3 | import helper from './missing';
///    |                    ^^^^^^^^^ not found
///    |
///    = note: searched relative, alias and package roots
/// ```
pub struct TerminalRenderer {
    /// Whether to emit ANSI colour codes.
    pub color: bool,
}

impl TerminalRenderer {
    /// Creates a terminal renderer.
    pub fn new(color: bool) -> Self {
        Self { color }
    }

    fn paint(&self, severity: Severity, text: &str) -> String {
        if !self.color {
            return text.to_string();
        }
        let code = match severity {
            Severity::Error => "1;31",
            Severity::Warning => "1;33",
            Severity::Note => "1;36",
        };
        format!("\x1b[{code}m{text}\x1b[0m")
    }
}

impl DiagnosticRenderer for TerminalRenderer {
    fn render(&self, diag: &Diagnostic, sources: &SourceDb) -> String {
        let mut out = String::new();
        let header = format!("{}[{}]", diag.severity, diag.code);
        out.push_str(&format!(
            "{}: {}\n",
            self.paint(diag.severity, &header),
            diag.message
        ));

        match sources.locate(diag.primary_span) {
            Some(location) => {
                let file = sources.get_file(diag.primary_span.file);
                let line_text = file.line_text(diag.primary_span.start);
                let gutter = location.line.to_string();
                let pad = " ".repeat(gutter.len());

                out.push_str(&format!("{pad}--> {location}\n"));
                out.push_str(&format!("{pad} |\n"));
                out.push_str(&format!("{gutter} | {line_text}\n"));

                let indent = " ".repeat(location.column as usize - 1);
                let carets = "^".repeat(diag.primary_span.len().max(1) as usize);
                let message = diag
                    .labels
                    .iter()
                    .find(|l| l.style == LabelStyle::Primary)
                    .map(|l| format!(" {}", l.message))
                    .unwrap_or_default();
                out.push_str(&format!("{pad} | {indent}{carets}{message}\n"));
            }
            None => {
                if let Some(module) = &diag.module {
                    out.push_str(&format!("  --> {module}\n"));
                }
            }
        }

        for label in diag.labels.iter().filter(|l| l.style == LabelStyle::Secondary) {
            match sources.locate(label.span) {
                Some(location) => out.push_str(&format!("   - {location}: {}\n", label.message)),
                None => out.push_str(&format!("   - {}\n", label.message)),
            }
        }
        for note in &diag.notes {
            out.push_str(&format!("   = note: {note}\n"));
        }
        for help in &diag.help {
            out.push_str(&format!("   = help: {help}\n"));
        }
        out
    }
}

/// Renders diagnostics as JSON objects, one array per report.
///
/// Spans are resolved to a `"location": "path:line:col"` field.
pub struct JsonRenderer;

impl JsonRenderer {
    fn to_value(diag: &Diagnostic, sources: &SourceDb) -> serde_json::Value {
        let mut value = serde_json::to_value(diag).unwrap_or(serde_json::Value::Null);
        if let (Some(location), Some(obj)) = (sources.locate(diag.primary_span), value.as_object_mut())
        {
            obj.insert(
                "location".to_string(),
                serde_json::Value::String(location.to_string()),
            );
        }
        if let Some(obj) = value.as_object_mut() {
            obj.insert(
                "code".to_string(),
                serde_json::Value::String(diag.code.to_string()),
            );
        }
        value
    }
}

impl DiagnosticRenderer for JsonRenderer {
    fn render(&self, diag: &Diagnostic, sources: &SourceDb) -> String {
        Self::to_value(diag, sources).to_string()
    }

    fn render_all(&self, diags: &[Diagnostic], sources: &SourceDb) -> String {
        let values: Vec<_> = diags.iter().map(|d| Self::to_value(d, sources)).collect();
        serde_json::to_string_pretty(&values).unwrap_or_else(|_| "[]".to_string())
    }
}
