//! Diagnostic rendering for the terminal and for tools.

use colored::Colorize;
use serde::Serialize;

use quill_common::{Diagnostic, DiagnosticCategory, DiagnosticSink, NodeId};
use quill_driver::{CompileReport, DriverError};
use quill_model::Model;

/// Nearest declaration enclosing `node`, e.g. `app.User.h`.
#[must_use]
pub fn location(model: &Model, node: NodeId) -> String {
    let ast = model.ast();
    let mut current = Some(node);
    while let Some(id) = current {
        match ast.get(id) {
            Some(n) if n.kind.declares() => return ast.qualified_name(id),
            Some(n) => current = n.parent,
            None => break,
        }
    }
    "<program>".to_string()
}

fn plural(count: usize, word: &str) -> String {
    if count == 1 {
        format!("1 {word}")
    } else {
        format!("{count} {word}s")
    }
}

fn label(category: DiagnosticCategory, code: u32) -> String {
    let text = format!("{}[Q{code}]", category.label());
    match category {
        DiagnosticCategory::Error | DiagnosticCategory::Fatal => text.red().bold().to_string(),
        DiagnosticCategory::Warning => text.yellow().bold().to_string(),
        _ => text.cyan().to_string(),
    }
}

fn render_diagnostic(model: &Model, diag: &Diagnostic, out: &mut String) {
    out.push_str(&format!(
        "{}: {}\n",
        label(diag.category, diag.code),
        diag.message_text
    ));
    out.push_str(&format!(
        "  {} {} ({})\n",
        "-->".blue(),
        location(model, diag.node),
        diag.node
    ));
    for related in &diag.related_information {
        out.push_str(&format!(
            "  {} {}: {}\n",
            "note".cyan(),
            location(model, related.node),
            related.message_text
        ));
    }
}

/// Human-readable report: every diagnostic, then a summary line.
#[must_use]
pub fn render_text(model: &Model, report: &CompileReport, errs: &DiagnosticSink) -> String {
    let mut out = String::new();
    for diag in errs.diagnostics() {
        render_diagnostic(model, diag, &mut out);
    }

    if let Err(err @ (DriverError::NotConverged { .. } | DriverError::Aborted(_))) = report.check()
    {
        out.push_str(&format!("{}: {err}\n", "note".cyan().bold()));
    }

    let warnings = errs
        .diagnostics()
        .iter()
        .filter(|d| d.category == DiagnosticCategory::Warning)
        .count();
    let summary = match (errs.error_count(), warnings) {
        (0, 0) => "No errors.".to_string(),
        (errors, 0) => format!("Found {}.", plural(errors, "error")),
        (errors, warnings) => format!(
            "Found {} and {}.",
            plural(errors, "error"),
            plural(warnings, "warning")
        ),
    };
    out.push_str(&summary);
    out.push('\n');
    out
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct JsonDiagnostic<'a> {
    #[serde(flatten)]
    diagnostic: &'a Diagnostic,
    location: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct JsonOutput<'a> {
    report: &'a CompileReport,
    diagnostics: Vec<JsonDiagnostic<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    listing: Option<&'a [String]>,
}

/// Machine-readable report.
pub fn render_json(
    model: &Model,
    report: &CompileReport,
    errs: &DiagnosticSink,
    with_listing: bool,
) -> serde_json::Result<String> {
    let output = JsonOutput {
        report,
        diagnostics: errs
            .diagnostics()
            .iter()
            .map(|diagnostic| JsonDiagnostic {
                diagnostic,
                location: location(model, diagnostic.node),
            })
            .collect(),
        listing: with_listing.then(|| model.listing()),
    };
    let mut text = serde_json::to_string_pretty(&output)?;
    text.push('\n');
    Ok(text)
}
