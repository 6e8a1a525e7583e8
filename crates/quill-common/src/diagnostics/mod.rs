//! Diagnostic types and message lookup for the semantic analysis core.
//!
//! Message templates live in `data.rs`. Positions are a front end concern:
//! a diagnostic only records the node it is anchored to and the subject text
//! (usually the name being resolved or the variable being checked).

use serde::Serialize;

use crate::node::NodeId;

mod data;
pub use data::{DIAGNOSTIC_MESSAGES, diagnostic_codes, diagnostic_messages};

// =============================================================================
// Diagnostic Types
// =============================================================================

/// Diagnostic category.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum DiagnosticCategory {
    Warning = 0,
    Error = 1,
    Suggestion = 2,
    Message = 3,
    /// Aborts the compilation attempt.
    Fatal = 4,
}

impl DiagnosticCategory {
    /// Whether a diagnostic of this category fails the compilation.
    #[must_use]
    pub const fn is_serious(self) -> bool {
        matches!(self, Self::Error | Self::Fatal)
    }

    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Warning => "warning",
            Self::Error => "error",
            Self::Suggestion => "suggestion",
            Self::Message => "message",
            Self::Fatal => "fatal",
        }
    }
}

/// Related information for a diagnostic (e.g., "see also" nodes).
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize)]
pub struct DiagnosticRelatedInformation {
    pub node: NodeId,
    pub message_text: String,
    pub category: DiagnosticCategory,
    pub code: u32,
}

/// A semantic diagnostic with optional related information.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize)]
pub struct Diagnostic {
    pub node: NodeId,
    /// What the diagnostic is about, e.g. `a.b.C` or `x`.
    pub subject: String,
    pub message_text: String,
    pub category: DiagnosticCategory,
    pub code: u32,
    /// Related information (e.g., where a conflicting name was declared)
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub related_information: Vec<DiagnosticRelatedInformation>,
}

impl Diagnostic {
    /// Create a new error diagnostic.
    #[must_use]
    pub const fn error(node: NodeId, subject: String, message: String, code: u32) -> Self {
        Self {
            node,
            subject,
            message_text: message,
            category: DiagnosticCategory::Error,
            code,
            related_information: Vec::new(),
        }
    }

    /// Create a diagnostic from the message table, filling `{0}`, `{1}`, ...
    /// with `args`. Unknown codes produce an `Error` with the raw arguments.
    #[must_use]
    pub fn from_code(code: u32, node: NodeId, subject: &str, args: &[&str]) -> Self {
        let (category, message_text) = match get_diagnostic_message(code) {
            Some(msg) => (msg.category, format_message(msg.message, args)),
            None => (DiagnosticCategory::Error, args.join(" ")),
        };
        Self {
            node,
            subject: subject.to_string(),
            message_text,
            category,
            code,
            related_information: Vec::new(),
        }
    }

    /// Add related information to this diagnostic.
    #[must_use]
    pub fn with_related(mut self, node: NodeId, message: String) -> Self {
        self.related_information.push(DiagnosticRelatedInformation {
            node,
            message_text: message,
            category: DiagnosticCategory::Message,
            code: 0,
        });
        self
    }

    /// Override the category (used for warnings-as-errors).
    #[must_use]
    pub const fn with_category(mut self, category: DiagnosticCategory) -> Self {
        self.category = category;
        self
    }
}

impl std::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} Q{}: {}",
            self.category.label(),
            self.code,
            self.message_text
        )
    }
}

/// Format a diagnostic message by replacing {0}, {1}, etc. with arguments.
#[must_use]
pub fn format_message(template: &str, args: &[&str]) -> String {
    let mut result = template.to_string();
    for (i, arg) in args.iter().enumerate() {
        result = result.replace(&format!("{{{i}}}"), arg);
    }
    result
}

/// A diagnostic message definition with code, category, and message template.
#[derive(Clone, Copy, Debug)]
pub struct DiagnosticMessage {
    pub code: u32,
    pub category: DiagnosticCategory,
    pub message: &'static str,
}

/// Look up a diagnostic message definition by code.
#[must_use]
pub fn get_diagnostic_message(code: u32) -> Option<&'static DiagnosticMessage> {
    DIAGNOSTIC_MESSAGES.iter().find(|m| m.code == code)
}

/// Get the category for a diagnostic code.
#[must_use]
pub fn get_diagnostic_category(code: u32) -> Option<DiagnosticCategory> {
    get_diagnostic_message(code).map(|m| m.category)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_message_fills_placeholders_in_order() {
        assert_eq!(
            format_message("Name \"{0}\" is missing from \"{1}\".", &["Key", "Map"]),
            "Name \"Key\" is missing from \"Map\"."
        );
    }

    #[test]
    fn from_code_uses_table_category() {
        let diag = Diagnostic::from_code(
            diagnostic_codes::INFINITE_RESOLVE_LOOP,
            NodeId(3),
            "x",
            &["x"],
        );
        assert_eq!(diag.category, DiagnosticCategory::Fatal);
        assert!(diag.message_text.contains('x'));
    }
}
