//! The diagnostic sink.
//!
//! Every analysis in the core reports problems into a `DiagnosticSink` instead
//! of returning them. Speculative work runs against a branch:
//!
//! ```text
//! let mut branch = errs.branch();
//! if try_direct(&mut branch) {
//!     errs.merge(branch);          // keep the winning branch
//! } else {
//!     drop(branch);                // discard its diagnostics
//!     try_conversion(errs);
//! }
//! ```

use rustc_hash::FxHashSet;
use tracing::trace;

use crate::diagnostics::{Diagnostic, DiagnosticCategory, diagnostic_codes};
use crate::limits::DEFAULT_MAX_ERRORS;
use crate::node::NodeId;

/// Collects diagnostics, deduplicates them and tracks abort conditions.
#[derive(Debug, Clone)]
pub struct DiagnosticSink {
    diagnostics: Vec<Diagnostic>,
    seen: FxHashSet<Diagnostic>,
    /// Serious diagnostics already counted by the sink this one branched from.
    inherited_errors: usize,
    error_count: usize,
    max_errors: usize,
    fatal: bool,
    warnings_as_errors: bool,
}

impl Default for DiagnosticSink {
    fn default() -> Self {
        Self::new()
    }
}

impl DiagnosticSink {
    #[must_use]
    pub fn new() -> Self {
        Self::with_limit(DEFAULT_MAX_ERRORS)
    }

    #[must_use]
    pub fn with_limit(max_errors: usize) -> Self {
        Self {
            diagnostics: Vec::new(),
            seen: FxHashSet::default(),
            inherited_errors: 0,
            error_count: 0,
            max_errors: max_errors.max(1),
            fatal: false,
            warnings_as_errors: false,
        }
    }

    /// Report warnings as errors from now on.
    pub fn set_warnings_as_errors(&mut self, enabled: bool) {
        self.warnings_as_errors = enabled;
    }

    /// Log a diagnostic. Returns `false` when an identical diagnostic was
    /// already logged to this sink.
    pub fn log(&mut self, diag: Diagnostic) -> bool {
        let diag = if self.warnings_as_errors && diag.category == DiagnosticCategory::Warning {
            diag.with_category(DiagnosticCategory::Error)
        } else {
            diag
        };
        if !self.seen.insert(diag.clone()) {
            trace!(code = diag.code, subject = %diag.subject, "duplicate diagnostic dropped");
            return false;
        }
        match diag.category {
            DiagnosticCategory::Fatal => {
                self.fatal = true;
                self.error_count += 1;
            }
            DiagnosticCategory::Error => self.error_count += 1,
            _ => {}
        }
        self.diagnostics.push(diag);
        true
    }

    /// Log a diagnostic from the message table.
    pub fn log_code(&mut self, code: u32, node: NodeId, subject: &str, args: &[&str]) -> bool {
        self.log(Diagnostic::from_code(code, node, subject, args))
    }

    /// Log a fatal internal error.
    pub fn log_internal(&mut self, node: NodeId, detail: &str) -> bool {
        self.log_code(diagnostic_codes::INTERNAL_ERROR, node, detail, &[detail])
    }

    /// Start a speculative branch. Diagnostics logged to the branch reach this
    /// sink only through [`DiagnosticSink::merge`].
    #[must_use]
    pub fn branch(&self) -> Self {
        Self {
            diagnostics: Vec::new(),
            seen: FxHashSet::default(),
            inherited_errors: self.inherited_errors + self.error_count,
            error_count: 0,
            max_errors: self.max_errors,
            fatal: false,
            warnings_as_errors: self.warnings_as_errors,
        }
    }

    /// Keep a branch: its diagnostics are logged here in their original order.
    pub fn merge(&mut self, branch: Self) {
        for diag in branch.diagnostics {
            self.log(diag);
        }
    }

    #[must_use]
    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    #[must_use]
    pub fn into_diagnostics(self) -> Vec<Diagnostic> {
        self.diagnostics
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.diagnostics.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.diagnostics.is_empty()
    }

    /// Number of `Error` and `Fatal` diagnostics in this sink.
    #[must_use]
    pub const fn error_count(&self) -> usize {
        self.error_count
    }

    #[must_use]
    pub const fn has_errors(&self) -> bool {
        self.error_count > 0
    }

    #[must_use]
    pub const fn has_fatal(&self) -> bool {
        self.fatal
    }

    #[must_use]
    pub const fn max_errors(&self) -> usize {
        self.max_errors
    }

    /// Whether the caller should stop: a fatal diagnostic was logged or the
    /// error limit was reached (counting the sinks this one branched from).
    #[must_use]
    pub const fn is_abort_desired(&self) -> bool {
        self.fatal || self.inherited_errors + self.error_count >= self.max_errors
    }

    /// Number of diagnostics with the given code.
    #[must_use]
    pub fn count_code(&self, code: u32) -> usize {
        self.diagnostics.iter().filter(|d| d.code == code).count()
    }
}
