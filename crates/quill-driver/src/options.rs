//! Driver configuration.

use serde::{Deserialize, Serialize};

use quill_common::DiagnosticSink;
use quill_common::limits::{DEFAULT_MAX_ERRORS, MAX_RESOLVE_SWEEPS};

use crate::pass::Pass;

/// Knobs for one compilation. Every field has a default, so a config file
/// may set any subset of them.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DriverOptions {
    /// Sweeps allowed per pass before pending nodes are forced.
    pub max_sweeps: u32,
    /// Error count at which the driver stops.
    pub max_errors: usize,
    /// Last pass to run; later passes are skipped.
    pub stop_after: Option<Pass>,
    pub warnings_as_errors: bool,
}

impl Default for DriverOptions {
    fn default() -> Self {
        Self {
            max_sweeps: MAX_RESOLVE_SWEEPS,
            max_errors: DEFAULT_MAX_ERRORS,
            stop_after: None,
            warnings_as_errors: false,
        }
    }
}

impl DriverOptions {
    /// A sink configured with this compilation's error limit and warning mode.
    #[must_use]
    pub fn new_sink(&self) -> DiagnosticSink {
        let mut sink = DiagnosticSink::with_limit(self.max_errors);
        sink.set_warnings_as_errors(self.warnings_as_errors);
        sink
    }

    /// Whether `pass` runs at all under these options.
    #[must_use]
    pub fn runs(&self, pass: Pass) -> bool {
        self.stop_after.is_none_or(|last| pass <= last)
    }
}
