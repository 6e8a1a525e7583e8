use thiserror::Error;

use quill_flow::FlowError;

use crate::pass::Pass;

/// Driver-level failures. User errors are diagnostics, not `DriverError`s.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DriverError {
    #[error("{pass} did not converge after {sweeps} sweeps ({pending} nodes pending)")]
    NotConverged {
        pass: Pass,
        sweeps: u32,
        pending: usize,
    },

    #[error("compilation aborted during {0}")]
    Aborted(Pass),

    #[error("compilation failed with {0} error(s)")]
    Failed(usize),

    #[error("unbalanced validation scopes: {0}")]
    Flow(#[from] FlowError),

    #[error("{0}")]
    Internal(String),
}
