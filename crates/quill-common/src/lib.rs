//! Common types for the quill semantic analysis core.
//!
//! This crate provides the foundational types shared by every quill crate:
//! - Diagnostics (`Diagnostic`, `DiagnosticCategory`, message table)
//! - The branching diagnostic sink (`DiagnosticSink`)
//! - AST node handles (`NodeId`)
//! - Centralized limits and thresholds

// Diagnostic types, codes and message templates
pub mod diagnostics;
pub use diagnostics::{
    Diagnostic, DiagnosticCategory, DiagnosticMessage, DiagnosticRelatedInformation,
    diagnostic_codes, format_message,
};

// Error sink with speculative branches
pub mod sink;
pub use sink::DiagnosticSink;

// Node handles shared between the driver, resolver and front ends
pub mod node;
pub use node::NodeId;

// Centralized limits and thresholds
pub mod limits;
