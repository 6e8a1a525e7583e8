//! quill: the semantic analysis core of a compiler.
//!
//! The crates are layered bottom-up:
//!
//! | Crate | Role |
//! |-------|------|
//! | [`common`] | diagnostics, the branching sink, node handles, limits |
//! | [`decl`] | the declaration tree: members, contributions, typedefs, implicit names |
//! | [`resolver`] | resumable per-name resolution |
//! | [`flow`] | flow-sensitive validation scopes |
//! | [`driver`] | the four-pass fixpoint driver |
//! | [`model`] | a JSON front end implementing every driver hook |

pub use quill_common as common;
pub use quill_decl as decl;
pub use quill_driver as driver;
pub use quill_flow as flow;
pub use quill_model as model;
pub use quill_resolver as resolver;

pub use quill_common::{Diagnostic, DiagnosticCategory, DiagnosticSink, NodeId};
pub use quill_driver::{CompilationDriver, CompileReport, DriverError, DriverOptions, Pass};
pub use quill_model::{Model, compile};
