//! A reference front end for the quill semantic analysis core.
//!
//! Programs are JSON documents ([`program`]) lowered into an arena AST
//! ([`ast`]). [`Model`] implements every driver hook over that AST: it
//! registers declarations, resolves each written name with its own
//! resolver, validates method bodies and emits a textual listing.
//!
//! ```no_run
//! use quill_driver::DriverOptions;
//! use quill_model::{Model, compile};
//!
//! let mut model = Model::from_json(r#"{ "modules": [{ "name": "app" }] }"#)?;
//! let (report, errs) = compile(&mut model, &DriverOptions::default());
//! assert!(report.success && errs.is_empty());
//! # Ok::<(), quill_model::ModelError>(())
//! ```

use quill_common::DiagnosticSink;
use quill_driver::{CompilationDriver, CompileReport, DriverOptions};

pub mod program;
pub use program::{Expr, ImportSpec, ItemSpec, ModuleSpec, ParamSpec, ProgramSpec, Stmt, TypeParamSpec};

pub mod ast;
pub use ast::{Ast, AstNode, NodeKind, RefRole, TypeUse};

pub mod error;
pub use error::ModelError;

pub mod lattice;
pub use lattice::ModelLattice;

pub mod body;
pub use body::BodyValidator;

pub mod model;
pub use model::Model;

/// Run every pass over `model` with a fresh driver and sink.
pub fn compile(model: &mut Model, options: &DriverOptions) -> (CompileReport, DiagnosticSink) {
    let mut errs = options.new_sink();
    let mut driver = CompilationDriver::new(options.clone());
    let report = driver.run(model, &mut errs);
    (report, errs)
}
