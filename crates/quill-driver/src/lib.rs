//! The compilation driver for the quill semantic analysis core.
//!
//! [`CompilationDriver`] runs four ordered passes ([`Pass`]) over a front
//! end's [`CompilationUnit`]. Nodes that cannot finish a pass yet defer and
//! are retried on the next sweep, which is what lets declarations refer to
//! each other independent of source order. A pass ends when every node is done
//! or a whole sweep changes nothing.

pub mod pass;
pub use pass::{Pass, PassOutcome, Stage, UnknownPass};

pub mod options;
pub use options::DriverOptions;

pub mod error;
pub use error::DriverError;

pub mod unit;
pub use unit::{CompilationUnit, PassContext};

pub mod driver;
pub use driver::{CompilationDriver, CompileReport, NodeFlags, PassReport};
