//! Declaration tree for the quill semantic analysis core.
//!
//! The tree is the store the name resolver walks: a hierarchy of modules,
//! packages, classes, properties, methods, type parameters and typedefs, each
//! with a stable [`DeclId`]. Facts are only ever added to the tree (a pending
//! contribution, bound or typedef target is filled at most once), which is what
//! lets the driver repeat a pass until it converges.

pub mod identity;
pub use identity::{Access, DeclId, DeclKind, Identity};

pub mod tree;
pub use tree::{ChainEnd, Decl, DeclError, DeclTree, Resolution, ResolutionCollector};

pub mod implicit;
pub use implicit::{DEFAULT_IMPLICITS, ImplicitNames};
