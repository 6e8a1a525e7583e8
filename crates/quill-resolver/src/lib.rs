//! Qualified-name resolution for the quill semantic analysis core.
//!
//! A [`NameResolver`] turns a dotted name (`a.b.C`) written at some AST node
//! into an [`quill_decl::Identity`]. Resolution is a resumable state machine:
//! whenever an answer depends on work that has not happened yet (a class that
//! is not registered, an import that is still resolving, a typedef whose target
//! is pending) the resolver returns [`ResolveResult::Deferred`] and picks up at
//! the same stage on the next driver sweep.
//!
//! The resolver sees the program only through the [`NameScope`] trait and keeps
//! its mutable state in a [`ResolverTable`] owned by the driver.

mod collector;

pub mod scope;
pub use scope::{Component, ImportBinding, NameScope};

pub mod resolver;
pub use resolver::{Goal, NameResolver, ResolveResult, Target, TypeMode};

pub mod table;
pub use table::ResolverTable;
