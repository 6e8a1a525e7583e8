//! Flow-sensitive validation for the quill semantic analysis core.
//!
//! While a front end validates a method body it keeps one
//! [`ValidationContext`]: a stack of scopes that knows, at every point, which
//! local variables are definitely assigned ([`Assignment`]), which have a
//! narrower type than declared, whether the point is reachable, and where
//! `break`/`continue` go.

pub mod assignment;
pub use assignment::{Assignment, AssignmentStatus, Facts};

pub mod narrowing;
pub use narrowing::{Branch, TypeLattice, TypeRef};

pub mod context;
pub use context::{
    FlowError, JumpDelta, JumpKind, ScopeKind, ScopeToken, ValidationContext, VarInfo, VarStorage,
};
