//! Branches and the type vocabulary used for narrowing.

use std::fmt;

/// Which outcome of the enclosing condition a fact belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Branch {
    Always,
    WhenTrue,
    WhenFalse,
}

impl Branch {
    #[must_use]
    pub const fn of(when_true: bool) -> Self {
        if when_true {
            Self::WhenTrue
        } else {
            Self::WhenFalse
        }
    }

    #[must_use]
    pub const fn complement(self) -> Self {
        match self {
            Self::Always => Self::Always,
            Self::WhenTrue => Self::WhenFalse,
            Self::WhenFalse => Self::WhenTrue,
        }
    }

    pub(crate) const fn index(self) -> usize {
        match self {
            Self::Always => 0,
            Self::WhenTrue => 1,
            Self::WhenFalse => 2,
        }
    }
}

/// Opaque handle for a type owned by the front end.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeRef(pub u32);

impl fmt::Display for TypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "type#{}", self.0)
    }
}

/// Subtyping questions the context needs answered to narrow and widen.
pub trait TypeLattice {
    /// Whether every value of `sub` is also a value of `sup`.
    fn is_a(&self, sub: TypeRef, sup: TypeRef) -> bool;

    /// The type of values belonging to both `a` and `b`, if it exists.
    fn intersect(&self, a: TypeRef, b: TypeRef) -> Option<TypeRef>;
}

/// The wider of two types, if one contains the other.
pub(crate) fn wider(lattice: &dyn TypeLattice, a: TypeRef, b: TypeRef) -> Option<TypeRef> {
    if a == b || lattice.is_a(b, a) {
        Some(a)
    } else if lattice.is_a(a, b) {
        Some(b)
    } else {
        None
    }
}
