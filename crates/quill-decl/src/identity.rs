//! Identities of declared entities.
//!
//! | Identity | Meaning |
//! |----------|---------|
//! | `Decl(id)` | a declaration in the tree |
//! | `FormalChild { formal, name }` | a formal type reached through another formal type, e.g. `Map.Key` |

use serde::{Deserialize, Serialize};

/// Index of a declaration in a [`crate::DeclTree`].
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct DeclId(pub u32);

impl DeclId {
    #[inline]
    #[must_use]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

/// Comparable handle for a declared entity.
///
/// An identity is concrete once it exists: unresolved references are never
/// represented as identities, they are pending slots in the tree instead.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize)]
pub enum Identity {
    Decl(DeclId),
    FormalChild { formal: DeclId, name: String },
}

impl Identity {
    /// The declaration this identity names directly, if any.
    #[must_use]
    pub const fn decl(&self) -> Option<DeclId> {
        match self {
            Self::Decl(id) => Some(*id),
            Self::FormalChild { .. } => None,
        }
    }
}

impl From<DeclId> for Identity {
    fn from(id: DeclId) -> Self {
        Self::Decl(id)
    }
}

/// Kind of a declared entity.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeclKind {
    Module,
    Package,
    Class,
    Property,
    Method,
    TypeParameter,
    Typedef,
}

impl DeclKind {
    /// Whether entities of this kind may contain named children.
    #[must_use]
    pub const fn is_container(self) -> bool {
        matches!(self, Self::Module | Self::Package | Self::Class)
    }
}

/// Visibility of a member, ordered from least to most permissive lookup.
#[derive(
    Copy, Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Access {
    #[default]
    Public,
    Protected,
    Private,
}

impl Access {
    /// Whether a lookup made with `self` may see a member declared with `member`.
    #[must_use]
    pub fn permits(self, member: Self) -> bool {
        member <= self
    }
}
