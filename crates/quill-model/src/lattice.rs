//! Class types as narrowing types.
//!
//! A [`TypeRef`] packs a class declaration and a nullable bit
//! (`decl << 1 | nullable`); `Null` itself is [`NULL_TYPE`]. Subtyping follows
//! supertype contributions (through typedefs) with `Object` at the top, and a
//! nullable type contains its non-nullable counterpart and `Null`.

use rustc_hash::FxHashSet;

use quill_common::limits::MAX_ALIAS_CHAIN;
use quill_decl::{ChainEnd, DeclId, DeclTree, Identity};
use quill_flow::{TypeLattice, TypeRef};

pub const NULL_TYPE: TypeRef = TypeRef(u32::MAX);

#[must_use]
pub const fn type_ref(decl: DeclId, nullable: bool) -> TypeRef {
    TypeRef((decl.0 << 1) | nullable as u32)
}

#[must_use]
pub const fn is_nullable(ty: TypeRef) -> bool {
    ty.0 == NULL_TYPE.0 || ty.0 & 1 == 1
}

#[must_use]
pub const fn non_null(ty: TypeRef) -> TypeRef {
    TypeRef(ty.0 & !1)
}

const fn decl_of(ty: TypeRef) -> Option<DeclId> {
    if ty.0 == NULL_TYPE.0 {
        None
    } else {
        Some(DeclId(ty.0 >> 1))
    }
}

pub struct ModelLattice<'t> {
    tree: &'t DeclTree,
}

impl<'t> ModelLattice<'t> {
    #[must_use]
    pub const fn new(tree: &'t DeclTree) -> Self {
        Self { tree }
    }

    /// The narrowing type for a resolved declared type. Formal types stand
    /// for their constraint.
    #[must_use]
    pub fn type_of(&self, identity: &Identity, nullable: bool) -> Option<TypeRef> {
        let decl = match self.tree.follow_typedefs(identity) {
            ChainEnd::Decl(decl) => decl,
            ChainEnd::Formal(_) | ChainEnd::Pending | ChainEnd::Cyclic => return None,
        };
        let decl = match self.tree.follow_bounds(decl) {
            ChainEnd::Decl(decl) => decl,
            _ => return None,
        };
        Some(type_ref(decl, nullable))
    }

    /// Render a narrowing type (`core.Int?`, `Null`).
    #[must_use]
    pub fn display(&self, ty: TypeRef) -> String {
        match decl_of(ty) {
            None => "Null".to_string(),
            Some(decl) => {
                let name = self.tree.qualified_name(decl);
                if is_nullable(ty) { format!("{name}?") } else { name }
            }
        }
    }

    fn is_subclass(&self, sub: DeclId, sup: DeclId) -> bool {
        if sub == sup || self.tree.implicit("Object") == Some(sup) {
            return true;
        }
        let mut seen = FxHashSet::default();
        let mut work = vec![sub];
        while let Some(current) = work.pop() {
            if !seen.insert(current) || seen.len() > MAX_ALIAS_CHAIN * 4 {
                continue;
            }
            let Some(decl) = self.tree.get(current) else {
                continue;
            };
            for contribution in decl.contributions().iter().flatten() {
                if let ChainEnd::Decl(next) = self.tree.follow_typedefs(contribution) {
                    if next == sup {
                        return true;
                    }
                    work.push(next);
                }
            }
        }
        false
    }
}

impl TypeLattice for ModelLattice<'_> {
    fn is_a(&self, sub: TypeRef, sup: TypeRef) -> bool {
        if sub == sup {
            return true;
        }
        match (decl_of(sub), decl_of(sup)) {
            (None, _) => is_nullable(sup),
            (Some(_), None) => false,
            (Some(a), Some(b)) => {
                (!is_nullable(sub) || is_nullable(sup)) && self.is_subclass(a, b)
            }
        }
    }

    fn intersect(&self, a: TypeRef, b: TypeRef) -> Option<TypeRef> {
        if self.is_a(a, b) {
            Some(a)
        } else if self.is_a(b, a) {
            Some(b)
        } else {
            None
        }
    }
}

#[cfg(test)]
#[path = "../tests/lattice_tests.rs"]
mod tests;
