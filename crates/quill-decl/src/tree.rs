//! Arena-backed declaration tree.
//!
//! Entities are stored in a flat `Vec<Decl>` indexed by [`DeclId`]. Each entity
//! keeps its children by name in insertion order; several children registered
//! under one name form an ambiguous composite that lookups report through
//! [`ResolutionCollector::ambiguous`].

use indexmap::IndexMap;
use rustc_hash::FxHashMap;
use smallvec::SmallVec;
use tracing::trace;

use quill_common::limits::MAX_ALIAS_CHAIN;

use crate::identity::{Access, DeclId, DeclKind, Identity};
use crate::implicit::ImplicitNames;

// =============================================================================
// Lookup protocol
// =============================================================================

/// Answer of a single [`DeclTree::resolve_name`] step.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Resolution {
    /// The collector accepted a match; stop looking.
    Resolved,
    /// Nothing with that name here; keep looking outward.
    Unknown,
    /// Nothing found yet, but a pending contribution might still supply it.
    Possible,
    /// A hard error was reported (for example an ambiguous name).
    Error,
}

/// Receives the matches found by [`DeclTree::resolve_name`].
pub trait ResolutionCollector {
    /// A single visible entity matched.
    fn resolved_decl(&mut self, tree: &DeclTree, decl: DeclId) -> Resolution;

    /// Several distinct visible entities matched.
    fn ambiguous(&mut self, tree: &DeclTree, name: &str, candidates: &[DeclId]) -> Resolution;
}

/// Misuse of the tree's mutation API.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DeclError {
    #[error("declaration {0:?} does not exist")]
    UnknownDecl(DeclId),
    #[error("{kind:?} `{name}` cannot hold this fact")]
    WrongKind { name: String, kind: DeclKind },
    #[error("`{name}` is already resolved")]
    AlreadyResolved { name: String },
}

// =============================================================================
// Declarations
// =============================================================================

/// A declared entity.
#[derive(Clone, Debug)]
pub struct Decl {
    pub name: String,
    pub kind: DeclKind,
    pub access: Access,
    pub parent: Option<DeclId>,
    /// Generic type property (`Element` in `List<Element>`).
    pub formal: bool,
    children: IndexMap<String, SmallVec<[DeclId; 1]>>,
    /// Supertypes; `None` while the contribution's name is unresolved.
    contributions: Vec<Option<Identity>>,
    /// Constraint of a formal property or type parameter; `None` while pending.
    bound: Option<Identity>,
    /// Aliased type of a typedef; `None` while pending.
    target: Option<Identity>,
}

impl Decl {
    fn new(name: &str, kind: DeclKind, access: Access, parent: Option<DeclId>) -> Self {
        Self {
            name: name.to_string(),
            kind,
            access,
            parent,
            formal: kind == DeclKind::TypeParameter,
            children: IndexMap::new(),
            contributions: Vec::new(),
            bound: None,
            target: None,
        }
    }

    /// Whether this entity is a formal type (type parameter or formal property).
    #[must_use]
    pub const fn is_formal_type(&self) -> bool {
        self.formal && matches!(self.kind, DeclKind::Property | DeclKind::TypeParameter)
    }

    #[must_use]
    pub const fn bound(&self) -> Option<&Identity> {
        self.bound.as_ref()
    }

    #[must_use]
    pub const fn target(&self) -> Option<&Identity> {
        self.target.as_ref()
    }

    #[must_use]
    pub fn contributions(&self) -> &[Option<Identity>] {
        &self.contributions
    }

    /// Children registered under `name` (more than one means ambiguous).
    #[must_use]
    pub fn children_named(&self, name: &str) -> &[DeclId] {
        self.children.get(name).map_or(&[], |ids| ids.as_slice())
    }

    pub fn child_names(&self) -> impl Iterator<Item = &str> {
        self.children.keys().map(String::as_str)
    }
}

/// Where following a formal bound or a typedef chain ended up.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ChainEnd {
    /// A declaration that is neither a typedef nor a formal type.
    Decl(DeclId),
    /// A formal child identity; it has no declaration of its own.
    Formal(Identity),
    /// Some link of the chain is still pending.
    Pending,
    /// The chain is longer than `MAX_ALIAS_CHAIN` (treated as cyclic).
    Cyclic,
}

// =============================================================================
// DeclTree
// =============================================================================

/// The hierarchical store of declared entities.
#[derive(Clone, Debug, Default)]
pub struct DeclTree {
    decls: Vec<Decl>,
    roots: IndexMap<String, DeclId>,
    implicits: FxHashMap<String, DeclId>,
}

impl DeclTree {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.decls.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.decls.is_empty()
    }

    #[must_use]
    pub fn get(&self, id: DeclId) -> Option<&Decl> {
        self.decls.get(id.index())
    }

    fn get_mut(&mut self, id: DeclId) -> Result<&mut Decl, DeclError> {
        self.decls
            .get_mut(id.index())
            .ok_or(DeclError::UnknownDecl(id))
    }

    #[must_use]
    pub fn kind(&self, id: DeclId) -> Option<DeclKind> {
        self.get(id).map(|d| d.kind)
    }

    #[must_use]
    pub fn root(&self, name: &str) -> Option<DeclId> {
        self.roots.get(name).copied()
    }

    pub fn roots(&self) -> impl Iterator<Item = DeclId> + '_ {
        self.roots.values().copied()
    }

    // -------------------------------------------------------------------------
    // Registration
    // -------------------------------------------------------------------------

    /// Register a top-level module. Registering the same name twice returns
    /// the existing module.
    pub fn add_module(&mut self, name: &str) -> DeclId {
        if let Some(&id) = self.roots.get(name) {
            return id;
        }
        let id = self.push(Decl::new(name, DeclKind::Module, Access::Public, None));
        self.roots.insert(name.to_string(), id);
        id
    }

    /// Register a child entity. A second child with the same name is kept
    /// alongside the first; lookups then report the name as ambiguous.
    pub fn add_child(
        &mut self,
        parent: DeclId,
        name: &str,
        kind: DeclKind,
        access: Access,
    ) -> Result<DeclId, DeclError> {
        let parent_decl = self.get(parent).ok_or(DeclError::UnknownDecl(parent))?;
        if !parent_decl.kind.is_container() && kind != DeclKind::TypeParameter {
            return Err(DeclError::WrongKind {
                name: parent_decl.name.clone(),
                kind: parent_decl.kind,
            });
        }
        let id = self.push(Decl::new(name, kind, access, Some(parent)));
        self.get_mut(parent)?
            .children
            .entry(name.to_string())
            .or_default()
            .push(id);
        trace!(parent = parent.0, id = id.0, name, ?kind, "declaration registered");
        Ok(id)
    }

    fn push(&mut self, decl: Decl) -> DeclId {
        let id = DeclId(self.decls.len() as u32);
        self.decls.push(decl);
        id
    }

    /// Mark a property as a formal (generic) type property.
    pub fn set_formal(&mut self, id: DeclId) -> Result<(), DeclError> {
        let decl = self.get_mut(id)?;
        if decl.kind != DeclKind::Property {
            return Err(DeclError::WrongKind {
                name: decl.name.clone(),
                kind: decl.kind,
            });
        }
        decl.formal = true;
        Ok(())
    }

    /// Add a pending contribution (supertype) slot to a class.
    pub fn add_contribution(&mut self, class: DeclId) -> Result<usize, DeclError> {
        let decl = self.get_mut(class)?;
        if decl.kind != DeclKind::Class {
            return Err(DeclError::WrongKind {
                name: decl.name.clone(),
                kind: decl.kind,
            });
        }
        decl.contributions.push(None);
        Ok(decl.contributions.len() - 1)
    }

    /// Fill a contribution slot.
    pub fn set_contribution(
        &mut self,
        class: DeclId,
        slot: usize,
        identity: Identity,
    ) -> Result<(), DeclError> {
        let decl = self.get_mut(class)?;
        let name = decl.name.clone();
        match decl.contributions.get_mut(slot) {
            Some(entry) => set_once(entry, identity, &name),
            None => Err(DeclError::WrongKind {
                name,
                kind: DeclKind::Class,
            }),
        }
    }

    /// Set the constraint of a formal type.
    pub fn set_bound(&mut self, id: DeclId, identity: Identity) -> Result<(), DeclError> {
        let decl = self.get_mut(id)?;
        if !decl.is_formal_type() {
            return Err(DeclError::WrongKind {
                name: decl.name.clone(),
                kind: decl.kind,
            });
        }
        set_once(&mut decl.bound, identity, &decl.name)
    }

    /// Set the aliased type of a typedef.
    pub fn set_target(&mut self, id: DeclId, identity: Identity) -> Result<(), DeclError> {
        let decl = self.get_mut(id)?;
        if decl.kind != DeclKind::Typedef {
            return Err(DeclError::WrongKind {
                name: decl.name.clone(),
                kind: decl.kind,
            });
        }
        set_once(&mut decl.target, identity, &decl.name)
    }

    // -------------------------------------------------------------------------
    // Implicit names
    // -------------------------------------------------------------------------

    /// Bind every entry of `table` whose path exists in the tree. Returns the
    /// number of names bound.
    pub fn bind_implicits(&mut self, table: &ImplicitNames) -> usize {
        let mut bound = 0;
        for (name, path) in table.iter() {
            if let Some(id) = self.find_path(path) {
                self.implicits.insert(name.to_string(), id);
                bound += 1;
            }
        }
        bound
    }

    pub fn register_implicit(&mut self, name: &str, id: DeclId) {
        self.implicits.insert(name.to_string(), id);
    }

    /// Look up an implicitly available name. Top-level modules are always
    /// visible by their own name.
    #[must_use]
    pub fn implicit(&self, name: &str) -> Option<DeclId> {
        self.implicits
            .get(name)
            .copied()
            .or_else(|| self.root(name))
    }

    // -------------------------------------------------------------------------
    // Queries
    // -------------------------------------------------------------------------

    /// Find a declaration by dotted path from a root module (`core.Int`).
    /// Ambiguous segments do not match.
    #[must_use]
    pub fn find_path(&self, path: &str) -> Option<DeclId> {
        let mut segments = path.split('.');
        let mut current = self.root(segments.next()?)?;
        for segment in segments {
            match self.get(current)?.children_named(segment) {
                [only] => current = *only,
                _ => return None,
            }
        }
        Some(current)
    }

    /// Dotted path of a declaration from its root module.
    #[must_use]
    pub fn qualified_name(&self, id: DeclId) -> String {
        let mut parts = Vec::new();
        let mut current = Some(id);
        while let Some(cur) = current {
            let Some(decl) = self.get(cur) else { break };
            parts.push(decl.name.as_str());
            current = decl.parent;
        }
        parts.reverse();
        parts.join(".")
    }

    /// Human-readable rendering of an identity.
    #[must_use]
    pub fn display(&self, identity: &Identity) -> String {
        match identity {
            Identity::Decl(id) => self.qualified_name(*id),
            Identity::FormalChild { formal, name } => {
                format!("{}.{name}", self.qualified_name(*formal))
            }
        }
    }

    /// The outermost class enclosing `id` (or `id` itself when it is not
    /// nested in a class). Lookups are private up to this boundary.
    #[must_use]
    pub fn outermost_class(&self, id: DeclId) -> DeclId {
        let mut current = id;
        let mut outermost = None;
        for _ in 0..MAX_ALIAS_CHAIN * 4 {
            let Some(decl) = self.get(current) else { break };
            if decl.kind == DeclKind::Class {
                outermost = Some(current);
            }
            match decl.parent {
                Some(parent) => current = parent,
                None => break,
            }
        }
        outermost.unwrap_or(id)
    }

    /// Resolve `name` as a member of `id`, reporting matches to `collector`.
    ///
    /// Own children are checked first; then each contribution, with at most
    /// protected access. A pending contribution turns an otherwise unknown
    /// answer into [`Resolution::Possible`].
    pub fn resolve_name(
        &self,
        id: DeclId,
        name: &str,
        access: Access,
        collector: &mut dyn ResolutionCollector,
    ) -> Resolution {
        self.resolve_name_at_depth(id, name, access, collector, 0)
    }

    fn resolve_name_at_depth(
        &self,
        id: DeclId,
        name: &str,
        access: Access,
        collector: &mut dyn ResolutionCollector,
        depth: usize,
    ) -> Resolution {
        if depth > MAX_ALIAS_CHAIN {
            return Resolution::Unknown;
        }
        let Some(decl) = self.get(id) else {
            return Resolution::Unknown;
        };

        let visible: SmallVec<[DeclId; 2]> = decl
            .children_named(name)
            .iter()
            .copied()
            .filter(|child| self.get(*child).is_some_and(|c| access.permits(c.access)))
            .collect();
        match visible.as_slice() {
            [] => {}
            [only] => return collector.resolved_decl(self, *only),
            many => return collector.ambiguous(self, name, many),
        }

        let mut possible = false;
        let inherited = access.min(Access::Protected);
        for contribution in &decl.contributions {
            let Some(identity) = contribution else {
                possible = true;
                continue;
            };
            let target = match self.follow_typedefs(identity) {
                ChainEnd::Decl(target) => target,
                ChainEnd::Pending => {
                    possible = true;
                    continue;
                }
                ChainEnd::Formal(_) | ChainEnd::Cyclic => continue,
            };
            match self.resolve_name_at_depth(target, name, inherited, collector, depth + 1) {
                Resolution::Unknown => {}
                Resolution::Possible => possible = true,
                done @ (Resolution::Resolved | Resolution::Error) => return done,
            }
        }

        if possible {
            Resolution::Possible
        } else {
            Resolution::Unknown
        }
    }

    /// Follow typedef targets from `identity` until a non-typedef is reached.
    #[must_use]
    pub fn follow_typedefs(&self, identity: &Identity) -> ChainEnd {
        let mut current = identity.clone();
        for _ in 0..MAX_ALIAS_CHAIN {
            let id = match &current {
                Identity::Decl(id) => *id,
                Identity::FormalChild { .. } => return ChainEnd::Formal(current),
            };
            let Some(decl) = self.get(id) else {
                return ChainEnd::Pending;
            };
            if decl.kind != DeclKind::Typedef {
                return ChainEnd::Decl(id);
            }
            match &decl.target {
                Some(next) => current = next.clone(),
                None => return ChainEnd::Pending,
            }
        }
        ChainEnd::Cyclic
    }

    /// Follow the constraint of a formal type (and typedefs along the way)
    /// until a concrete declaration is reached.
    #[must_use]
    pub fn follow_bounds(&self, formal: DeclId) -> ChainEnd {
        let mut current = formal;
        for _ in 0..MAX_ALIAS_CHAIN {
            let Some(decl) = self.get(current) else {
                return ChainEnd::Pending;
            };
            if !decl.is_formal_type() {
                return ChainEnd::Decl(current);
            }
            let Some(bound) = &decl.bound else {
                return ChainEnd::Pending;
            };
            match self.follow_typedefs(bound) {
                ChainEnd::Decl(next) => current = next,
                other => return other,
            }
        }
        ChainEnd::Cyclic
    }

    /// Whether `identity` has no unresolved dependencies left: every typedef
    /// on its alias chain has a target.
    #[must_use]
    pub fn is_settled(&self, identity: &Identity) -> bool {
        matches!(
            self.follow_typedefs(identity),
            ChainEnd::Decl(_) | ChainEnd::Formal(_)
        )
    }
}

fn set_once(slot: &mut Option<Identity>, identity: Identity, name: &str) -> Result<(), DeclError> {
    match slot {
        None => {
            *slot = Some(identity);
            Ok(())
        }
        Some(existing) if *existing == identity => Ok(()),
        Some(_) => Err(DeclError::AlreadyResolved {
            name: name.to_string(),
        }),
    }
}
