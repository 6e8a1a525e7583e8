//! The program model: an [`Ast`] plus the declaration tree it registers,
//! driven through the four passes.
//!
//! | Pass | Work |
//! |------|------|
//! | register | one declaration per declaring node, supertype slots, formal flags |
//! | resolve | implicit names bound at the program node; one resolver per import and name node, results written back |
//! | validate | method bodies through [`BodyValidator`] |
//! | emit | one listing line per user declaration |

use rustc_hash::FxHashMap;
use tracing::debug;

use quill_common::NodeId;
use quill_decl::{DEFAULT_IMPLICITS, DeclError, DeclId, DeclKind, DeclTree, Identity};
use quill_driver::{CompilationUnit, DriverError, Pass, PassContext, PassOutcome};
use quill_resolver::{Component, ImportBinding, NameResolver, NameScope, ResolveResult};

use crate::ast::{Ast, AstNode, NodeKind, RefRole, TypeUse};
use crate::body::BodyValidator;
use crate::error::ModelError;
use crate::lattice::ModelLattice;
use crate::program::ProgramSpec;

fn internal(err: DeclError) -> DriverError {
    DriverError::Internal(err.to_string())
}

#[derive(Clone, Debug)]
pub struct Model {
    ast: Ast,
    tree: DeclTree,
    decls: FxHashMap<NodeId, DeclId>,
    /// Resolved declared types, keyed by their name node.
    types: FxHashMap<NodeId, Identity>,
    listing: Vec<String>,
}

impl Model {
    pub fn new(spec: &ProgramSpec) -> Result<Self, ModelError> {
        Ok(Self {
            ast: Ast::lower(spec)?,
            tree: DeclTree::new(),
            decls: FxHashMap::default(),
            types: FxHashMap::default(),
            listing: Vec::new(),
        })
    }

    pub fn from_json(text: &str) -> Result<Self, ModelError> {
        let spec: ProgramSpec = serde_json::from_str(text)?;
        Self::new(&spec)
    }

    #[must_use]
    pub const fn ast(&self) -> &Ast {
        &self.ast
    }

    #[must_use]
    pub const fn tree(&self) -> &DeclTree {
        &self.tree
    }

    /// The declaration registered for a declaring node.
    #[must_use]
    pub fn decl(&self, node: NodeId) -> Option<DeclId> {
        self.decls.get(&node).copied()
    }

    /// The declaration registered under a qualified name (`app.Point`).
    #[must_use]
    pub fn decl_named(&self, path: &str) -> Option<DeclId> {
        self.ast.find(path).and_then(|node| self.decl(node))
    }

    /// The resolved type of a declared-type name node.
    #[must_use]
    pub fn type_of(&self, node: NodeId) -> Option<&Identity> {
        self.types.get(&node)
    }

    /// Lines produced by the emit pass.
    #[must_use]
    pub fn listing(&self) -> &[String] {
        &self.listing
    }

    fn node(&self, id: NodeId) -> Result<&AstNode, DriverError> {
        self.ast
            .get(id)
            .ok_or_else(|| DriverError::Internal(format!("unknown node {id}")))
    }

    fn parent_decl(&self, id: NodeId) -> Result<DeclId, DriverError> {
        self.ast
            .parent(id)
            .and_then(|parent| self.decl(parent))
            .ok_or_else(|| {
                DriverError::Internal(format!(
                    "{} has no registered parent",
                    self.ast.qualified_name(id)
                ))
            })
    }

    // =========================================================================
    // Passes
    // =========================================================================

    fn register(&mut self, id: NodeId) -> Result<(), DriverError> {
        let node = self.node(id)?;
        let (name, access) = (node.name.clone(), node.access);
        let (kind, contributions, formal) = match node.kind {
            NodeKind::Program | NodeKind::Import { .. } | NodeKind::NameRef { .. } => {
                return Ok(());
            }
            NodeKind::Module => (DeclKind::Module, 0, false),
            NodeKind::Package => (DeclKind::Package, 0, false),
            NodeKind::Class { contributions } => (DeclKind::Class, contributions, false),
            NodeKind::TypeParameter => (DeclKind::TypeParameter, 0, false),
            NodeKind::Typedef => (DeclKind::Typedef, 0, false),
            NodeKind::Property { formal, .. } => (DeclKind::Property, 0, formal),
            NodeKind::Method { .. } => (DeclKind::Method, 0, false),
        };

        let decl = if kind == DeclKind::Module {
            self.tree.add_module(&name)
        } else {
            let parent = self.parent_decl(id)?;
            let decl = self
                .tree
                .add_child(parent, &name, kind, access)
                .map_err(internal)?;
            for _ in 0..contributions {
                self.tree.add_contribution(decl).map_err(internal)?;
            }
            if formal {
                self.tree.set_formal(decl).map_err(internal)?;
            }
            decl
        };
        self.decls.insert(id, decl);
        Ok(())
    }

    /// Record what the name node `id` resolved to.
    fn write_back(
        &mut self,
        id: NodeId,
        role: RefRole,
        identity: Identity,
    ) -> Result<(), DriverError> {
        if matches!(
            role,
            RefRole::PropertyType | RefRole::ParamType | RefRole::LocalType
        ) {
            self.types.insert(id, identity);
            return Ok(());
        }
        let owner = self.parent_decl(id)?;
        match role {
            RefRole::Contribution(slot) => self.tree.set_contribution(owner, slot, identity),
            RefRole::Bound => self.tree.set_bound(owner, identity),
            RefRole::Target => self.tree.set_target(owner, identity),
            RefRole::PropertyType | RefRole::ParamType | RefRole::LocalType => Ok(()),
        }
        .map_err(internal)
    }

    fn resolve(
        &mut self,
        id: NodeId,
        ctx: &mut PassContext<'_>,
    ) -> Result<PassOutcome, DriverError> {
        if id == Ast::ROOT {
            let bound = self.tree.bind_implicits(&DEFAULT_IMPLICITS);
            debug!(bound, "implicit names bound");
            return Ok(PassOutcome::Done);
        }
        let role = match &self.node(id)?.kind {
            NodeKind::Import { path } => {
                if !ctx.resolvers.contains(id) {
                    ctx.resolvers.ensure(NameResolver::new(id, path.clone()));
                }
                None
            }
            NodeKind::NameRef { role, path } => {
                if !ctx.resolvers.contains(id) {
                    ctx.resolvers
                        .ensure(NameResolver::for_type(id, path.clone()));
                }
                Some(*role)
            }
            _ => return Ok(PassOutcome::Done),
        };

        match ctx.resolvers.resolve(id, &*self, ctx.errs) {
            ResolveResult::Resolved => {
                if let Some(role) = role {
                    let identity = ctx
                        .resolvers
                        .get(id)
                        .and_then(NameResolver::identity)
                        .cloned()
                        .ok_or_else(|| {
                            DriverError::Internal(format!("{id} resolved without an identity"))
                        })?;
                    self.write_back(id, role, identity)?;
                }
                Ok(PassOutcome::Done)
            }
            // the resolver already reported why
            ResolveResult::Error => Ok(PassOutcome::Failed(Vec::new())),
            ResolveResult::Deferred | ResolveResult::Blocked => Ok(PassOutcome::DeferredSelf),
        }
    }

    fn validate(&mut self, id: NodeId, ctx: &mut PassContext<'_>) -> Result<PassOutcome, DriverError> {
        let NodeKind::Method { params, body } = &self.node(id)?.kind else {
            return Ok(PassOutcome::Done);
        };
        let lattice = ModelLattice::new(&self.tree);
        let mut branch = ctx.errs.branch();
        BodyValidator::new(&lattice, &self.types, id, &mut branch).validate(params, body)?;
        if branch.has_errors() {
            return Ok(PassOutcome::Failed(branch.into_diagnostics()));
        }
        ctx.errs.merge(branch);
        Ok(PassOutcome::Done)
    }

    // =========================================================================
    // Listing
    // =========================================================================

    fn display_type(&self, ty: &TypeUse) -> String {
        let name = self.display_slot(self.types.get(&ty.node));
        if ty.nullable { format!("{name}?") } else { name }
    }

    fn display_slot(&self, identity: Option<&Identity>) -> String {
        identity.map_or_else(|| "<unresolved>".to_string(), |i| self.tree.display(i))
    }

    fn listing_line(&self, id: NodeId) -> Option<String> {
        let node = self.ast.get(id)?;
        if node.synthetic || !node.kind.declares() {
            return None;
        }
        let name = self.ast.qualified_name(id);
        let decl = self.decl(id).and_then(|d| self.tree.get(d));
        let keyword = node.kind.keyword();
        let line = match &node.kind {
            NodeKind::Class { .. } => {
                let supers: Vec<String> = decl
                    .map(|d| d.contributions().iter().map(|c| self.display_slot(c.as_ref())).collect())
                    .unwrap_or_default();
                if supers.is_empty() {
                    format!("{keyword} {name}")
                } else {
                    format!("{keyword} {name} extends {}", supers.join(", "))
                }
            }
            NodeKind::TypeParameter | NodeKind::Property { formal: true, .. } => {
                let bound = self.display_slot(decl.and_then(|d| d.bound()));
                format!("{keyword} {name}: {bound}")
            }
            NodeKind::Typedef => {
                let target = self.display_slot(decl.and_then(|d| d.target()));
                format!("{keyword} {name} = {target}")
            }
            NodeKind::Property { ty: Some(ty), .. } => {
                format!("{keyword} {name}: {}", self.display_type(ty))
            }
            NodeKind::Method { params, .. } => {
                let params: Vec<String> = params
                    .iter()
                    .map(|p| match &p.ty {
                        Some(ty) => format!("{}: {}", p.name, self.display_type(ty)),
                        None => p.name.clone(),
                    })
                    .collect();
                format!("{keyword} {name}({})", params.join(", "))
            }
            _ => format!("{keyword} {name}"),
        };
        Some(line)
    }
}

// =============================================================================
// Lexical environment
// =============================================================================

impl NameScope for Model {
    fn tree(&self) -> &DeclTree {
        &self.tree
    }

    /// A supertype is named from outside its class.
    fn parent(&self, node: NodeId) -> Option<NodeId> {
        let parent = self.ast.parent(node)?;
        match self.ast.get(node).map(|n| &n.kind) {
            Some(NodeKind::NameRef {
                role: RefRole::Contribution(_),
                ..
            }) => self.ast.parent(parent),
            _ => Some(parent),
        }
    }

    fn component(&self, node: NodeId) -> Component {
        match self.ast.get(node) {
            Some(n) if n.kind.declares() => match self.decl(node) {
                Some(decl) => Component::Ready(decl),
                None => Component::Pending,
            },
            _ => Component::Absent,
        }
    }

    fn find_import(&self, node: NodeId, name: &str) -> Option<ImportBinding> {
        if matches!(self.ast.get(node)?.kind, NodeKind::Import { .. }) {
            return None;
        }
        let mut current = Some(node);
        while let Some(level) = current {
            let imports = &self.ast.get(level)?.imports;
            if let Some((_, import)) = imports.iter().find(|(alias, _)| alias == name) {
                return Some(ImportBinding {
                    import: *import,
                    block: level,
                });
            }
            current = NameScope::parent(self, level);
        }
        None
    }
}

// =============================================================================
// Driver hooks
// =============================================================================

impl CompilationUnit for Model {
    fn root(&self) -> NodeId {
        Ast::ROOT
    }

    fn children(&self, node: NodeId) -> Vec<NodeId> {
        self.ast.children(node).to_vec()
    }

    fn register_structures(
        &mut self,
        node: NodeId,
        _ctx: &mut PassContext<'_>,
    ) -> Result<PassOutcome, DriverError> {
        self.register(node)?;
        Ok(PassOutcome::Done)
    }

    fn resolve_names(
        &mut self,
        node: NodeId,
        ctx: &mut PassContext<'_>,
    ) -> Result<PassOutcome, DriverError> {
        self.resolve(node, ctx)
    }

    fn validate_content(
        &mut self,
        node: NodeId,
        ctx: &mut PassContext<'_>,
    ) -> Result<PassOutcome, DriverError> {
        self.validate(node, ctx)
    }

    fn generate_code(
        &mut self,
        node: NodeId,
        _ctx: &mut PassContext<'_>,
    ) -> Result<PassOutcome, DriverError> {
        if let Some(line) = self.listing_line(node) {
            self.listing.push(line);
        }
        Ok(PassOutcome::Done)
    }

    fn force(&mut self, pass: Pass, node: NodeId, ctx: &mut PassContext<'_>) {
        if pass != Pass::ResolveNames {
            return;
        }
        let role = match self.ast.get(node).map(|n| &n.kind) {
            Some(NodeKind::NameRef { role, .. }) => Some(*role),
            Some(NodeKind::Import { .. }) => None,
            _ => return,
        };
        let Some(identity) = ctx.resolvers.force_resolve(node, &*self, ctx.errs) else {
            return;
        };
        if let Some(role) = role {
            if let Err(err) = self.write_back(node, role, identity) {
                ctx.errs.log_internal(node, &err.to_string());
            }
        }
    }

    fn describe(&self, node: NodeId) -> String {
        match self.ast.get(node).map(|n| &n.kind) {
            Some(NodeKind::Import { path } | NodeKind::NameRef { path, .. }) => path.join("."),
            Some(_) => self.ast.qualified_name(node),
            None => node.to_string(),
        }
    }
}
