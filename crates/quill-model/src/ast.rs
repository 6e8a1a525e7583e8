//! Arena AST lowered from a [`ProgramSpec`].
//!
//! Nodes live in one `Vec` indexed by [`NodeId`]; node 0 is the program.
//! Every name the program writes (a supertype, a bound, a typedef target, a
//! declared type, an import path) becomes its own [`NodeKind::NameRef`] or
//! [`NodeKind::Import`] node, so each one owns exactly one resolver.
//!
//! | Node | Children |
//! |------|----------|
//! | `Program` | modules |
//! | `Module`, `Package` | imports, items |
//! | `Class` | type parameters, supertype refs, imports, items |
//! | `TypeParameter` | bound ref |
//! | `Typedef` | target ref |
//! | `Property` | bound ref (formal) or type ref |
//! | `Method` | type parameters, parameter and local type refs |

use quill_common::NodeId;
use quill_decl::Access;

use crate::error::ModelError;
use crate::program::{ImportSpec, ItemSpec, ModuleSpec, ProgramSpec, Stmt, TypeParamSpec};

/// Where the name a [`NodeKind::NameRef`] resolves to is recorded.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RefRole {
    /// Supertype slot of the enclosing class.
    Contribution(usize),
    /// Constraint of the enclosing type parameter or formal property.
    Bound,
    /// Aliased type of the enclosing typedef.
    Target,
    PropertyType,
    ParamType,
    LocalType,
}

/// A declared type in a method or property: the name node plus the `?`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TypeUse {
    pub node: NodeId,
    pub nullable: bool,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Param {
    pub name: String,
    pub ty: Option<TypeUse>,
}

#[derive(Clone, Debug, PartialEq)]
pub enum NodeKind {
    Program,
    Module,
    Package,
    Class {
        contributions: usize,
    },
    TypeParameter,
    Typedef,
    Property {
        formal: bool,
        ty: Option<TypeUse>,
    },
    Method {
        params: Vec<Param>,
        body: Vec<Stmt<TypeUse>>,
    },
    Import {
        path: Vec<String>,
    },
    NameRef {
        role: RefRole,
        path: Vec<String>,
    },
}

impl NodeKind {
    /// Whether the node declares an entity in the declaration tree.
    #[must_use]
    pub const fn declares(&self) -> bool {
        !matches!(
            self,
            Self::Program | Self::Import { .. } | Self::NameRef { .. }
        )
    }

    #[must_use]
    pub const fn keyword(&self) -> &'static str {
        match self {
            Self::Program => "program",
            Self::Module => "module",
            Self::Package => "package",
            Self::Class { .. } => "class",
            Self::TypeParameter => "type-param",
            Self::Typedef => "typedef",
            Self::Property { formal: true, .. } => "formal",
            Self::Property { .. } => "property",
            Self::Method { .. } => "method",
            Self::Import { .. } => "import",
            Self::NameRef { .. } => "name",
        }
    }
}

#[derive(Clone, Debug)]
pub struct AstNode {
    pub kind: NodeKind,
    /// Declared name; the written text for imports (their binding) and refs.
    pub name: String,
    pub access: Access,
    pub parent: Option<NodeId>,
    pub children: Vec<NodeId>,
    /// Imports owned by this node, by the name they bind.
    pub imports: Vec<(String, NodeId)>,
    /// Part of the built-in `core` module rather than the user's program.
    pub synthetic: bool,
}

#[derive(Clone, Debug, Default)]
pub struct Ast {
    nodes: Vec<AstNode>,
}

impl Ast {
    pub const ROOT: NodeId = NodeId(0);

    /// Lower a program, adding the built-in `core` module unless the program
    /// declares its own.
    pub fn lower(spec: &ProgramSpec) -> Result<Self, ModelError> {
        let mut ast = Self::default();
        ast.push(None, NodeKind::Program, "", Access::Public, false);
        for module in &spec.modules {
            ast.lower_module(module, false)?;
        }
        if !spec.modules.iter().any(|m| m.name == "core") {
            ast.lower_module(&core_module(), true)?;
        }
        Ok(ast)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    #[must_use]
    pub fn get(&self, id: NodeId) -> Option<&AstNode> {
        self.nodes.get(id.index())
    }

    #[must_use]
    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.get(id).and_then(|n| n.parent)
    }

    #[must_use]
    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.get(id).map_or(&[], |n| n.children.as_slice())
    }

    pub fn ids(&self) -> impl Iterator<Item = NodeId> {
        (0..self.nodes.len() as u32).map(NodeId)
    }

    /// Dotted name of a node from its module (`app.Point.norm`).
    #[must_use]
    pub fn qualified_name(&self, id: NodeId) -> String {
        let mut parts = Vec::new();
        let mut current = Some(id);
        while let Some(cur) = current {
            let Some(node) = self.get(cur) else { break };
            if node.kind != NodeKind::Program {
                parts.push(node.name.as_str());
            }
            current = node.parent;
        }
        parts.reverse();
        parts.join(".")
    }

    /// The declaring node with the given qualified name.
    #[must_use]
    pub fn find(&self, path: &str) -> Option<NodeId> {
        self.ids().find(|&id| {
            self.get(id).is_some_and(|n| n.kind.declares()) && self.qualified_name(id) == path
        })
    }

    /// The name nodes owned by `owner`, in source order.
    pub fn refs(&self, owner: NodeId) -> impl Iterator<Item = (NodeId, &AstNode)> {
        self.children(owner).iter().filter_map(|&id| {
            let node = self.get(id)?;
            matches!(node.kind, NodeKind::NameRef { .. }).then_some((id, node))
        })
    }

    // =========================================================================
    // Lowering
    // =========================================================================

    fn push(
        &mut self,
        parent: Option<NodeId>,
        kind: NodeKind,
        name: &str,
        access: Access,
        synthetic: bool,
    ) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(AstNode {
            kind,
            name: name.to_string(),
            access,
            parent,
            children: Vec::new(),
            imports: Vec::new(),
            synthetic,
        });
        if let Some(parent) = parent {
            self.nodes[parent.index()].children.push(id);
        }
        id
    }

    fn is_synthetic(&self, id: NodeId) -> bool {
        self.get(id).is_some_and(|n| n.synthetic)
    }

    fn lower_module(&mut self, module: &ModuleSpec, synthetic: bool) -> Result<(), ModelError> {
        check_name(&module.name)?;
        let id = self.push(
            Some(Self::ROOT),
            NodeKind::Module,
            &module.name,
            Access::Public,
            synthetic,
        );
        self.lower_imports(id, &module.imports)?;
        for item in &module.items {
            self.lower_item(id, item)?;
        }
        Ok(())
    }

    fn lower_imports(&mut self, owner: NodeId, imports: &[ImportSpec]) -> Result<(), ModelError> {
        for import in imports {
            let path = split_path(&import.name)?;
            let binding = import.binding().to_string();
            check_name(&binding)?;
            let node = self.push(
                Some(owner),
                NodeKind::Import { path },
                &binding,
                Access::Public,
                false,
            );
            self.nodes[owner.index()].imports.push((binding, node));
        }
        Ok(())
    }

    fn lower_item(&mut self, parent: NodeId, item: &ItemSpec) -> Result<(), ModelError> {
        check_name(item.name())?;
        let synthetic = self.is_synthetic(parent);
        match item {
            ItemSpec::Package {
                name,
                access,
                imports,
                items,
            } => {
                let id = self.push(Some(parent), NodeKind::Package, name, *access, synthetic);
                self.lower_imports(id, imports)?;
                for item in items {
                    self.lower_item(id, item)?;
                }
            }
            ItemSpec::Class {
                name,
                access,
                type_params,
                extends,
                imports,
                items,
            } => {
                let kind = NodeKind::Class {
                    contributions: extends.len(),
                };
                let id = self.push(Some(parent), kind, name, *access, synthetic);
                self.lower_type_params(id, type_params)?;
                for (slot, supertype) in extends.iter().enumerate() {
                    self.type_use(id, RefRole::Contribution(slot), supertype)?;
                }
                self.lower_imports(id, imports)?;
                for item in items {
                    self.lower_item(id, item)?;
                }
            }
            ItemSpec::Typedef {
                name,
                access,
                target,
            } => {
                let id = self.push(Some(parent), NodeKind::Typedef, name, *access, synthetic);
                self.type_use(id, RefRole::Target, target)?;
            }
            ItemSpec::Property {
                name,
                access,
                ty,
                formal,
            } => {
                let kind = NodeKind::Property {
                    formal: *formal,
                    ty: None,
                };
                let id = self.push(Some(parent), kind, name, *access, synthetic);
                if *formal {
                    let bound = ty.as_deref().unwrap_or("Object");
                    self.type_use(id, RefRole::Bound, bound)?;
                } else if let Some(ty) = ty {
                    let ty = self.type_use(id, RefRole::PropertyType, ty)?;
                    self.nodes[id.index()].kind = NodeKind::Property {
                        formal: false,
                        ty: Some(ty),
                    };
                }
            }
            ItemSpec::Method {
                name,
                access,
                type_params,
                params,
                body,
            } => {
                let kind = NodeKind::Method {
                    params: Vec::new(),
                    body: Vec::new(),
                };
                let id = self.push(Some(parent), kind, name, *access, synthetic);
                self.lower_type_params(id, type_params)?;
                let mut lowered = Vec::with_capacity(params.len());
                for param in params {
                    check_name(&param.name)?;
                    let ty = match &param.ty {
                        Some(ty) => Some(self.type_use(id, RefRole::ParamType, ty)?),
                        None => None,
                    };
                    lowered.push(Param {
                        name: param.name.clone(),
                        ty,
                    });
                }
                let mut stmts = Vec::with_capacity(body.len());
                for stmt in body.iter().cloned() {
                    stmts.push(stmt.map_types(&mut |ty: String| {
                        self.type_use(id, RefRole::LocalType, &ty)
                    })?);
                }
                self.nodes[id.index()].kind = NodeKind::Method {
                    params: lowered,
                    body: stmts,
                };
            }
        }
        Ok(())
    }

    fn lower_type_params(
        &mut self,
        owner: NodeId,
        type_params: &[TypeParamSpec],
    ) -> Result<(), ModelError> {
        let synthetic = self.is_synthetic(owner);
        for param in type_params {
            check_name(&param.name)?;
            let id = self.push(
                Some(owner),
                NodeKind::TypeParameter,
                &param.name,
                Access::Public,
                synthetic,
            );
            let bound = param.bound.as_deref().unwrap_or("Object");
            self.type_use(id, RefRole::Bound, bound)?;
        }
        Ok(())
    }

    /// Add a name node for a written type under `owner`.
    fn type_use(&mut self, owner: NodeId, role: RefRole, text: &str) -> Result<TypeUse, ModelError> {
        let (path, nullable) = parse_type(text)?;
        let name = path.join(".");
        let synthetic = self.is_synthetic(owner);
        let node = self.push(
            Some(owner),
            NodeKind::NameRef { role, path },
            &name,
            Access::Public,
            synthetic,
        );
        Ok(TypeUse { node, nullable })
    }
}

fn check_name(name: &str) -> Result<(), ModelError> {
    if name.trim().is_empty() {
        return Err(ModelError::EmptyName(name.to_string()));
    }
    Ok(())
}

fn split_path(text: &str) -> Result<Vec<String>, ModelError> {
    let segments: Vec<String> = text.split('.').map(|s| s.trim().to_string()).collect();
    if segments.iter().any(String::is_empty) {
        return Err(ModelError::EmptyName(text.to_string()));
    }
    Ok(segments)
}

/// `a.b.C?` is the path `a`, `b`, `C` and a nullable flag.
pub fn parse_type(text: &str) -> Result<(Vec<String>, bool), ModelError> {
    let text = text.trim();
    let (path, nullable) = match text.strip_suffix('?') {
        Some(path) => (path, true),
        None => (text, false),
    };
    Ok((split_path(path)?, nullable))
}

fn core_module() -> ModuleSpec {
    let class = |name: &str, items: Vec<ItemSpec>| ItemSpec::Class {
        name: name.to_string(),
        access: Access::Public,
        type_params: Vec::new(),
        extends: Vec::new(),
        imports: Vec::new(),
        items,
    };
    ModuleSpec {
        name: "core".to_string(),
        imports: Vec::new(),
        items: vec![
            class("Object", Vec::new()),
            class("Type", Vec::new()),
            class(
                "Boolean",
                vec![class("True", Vec::new()), class("False", Vec::new())],
            ),
            class("Int", Vec::new()),
            class("String", Vec::new()),
            class("Char", Vec::new()),
            class("Nullable", vec![class("Null", Vec::new())]),
            class("Exception", Vec::new()),
        ],
    }
}
