//! The JSON program format.
//!
//! ```json
//! {
//!   "modules": [{
//!     "name": "app",
//!     "imports": [{ "name": "lib.Helper", "alias": "H" }],
//!     "items": [
//!       { "kind": "class", "name": "Point", "extends": ["H"], "items": [
//!         { "kind": "property", "name": "x", "type": "Int" },
//!         { "kind": "method", "name": "norm", "params": [{ "name": "p", "type": "Point?" }],
//!           "body": [{ "op": "if", "cond": { "op": "notNull", "name": "p" },
//!                      "then": [{ "op": "eval", "expr": { "op": "member", "name": "p" } }] }] }
//!       ] }
//!     ]
//!   }]
//! }
//! ```
//!
//! Type names are dotted paths with an optional `?` suffix for nullable types.
//! Method bodies use a small statement language ([`Stmt`], [`Expr`]).

use serde::{Deserialize, Serialize};

use quill_decl::Access;

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ProgramSpec {
    #[serde(default)]
    pub modules: Vec<ModuleSpec>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ModuleSpec {
    pub name: String,
    #[serde(default)]
    pub imports: Vec<ImportSpec>,
    #[serde(default)]
    pub items: Vec<ItemSpec>,
}

/// `import a.b.C` or `import a.b.C as D`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ImportSpec {
    pub name: String,
    #[serde(default)]
    pub alias: Option<String>,
}

impl ImportSpec {
    /// The name the import binds: the alias, else the last segment.
    #[must_use]
    pub fn binding(&self) -> &str {
        self.alias
            .as_deref()
            .unwrap_or_else(|| self.name.rsplit('.').next().unwrap_or(&self.name))
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(
    tag = "kind",
    rename_all = "camelCase",
    rename_all_fields = "camelCase"
)]
pub enum ItemSpec {
    Package {
        name: String,
        #[serde(default)]
        access: Access,
        #[serde(default)]
        imports: Vec<ImportSpec>,
        #[serde(default)]
        items: Vec<ItemSpec>,
    },
    Class {
        name: String,
        #[serde(default)]
        access: Access,
        #[serde(default)]
        type_params: Vec<TypeParamSpec>,
        #[serde(default)]
        extends: Vec<String>,
        #[serde(default)]
        imports: Vec<ImportSpec>,
        #[serde(default)]
        items: Vec<ItemSpec>,
    },
    Typedef {
        name: String,
        #[serde(default)]
        access: Access,
        target: String,
    },
    /// A typed property, or with `formal` a generic type property whose
    /// `type` is its constraint.
    Property {
        name: String,
        #[serde(default)]
        access: Access,
        #[serde(default, rename = "type")]
        ty: Option<String>,
        #[serde(default)]
        formal: bool,
    },
    Method {
        name: String,
        #[serde(default)]
        access: Access,
        #[serde(default)]
        type_params: Vec<TypeParamSpec>,
        #[serde(default)]
        params: Vec<ParamSpec>,
        #[serde(default)]
        body: Vec<Stmt>,
    },
}

impl ItemSpec {
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::Package { name, .. }
            | Self::Class { name, .. }
            | Self::Typedef { name, .. }
            | Self::Property { name, .. }
            | Self::Method { name, .. } => name,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TypeParamSpec {
    pub name: String,
    #[serde(default)]
    pub bound: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ParamSpec {
    pub name: String,
    #[serde(default, rename = "type")]
    pub ty: Option<String>,
}

// =============================================================================
// Method bodies
// =============================================================================

/// A statement. `T` is how a declared type is written: a type name in the
/// JSON format, a reference to its name node once lowered into the AST.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum Stmt<T = String> {
    Var {
        name: String,
        #[serde(default, rename = "type")]
        ty: Option<T>,
        #[serde(default)]
        value: Option<Expr>,
        #[serde(default)]
        constant: bool,
    },
    Assign {
        name: String,
        value: Expr,
    },
    Eval {
        expr: Expr,
    },
    If {
        cond: Expr,
        #[serde(default)]
        then: Vec<Stmt<T>>,
        #[serde(default, rename = "else")]
        otherwise: Vec<Stmt<T>>,
    },
    While {
        #[serde(default)]
        label: Option<String>,
        cond: Expr,
        #[serde(default)]
        body: Vec<Stmt<T>>,
    },
    /// `while (true)`: ends only through `break`.
    Loop {
        #[serde(default)]
        label: Option<String>,
        #[serde(default)]
        body: Vec<Stmt<T>>,
    },
    Break {
        #[serde(default)]
        label: Option<String>,
    },
    Continue {
        #[serde(default)]
        label: Option<String>,
    },
    Return {
        #[serde(default)]
        value: Option<Expr>,
    },
    Assert {
        cond: Expr,
    },
    Block {
        #[serde(default)]
        body: Vec<Stmt<T>>,
    },
}

impl<T> Stmt<T> {
    /// Short name used when reporting unreachable statements.
    #[must_use]
    pub const fn keyword(&self) -> &'static str {
        match self {
            Self::Var { .. } => "var",
            Self::Assign { .. } => "assignment",
            Self::Eval { .. } => "expression",
            Self::If { .. } => "if",
            Self::While { .. } => "while",
            Self::Loop { .. } => "loop",
            Self::Break { .. } => "break",
            Self::Continue { .. } => "continue",
            Self::Return { .. } => "return",
            Self::Assert { .. } => "assert",
            Self::Block { .. } => "block",
        }
    }

    /// Rewrite the declared types, keeping everything else.
    pub fn map_types<U, E>(self, f: &mut dyn FnMut(T) -> Result<U, E>) -> Result<Stmt<U>, E> {
        fn block<T, U, E>(
            stmts: Vec<Stmt<T>>,
            f: &mut dyn FnMut(T) -> Result<U, E>,
        ) -> Result<Vec<Stmt<U>>, E> {
            let mut out = Vec::with_capacity(stmts.len());
            for stmt in stmts {
                out.push(stmt.map_types(&mut *f)?);
            }
            Ok(out)
        }

        Ok(match self {
            Self::Var {
                name,
                ty,
                value,
                constant,
            } => Stmt::Var {
                name,
                ty: match ty {
                    Some(ty) => Some(f(ty)?),
                    None => None,
                },
                value,
                constant,
            },
            Self::Assign { name, value } => Stmt::Assign { name, value },
            Self::Eval { expr } => Stmt::Eval { expr },
            Self::If {
                cond,
                then,
                otherwise,
            } => Stmt::If {
                cond,
                then: block(then, f)?,
                otherwise: block(otherwise, f)?,
            },
            Self::While { label, cond, body } => Stmt::While {
                label,
                cond,
                body: block(body, f)?,
            },
            Self::Loop { label, body } => Stmt::Loop {
                label,
                body: block(body, f)?,
            },
            Self::Break { label } => Stmt::Break { label },
            Self::Continue { label } => Stmt::Continue { label },
            Self::Return { value } => Stmt::Return { value },
            Self::Assert { cond } => Stmt::Assert { cond },
            Self::Block { body } => Stmt::Block {
                body: block(body, f)?,
            },
        })
    }
}

/// An expression; conditions are expressions too.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum Expr {
    Read {
        name: String,
    },
    /// `name.member`: a read that needs a non-`Null` value.
    Member {
        name: String,
    },
    Lit,
    Null,
    Call {
        callee: String,
        #[serde(default)]
        args: Vec<Expr>,
    },
    /// `name != null`
    NotNull {
        name: String,
    },
    /// `name == null`
    IsNull {
        name: String,
    },
    /// `name := call`: assigns `name` only when the call produced a value.
    AssignCall {
        name: String,
        call: Box<Expr>,
    },
    And {
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Or {
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Not {
        expr: Box<Expr>,
    },
}
