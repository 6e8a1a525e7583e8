//! Method body validation.
//!
//! Walks a lowered method body with one [`ValidationContext`], following the
//! scope protocol of each construct:
//!
//! | Construct | Scopes |
//! |-----------|--------|
//! | `if` | `If` { condition, `Fork(true)` { then }, `Fork(false)` { else } } |
//! | `a && b` | `a` in place, `And` { `b` } |
//! | `a \|\| b` | `a` in place, `Or` { `b` } |
//! | `!a` | `Not` { `a` } |
//! | `while` | `Loop` { condition, `Fork(true)` { body } } |
//! | `loop` | infinite `Loop` { `Block` { body } } |
//! | `assert` | `Block` { condition, promote `WhenTrue` } |
//! | `{ ... }` | `Block` { body } |

use rustc_hash::FxHashMap;
use tracing::trace;

use quill_common::limits::MAX_SCOPE_DEPTH;
use quill_common::{DiagnosticSink, NodeId, diagnostic_codes};
use quill_decl::Identity;
use quill_driver::DriverError;
use quill_flow::{Branch, JumpKind, ScopeToken, TypeRef, ValidationContext, VarStorage};

use crate::ast::{Param, TypeUse};
use crate::lattice::{self, ModelLattice, NULL_TYPE};
use crate::program::{Expr, Stmt};

pub struct BodyValidator<'a, 'l> {
    ctx: ValidationContext<'l>,
    lattice: &'l ModelLattice<'l>,
    types: &'l FxHashMap<NodeId, Identity>,
    errs: &'a mut DiagnosticSink,
    method: NodeId,
}

impl<'a, 'l> BodyValidator<'a, 'l> {
    /// `types` holds the resolved identity of every declared-type name node.
    pub fn new(
        lattice: &'l ModelLattice<'l>,
        types: &'l FxHashMap<NodeId, Identity>,
        method: NodeId,
        errs: &'a mut DiagnosticSink,
    ) -> Self {
        Self {
            ctx: ValidationContext::new(lattice),
            lattice,
            types,
            errs,
            method,
        }
    }

    #[tracing::instrument(level = "debug", skip_all, fields(method = self.method.0))]
    pub fn validate(
        mut self,
        params: &[Param],
        body: &[Stmt<TypeUse>],
    ) -> Result<(), DriverError> {
        for param in params {
            let ty = self.declared(param.ty.as_ref());
            self.ctx.register_var(
                self.method,
                &param.name,
                VarStorage::Parameter,
                ty,
                self.errs,
            );
        }
        let block = self.enter(ValidationContext::enter)?;
        self.stmts(body)?;
        self.ctx.exit(block)?;
        self.ctx.finish()?;
        Ok(())
    }

    fn declared(&self, ty: Option<&TypeUse>) -> Option<TypeRef> {
        let ty = ty?;
        let identity = self.types.get(&ty.node)?;
        self.lattice.type_of(identity, ty.nullable)
    }

    fn enter(
        &mut self,
        open: impl FnOnce(&mut ValidationContext<'l>) -> ScopeToken,
    ) -> Result<ScopeToken, DriverError> {
        if self.ctx.depth() >= MAX_SCOPE_DEPTH {
            return Err(DriverError::Internal(format!(
                "scopes nested deeper than {MAX_SCOPE_DEPTH}"
            )));
        }
        Ok(open(&mut self.ctx))
    }

    // =========================================================================
    // Statements
    // =========================================================================

    fn stmts(&mut self, stmts: &[Stmt<TypeUse>]) -> Result<(), DriverError> {
        let mut warned = false;
        for stmt in stmts {
            if !warned && !self.ctx.is_reachable() {
                self.ctx
                    .check_reachable(self.method, stmt.keyword(), self.errs);
                warned = true;
            }
            self.stmt(stmt)?;
        }
        Ok(())
    }

    fn stmt(&mut self, stmt: &Stmt<TypeUse>) -> Result<(), DriverError> {
        trace!(op = stmt.keyword(), depth = self.ctx.depth(), "statement");
        match stmt {
            Stmt::Var {
                name,
                ty,
                value,
                constant,
            } => {
                if let Some(value) = value {
                    self.expr(value)?;
                }
                let storage = if *constant && value.is_some() {
                    VarStorage::Constant
                } else {
                    VarStorage::Local
                };
                let ty = self.declared(ty.as_ref());
                let registered = self
                    .ctx
                    .register_var(self.method, name, storage, ty, self.errs);
                if registered && storage == VarStorage::Local && value.is_some() {
                    self.ctx.mark_var_write(self.method, name, false, self.errs);
                }
            }
            Stmt::Assign { name, value } => {
                self.expr(value)?;
                self.ctx.mark_var_write(self.method, name, false, self.errs);
            }
            Stmt::Eval { expr } => self.expr(expr)?,
            Stmt::If {
                cond,
                then,
                otherwise,
            } => {
                let if_scope = self.enter(ValidationContext::enter_if)?;
                self.expr(cond)?;
                let fork = self.enter(|ctx| ctx.enter_fork(true))?;
                self.stmts(then)?;
                self.ctx.exit(fork)?;
                if !otherwise.is_empty() {
                    let fork = self.enter(|ctx| ctx.enter_fork(false))?;
                    self.stmts(otherwise)?;
                    self.ctx.exit(fork)?;
                }
                self.ctx.exit(if_scope)?;
            }
            Stmt::While { label, cond, body } => {
                let lp = self.enter(|ctx| ctx.enter_loop(label.as_deref()))?;
                self.expr(cond)?;
                let fork = self.enter(|ctx| ctx.enter_fork(true))?;
                self.stmts(body)?;
                self.ctx.exit(fork)?;
                self.ctx.exit(lp)?;
            }
            Stmt::Loop { label, body } => {
                let lp = self.enter(|ctx| ctx.enter_infinite_loop(label.as_deref()))?;
                let block = self.enter(ValidationContext::enter)?;
                self.stmts(body)?;
                self.ctx.exit(block)?;
                self.ctx.exit(lp)?;
            }
            Stmt::Break { label } => {
                self.ctx
                    .jump(self.method, JumpKind::Break, label.as_deref(), self.errs);
            }
            Stmt::Continue { label } => {
                self.ctx
                    .jump(self.method, JumpKind::Continue, label.as_deref(), self.errs);
            }
            Stmt::Return { value } => {
                if let Some(value) = value {
                    self.expr(value)?;
                }
                self.ctx.set_reachable(false);
            }
            Stmt::Assert { cond } => {
                let block = self.enter(ValidationContext::enter)?;
                self.expr(cond)?;
                self.ctx.promote_branch(Branch::WhenTrue);
                self.ctx.exit(block)?;
            }
            Stmt::Block { body } => {
                let block = self.enter(ValidationContext::enter)?;
                self.stmts(body)?;
                self.ctx.exit(block)?;
            }
        }
        Ok(())
    }

    // =========================================================================
    // Expressions
    // =========================================================================

    /// Validate an expression. Conditions record their narrowings and
    /// conditional assignments on the outcomes of the current scope.
    fn expr(&mut self, expr: &Expr) -> Result<(), DriverError> {
        match expr {
            Expr::Lit | Expr::Null => {}
            Expr::Read { name } => {
                self.ctx.mark_var_read(self.method, name, self.errs);
            }
            Expr::Member { name } => {
                if self.ctx.mark_var_read(self.method, name, self.errs) && self.ctx.is_reachable()
                {
                    let current = self
                        .ctx
                        .narrowed_type(name)
                        .or_else(|| self.ctx.var(name).and_then(|v| v.ty));
                    if current.is_some_and(lattice::is_nullable) {
                        self.errs.log_code(
                            diagnostic_codes::NULLABLE_ACCESS,
                            self.method,
                            name,
                            &[name],
                        );
                    }
                }
            }
            Expr::Call { args, .. } => {
                for arg in args {
                    self.expr(arg)?;
                }
            }
            Expr::NotNull { name } => self.null_check(name, true),
            Expr::IsNull { name } => self.null_check(name, false),
            Expr::AssignCall { name, call } => {
                self.expr(call)?;
                self.ctx.mark_var_write(self.method, name, true, self.errs);
            }
            Expr::And { left, right } => {
                self.expr(left)?;
                let and = self.enter(ValidationContext::enter_and)?;
                self.expr(right)?;
                self.ctx.exit(and)?;
            }
            Expr::Or { left, right } => {
                self.expr(left)?;
                let or = self.enter(ValidationContext::enter_or)?;
                self.expr(right)?;
                self.ctx.exit(or)?;
            }
            Expr::Not { expr } => {
                let not = self.enter(ValidationContext::enter_not)?;
                self.expr(expr)?;
                self.ctx.exit(not)?;
            }
        }
        Ok(())
    }

    /// `name != null` (`non_null`) or `name == null`.
    fn null_check(&mut self, name: &str, non_null: bool) {
        if !self.ctx.mark_var_read(self.method, name, self.errs) {
            return;
        }
        let current = self
            .ctx
            .narrowed_type(name)
            .or_else(|| self.ctx.var(name).and_then(|v| v.ty));
        // already known to be Null, or known not to be
        let Some(current) = current.filter(|&ty| ty != NULL_TYPE && lattice::is_nullable(ty))
        else {
            return;
        };
        let present = lattice::non_null(current);
        let (when_true, when_false) = if non_null {
            (present, NULL_TYPE)
        } else {
            (NULL_TYPE, present)
        };
        self.ctx
            .narrow(self.method, name, Branch::WhenTrue, when_true, self.errs);
        self.ctx
            .narrow(self.method, name, Branch::WhenFalse, when_false, self.errs);
    }
}
