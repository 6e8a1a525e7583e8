//! The hook surface a front end implements.

use quill_common::{DiagnosticSink, NodeId};
use quill_resolver::ResolverTable;

use crate::error::DriverError;
use crate::pass::{Pass, PassOutcome};

/// What a hook sees of the running driver.
///
/// The sink and the resolver table are public so a hook can hand both to a
/// [`quill_resolver::NameResolver`] in one call.
pub struct PassContext<'a> {
    pub errs: &'a mut DiagnosticSink,
    pub resolvers: &'a mut ResolverTable,
    pass: Pass,
    sweep: u32,
    last_attempt: bool,
    progress: bool,
}

impl<'a> PassContext<'a> {
    pub(crate) fn new(
        errs: &'a mut DiagnosticSink,
        resolvers: &'a mut ResolverTable,
        pass: Pass,
        sweep: u32,
        last_attempt: bool,
    ) -> Self {
        Self {
            errs,
            resolvers,
            pass,
            sweep,
            last_attempt,
            progress: false,
        }
    }

    #[must_use]
    pub const fn pass(&self) -> Pass {
        self.pass
    }

    /// 1-based sweep number within the current pass.
    #[must_use]
    pub const fn sweep(&self) -> u32 {
        self.sweep
    }

    /// Set on the final sweep the driver permits. A hook that still cannot
    /// finish will be forced afterwards.
    #[must_use]
    pub const fn is_last_attempt(&self) -> bool {
        self.last_attempt
    }

    /// Report progress the driver cannot see in outcomes or resolver stages,
    /// e.g. a fact added to the declaration tree by a node that still defers.
    pub fn note_progress(&mut self) {
        self.progress = true;
    }

    pub(crate) const fn made_progress(&self) -> bool {
        self.progress
    }
}

/// A program the driver can compile: a tree of nodes with one hook per pass.
///
/// Hooks default to [`PassOutcome::Done`], so a front end only implements the
/// passes its nodes take part in. A hook returns `Err` for internal defects
/// only; user errors go to `ctx.errs` or into [`PassOutcome::Failed`].
pub trait CompilationUnit {
    fn root(&self) -> NodeId;

    /// Children of `node` in source order.
    fn children(&self, node: NodeId) -> Vec<NodeId>;

    fn register_structures(
        &mut self,
        _node: NodeId,
        _ctx: &mut PassContext<'_>,
    ) -> Result<PassOutcome, DriverError> {
        Ok(PassOutcome::Done)
    }

    fn resolve_names(
        &mut self,
        _node: NodeId,
        _ctx: &mut PassContext<'_>,
    ) -> Result<PassOutcome, DriverError> {
        Ok(PassOutcome::Done)
    }

    fn validate_content(
        &mut self,
        _node: NodeId,
        _ctx: &mut PassContext<'_>,
    ) -> Result<PassOutcome, DriverError> {
        Ok(PassOutcome::Done)
    }

    fn generate_code(
        &mut self,
        _node: NodeId,
        _ctx: &mut PassContext<'_>,
    ) -> Result<PassOutcome, DriverError> {
        Ok(PassOutcome::Done)
    }

    /// Error path for a node still pending when `pass` gives up on it. The
    /// node should report why it could not finish (typically by forcing its
    /// resolvers).
    fn force(&mut self, _pass: Pass, _node: NodeId, _ctx: &mut PassContext<'_>) {}

    /// Human-readable name of `node` for driver diagnostics.
    fn describe(&self, node: NodeId) -> String {
        node.to_string()
    }
}

pub(crate) fn run_hook<U: CompilationUnit + ?Sized>(
    unit: &mut U,
    pass: Pass,
    node: NodeId,
    ctx: &mut PassContext<'_>,
) -> Result<PassOutcome, DriverError> {
    match pass {
        Pass::RegisterStructures => unit.register_structures(node, ctx),
        Pass::ResolveNames => unit.resolve_names(node, ctx),
        Pass::ValidateContent => unit.validate_content(node, ctx),
        Pass::GenerateCode => unit.generate_code(node, ctx),
    }
}
