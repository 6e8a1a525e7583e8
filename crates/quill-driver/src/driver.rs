//! The four-pass fixpoint driver.
//!
//! Passes run strictly in order: every node finishes pass N (or fails it)
//! before any node starts pass N+1. Within a pass the driver sweeps a work list
//! in preorder, starting from the root:
//!
//! | Outcome | Node | Children |
//! |---------|------|----------|
//! | `Done` | reaches the pass's target stage | visited later in the same sweep |
//! | `Failed` | diagnostics logged, skipped by later passes | visited later in the same sweep |
//! | `DeferredSelf` | re-queued for the next sweep | visited later in the same sweep |
//! | `DeferredChildren` | re-queued for the next sweep | held back until the node stops deferring |
//!
//! A sweep makes progress when a node completes or fails, when a deferred
//! node's attempt (outcome plus resolver stage) differs from its previous
//! one, or when a hook calls [`PassContext::note_progress`]. A sweep without
//! progress, or running out of sweeps, forces every pending node through
//! [`CompilationUnit::force`] and fails the compilation.

use bitflags::bitflags;
use rustc_hash::FxHashMap;
use serde::Serialize;
use tracing::{debug, info_span, trace, warn};

use quill_common::{DiagnosticSink, NodeId, diagnostic_codes};
use quill_resolver::{NameResolver, ResolveResult, ResolverTable};

use crate::error::DriverError;
use crate::options::DriverOptions;
use crate::pass::{Pass, PassOutcome, Stage};
use crate::unit::{CompilationUnit, PassContext, run_hook};

bitflags! {
    /// Per-node bookkeeping within one pass. Only `FAILED` survives into the
    /// next pass.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct NodeFlags: u8 {
        /// Already on the work list for the next sweep.
        const QUEUED_SELF = 1 << 0;
        /// Children were pushed for this pass.
        const VISITED_KIDS = 1 << 1;
        /// Children are held back until the node stops deferring.
        const DEFER_KIDS = 1 << 2;
        /// The node failed this or an earlier pass.
        const FAILED = 1 << 3;
    }
}

/// What a deferred attempt looked like. Two equal fingerprints in a row mean
/// the node did not move.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
struct Fingerprint {
    outcome: u8,
    resolver: Option<((u8, usize), Option<ResolveResult>)>,
}

impl Fingerprint {
    fn of(outcome: &PassOutcome, node: NodeId, resolvers: &ResolverTable) -> Self {
        Self {
            outcome: outcome.kind(),
            resolver: resolvers
                .get(node)
                .map(|r| (r.progress_marker(), r.last_result())),
        }
    }
}

#[derive(Clone, Copy, Debug, Default)]
struct NodeState {
    stage: Stage,
    flags: NodeFlags,
    last: Option<Fingerprint>,
}

/// How one pass went.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PassReport {
    pub pass: Pass,
    pub sweeps: u32,
    /// Every node finished the pass.
    pub converged: bool,
    /// Nodes forced through their error path.
    pub forced: Vec<NodeId>,
    /// Forced nodes that were not merely blocked on a formal bound.
    pub stuck: Vec<NodeId>,
}

impl PassReport {
    const fn new(pass: Pass) -> Self {
        Self {
            pass,
            sweeps: 0,
            converged: false,
            forced: Vec::new(),
            stuck: Vec::new(),
        }
    }
}

/// Result of [`CompilationDriver::run`]. The diagnostics stay in the sink.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompileReport {
    pub passes: Vec<PassReport>,
    /// Last pass every node finished.
    pub completed: Option<Pass>,
    pub success: bool,
    /// Stopped because of a fatal diagnostic or the error limit.
    pub aborted: bool,
    pub error_count: usize,
}

impl CompileReport {
    /// Sweeps `pass` needed, if it ran.
    #[must_use]
    pub fn sweeps(&self, pass: Pass) -> Option<u32> {
        self.passes.iter().find(|p| p.pass == pass).map(|p| p.sweeps)
    }

    /// Stage every node reached.
    #[must_use]
    pub fn stage(&self) -> Stage {
        self.completed.map_or(Stage::Initial, Pass::target)
    }

    /// `Ok` when the compilation succeeded.
    pub fn check(&self) -> Result<(), DriverError> {
        if let Some(p) = self.passes.iter().find(|p| !p.forced.is_empty()) {
            return Err(DriverError::NotConverged {
                pass: p.pass,
                sweeps: p.sweeps,
                pending: p.forced.len(),
            });
        }
        if self.aborted {
            let pass = self
                .passes
                .last()
                .map_or(Pass::RegisterStructures, |p| p.pass);
            return Err(DriverError::Aborted(pass));
        }
        if !self.success {
            return Err(DriverError::Failed(self.error_count));
        }
        Ok(())
    }
}

/// Runs the passes over a [`CompilationUnit`] and owns the state that must
/// survive between sweeps: per-node stages and the resolver side table.
#[derive(Debug, Default)]
pub struct CompilationDriver {
    options: DriverOptions,
    resolvers: ResolverTable,
    states: FxHashMap<NodeId, NodeState>,
}

impl CompilationDriver {
    #[must_use]
    pub fn new(options: DriverOptions) -> Self {
        Self {
            options,
            resolvers: ResolverTable::new(),
            states: FxHashMap::default(),
        }
    }

    #[must_use]
    pub const fn options(&self) -> &DriverOptions {
        &self.options
    }

    #[must_use]
    pub const fn resolvers(&self) -> &ResolverTable {
        &self.resolvers
    }

    pub const fn resolvers_mut(&mut self) -> &mut ResolverTable {
        &mut self.resolvers
    }

    /// Stage `node` has reached. Nodes the driver never visited are `Initial`.
    #[must_use]
    pub fn stage(&self, node: NodeId) -> Stage {
        self.states.get(&node).map_or(Stage::Initial, |s| s.stage)
    }

    #[must_use]
    pub fn has_failed(&self, node: NodeId) -> bool {
        self.states
            .get(&node)
            .is_some_and(|s| s.flags.contains(NodeFlags::FAILED))
    }

    /// Compile `unit`, logging every diagnostic to `errs`.
    pub fn run<U: CompilationUnit + ?Sized>(
        &mut self,
        unit: &mut U,
        errs: &mut DiagnosticSink,
    ) -> CompileReport {
        let root = unit.root();
        let _span = info_span!("compile", root = root.0).entered();
        self.states.clear();

        let mut report = CompileReport::default();
        for pass in Pass::ALL {
            if !self.options.runs(pass) {
                break;
            }
            let pass_report = self.run_pass(unit, pass, errs);
            let converged = pass_report.converged;
            let forced = !pass_report.forced.is_empty();
            report.passes.push(pass_report);

            if forced {
                break;
            }
            if errs.is_abort_desired() {
                if !errs.has_fatal() {
                    let count = errs.error_count().to_string();
                    errs.log_code(
                        diagnostic_codes::TOO_MANY_ERRORS,
                        root,
                        &unit.describe(root),
                        &[&count],
                    );
                }
                report.aborted = true;
                break;
            }
            if converged {
                report.completed = Some(pass);
            }
        }

        report.error_count = errs.error_count();
        report.success = !report.aborted
            && report.passes.iter().all(|p| p.converged)
            && !errs.has_errors();
        debug!(
            completed = ?report.completed,
            success = report.success,
            errors = report.error_count,
            "compilation finished"
        );
        report
    }

    #[tracing::instrument(level = "debug", skip_all, fields(pass = %pass))]
    fn run_pass<U: CompilationUnit + ?Sized>(
        &mut self,
        unit: &mut U,
        pass: Pass,
        errs: &mut DiagnosticSink,
    ) -> PassReport {
        for state in self.states.values_mut() {
            state.flags &= NodeFlags::FAILED;
            state.last = None;
        }

        let max_sweeps = self.options.max_sweeps.max(1);
        let mut report = PassReport::new(pass);
        let mut work = vec![unit.root()];
        loop {
            report.sweeps += 1;
            let last_attempt = report.sweeps >= max_sweeps;
            let mut ctx =
                PassContext::new(errs, &mut self.resolvers, pass, report.sweeps, last_attempt);
            let (pending, progress) = sweep(unit, &mut self.states, &work, &mut ctx);
            debug!(
                sweep = report.sweeps,
                pending = pending.len(),
                progress,
                "sweep finished"
            );
            work = pending;

            if work.is_empty() {
                report.converged = true;
                break;
            }
            if errs.is_abort_desired() {
                break;
            }
            if !progress || last_attempt {
                self.force(unit, pass, &work, errs, &mut report);
                break;
            }
        }
        debug!(sweeps = report.sweeps, converged = report.converged, "pass finished");
        report
    }

    /// Push every pending node through its error path. Nodes that were only
    /// blocked on a formal bound report their own errors; anything else is
    /// also named in one fatal non-convergence diagnostic.
    fn force<U: CompilationUnit + ?Sized>(
        &mut self,
        unit: &mut U,
        pass: Pass,
        pending: &[NodeId],
        errs: &mut DiagnosticSink,
        report: &mut PassReport,
    ) {
        let stuck: Vec<NodeId> = pending
            .iter()
            .copied()
            .filter(|&node| {
                self.resolvers.get(node).and_then(NameResolver::last_result)
                    != Some(ResolveResult::Blocked)
            })
            .collect();
        warn!(
            %pass,
            pending = pending.len(),
            stuck = stuck.len(),
            "no progress; forcing pending nodes"
        );

        let mut ctx = PassContext::new(errs, &mut self.resolvers, pass, report.sweeps, true);
        for &node in pending {
            unit.force(pass, node, &mut ctx);
            self.states.entry(node).or_default().flags |= NodeFlags::FAILED;
        }

        if !stuck.is_empty() {
            let names = stuck
                .iter()
                .map(|&node| unit.describe(node))
                .collect::<Vec<_>>()
                .join(", ");
            errs.log_code(
                diagnostic_codes::INFINITE_RESOLVE_LOOP,
                unit.root(),
                &names,
                &[&names],
            );
        }
        report.forced = pending.to_vec();
        report.stuck = stuck;
    }
}

/// One preorder walk over `work`. Returns the nodes to retry and whether
/// anything moved.
fn sweep<U: CompilationUnit + ?Sized>(
    unit: &mut U,
    states: &mut FxHashMap<NodeId, NodeState>,
    work: &[NodeId],
    ctx: &mut PassContext<'_>,
) -> (Vec<NodeId>, bool) {
    let pass = ctx.pass();
    let mut stack: Vec<NodeId> = work.iter().rev().copied().collect();
    let mut pending = Vec::new();
    let mut progress = false;

    while let Some(node) = stack.pop() {
        let state = states.entry(node).or_default();
        state.flags.remove(NodeFlags::QUEUED_SELF);

        if state.flags.contains(NodeFlags::FAILED) {
            expand(&*unit, node, state, &mut stack);
            continue;
        }
        if state.stage >= pass.target() {
            continue;
        }
        if state.stage < Stage::required(pass) {
            let detail = format!(
                "{} reached {pass} at stage {:?}",
                unit.describe(node),
                state.stage
            );
            ctx.errs.log_internal(node, &detail);
            state.flags |= NodeFlags::FAILED;
            progress = true;
            continue;
        }

        state.stage = pass.transitional();
        let outcome = match run_hook(unit, pass, node, ctx) {
            Ok(outcome) => outcome,
            Err(err) => {
                warn!(node = node.0, %err, "pass hook failed");
                ctx.errs.log_internal(node, &err.to_string());
                PassOutcome::Failed(Vec::new())
            }
        };
        let print = Fingerprint::of(&outcome, node, &*ctx.resolvers);
        trace!(node = node.0, ?print, "attempt");

        match outcome {
            PassOutcome::Done => {
                state.stage = pass.target();
                progress = true;
                expand(&*unit, node, state, &mut stack);
            }
            PassOutcome::Failed(diagnostics) => {
                for diag in diagnostics {
                    ctx.errs.log(diag);
                }
                state.flags |= NodeFlags::FAILED;
                progress = true;
                expand(&*unit, node, state, &mut stack);
            }
            deferred => {
                let hold_kids = matches!(deferred, PassOutcome::DeferredChildren);
                if state.last != Some(print) {
                    progress = true;
                }
                state.last = Some(print);
                state.flags |= NodeFlags::QUEUED_SELF;
                pending.push(node);
                if !hold_kids {
                    expand(&*unit, node, state, &mut stack);
                } else if !state.flags.contains(NodeFlags::VISITED_KIDS) {
                    state.flags |= NodeFlags::DEFER_KIDS;
                }
            }
        }
    }

    (pending, progress || ctx.made_progress())
}

/// Push the children of `node` once per pass, first child on top.
fn expand<U: CompilationUnit + ?Sized>(
    unit: &U,
    node: NodeId,
    state: &mut NodeState,
    stack: &mut Vec<NodeId>,
) {
    if state.flags.contains(NodeFlags::VISITED_KIDS) {
        return;
    }
    state.flags.remove(NodeFlags::DEFER_KIDS);
    state.flags |= NodeFlags::VISITED_KIDS;
    stack.extend(unit.children(node).into_iter().rev());
}
