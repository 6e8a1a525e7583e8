use rustc_hash::{FxHashMap, FxHashSet};

use quill_common::{Diagnostic, DiagnosticSink, NodeId, diagnostic_codes};
use quill_driver::{
    CompilationDriver, CompilationUnit, CompileReport, DriverError, DriverOptions, Pass,
    PassContext, PassOutcome, Stage,
};
use quill_flow::FlowError;

/// A toy program: a tree of nodes where a node finishes `resolve_names` only
/// once everything it depends on has.
#[derive(Default)]
struct ToyUnit {
    kids: FxHashMap<NodeId, Vec<NodeId>>,
    deps: FxHashMap<NodeId, Vec<NodeId>>,
    resolved: FxHashSet<NodeId>,
    /// Nodes that answer `DeferredChildren` this many times before finishing.
    hold_kids: FxHashMap<NodeId, u32>,
    /// Nodes that answer `DeferredSelf` this many times before finishing.
    hold_self: FxHashMap<NodeId, u32>,
    /// Nodes that keep deferring while claiming progress.
    spinning: FxHashSet<NodeId>,
    fail_register: FxHashSet<NodeId>,
    broken: FxHashSet<NodeId>,
    visits: Vec<(Pass, NodeId)>,
    forced: Vec<NodeId>,
}

impl ToyUnit {
    /// Root `#0` with children `#1..=#n`.
    fn flat(n: u32) -> Self {
        let mut unit = Self::default();
        unit.kids.insert(NodeId(0), (1..=n).map(NodeId).collect());
        unit
    }

    fn visits_in(&self, pass: Pass) -> Vec<u32> {
        self.visits
            .iter()
            .filter(|(p, _)| *p == pass)
            .map(|(_, n)| n.0)
            .collect()
    }

    fn countdown(map: &mut FxHashMap<NodeId, u32>, node: NodeId) -> bool {
        match map.get_mut(&node) {
            Some(left) if *left > 0 => {
                *left -= 1;
                true
            }
            _ => false,
        }
    }
}

impl CompilationUnit for ToyUnit {
    fn root(&self) -> NodeId {
        NodeId(0)
    }

    fn children(&self, node: NodeId) -> Vec<NodeId> {
        self.kids.get(&node).cloned().unwrap_or_default()
    }

    fn register_structures(
        &mut self,
        node: NodeId,
        _ctx: &mut PassContext<'_>,
    ) -> Result<PassOutcome, DriverError> {
        self.visits.push((Pass::RegisterStructures, node));
        if self.fail_register.contains(&node) {
            let name = format!("n{}", node.0);
            return Ok(PassOutcome::Failed(vec![Diagnostic::from_code(
                diagnostic_codes::VAR_UNDEFINED,
                node,
                &name,
                &[&name],
            )]));
        }
        Ok(PassOutcome::Done)
    }

    fn resolve_names(
        &mut self,
        node: NodeId,
        ctx: &mut PassContext<'_>,
    ) -> Result<PassOutcome, DriverError> {
        self.visits.push((Pass::ResolveNames, node));
        if self.broken.contains(&node) {
            return Err(FlowError::Unclosed(1).into());
        }
        if self.spinning.contains(&node) {
            ctx.note_progress();
            return Ok(PassOutcome::DeferredSelf);
        }
        if Self::countdown(&mut self.hold_kids, node) {
            return Ok(PassOutcome::DeferredChildren);
        }
        if Self::countdown(&mut self.hold_self, node) {
            return Ok(PassOutcome::DeferredSelf);
        }
        let ready = self
            .deps
            .get(&node)
            .is_none_or(|deps| deps.iter().all(|d| self.resolved.contains(d)));
        if !ready {
            return Ok(PassOutcome::DeferredSelf);
        }
        self.resolved.insert(node);
        Ok(PassOutcome::Done)
    }

    fn force(&mut self, _pass: Pass, node: NodeId, _ctx: &mut PassContext<'_>) {
        self.forced.push(node);
    }

    fn describe(&self, node: NodeId) -> String {
        format!("node{}", node.0)
    }
}

fn codes(errs: &DiagnosticSink) -> Vec<(u32, String)> {
    errs.diagnostics()
        .iter()
        .map(|d| (d.code, d.message_text.clone()))
        .collect()
}

fn compile(
    unit: &mut ToyUnit,
    options: DriverOptions,
) -> (CompilationDriver, DiagnosticSink, CompileReport) {
    let mut errs = options.new_sink();
    let mut driver = CompilationDriver::new(options);
    let report = driver.run(unit, &mut errs);
    (driver, errs, report)
}

// =============================================================================
// Convergence
// =============================================================================

#[test]
fn test_out_of_order_dependency_converges() {
    let mut unit = ToyUnit::flat(2);
    unit.deps.insert(NodeId(1), vec![NodeId(2)]);

    let (driver, errs, report) = compile(&mut unit, DriverOptions::default());

    assert!(report.success, "Expected success, got: {:?}", codes(&errs));
    assert_eq!(report.sweeps(Pass::RegisterStructures), Some(1));
    assert_eq!(report.sweeps(Pass::ResolveNames), Some(2));
    assert_eq!(report.completed, Some(Pass::GenerateCode));
    assert_eq!(report.stage(), Stage::Emitted);
    assert_eq!(driver.stage(NodeId(1)), Stage::Emitted);
    assert_eq!(unit.visits_in(Pass::ResolveNames), vec![0, 1, 2, 1]);
    assert!(report.check().is_ok());
}

#[test]
fn test_dependency_chain_converges_in_chain_length_sweeps() {
    // #1 -> #2 -> #3 -> #4, declared in the worst order.
    let mut unit = ToyUnit::flat(4);
    for n in 1..4 {
        unit.deps.insert(NodeId(n), vec![NodeId(n + 1)]);
    }

    let (_, errs, report) = compile(&mut unit, DriverOptions::default());

    assert!(report.success, "Expected success, got: {:?}", codes(&errs));
    assert_eq!(report.sweeps(Pass::ResolveNames), Some(4));
}

#[test]
fn test_every_node_finishes_a_pass_before_the_next_starts() {
    let mut unit = ToyUnit::flat(2);
    unit.deps.insert(NodeId(1), vec![NodeId(2)]);

    let (_, _, report) = compile(&mut unit, DriverOptions::default());
    assert!(report.success);

    let passes: Vec<Pass> = unit
        .visits
        .iter()
        .map(|(p, _)| *p)
        .filter(|p| *p <= Pass::ResolveNames)
        .collect();
    let first_resolve = passes
        .iter()
        .position(|p| *p == Pass::ResolveNames)
        .unwrap_or(passes.len());
    assert!(
        passes[first_resolve..]
            .iter()
            .all(|p| *p == Pass::ResolveNames),
        "Expected registration to finish first, got: {passes:?}"
    );
}

// =============================================================================
// Deferral
// =============================================================================

#[test]
fn test_deferred_children_are_held_back() {
    let mut unit = ToyUnit::default();
    unit.kids.insert(NodeId(0), vec![NodeId(1)]);
    unit.kids.insert(NodeId(1), vec![NodeId(2)]);
    unit.hold_kids.insert(NodeId(1), 1);

    let (_, errs, report) = compile(&mut unit, DriverOptions::default());

    assert!(report.success, "Expected success, got: {:?}", codes(&errs));
    assert_eq!(unit.visits_in(Pass::ResolveNames), vec![0, 1, 1, 2]);
}

#[test]
fn test_deferred_self_lets_children_proceed() {
    let mut unit = ToyUnit::default();
    unit.kids.insert(NodeId(0), vec![NodeId(1)]);
    unit.kids.insert(NodeId(1), vec![NodeId(2)]);
    unit.hold_self.insert(NodeId(1), 1);

    let (_, errs, report) = compile(&mut unit, DriverOptions::default());

    assert!(report.success, "Expected success, got: {:?}", codes(&errs));
    assert_eq!(unit.visits_in(Pass::ResolveNames), vec![0, 1, 2, 1]);
}

// =============================================================================
// Non-convergence
// =============================================================================

#[test]
fn test_cycle_without_progress_is_one_fatal() {
    let mut unit = ToyUnit::flat(2);
    unit.deps.insert(NodeId(1), vec![NodeId(2)]);
    unit.deps.insert(NodeId(2), vec![NodeId(1)]);

    let (driver, errs, report) = compile(&mut unit, DriverOptions::default());

    assert!(!report.success);
    assert_eq!(
        errs.count_code(diagnostic_codes::INFINITE_RESOLVE_LOOP),
        1,
        "Expected one non-convergence fatal, got: {:?}",
        codes(&errs)
    );
    assert!(errs.has_fatal());
    assert!(errs.diagnostics()[0].message_text.contains("node1, node2"));
    assert_eq!(unit.forced, vec![NodeId(1), NodeId(2)]);
    assert!(driver.has_failed(NodeId(1)));

    // The first sweep is new work; the second repeats it exactly.
    assert_eq!(report.sweeps(Pass::ResolveNames), Some(2));
    assert_eq!(report.passes.len(), 2, "later passes must be skipped");
    assert_eq!(report.completed, Some(Pass::RegisterStructures));
    assert_eq!(
        report.check(),
        Err(DriverError::NotConverged {
            pass: Pass::ResolveNames,
            sweeps: 2,
            pending: 2,
        })
    );
}

#[test]
fn test_max_sweeps_bounds_a_node_that_keeps_claiming_progress() {
    let mut unit = ToyUnit::flat(1);
    unit.spinning.insert(NodeId(1));
    let options = DriverOptions {
        max_sweeps: 3,
        ..DriverOptions::default()
    };

    let (_, errs, report) = compile(&mut unit, options);

    assert_eq!(report.sweeps(Pass::ResolveNames), Some(3));
    assert_eq!(unit.forced, vec![NodeId(1)]);
    assert_eq!(errs.count_code(diagnostic_codes::INFINITE_RESOLVE_LOOP), 1);
    assert!(!report.success);
}

// =============================================================================
// Failures and limits
// =============================================================================

#[test]
fn test_failed_node_still_visits_children() {
    let mut unit = ToyUnit::default();
    unit.kids.insert(NodeId(0), vec![NodeId(1)]);
    unit.kids.insert(NodeId(1), vec![NodeId(2)]);
    unit.fail_register.insert(NodeId(1));

    let (driver, errs, report) = compile(&mut unit, DriverOptions::default());

    assert_eq!(errs.error_count(), 1, "got: {:?}", codes(&errs));
    assert_eq!(errs.count_code(diagnostic_codes::VAR_UNDEFINED), 1);
    assert_eq!(unit.visits_in(Pass::RegisterStructures), vec![0, 1, 2]);
    // The failed node sits out later passes; its child does not.
    assert_eq!(unit.visits_in(Pass::ResolveNames), vec![0, 2]);
    assert!(driver.has_failed(NodeId(1)));
    assert_eq!(driver.stage(NodeId(2)), Stage::Emitted);

    assert_eq!(report.completed, Some(Pass::GenerateCode));
    assert!(!report.success);
    assert_eq!(report.check(), Err(DriverError::Failed(1)));
}

#[test]
fn test_error_limit_aborts_after_the_pass() {
    let mut unit = ToyUnit::flat(3);
    for n in 1..=3 {
        unit.fail_register.insert(NodeId(n));
    }
    let options = DriverOptions {
        max_errors: 2,
        ..DriverOptions::default()
    };

    let (_, errs, report) = compile(&mut unit, options);

    assert!(report.aborted);
    assert_eq!(report.passes.len(), 1);
    assert_eq!(errs.count_code(diagnostic_codes::TOO_MANY_ERRORS), 1);
    assert_eq!(
        report.check(),
        Err(DriverError::Aborted(Pass::RegisterStructures))
    );
}

#[test]
fn test_hook_error_becomes_internal_error() {
    let mut unit = ToyUnit::flat(1);
    unit.broken.insert(NodeId(1));

    let (driver, errs, report) = compile(&mut unit, DriverOptions::default());

    assert_eq!(
        errs.count_code(diagnostic_codes::INTERNAL_ERROR),
        1,
        "got: {:?}",
        codes(&errs)
    );
    assert!(driver.has_failed(NodeId(1)));
    assert!(report.aborted);
    assert_eq!(report.check(), Err(DriverError::Aborted(Pass::ResolveNames)));
    // A fatal already explains the stop.
    assert_eq!(errs.count_code(diagnostic_codes::TOO_MANY_ERRORS), 0);
}

// =============================================================================
// Options
// =============================================================================

#[test]
fn test_stop_after_ends_early_with_success() {
    let mut unit = ToyUnit::flat(1);
    let options = DriverOptions {
        stop_after: Some(Pass::ResolveNames),
        ..DriverOptions::default()
    };

    let (driver, _, report) = compile(&mut unit, options);

    assert!(report.success);
    assert_eq!(report.passes.len(), 2);
    assert_eq!(report.stage(), Stage::Resolved);
    assert_eq!(driver.stage(NodeId(1)), Stage::Resolved);
    assert!(unit.visits_in(Pass::ValidateContent).is_empty());
}

#[test]
fn test_options_from_json() {
    let options: DriverOptions =
        serde_json::from_str(r#"{ "maxSweeps": 4, "stopAfter": "validate" }"#)
            .expect("options parse");
    assert_eq!(options.max_sweeps, 4);
    assert_eq!(options.stop_after, Some(Pass::ValidateContent));
    assert_eq!(options.max_errors, DriverOptions::default().max_errors);
    assert!(!options.warnings_as_errors);

    let full: DriverOptions =
        serde_json::from_str(r#"{ "stopAfter": "resolve-names" }"#).expect("options parse");
    assert_eq!(full.stop_after, Some(Pass::ResolveNames));
}

#[test]
fn test_pass_names() {
    assert_eq!("emit".parse::<Pass>(), Ok(Pass::GenerateCode));
    assert_eq!("register-structures".parse::<Pass>(), Ok(Pass::RegisterStructures));
    assert!("link".parse::<Pass>().is_err());
    assert_eq!(Pass::ValidateContent.to_string(), "validate-content");

    for pass in Pass::ALL {
        assert!(Stage::required(pass) < pass.transitional());
        assert!(pass.transitional() < pass.target());
    }
}
