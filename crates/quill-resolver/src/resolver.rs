//! The resumable name resolver.
//!
//! ## Stages
//!
//! | Stage | Work | Suspends with |
//! |-------|------|---------------|
//! | `CheckImports` | note the import the first segment may refer to | never |
//! | `ResolveFirstName` | walk the lexical enclosures outward | `Deferred`, `Blocked` |
//! | `ResolveDotName` | resolve each remaining segment against the last | `Deferred`, `Blocked` |
//! | `ResolveTurtles` | wait until the identity has no pending aliases | `Deferred` |
//! | `Resolved` / `Error` | terminal | never |
//!
//! Stages only move forward. Every suspension persists enough state to resume
//! without redoing completed segments.

use smallvec::SmallVec;
use tracing::{debug, trace, warn};

use quill_common::limits::MAX_ENCLOSURE_WALK;
use quill_common::{DiagnosticSink, NodeId, diagnostic_codes};
use quill_decl::{
    Access, ChainEnd, DeclId, DeclKind, DeclTree, Identity, Resolution, ResolutionCollector,
};

use crate::collector::SegmentCollector;
use crate::scope::{Component, ImportBinding, NameScope};
use crate::table::ResolverTable;

/// Outcome of a [`NameResolver::resolve`] call.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum ResolveResult {
    /// Waiting on work elsewhere in the program; call again next sweep.
    Deferred,
    /// Waiting on a formal bound or supertype that is still pending. Like
    /// `Deferred`, but the wait is on a known, legitimate dependency.
    Blocked,
    Resolved,
    Error,
}

impl ResolveResult {
    /// `Deferred` or `Blocked`.
    #[must_use]
    pub const fn is_pending(self) -> bool {
        matches!(self, Self::Deferred | Self::Blocked)
    }
}

/// What the reference is expected to name.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Goal {
    Value,
    Type,
}

/// How the segments resolved so far are being interpreted.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum TypeMode {
    Value,
    /// Inside a typedef.
    Type,
    /// Inside a formal (generic) type; further formal members become
    /// formal-child identities.
    FormalType,
}

/// A partially or fully resolved name.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Target {
    pub identity: Identity,
    pub decl: Option<DeclId>,
    pub mode: TypeMode,
}

#[derive(Clone, Debug, PartialEq, Eq)]
enum Stage {
    CheckImports,
    ResolveFirstName {
        import: Option<ImportBinding>,
    },
    ResolveDotName {
        base: Identity,
        current: Target,
        next: usize,
    },
    ResolveTurtles {
        base: Identity,
        current: Target,
    },
    Resolved {
        base: Identity,
        target: Target,
    },
    Error,
}

impl Stage {
    const fn name(&self) -> &'static str {
        match self {
            Self::CheckImports => "CheckImports",
            Self::ResolveFirstName { .. } => "ResolveFirstName",
            Self::ResolveDotName { .. } => "ResolveDotName",
            Self::ResolveTurtles { .. } => "ResolveTurtles",
            Self::Resolved { .. } => "Resolved",
            Self::Error => "Error",
        }
    }

    const fn ordinal(&self) -> u8 {
        match self {
            Self::CheckImports => 0,
            Self::ResolveFirstName { .. } => 1,
            Self::ResolveDotName { .. } => 2,
            Self::ResolveTurtles { .. } => 3,
            Self::Resolved { .. } => 4,
            Self::Error => 5,
        }
    }
}

enum Step {
    Advance(Stage),
    Suspend(ResolveResult),
}

/// Where to look up the next dot-name segment.
enum MemberScope {
    Decl { decl: DeclId, via_formal: bool },
    Suspend(ResolveResult),
    Fail { code: u32, arg: String },
}

/// Resolves one dotted name written at one AST node.
#[derive(Clone, Debug)]
pub struct NameResolver {
    node: NodeId,
    names: SmallVec<[String; 4]>,
    goal: Goal,
    stage: Stage,
    first_time: bool,
    last: Option<ResolveResult>,
}

impl NameResolver {
    /// A resolver for a value reference.
    #[must_use]
    pub fn new<S: Into<String>>(node: NodeId, names: impl IntoIterator<Item = S>) -> Self {
        Self::with_goal(node, names, Goal::Value)
    }

    /// A resolver for a type reference.
    #[must_use]
    pub fn for_type<S: Into<String>>(node: NodeId, names: impl IntoIterator<Item = S>) -> Self {
        Self::with_goal(node, names, Goal::Type)
    }

    #[must_use]
    pub fn with_goal<S: Into<String>>(
        node: NodeId,
        names: impl IntoIterator<Item = S>,
        goal: Goal,
    ) -> Self {
        let names: SmallVec<[String; 4]> = names.into_iter().map(Into::into).collect();
        // an empty name can never resolve; it fails on the first attempt
        let stage = if names.is_empty() {
            Stage::Error
        } else {
            Stage::CheckImports
        };
        Self {
            node,
            names,
            goal,
            stage,
            first_time: true,
            last: None,
        }
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    #[must_use]
    pub const fn node(&self) -> NodeId {
        self.node
    }

    #[must_use]
    pub fn names(&self) -> &[String] {
        &self.names
    }

    #[must_use]
    pub fn dotted(&self) -> String {
        self.names.join(".")
    }

    #[must_use]
    pub const fn goal(&self) -> Goal {
        self.goal
    }

    /// Whether `resolve` has never been called.
    #[must_use]
    pub const fn is_first_time(&self) -> bool {
        self.first_time
    }

    /// Result of the most recent `resolve` call.
    #[must_use]
    pub const fn last_result(&self) -> Option<ResolveResult> {
        self.last
    }

    #[must_use]
    pub const fn is_resolved(&self) -> bool {
        matches!(self.stage, Stage::Resolved { .. })
    }

    #[must_use]
    pub const fn is_error(&self) -> bool {
        matches!(self.stage, Stage::Error)
    }

    /// The resolved identity, once `Resolved`.
    #[must_use]
    pub const fn identity(&self) -> Option<&Identity> {
        match &self.stage {
            Stage::Resolved { target, .. } => Some(&target.identity),
            _ => None,
        }
    }

    /// The identity of the first segment, once `Resolved`.
    #[must_use]
    pub const fn base_identity(&self) -> Option<&Identity> {
        match &self.stage {
            Stage::Resolved { base, .. } => Some(base),
            _ => None,
        }
    }

    /// The resolved declaration-tree entity, once `Resolved`.
    #[must_use]
    pub const fn decl(&self) -> Option<DeclId> {
        match &self.stage {
            Stage::Resolved { target, .. } => target.decl,
            _ => None,
        }
    }

    #[must_use]
    pub const fn target(&self) -> Option<&Target> {
        match &self.stage {
            Stage::Resolved { target, .. } => Some(target),
            _ => None,
        }
    }

    /// The type mode of the resolution so far.
    #[must_use]
    pub const fn type_mode(&self) -> TypeMode {
        match &self.stage {
            Stage::ResolveDotName { current, .. } | Stage::ResolveTurtles { current, .. } => {
                current.mode
            }
            Stage::Resolved { target, .. } => target.mode,
            _ => TypeMode::Value,
        }
    }

    #[must_use]
    pub const fn stage_name(&self) -> &'static str {
        self.stage.name()
    }

    /// A value that changes whenever the resolver makes progress, including
    /// progress between segments inside `ResolveDotName`.
    #[must_use]
    pub const fn progress_marker(&self) -> (u8, usize) {
        match &self.stage {
            Stage::ResolveDotName { next, .. } => (self.stage.ordinal(), *next),
            stage => (stage.ordinal(), 0),
        }
    }

    // =========================================================================
    // Resolution
    // =========================================================================

    /// Advance resolution as far as currently possible.
    ///
    /// Safe to call any number of times; once `Resolved` or `Error` the call
    /// returns the same answer without logging anything.
    pub fn resolve(
        &mut self,
        scope: &dyn NameScope,
        imports: &mut ResolverTable,
        errs: &mut DiagnosticSink,
    ) -> ResolveResult {
        self.first_time = false;
        let result = self.run(scope, imports, errs);
        self.last = Some(result);
        result
    }

    /// Resolve with deferral no longer permitted: a pending outcome is
    /// reported as an unresolvable name and pins the resolver to `Error`.
    pub fn force_resolve(
        &mut self,
        scope: &dyn NameScope,
        imports: &mut ResolverTable,
        errs: &mut DiagnosticSink,
    ) -> Option<Identity> {
        match self.resolve(scope, imports, errs) {
            ResolveResult::Resolved => self.identity().cloned(),
            ResolveResult::Error => None,
            pending => {
                let dotted = self.dotted();
                debug!(node = self.node.0, name = %dotted, ?pending, "forcing unresolved name");
                self.fail(errs, diagnostic_codes::NAME_UNRESOLVABLE, &[&dotted]);
                self.last = Some(ResolveResult::Error);
                None
            }
        }
    }

    fn run(
        &mut self,
        scope: &dyn NameScope,
        imports: &mut ResolverTable,
        errs: &mut DiagnosticSink,
    ) -> ResolveResult {
        loop {
            let step = match &self.stage {
                Stage::CheckImports => {
                    let import = scope.find_import(self.node, &self.names[0]);
                    Step::Advance(Stage::ResolveFirstName { import })
                }
                Stage::ResolveFirstName { import } => {
                    let import = *import;
                    self.resolve_first_name(import, scope, imports, errs)
                }
                Stage::ResolveDotName {
                    base,
                    current,
                    next,
                } => {
                    let (base, current, next) = (base.clone(), current.clone(), *next);
                    self.resolve_dot_names(base, current, next, scope.tree(), errs)
                }
                Stage::ResolveTurtles { base, current } => {
                    if scope.tree().is_settled(&current.identity) {
                        Step::Advance(Stage::Resolved {
                            base: base.clone(),
                            target: current.clone(),
                        })
                    } else {
                        Step::Suspend(ResolveResult::Deferred)
                    }
                }
                Stage::Resolved { .. } => return ResolveResult::Resolved,
                Stage::Error => return ResolveResult::Error,
            };

            match step {
                Step::Advance(next) => {
                    trace!(
                        node = self.node.0,
                        from = self.stage.name(),
                        to = next.name(),
                        "name resolver stage transition"
                    );
                    self.stage = next;
                }
                Step::Suspend(result) => {
                    trace!(node = self.node.0, stage = self.stage.name(), ?result, "name resolver suspended");
                    return result;
                }
            }
        }
    }

    fn resolve_first_name(
        &mut self,
        import: Option<ImportBinding>,
        scope: &dyn NameScope,
        imports: &mut ResolverTable,
        errs: &mut DiagnosticSink,
    ) -> Step {
        let tree = scope.tree();
        let subject = self.dotted();
        let first = self.names[0].clone();

        let mut access = Access::Private;
        let mut outermost: Option<DeclId> = None;
        let mut possible = false;
        let mut found: Option<Target> = None;
        let mut node = Some(self.node);
        let mut walked = 0;

        while let Some(current) = node {
            walked += 1;
            if walked > MAX_ENCLOSURE_WALK {
                warn!(node = self.node.0, name = %first, "enclosure chain does not terminate");
                errs.log_internal(self.node, "enclosure chain does not terminate");
                return Step::Advance(Stage::Error);
            }

            if let Some(binding) = import {
                if binding.block == current {
                    match imports.resolve(binding.import, scope, errs) {
                        ResolveResult::Resolved => {
                            let Some(target) = imports.get(binding.import).and_then(|r| r.target())
                            else {
                                return Step::Suspend(ResolveResult::Deferred);
                            };
                            found = match target.decl {
                                Some(decl) => {
                                    let mut collector = SegmentCollector::new(
                                        self.node, &subject, &first, self.goal,
                                        TypeMode::Value, None, errs,
                                    );
                                    if collector.resolved_decl(tree, decl) == Resolution::Error {
                                        return Step::Advance(Stage::Error);
                                    }
                                    collector.found
                                }
                                None => Some(target.clone()),
                            };
                            break;
                        }
                        // the import already reported its own failure
                        ResolveResult::Error => return Step::Advance(Stage::Error),
                        pending => return Step::Suspend(pending),
                    }
                }
            }

            match scope.component(current) {
                Component::Absent => {}
                Component::Pending => return Step::Suspend(ResolveResult::Deferred),
                Component::Ready(decl) => {
                    let outer = *outermost.get_or_insert_with(|| tree.outermost_class(decl));
                    let mut collector = SegmentCollector::new(
                        self.node, &subject, &first, self.goal, TypeMode::Value, None, errs,
                    );
                    match tree.resolve_name(decl, &first, access, &mut collector) {
                        Resolution::Resolved => {
                            found = collector.found;
                            break;
                        }
                        Resolution::Unknown => {}
                        Resolution::Possible => possible = true,
                        Resolution::Error => return Step::Advance(Stage::Error),
                    }
                    if decl == outer {
                        access = Access::Public;
                    }
                }
            }
            node = scope.parent(current);
        }

        if found.is_none() {
            if let Some(implicit) = tree.implicit(&first) {
                let mut collector = SegmentCollector::new(
                    self.node, &subject, &first, self.goal, TypeMode::Value, None, errs,
                );
                if collector.resolved_decl(tree, implicit) == Resolution::Error {
                    return Step::Advance(Stage::Error);
                }
                found = collector.found;
            }
        }

        match found {
            Some(target) => {
                let base = target.identity.clone();
                if self.names.len() > 1 {
                    Step::Advance(Stage::ResolveDotName {
                        base,
                        current: target,
                        next: 1,
                    })
                } else {
                    Step::Advance(Stage::ResolveTurtles {
                        base,
                        current: target,
                    })
                }
            }
            None if possible => Step::Suspend(ResolveResult::Blocked),
            None => {
                errs.log_code(
                    diagnostic_codes::NAME_UNRESOLVABLE,
                    self.node,
                    &subject,
                    &[&first],
                );
                Step::Advance(Stage::Error)
            }
        }
    }

    fn resolve_dot_names(
        &mut self,
        base: Identity,
        mut current: Target,
        mut next: usize,
        tree: &DeclTree,
        errs: &mut DiagnosticSink,
    ) -> Step {
        let subject = self.dotted();

        while next < self.names.len() {
            let segment = self.names[next].clone();
            let (lookup_in, via_formal) = match member_scope(tree, &current) {
                MemberScope::Decl { decl, via_formal } => (decl, via_formal),
                MemberScope::Suspend(result) => {
                    self.stage = Stage::ResolveDotName {
                        base,
                        current,
                        next,
                    };
                    return Step::Suspend(result);
                }
                MemberScope::Fail { code, arg } => {
                    if code == diagnostic_codes::NAME_UNRESOLVABLE_FORMAL {
                        errs.log_code(code, self.node, &subject, &[&segment, &arg]);
                    } else {
                        errs.log_code(code, self.node, &subject, &[&arg]);
                    }
                    return Step::Advance(Stage::Error);
                }
            };

            let formal = if via_formal { current.decl } else { None };
            let mut collector = SegmentCollector::new(
                self.node, &subject, &segment, self.goal, current.mode, formal, errs,
            );
            let mut result = tree.resolve_name(lookup_in, &segment, Access::Private, &mut collector);
            if result == Resolution::Unknown && via_formal {
                // members every type has, e.g. the formal's own type information
                if let Some(type_decl) = tree.implicit("Type") {
                    result = tree.resolve_name(type_decl, &segment, Access::Public, &mut collector);
                }
            }

            match result {
                Resolution::Resolved => {
                    let Some(found) = collector.found else {
                        return Step::Advance(Stage::Error);
                    };
                    current = found;
                    next += 1;
                }
                Resolution::Unknown => {
                    let owner = tree.display(&current.identity);
                    errs.log_code(
                        diagnostic_codes::NAME_MISSING,
                        self.node,
                        &subject,
                        &[&segment, &owner],
                    );
                    return Step::Advance(Stage::Error);
                }
                Resolution::Possible => {
                    self.stage = Stage::ResolveDotName {
                        base,
                        current,
                        next,
                    };
                    return Step::Suspend(ResolveResult::Blocked);
                }
                Resolution::Error => return Step::Advance(Stage::Error),
            }
        }

        Step::Advance(Stage::ResolveTurtles { base, current })
    }

    fn fail(&mut self, errs: &mut DiagnosticSink, code: u32, args: &[&str]) {
        let subject = self.dotted();
        errs.log_code(code, self.node, &subject, args);
        self.stage = Stage::Error;
    }
}

/// Find the declaration whose members the next segment is looked up in.
fn member_scope(tree: &DeclTree, current: &Target) -> MemberScope {
    let display = || tree.display(&current.identity);
    let Some(decl_id) = current.decl else {
        return MemberScope::Fail {
            code: diagnostic_codes::NOT_CLASS_TYPE,
            arg: display(),
        };
    };
    let Some(decl) = tree.get(decl_id) else {
        return MemberScope::Fail {
            code: diagnostic_codes::NOT_CLASS_TYPE,
            arg: display(),
        };
    };

    let formal_scope = |formal: DeclId| match tree.follow_bounds(formal) {
        ChainEnd::Decl(bound) => MemberScope::Decl {
            decl: bound,
            via_formal: true,
        },
        ChainEnd::Pending => MemberScope::Suspend(ResolveResult::Blocked),
        ChainEnd::Formal(_) | ChainEnd::Cyclic => MemberScope::Fail {
            code: diagnostic_codes::NAME_UNRESOLVABLE_FORMAL,
            arg: tree.qualified_name(formal),
        },
    };

    match decl.kind {
        DeclKind::Module | DeclKind::Package | DeclKind::Class => MemberScope::Decl {
            decl: decl_id,
            via_formal: false,
        },
        DeclKind::Typedef => match tree.follow_typedefs(&Identity::Decl(decl_id)) {
            ChainEnd::Decl(aliased) => {
                if tree.get(aliased).is_some_and(|d| d.is_formal_type()) {
                    formal_scope(aliased)
                } else {
                    MemberScope::Decl {
                        decl: aliased,
                        via_formal: false,
                    }
                }
            }
            ChainEnd::Pending => MemberScope::Suspend(ResolveResult::Deferred),
            ChainEnd::Formal(_) | ChainEnd::Cyclic => MemberScope::Fail {
                code: diagnostic_codes::NOT_CLASS_TYPE,
                arg: display(),
            },
        },
        _ if decl.is_formal_type() => formal_scope(decl_id),
        // a method is a dead end for dot names
        DeclKind::Method => MemberScope::Fail {
            code: diagnostic_codes::NAME_UNRESOLVABLE,
            arg: display(),
        },
        DeclKind::Property | DeclKind::TypeParameter => MemberScope::Fail {
            code: diagnostic_codes::NOT_CLASS_TYPE,
            arg: display(),
        },
    }
}
