//! The validation context: a stack of scopes carrying flow-sensitive facts.
//!
//! Statement and expression validation pushes a scope for every construct
//! that can change what is known about local variables, records assignments,
//! narrowings and jumps in the innermost scope, and pops the scope again.
//! Popping promotes the scope's facts into its parent according to its kind:
//!
//! | Kind        | Reads from parent       | On exit                                          |
//! |-------------|-------------------------|--------------------------------------------------|
//! | `Block`     | as is                   | facts replace the parent's, demuxed              |
//! | `If`        | as is                   | dead forks discarded, facts demuxed              |
//! | `Fork(t/f)` | the `t`/`f` outcome     | facts become the parent's `t`/`f` outcome        |
//! | `And`       | the `WhenTrue` outcome  | `WhenTrue` replaces, `WhenFalse` joins           |
//! | `Or`        | the `WhenFalse` outcome | `WhenFalse` replaces, `WhenTrue` joins           |
//! | `Not`       | outcomes swapped        | outcomes swapped                                 |
//! | `Loop`      | as is                   | continues merged, loop join, breaks merged after |
//! | `Blackhole` | as is                   | nothing leaves                                   |
//!
//! Fact maps are reference counted and copied on first write, so cloning a
//! context to validate something speculatively is cheap and discarding the
//! attempt is just dropping the clone.

use std::fmt;
use std::rc::Rc;

use rustc_hash::FxHashMap;
use thiserror::Error;
use tracing::trace;

use quill_common::{DiagnosticSink, NodeId, diagnostic_codes};

use crate::assignment::Assignment;
use crate::narrowing::{Branch, TypeLattice, TypeRef, wider};

/// Misuse of the context by the caller. These are compiler defects, never
/// user errors.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FlowError {
    #[error("scope #{exited} exited while scope #{innermost} is the innermost scope")]
    Unbalanced { innermost: u32, exited: u32 },
    #[error("the root scope cannot be exited")]
    ExitRoot,
    #[error("scope #{0} is not on the scope stack")]
    UnknownTarget(u32),
    #[error("{0} scope(s) were never exited")]
    Unclosed(usize),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ScopeKind {
    Block,
    If,
    /// One outcome of a decision. An exclusive fork is a `WhenTrue` fork
    /// whose `WhenFalse` counterpart can never run.
    Fork {
        when_true: bool,
        exclusive: bool,
    },
    And,
    Or,
    Not,
    Loop {
        infinite: bool,
    },
    Blackhole,
}

impl ScopeKind {
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Block => "block",
            Self::If => "if",
            Self::Fork { when_true: true, .. } => "fork(true)",
            Self::Fork { when_true: false, .. } => "fork(false)",
            Self::And => "and",
            Self::Or => "or",
            Self::Not => "not",
            Self::Loop { infinite: false } => "loop",
            Self::Loop { infinite: true } => "infinite loop",
            Self::Blackhole => "blackhole",
        }
    }

    const fn demuxes(self) -> bool {
        matches!(self, Self::Block | Self::If | Self::Loop { .. })
    }

    /// How a value inherited from the parent looks inside this scope.
    const fn project(self, asn: Assignment) -> Assignment {
        match self {
            Self::Fork { when_true, .. } => asn.when(when_true),
            Self::And => asn.when_true(),
            Self::Or => asn.when_false(),
            Self::Not => asn.negate(),
            _ => asn,
        }
    }

    /// The parent branch a narrowing lookup continues in.
    const fn outer_branch(self, branch: Branch) -> Branch {
        match self {
            Self::Fork { when_true, .. } => Branch::of(when_true),
            Self::And => Branch::WhenTrue,
            Self::Or => Branch::WhenFalse,
            Self::Not => branch.complement(),
            _ => Branch::Always,
        }
    }

    /// The parent's new value for a name this completing scope assigned.
    const fn promote(self, inner: Assignment, outer: Assignment) -> Assignment {
        match self {
            Self::Fork { when_true, .. } => outer.join_fork(inner, when_true),
            Self::And => Assignment::split(
                Assignment::split(outer.when_false(), inner.when_false()),
                inner.when_true(),
            ),
            Self::Or => Assignment::split(
                inner.when_false(),
                Assignment::split(outer.when_true(), inner.when_true()),
            ),
            Self::Not => inner.negate(),
            Self::Loop { .. } => outer.join_loop(inner),
            _ => inner,
        }
    }
}

/// How a variable came into scope.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum VarStorage {
    /// Starts unassigned.
    Local,
    /// Assigned on entry, may be reassigned.
    Parameter,
    /// Assigned on entry, read-only.
    Constant,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct VarInfo {
    pub storage: VarStorage,
    /// Declared type, if the front end tracks one.
    pub ty: Option<TypeRef>,
    /// Declaring node.
    pub node: NodeId,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum JumpKind {
    Break,
    Continue,
}

impl JumpKind {
    #[must_use]
    pub const fn keyword(self) -> &'static str {
        match self {
            Self::Break => "break",
            Self::Continue => "continue",
        }
    }
}

/// The facts a jump carries to its destination.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct JumpDelta {
    assignments: FxHashMap<String, Assignment>,
    narrowings: FxHashMap<String, TypeRef>,
}

impl JumpDelta {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.assignments.is_empty() && self.narrowings.is_empty()
    }

    #[must_use]
    pub fn assignment(&self, name: &str) -> Option<Assignment> {
        self.assignments.get(name).copied()
    }

    #[must_use]
    pub fn narrowed(&self, name: &str) -> Option<TypeRef> {
        self.narrowings.get(name).copied()
    }
}

/// Proof of an `enter_*` call; hand it back to [`ValidationContext::exit`].
#[must_use = "every entered scope must be exited"]
#[derive(Debug, PartialEq, Eq)]
pub struct ScopeToken {
    id: u32,
}

impl ScopeToken {
    #[must_use]
    pub const fn id(&self) -> u32 {
        self.id
    }
}

type Names<T> = Rc<FxHashMap<String, T>>;

#[derive(Clone, Debug)]
struct Scope {
    id: u32,
    kind: ScopeKind,
    label: Option<String>,
    reachable: bool,
    vars: Names<VarInfo>,
    assignments: Names<Assignment>,
    /// Indexed by [`Branch::index`].
    narrowed: [Names<TypeRef>; 3],
    /// `If` only: whether the `[WhenFalse, WhenTrue]` forks completed.
    forks: [Option<bool>; 2],
    breaks: Vec<JumpDelta>,
    continues: Vec<JumpDelta>,
}

impl Scope {
    fn new(id: u32, kind: ScopeKind, label: Option<String>, reachable: bool) -> Self {
        Self {
            id,
            kind,
            label,
            reachable,
            vars: Rc::default(),
            assignments: Rc::default(),
            narrowed: Default::default(),
            forks: [None, None],
            breaks: Vec::new(),
            continues: Vec::new(),
        }
    }

    fn declares(&self, name: &str) -> bool {
        self.vars.contains_key(name)
    }

    fn is_reachable(&self) -> bool {
        match self.kind {
            // Unreachable only when both forks exist and neither completes.
            ScopeKind::If => {
                self.reachable && (self.forks[0] != Some(false) || self.forks[1] != Some(false))
            }
            _ => self.reachable,
        }
    }
}

/// Flow-sensitive facts for one validation attempt.
#[derive(Clone)]
pub struct ValidationContext<'l> {
    lattice: &'l dyn TypeLattice,
    scopes: Vec<Scope>,
    next_id: u32,
}

impl fmt::Debug for ValidationContext<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ValidationContext")
            .field("scopes", &self.scopes)
            .finish_non_exhaustive()
    }
}

impl<'l> ValidationContext<'l> {
    /// A context with one reachable root block.
    #[must_use]
    pub fn new(lattice: &'l dyn TypeLattice) -> Self {
        Self {
            lattice,
            scopes: vec![Scope::new(0, ScopeKind::Block, None, true)],
            next_id: 1,
        }
    }

    /// Number of scopes above the root.
    #[must_use]
    pub fn depth(&self) -> usize {
        self.scopes.len() - 1
    }

    #[must_use]
    pub fn scope_kind(&self) -> ScopeKind {
        self.top().kind
    }

    fn top(&self) -> &Scope {
        &self.scopes[self.scopes.len() - 1]
    }

    fn top_mut(&mut self) -> &mut Scope {
        let top = self.scopes.len() - 1;
        &mut self.scopes[top]
    }

    fn top_index(&self) -> usize {
        self.scopes.len() - 1
    }

    // =========================================================================
    // Entering and exiting scopes
    // =========================================================================

    fn push(&mut self, kind: ScopeKind, label: Option<&str>) -> ScopeToken {
        let id = self.next_id;
        self.next_id += 1;
        let reachable = self.is_reachable();
        trace!(kind = kind.name(), id, depth = self.scopes.len(), "enter scope");
        self.scopes
            .push(Scope::new(id, kind, label.map(str::to_string), reachable));
        ScopeToken { id }
    }

    pub fn enter(&mut self) -> ScopeToken {
        self.push(ScopeKind::Block, None)
    }

    pub fn enter_if(&mut self) -> ScopeToken {
        self.push(ScopeKind::If, None)
    }

    pub fn enter_fork(&mut self, when_true: bool) -> ScopeToken {
        self.push(
            ScopeKind::Fork {
                when_true,
                exclusive: false,
            },
            None,
        )
    }

    /// A `WhenTrue` fork whose `WhenFalse` side is known never to run.
    pub fn enter_exclusive_fork(&mut self) -> ScopeToken {
        self.push(
            ScopeKind::Fork {
                when_true: true,
                exclusive: true,
            },
            None,
        )
    }

    /// The right-hand side of `&&`; the left-hand side was validated in the
    /// current scope.
    pub fn enter_and(&mut self) -> ScopeToken {
        self.push(ScopeKind::And, None)
    }

    /// The right-hand side of `||`.
    pub fn enter_or(&mut self) -> ScopeToken {
        self.push(ScopeKind::Or, None)
    }

    pub fn enter_not(&mut self) -> ScopeToken {
        self.push(ScopeKind::Not, None)
    }

    pub fn enter_loop(&mut self, label: Option<&str>) -> ScopeToken {
        self.push(ScopeKind::Loop { infinite: false }, label)
    }

    /// A loop that only ends through `break`; without one, the code after it
    /// is unreachable.
    pub fn enter_infinite_loop(&mut self, label: Option<&str>) -> ScopeToken {
        self.push(ScopeKind::Loop { infinite: true }, label)
    }

    /// A speculative scope whose facts never reach the parent.
    pub fn enter_blackhole(&mut self) -> ScopeToken {
        self.push(ScopeKind::Blackhole, None)
    }

    /// Pop the innermost scope and promote its facts into the parent.
    pub fn exit(&mut self, token: ScopeToken) -> Result<(), FlowError> {
        let top = self.top_index();
        if top == 0 {
            return Err(FlowError::ExitRoot);
        }
        let innermost = self.scopes[top].id;
        if innermost != token.id {
            return Err(FlowError::Unbalanced {
                innermost,
                exited: token.id,
            });
        }

        match self.scopes[top].kind {
            ScopeKind::If => self.settle_if(top),
            ScopeKind::Loop { .. } => {
                let continues = std::mem::take(&mut self.scopes[top].continues);
                for delta in continues {
                    self.merge_at(top, delta);
                }
            }
            _ => {}
        }

        let Some(inner) = self.scopes.pop() else {
            return Err(FlowError::ExitRoot);
        };
        let completes = inner.is_reachable();
        trace!(kind = inner.kind.name(), id = inner.id, completes, "exit scope");

        let parent = self.top_index();
        match inner.kind {
            ScopeKind::Blackhole => {}
            ScopeKind::Fork {
                when_true,
                exclusive,
            } => {
                self.promote_assignments(&inner, parent, completes);
                if completes {
                    self.promote_narrowings(&inner, parent);
                }
                let scope = &mut self.scopes[parent];
                if scope.kind == ScopeKind::If {
                    scope.forks[usize::from(when_true)] = Some(completes);
                    if exclusive {
                        scope.forks[0] = Some(false);
                    }
                }
            }
            ScopeKind::Loop { infinite } => {
                // An infinite loop is only left through its breaks, which
                // carry their own facts.
                if !infinite {
                    self.promote_assignments(&inner, parent, completes);
                    if completes {
                        self.promote_narrowings(&inner, parent);
                    }
                }
                if infinite || !completes {
                    self.scopes[parent].reachable = false;
                }
                for delta in inner.breaks {
                    self.merge_at(parent, delta);
                }
            }
            _ => {
                self.promote_assignments(&inner, parent, completes);
                if completes {
                    self.promote_narrowings(&inner, parent);
                } else {
                    self.scopes[parent].reachable = false;
                }
            }
        }
        Ok(())
    }

    /// Check that every entered scope was exited.
    pub fn finish(&self) -> Result<(), FlowError> {
        match self.depth() {
            0 => Ok(()),
            open => Err(FlowError::Unclosed(open)),
        }
    }

    /// Discard the facts of a fork that cannot complete: the surviving
    /// outcome becomes both outcomes.
    fn settle_if(&mut self, index: usize) {
        let scope = &mut self.scopes[index];
        if !scope.is_reachable() {
            return;
        }
        let dead_true = match scope.forks {
            [_, Some(false)] => true,
            [Some(false), _] => false,
            _ => return,
        };
        let survivor = !dead_true;
        trace!(id = scope.id, survivor, "discarding unreachable fork");

        if !scope.assignments.is_empty() {
            for asn in Rc::make_mut(&mut scope.assignments).values_mut() {
                *asn = asn.when(survivor);
            }
        }
        let kept = Rc::clone(&scope.narrowed[Branch::of(survivor).index()]);
        scope.narrowed[Branch::of(dead_true).index()] = kept;
    }

    fn promote_assignments(&mut self, inner: &Scope, parent: usize, completes: bool) {
        for (name, &asn) in inner.assignments.iter() {
            if inner.declares(name) {
                continue;
            }
            let outer = self.lookup_assignment(parent, name).unwrap_or(asn);
            let mut value = if completes {
                inner.kind.promote(asn, outer)
            } else {
                let value = asn.promote_from_non_completing(outer);
                match inner.kind {
                    ScopeKind::Fork { when_true, .. } => outer.join_fork(value, when_true),
                    _ => value,
                }
            };
            if inner.kind.demuxes() {
                value = value.demux();
            }
            Rc::make_mut(&mut self.scopes[parent].assignments).insert(name.clone(), value);
        }
    }

    fn promote_narrowings(&mut self, inner: &Scope, parent: usize) {
        use Branch::{Always, WhenFalse, WhenTrue};

        match inner.kind {
            ScopeKind::Fork { when_true, .. } => {
                self.put_narrowings(inner, Always, parent, Branch::of(when_true));
            }
            ScopeKind::And => {
                self.widen_narrowings(inner, WhenFalse, parent, WhenFalse);
                self.put_narrowings(inner, Always, parent, WhenTrue);
                self.put_narrowings(inner, WhenTrue, parent, WhenTrue);
            }
            ScopeKind::Or => {
                self.widen_narrowings(inner, WhenTrue, parent, WhenTrue);
                self.put_narrowings(inner, Always, parent, WhenFalse);
                self.put_narrowings(inner, WhenFalse, parent, WhenFalse);
            }
            ScopeKind::Not => {
                self.put_narrowings(inner, Always, parent, Always);
                self.put_narrowings(inner, WhenTrue, parent, WhenFalse);
                self.put_narrowings(inner, WhenFalse, parent, WhenTrue);
            }
            ScopeKind::If => {
                self.put_narrowings(inner, Always, parent, Always);
                // A name narrowed on both outcomes keeps the wider type.
                let when_false = &inner.narrowed[WhenFalse.index()];
                for (name, &ty_true) in inner.narrowed[WhenTrue.index()].iter() {
                    let Some(&ty_false) = when_false.get(name) else {
                        continue;
                    };
                    if inner.declares(name) {
                        continue;
                    }
                    let Some(ty) = wider(self.lattice, ty_true, ty_false) else {
                        continue;
                    };
                    if self.lookup_narrowed(parent, name, Always) != Some(ty) {
                        Rc::make_mut(&mut self.scopes[parent].narrowed[Always.index()])
                            .insert(name.clone(), ty);
                    }
                }
            }
            _ => self.put_narrowings(inner, Always, parent, Always),
        }
    }

    fn put_narrowings(&mut self, inner: &Scope, from: Branch, parent: usize, to: Branch) {
        let source = &inner.narrowed[from.index()];
        if source.is_empty() {
            return;
        }
        let target = Rc::make_mut(&mut self.scopes[parent].narrowed[to.index()]);
        for (name, &ty) in source.iter() {
            if !inner.declares(name) {
                target.insert(name.clone(), ty);
            }
        }
    }

    /// Keep only the parent narrowings the inner scope also makes, widened.
    fn widen_narrowings(&mut self, inner: &Scope, from: Branch, parent: usize, to: Branch) {
        if self.scopes[parent].narrowed[to.index()].is_empty() {
            return;
        }
        let lattice = self.lattice;
        let source = &inner.narrowed[from.index()];
        let target = Rc::make_mut(&mut self.scopes[parent].narrowed[to.index()]);
        target.retain(|name, ty| match source.get(name) {
            Some(&other) => match wider(lattice, *ty, other) {
                Some(widened) => {
                    *ty = widened;
                    true
                }
                None => false,
            },
            None => false,
        });
    }

    // =========================================================================
    // Lookups
    // =========================================================================

    fn lookup_var(&self, index: usize, name: &str) -> Option<VarInfo> {
        self.scopes[..=index]
            .iter()
            .rev()
            .find_map(|scope| scope.vars.get(name).copied())
    }

    fn lookup_assignment(&self, index: usize, name: &str) -> Option<Assignment> {
        let found = (0..=index)
            .rev()
            .find(|&i| self.scopes[i].assignments.contains_key(name))?;
        let mut asn = self.scopes[found].assignments.get(name).copied()?;
        for scope in &self.scopes[found + 1..=index] {
            asn = scope.kind.project(asn);
        }
        Some(asn)
    }

    fn lookup_narrowed(&self, index: usize, name: &str, branch: Branch) -> Option<TypeRef> {
        let mut branch = branch;
        for scope in self.scopes[..=index].iter().rev() {
            if branch != Branch::Always {
                if let Some(&ty) = scope.narrowed[branch.index()].get(name) {
                    return Some(ty);
                }
            }
            if let Some(&ty) = scope.narrowed[Branch::Always.index()].get(name) {
                return Some(ty);
            }
            if let Some(var) = scope.vars.get(name) {
                return var.ty;
            }
            branch = scope.kind.outer_branch(branch);
        }
        None
    }

    // =========================================================================
    // Variables
    // =========================================================================

    /// Declare a variable in the innermost scope. Redeclaring a visible name
    /// is `VAR_DEFINED`; `_` can always be redeclared.
    pub fn register_var(
        &mut self,
        at: NodeId,
        name: &str,
        storage: VarStorage,
        ty: Option<TypeRef>,
        errs: &mut DiagnosticSink,
    ) -> bool {
        if name != "_" && self.lookup_var(self.top_index(), name).is_some() {
            errs.log_code(diagnostic_codes::VAR_DEFINED, at, name, &[name]);
            return false;
        }
        let asn = match storage {
            VarStorage::Local => Assignment::UNASSIGNED,
            VarStorage::Parameter | VarStorage::Constant => Assignment::ASSIGNED_ONCE,
        };
        let scope = self.top_mut();
        Rc::make_mut(&mut scope.vars).insert(
            name.to_string(),
            VarInfo {
                storage,
                ty,
                node: at,
            },
        );
        Rc::make_mut(&mut scope.assignments).insert(name.to_string(), asn);
        for map in &mut scope.narrowed {
            if map.contains_key(name) {
                Rc::make_mut(map).remove(name);
            }
        }
        true
    }

    #[must_use]
    pub fn var(&self, name: &str) -> Option<VarInfo> {
        self.lookup_var(self.top_index(), name)
    }

    #[must_use]
    pub fn is_var_declared_in_scope(&self, name: &str) -> bool {
        self.top().declares(name)
    }

    #[must_use]
    pub fn get_var_assignment(&self, name: &str) -> Option<Assignment> {
        self.lookup_assignment(self.top_index(), name)
    }

    pub fn set_var_assignment(&mut self, name: &str, asn: impl Into<Assignment>) {
        Rc::make_mut(&mut self.top_mut().assignments).insert(name.to_string(), asn.into());
    }

    /// Check a read. Reads in unreachable code are not checked.
    pub fn mark_var_read(&self, at: NodeId, name: &str, errs: &mut DiagnosticSink) -> bool {
        if !self.is_reachable() {
            return true;
        }
        let top = self.top_index();
        if self.lookup_var(top, name).is_none() {
            errs.log_code(diagnostic_codes::VAR_UNDEFINED, at, name, &[name]);
            return false;
        }
        match self.lookup_assignment(top, name) {
            Some(asn) if asn.is_definitely_assigned() => true,
            _ => {
                errs.log_code(diagnostic_codes::VAR_UNASSIGNED, at, name, &[name]);
                false
            }
        }
    }

    /// Record a write. A conditional write (`x := next()`) assigns the
    /// variable only on the `WhenTrue` outcome. Any narrowing of the variable
    /// falls back to its declared type.
    pub fn mark_var_write(
        &mut self,
        at: NodeId,
        name: &str,
        conditional: bool,
        errs: &mut DiagnosticSink,
    ) -> bool {
        let top = self.top_index();
        let Some(var) = self.lookup_var(top, name) else {
            errs.log_code(diagnostic_codes::VAR_UNDEFINED, at, name, &[name]);
            return false;
        };
        if var.storage == VarStorage::Constant {
            errs.log_code(diagnostic_codes::VAR_ASSIGNMENT_ILLEGAL, at, name, &[name]);
            return false;
        }

        let current = self
            .lookup_assignment(top, name)
            .unwrap_or(Assignment::UNASSIGNED);
        let value = if conditional {
            Assignment::split(current, current.when_true().apply_assignment())
        } else {
            current.apply_assignment()
        };

        let scope = self.top_mut();
        Rc::make_mut(&mut scope.assignments).insert(name.to_string(), value);
        for branch in [Branch::WhenTrue, Branch::WhenFalse] {
            if scope.narrowed[branch.index()].contains_key(name) {
                Rc::make_mut(&mut scope.narrowed[branch.index()]).remove(name);
            }
        }
        if let Some(ty) = var.ty {
            Rc::make_mut(&mut scope.narrowed[Branch::Always.index()]).insert(name.to_string(), ty);
        }
        true
    }

    // =========================================================================
    // Narrowing
    // =========================================================================

    /// Record that `name` has type `ty` on `branch` of the current scope.
    pub fn narrow(
        &mut self,
        at: NodeId,
        name: &str,
        branch: Branch,
        ty: TypeRef,
        errs: &mut DiagnosticSink,
    ) -> bool {
        let top = self.top_index();
        let Some(var) = self.lookup_var(top, name) else {
            errs.log_code(diagnostic_codes::VAR_UNDEFINED, at, name, &[name]);
            return false;
        };
        if let Some(declared) = var.ty {
            if !self.lattice.is_a(ty, declared) {
                errs.log_code(diagnostic_codes::NARROWING_CONFLICT, at, name, &[name]);
                return false;
            }
        }
        let narrowed = match self.lookup_narrowed(top, name, branch) {
            Some(current) if !self.lattice.is_a(ty, current) => {
                match self.lattice.intersect(current, ty) {
                    Some(both) => both,
                    None => {
                        errs.log_code(diagnostic_codes::NARROWING_CONFLICT, at, name, &[name]);
                        return false;
                    }
                }
            }
            _ => ty,
        };
        trace!(var = name, ?branch, ty = %narrowed, "narrow");
        Rc::make_mut(&mut self.top_mut().narrowed[branch.index()])
            .insert(name.to_string(), narrowed);
        true
    }

    /// The type of `name` as seen by unconditional code in the current scope.
    #[must_use]
    pub fn narrowed_type(&self, name: &str) -> Option<TypeRef> {
        self.narrowed_type_in(name, Branch::Always)
    }

    #[must_use]
    pub fn narrowed_type_in(&self, name: &str, branch: Branch) -> Option<TypeRef> {
        self.lookup_narrowed(self.top_index(), name, branch)
    }

    /// Make one outcome of the current scope unconditional, as an assertion
    /// does for its `WhenTrue` outcome.
    pub fn promote_branch(&mut self, branch: Branch) {
        if branch == Branch::Always {
            return;
        }
        let scope = self.top_mut();
        let source = std::mem::take(&mut scope.narrowed[branch.index()]);
        scope.narrowed[branch.complement().index()] = Rc::default();
        if !source.is_empty() {
            let always = Rc::make_mut(&mut scope.narrowed[Branch::Always.index()]);
            for (name, &ty) in source.iter() {
                always.insert(name.clone(), ty);
            }
        }
        if !scope.assignments.is_empty() {
            let when_true = branch == Branch::WhenTrue;
            for asn in Rc::make_mut(&mut scope.assignments).values_mut() {
                *asn = asn.when(when_true);
            }
        }
    }

    // =========================================================================
    // Reachability and jumps
    // =========================================================================

    #[must_use]
    pub fn is_reachable(&self) -> bool {
        self.top().is_reachable()
    }

    /// Mark the rest of the current scope unreachable. Reachability only comes
    /// back through [`ValidationContext::merge`].
    pub fn set_reachable(&mut self, reachable: bool) {
        if !reachable {
            trace!(id = self.top().id, "unreachable");
            self.top_mut().reachable = false;
        }
    }

    /// Warn once per statement that follows a non-completing one.
    pub fn check_reachable(&self, at: NodeId, subject: &str, errs: &mut DiagnosticSink) -> bool {
        if self.is_reachable() {
            return true;
        }
        errs.log_code(diagnostic_codes::UNREACHABLE_CODE, at, subject, &[subject]);
        false
    }

    /// The facts a jump from here to the scope of `target` has to carry.
    pub fn prepare_jump(&self, target: &ScopeToken) -> Result<JumpDelta, FlowError> {
        let index = self
            .scopes
            .iter()
            .rposition(|scope| scope.id == target.id)
            .ok_or(FlowError::UnknownTarget(target.id))?;
        Ok(self.delta_to(index))
    }

    /// Merge a jump delta into the current scope.
    pub fn merge(&mut self, delta: JumpDelta) {
        let top = self.top_index();
        self.merge_at(top, delta);
    }

    /// `break` or `continue` to the nearest loop, or to the loop labelled
    /// `label`. The current scope becomes unreachable.
    pub fn jump(
        &mut self,
        at: NodeId,
        kind: JumpKind,
        label: Option<&str>,
        errs: &mut DiagnosticSink,
    ) -> bool {
        let target = self.scopes.iter().rposition(|scope| {
            matches!(scope.kind, ScopeKind::Loop { .. })
                && label.is_none_or(|label| scope.label.as_deref() == Some(label))
        });
        let Some(target) = target else {
            let subject = label.unwrap_or(kind.keyword());
            errs.log_code(diagnostic_codes::MISSING_JUMP_TARGET, at, subject, &[subject]);
            return false;
        };

        if !self.is_reachable() {
            // dead code contributes no edge to the target
            trace!(kind = kind.keyword(), target = self.scopes[target].id, "jump from unreachable code");
            return true;
        }

        trace!(kind = kind.keyword(), target = self.scopes[target].id, "jump");
        match kind {
            JumpKind::Continue => {
                let delta = self.delta_to(target);
                self.scopes[target].continues.push(delta);
            }
            JumpKind::Break => {
                // The root scope is never a loop, so the loop has a parent.
                let delta = self.delta_to(target - 1);
                self.scopes[target].breaks.push(delta);
            }
        }
        self.top_mut().reachable = false;
        true
    }

    fn delta_to(&self, dest: usize) -> JumpDelta {
        let top = self.top_index();
        if !self.scopes[top].is_reachable() && self.scopes[dest].is_reachable() {
            return JumpDelta::default();
        }

        let mut delta = JumpDelta::default();
        let mut demux = false;
        for scope in self.scopes[dest + 1..=top].iter().rev() {
            if scope.kind == ScopeKind::Blackhole {
                return JumpDelta::default();
            }
            delta.assignments.retain(|name, _| !scope.declares(name));
            delta.narrowings.retain(|name, _| !scope.declares(name));
            for name in scope.assignments.keys() {
                if scope.declares(name) || delta.assignments.contains_key(name) {
                    continue;
                }
                if let Some(asn) = self.lookup_assignment(top, name) {
                    delta.assignments.insert(name.clone(), asn);
                }
            }
            for name in scope.narrowed[Branch::Always.index()].keys() {
                if scope.declares(name) || delta.narrowings.contains_key(name) {
                    continue;
                }
                if let Some(ty) = self.lookup_narrowed(top, name, Branch::Always) {
                    delta.narrowings.insert(name.clone(), ty);
                }
            }
            demux |= scope.kind.demuxes();
        }
        if demux {
            for asn in delta.assignments.values_mut() {
                *asn = asn.demux();
            }
        }
        delta
    }

    fn merge_at(&mut self, index: usize, delta: JumpDelta) {
        if !self.scopes[index].is_reachable() {
            let scope = &mut self.scopes[index];
            Rc::make_mut(&mut scope.assignments).extend(delta.assignments);
            Rc::make_mut(&mut scope.narrowed[Branch::Always.index()]).extend(delta.narrowings);
            scope.reachable = true;
            return;
        }

        for (name, asn) in delta.assignments {
            let joined = self
                .lookup_assignment(index, &name)
                .map_or(asn, |old| old.join(asn));
            Rc::make_mut(&mut self.scopes[index].assignments).insert(name, joined);
        }
        for (name, ty) in delta.narrowings {
            let current = self.lookup_narrowed(index, &name, Branch::Always);
            let declared = self.lookup_var(index, &name).and_then(|var| var.ty);
            let merged = current
                .and_then(|current| wider(self.lattice, current, ty))
                .or(declared);
            if let Some(merged) = merged {
                Rc::make_mut(&mut self.scopes[index].narrowed[Branch::Always.index()])
                    .insert(name, merged);
            }
        }
    }
}
