//! Definite-assignment lattice.
//!
//! An [`Assignment`] describes what is known about a variable at one point of
//! the program. Because a boolean expression can assign a variable on only one
//! of its outcomes (`x := next()` assigns `x` only when it yields `true`), the
//! value is *split*: one [`Facts`] triple for the `WhenFalse` outcome and one
//! for the `WhenTrue` outcome. Statement-level code only ever sees uniform
//! values; the split form lives inside conditions until a scope demuxes it.
//!
//! | Value           | unassigned | assigned | exactly once |
//! |-----------------|:----------:|:--------:|:------------:|
//! | `UNASSIGNED`    |     x      |          |              |
//! | `UNKNOWN_ONCE`  |            |          |      x       |
//! | `UNKNOWN`       |            |          |              |
//! | `ASSIGNED_ONCE` |            |    x     |      x       |
//! | `ASSIGNED`      |            |    x     |              |

use bitflags::bitflags;

bitflags! {
    /// Facts about a variable on one outcome of a condition.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub struct Facts: u8 {
        /// No path to this point assigned the variable.
        const UNASSIGNED = 0b100;
        /// Every path to this point assigned the variable.
        const ASSIGNED = 0b010;
        /// No path to this point assigned the variable more than once.
        const ONCE = 0b001;
    }
}

impl Facts {
    const fn applied(self) -> Self {
        if self.contains(Self::UNASSIGNED) {
            Self::ASSIGNED.union(Self::ONCE)
        } else {
            Self::ASSIGNED
        }
    }
}

/// Coarse status of a variable, as reported to users of the context.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum AssignmentStatus {
    Unassigned,
    AssignedOnce,
    AssignedMultiple,
    Unknown,
}

/// Split definite-assignment value.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Assignment {
    when_false: Facts,
    when_true: Facts,
}

impl Assignment {
    pub const UNASSIGNED: Self = Self::uniform(Facts::UNASSIGNED);
    pub const UNKNOWN_ONCE: Self = Self::uniform(Facts::ONCE);
    pub const UNKNOWN: Self = Self::uniform(Facts::empty());
    pub const ASSIGNED_ONCE: Self = Self::uniform(Facts::ASSIGNED.union(Facts::ONCE));
    pub const ASSIGNED: Self = Self::uniform(Facts::ASSIGNED);

    const fn uniform(facts: Facts) -> Self {
        Self {
            when_false: facts,
            when_true: facts,
        }
    }

    #[must_use]
    pub const fn from_sides(when_false: Facts, when_true: Facts) -> Self {
        Self {
            when_false,
            when_true,
        }
    }

    /// Build a split value from the summaries of two outcome values.
    #[must_use]
    pub const fn split(when_false: Self, when_true: Self) -> Self {
        Self {
            when_false: when_false.summary(),
            when_true: when_true.summary(),
        }
    }

    #[must_use]
    pub const fn is_split(self) -> bool {
        self.when_false.bits() != self.when_true.bits()
    }

    #[must_use]
    pub const fn false_facts(self) -> Facts {
        self.when_false
    }

    #[must_use]
    pub const fn true_facts(self) -> Facts {
        self.when_true
    }

    #[must_use]
    pub const fn is_definitely_unassigned(self) -> bool {
        self.when_false.contains(Facts::UNASSIGNED) && self.when_true.contains(Facts::UNASSIGNED)
    }

    #[must_use]
    pub const fn is_definitely_assigned(self) -> bool {
        self.when_false.contains(Facts::ASSIGNED) && self.when_true.contains(Facts::ASSIGNED)
    }

    /// Whether the variable is assigned at most once on every path. An
    /// outcome on which it is still unassigned does not contradict this.
    #[must_use]
    pub const fn is_effectively_final(self) -> bool {
        let once_false = self.when_false.contains(Facts::ONCE);
        let once_true = self.when_true.contains(Facts::ONCE);
        (once_false && once_true)
            || (once_false && self.when_true.contains(Facts::UNASSIGNED))
            || (self.when_false.contains(Facts::UNASSIGNED) && once_true)
    }

    /// The facts that hold regardless of the outcome.
    #[must_use]
    pub const fn summary(self) -> Facts {
        let mut facts = Facts::empty();
        if self.is_definitely_unassigned() {
            facts = facts.union(Facts::UNASSIGNED);
        }
        if self.is_definitely_assigned() {
            facts = facts.union(Facts::ASSIGNED);
        }
        if self.is_effectively_final() {
            facts = facts.union(Facts::ONCE);
        }
        facts
    }

    #[must_use]
    pub const fn status(self) -> AssignmentStatus {
        let facts = self.summary();
        if facts.contains(Facts::UNASSIGNED) {
            AssignmentStatus::Unassigned
        } else if facts.contains(Facts::ASSIGNED) {
            if facts.contains(Facts::ONCE) {
                AssignmentStatus::AssignedOnce
            } else {
                AssignmentStatus::AssignedMultiple
            }
        } else {
            AssignmentStatus::Unknown
        }
    }

    /// The state after the variable is assigned.
    #[must_use]
    pub const fn apply_assignment(self) -> Self {
        Self {
            when_false: self.when_false.applied(),
            when_true: self.when_true.applied(),
        }
    }

    /// Meet of two values reaching the same point.
    #[must_use]
    pub const fn join(self, that: Self) -> Self {
        Self {
            when_false: self.when_false.intersection(that.when_false),
            when_true: self.when_true.intersection(that.when_true),
        }
    }

    /// Replace one outcome with the summary of a fork that ran on that outcome.
    #[must_use]
    pub const fn join_fork(self, that: Self, when_true: bool) -> Self {
        if when_true {
            Self {
                when_false: self.when_false,
                when_true: that.summary(),
            }
        } else {
            Self {
                when_false: that.summary(),
                when_true: self.when_true,
            }
        }
    }

    /// Combine the state before a loop (`self`) with the state at the end of
    /// its body. A body that changed the value may run again, so "once" is lost.
    #[must_use]
    pub const fn join_loop(self, that: Self) -> Self {
        Self {
            when_false: loop_side(self.when_false, that.when_false),
            when_true: loop_side(self.when_true, that.when_true),
        }
    }

    /// Apply the value from a scope that never completes to the value
    /// outside it (`that`).
    #[must_use]
    pub const fn promote_from_non_completing(self, that: Self) -> Self {
        Self {
            when_false: non_completing_side(self.when_false, that.when_false),
            when_true: non_completing_side(self.when_true, that.when_true),
        }
    }

    #[must_use]
    pub const fn negate(self) -> Self {
        Self {
            when_false: self.when_true,
            when_true: self.when_false,
        }
    }

    /// Collapse a split value into a uniform one.
    #[must_use]
    pub const fn demux(self) -> Self {
        Self::uniform(self.summary())
    }

    #[must_use]
    pub const fn when_true(self) -> Self {
        Self::uniform(self.when_true)
    }

    #[must_use]
    pub const fn when_false(self) -> Self {
        Self::uniform(self.when_false)
    }

    /// Project onto one outcome.
    #[must_use]
    pub const fn when(self, when_true: bool) -> Self {
        if when_true {
            self.when_true()
        } else {
            self.when_false()
        }
    }
}

impl From<AssignmentStatus> for Assignment {
    fn from(status: AssignmentStatus) -> Self {
        match status {
            AssignmentStatus::Unassigned => Self::UNASSIGNED,
            AssignmentStatus::AssignedOnce => Self::ASSIGNED_ONCE,
            AssignmentStatus::AssignedMultiple => Self::ASSIGNED,
            AssignmentStatus::Unknown => Self::UNKNOWN,
        }
    }
}

const fn loop_side(before: Facts, after: Facts) -> Facts {
    if before.bits() == after.bits() {
        before
    } else {
        after.difference(Facts::ONCE)
    }
}

const fn non_completing_side(inner: Facts, outer: Facts) -> Facts {
    if inner.contains(Facts::ONCE) && !outer.contains(Facts::ONCE) {
        inner.difference(Facts::ONCE)
    } else {
        inner
    }
}
