//! Synchronization store: value mapping, skip classification, and the
//! assumed-equal cycle guard.

use rustc_hash::{FxHashMap, FxHashSet};
use semdiff_ir::{Constant, FuncId, InstId, Operand};

use crate::report::Decision;

/// Which side of the comparison a value belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Side {
    L,
    R,
}

impl Side {
    /// The opposite side.
    pub const fn other(self) -> Self {
        match self {
            Self::L => Self::R,
            Self::R => Self::L,
        }
    }
}

/// Side-scoped identity of a non-constant value. Instructions and arguments
/// are qualified by their owning function so values stay distinct across
/// speculative inline comparison.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum ValueRef {
    Inst { func: FuncId, inst: InstId },
    Arg { func: FuncId, index: u32 },
    Global(String),
}

impl ValueRef {
    /// Create an instruction reference.
    pub const fn inst(func: FuncId, inst: InstId) -> Self {
        Self::Inst { func, inst }
    }
}

/// A resolved operand on one side: either an identity-carrying reference or
/// an inline constant.
#[derive(Clone, Debug, PartialEq)]
pub enum RValue {
    Ref(ValueRef),
    Const(Constant),
}

impl RValue {
    /// Resolve an operand in the context of its owning function, without
    /// applying replacements.
    pub fn from_operand(func: FuncId, op: &Operand) -> Self {
        match op {
            Operand::Inst(id) => Self::Ref(ValueRef::inst(func, *id)),
            Operand::Arg(index) => Self::Ref(ValueRef::Arg {
                func,
                index: *index,
            }),
            Operand::Const(c) => Self::Const(c.clone()),
            Operand::Global(name) => Self::Ref(ValueRef::Global(name.clone())),
        }
    }

    /// Get the reference, if this is not a constant.
    pub const fn as_ref(&self) -> Option<&ValueRef> {
        match self {
            Self::Ref(r) => Some(r),
            Self::Const(_) => None,
        }
    }
}

/// Mutable bookkeeping of one comparison: synchronization numbers, skip
/// classification, and in-flight recursion guards. Created fresh per
/// function pair. Cloning the whole store is the snapshot primitive for
/// speculative attempts; restoring a snapshot is exact by construction.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SyncStore {
    next_sn: u32,
    sn: FxHashMap<(Side, ValueRef), u32>,
    by_sn: FxHashMap<u32, (ValueRef, ValueRef)>,
    skipped: FxHashSet<(Side, ValueRef)>,
    ignored: FxHashSet<(Side, ValueRef)>,
    replaced: FxHashMap<(Side, ValueRef), RValue>,
    assumed_equal: Vec<(ValueRef, ValueRef)>,
    equal_insts: FxHashSet<(ValueRef, ValueRef)>,
    inverse_conds: FxHashSet<(ValueRef, ValueRef)>,
}

impl SyncStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Compare two values by synchronization. Assigns a fresh sn when
    /// neither side is mapped; otherwise both sides must already map to
    /// each other.
    pub fn map_values(&mut self, l: ValueRef, r: ValueRef) -> Decision {
        match (
            self.sn.get(&(Side::L, l.clone())),
            self.sn.get(&(Side::R, r.clone())),
        ) {
            (None, None) => {
                let sn = self.next_sn;
                self.next_sn += 1;
                self.sn.insert((Side::L, l.clone()), sn);
                self.sn.insert((Side::R, r.clone()), sn);
                self.by_sn.insert(sn, (l, r));
                Decision::Equal
            }
            (Some(a), Some(b)) if a == b => Decision::Equal,
            _ => Decision::NotEqual,
        }
    }

    /// The synchronization number of a value, if assigned.
    pub fn sn_of(&self, side: Side, value: &ValueRef) -> Option<u32> {
        self.sn.get(&(side, value.clone())).copied()
    }

    /// The counterpart mapped to `value`, or `None` when unmapped.
    pub fn mapped(&self, side: Side, value: &ValueRef) -> Option<&ValueRef> {
        let sn = self.sn_of(side, value)?;
        let (l, r) = self.by_sn.get(&sn)?;
        Some(match side {
            Side::L => r,
            Side::R => l,
        })
    }

    /// Number of assigned synchronization numbers.
    pub fn sn_count(&self) -> usize {
        self.by_sn.len()
    }

    /// The pair assigned to a synchronization number.
    pub fn pair_of_sn(&self, sn: u32) -> Option<&(ValueRef, ValueRef)> {
        self.by_sn.get(&sn)
    }

    /// Record that an instruction pair compared equal.
    pub fn note_equal(&mut self, l: ValueRef, r: ValueRef) {
        self.equal_insts.insert((l, r));
    }

    /// Check if two instructions were already compared as equal.
    pub fn already_equal(&self, l: &ValueRef, r: &ValueRef) -> bool {
        self.equal_insts.contains(&(l.clone(), r.clone()))
    }

    /// Classify a value as skipped (deferred; may still match later).
    pub fn mark_skipped(&mut self, side: Side, value: ValueRef) {
        self.skipped.insert((side, value));
    }

    /// Classify a value as permanently excluded from comparison.
    pub fn mark_ignored(&mut self, side: Side, value: ValueRef) {
        self.ignored.insert((side, value));
    }

    /// Check if a value was skipped.
    pub fn is_skipped(&self, side: Side, value: &ValueRef) -> bool {
        self.skipped.contains(&(side, value.clone()))
    }

    /// Check if a value was permanently ignored.
    pub fn is_ignored(&self, side: Side, value: &ValueRef) -> bool {
        self.ignored.contains(&(side, value.clone()))
    }

    /// Redirect all future comparisons of `value` to `replacement`.
    pub fn set_replacement(&mut self, side: Side, value: ValueRef, replacement: RValue) {
        self.replaced.insert((side, value), replacement);
    }

    /// Resolve a value through the replacement map, following chains.
    pub fn resolve(&self, side: Side, value: RValue) -> RValue {
        let mut current = value;
        // Chains are short; the bound guards against accidental cycles.
        for _ in 0..64 {
            match &current {
                RValue::Ref(r) => match self.replaced.get(&(side, r.clone())) {
                    Some(next) => current = next.clone(),
                    None => return current,
                },
                RValue::Const(_) => return current,
            }
        }
        current
    }

    /// Push an in-flight pair before recursive descent.
    pub fn assume_equal(&mut self, l: ValueRef, r: ValueRef) {
        self.assumed_equal.push((l, r));
    }

    /// Pop the most recent in-flight pair. Must be called on every exit
    /// path of a recursive comparison.
    pub fn pop_assumed(&mut self) {
        self.assumed_equal.pop();
    }

    /// Check whether a pair is currently assumed equal (cycle guard).
    pub fn is_assumed_equal(&self, l: &ValueRef, r: &ValueRef) -> bool {
        self.assumed_equal
            .iter()
            .any(|(a, b)| a == l && b == r)
    }

    /// Record an inverse-condition pair.
    pub fn note_inverse_cond(&mut self, l: ValueRef, r: ValueRef) {
        self.inverse_conds.insert((l, r));
    }

    /// Check whether a pair was matched with inverted predicates.
    pub fn is_inverse_cond(&self, l: &ValueRef, r: &ValueRef) -> bool {
        self.inverse_conds.contains(&(l.clone(), r.clone()))
    }

    /// Snapshot the entire store for a speculative attempt.
    pub fn snapshot(&self) -> Self {
        self.clone()
    }

    /// Restore a snapshot taken before a failed speculative attempt.
    pub fn restore(&mut self, snapshot: Self) {
        *self = snapshot;
    }
}
