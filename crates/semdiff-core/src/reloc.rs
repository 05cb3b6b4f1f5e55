//! Relocation window state and the aliasing-hazard check.

use semdiff_ir::{BlockId, Function, InstKind, Instruction, Module, Operand};

use crate::config::HazardGranularity;
use crate::heuristics::gep_byte_offset;
use crate::sync::Side;

/// An active relocation window: a contiguous instruction span within one
/// side's current block that appears to have been moved.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RelocWindow {
    /// Side owning the span.
    pub side: Side,
    /// Block the span lives in.
    pub block: BlockId,
    /// Next unmatched span position (index into the block's instructions).
    pub begin: usize,
    /// End of the span, exclusive.
    pub end: usize,
}

/// Relocation state machine. At most one window is active per block-pair
/// walk.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum RelocState {
    /// No unresolved relocation.
    #[default]
    None,
    /// A span was stored; the other side has not started matching it yet.
    Stored(RelocWindow),
    /// The other side is currently matching instructions against the span.
    Matching(RelocWindow),
}

impl RelocState {
    /// Check whether a window is active.
    pub const fn is_active(&self) -> bool {
        !matches!(self, Self::None)
    }

    /// The active window, if any.
    pub const fn window(&self) -> Option<&RelocWindow> {
        match self {
            Self::None => None,
            Self::Stored(w) | Self::Matching(w) => Some(w),
        }
    }

    /// Clear the window.
    pub fn clear(&mut self) {
        *self = Self::None;
    }
}

/// Resolved memory location: the root object a pointer chain starts at and,
/// when computable, the constant byte offset into it.
#[derive(Clone, Debug, PartialEq)]
pub struct MemLoc {
    pub root: Operand,
    pub offset: Option<u64>,
    pub root_is_alloca: bool,
}

/// Trace a pointer operand through GEP and cast chains to its root object.
pub fn memory_location(module: &Module, func: &Function, ptr: &Operand) -> MemLoc {
    let mut current = ptr.clone();
    let mut offset: Option<u64> = Some(0);
    // Chains in real code are short; the bound guards against cycles in
    // malformed input.
    for _ in 0..64 {
        match &current {
            Operand::Inst(id) => match &func.inst(*id).kind {
                InstKind::Gep {
                    source,
                    base,
                    indices,
                } => {
                    offset = match (
                        offset,
                        gep_byte_offset(module, func, source, indices),
                    ) {
                        (Some(acc), Some(step)) => acc.checked_add(step),
                        _ => None,
                    };
                    current = base.clone();
                }
                InstKind::Cast { value, .. } => {
                    current = value.clone();
                }
                _ => break,
            },
            _ => break,
        }
    }
    let root_is_alloca = matches!(
        &current,
        Operand::Inst(id) if matches!(func.inst(*id).kind, InstKind::Alloca { .. })
    );
    MemLoc {
        root: current,
        offset,
        root_is_alloca,
    }
}

/// Check whether relocating `moved` past `skipped` is unsound: both touch
/// the same location with conflicting load/store roles. Calls are treated
/// as touching unknown memory.
pub fn may_conflict(
    module: &Module,
    func: &Function,
    skipped: &Instruction,
    moved: &Instruction,
    granularity: HazardGranularity,
) -> bool {
    if skipped.is_call() || moved.is_call() {
        // A call's effects are unknown; conflict with any memory access.
        let other = if skipped.is_call() { moved } else { skipped };
        return other.is_call() || other.memory_access().is_some();
    }
    let (Some(a), Some(b)) = (skipped.memory_access(), moved.memory_access()) else {
        return false;
    };
    if a.is_store == b.is_store {
        // Conflicting roles require one load and one store.
        return false;
    }
    let loc_a = memory_location(module, func, a.ptr);
    let loc_b = memory_location(module, func, b.ptr);
    if loc_a.root == loc_b.root {
        if granularity == HazardGranularity::Field {
            if let (Some(oa), Some(ob)) = (loc_a.offset, loc_b.offset) {
                return oa == ob;
            }
        }
        return true;
    }
    // Distinct allocas, or an alloca against anything else, cannot alias.
    !(loc_a.root_is_alloca || loc_b.root_is_alloca)
}

/// Check whether an unmatched span instruction may be discarded as dead
/// code: it must have no observable external effect.
pub fn is_discardable(inst: &Instruction) -> bool {
    !inst.has_external_effect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::HazardGranularity;
    use semdiff_ir::{BinaryOp, DataLayout, FunctionBuilder, StructDef, Type};

    fn build_env() -> (Module, Function, Vec<Operand>) {
        let mut m = Module::new("m", DataLayout::default());
        m.add_struct(StructDef::new("s", vec![Type::Int(64), Type::Int(64)]));
        let mut b = FunctionBuilder::new("f", vec![Type::Ptr, Type::Ptr], Type::Void);
        b.block("entry");
        let a0 = b.alloca(Type::Int(64));
        let g0 = b.gep(
            Type::named("s"),
            Operand::Arg(0),
            vec![Operand::const_int(64, 0), Operand::const_int(32, 0)],
        );
        let g1 = b.gep(
            Type::named("s"),
            Operand::Arg(0),
            vec![Operand::const_int(64, 0), Operand::const_int(32, 1)],
        );
        b.ret(None);
        (m, b.finish(), vec![a0, g0, g1])
    }

    fn store_to(ptr: Operand) -> Instruction {
        Instruction::new(
            InstKind::Store {
                value: Operand::const_int(64, 1),
                ptr,
            },
            Type::Void,
        )
    }

    fn load_from(ptr: Operand) -> Instruction {
        Instruction::new(InstKind::Load { ptr }, Type::Int(64))
    }

    #[test]
    fn test_load_store_same_root_conflicts() {
        let (m, f, ops) = build_env();
        let st = store_to(Operand::Arg(0));
        let ld = load_from(ops[1].clone());
        assert!(may_conflict(&m, &f, &st, &ld, HazardGranularity::Object));
    }

    #[test]
    fn test_field_granularity_separates_disjoint_fields() {
        let (m, f, ops) = build_env();
        let st = store_to(ops[1].clone());
        let ld = load_from(ops[2].clone());
        assert!(may_conflict(&m, &f, &st, &ld, HazardGranularity::Object));
        assert!(!may_conflict(&m, &f, &st, &ld, HazardGranularity::Field));
    }

    #[test]
    fn test_alloca_does_not_alias_argument() {
        let (m, f, ops) = build_env();
        let st = store_to(ops[0].clone());
        let ld = load_from(Operand::Arg(1));
        assert!(!may_conflict(&m, &f, &st, &ld, HazardGranularity::Object));
    }

    #[test]
    fn test_same_role_accesses_do_not_conflict() {
        let (m, f, _) = build_env();
        let ld_a = load_from(Operand::Arg(0));
        let ld_b = load_from(Operand::Arg(0));
        assert!(!may_conflict(&m, &f, &ld_a, &ld_b, HazardGranularity::Object));
    }

    #[test]
    fn test_pure_arithmetic_never_conflicts() {
        let (m, f, _) = build_env();
        let add = Instruction::new(
            InstKind::Binary {
                op: BinaryOp::Add,
                lhs: Operand::const_int(32, 1),
                rhs: Operand::const_int(32, 2),
            },
            Type::Int(32),
        );
        let st = store_to(Operand::Arg(0));
        assert!(!may_conflict(&m, &f, &add, &st, HazardGranularity::Object));
    }
}
