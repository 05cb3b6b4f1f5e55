//! Pure helper algorithms backing the per-kind comparison heuristics.

use semdiff_ir::{
    BinaryOp, CastOp, Function, InstKind, Module, Operand, StructDef, Type,
};

/// Functions treated as memory allocators; their size argument is
/// normalized by layout before comparison.
pub const ALLOC_FNS: &[&str] = &[
    "malloc", "calloc", "realloc", "kmalloc", "kzalloc", "kcalloc", "krealloc", "vmalloc",
    "vzalloc", "kvmalloc", "kvzalloc",
];

/// Allocators taking (count, size) rather than a single byte size.
pub const COUNTED_ALLOC_FNS: &[&str] = &["calloc", "kcalloc"];

/// Functions of the memset/memcpy family; their length operand is compared
/// after constant folding.
pub const MEM_FNS: &[&str] = &[
    "memset", "memcpy", "memmove", "__memset", "__memcpy", "memset_explicit",
];

/// Check if `name` is an allocation function.
pub fn is_alloc_fn(name: &str) -> bool {
    ALLOC_FNS.contains(&name)
}

/// Check if `name` is a memset/memcpy-family function.
pub fn is_mem_fn(name: &str) -> bool {
    MEM_FNS.contains(&name)
}

/// Fold a constant-foldable operand expression to an integer. Walks through
/// width-changing casts and binary operations over foldable operands.
pub fn fold_constant(func: &Function, op: &Operand) -> Option<i128> {
    match op {
        Operand::Const(c) => c.int_value(),
        Operand::Inst(id) => match &func.inst(*id).kind {
            InstKind::Binary { op, lhs, rhs } => {
                let a = fold_constant(func, lhs)?;
                let b = fold_constant(func, rhs)?;
                apply_binary(*op, a, b)
            }
            InstKind::Cast { op, value } if matches!(op, CastOp::ZExt | CastOp::SExt | CastOp::Trunc) => {
                fold_constant(func, value)
            }
            _ => None,
        },
        _ => None,
    }
}

fn apply_binary(op: BinaryOp, a: i128, b: i128) -> Option<i128> {
    match op {
        BinaryOp::Add => a.checked_add(b),
        BinaryOp::Sub => a.checked_sub(b),
        BinaryOp::Mul => a.checked_mul(b),
        BinaryOp::UDiv | BinaryOp::SDiv => a.checked_div(b),
        BinaryOp::URem | BinaryOp::SRem => a.checked_rem(b),
        BinaryOp::Shl => u32::try_from(b).ok().and_then(|s| a.checked_shl(s)),
        BinaryOp::LShr | BinaryOp::AShr => u32::try_from(b).ok().and_then(|s| a.checked_shr(s)),
        BinaryOp::And => Some(a & b),
        BinaryOp::Or => Some(a | b),
        BinaryOp::Xor => Some(a ^ b),
    }
}

/// Byte offset addressed by a GEP with all-constant indices, computed with
/// the owning module's layout. `None` when any index is non-constant or the
/// layout is unknown.
pub fn gep_byte_offset(
    module: &Module,
    func: &Function,
    source: &Type,
    indices: &[Operand],
) -> Option<u64> {
    let mut iter = indices.iter();
    let first = fold_constant(func, iter.next()?)?;
    let first = u64::try_from(first).ok()?;
    let mut offset = first.checked_mul(module.layout.size_of(module, source)?)?;
    let mut current = source.clone();

    for index in iter {
        let idx = usize::try_from(fold_constant(func, index)?).ok()?;
        match current {
            Type::Struct(name) => {
                let def = module.struct_def(&name)?;
                offset = offset.checked_add(module.layout.field_offset(module, def, idx)?)?;
                current = def.fields.get(idx)?.clone();
            }
            Type::Array { elem, .. } => {
                let elem_size = module.layout.size_of(module, &elem)?;
                offset = offset.checked_add((idx as u64).checked_mul(elem_size)?)?;
                current = *elem;
            }
            _ => return None,
        }
    }
    Some(offset)
}

/// Align the field lists of two versions of a struct. Returns, for each
/// left field, the corresponding right field index, or `None` where the
/// field has no counterpart. Alignment is greedy over equal field types and
/// absorbs fields added or removed on either side.
pub fn struct_field_alignment(left: &StructDef, right: &StructDef) -> Vec<Option<usize>> {
    let mut map = vec![None; left.fields.len()];
    let mut i = 0;
    let mut j = 0;
    while i < left.fields.len() && j < right.fields.len() {
        if left.fields[i] == right.fields[j] {
            map[i] = Some(j);
            i += 1;
            j += 1;
        } else if right.fields.len() > left.fields.len() {
            // Right gained a field; slide past it.
            j += 1;
        } else if left.fields.len() > right.fields.len() {
            // Left field was removed on the right.
            i += 1;
        } else {
            // Same arity, changed field; align positionally and let the
            // caller judge the type change.
            map[i] = Some(j);
            i += 1;
            j += 1;
        }
    }
    map
}

/// Normalize inline assembly text for comparison: case, whitespace runs,
/// and register names are all collapsed.
pub fn normalize_asm(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for token in text.split([' ', '\t', '\n', ',']).filter(|t| !t.is_empty()) {
        if !out.is_empty() {
            out.push(' ');
        }
        if let Some(rest) = token.strip_prefix('%') {
            // Register operand: the concrete register chosen is a
            // compilation artifact.
            let _ = rest;
            out.push_str("%reg");
        } else {
            out.push_str(&token.to_ascii_lowercase());
        }
    }
    out
}
