//! Operands and constants.

use crate::types::Type;

/// Index of an instruction within its function's instruction arena.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InstId(pub u32);

/// Index of a basic block within its function.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BlockId(pub u32);

/// Index of a function within its module.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FuncId(pub u32);

/// A constant value. Constants have no side-scoped identity; they are
/// compared structurally.
#[derive(Clone, Debug, PartialEq)]
pub enum Constant {
    /// Integer constant with an explicit bit width.
    Int { value: i128, bits: u32 },
    /// Floating point constant.
    Float { value: f64, bits: u32 },
    /// Null pointer.
    Null,
    /// Undefined value of the given type.
    Undef(Type),
}

impl Constant {
    /// Create an integer constant.
    pub const fn int(bits: u32, value: i128) -> Self {
        Self::Int { value, bits }
    }

    /// Check if this constant is integer zero or a null pointer.
    pub const fn is_zero_like(&self) -> bool {
        matches!(self, Self::Int { value: 0, .. } | Self::Null)
    }

    /// Get the integer value, if this is an integer constant.
    pub const fn int_value(&self) -> Option<i128> {
        match self {
            Self::Int { value, .. } => Some(*value),
            _ => None,
        }
    }
}

/// An operand of an instruction or terminator.
#[derive(Clone, Debug, PartialEq)]
pub enum Operand {
    /// Result of an instruction in the same function.
    Inst(InstId),
    /// Function argument by index.
    Arg(u32),
    /// Inline constant.
    Const(Constant),
    /// Module-level global or function symbol, referenced by name.
    Global(String),
}

impl Operand {
    /// Create an integer constant operand.
    pub const fn const_int(bits: u32, value: i128) -> Self {
        Self::Const(Constant::int(bits, value))
    }

    /// Get the instruction id, if this operand is an instruction result.
    pub const fn as_inst(&self) -> Option<InstId> {
        match self {
            Self::Inst(id) => Some(*id),
            _ => None,
        }
    }

    /// Get the constant, if this operand is one.
    pub const fn as_const(&self) -> Option<&Constant> {
        match self {
            Self::Const(c) => Some(c),
            _ => None,
        }
    }

    /// Check if this operand is a constant.
    pub const fn is_const(&self) -> bool {
        matches!(self, Self::Const(_))
    }
}
