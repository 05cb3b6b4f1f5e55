//! Single instruction IR.

use crate::types::Type;
use crate::value::{BlockId, Operand};

/// Source location for debug info.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct SourceLoc {
    /// Source file name.
    pub file: String,
    /// Line number.
    pub line: u32,
}

impl SourceLoc {
    /// Create a new source location.
    pub fn new(file: &str, line: u32) -> Self {
        Self {
            file: file.to_string(),
            line,
        }
    }

    /// Check if this is a valid source location.
    pub fn is_valid(&self) -> bool {
        !self.file.is_empty() && self.line > 0
    }
}

/// Binary integer operation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    UDiv,
    SDiv,
    URem,
    SRem,
    Shl,
    LShr,
    AShr,
    And,
    Or,
    Xor,
}

impl BinaryOp {
    /// Check if this operation is commutative.
    pub const fn is_commutative(self) -> bool {
        matches!(self, Self::Add | Self::Mul | Self::And | Self::Or | Self::Xor)
    }

    /// Check if this operation is associative.
    pub const fn is_associative(self) -> bool {
        matches!(self, Self::Add | Self::Mul | Self::And | Self::Or | Self::Xor)
    }
}

/// Integer comparison predicate.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CmpPred {
    Eq,
    Ne,
    Ult,
    Ule,
    Ugt,
    Uge,
    Slt,
    Sle,
    Sgt,
    Sge,
}

impl CmpPred {
    /// The predicate yielding the negated result on the same operands.
    pub const fn inverse(self) -> Self {
        match self {
            Self::Eq => Self::Ne,
            Self::Ne => Self::Eq,
            Self::Ult => Self::Uge,
            Self::Ule => Self::Ugt,
            Self::Ugt => Self::Ule,
            Self::Uge => Self::Ult,
            Self::Slt => Self::Sge,
            Self::Sle => Self::Sgt,
            Self::Sgt => Self::Sle,
            Self::Sge => Self::Slt,
        }
    }
}

/// Cast operation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CastOp {
    Bitcast,
    ZExt,
    SExt,
    Trunc,
    PtrToInt,
    IntToPtr,
    FpExt,
    FpTrunc,
}

impl CastOp {
    /// Check if this cast only changes integer width (or reinterprets bits
    /// without changing them).
    pub const fn is_width_change(self) -> bool {
        matches!(
            self,
            Self::ZExt | Self::SExt | Self::Trunc | Self::PtrToInt | Self::IntToPtr
        )
    }
}

/// Callee of a call instruction.
#[derive(Clone, Debug, PartialEq)]
pub enum Callee {
    /// Named function symbol.
    Symbol(String),
    /// Inline assembly.
    Asm { text: String, constraints: String },
    /// Indirect call through a value.
    Indirect(Operand),
}

impl Callee {
    /// Get the called symbol name, if any.
    pub fn symbol(&self) -> Option<&str> {
        match self {
            Self::Symbol(name) => Some(name),
            _ => None,
        }
    }
}

/// Instruction payload.
#[derive(Clone, Debug, PartialEq)]
pub enum InstKind {
    Binary {
        op: BinaryOp,
        lhs: Operand,
        rhs: Operand,
    },
    Cmp {
        pred: CmpPred,
        lhs: Operand,
        rhs: Operand,
    },
    /// Stack allocation of one element of `allocated`.
    Alloca {
        allocated: Type,
    },
    Load {
        ptr: Operand,
    },
    Store {
        value: Operand,
        ptr: Operand,
    },
    /// Address computation: `base` indexed through `source`.
    Gep {
        source: Type,
        base: Operand,
        indices: Vec<Operand>,
    },
    Cast {
        op: CastOp,
        value: Operand,
    },
    Call {
        callee: Callee,
        args: Vec<Operand>,
    },
    Select {
        cond: Operand,
        on_true: Operand,
        on_false: Operand,
    },
    /// Value merge at a block head; operand correspondence depends on
    /// predecessor blocks.
    Phi {
        incoming: Vec<(Operand, BlockId)>,
    },
}

/// Memory access made by an instruction: the pointer it dereferences and
/// the access role.
#[derive(Clone, Debug, PartialEq)]
pub struct MemAccess<'a> {
    pub ptr: &'a Operand,
    pub is_store: bool,
}

/// IR for a single instruction.
#[derive(Clone, Debug, PartialEq)]
pub struct Instruction {
    pub kind: InstKind,
    /// Result type; `Void` for stores and void calls.
    pub ty: Type,
    /// Optional source location for debug info.
    pub loc: Option<SourceLoc>,
    /// Non-semantic metadata; never compared.
    pub metadata: Vec<(String, String)>,
}

impl Instruction {
    /// Create a new instruction.
    pub const fn new(kind: InstKind, ty: Type) -> Self {
        Self {
            kind,
            ty,
            loc: None,
            metadata: Vec::new(),
        }
    }

    /// Check if this is a PHI instruction.
    pub const fn is_phi(&self) -> bool {
        matches!(self.kind, InstKind::Phi { .. })
    }

    /// Check if this is a call instruction.
    pub const fn is_call(&self) -> bool {
        matches!(self.kind, InstKind::Call { .. })
    }

    /// Check if this is a cast instruction.
    pub const fn is_cast(&self) -> bool {
        matches!(self.kind, InstKind::Cast { .. })
    }

    /// Get the called symbol name, if this is a direct call.
    pub fn called_symbol(&self) -> Option<&str> {
        match &self.kind {
            InstKind::Call { callee, .. } => callee.symbol(),
            _ => None,
        }
    }

    /// All value operands in a fixed order.
    pub fn operands(&self) -> Vec<&Operand> {
        match &self.kind {
            InstKind::Binary { lhs, rhs, .. } | InstKind::Cmp { lhs, rhs, .. } => vec![lhs, rhs],
            InstKind::Alloca { .. } => Vec::new(),
            InstKind::Load { ptr } => vec![ptr],
            InstKind::Store { value, ptr } => vec![value, ptr],
            InstKind::Gep { base, indices, .. } => {
                let mut ops = vec![base];
                ops.extend(indices.iter());
                ops
            }
            InstKind::Cast { value, .. } => vec![value],
            InstKind::Call { callee, args } => {
                let mut ops = Vec::new();
                if let Callee::Indirect(target) = callee {
                    ops.push(target);
                }
                ops.extend(args.iter());
                ops
            }
            InstKind::Select {
                cond,
                on_true,
                on_false,
            } => vec![cond, on_true, on_false],
            InstKind::Phi { incoming } => incoming.iter().map(|(v, _)| v).collect(),
        }
    }

    /// The memory access made by this instruction, if it dereferences a
    /// pointer. Calls are handled separately since their effects depend on
    /// the callee.
    pub const fn memory_access(&self) -> Option<MemAccess<'_>> {
        match &self.kind {
            InstKind::Load { ptr } => Some(MemAccess {
                ptr,
                is_store: false,
            }),
            InstKind::Store { ptr, .. } => Some(MemAccess {
                ptr,
                is_store: true,
            }),
            _ => None,
        }
    }

    /// Check if this instruction has an effect observable outside the
    /// function (memory writes, calls).
    pub const fn has_external_effect(&self) -> bool {
        matches!(self.kind, InstKind::Store { .. } | InstKind::Call { .. })
    }
}
