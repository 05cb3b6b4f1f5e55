//! Basic block IR and terminators.

use crate::value::{BlockId, InstId, Operand};

/// Block terminator - controls where execution goes next.
#[derive(Clone, Debug, PartialEq)]
pub enum Terminator {
    /// Return from the function.
    Ret(Option<Operand>),
    /// Unconditional branch.
    Br(BlockId),
    /// Conditional branch.
    CondBr {
        cond: Operand,
        on_true: BlockId,
        on_false: BlockId,
    },
    /// Multi-way branch on an integer value.
    Switch {
        value: Operand,
        default: BlockId,
        cases: Vec<(i128, BlockId)>,
    },
    /// Control never reaches here.
    Unreachable,
}

impl Terminator {
    /// Successor blocks in a fixed order.
    pub fn successors(&self) -> Vec<BlockId> {
        match self {
            Self::Ret(_) | Self::Unreachable => Vec::new(),
            Self::Br(target) => vec![*target],
            Self::CondBr {
                on_true, on_false, ..
            } => vec![*on_true, *on_false],
            Self::Switch {
                default, cases, ..
            } => {
                let mut succs = vec![*default];
                succs.extend(cases.iter().map(|(_, bb)| *bb));
                succs
            }
        }
    }

    /// Check if this terminator is a conditional branch.
    pub const fn is_conditional(&self) -> bool {
        matches!(self, Self::CondBr { .. })
    }

    /// The branch condition, if any.
    pub const fn condition(&self) -> Option<&Operand> {
        match self {
            Self::CondBr { cond, .. } => Some(cond),
            Self::Switch { value, .. } => Some(value),
            _ => None,
        }
    }
}

/// IR for a basic block (ordered sequence of instructions plus terminator).
#[derive(Clone, Debug, PartialEq)]
pub struct BasicBlock {
    /// Block label, unique within the function.
    pub name: String,
    /// Instructions in program order, by id into the function arena.
    pub insts: Vec<InstId>,
    /// Control flow terminator.
    pub term: Terminator,
}

impl BasicBlock {
    /// Create a new block with an unreachable terminator.
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            insts: Vec::new(),
            term: Terminator::Unreachable,
        }
    }

    /// Get number of instructions.
    pub fn len(&self) -> usize {
        self.insts.len()
    }

    /// Check if block has no instructions.
    pub fn is_empty(&self) -> bool {
        self.insts.is_empty()
    }
}
