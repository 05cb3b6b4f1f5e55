//! Function IR: an instruction arena plus an ordered control-flow graph.

use crate::block::BasicBlock;
use crate::instr::Instruction;
use crate::types::Type;
use crate::value::{BlockId, InstId, Operand};

/// A place where an instruction result is used.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UseSite {
    /// Operand of another instruction.
    Inst(InstId),
    /// Operand of a block terminator.
    Terminator(BlockId),
}

/// IR for a single function.
#[derive(Clone, Debug, PartialEq)]
pub struct Function {
    pub name: String,
    pub params: Vec<Type>,
    pub ret: Type,
    /// Instruction arena; blocks reference instructions by id.
    pub insts: Vec<Instruction>,
    /// Basic blocks in layout order; block 0 is the entry.
    pub blocks: Vec<BasicBlock>,
}

impl Function {
    /// Create an empty function (a declaration until blocks are added).
    pub fn new(name: &str, params: Vec<Type>, ret: Type) -> Self {
        Self {
            name: name.to_string(),
            params,
            ret,
            insts: Vec::new(),
            blocks: Vec::new(),
        }
    }

    /// Check if this is a declaration without a body.
    pub fn is_declaration(&self) -> bool {
        self.blocks.is_empty()
    }

    /// The entry block, if the function has a body.
    pub fn entry(&self) -> Option<BlockId> {
        if self.blocks.is_empty() {
            None
        } else {
            Some(BlockId(0))
        }
    }

    /// Get an instruction by id.
    pub fn inst(&self, id: InstId) -> &Instruction {
        &self.insts[id.0 as usize]
    }

    /// Get a block by id.
    pub fn block(&self, id: BlockId) -> &BasicBlock {
        &self.blocks[id.0 as usize]
    }

    /// Total number of instructions (terminators excluded).
    pub fn inst_count(&self) -> usize {
        self.insts.len()
    }

    /// Predecessors of every block, indexed by block id.
    pub fn predecessor_table(&self) -> Vec<Vec<BlockId>> {
        let mut preds = vec![Vec::new(); self.blocks.len()];
        for (idx, block) in self.blocks.iter().enumerate() {
            for succ in block.term.successors() {
                let list = &mut preds[succ.0 as usize];
                let this = BlockId(u32::try_from(idx).unwrap_or(u32::MAX));
                if !list.contains(&this) {
                    list.push(this);
                }
            }
        }
        preds
    }

    /// All use sites of the given instruction's result.
    pub fn uses_of(&self, id: InstId) -> Vec<UseSite> {
        let mut uses = Vec::new();
        for (idx, inst) in self.insts.iter().enumerate() {
            if inst
                .operands()
                .iter()
                .any(|op| matches!(op, Operand::Inst(used) if *used == id))
            {
                uses.push(UseSite::Inst(InstId(u32::try_from(idx).unwrap_or(u32::MAX))));
            }
        }
        for (idx, block) in self.blocks.iter().enumerate() {
            if matches!(block.term.condition(), Some(Operand::Inst(used)) if *used == id)
                || matches!(&block.term, crate::block::Terminator::Ret(Some(Operand::Inst(used))) if *used == id)
            {
                uses.push(UseSite::Terminator(BlockId(
                    u32::try_from(idx).unwrap_or(u32::MAX),
                )));
            }
        }
        uses
    }

    /// The block containing the given instruction, if it is reachable from
    /// any block's instruction list.
    pub fn block_of(&self, id: InstId) -> Option<BlockId> {
        for (idx, block) in self.blocks.iter().enumerate() {
            if block.insts.contains(&id) {
                return Some(BlockId(u32::try_from(idx).ok()?));
            }
        }
        None
    }
}
