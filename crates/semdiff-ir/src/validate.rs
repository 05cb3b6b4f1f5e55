//! Structural validation of built IR.

use thiserror::Error;

use crate::function::Function;
use crate::instr::InstKind;
use crate::module::Module;
use crate::value::{BlockId, InstId, Operand};

/// IR structural errors.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum IrError {
    #[error("{func}: instruction {inst:?} references out-of-range instruction {target:?}")]
    BadInstRef {
        func: String,
        inst: InstId,
        target: InstId,
    },
    #[error("{func}: instruction {inst:?} references out-of-range argument {index}")]
    BadArgRef {
        func: String,
        inst: InstId,
        index: u32,
    },
    #[error("{func}: block {block:?} targets out-of-range block {target:?}")]
    BadBlockRef {
        func: String,
        block: BlockId,
        target: BlockId,
    },
    #[error("{func}: phi {inst:?} names {from:?} which is not a predecessor of its block")]
    BadPhiEdge {
        func: String,
        inst: InstId,
        from: BlockId,
    },
    #[error("{func}: undefined struct type %{name}")]
    UndefinedStruct { func: String, name: String },
}

pub type Result<T> = std::result::Result<T, IrError>;

impl Function {
    /// Validate instruction, block, and type references. Dominance is not
    /// checked.
    pub fn validate(&self, module: &Module) -> Result<()> {
        let inst_count = self.insts.len();
        let block_count = self.blocks.len();
        let preds = self.predecessor_table();

        let check_op = |inst: InstId, op: &Operand| -> Result<()> {
            match op {
                Operand::Inst(target) if target.0 as usize >= inst_count => {
                    Err(IrError::BadInstRef {
                        func: self.name.clone(),
                        inst,
                        target: *target,
                    })
                }
                Operand::Arg(index) if *index as usize >= self.params.len() => {
                    Err(IrError::BadArgRef {
                        func: self.name.clone(),
                        inst,
                        index: *index,
                    })
                }
                _ => Ok(()),
            }
        };

        for (idx, inst) in self.insts.iter().enumerate() {
            let id = InstId(u32::try_from(idx).unwrap_or(u32::MAX));
            for op in inst.operands() {
                check_op(id, op)?;
            }
            if let InstKind::Gep { source, .. } = &inst.kind {
                if let Some(name) = source.struct_name() {
                    if module.struct_def(name).is_none() {
                        return Err(IrError::UndefinedStruct {
                            func: self.name.clone(),
                            name: name.to_string(),
                        });
                    }
                }
            }
        }

        for (idx, block) in self.blocks.iter().enumerate() {
            let block_id = BlockId(u32::try_from(idx).unwrap_or(u32::MAX));
            for target in block.term.successors() {
                if target.0 as usize >= block_count {
                    return Err(IrError::BadBlockRef {
                        func: self.name.clone(),
                        block: block_id,
                        target,
                    });
                }
            }
            for inst_id in &block.insts {
                if let InstKind::Phi { incoming } = &self.inst(*inst_id).kind {
                    for (_, from) in incoming {
                        if from.0 as usize >= block_count
                            || !preds[block_id.0 as usize].contains(from)
                        {
                            return Err(IrError::BadPhiEdge {
                                func: self.name.clone(),
                                inst: *inst_id,
                                from: *from,
                            });
                        }
                    }
                }
            }
        }
        Ok(())
    }
}

impl Module {
    /// Validate every function in the module.
    pub fn validate(&self) -> Result<()> {
        for func in &self.functions {
            func.validate(self)?;
        }
        Ok(())
    }
}
