//! Function builder fluent API.

use crate::block::{BasicBlock, Terminator};
use crate::function::Function;
use crate::instr::{BinaryOp, Callee, CastOp, CmpPred, InstKind, Instruction, SourceLoc};
use crate::types::Type;
use crate::value::{BlockId, InstId, Operand};

/// Builder for function IR. Instructions are appended to the current block;
/// each emit returns the result as an [`Operand`].
pub struct FunctionBuilder {
    func: Function,
    current: Option<BlockId>,
    loc: Option<SourceLoc>,
}

impl FunctionBuilder {
    /// Create a new builder for a function with the given signature.
    pub fn new(name: &str, params: Vec<Type>, ret: Type) -> Self {
        Self {
            func: Function::new(name, params, ret),
            current: None,
            loc: None,
        }
    }

    /// Create a new block. The first created block is the entry; creation
    /// also makes it current when no block is selected.
    pub fn block(&mut self, name: &str) -> BlockId {
        let id = BlockId(u32::try_from(self.func.blocks.len()).unwrap_or(u32::MAX));
        self.func.blocks.push(BasicBlock::new(name));
        if self.current.is_none() {
            self.current = Some(id);
        }
        id
    }

    /// Select the block that receives subsequent instructions.
    pub fn switch_to(&mut self, block: BlockId) {
        self.current = Some(block);
    }

    /// Set the source location applied to subsequently emitted instructions.
    pub fn at(&mut self, file: &str, line: u32) {
        self.loc = Some(SourceLoc::new(file, line));
    }

    /// Clear the current source location.
    pub fn clear_loc(&mut self) {
        self.loc = None;
    }

    fn emit(&mut self, kind: InstKind, ty: Type) -> Operand {
        let id = InstId(u32::try_from(self.func.insts.len()).unwrap_or(u32::MAX));
        let mut inst = Instruction::new(kind, ty);
        inst.loc = self.loc.clone();
        self.func.insts.push(inst);
        if let Some(block) = self.current {
            self.func.blocks[block.0 as usize].insts.push(id);
        }
        Operand::Inst(id)
    }

    /// Emit a binary operation.
    pub fn binary(&mut self, op: BinaryOp, ty: Type, lhs: Operand, rhs: Operand) -> Operand {
        self.emit(InstKind::Binary { op, lhs, rhs }, ty)
    }

    /// Emit an integer comparison.
    pub fn cmp(&mut self, pred: CmpPred, lhs: Operand, rhs: Operand) -> Operand {
        self.emit(InstKind::Cmp { pred, lhs, rhs }, Type::Int(1))
    }

    /// Emit a stack allocation.
    pub fn alloca(&mut self, allocated: Type) -> Operand {
        self.emit(InstKind::Alloca { allocated }, Type::Ptr)
    }

    /// Emit a load.
    pub fn load(&mut self, ty: Type, ptr: Operand) -> Operand {
        self.emit(InstKind::Load { ptr }, ty)
    }

    /// Emit a store.
    pub fn store(&mut self, value: Operand, ptr: Operand) {
        self.emit(InstKind::Store { value, ptr }, Type::Void);
    }

    /// Emit an address computation.
    pub fn gep(&mut self, source: Type, base: Operand, indices: Vec<Operand>) -> Operand {
        self.emit(
            InstKind::Gep {
                source,
                base,
                indices,
            },
            Type::Ptr,
        )
    }

    /// Emit a cast.
    pub fn cast(&mut self, op: CastOp, value: Operand, to: Type) -> Operand {
        self.emit(InstKind::Cast { op, value }, to)
    }

    /// Emit a direct call.
    pub fn call(&mut self, symbol: &str, args: Vec<Operand>, ret: Type) -> Operand {
        self.emit(
            InstKind::Call {
                callee: Callee::Symbol(symbol.to_string()),
                args,
            },
            ret,
        )
    }

    /// Emit an inline assembly call.
    pub fn asm_call(
        &mut self,
        text: &str,
        constraints: &str,
        args: Vec<Operand>,
        ret: Type,
    ) -> Operand {
        self.emit(
            InstKind::Call {
                callee: Callee::Asm {
                    text: text.to_string(),
                    constraints: constraints.to_string(),
                },
                args,
            },
            ret,
        )
    }

    /// Emit a select.
    pub fn select(&mut self, ty: Type, cond: Operand, on_true: Operand, on_false: Operand) -> Operand {
        self.emit(
            InstKind::Select {
                cond,
                on_true,
                on_false,
            },
            ty,
        )
    }

    /// Emit a PHI node.
    pub fn phi(&mut self, ty: Type, incoming: Vec<(Operand, BlockId)>) -> Operand {
        self.emit(InstKind::Phi { incoming }, ty)
    }

    /// Add an incoming edge to a previously emitted PHI.
    pub fn phi_add_incoming(&mut self, phi: &Operand, value: Operand, from: BlockId) {
        if let Operand::Inst(id) = phi {
            if let InstKind::Phi { incoming } = &mut self.func.insts[id.0 as usize].kind {
                incoming.push((value, from));
            }
        }
    }

    fn set_term(&mut self, term: Terminator) {
        if let Some(block) = self.current {
            self.func.blocks[block.0 as usize].term = term;
        }
    }

    /// Terminate the current block with a return.
    pub fn ret(&mut self, value: Option<Operand>) {
        self.set_term(Terminator::Ret(value));
    }

    /// Terminate the current block with an unconditional branch.
    pub fn br(&mut self, target: BlockId) {
        self.set_term(Terminator::Br(target));
    }

    /// Terminate the current block with a conditional branch.
    pub fn cond_br(&mut self, cond: Operand, on_true: BlockId, on_false: BlockId) {
        self.set_term(Terminator::CondBr {
            cond,
            on_true,
            on_false,
        });
    }

    /// Terminate the current block with a switch.
    pub fn switch(&mut self, value: Operand, default: BlockId, cases: Vec<(i128, BlockId)>) {
        self.set_term(Terminator::Switch {
            value,
            default,
            cases,
        });
    }

    /// Finish building and return the function.
    pub fn finish(self) -> Function {
        self.func
    }
}
