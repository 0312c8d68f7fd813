//! IR instructions (spec component C9): a tag plus an operand list. Each
//! temporary is produced by exactly one instruction -- this is "SSA-ish"
//! only in that narrow sense, there's no dominance analysis or phi nodes.

use crate::operand::Operand;
use crate::types::IrType;
use std::rc::Rc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Opcode {
    Add,
    Sub,
    Mul,
    Div,
    UDiv,
    Mod,
    UMod,

    And,
    Or,
    Xor,
    Shl,
    Shr,
    AShr,

    Neg,
    Not,
    LogNot,

    CmpEq,
    CmpNe,
    CmpLt,
    CmpLe,
    CmpGt,
    CmpGe,
    CmpLtU,
    CmpLeU,
    CmpGtU,
    CmpGeU,

    /// Narrows an operand to the instruction's result width.
    Trunc,
    /// Widens a signed operand, replicating its sign bit.
    SExt,
    /// Widens an unsigned operand with zero bits.
    ZExt,

    Load,
    Store,
    /// Materializes the address of a named variable into the result.
    AddrOf,

    Mov,

    /// Non-variadic call; last operand is an `Operand::List` of arguments.
    Call,
    /// Variadic call; same operand shape as `Call`, kept as a distinct
    /// opcode so codegen can emit the extra argument-count bookkeeping a
    /// variadic callee expects.
    CallVariadic,

    Jump,
    BranchIfZero,
    BranchIfNonZero,

    Return,
}

#[derive(Debug, Clone)]
pub struct Instruction {
    pub opcode: Opcode,
    pub operands: Vec<Operand>,
    /// Name of the temporary or variable this instruction writes, if any.
    pub result: Option<Rc<str>>,
    pub ty: Option<IrType>,
}

impl Instruction {
    pub fn new(opcode: Opcode, operands: Vec<Operand>) -> Instruction {
        Instruction { opcode, operands, result: None, ty: None }
    }

    pub fn with_result(mut self, result: impl Into<Rc<str>>, ty: IrType) -> Instruction {
        self.result = Some(result.into());
        self.ty = Some(ty);
        self
    }

    /// Attaches a value type to an instruction with no named result, such as
    /// `Store`, so codegen can size the write without having to re-derive it
    /// from the operand it happens to have been given.
    pub fn with_ty(mut self, ty: IrType) -> Instruction {
        self.ty = Some(ty);
        self
    }
}

/// One entry of a procedure's labeled instruction block: an optional label
/// definition followed by the instruction it's attached to.
#[derive(Debug, Clone)]
pub struct LabeledInstr {
    pub label: Option<Rc<str>>,
    pub instr: Instruction,
}
