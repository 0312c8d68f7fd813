//! Z80 IC instructions: an opcode plus typed operands (spec component
//! C11). Every opcode below that isn't a jump/call/return reads and/or
//! writes through its *first* operand the way the real mnemonic does --
//! `ld dst,src` writes dst, `add dst,src` reads and writes dst -- which is
//! exactly the convention the register allocator's rewrite rule in
//! `regalloc.rs` depends on.

use crate::operand::{Cond, Operand};
use std::rc::Rc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Opcode {
    Ld,
    Push,
    Pop,
    Add,
    Adc,
    Sub,
    Sbc,
    And,
    Or,
    Xor,
    Cp,
    Inc,
    Dec,
    Neg,
    Cpl,
    Sla,
    Sra,
    Srl,
    Rl,
    Rr,
    Jp,
    JpCc,
    Call,
    CallCc,
    Ret,
    RetCc,
    Di,
    Ei,
    Nop,
    Halt,
}

/// Read/write behaviour of each operand slot an opcode accepts, used by the
/// allocator to decide which virtual operands need a pre-load and which
/// need a post-store around the physical op it rewrites to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Io {
    Read,
    Write,
    ReadWrite,
}

impl Opcode {
    pub fn operand_io(self) -> &'static [Io] {
        use Io::*;
        match self {
            Opcode::Ld => &[Write, Read],
            Opcode::Add | Opcode::Adc | Opcode::Sub | Opcode::Sbc | Opcode::And | Opcode::Or | Opcode::Xor => {
                &[ReadWrite, Read]
            }
            Opcode::Cp => &[Read, Read],
            Opcode::Inc | Opcode::Dec | Opcode::Neg | Opcode::Cpl | Opcode::Sla | Opcode::Sra | Opcode::Srl | Opcode::Rl
            | Opcode::Rr => &[ReadWrite],
            Opcode::Push => &[Read],
            Opcode::Pop => &[Write],
            Opcode::Jp | Opcode::JpCc | Opcode::Call | Opcode::CallCc | Opcode::Ret | Opcode::RetCc | Opcode::Di
            | Opcode::Ei | Opcode::Nop | Opcode::Halt => &[],
        }
    }
}

#[derive(Debug, Clone)]
pub struct Instruction {
    pub opcode: Opcode,
    pub operands: Vec<Operand>,
    pub cond: Option<Cond>,
    /// Printed as a `;` comment above the line -- codegen uses this to
    /// record e.g. the full value a multi-word `defw` group decomposes.
    pub comment: Option<Rc<str>>,
}

impl Instruction {
    pub fn new(opcode: Opcode, operands: Vec<Operand>) -> Instruction {
        Instruction { opcode, operands, cond: None, comment: None }
    }

    pub fn with_cond(mut self, cond: Cond) -> Instruction {
        self.cond = Some(cond);
        self
    }

    pub fn with_comment(mut self, comment: impl Into<Rc<str>>) -> Instruction {
        self.comment = Some(comment.into());
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

impl LabeledInstr {
    pub fn plain(instr: Instruction) -> LabeledInstr {
        LabeledInstr { label: None, instr }
    }

    pub fn labeled(label: impl Into<Rc<str>>, instr: Instruction) -> LabeledInstr {
        LabeledInstr { label: Some(label.into()), instr }
    }
}
