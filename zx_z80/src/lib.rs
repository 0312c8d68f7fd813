//! Z80 instruction representation, IR-to-Z80 codegen and register
//! allocation (spec components C11, C12, C13): the back half of the
//! compiler, turning [`zx_ir::Module`] into Z80 assembler text.

pub mod codegen;
pub mod emit;
pub mod instruction;
pub mod module;
pub mod operand;
pub mod proc;
pub mod regalloc;

pub use instruction::{Instruction, LabeledInstr, Opcode};
pub use module::Module;
pub use operand::{Cond, Indirect, Operand, Reg16, Reg8, RegGroup, Vr, VrPart, Vrr};
pub use proc::{DataEntry, DataWidth, Decl, LocalVar, Procedure, SlotKind, Variable};

/// Compiles an IR module all the way to Z80 assembler text: codegen,
/// then allocation, then emission.
pub fn compile(ir: &zx_ir::Module) -> String {
    let mut module = codegen::generate_module(ir);
    regalloc::allocate_module(&mut module);
    emit::emit_module(&module)
}

#[cfg(test)]
mod tests;
