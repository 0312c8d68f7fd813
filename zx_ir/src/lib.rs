//! Intermediate representation and AST-to-IR lowering (spec components
//! C9/C10): a flat, labeled-instruction-block IR -- not basic blocks, not
//! SSA with dominance -- plus the recursive-descent pass that produces one
//! from a parsed translation unit.

pub mod instruction;
pub mod lower;
pub mod module;
pub mod namegen;
pub mod operand;
pub mod proc;
pub mod typebuild;
pub mod types;

pub use instruction::{Instruction, LabeledInstr, Opcode};
pub use lower::{lower_translation_unit, LoweringResult};
pub use module::Module;
pub use namegen::NameGen;
pub use operand::Operand;
pub use proc::{Arg, DataEntry, Decl, LocalVar, Procedure, Variable};
pub use types::IrType;

#[cfg(test)]
mod tests;
