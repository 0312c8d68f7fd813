//! Instruction operands: immediates, named variable/temporary references,
//! and the operand lists variadic calls build up.

use std::rc::Rc;

#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    Immediate(i64),
    /// Refers to a local, global, parameter or `%N` temporary by name; the
    /// lowering pass resolves which of those a name denotes via the
    /// enclosing procedure's arg/local lists and the module's globals.
    Var(Rc<str>),
    /// A call's argument list, left to right; only ever appears as the
    /// trailing operand of a `Call`/`CallVariadic` instruction.
    List(Vec<Operand>),
}

impl Operand {
    pub fn var(name: impl Into<Rc<str>>) -> Operand {
        Operand::Var(name.into())
    }
}
