//! IR procedures and data declarations (spec component C9).

use crate::instruction::LabeledInstr;
use crate::types::IrType;
use std::rc::Rc;

#[derive(Debug, Clone)]
pub struct Arg {
    pub name: Rc<str>,
    pub ty: IrType,
}

#[derive(Debug, Clone)]
pub struct LocalVar {
    pub name: Rc<str>,
    pub ty: IrType,
}

#[derive(Debug, Clone)]
pub struct Procedure {
    pub name: Rc<str>,
    pub args: Vec<Arg>,
    pub locals: Vec<LocalVar>,
    pub body: Vec<LabeledInstr>,
    pub return_ty: Option<IrType>,
}

impl Procedure {
    pub fn new(name: impl Into<Rc<str>>, return_ty: Option<IrType>) -> Procedure {
        Procedure { name: name.into(), args: Vec::new(), locals: Vec::new(), body: Vec::new(), return_ty }
    }
}

/// One entry of a variable declaration's initializer data block.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DataEntry {
    pub ty: IrType,
    pub value: i64,
}

#[derive(Debug, Clone)]
pub struct Variable {
    pub name: Rc<str>,
    pub data: Vec<DataEntry>,
}

#[derive(Debug, Clone)]
pub enum Decl {
    Variable(Variable),
    Procedure(Procedure),
}
